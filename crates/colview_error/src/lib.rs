use std::borrow::Cow;
use std::error::Error;
use std::fmt;

pub type Result<T, E = VectorError> = std::result::Result<T, E>;

/// Broad category of an error.
///
/// Callers can match on the kind to decide if an operation failed because of
/// resource exhaustion, bad input, or a failure reported by an external
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backing allocator couldn't satisfy a request.
    Allocation,
    /// Row or element index past the declared length.
    IndexOutOfRange,
    /// Buffer shape, count, or width disagrees with the declared type.
    SchemaMismatch,
    /// Failure surfaced by a plan execution engine.
    Plan,
    NotImplemented,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Allocation => "Allocation",
            Self::IndexOutOfRange => "IndexOutOfRange",
            Self::SchemaMismatch => "SchemaMismatch",
            Self::Plan => "Plan",
            Self::NotImplemented => "NotImplemented",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
pub struct VectorError {
    inner: Box<VectorErrorInner>,
}

#[derive(Debug)]
struct VectorErrorInner {
    kind: ErrorKind,
    msg: String,
    /// Extra key/value pairs attached to the error for display.
    fields: Vec<(Cow<'static, str>, String)>,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl VectorError {
    /// Create a new internal error.
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        VectorError {
            inner: Box::new(VectorErrorInner {
                kind,
                msg: msg.into(),
                fields: Vec::new(),
                source: None,
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Allocation, msg)
    }

    /// Error for an index that is greater than or equal to `len`.
    pub fn index_out_of_range(idx: usize, len: usize) -> Self {
        Self::with_kind(ErrorKind::IndexOutOfRange, "Index out of range")
            .with_field("index", idx)
            .with_field("len", len)
    }

    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::SchemaMismatch, msg)
    }

    pub fn plan(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Plan, msg)
    }

    /// Plan error wrapping the underlying failure.
    pub fn plan_with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::plan(msg);
        err.inner.source = Some(source);
        err
    }

    /// Attach a field to the error.
    pub fn with_field<V>(mut self, key: impl Into<Cow<'static, str>>, value: V) -> Self
    where
        V: fmt::Display,
    {
        self.inner.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn get_msg(&self) -> &str {
        &self.inner.msg
    }

    /// Get the value of a field attached to this error.
    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.inner
            .fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn prefix_msg(mut self, prefix: impl fmt::Display) -> Self {
        self.inner.msg = format!("{prefix}: {}", self.inner.msg);
        self
    }
}

impl fmt::Display for VectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;
        for (key, value) in &self.inner.fields {
            write!(f, "\n  {key}: {value}")?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }

        Ok(())
    }
}

impl Error for VectorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner
            .source
            .as_deref()
            .map(|e| e as &(dyn Error + 'static))
    }
}

impl From<fmt::Error> for VectorError {
    fn from(value: fmt::Error) -> Self {
        VectorError::with_source("Format error", Box::new(value))
    }
}

/// Extension methods for adding context to errors.
pub trait ResultExt<T> {
    /// Prefix the error message with `msg`, keeping the error kind.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Same as `context`, with the message computed lazily.
    fn context_fn<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: fmt::Display;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.prefix_msg(msg))
    }

    fn context_fn<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: fmt::Display,
    {
        self.map_err(|e| e.prefix_msg(f()))
    }
}

pub trait OptionExt<T> {
    /// Return an error if the option is None.
    fn required(self, name: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, name: &'static str) -> Result<T> {
        self.ok_or_else(|| VectorError::new(format!("Missing required value: {name}")))
    }
}

#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)*) => {
        return Err($crate::VectorError::with_kind(
            $crate::ErrorKind::NotImplemented,
            format!("Not yet implemented: {}", format!($($arg)*)),
        ))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_fields() {
        let err = VectorError::new("bad thing").with_field("index", 4);
        assert_eq!("bad thing\n  index: 4", err.to_string());
        assert_eq!(Some("4"), err.get_field("index"));
    }

    #[test]
    fn context_keeps_kind() {
        let res: Result<()> = Err(VectorError::schema_mismatch("width differs"));
        let err = res.context("Failed to load buffers").unwrap_err();
        assert_eq!(ErrorKind::SchemaMismatch, err.kind());
        assert_eq!("Failed to load buffers: width differs", err.get_msg());
    }

    #[test]
    fn index_out_of_range_fields() {
        let err = VectorError::index_out_of_range(8, 3);
        assert_eq!(ErrorKind::IndexOutOfRange, err.kind());
        assert_eq!(Some("8"), err.get_field("index"));
        assert_eq!(Some("3"), err.get_field("len"));
    }

    #[test]
    fn not_implemented_macro() {
        fn nested() -> Result<()> {
            not_implemented!("nested {}", "lists")
        }

        let err = nested().unwrap_err();
        assert_eq!(ErrorKind::NotImplemented, err.kind());
        assert_eq!("Not yet implemented: nested lists", err.get_msg());
    }

    #[test]
    fn required_missing() {
        let v: Option<i32> = None;
        let err = v.required("value").unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
    }
}
