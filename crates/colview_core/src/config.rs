use std::collections::HashMap;
use std::sync::LazyLock;

use colview_error::{Result, VectorError};

use crate::arrays::scalar::ScalarValue;

/// Default number of rows to allocate for when a vector is first allocated.
pub const DEFAULT_INITIAL_VALUE_ALLOCATION: usize = 3970;

/// Default number of child elements expected per list row.
pub const DEFAULT_REPEAT_PER_RECORD: usize = 5;

/// Allocation defaults for vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorConfig {
    pub initial_value_allocation: usize,
    pub repeat_per_record: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        VectorConfig {
            initial_value_allocation: DEFAULT_INITIAL_VALUE_ALLOCATION,
            repeat_per_record: DEFAULT_REPEAT_PER_RECORD,
        }
    }
}

impl VectorConfig {
    /// Initial capacity of the child values buffer.
    pub fn initial_child_allocation(&self) -> usize {
        self.initial_value_allocation
            .saturating_mul(self.repeat_per_record)
    }

    pub fn set_from_scalar(&mut self, name: &str, value: ScalarValue) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| VectorError::new(format!("Missing setting for '{name}'")))?;

        (func.set)(value, self)
    }

    pub fn get_as_scalar(&self, name: &str) -> Result<ScalarValue> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| VectorError::new(format!("Missing setting for '{name}'")))?;

        Ok((func.get)(self))
    }

    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = Self::default();
        let scalar = def_conf.get_as_scalar(name)?;
        self.set_from_scalar(name, scalar)
    }

    /// Names and descriptions of all settings.
    pub fn settings() -> impl Iterator<Item = (&'static str, &'static str)> {
        GET_SET_FUNCTIONS
            .iter()
            .map(|(name, funcs)| (*name, funcs.description))
    }
}

struct SettingFunctions {
    description: &'static str,
    set: fn(scalar: ScalarValue, conf: &mut VectorConfig) -> Result<()>,
    get: fn(conf: &VectorConfig) -> ScalarValue,
}

impl SettingFunctions {
    const fn new<S: VectorSetting>() -> Self {
        SettingFunctions {
            description: S::DESCRIPTION,
            set: S::set_from_scalar as _,
            get: S::get_as_scalar as _,
        }
    }
}

fn insert_setting<S: VectorSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<InitialValueAllocation>(&mut map);
    insert_setting::<RepeatPerRecord>(&mut map);

    map
});

pub trait VectorSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_scalar(scalar: ScalarValue, conf: &mut VectorConfig) -> Result<()>;
    fn get_as_scalar(conf: &VectorConfig) -> ScalarValue;
}

const MIN_INITIAL_VALUE_ALLOCATION: usize = 1;
const MAX_INITIAL_VALUE_ALLOCATION: usize = 1 << 24;

pub struct InitialValueAllocation;

impl InitialValueAllocation {
    pub fn validate_value(val: usize) -> Result<()> {
        if val < MIN_INITIAL_VALUE_ALLOCATION {
            return Err(VectorError::new(format!(
                "Initial value allocation cannot be less than {MIN_INITIAL_VALUE_ALLOCATION}"
            )));
        }

        if val > MAX_INITIAL_VALUE_ALLOCATION {
            return Err(VectorError::new(format!(
                "Initial value allocation cannot be greater than {MAX_INITIAL_VALUE_ALLOCATION}"
            )));
        }

        Ok(())
    }
}

impl VectorSetting for InitialValueAllocation {
    const NAME: &'static str = "initial_value_allocation";
    const DESCRIPTION: &'static str = "Number of rows to reserve on first allocation";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut VectorConfig) -> Result<()> {
        let val = scalar.try_as_usize()?;
        Self::validate_value(val)?;

        conf.initial_value_allocation = val;
        Ok(())
    }

    fn get_as_scalar(conf: &VectorConfig) -> ScalarValue {
        conf.initial_value_allocation.into()
    }
}

const MIN_REPEAT_PER_RECORD: usize = 1;
const MAX_REPEAT_PER_RECORD: usize = 1024;

pub struct RepeatPerRecord;

impl RepeatPerRecord {
    pub fn validate_value(val: usize) -> Result<()> {
        if val < MIN_REPEAT_PER_RECORD {
            return Err(VectorError::new(format!(
                "Repeat per record cannot be less than {MIN_REPEAT_PER_RECORD}"
            )));
        }

        if val > MAX_REPEAT_PER_RECORD {
            return Err(VectorError::new(format!(
                "Repeat per record cannot be greater than {MAX_REPEAT_PER_RECORD}"
            )));
        }

        Ok(())
    }
}

impl VectorSetting for RepeatPerRecord {
    const NAME: &'static str = "repeat_per_record";
    const DESCRIPTION: &'static str = "Expected number of child elements per list row";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut VectorConfig) -> Result<()> {
        let val = scalar.try_as_usize()?;
        Self::validate_value(val)?;

        conf.repeat_per_record = val;
        Ok(())
    }

    fn get_as_scalar(conf: &VectorConfig) -> ScalarValue {
        conf.repeat_per_record.into()
    }
}
