//! JSON plan subset understood by the in-memory executor.
//!
//! A plan holds exactly one relation whose root reads a named table,
//! optionally projecting a subset of its columns:
//!
//! ```json
//! {"relations": [{"root": {"input": {"read": {
//!     "namedTable": {"names": ["orders"]},
//!     "projection": [0, 2]
//! }}}}]}
//! ```

use colview_error::{Result, VectorError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub relations: Vec<PlanRelation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRelation {
    pub root: RelRoot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelRoot {
    pub input: Rel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rel {
    Read(ReadRel),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub named_table: Option<NamedTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_files: Option<LocalFiles>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedTable {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFiles {
    pub items: Vec<FileItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    pub uri_file: String,
}

/// Where a read pulls its batches from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadSource {
    /// A named input stream. Multi-part names are joined with '.'.
    Table(String),
    Files(Vec<String>),
}

/// A validated single read with an optional projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPlan {
    pub source: ReadSource,
    pub projection: Option<Vec<usize>>,
}

impl ReadPlan {
    pub fn named_table(name: impl Into<String>) -> Self {
        ReadPlan {
            source: ReadSource::Table(name.into()),
            projection: None,
        }
    }

    pub fn with_projection(mut self, projection: &[usize]) -> Self {
        self.projection = Some(projection.to_vec());
        self
    }

    /// Parse and validate a serialized plan.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(VectorError::plan("Plan is empty"));
        }

        let plan: Plan = serde_json::from_slice(bytes)
            .map_err(|e| VectorError::plan_with_source("Failed to parse plan", Box::new(e)))?;

        let relation = match plan.relations.as_slice() {
            [relation] => relation,
            other => {
                return Err(VectorError::plan("Plan must contain exactly one relation")
                    .with_field("relations", other.len()));
            }
        };

        let Rel::Read(read) = &relation.root.input;
        let source = match (&read.named_table, &read.local_files) {
            (Some(table), None) => {
                if table.names.is_empty() || table.names.iter().any(|n| n.is_empty()) {
                    return Err(VectorError::plan("Named table has an empty name"));
                }
                ReadSource::Table(table.names.join("."))
            }
            (None, Some(files)) => ReadSource::Files(
                files.items.iter().map(|item| item.uri_file.clone()).collect(),
            ),
            (Some(_), Some(_)) => {
                return Err(VectorError::plan(
                    "Read relation has both a named table and local files",
                ));
            }
            (None, None) => return Err(VectorError::plan("Read relation has no source")),
        };

        Ok(ReadPlan {
            source,
            projection: read.projection.clone(),
        })
    }

    /// Serialize into the JSON plan format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let (named_table, local_files) = match &self.source {
            ReadSource::Table(name) => (
                Some(NamedTable {
                    names: name.split('.').map(str::to_string).collect(),
                }),
                None,
            ),
            ReadSource::Files(uris) => (
                None,
                Some(LocalFiles {
                    items: uris
                        .iter()
                        .map(|uri| FileItem {
                            uri_file: uri.clone(),
                        })
                        .collect(),
                }),
            ),
        };

        let plan = Plan {
            relations: vec![PlanRelation {
                root: RelRoot {
                    input: Rel::Read(ReadRel {
                        named_table,
                        local_files,
                        projection: self.projection.clone(),
                    }),
                },
            }],
        };

        serde_json::to_vec(&plan)
            .map_err(|e| VectorError::with_source("Failed to serialize plan", Box::new(e)))
    }
}
