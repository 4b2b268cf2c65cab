use std::collections::HashMap;
use std::marker::PhantomData;

use colview_core::arrays::batch::Batch;
use colview_core::arrays::datatype::Schema;
use colview_core::buffer::buffer_manager::BufferManager;
use colview_error::{Result, VectorError};
use tracing::debug;

use crate::executor::{BatchStream, PlanExecutor, PlanInput};
use crate::plan::{ReadPlan, ReadSource};

/// Executor that runs read plans against named in-memory inputs.
///
/// Understands the JSON plan format in [`crate::plan`]. File-backed sources
/// are rejected.
#[derive(Debug)]
pub struct MemoryPlanExecutor<B: BufferManager> {
    _manager: PhantomData<B>,
}

impl<B> MemoryPlanExecutor<B>
where
    B: BufferManager,
{
    pub fn new() -> Self {
        MemoryPlanExecutor {
            _manager: PhantomData,
        }
    }
}

impl<B> Default for MemoryPlanExecutor<B>
where
    B: BufferManager,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<B> PlanExecutor<B> for MemoryPlanExecutor<B>
where
    B: BufferManager + 'static,
{
    fn execute(
        &self,
        plan: &[u8],
        inputs: Vec<PlanInput<B>>,
    ) -> Result<Box<dyn BatchStream<B>>> {
        let plan = ReadPlan::try_from_bytes(plan)?;

        let mut tables = HashMap::with_capacity(inputs.len());
        for input in inputs {
            match input {
                PlanInput::Named { name, stream } => {
                    if tables.insert(name.clone(), stream).is_some() {
                        return Err(VectorError::plan("Duplicate input name").with_field("name", name));
                    }
                }
                PlanInput::File { uri } => {
                    return Err(
                        VectorError::plan("File inputs are not supported").with_field("uri", uri),
                    );
                }
            }
        }

        let name = match plan.source {
            ReadSource::Table(name) => name,
            ReadSource::Files(uris) => {
                return Err(VectorError::plan("File sources are not supported")
                    .with_field("files", uris.join(", ")));
            }
        };

        let stream = tables
            .remove(&name)
            .ok_or_else(|| VectorError::plan("Missing named table").with_field("name", &name))?;

        debug!(table = %name, projection = ?plan.projection, "executing read plan");

        match plan.projection {
            Some(projection) => Ok(Box::new(ProjectStream::try_new(stream, projection)?)),
            None => Ok(stream),
        }
    }
}

/// Projects columns out of each batch of the inner stream.
#[derive(Debug)]
struct ProjectStream<B: BufferManager> {
    inner: Box<dyn BatchStream<B>>,
    projection: Vec<usize>,
    schema: Schema,
}

impl<B> ProjectStream<B>
where
    B: BufferManager,
{
    fn try_new(inner: Box<dyn BatchStream<B>>, projection: Vec<usize>) -> Result<Self> {
        let schema = inner
            .schema()
            .project(&projection)
            .map_err(|e| VectorError::plan_with_source("Invalid projection", Box::new(e)))?;

        Ok(ProjectStream {
            inner,
            projection,
            schema,
        })
    }
}

impl<B> BatchStream<B> for ProjectStream<B>
where
    B: BufferManager,
{
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next_batch(&mut self) -> Result<Option<Batch<B>>> {
        match self.inner.next_batch()? {
            Some(batch) if batch.num_columns() == 0 => Ok(Some(batch)),
            Some(batch) => Ok(Some(batch.project(&self.projection)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use colview_core::arrays::flat::FlatVector;
    use colview_core::arrays::physical_type::PhysicalI32;
    use colview_core::buffer::buffer_manager::NopBufferManager;
    use colview_error::ErrorKind;

    use super::*;
    use crate::executor::MemoryBatchStream;

    fn input(name: &str) -> PlanInput<NopBufferManager> {
        let a = FlatVector::try_from_values::<PhysicalI32>("a", &NopBufferManager, &[Some(1)])
            .unwrap();
        let b = FlatVector::try_from_values::<PhysicalI32>("b", &NopBufferManager, &[Some(2)])
            .unwrap();
        let batch = Batch::try_new([a.into(), b.into()]).unwrap();
        PlanInput::named(name, MemoryBatchStream::try_from_batches([batch]).unwrap())
    }

    #[test]
    fn read_with_projection() {
        let plan = ReadPlan::named_table("t").with_projection(&[1]).to_bytes().unwrap();
        let mut stream = MemoryPlanExecutor::new().execute(&plan, vec![input("t")]).unwrap();

        assert_eq!(1, stream.schema().num_fields());
        assert_eq!("b", stream.schema().fields[0].name);

        let batch = stream.next_batch().unwrap().unwrap();
        assert_eq!(1, batch.num_columns());
        assert!(stream.next_batch().unwrap().is_none());
    }

    #[test]
    fn missing_table() {
        let plan = ReadPlan::named_table("missing").to_bytes().unwrap();
        let err = MemoryPlanExecutor::new()
            .execute(&plan, vec![input("t")])
            .unwrap_err();
        assert_eq!(ErrorKind::Plan, err.kind());
        assert_eq!(Some("missing"), err.get_field("name"));
    }

    #[test]
    fn file_input_rejected() {
        let plan = ReadPlan::named_table("t").to_bytes().unwrap();
        let err = MemoryPlanExecutor::<NopBufferManager>::new()
            .execute(
                &plan,
                vec![PlanInput::File {
                    uri: "file:///tmp/a.parquet".to_string(),
                }],
            )
            .unwrap_err();
        assert_eq!(ErrorKind::Plan, err.kind());
    }

    #[test]
    fn file_source_rejected() {
        let plan = ReadPlan {
            source: ReadSource::Files(vec!["file:///tmp/a.parquet".to_string()]),
            projection: None,
        }
        .to_bytes()
        .unwrap();
        let err = MemoryPlanExecutor::<NopBufferManager>::new()
            .execute(&plan, Vec::new())
            .unwrap_err();
        assert_eq!(ErrorKind::Plan, err.kind());
    }

    #[test]
    fn bad_projection() {
        let plan = ReadPlan::named_table("t").with_projection(&[5]).to_bytes().unwrap();
        let err = MemoryPlanExecutor::new()
            .execute(&plan, vec![input("t")])
            .unwrap_err();
        assert_eq!(ErrorKind::Plan, err.kind());
    }
}
