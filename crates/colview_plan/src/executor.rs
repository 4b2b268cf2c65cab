use std::collections::VecDeque;
use std::fmt::Debug;

use colview_core::arrays::batch::Batch;
use colview_core::arrays::datatype::Schema;
use colview_core::buffer::buffer_manager::BufferManager;
use colview_error::{Result, VectorError};

/// A stream of batches sharing a single schema.
pub trait BatchStream<B: BufferManager>: Debug {
    fn schema(&self) -> &Schema;

    /// Pull the next batch, returning `None` once the stream is exhausted.
    fn next_batch(&mut self) -> Result<Option<Batch<B>>>;
}

/// An input made available to a plan.
#[derive(Debug)]
pub enum PlanInput<B: BufferManager> {
    /// A stream that the plan can reference by name.
    Named {
        name: String,
        stream: Box<dyn BatchStream<B>>,
    },
    /// A file-backed source.
    File { uri: String },
}

impl<B> PlanInput<B>
where
    B: BufferManager,
{
    pub fn named(name: impl Into<String>, stream: impl BatchStream<B> + 'static) -> Self {
        PlanInput::Named {
            name: name.into(),
            stream: Box::new(stream),
        }
    }
}

/// Executes serialized plans.
///
/// Batches in the returned stream are owned by the executor's buffer manager
/// until the consumer moves them out.
pub trait PlanExecutor<B: BufferManager>: Debug {
    fn execute(
        &self,
        plan: &[u8],
        inputs: Vec<PlanInput<B>>,
    ) -> Result<Box<dyn BatchStream<B>>>;
}

/// Batch stream over batches already in memory.
#[derive(Debug)]
pub struct MemoryBatchStream<B: BufferManager> {
    schema: Schema,
    batches: VecDeque<Batch<B>>,
}

impl<B> MemoryBatchStream<B>
where
    B: BufferManager,
{
    /// Create a stream, checking that every batch matches the schema.
    pub fn try_new(schema: Schema, batches: impl IntoIterator<Item = Batch<B>>) -> Result<Self> {
        let batches: VecDeque<_> = batches.into_iter().collect();
        for (idx, batch) in batches.iter().enumerate() {
            // Batches without columns only carry a row count.
            if batch.num_columns() == 0 {
                continue;
            }
            if batch.schema() != schema {
                return Err(
                    VectorError::schema_mismatch("Batch schema does not match stream schema")
                        .with_field("batch", idx),
                );
            }
        }

        Ok(MemoryBatchStream { schema, batches })
    }

    /// Create a stream using the schema of the first batch.
    pub fn try_from_batches(batches: impl IntoIterator<Item = Batch<B>>) -> Result<Self> {
        let batches: Vec<_> = batches.into_iter().collect();
        let schema = batches.first().map(|b| b.schema()).unwrap_or_default();
        Self::try_new(schema, batches)
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl<B> BatchStream<B> for MemoryBatchStream<B>
where
    B: BufferManager,
{
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next_batch(&mut self) -> Result<Option<Batch<B>>> {
        Ok(self.batches.pop_front())
    }
}
