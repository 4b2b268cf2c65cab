use colview_core::arrays::batch::Batch;
use colview_core::arrays::datatype::Schema;
use colview_core::buffer::buffer_manager::BufferManager;
use colview_error::{Result, ResultExt};
use tracing::trace;

use crate::executor::BatchStream;

/// Reads batches out of an executor stream, moving each batch's buffers into
/// the reader's buffer manager.
///
/// Batches returned from the reader belong to the caller.
#[derive(Debug)]
pub struct BatchReader<B: BufferManager> {
    manager: B,
    stream: Box<dyn BatchStream<B>>,
    batches_read: usize,
    rows_read: usize,
    finished: bool,
}

impl<B> BatchReader<B>
where
    B: BufferManager,
{
    pub fn new(manager: &B, stream: Box<dyn BatchStream<B>>) -> Self {
        BatchReader {
            manager: manager.clone(),
            stream,
            batches_read: 0,
            rows_read: 0,
            finished: false,
        }
    }

    pub fn schema(&self) -> &Schema {
        self.stream.schema()
    }

    pub fn manager(&self) -> &B {
        &self.manager
    }

    pub fn batches_read(&self) -> usize {
        self.batches_read
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Import the next batch, returning `None` once the stream is exhausted.
    pub fn next_batch(&mut self) -> Result<Option<Batch<B>>> {
        if self.finished {
            return Ok(None);
        }

        let mut batch = match self.stream.next_batch()? {
            Some(batch) => batch,
            None => {
                self.finished = true;
                trace!(
                    batches = self.batches_read,
                    rows = self.rows_read,
                    "batch reader finished"
                );
                return Ok(None);
            }
        };

        let imported = batch
            .transfer_to(&self.manager)
            .context("Failed to import batch")?;

        self.batches_read += 1;
        self.rows_read += imported.num_rows();

        Ok(Some(imported))
    }
}

impl<B> Iterator for BatchReader<B>
where
    B: BufferManager,
{
    type Item = Result<Batch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

#[cfg(test)]
mod tests {
    use colview_core::arrays::flat::FlatVector;
    use colview_core::arrays::physical_type::PhysicalI32;
    use colview_core::buffer::buffer_manager::TrackedBufferManager;

    use super::*;
    use crate::executor::MemoryBatchStream;

    #[test]
    fn imports_into_reader_manager() {
        logutil::init_test();

        let engine = TrackedBufferManager::new();
        let client = TrackedBufferManager::new();

        let batches = (0..2).map(|i| {
            let col = FlatVector::try_from_values::<PhysicalI32>("a", &engine, &[Some(i), None])
                .unwrap();
            Batch::try_new([col.into()]).unwrap()
        });
        let stream = MemoryBatchStream::try_from_batches(batches).unwrap();
        assert!(engine.allocated_bytes() > 0);

        let mut reader = BatchReader::new(&client, Box::new(stream));
        let batches: Vec<_> = reader.by_ref().collect::<Result<_>>().unwrap();

        assert_eq!(2, batches.len());
        assert_eq!(2, reader.batches_read());
        assert_eq!(4, reader.rows_read());
        assert_eq!(0, engine.allocated_bytes());
        assert!(client.allocated_bytes() > 0);

        drop(batches);
        assert_eq!(0, client.allocated_bytes());
        assert!(reader.next_batch().unwrap().is_none());
    }
}
