use colview_core::buffer::buffer_manager::BufferManager;
use colview_error::{Result, ResultExt};
use tracing::debug;

use crate::executor::{PlanExecutor, PlanInput};
use crate::reader::BatchReader;

/// Runs serialized plans through an executor and hands back readers that
/// import results into this consumer's buffer manager.
///
/// The consumer allocates nothing itself. Readers and the batches they
/// produce are owned by the caller, so closing the consumer releases no
/// buffers.
#[derive(Debug)]
pub struct PlanConsumer<B: BufferManager, E> {
    executor: E,
    manager: B,
}

impl<B, E> PlanConsumer<B, E>
where
    B: BufferManager,
    E: PlanExecutor<B>,
{
    pub fn new(executor: E, manager: &B) -> Self {
        PlanConsumer {
            executor,
            manager: manager.clone(),
        }
    }

    pub fn manager(&self) -> &B {
        &self.manager
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Execute a plan that needs no inputs.
    pub fn run_query(&self, plan: &[u8]) -> Result<BatchReader<B>> {
        self.run_query_with_inputs(plan, Vec::new())
    }

    /// Execute a plan against the given inputs.
    ///
    /// Errors from the executor keep their kind. Rejected plans surface as
    /// plan errors carrying the executor's message.
    pub fn run_query_with_inputs(
        &self,
        plan: &[u8],
        inputs: Vec<PlanInput<B>>,
    ) -> Result<BatchReader<B>> {
        debug!(plan_bytes = plan.len(), inputs = inputs.len(), "running plan");

        let stream = self
            .executor
            .execute(plan, inputs)
            .context("Review plan definition")?;

        Ok(BatchReader::new(&self.manager, stream))
    }

    /// Close the consumer.
    ///
    /// Readers returned from this consumer remain usable.
    pub fn close(self) -> Result<()> {
        debug!("closing plan consumer");
        Ok(())
    }
}
