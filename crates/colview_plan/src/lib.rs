//! Consumer side of a plan-execution service.
//!
//! A serialized plan is handed to a [`executor::PlanExecutor`] and the
//! resulting batches are imported into buffers owned by the consumer.

pub mod consumer;
pub mod executor;
pub mod memory;
pub mod plan;
pub mod reader;
