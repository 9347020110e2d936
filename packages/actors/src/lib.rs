//! Actor system for the task queue.
//!
//! This crate provides the handler registry, the queue drivers and the
//! Ractor-based worker pool, tied together by [`TaskQueue`].
//!
//! # Architecture
//!
//! - `HandlerRegistry` - One handler per job kind, filled at startup
//! - `QueueDriver` - Memory or SurrealDB backend behind one trait
//! - `WorkerPool` - Actor that claims jobs and bounds concurrent executions
//! - `TaskQueue` - Service owning the pool; enqueue, admin and shutdown
//!
//! # Usage
//!
//! ```ignore
//! use actors::{HandlerRegistry, TaskQueue};
//! use taskqueue_core::{OrderAccountingPayload, QueueConfig};
//!
//! let mut handlers = HandlerRegistry::new();
//! handlers.register::<OrderAccountingPayload, _>(|payload: OrderAccountingPayload| async move {
//!     post_entries(&payload.order_id).await?;
//!     Ok(())
//! });
//!
//! let queue = TaskQueue::memory(QueueConfig::from_env(), handlers).await?;
//! queue.enqueue(OrderAccountingPayload::new("order-1", "tenant-1")).await?;
//! queue.shutdown().await?;
//! ```

pub mod driver;
mod handler;
mod messages;
mod pool;
mod queue;
mod recovery;

pub use driver::{Backlog, DriverStats, MemoryDriver, QueueDriver, SurrealDriver};
pub use handler::{
    HandlerError, HandlerFuture, HandlerRegistry, HandlerResult, JobHandler, RegisteredPayload,
};
pub use messages::{PoolActivity, PoolMessage};
pub use pool::{PoolArgs, WorkerPool};
pub use queue::TaskQueue;
pub use recovery::recover_stranded_jobs;

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef};
