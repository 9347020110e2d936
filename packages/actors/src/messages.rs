//! Message types for actor communication.

use ractor::RpcReplyPort;

/// Messages for the [`WorkerPool`](crate::WorkerPool) actor.
#[derive(Debug)]
pub enum PoolMessage {
    /// Fill free slots with ready jobs.
    Pump,

    /// An execution finished, successfully or not.
    JobFinished,

    /// Stop claiming new jobs. Executions already running finish normally.
    BeginShutdown,

    /// Report in-flight and buffered work.
    GetActivity { reply: RpcReplyPort<PoolActivity> },
}

/// Snapshot of the pool's workload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolActivity {
    /// Handler executions in flight.
    pub active: usize,
    /// Jobs held by the driver, not started.
    pub queued: usize,
    /// Jobs waiting on a retry timer.
    pub delayed: usize,
    pub draining: bool,
}
