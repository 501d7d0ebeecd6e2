pub mod registry;
pub mod task;
pub mod worker;

pub use registry::{new_run_id, ReusePolicy, StartResult, WorkflowEngine};
pub use task::{
    AndThenNotify, BoxedTask, Task, TaskHandle, TaskResult, WithRetries, WithTimeout, WorkflowRun,
    DEFAULT_HEARTBEAT_TIMEOUT, DEFAULT_TIMEOUT,
};
pub use worker::{TaskRouter, WithCtx, Worker};
