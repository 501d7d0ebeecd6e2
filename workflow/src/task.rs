use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use mlg_common::Error;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{error, trace, warn};

/// Default start-to-close timeout for a whole workflow run, absent a more specific
/// per-workflow override.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);
/// Activities must heartbeat within this window or their attempt is considered stuck.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

/// A single durable step. Activities and workflow-body steps alike implement this;
/// `Ctx` is typically an `Arc`-wrapped bundle of long-lived clients (registry, k8s,
/// buildkit, database) the step needs, passed by value since it is cheap to clone.
#[async_trait::async_trait]
pub trait Task<Ctx>: Send {
    type Output;
    type Error;

    async fn poll(&mut self, ctx: Ctx) -> TaskResult<Self::Output, Self::Error>;
}

#[async_trait::async_trait]
impl<Ctx, T> Task<Ctx> for Box<T>
where
    Ctx: Send + 'static,
    T: Task<Ctx> + ?Sized,
{
    type Output = T::Output;
    type Error = T::Error;

    async fn poll(&mut self, ctx: Ctx) -> TaskResult<Self::Output, Self::Error> {
        self.as_mut().poll(ctx).await
    }
}

#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub enum TaskResult<R, E> {
    /// More work remains; the engine will poll again.
    Pending(R),
    /// This step is finished.
    Done(R),
    /// Retry immediately (used by steps waiting on an external condition).
    TryAgain,
    /// The step's heartbeat/timeout budget was exhausted.
    Cancelled,
    /// The step failed; `E` carries the tagged error.
    Err(E),
}

impl<R, E> TaskResult<R, E> {
    pub fn ok(self) -> Option<R> {
        match self {
            Self::Pending(r) | Self::Done(r) => Some(r),
            _ => None,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Pending(_) => "pending",
            Self::Done(_) => "done",
            Self::TryAgain => "try again",
            Self::Cancelled => "cancelled",
            Self::Err(_) => "error",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Cancelled | Self::Err(_))
    }
}

pub type BoxedTask<Ctx = (), O = ()> = Box<dyn Task<Ctx, Output = O, Error = Error> + Send>;

/// Wraps a task with an overall start-to-close deadline, measured from the first poll.
/// Exceeding it yields `Cancelled` rather than looping forever — this is how activity
/// timeouts are enforced without a scheduler-level primitive.
pub struct WithTimeout<T> {
    inner: T,
    start: Option<Instant>,
    timeout: Duration,
}

impl<T> WithTimeout<T> {
    pub fn on(timeout: Duration, inner: T) -> Self {
        Self {
            inner,
            start: None,
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl<T, Ctx> Task<Ctx> for WithTimeout<T>
where
    Ctx: Send + 'static,
    T: Task<Ctx> + Send,
{
    type Output = T::Output;
    type Error = T::Error;

    async fn poll(&mut self, ctx: Ctx) -> TaskResult<Self::Output, Self::Error> {
        let start = *self.start.get_or_insert_with(Instant::now);

        if Instant::now() - start > self.timeout {
            warn!(
                timeout_secs = self.timeout.as_secs(),
                "task exceeded its start-to-close timeout"
            );
            return TaskResult::Cancelled;
        }

        self.inner.poll(ctx).await
    }
}

/// Wraps a single-attempt step with a fixed retry budget, the Rust stand-in for a
/// framework's declared per-activity `RetryPolicy` (§4.1.2's "3×, 2 min" columns): on
/// `Err` it sleeps a short backoff and reports `TryAgain` until attempts are exhausted,
/// at which point the wrapped error is surfaced to the workflow.
pub struct WithRetries<T> {
    inner: T,
    attempts_left: u32,
    backoff: Duration,
}

impl<T> WithRetries<T> {
    pub fn new(max_attempts: u32, backoff: Duration, inner: T) -> Self {
        assert!(max_attempts >= 1, "a step must get at least one attempt");
        Self {
            inner,
            attempts_left: max_attempts,
            backoff,
        }
    }
}

#[async_trait::async_trait]
impl<T, Ctx> Task<Ctx> for WithRetries<T>
where
    Ctx: Send + 'static,
    T: Task<Ctx, Output = (), Error = Error> + Send,
{
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: Ctx) -> TaskResult<Self::Output, Self::Error> {
        match self.inner.poll(ctx).await {
            TaskResult::Err(err) => {
                self.attempts_left = self.attempts_left.saturating_sub(1);
                if self.attempts_left == 0 || !err.retryable() {
                    error!(err = %err, "step failed, not retrying further");
                    TaskResult::Err(err)
                } else {
                    warn!(err = %err, attempts_left = self.attempts_left, "step failed, will retry");
                    sleep(self.backoff).await;
                    TaskResult::TryAgain
                }
            }
            other => other,
        }
    }
}

pub struct TaskHandle {
    rx: oneshot::Receiver<()>,
}

impl Future for TaskHandle {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|_| ())
    }
}

/// Fires a oneshot the moment the wrapped task reaches a terminal `TaskResult`, letting a
/// caller `.await` a [`TaskHandle`] for completion notification without polling.
pub struct AndThenNotify<T> {
    inner: T,
    notify: Option<oneshot::Sender<()>>,
}

impl<T> AndThenNotify<T> {
    pub fn after(task: T) -> (Self, TaskHandle) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                inner: task,
                notify: Some(tx),
            },
            TaskHandle { rx },
        )
    }
}

#[async_trait::async_trait]
impl<T, Ctx> Task<Ctx> for AndThenNotify<T>
where
    Ctx: Send + 'static,
    T: Task<Ctx> + Send,
{
    type Output = T::Output;
    type Error = T::Error;

    async fn poll(&mut self, ctx: Ctx) -> TaskResult<Self::Output, Self::Error> {
        let out = self.inner.poll(ctx).await;
        if out.is_done() {
            if let Some(notify) = self.notify.take() {
                let _ = notify.send(());
            }
        }
        out
    }
}

/// The maximum time a single step is allowed to sit idle mid-poll before a warning is
/// logged — the poll itself still runs to completion, this only affects observability.
pub const STEP_MAX_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// A durable sequence of steps run strictly in order, the way `CreateService` and its
/// sibling workflows are specified: no parallelism inside a run, and a crashed worker
/// resumes at the next unfinished step because each already-completed step has been
/// popped off the front of the queue and the remainder persisted by the caller.
pub struct WorkflowRun<Ctx> {
    pub workflow_id: String,
    tasks: VecDeque<BoxedTask<Ctx, ()>>,
}

impl<Ctx> WorkflowRun<Ctx>
where
    Ctx: Clone + Send + 'static,
{
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            tasks: VecDeque::new(),
        }
    }

    pub fn and_then<T>(mut self, task: T) -> Self
    where
        T: Task<Ctx, Output = (), Error = Error> + Send + 'static,
    {
        self.tasks.push_back(Box::new(task));
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> BoxedTask<Ctx, ()> {
        Box::new(WithTimeout::on(timeout, self))
    }
}

#[async_trait::async_trait]
impl<Ctx> Task<Ctx> for WorkflowRun<Ctx>
where
    Ctx: Clone + Send + 'static,
{
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: Ctx) -> TaskResult<Self::Output, Self::Error> {
        if self.tasks.is_empty() {
            return TaskResult::Done(());
        }

        let task = self.tasks.front_mut().expect("checked non-empty above");

        let idle = sleep(STEP_MAX_IDLE_TIMEOUT);
        let res = {
            let mut poll = task.poll(ctx.clone());
            tokio::select! {
                res = &mut poll => res,
                _ = idle => {
                    warn!(workflow_id = %self.workflow_id, "a workflow step has been running for a long time");
                    poll.await
                }
            }
        };

        trace!(workflow_id = %self.workflow_id, result = res.to_str(), "step result");

        match res {
            TaskResult::Done(()) => {
                self.tasks.pop_front();
                if self.tasks.is_empty() {
                    TaskResult::Done(())
                } else {
                    TaskResult::Pending(())
                }
            }
            TaskResult::Pending(()) => TaskResult::Pending(()),
            TaskResult::TryAgain => TaskResult::TryAgain,
            TaskResult::Cancelled => TaskResult::Cancelled,
            TaskResult::Err(err) => {
                error!(workflow_id = %self.workflow_id, err = %err, "workflow step failed");
                TaskResult::Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverEnding;

    #[async_trait::async_trait]
    impl Task<()> for NeverEnding {
        type Output = ();
        type Error = ();

        async fn poll(&mut self, _ctx: ()) -> TaskResult<Self::Output, Self::Error> {
            TaskResult::Pending(())
        }
    }

    #[tokio::test]
    async fn task_with_timeout_eventually_cancels() {
        let timeout = Duration::from_millis(50);
        let mut wrapped = WithTimeout::on(timeout, NeverEnding);

        let start = Instant::now();
        while let TaskResult::Pending(()) = wrapped.poll(()).await {
            assert!(Instant::now() - start <= timeout + Duration::from_secs(1));
        }

        assert_eq!(wrapped.poll(()).await, TaskResult::Cancelled);
    }

    struct Counting(u32);

    #[async_trait::async_trait]
    impl Task<()> for Counting {
        type Output = ();
        type Error = Error;

        async fn poll(&mut self, _ctx: ()) -> TaskResult<Self::Output, Self::Error> {
            if self.0 == 0 {
                TaskResult::Done(())
            } else {
                self.0 -= 1;
                TaskResult::Pending(())
            }
        }
    }

    #[tokio::test]
    async fn workflow_run_executes_steps_in_order_and_then_completes() {
        let mut run = WorkflowRun::new("wf-1")
            .and_then(Counting(0))
            .and_then(Counting(2));

        // first step completes immediately, second needs 3 polls
        let mut polls = 0;
        loop {
            match run.poll(()).await {
                TaskResult::Done(()) => break,
                TaskResult::Pending(()) => {
                    polls += 1;
                    assert!(polls < 10, "should finish well before 10 polls");
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert_eq!(polls, 3);
    }

    struct FailNTimes {
        remaining_failures: u32,
    }

    #[async_trait::async_trait]
    impl Task<()> for FailNTimes {
        type Output = ();
        type Error = Error;

        async fn poll(&mut self, _ctx: ()) -> TaskResult<Self::Output, Self::Error> {
            if self.remaining_failures == 0 {
                TaskResult::Done(())
            } else {
                self.remaining_failures -= 1;
                TaskResult::Err(Error::from_kind(mlg_common::ErrorKind::RegistryUnavailable))
            }
        }
    }

    #[tokio::test]
    async fn with_retries_succeeds_within_budget() {
        let mut step = WithRetries::new(3, Duration::from_millis(1), FailNTimes { remaining_failures: 2 });

        assert!(matches!(step.poll(()).await, TaskResult::TryAgain));
        assert!(matches!(step.poll(()).await, TaskResult::TryAgain));
        assert!(matches!(step.poll(()).await, TaskResult::Done(())));
    }

    #[tokio::test]
    async fn with_retries_surfaces_error_once_budget_exhausted() {
        let mut step = WithRetries::new(2, Duration::from_millis(1), FailNTimes { remaining_failures: 5 });

        assert!(matches!(step.poll(()).await, TaskResult::TryAgain));
        assert!(matches!(step.poll(()).await, TaskResult::Err(_)));
    }

    struct AlwaysFailNonRetryable;

    #[async_trait::async_trait]
    impl Task<()> for AlwaysFailNonRetryable {
        type Output = ();
        type Error = Error;

        async fn poll(&mut self, _ctx: ()) -> TaskResult<Self::Output, Self::Error> {
            TaskResult::Err(Error::from_kind(mlg_common::ErrorKind::BuildFailure))
        }
    }

    #[tokio::test]
    async fn with_retries_does_not_retry_non_retryable_kinds() {
        let mut step = WithRetries::new(5, Duration::from_millis(1), AlwaysFailNonRetryable);
        assert!(matches!(step.poll(()).await, TaskResult::Err(_)));
    }
}
