use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use mlg_common::Error;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::task::{BoxedTask, Task, TaskResult};

pub const WORKER_QUEUE_SIZE: usize = 2048;

/// Runs every task handed to it on its queue to completion, one at a time. Each entity
/// (here: each workflow run) gets its own `Worker`, so a slow or stuck run never blocks
/// another service's workflow — the isolation the concurrency model requires (§5:
/// "the engine may execute different runs of different services in parallel").
pub struct Worker {
    send: Option<Sender<BoxedTask>>,
    recv: Receiver<BoxedTask>,
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

impl Worker {
    pub fn new() -> Self {
        let (send, recv) = channel(WORKER_QUEUE_SIZE);
        Self {
            send: Some(send),
            recv,
        }
    }

    pub fn sender(&self) -> Sender<BoxedTask> {
        Sender::clone(self.send.as_ref().expect("worker has not started yet"))
    }

    /// Runs until the last sender is dropped. A worker never restarts once its queue is
    /// drained and abandoned.
    pub async fn start(mut self) -> Result<Self, Error> {
        let _ = self.send.take();
        debug!("starting workflow worker");

        while let Some(mut work) = self.recv.recv().await {
            loop {
                match work.poll(()).await {
                    TaskResult::Done(_) | TaskResult::Cancelled => break,
                    TaskResult::Pending(_) | TaskResult::TryAgain => continue,
                    TaskResult::Err(err) => {
                        warn!("workflow task failed: {err}");
                        break;
                    }
                }
            }
        }

        Ok(self)
    }
}

/// Routes a boxed task to a lazily-spawned, per-key worker. The key is a workflow ID
/// here rather than a project name, generalizing `gateway::worker::TaskRouter`.
#[derive(Clone)]
pub struct TaskRouter<K> {
    table: Arc<RwLock<HashMap<K, Sender<BoxedTask>>>>,
}

impl<K> Default for TaskRouter<K> {
    fn default() -> Self {
        Self {
            table: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K> TaskRouter<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub async fn route(&self, key: &K, task: BoxedTask) -> Result<(), SendError<BoxedTask>> {
        let mut table = self.table.write().await;
        if let Some(sender) = table.get(key) {
            sender.send(task).await
        } else {
            let worker = Worker::new();
            let sender = worker.sender();
            tokio::spawn(worker.start());

            let res = sender.send(task).await;
            table.insert(key.clone(), sender);
            res
        }
    }
}

/// Adapts a `Task<Ctx>` into a `Task<()>` by carrying its own context, so it can be
/// routed through a [`TaskRouter`] (whose workers always poll with `()`).
pub struct WithCtx<Ctx, T> {
    ctx: Ctx,
    inner: T,
}

impl<Ctx, T> WithCtx<Ctx, T> {
    pub fn new(ctx: Ctx, inner: T) -> Self {
        Self { ctx, inner }
    }
}

#[async_trait::async_trait]
impl<Ctx, T> Task<()> for WithCtx<Ctx, T>
where
    Ctx: Clone + Send + Sync + 'static,
    T: Task<Ctx, Output = (), Error = Error> + Send,
{
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, _ctx: ()) -> TaskResult<Self::Output, Self::Error> {
        self.inner.poll(self.ctx.clone()).await
    }
}
