use std::collections::HashMap;
use std::sync::Arc;

use mlg_common::{Error, ErrorKind};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::task::{BoxedTask, TaskHandle};
use crate::worker::{TaskRouter, WithCtx};

/// Mirrors the workflow framework's reuse-policy contract from `SPEC_FULL.md` §4.1:
/// starting an already-started-or-completed workflow ID either collapses into the
/// existing run (`RejectDuplicate`) or always starts a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReusePolicy {
    /// Always start a new run; the caller guarantees the ID is otherwise unique
    /// (e.g. it embeds a random component).
    StartFresh,
    /// Treat a start against an ID already tracked as `already-started`: the caller
    /// gets back the existing run's ID/handle instead of a second run.
    RejectDuplicate,
}

struct RunState {
    run_id: String,
    handle: Option<TaskHandle>,
}

/// Tracks in-flight and completed workflow IDs so that `RejectDuplicate` starts can be
/// answered without a database lock table, per `SPEC_FULL.md`'s "Redeploy-from-push
/// deduplication" design note. Started runs stay in the table for the process lifetime;
/// the real workflow framework this stands in for also retains completed run records for
/// a retention window, which callers rely on for the same dedup guarantee.
#[derive(Clone)]
pub struct WorkflowEngine {
    router: TaskRouter<String>,
    runs: Arc<RwLock<HashMap<String, RunState>>>,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StartResult {
    pub workflow_id: String,
    pub run_id: String,
    /// Set only when this call actually started a new run (not when it deduped into an
    /// existing one) — callers can await it for completion notification.
    pub handle: Option<TaskHandle>,
}

/// Mints a fresh run ID. Exposed so a caller that must embed the run ID into a row
/// before the workflow starts (e.g. `CreateServiceRecord`) can generate one up front
/// and hand it to both the row and [`WorkflowEngine::start`].
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self {
            router: TaskRouter::default(),
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Starts `task` under `workflow_id` with caller-supplied `run_id` (callers that embed
    /// the run ID into a persisted row before the run completes, e.g. `CreateServiceRecord`,
    /// need to know it up front rather than have the engine mint one after the fact). On
    /// `RejectDuplicate` against an ID already present, returns the existing run's ID and
    /// no handle — the `already-started` condition treated as success at the caller
    /// (§4.1.1, §7 `conflict` kind); the supplied `run_id` is discarded in that case.
    pub async fn start<Ctx>(
        &self,
        workflow_id: impl Into<String>,
        reuse_policy: ReusePolicy,
        run_id: impl Into<String>,
        ctx: Ctx,
        task: BoxedTask<Ctx, ()>,
    ) -> Result<StartResult, Error>
    where
        Ctx: Clone + Send + Sync + 'static,
    {
        let workflow_id = workflow_id.into();

        if reuse_policy == ReusePolicy::RejectDuplicate {
            let runs = self.runs.read().await;
            if let Some(existing) = runs.get(&workflow_id) {
                info!(%workflow_id, "workflow already started; deduping");
                return Ok(StartResult {
                    workflow_id,
                    run_id: existing.run_id.clone(),
                    handle: None,
                });
            }
        }

        let run_id = run_id.into();
        let (task, handle) = crate::task::AndThenNotify::after(task);
        let routed: BoxedTask<(), ()> = Box::new(WithCtx::new(ctx, task));

        self.router
            .route(&workflow_id, routed)
            .await
            .map_err(|_| Error::from_kind(ErrorKind::Internal))?;

        self.runs.write().await.insert(
            workflow_id.clone(),
            RunState {
                run_id: run_id.clone(),
                handle: None,
            },
        );

        Ok(StartResult {
            workflow_id,
            run_id,
            handle: Some(handle),
        })
    }

    /// True if `workflow_id` has ever been started on this engine instance.
    pub async fn is_started(&self, workflow_id: &str) -> bool {
        self.runs.read().await.contains_key(workflow_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskResult, WorkflowRun};

    struct Noop;

    #[async_trait::async_trait]
    impl Task<()> for Noop {
        type Output = ();
        type Error = Error;

        async fn poll(&mut self, _ctx: ()) -> TaskResult<Self::Output, Self::Error> {
            TaskResult::Done(())
        }
    }

    #[tokio::test]
    async fn reject_duplicate_dedupes_to_existing_run() {
        let engine = WorkflowEngine::new();

        let task_a: BoxedTask<(), ()> = Box::new(WorkflowRun::new("redeploy-svc-sha1").and_then(Noop));
        let first = engine
            .start("redeploy-svc-sha1", ReusePolicy::RejectDuplicate, new_run_id(), (), task_a)
            .await
            .unwrap();
        assert!(first.handle.is_some());

        let task_b: BoxedTask<(), ()> = Box::new(WorkflowRun::new("redeploy-svc-sha1").and_then(Noop));
        let second = engine
            .start("redeploy-svc-sha1", ReusePolicy::RejectDuplicate, new_run_id(), (), task_b)
            .await
            .unwrap();

        assert_eq!(second.run_id, first.run_id);
        assert!(second.handle.is_none());
    }

    #[tokio::test]
    async fn start_fresh_always_creates_a_new_run() {
        let engine = WorkflowEngine::new();

        let task_a: BoxedTask<(), ()> = Box::new(WorkflowRun::new("deploy-u-r-main").and_then(Noop));
        let first = engine
            .start("deploy-u-r-main", ReusePolicy::StartFresh, new_run_id(), (), task_a)
            .await
            .unwrap();

        let task_b: BoxedTask<(), ()> = Box::new(WorkflowRun::new("deploy-u-r-main").and_then(Noop));
        let second = engine
            .start("deploy-u-r-main", ReusePolicy::StartFresh, new_run_id(), (), task_b)
            .await
            .unwrap();

        assert_ne!(first.run_id, second.run_id);
    }
}
