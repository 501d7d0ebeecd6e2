use std::time::Duration;

use async_trait::async_trait;
use mlg_common::Error;
use mlg_workflow::{BoxedTask, Task, TaskResult, WithRetries, WithTimeout, WorkflowRun};

use crate::activities::{
    CloneRepository, ImageExists, MarkServiceBuilding, MarkServiceFailed, MarkServiceRunning, ResolveBuildContext,
};
use crate::activities::{BuildImage, CleanupSource};
use crate::ctx::ActivityCtx;

use super::shared::deploy_and_wait;

pub struct RedeployServiceInput {
    pub service_id: String,
    pub user_handle: String,
    pub repo: String,
    pub branch: String,
    pub provider: mlg_common::models::GitProvider,
    pub expected_commit_sha: Option<String>,
}

/// Builds the `RedeployService` body (§4.1.3): `MarkServiceBuilding` → (the `BuildService`
/// child inlined as clone/resolve/probe/build/cleanup) → `Deploy` → `WaitForRollout` →
/// `MarkServiceRunning`. Environment mutation is not part of a redeploy — the existing
/// service row's `env` is reused verbatim by `ResolveBuildContext`.
pub fn redeploy_service_workflow(workflow_id: String, input: RedeployServiceInput) -> BoxedTask<ActivityCtx, ()> {
    let service_id = input.service_id.clone();

    let rest: BoxedTask<ActivityCtx, ()> = Box::new(
        WorkflowRun::new(format!("{workflow_id}-build"))
            .and_then(WithTimeout::on(
                Duration::from_secs(600),
                WithRetries::new(
                    3,
                    Duration::from_secs(10),
                    CloneRepository {
                        repo: input.repo,
                        branch: input.branch,
                        provider: input.provider,
                        expected_commit_sha: input.expected_commit_sha,
                    },
                ),
            ))
            .and_then(WithTimeout::on(
                Duration::from_secs(120),
                WithRetries::new(
                    3,
                    Duration::from_secs(5),
                    ResolveBuildContext {
                        service_id: service_id.clone(),
                        user_handle: input.user_handle,
                    },
                ),
            ))
            .and_then(WithTimeout::on(
                Duration::from_secs(60),
                WithRetries::new(3, Duration::from_secs(5), ImageExists),
            ))
            .and_then(SkipIfImageExists::new(WithTimeout::on(
                Duration::from_secs(1800),
                WithRetries::new(1, Duration::from_secs(1), BuildImage),
            )))
            .and_then(SkipIfImageExists::new(CleanupSource))
            .and_then(deploy_and_wait(service_id.clone())),
    );

    Box::new(
        WorkflowRun::new(workflow_id)
            .and_then(WithTimeout::on(
                Duration::from_secs(120),
                WithRetries::new(3, Duration::from_secs(5), MarkServiceBuilding { service_id: service_id.clone() }),
            ))
            .and_then(FinalizeRedeploy { rest: Some(rest), service_id }),
    )
}

struct SkipIfImageExists<T> {
    inner: T,
}

impl<T> SkipIfImageExists<T> {
    fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T> Task<ActivityCtx> for SkipIfImageExists<T>
where
    T: Task<ActivityCtx, Output = (), Error = Error> + Send,
{
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        if ctx.scratch.lock().await.image_already_exists {
            return TaskResult::Done(());
        }
        self.inner.poll(ctx).await
    }
}

struct FinalizeRedeploy {
    rest: Option<BoxedTask<ActivityCtx, ()>>,
    service_id: String,
}

#[async_trait]
impl Task<ActivityCtx> for FinalizeRedeploy {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let rest = self.rest.as_mut().expect("polled after completion");
        match rest.poll(ctx.clone()).await {
            TaskResult::Pending(()) => TaskResult::Pending(()),
            TaskResult::TryAgain => TaskResult::TryAgain,
            TaskResult::Done(()) => {
                self.rest = None;
                let mut mark_running = MarkServiceRunning { service_id: self.service_id.clone() };
                mark_running.poll(ctx).await
            }
            TaskResult::Cancelled => {
                self.rest = None;
                self.fail(ctx, "step exceeded its start-to-close timeout").await
            }
            TaskResult::Err(err) => {
                self.rest = None;
                self.fail(ctx, &err.to_string()).await
            }
        }
    }
}

impl FinalizeRedeploy {
    async fn fail(&self, ctx: ActivityCtx, message: &str) -> TaskResult<(), Error> {
        let mut mark_failed = MarkServiceFailed {
            service_id: self.service_id.clone(),
            error_message: message.to_string(),
        };
        match mark_failed.poll(ctx).await {
            TaskResult::Err(err) => TaskResult::Err(err),
            _ => TaskResult::Done(()),
        }
    }
}
