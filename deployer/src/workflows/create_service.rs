use std::time::Duration;

use async_trait::async_trait;
use mlg_common::models::{BuildConfig, BuildPack, EnvVar, GitProvider};
use mlg_common::Error;
use mlg_workflow::{BoxedTask, Task, TaskResult, WithRetries, WithTimeout, WorkflowRun};

use crate::activities::{
    BuildImage, CleanupSource, CloneRepository, CreateServiceRecord, ImageExists, MarkServiceFailed,
    MarkServiceRunning, ResolveBuildContext,
};
use crate::ctx::ActivityCtx;

use super::shared::deploy_and_wait;

pub struct CreateServiceInput {
    pub service_id: String,
    pub user_id: String,
    pub user_handle: String,
    pub project_id: String,
    pub name: String,
    pub repo: String,
    pub branch: String,
    pub provider: GitProvider,
    pub build_pack: BuildPack,
    pub build_config: BuildConfig,
    pub port: Option<u16>,
    pub env: Vec<EnvVar>,
    pub expected_commit_sha: Option<String>,
    pub workflow_id: String,
    pub run_id: String,
}

/// Builds the `CreateService` body (§4.1.2): nine steps, strictly ordered. Step 1's
/// failure propagates as a real workflow error (there is no row yet to mark failed);
/// steps 2-8's failures are caught by [`FinalizeCreateService`] and funneled through
/// `MarkServiceFailed` instead.
pub fn create_service_workflow(input: CreateServiceInput) -> BoxedTask<ActivityCtx, ()> {
    let service_id = input.service_id.clone();
    let workflow_id = input.workflow_id.clone();

    let rest: BoxedTask<ActivityCtx, ()> = Box::new(
        WorkflowRun::new(format!("{workflow_id}-build"))
            .and_then(WithTimeout::on(
                Duration::from_secs(600),
                WithRetries::new(
                    3,
                    Duration::from_secs(10),
                    CloneRepository {
                        repo: input.repo.clone(),
                        branch: input.branch.clone(),
                        provider: input.provider,
                        expected_commit_sha: input.expected_commit_sha.clone(),
                    },
                ),
            ))
            .and_then(WithTimeout::on(
                Duration::from_secs(120),
                WithRetries::new(
                    3,
                    Duration::from_secs(5),
                    ResolveBuildContext {
                        service_id: input.service_id.clone(),
                        user_handle: input.user_handle.clone(),
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
            .and_then(deploy_and_wait(input.service_id.clone())),
    );

    Box::new(
        WorkflowRun::new(workflow_id.clone())
            .and_then(WithTimeout::on(
                Duration::from_secs(120),
                WithRetries::new(
                    3,
                    Duration::from_secs(5),
                    CreateServiceRecord {
                        service_id: input.service_id.clone(),
                        user_id: input.user_id,
                        project_id: input.project_id,
                        name: input.name,
                        repo: input.repo,
                        branch: input.branch,
                        provider: input.provider,
                        build_pack: input.build_pack,
                        build_config: input.build_config,
                        port: input.port,
                        env: input.env,
                        workflow_id,
                        run_id: input.run_id,
                    },
                ),
            ))
            .and_then(FinalizeCreateService { rest: Some(rest), service_id }),
    )
}

/// Once `ImageExists` has run, `BuildImage` and `CleanupSource` are skipped entirely
/// when the tag was already present in the registry (§4.1.2 step 4).
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

/// Drives steps 2-8 to completion and catches whatever they yield: success flows into
/// `MarkServiceRunning`, any error (including a timed-out `Cancelled`) flows into
/// `MarkServiceFailed`. Either way this step itself never fails — the workflow always
/// reaches a terminal `Done`, matching §4.1.2's closing paragraph.
struct FinalizeCreateService {
    rest: Option<BoxedTask<ActivityCtx, ()>>,
    service_id: String,
}

#[async_trait]
impl Task<ActivityCtx> for FinalizeCreateService {
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

impl FinalizeCreateService {
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
