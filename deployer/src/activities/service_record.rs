use async_trait::async_trait;
use mlg_common::models::{BuildConfig, BuildPack, BuildStatus, EnvVar, GitProvider, RuntimeStatus, Service};
use mlg_common::Error;
use mlg_workflow::{Task, TaskResult};
use tracing::info;

use crate::ctx::ActivityCtx;

/// Step 1 of `CreateService` (§4.1.2): inserts the service row, carrying the workflow and
/// run IDs that must never be cleared afterwards.
pub struct CreateServiceRecord {
    pub service_id: String,
    pub user_id: String,
    pub project_id: String,
    pub name: String,
    pub repo: String,
    pub branch: String,
    pub provider: GitProvider,
    pub build_pack: BuildPack,
    pub build_config: BuildConfig,
    pub port: Option<u16>,
    pub env: Vec<EnvVar>,
    pub workflow_id: String,
    pub run_id: String,
}

#[async_trait]
impl Task<ActivityCtx> for CreateServiceRecord {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let service = Service {
            id: self.service_id.clone(),
            user_id: self.user_id.clone(),
            project_id: self.project_id.clone(),
            name: self.name.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            provider: self.provider,
            build_pack: self.build_pack,
            build_config: self.build_config.clone(),
            port: self.port,
            env: self.env.clone(),
            build_status: BuildStatus::Queued,
            runtime_status: RuntimeStatus::Stopped,
            error_message: None,
            commit_sha: None,
            fqdn: None,
            last_workflow_id: Some(self.workflow_id.clone()),
            last_run_id: Some(self.run_id.clone()),
            deleted: false,
        };

        match ctx.services.create(&service).await {
            Ok(()) => {
                info!(service_id = %self.service_id, "service record created");
                TaskResult::Done(())
            }
            Err(err) => TaskResult::Err(err),
        }
    }
}

/// Marks the service `building` at the start of a redeploy (§4.1.3).
pub struct MarkServiceBuilding {
    pub service_id: String,
}

#[async_trait]
impl Task<ActivityCtx> for MarkServiceBuilding {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        match ctx.services.update_build_status(&self.service_id, BuildStatus::Building).await {
            Ok(()) => TaskResult::Done(()),
            Err(err) => TaskResult::Err(err),
        }
    }
}

/// Step 9 of `CreateService` on the success path, and the final step of `RedeployService`.
pub struct MarkServiceRunning {
    pub service_id: String,
}

#[async_trait]
impl Task<ActivityCtx> for MarkServiceRunning {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let (fqdn, commit_sha) = {
            let scratch = ctx.scratch.lock().await;
            (
                scratch.fqdn.clone().unwrap_or_default(),
                scratch.commit_sha.clone().unwrap_or_default(),
            )
        };

        match ctx.services.mark_running(&self.service_id, &fqdn, &commit_sha).await {
            Ok(()) => {
                info!(service_id = %self.service_id, fqdn, "service marked running");
                TaskResult::Done(())
            }
            Err(err) => TaskResult::Err(err),
        }
    }
}

/// Step 9 of `CreateService` on the failure path: preserves the user-facing error
/// message. The workflow catches the triggering error itself (§4.1.2's closing
/// paragraph) — this activity never fails the run further.
pub struct MarkServiceFailed {
    pub service_id: String,
    pub error_message: String,
}

#[async_trait]
impl Task<ActivityCtx> for MarkServiceFailed {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        match ctx.services.mark_failed(&self.service_id, &self.error_message).await {
            Ok(()) => {
                info!(service_id = %self.service_id, error = %self.error_message, "service marked failed");
                TaskResult::Done(())
            }
            Err(err) => TaskResult::Err(err),
        }
    }
}

/// Final step of `DeleteService` (§4.1.4).
pub struct SoftDeleteServiceRow {
    pub service_id: String,
}

#[async_trait]
impl Task<ActivityCtx> for SoftDeleteServiceRow {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        match ctx.services.soft_delete(&self.service_id).await {
            Ok(()) => TaskResult::Done(()),
            Err(err) => TaskResult::Err(err),
        }
    }
}
