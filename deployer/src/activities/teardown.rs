use async_trait::async_trait;
use mlg_common::{Error, ErrorKind};
use mlg_workflow::{Task, TaskResult};
use tracing::info;

use crate::ctx::ActivityCtx;

/// Step 1 of `DeleteService` (§4.1.4). Failure here blocks the rest of the primary
/// delete path — a leftover DNS record pointing at a decommissioned namespace is worse
/// than a stuck delete. The custom-domain detach flow does not use this activity.
pub struct DeleteDns {
    pub fqdn: Option<String>,
}

#[async_trait]
impl Task<ActivityCtx> for DeleteDns {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let Some(fqdn) = self.fqdn.clone() else {
            // Never assigned a domain (e.g. the build never reached Deploy) — nothing to delete.
            return TaskResult::Done(());
        };

        match ctx.dns.delete_record(&fqdn).await {
            Ok(()) => {
                info!(%fqdn, "deleted DNS record");
                TaskResult::Done(())
            }
            Err(err) => TaskResult::Err(Error::custom(ErrorKind::OrchestratorTransient, err.to_string())),
        }
    }
}

/// Step 2 of `DeleteService`: idempotent, `not-found` is success (enforced by the
/// `KubernetesClient` implementation itself, per §6).
pub struct DeleteFromOrchestrator {
    pub namespace: String,
    pub service_name: String,
}

#[async_trait]
impl Task<ActivityCtx> for DeleteFromOrchestrator {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        if let Err(err) = ctx.k8s.delete_deployment(&self.namespace, &self.service_name).await {
            return TaskResult::Err(Error::custom(ErrorKind::OrchestratorTransient, err.to_string()));
        }
        if let Err(err) = ctx.k8s.delete_ingress(&self.namespace, &self.service_name).await {
            return TaskResult::Err(Error::custom(ErrorKind::OrchestratorTransient, err.to_string()));
        }
        info!(namespace = %self.namespace, name = %self.service_name, "deleted from orchestrator");
        TaskResult::Done(())
    }
}
