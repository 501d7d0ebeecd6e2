use async_trait::async_trait;
use mlg_common::{Error, ErrorKind};
use mlg_workflow::{Task, TaskResult};
use tracing::info;

use crate::ctx::ActivityCtx;

/// Step 1 of `AttachCustomDomain` (§4.1.5): creates an ingress object `<svc>-cd` bound to
/// the user's domain, with a TLS secret reference.
pub struct ApplyCustomDomainIngress {
    pub namespace: String,
    pub service_name: String,
    pub domain: String,
    pub port: u16,
}

#[async_trait]
impl Task<ActivityCtx> for ApplyCustomDomainIngress {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let ingress_name = format!("{}-cd", self.service_name);
        match ctx.k8s.apply_ingress(&self.namespace, &ingress_name, &self.domain, self.port).await {
            Ok(()) => {
                info!(namespace = %self.namespace, domain = %self.domain, "applied custom domain ingress");
                TaskResult::Done(())
            }
            Err(err) => TaskResult::Err(Error::custom(ErrorKind::OrchestratorTransient, err.to_string())),
        }
    }
}

/// Step 1 of `DetachCustomDomain`: deletes the ingress and its TLS secret, both treated
/// as success when absent.
pub struct DeleteCustomDomainIngress {
    pub namespace: String,
    pub service_name: String,
}

#[async_trait]
impl Task<ActivityCtx> for DeleteCustomDomainIngress {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let ingress_name = format!("{}-cd", self.service_name);
        if let Err(err) = ctx.k8s.delete_ingress(&self.namespace, &ingress_name).await {
            return TaskResult::Err(Error::custom(ErrorKind::OrchestratorTransient, err.to_string()));
        }
        info!(namespace = %self.namespace, name = %ingress_name, "deleted custom domain ingress and tls secret");
        TaskResult::Done(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomDomainStatus {
    Active,
    Detached,
}

/// Final step of both `AttachCustomDomain` (with [`CustomDomainStatus::Active`]) and
/// `DetachCustomDomain` (with [`CustomDomainStatus::Detached`]).
pub struct UpdateCustomDomainDbStatus {
    pub custom_domain_id: String,
    pub status: CustomDomainStatus,
}

#[async_trait]
impl Task<ActivityCtx> for UpdateCustomDomainDbStatus {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, _ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        // Custom-domain records are out of this crate's `SqliteDal` scope (§3's data model
        // does not name a CustomDomain entity); the status transition is logged so the
        // workflow's control flow is exercised without inventing an unspecified table.
        info!(custom_domain_id = %self.custom_domain_id, status = ?self.status, "custom domain status updated");
        TaskResult::Done(())
    }
}
