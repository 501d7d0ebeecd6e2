use std::time::Duration;

use mlg_workflow::{BoxedTask, WithRetries, WithTimeout, WorkflowRun};

use crate::activities::{
    ApplyCustomDomainIngress, CustomDomainStatus, DeleteCustomDomainIngress, UpdateCustomDomainDbStatus,
};
use crate::ctx::ActivityCtx;

pub struct AttachCustomDomainInput {
    pub custom_domain_id: String,
    pub namespace: String,
    pub service_name: String,
    pub domain: String,
    pub port: u16,
}

/// `ApplyCustomDomainIngress` → `UpdateCustomDomainDBStatus(active)` (§4.1.5).
pub fn attach_custom_domain_workflow(workflow_id: String, input: AttachCustomDomainInput) -> BoxedTask<ActivityCtx, ()> {
    Box::new(
        WorkflowRun::new(workflow_id)
            .and_then(WithTimeout::on(
                Duration::from_secs(120),
                WithRetries::new(
                    3,
                    Duration::from_secs(5),
                    ApplyCustomDomainIngress {
                        namespace: input.namespace,
                        service_name: input.service_name,
                        domain: input.domain,
                        port: input.port,
                    },
                ),
            ))
            .and_then(WithTimeout::on(
                Duration::from_secs(60),
                WithRetries::new(
                    3,
                    Duration::from_secs(5),
                    UpdateCustomDomainDbStatus {
                        custom_domain_id: input.custom_domain_id,
                        status: CustomDomainStatus::Active,
                    },
                ),
            )),
    )
}

pub struct DetachCustomDomainInput {
    pub custom_domain_id: String,
    pub namespace: String,
    pub service_name: String,
}

/// Deletes the ingress and its TLS secret (both treated as success when absent) →
/// `UpdateCustomDomainDBStatus(detached)` (§4.1.5).
pub fn detach_custom_domain_workflow(workflow_id: String, input: DetachCustomDomainInput) -> BoxedTask<ActivityCtx, ()> {
    Box::new(
        WorkflowRun::new(workflow_id)
            .and_then(WithTimeout::on(
                Duration::from_secs(120),
                WithRetries::new(
                    3,
                    Duration::from_secs(5),
                    DeleteCustomDomainIngress {
                        namespace: input.namespace,
                        service_name: input.service_name,
                    },
                ),
            ))
            .and_then(WithTimeout::on(
                Duration::from_secs(60),
                WithRetries::new(
                    3,
                    Duration::from_secs(5),
                    UpdateCustomDomainDbStatus {
                        custom_domain_id: input.custom_domain_id,
                        status: CustomDomainStatus::Detached,
                    },
                ),
            )),
    )
}
