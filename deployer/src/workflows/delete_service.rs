use std::time::Duration;

use mlg_workflow::{BoxedTask, WithRetries, WithTimeout, WorkflowRun};

use crate::activities::{DeleteDns, DeleteFromOrchestrator, SoftDeleteServiceRow};
use crate::ctx::ActivityCtx;

pub struct DeleteServiceInput {
    pub service_id: String,
    pub namespace: String,
    pub service_name: String,
    pub fqdn: Option<String>,
}

/// `DeleteDNS` → `DeleteFromOrchestrator` → `SoftDeleteServiceRow` (§4.1.4), each 3×.
/// `DeleteDNS` failure blocks the rest of this primary path — unlike the custom-domain
/// detach flow, which never calls this workflow at all.
pub fn delete_service_workflow(workflow_id: String, input: DeleteServiceInput) -> BoxedTask<ActivityCtx, ()> {
    Box::new(
        WorkflowRun::new(workflow_id)
            .and_then(WithTimeout::on(
                Duration::from_secs(120),
                WithRetries::new(3, Duration::from_secs(5), DeleteDns { fqdn: input.fqdn }),
            ))
            .and_then(WithTimeout::on(
                Duration::from_secs(120),
                WithRetries::new(
                    3,
                    Duration::from_secs(5),
                    DeleteFromOrchestrator {
                        namespace: input.namespace,
                        service_name: input.service_name,
                    },
                ),
            ))
            .and_then(WithTimeout::on(
                Duration::from_secs(60),
                WithRetries::new(3, Duration::from_secs(5), SoftDeleteServiceRow { service_id: input.service_id }),
            )),
    )
}
