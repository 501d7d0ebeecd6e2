use std::time::Duration;

use mlg_workflow::{BoxedTask, WithRetries, WithTimeout, WorkflowRun};

use crate::activities::{Deploy, WaitForRollout};
use crate::ctx::ActivityCtx;

/// `Deploy` → `WaitForRollout`, shared by `CreateService` (steps 7-8) and `RedeployService`.
pub fn deploy_and_wait(service_id: String) -> BoxedTask<ActivityCtx, ()> {
    Box::new(
        WorkflowRun::new(format!("{service_id}-deploy"))
            .and_then(WithTimeout::on(
                Duration::from_secs(300),
                WithRetries::new(3, Duration::from_secs(10), Deploy { service_id }),
            ))
            .and_then(WithTimeout::on(
                Duration::from_secs(240),
                WithRetries::new(3, Duration::from_secs(5), WaitForRollout::new()),
            )),
    )
}
