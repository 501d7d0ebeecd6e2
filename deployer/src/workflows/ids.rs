//! Workflow-ID formulas (§4.1.1). Kept separate from the workflow bodies themselves so
//! the facade that starts these workflows (in the `gateway` crate) can compute an ID
//! before ever touching an `ActivityCtx`.

/// `deploy-<user>-<repo>-<branch>`, start-fresh.
pub fn create_service_workflow_id(user: &str, repo: &str, branch: &str) -> String {
    format!("deploy-{user}-{repo}-{branch}")
}

/// `redeploy-<service-id>-<after-sha>` when the SHA is non-zero, else
/// `redeploy-<service-id>-<delivery-id>`, else `redeploy-<service-id>-<random>`.
/// `REJECT_DUPLICATE`: duplicate pushes collapse to one run.
pub fn redeploy_workflow_id(service_id: &str, after_sha: Option<&str>, delivery_id: Option<&str>) -> String {
    let is_zero_sha = |sha: &str| sha.is_empty() || sha.chars().all(|c| c == '0');
    match after_sha.filter(|sha| !is_zero_sha(sha)) {
        Some(sha) => format!("redeploy-{service_id}-{sha}"),
        None => match delivery_id.filter(|id| !id.is_empty()) {
            Some(id) => format!("redeploy-{service_id}-{id}"),
            None => format!("redeploy-{service_id}-{}", uuid::Uuid::new_v4()),
        },
    }
}

/// `delete-app-<service-id>`, start-fresh.
pub fn delete_service_workflow_id(service_id: &str) -> String {
    format!("delete-app-{service_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeploy_id_prefers_sha_over_delivery_id() {
        let id = redeploy_workflow_id("svc1", Some("abc123"), Some("dlv-1"));
        assert_eq!(id, "redeploy-svc1-abc123");
    }

    #[test]
    fn redeploy_id_falls_back_to_delivery_id_when_sha_is_zero() {
        let id = redeploy_workflow_id("svc1", Some("0000000000000000000000000000000000000000"), Some("dlv-1"));
        assert_eq!(id, "redeploy-svc1-dlv-1");
    }

    #[test]
    fn redeploy_id_falls_back_to_random_when_both_are_absent() {
        let a = redeploy_workflow_id("svc1", None, None);
        let b = redeploy_workflow_id("svc1", None, None);
        assert_ne!(a, b);
        assert!(a.starts_with("redeploy-svc1-"));
    }
}
