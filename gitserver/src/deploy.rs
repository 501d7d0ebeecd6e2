use mlg_common::Error;
use tracing::{error, info};

use crate::repo::ChangedRef;

/// The subset of the deployment service facade the git server needs: starting a
/// deterministically-deduped redeploy for a service that just received a push. Defined
/// here (rather than depending on the `gateway`/`deployer` crates directly) so the
/// binary wiring the three processes together owns the only edge between them.
#[async_trait::async_trait]
pub trait RedeployTrigger: Send + Sync {
    /// Finds services with `(repo, branch, git_provider = "internal")` and starts a
    /// redeploy for each, deduped by `new_sha`. Returns the workflow IDs started (or
    /// deduped onto).
    async fn redeploy_from_internal_git_push(
        &self,
        repo_full_name: &str,
        branch: &str,
        new_sha: &str,
    ) -> Result<Vec<String>, Error>;
}

/// Diffs `before`/`after` ref snapshots and triggers a redeploy for each changed branch.
/// Grounded on the push-trigger fan-out: per-branch failures are logged and do not abort
/// the remaining branches, since the push itself has already succeeded server-side.
pub async fn trigger_deploys_for_push(
    trigger: &dyn RedeployTrigger,
    repo_full_name: &str,
    before: &crate::repo::RefSnapshot,
    after: &crate::repo::RefSnapshot,
) {
    let changes = crate::repo::diff_refs(before, after);
    if changes.is_empty() {
        return;
    }

    info!(repo = repo_full_name, branches = changes.len(), "detected ref changes after push");

    for change in &changes {
        match trigger
            .redeploy_from_internal_git_push(repo_full_name, &change.branch, &change.new_sha)
            .await
        {
            Ok(workflow_ids) => {
                for workflow_id in workflow_ids {
                    info!(
                        repo = repo_full_name,
                        branch = %change.branch,
                        sha = %change.new_sha,
                        %workflow_id,
                        "triggered redeploy"
                    );
                }
            }
            Err(err) => {
                error!(
                    repo = repo_full_name,
                    branch = %change.branch,
                    sha = %change.new_sha,
                    %err,
                    "failed to start redeploy workflow"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTrigger {
        calls: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait::async_trait]
    impl RedeployTrigger for RecordingTrigger {
        async fn redeploy_from_internal_git_push(
            &self,
            repo_full_name: &str,
            branch: &str,
            new_sha: &str,
        ) -> Result<Vec<String>, Error> {
            self.calls.lock().unwrap().push((repo_full_name.into(), branch.into(), new_sha.into()));
            Ok(vec![format!("wf-{new_sha}")])
        }
    }

    #[tokio::test]
    async fn fires_one_call_per_changed_branch() {
        let trigger = RecordingTrigger::default();
        let mut before = crate::repo::RefSnapshot::new();
        before.insert("refs/heads/main".into(), "aaa".into());
        let mut after = crate::repo::RefSnapshot::new();
        after.insert("refs/heads/main".into(), "bbb".into());
        after.insert("refs/heads/feature".into(), "ccc".into());

        trigger_deploys_for_push(&trigger, "alice/site", &before, &after).await;

        let calls = trigger.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn no_changes_means_no_calls() {
        let trigger = RecordingTrigger::default();
        let snap = crate::repo::RefSnapshot::new();

        trigger_deploys_for_push(&trigger, "alice/site", &snap, &snap).await;

        assert!(trigger.calls.lock().unwrap().is_empty());
    }
}
