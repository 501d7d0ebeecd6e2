use std::process::Stdio;

use async_trait::async_trait;
use mlg_common::models::GitProvider;
use mlg_common::{Error, ErrorKind};
use mlg_workflow::{Task, TaskResult};
use tokio::process::Command;
use tracing::{info, warn};

use crate::ctx::ActivityCtx;

/// Step 2 of `CreateService` (§4.1.2): fetches the specified ref into a fresh working
/// directory and records the resolved commit SHA. The internal git provider clones
/// directly from the on-disk bare repo the git server owns (read-only, per §5's shared
/// mutable state section); the GitHub provider clones over HTTPS.
pub struct CloneRepository {
    pub repo: String,
    pub branch: String,
    pub provider: GitProvider,
    pub expected_commit_sha: Option<String>,
}

#[async_trait]
impl Task<ActivityCtx> for CloneRepository {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let source_url = match self.provider {
            GitProvider::Github => format!("https://github.com/{}.git", self.repo),
            GitProvider::Internal => match ctx.internal_repos.get_by_full_name(&self.repo).await {
                Ok(Some(repo)) => repo.bare_path,
                Ok(None) => {
                    return TaskResult::Err(Error::custom(
                        ErrorKind::SourceMissing,
                        format!("no internal repo registered for {}", self.repo),
                    ))
                }
                Err(err) => return TaskResult::Err(err),
            },
        };

        let dest = match tempfile::Builder::new().prefix("mlg-build-").tempdir() {
            Ok(dir) => dir.into_path(),
            Err(err) => return TaskResult::Err(err.into()),
        };

        let clone_status = Command::new("git")
            .arg("clone")
            .arg("--branch")
            .arg(&self.branch)
            .arg("--depth")
            .arg("1")
            .arg(&source_url)
            .arg(&dest)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match clone_status {
            Ok(out) => out,
            Err(err) => return TaskResult::Err(err.into()),
        };

        if !output.status.success() {
            let _ = tokio::fs::remove_dir_all(&dest).await;
            return TaskResult::Err(Error::custom(
                ErrorKind::SourceMissing,
                format!(
                    "git clone of {source_url}@{} failed: {}",
                    self.branch,
                    String::from_utf8_lossy(&output.stderr)
                ),
            ));
        }

        let rev_parse = Command::new("git")
            .arg("-C")
            .arg(&dest)
            .arg("rev-parse")
            .arg("HEAD")
            .output()
            .await;

        let resolved_sha = match rev_parse {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
            Ok(out) => {
                return TaskResult::Err(Error::custom(
                    ErrorKind::SourceMissing,
                    format!("git rev-parse HEAD failed: {}", String::from_utf8_lossy(&out.stderr)),
                ))
            }
            Err(err) => return TaskResult::Err(err.into()),
        };

        if let Some(expected) = &self.expected_commit_sha {
            if !resolved_sha.starts_with(expected.as_str()) && !expected.starts_with(resolved_sha.as_str()) {
                let _ = tokio::fs::remove_dir_all(&dest).await;
                return TaskResult::Err(Error::custom(
                    ErrorKind::Conflict,
                    format!("resolved HEAD {resolved_sha} does not match expected commit {expected}"),
                ));
            }
        }

        info!(repo = %self.repo, branch = %self.branch, sha = %resolved_sha, "cloned repository");

        let mut scratch = ctx.scratch.lock().await;
        scratch.source_path = Some(dest);
        scratch.commit_sha = Some(resolved_sha);
        TaskResult::Done(())
    }
}

/// Step 6 of `CreateService`: best-effort removal of the working directory (1 attempt,
/// never blocks the rest of the workflow on failure).
pub struct CleanupSource;

#[async_trait]
impl Task<ActivityCtx> for CleanupSource {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let source_path = ctx.scratch.lock().await.source_path.clone();
        if let Some(path) = source_path {
            if let Err(err) = tokio::fs::remove_dir_all(&path).await {
                warn!(path = %path.display(), %err, "failed to clean up build source directory (best-effort, ignored)");
            }
        }
        TaskResult::Done(())
    }
}
