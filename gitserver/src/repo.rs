use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use mlg_common::{Error, ErrorKind};
use tokio::process::Command;
use tracing::debug;

/// Resolves the on-disk path of a bare repository without touching the filesystem.
pub fn bare_path(repos_root: &Path, owner: &str, repo: &str) -> PathBuf {
    repos_root.join(owner).join(format!("{repo}.git"))
}

/// Creates the bare repository if it does not already exist. Idempotent: a repo with a
/// `HEAD` file present is left untouched.
pub async fn ensure_bare_repo(repos_root: &Path, owner: &str, repo: &str) -> Result<PathBuf, Error> {
    let path = bare_path(repos_root, owner, repo);

    if tokio::fs::metadata(path.join("HEAD")).await.is_ok() {
        return Ok(path);
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    debug!(path = %path.display(), "initializing bare repository");
    let output = Command::new("git")
        .arg("init")
        .arg("--bare")
        .arg(&path)
        .stdout(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(Error::custom(
            ErrorKind::Internal,
            format!(
                "git init --bare failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        ));
    }

    Ok(path)
}

/// Maps ref names (e.g. `refs/heads/main`) to commit SHAs.
pub type RefSnapshot = HashMap<String, String>;

/// Captures the current refs of a bare repo via `git for-each-ref`. An empty or
/// nonexistent repository yields an empty snapshot rather than an error.
pub async fn snapshot_refs(bare_path: &Path) -> Result<RefSnapshot, Error> {
    let output = Command::new("git")
        .arg("--git-dir")
        .arg(bare_path)
        .arg("for-each-ref")
        .arg("--format=%(refname) %(objectname)")
        .output()
        .await?;

    if !output.status.success() {
        return Ok(RefSnapshot::new());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut refs = RefSnapshot::new();
    for line in stdout.lines() {
        if let Some((name, sha)) = line.split_once(' ') {
            refs.insert(name.to_string(), sha.to_string());
        }
    }
    Ok(refs)
}

/// A ref that moved (or was created) between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedRef {
    pub name: String,
    pub branch: String,
    pub old_sha: Option<String>,
    pub new_sha: String,
}

/// Diffs two snapshots, considering only `refs/heads/*`. Deletions (present before,
/// absent after) are ignored — only new-or-updated branches trigger a redeploy.
pub fn diff_refs(before: &RefSnapshot, after: &RefSnapshot) -> Vec<ChangedRef> {
    let mut changes = Vec::new();
    for (name, new_sha) in after {
        let Some(branch) = name.strip_prefix("refs/heads/") else {
            continue;
        };
        let old_sha = before.get(name).cloned();
        if old_sha.as_deref() == Some(new_sha.as_str()) {
            continue;
        }
        changes.push(ChangedRef {
            name: name.clone(),
            branch: branch.to_string(),
            old_sha,
            new_sha: new_sha.clone(),
        });
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn ensure_bare_repo_is_idempotent() {
        let root = tempdir().unwrap();
        let path1 = ensure_bare_repo(root.path(), "alice", "site").await.unwrap();
        assert!(path1.join("HEAD").exists());

        let mtime_before = tokio::fs::metadata(path1.join("HEAD")).await.unwrap().modified().unwrap();
        let path2 = ensure_bare_repo(root.path(), "alice", "site").await.unwrap();
        let mtime_after = tokio::fs::metadata(path2.join("HEAD")).await.unwrap().modified().unwrap();

        assert_eq!(path1, path2);
        assert_eq!(mtime_before, mtime_after);
    }

    #[test]
    fn diff_ignores_non_heads_and_deletions() {
        let mut before = RefSnapshot::new();
        before.insert("refs/heads/main".into(), "aaa".into());
        before.insert("refs/heads/stale".into(), "bbb".into());

        let mut after = RefSnapshot::new();
        after.insert("refs/heads/main".into(), "ccc".into());
        after.insert("refs/tags/v1".into(), "ddd".into());
        // `stale` deleted: absent from `after`, must not show up as a change.

        let changes = diff_refs(&before, &after);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].branch, "main");
        assert_eq!(changes[0].old_sha.as_deref(), Some("aaa"));
        assert_eq!(changes[0].new_sha, "ccc");
    }

    #[test]
    fn diff_reports_new_branch_with_no_old_sha() {
        let before = RefSnapshot::new();
        let mut after = RefSnapshot::new();
        after.insert("refs/heads/feature".into(), "eee".into());

        let changes = diff_refs(&before, &after);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_sha, None);
    }
}
