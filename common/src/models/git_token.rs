use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    Push,
    Pull,
}

/// Push/pull credential for the internal git server. The raw secret is never stored —
/// only its SHA-256 hash and an 8-char printable prefix used for lookup logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitToken {
    pub id: String,
    pub token_hash: [u8; 32],
    pub prefix: String,
    pub user_id: String,
    /// `None` means user-global: valid against any of the user's repos.
    pub repo_id: Option<String>,
    pub scopes: Vec<TokenScope>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl GitToken {
    pub fn has_scope(&self, scope: TokenScope) -> bool {
        self.scopes.contains(&scope)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// True iff this row authenticates a push against `repo_id`, per the data model
    /// invariant: non-revoked, non-expired, has the `push` scope, and either user-global
    /// or scoped to the requested repo.
    pub fn authorizes_push(&self, repo_id: &str, now: DateTime<Utc>) -> bool {
        !self.revoked
            && !self.is_expired(now)
            && self.has_scope(TokenScope::Push)
            && self.repo_id.as_deref().is_none_or(|r| r == repo_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(repo_id: Option<&str>, scopes: Vec<TokenScope>, revoked: bool) -> GitToken {
        GitToken {
            id: "tok1".into(),
            token_hash: [0u8; 32],
            prefix: "mlg_abcd".into(),
            user_id: "u1".into(),
            repo_id: repo_id.map(str::to_string),
            scopes,
            expires_at: None,
            revoked,
        }
    }

    #[test]
    fn global_token_authorizes_any_repo() {
        let t = token(None, vec![TokenScope::Push], false);
        assert!(t.authorizes_push("repoA", Utc::now()));
        assert!(t.authorizes_push("repoB", Utc::now()));
    }

    #[test]
    fn scoped_token_rejects_other_repo() {
        let t = token(Some("repoA"), vec![TokenScope::Push], false);
        assert!(t.authorizes_push("repoA", Utc::now()));
        assert!(!t.authorizes_push("repoB", Utc::now()));
    }

    #[test]
    fn revoked_or_missing_scope_rejected() {
        let revoked = token(None, vec![TokenScope::Push], true);
        assert!(!revoked.authorizes_push("repoA", Utc::now()));

        let pull_only = token(None, vec![TokenScope::Pull], false);
        assert!(!pull_only.authorizes_push("repoA", Utc::now()));
    }
}
