use axum::headers::authorization::{Authorization, Basic};
use axum::headers::HeaderMapExt;
use axum::http::HeaderMap;
use chrono::Utc;
use mlg_backends::auth::hash_token;
use mlg_common::models::{GitToken, TokenScope};
use mlg_common::{Error, ErrorKind};
use sqlx::SqlitePool;

/// Looked up by SHA-256 hash of the presented raw token; implemented against sqlite in
/// production and mockable in tests.
#[async_trait::async_trait]
pub trait GitTokenStore: Send + Sync {
    async fn find_by_hash(&self, hash: [u8; 32]) -> Result<Option<GitToken>, Error>;
}

pub struct SqliteGitTokenStore {
    pool: SqlitePool,
}

impl SqliteGitTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: String,
    token_hash: Vec<u8>,
    prefix: String,
    user_id: String,
    repo_id: Option<String>,
    scopes: String,
    expires_at: Option<chrono::DateTime<Utc>>,
    revoked: bool,
}

impl TokenRow {
    fn into_model(self) -> GitToken {
        let scopes = self
            .scopes
            .split(',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse::<TokenScope>().ok())
            .collect();
        let mut hash = [0u8; 32];
        let len = self.token_hash.len().min(32);
        hash[..len].copy_from_slice(&self.token_hash[..len]);

        GitToken {
            id: self.id,
            token_hash: hash,
            prefix: self.prefix,
            user_id: self.user_id,
            repo_id: self.repo_id,
            scopes,
            expires_at: self.expires_at,
            revoked: self.revoked,
        }
    }
}

#[async_trait::async_trait]
impl GitTokenStore for SqliteGitTokenStore {
    async fn find_by_hash(&self, hash: [u8; 32]) -> Result<Option<GitToken>, Error> {
        let row: Option<TokenRow> =
            sqlx::query_as("SELECT id, token_hash, prefix, user_id, repo_id, scopes, expires_at, revoked FROM git_tokens WHERE token_hash = ?")
                .bind(&hash[..])
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(TokenRow::into_model))
    }
}

/// Extracts the password half of a `Basic` auth header; the username is ignored per
/// the protocol spec (the token itself identifies the account).
pub fn extract_presented_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Basic>>()
        .map(|auth| auth.0.password().to_string())
}

/// Validates a presented Basic-auth token against the store for a push to `repo_id`.
/// Returns [`ErrorKind::AuthDenied`] on any failure — missing header, unknown token,
/// revoked/expired/wrong-scope token.
pub async fn authorize_push(
    store: &dyn GitTokenStore,
    headers: &HeaderMap,
    repo_id: &str,
) -> Result<GitToken, Error> {
    let raw = extract_presented_token(headers).ok_or_else(|| Error::from_kind(ErrorKind::AuthDenied))?;
    let hash = hash_token(&raw);

    let token = store
        .find_by_hash(hash)
        .await?
        .ok_or_else(|| Error::from_kind(ErrorKind::AuthDenied))?;

    if token.authorizes_push(repo_id, Utc::now()) {
        Ok(token)
    } else {
        Err(Error::from_kind(ErrorKind::AuthDenied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    fn basic_header(user: &str, pass: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode(format!("{user}:{pass}"));
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        headers
    }

    #[test]
    fn extracts_password_ignoring_username() {
        let headers = basic_header("ignored", "mlg_abc123");
        assert_eq!(extract_presented_token(&headers).as_deref(), Some("mlg_abc123"));
    }

    #[test]
    fn missing_header_yields_none() {
        assert!(extract_presented_token(&HeaderMap::new()).is_none());
    }

    struct FakeStore(Option<GitToken>);

    #[async_trait::async_trait]
    impl GitTokenStore for FakeStore {
        async fn find_by_hash(&self, _hash: [u8; 32]) -> Result<Option<GitToken>, Error> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn authorize_push_rejects_when_no_header_present() {
        let store = FakeStore(None);
        let err = authorize_push(&store, &HeaderMap::new(), "repo1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthDenied);
    }

    #[tokio::test]
    async fn authorize_push_accepts_global_push_token() {
        let token = GitToken {
            id: "t1".into(),
            token_hash: hash_token("mlg_whatever"),
            prefix: "mlg_what".into(),
            user_id: "u1".into(),
            repo_id: None,
            scopes: vec![TokenScope::Push],
            expires_at: None,
            revoked: false,
        };
        let store = FakeStore(Some(token));
        let headers = basic_header("x", "mlg_whatever");
        assert!(authorize_push(&store, &headers, "repo1").await.is_ok());
    }
}
