use std::sync::Arc;

use axum::routing::post;
use axum::Router;

pub mod internal;
pub mod service;
pub mod webhooks;

use service::Service;

/// Shared state for every route this process serves: the deployment service facade and
/// the two webhook HMAC secrets. Constructed once in `main` and cheaply cloned per request
/// (everything inside is `Arc`-backed).
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
    pub github_webhook_secret: String,
    pub internal_git_webhook_secret: String,
}

/// Builds the gateway's HTTP surface: the two public webhook routes from §6, plus the
/// `gitserver`-only internal redeploy trigger route (see `internal`'s doc comment).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/github", post(webhooks::handle_github_webhook))
        .route("/webhooks/internal-git", post(webhooks::handle_internal_git_webhook))
        .route("/internal/redeploy-internal-git", post(internal::handle_redeploy_internal_git))
        .with_state(state)
}
