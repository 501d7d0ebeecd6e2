//! `/webhooks/github` and `/webhooks/internal-git` (§6): HMAC-verify the raw body, parse
//! a push event, strip `refs/heads/`, locate matching services by `(full_name, branch,
//! provider)`, and kick off a deduped redeploy for each. Any non-push event type (or a
//! signature that fails to verify) short-circuits before the body is even parsed for
//! GitHub; a missing signature is rejected outright, matching `internalgit.go`'s
//! `verifyGiteaSignature`.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use mlg_backends::auth::verify_hmac_signature;
use mlg_common::models::GitProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::service::Service;
use crate::AppState;

#[derive(Serialize)]
struct WebhookResponse {
    message: String,
    workflow_ids: Vec<String>,
}

impl WebhookResponse {
    fn ignored() -> Self {
        Self { message: "ignored".to_string(), workflow_ids: Vec::new() }
    }
}

#[derive(Deserialize)]
struct PushRepository {
    full_name: String,
}

#[derive(Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    ref_: String,
    after: String,
    repository: PushRepository,
}

fn branch_from_ref(ref_: &str) -> &str {
    ref_.strip_prefix("refs/heads/").unwrap_or(ref_)
}

pub async fn handle_github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !verify_hmac_signature(&state.github_webhook_secret, &body, signature) {
        warn!("github webhook signature verification failed");
        return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
    }

    let event = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if event != "push" {
        info!(event, "ignoring unhandled github event");
        return (StatusCode::OK, Json(WebhookResponse::ignored())).into_response();
    }

    let delivery_id = headers.get("X-GitHub-Delivery").and_then(|v| v.to_str().ok()).map(str::to_string);

    let payload: PushPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(%err, "failed to parse github push payload");
            return (StatusCode::BAD_REQUEST, "failed to parse payload").into_response();
        }
    };

    dispatch_push(
        &state.service,
        &payload.repository.full_name,
        branch_from_ref(&payload.ref_),
        &payload.after,
        delivery_id.as_deref(),
        GitProvider::Github,
    )
    .await
}

pub async fn handle_internal_git_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let signature = headers.get("X-Gitea-Signature").and_then(|v| v.to_str().ok()).unwrap_or_default();

    if signature.is_empty() || !verify_hmac_signature(&state.internal_git_webhook_secret, &body, signature) {
        warn!("internal git webhook signature verification failed");
        return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
    }

    let event = headers.get("X-Gitea-Event").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();

    if event != "push" {
        info!(event, "ignoring unhandled internal git event");
        return (StatusCode::OK, Json(WebhookResponse::ignored())).into_response();
    }

    let payload: PushPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(%err, "failed to parse internal git push payload");
            return (StatusCode::BAD_REQUEST, "failed to parse payload").into_response();
        }
    };

    dispatch_push(
        &state.service,
        &payload.repository.full_name,
        branch_from_ref(&payload.ref_),
        &payload.after,
        None,
        GitProvider::Internal,
    )
    .await
}

async fn dispatch_push(
    service: &Service,
    full_name: &str,
    branch: &str,
    after_sha: &str,
    delivery_id: Option<&str>,
    provider: GitProvider,
) -> Response {
    let matching = match service.find_services_by_repo_branch(full_name, branch, provider).await {
        Ok(services) => services,
        Err(err) => {
            warn!(%err, repo = full_name, branch, "failed to query services for push");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to query services").into_response();
        }
    };

    if matching.is_empty() {
        info!(repo = full_name, branch, "no services found for repo/branch");
        return (
            StatusCode::OK,
            Json(WebhookResponse { message: "no services found for this repo/branch".to_string(), workflow_ids: Vec::new() }),
        )
            .into_response();
    }

    let mut workflow_ids = Vec::new();
    for svc in matching {
        let result = match provider {
            GitProvider::Github => {
                service
                    .redeploy_from_github_push(&svc.id, &svc.user_id, Some(after_sha), delivery_id)
                    .await
            }
            GitProvider::Internal => {
                service
                    .redeploy_from_internal_git_push(&svc.id, &svc.user_id, Some(after_sha), delivery_id)
                    .await
            }
        };

        match result {
            Ok(workflow_id) => {
                info!(service_id = %svc.id, %workflow_id, "started redeploy from push");
                workflow_ids.push(workflow_id);
            }
            Err(err) => {
                warn!(service_id = %svc.id, %err, "failed to start redeploy workflow");
            }
        }
    }

    (
        StatusCode::OK,
        Json(WebhookResponse { message: "redeploy workflows started".to_string(), workflow_ids }),
    )
        .into_response()
}
