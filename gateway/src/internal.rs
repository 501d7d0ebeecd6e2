//! The internal redeploy endpoint the `gitserver` process calls after an internal git
//! push, since the facade that starts workflows lives in this process (see
//! `SPEC_FULL.md`'s process-topology decision, recorded in `DESIGN.md`). Not part of the
//! spec's external interface — only the two processes in this deployment talk to it.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mlg_common::models::GitProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;

#[derive(Deserialize)]
pub struct RedeployRequest {
    repo_full_name: String,
    branch: String,
    new_sha: String,
}

#[derive(Serialize)]
pub struct RedeployResponse {
    workflow_ids: Vec<String>,
}

pub async fn handle_redeploy_internal_git(
    State(state): State<AppState>,
    Json(request): Json<RedeployRequest>,
) -> Response {
    let matching = match state
        .service
        .find_services_by_repo_branch(&request.repo_full_name, &request.branch, GitProvider::Internal)
        .await
    {
        Ok(services) => services,
        Err(err) => {
            warn!(%err, repo = %request.repo_full_name, branch = %request.branch, "failed to query services for internal push");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to query services").into_response();
        }
    };

    let mut workflow_ids = Vec::new();
    for svc in matching {
        match state
            .service
            .redeploy_from_internal_git_push(&svc.id, &svc.user_id, Some(&request.new_sha), None)
            .await
        {
            Ok(workflow_id) => {
                info!(service_id = %svc.id, %workflow_id, "started redeploy from internal git push");
                workflow_ids.push(workflow_id);
            }
            Err(err) => warn!(service_id = %svc.id, %err, "failed to start redeploy workflow"),
        }
    }

    (StatusCode::OK, Json(RedeployResponse { workflow_ids })).into_response()
}
