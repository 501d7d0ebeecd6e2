use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, warn};

use crate::auth::{authorize_push, GitTokenStore};
use crate::deploy::{trigger_deploys_for_push, RedeployTrigger};
use crate::pktline::service_advertisement;
use crate::repo::{ensure_bare_repo, snapshot_refs};

#[derive(Clone)]
pub struct GitServerState {
    pub repos_root: PathBuf,
    pub token_store: Arc<dyn GitTokenStore>,
    pub redeploy_trigger: Arc<dyn RedeployTrigger>,
}

pub fn router(state: GitServerState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/:owner/:repo_git/info/refs", get(info_refs))
        .route("/:owner/:repo_git/git-upload-pack", post(upload_pack))
        .route("/:owner/:repo_git/git-receive-pack", post(receive_pack))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// The `.git` suffix is a literal in the route template (`{repo}.git`); axum 0.6 can't
/// mix a param and a literal in one path segment, so the full segment is captured and
/// split here instead.
fn strip_dot_git(repo_git: &str) -> Option<&str> {
    repo_git.strip_suffix(".git")
}

fn unauthorized() -> Response {
    let mut resp = StatusCode::UNAUTHORIZED.into_response();
    resp.headers_mut().insert(
        axum::http::header::WWW_AUTHENTICATE,
        HeaderValue::from_static(r#"Basic realm="git""#),
    );
    resp
}

#[derive(Deserialize)]
struct InfoRefsQuery {
    service: String,
}

async fn info_refs(
    State(state): State<GitServerState>,
    AxumPath((owner, repo_git)): AxumPath<(String, String)>,
    Query(query): Query<InfoRefsQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(repo) = strip_dot_git(&repo_git) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let full_name = format!("{owner}/{repo}");

    let service = match query.service.as_str() {
        "git-upload-pack" => "git-upload-pack",
        "git-receive-pack" => {
            if let Err(err) = authorize_push(state.token_store.as_ref(), &headers, &full_name).await {
                warn!(%full_name, %err, "rejected push-side info/refs");
                return unauthorized();
            }
            "git-receive-pack"
        }
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    let path = match ensure_bare_repo(&state.repos_root, &owner, repo).await {
        Ok(path) => path,
        Err(err) => {
            error!(%full_name, %err, "failed to ensure bare repo");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let output = Command::new("git")
        .arg(service.trim_start_matches("git-"))
        .arg("--stateless-rpc")
        .arg("--advertise-refs")
        .arg(&path)
        .output()
        .await;

    let output = match output {
        Ok(out) if out.status.success() => out,
        Ok(out) => {
            error!(%full_name, stderr = %String::from_utf8_lossy(&out.stderr), "advertise-refs failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(err) => {
            error!(%full_name, %err, "failed to spawn git");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut body = service_advertisement(service);
    body.extend_from_slice(&output.stdout);

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            format!("application/x-{service}-advertisement"),
        )],
        body,
    )
        .into_response()
}

async fn upload_pack(
    State(state): State<GitServerState>,
    AxumPath((owner, repo_git)): AxumPath<(String, String)>,
    body: Bytes,
) -> Response {
    let Some(repo) = strip_dot_git(&repo_git) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let path = match ensure_bare_repo(&state.repos_root, &owner, repo).await {
        Ok(path) => path,
        Err(err) => {
            error!(owner, repo, %err, "failed to ensure bare repo");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match run_stateless_rpc("upload-pack", &path, &body).await {
        Ok(output) if output.status.success() => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "application/x-git-upload-pack-result",
            )],
            output.stdout,
        )
            .into_response(),
        Ok(output) => {
            warn!(owner, repo, status = %output.status, stderr = %String::from_utf8_lossy(&output.stderr), "git upload-pack reported a failure");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            error!(owner, repo, %err, "failed to spawn git upload-pack");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn receive_pack(
    State(state): State<GitServerState>,
    AxumPath((owner, repo_git)): AxumPath<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(repo) = strip_dot_git(&repo_git) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let full_name = format!("{owner}/{repo}");

    if let Err(err) = authorize_push(state.token_store.as_ref(), &headers, &full_name).await {
        warn!(%full_name, %err, "rejected push");
        return unauthorized();
    }

    let path = match ensure_bare_repo(&state.repos_root, &owner, repo).await {
        Ok(path) => path,
        Err(err) => {
            error!(%full_name, %err, "failed to ensure bare repo");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let before = match snapshot_refs(&path).await {
        Ok(snap) => snap,
        Err(err) => {
            error!(%full_name, %err, "failed to snapshot refs before push");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let output = match run_stateless_rpc("receive-pack", &path, &body).await {
        Ok(output) => output,
        Err(err) => {
            error!(%full_name, %err, "failed to spawn git receive-pack");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !output.status.success() {
        warn!(%full_name, status = %output.status, stderr = %String::from_utf8_lossy(&output.stderr), "git receive-pack reported a failure");
        return (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/x-git-receive-pack-result")],
            output.stdout,
        )
            .into_response();
    }

    let stdout = output.stdout;

    let after = match snapshot_refs(&path).await {
        Ok(snap) => snap,
        Err(err) => {
            error!(%full_name, %err, "failed to snapshot refs after push");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    trigger_deploys_for_push(state.redeploy_trigger.as_ref(), &full_name, &before, &after).await;

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "application/x-git-receive-pack-result",
        )],
        stdout,
    )
        .into_response()
}

/// Runs `git <subcommand> --stateless-rpc <path>`, streaming `input` to stdin and
/// returning stdout. The server never writes into the bare repo directly — all ref
/// movement goes through this one primitive.
/// Runs `git <subcommand> --stateless-rpc` and returns its captured stdout along with
/// whether it exited zero. A non-zero exit is not itself an error here: `receive-pack`
/// reports pre-receive/update-hook rejections through its own pkt-line side-band inside
/// stdout, and the git client on the other end needs that body to know the push failed —
/// only a spawn/IO failure is a genuine server fault.
async fn run_stateless_rpc(subcommand: &str, path: &std::path::Path, input: &[u8]) -> Result<std::process::Output, mlg_common::Error> {
    let mut child = Command::new("git")
        .arg(subcommand)
        .arg("--stateless-rpc")
        .arg(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdin = child.stdin.take().expect("stdin requested above");
    let input = input.to_vec();
    let writer = tokio::spawn(async move {
        let _ = stdin.write_all(&input).await;
    });

    let output = child.wait_with_output().await?;
    let _ = writer.await;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_dot_git_suffix() {
        assert_eq!(strip_dot_git("site.git"), Some("site"));
        assert_eq!(strip_dot_git("site"), None);
    }
}
