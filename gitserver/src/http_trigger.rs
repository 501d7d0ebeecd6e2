use async_trait::async_trait;
use mlg_common::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::deploy::RedeployTrigger;

/// Calls the gateway process's internal redeploy endpoint. The facade that actually
/// starts workflows lives in the `gateway` binary, not here, since the workflow engine
/// this crate pack uses dispatches in-process — see `SPEC_FULL.md`'s process topology
/// decision in `DESIGN.md`.
pub struct HttpRedeployTrigger {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRedeployTrigger {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct RedeployRequest<'a> {
    repo_full_name: &'a str,
    branch: &'a str,
    new_sha: &'a str,
}

#[derive(Deserialize)]
struct RedeployResponse {
    workflow_ids: Vec<String>,
}

#[async_trait]
impl RedeployTrigger for HttpRedeployTrigger {
    async fn redeploy_from_internal_git_push(
        &self,
        repo_full_name: &str,
        branch: &str,
        new_sha: &str,
    ) -> Result<Vec<String>, Error> {
        let url = format!("{}/internal/redeploy-internal-git", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&RedeployRequest { repo_full_name, branch, new_sha })
            .send()
            .await
            .map_err(|err| Error::source(ErrorKind::OrchestratorTransient, err))?;

        if !response.status().is_success() {
            warn!(%url, status = %response.status(), "gateway rejected redeploy trigger");
            return Err(Error::custom(
                ErrorKind::OrchestratorTransient,
                format!("gateway returned {}", response.status()),
            ));
        }

        let parsed: RedeployResponse = response
            .json()
            .await
            .map_err(|err| Error::source(ErrorKind::OrchestratorTransient, err))?;

        Ok(parsed.workflow_ids)
    }
}
