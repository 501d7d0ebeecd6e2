use std::sync::Arc;

use clap::Parser;
use mlg_common::{ControlPlaneConfig, Error};
use mlg_gitserver::{router, GitServerState, HttpRedeployTrigger, SqliteGitTokenStore};
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = ControlPlaneConfig::parse();
    mlg_common::tracing::init("mlg_gitserver=debug,info");

    let pool = SqlitePoolOptions::new().connect(&config.database_url).await?;

    let state = GitServerState {
        repos_root: config.repos_root.clone(),
        token_store: Arc::new(SqliteGitTokenStore::new(pool)),
        redeploy_trigger: Arc::new(HttpRedeployTrigger::new(config.gateway_internal_url.clone())),
    };

    let addr = config
        .gitserver_addr
        .parse()
        .expect("MLG_GITSERVER_ADDR must be a valid socket address");

    info!(%addr, repos_root = %config.repos_root.display(), "starting git smart-HTTP server");

    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .await
        .map_err(|err| Error::custom(mlg_common::ErrorKind::Internal, err.to_string()))?;

    Ok(())
}
