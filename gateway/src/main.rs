use std::sync::Arc;

use clap::Parser;
use mlg_common::{ControlPlaneConfig, Error};
use mlg_deployer::ctx::ActivityCtx;
use mlg_deployer::clients::{LoggingBuildKitClient, LoggingDnsClient, LoggingKubernetesClient};
use mlg_deployer::dal::SqliteDal;
use mlg_deployer::DeploymentFacade;
use mlg_gateway::{router, AppState};
use mlg_registry::RegistryClient;
use mlg_workflow::WorkflowEngine;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = ControlPlaneConfig::parse();
    mlg_common::tracing::init("mlg_gateway=debug,info");

    let pool = SqlitePoolOptions::new().connect(&config.database_url).await?;
    let dal = Arc::new(SqliteDal::new(pool));
    dal.ensure_schema().await?;

    let ctx = ActivityCtx::new(
        dal.clone(),
        dal.clone(),
        dal.clone(),
        dal.clone(),
        Arc::new(RegistryClient::new()),
        Arc::new(LoggingKubernetesClient),
        Arc::new(LoggingBuildKitClient),
        Arc::new(LoggingDnsClient),
        Arc::new(config.clone()),
    );

    let engine = Arc::new(WorkflowEngine::new());
    let facade = Arc::new(DeploymentFacade::new(engine, ctx));

    let state = AppState {
        service: facade,
        github_webhook_secret: config.github_webhook_secret.clone(),
        internal_git_webhook_secret: config.internal_git_webhook_secret.clone(),
    };

    let addr = config
        .gateway_addr
        .parse()
        .expect("MLG_GATEWAY_ADDR must be a valid socket address");

    info!(%addr, "starting gateway");

    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .await
        .map_err(|err| Error::custom(mlg_common::ErrorKind::Internal, err.to_string()))?;

    Ok(())
}
