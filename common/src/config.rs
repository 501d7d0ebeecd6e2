use clap::Parser;

/// Configuration bundle read at process startup, shared by the `gateway`, `deployer` and
/// `gitserver` binaries. Every field also accepts an environment variable fallback, since
/// that is how these processes are actually run in production.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct ControlPlaneConfig {
    /// sqlite connection string for the services/projects/tokens database.
    #[clap(long, env = "MLG_DATABASE_URL", default_value = "sqlite::memory:")]
    pub database_url: String,

    /// Address the workflow engine's worker process polls tasks from.
    #[clap(long, env = "MLG_WORKFLOW_ADDRESS", default_value = "127.0.0.1:7790")]
    pub workflow_address: String,

    /// Task queue name workflows/activities are registered under.
    #[clap(long, env = "MLG_TASK_QUEUE", default_value = "deployments")]
    pub task_queue: String,

    /// Host of the internal container registry, e.g. `registry.internal:5000`.
    #[clap(long, env = "MLG_REGISTRY_HOST")]
    pub registry_host: String,

    /// `BUILDKIT_HOST`-style address of the BuildKit daemon.
    #[clap(long, env = "BUILDKIT_HOST", default_value = "tcp://127.0.0.1:1234")]
    pub buildkit_host: String,

    /// HTTP endpoint the build-log sidecar streams lines to.
    #[clap(long, env = "MLG_LOG_INGEST_URL")]
    pub log_ingest_url: String,

    /// Shared HMAC secret for `/webhooks/github`.
    #[clap(long, env = "MLG_GITHUB_WEBHOOK_SECRET")]
    pub github_webhook_secret: String,

    /// Shared HMAC secret for `/webhooks/internal-git`.
    #[clap(long, env = "MLG_INTERNAL_GIT_WEBHOOK_SECRET")]
    pub internal_git_webhook_secret: String,

    /// Filesystem root under which bare repositories are stored: `<root>/<owner>/<repo>.git`.
    #[clap(long, env = "MLG_REPOS_ROOT", default_value = "/var/lib/mlg/repos")]
    pub repos_root: std::path::PathBuf,

    /// Base domain auto-assigned FQDNs are minted under.
    #[clap(long, env = "MLG_BASE_DOMAIN", default_value = "apps.example.com")]
    pub base_domain: String,

    /// Address the git smart-HTTP server binds to.
    #[clap(long, env = "MLG_GITSERVER_ADDR", default_value = "0.0.0.0:8080")]
    pub gitserver_addr: String,

    /// Address the gateway (HTTP front + in-process workflow engine) binds to.
    #[clap(long, env = "MLG_GATEWAY_ADDR", default_value = "0.0.0.0:8090")]
    pub gateway_addr: String,

    /// Base URL the git server calls to trigger a redeploy after an internal git push,
    /// since the facade that starts workflows lives in the gateway process.
    #[clap(long, env = "MLG_GATEWAY_INTERNAL_URL", default_value = "http://127.0.0.1:8090")]
    pub gateway_internal_url: String,
}
