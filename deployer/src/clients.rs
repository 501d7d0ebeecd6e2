use async_trait::async_trait;
use mlg_common::Error;
use tracing::info;

/// The rollout states the workflow distinguishes, per `SPEC_FULL.md` §4.1.2 step 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutStatus {
    InProgress,
    Finished,
    Failed,
    Cancelled,
}

/// Server-side-apply surface the `Deploy`/`WaitForRollout`/`DeleteService` activities need.
/// Declared as a trait — the real Kubernetes API client is an external collaborator outside
/// this system's scope, stated here only as the interface activities are written against.
#[async_trait]
pub trait KubernetesClient: Send + Sync {
    async fn apply_namespace(&self, namespace: &str) -> Result<(), Error>;
    async fn apply_deployment(
        &self,
        namespace: &str,
        name: &str,
        image_ref: &str,
        port: u16,
        env: &[(String, String)],
    ) -> Result<(), Error>;
    async fn apply_service(&self, namespace: &str, name: &str, port: u16) -> Result<(), Error>;
    async fn apply_ingress(&self, namespace: &str, name: &str, host: &str, port: u16) -> Result<(), Error>;

    /// Polls rollout status once; the workflow activity calls this repeatedly at a fixed
    /// interval per §4.1.2 step 8, not this trait.
    async fn rollout_status(&self, namespace: &str, name: &str) -> Result<RolloutStatus, Error>;
    /// The FQDN assigned by the default ingress, once known.
    async fn ingress_host(&self, namespace: &str, name: &str) -> Result<Option<String>, Error>;
    /// Up to the last `limit` non-empty log lines, each already truncated by the caller.
    async fn recent_logs(&self, namespace: &str, name: &str, limit: usize) -> Result<Vec<String>, Error>;

    /// `not-found` is success, per §6 "Kubernetes" contract.
    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), Error>;
    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<(), Error>;
}

/// One BuildKit invocation: source tree, target image ref, shared import/export cache.
pub struct BuildRequest<'a> {
    pub source_path: &'a std::path::Path,
    pub dockerfile_path: &'a std::path::Path,
    pub image_ref: &'a str,
    pub cache_ref: &'a str,
}

/// BuildKit is an external collaborator (§6); this is the stated interface the three
/// `BuildImage` flavors drive, not a real `buildctl`/gRPC client.
#[async_trait]
pub trait BuildKitClient: Send + Sync {
    async fn solve(&self, req: BuildRequest<'_>, logger: &dyn BuildLogger) -> Result<(), Error>;
}

/// Line-buffered build-log sink with fixed labels, per §6 "Log sidecar": both methods are
/// best-effort and never fail the activity that calls them.
pub trait BuildLogger: Send + Sync {
    fn log(&self, line: &str);
    fn flush(&self);
}

/// DNS record management for auto-assigned and custom-domain FQDNs (§6, §4.1.5); deletions
/// are idempotent — absent-already counts as success.
#[async_trait]
pub trait DnsClient: Send + Sync {
    async fn delete_record(&self, fqdn: &str) -> Result<(), Error>;
}

/// Minimal stand-ins used until this runs against a real cluster/registry/DNS provider.
/// Each logs what it would have done and reports success — enough to exercise the
/// workflow's control flow without a live dependency.
pub struct LoggingKubernetesClient;

#[async_trait]
impl KubernetesClient for LoggingKubernetesClient {
    async fn apply_namespace(&self, namespace: &str) -> Result<(), Error> {
        info!(namespace, "apply namespace");
        Ok(())
    }

    async fn apply_deployment(
        &self,
        namespace: &str,
        name: &str,
        image_ref: &str,
        port: u16,
        env: &[(String, String)],
    ) -> Result<(), Error> {
        info!(namespace, name, image_ref, port, vars = env.len(), "apply deployment");
        Ok(())
    }

    async fn apply_service(&self, namespace: &str, name: &str, port: u16) -> Result<(), Error> {
        info!(namespace, name, port, "apply service");
        Ok(())
    }

    async fn apply_ingress(&self, namespace: &str, name: &str, host: &str, port: u16) -> Result<(), Error> {
        info!(namespace, name, host, port, "apply ingress");
        Ok(())
    }

    async fn rollout_status(&self, namespace: &str, name: &str) -> Result<RolloutStatus, Error> {
        info!(namespace, name, "rollout status: finished");
        Ok(RolloutStatus::Finished)
    }

    async fn ingress_host(&self, namespace: &str, name: &str) -> Result<Option<String>, Error> {
        Ok(Some(format!("{name}.{namespace}.apps.example.com")))
    }

    async fn recent_logs(&self, _namespace: &str, _name: &str, _limit: usize) -> Result<Vec<String>, Error> {
        Ok(Vec::new())
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), Error> {
        info!(namespace, name, "delete deployment (not-found treated as success)");
        Ok(())
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<(), Error> {
        info!(namespace, name, "delete ingress (not-found treated as success)");
        Ok(())
    }
}

pub struct LoggingBuildKitClient;

#[async_trait]
impl BuildKitClient for LoggingBuildKitClient {
    async fn solve(&self, req: BuildRequest<'_>, logger: &dyn BuildLogger) -> Result<(), Error> {
        logger.log(&format!("solving image {} from {}", req.image_ref, req.source_path.display()));
        logger.flush();
        Ok(())
    }
}

pub struct LoggingDnsClient;

#[async_trait]
impl DnsClient for LoggingDnsClient {
    async fn delete_record(&self, fqdn: &str) -> Result<(), Error> {
        info!(fqdn, "delete DNS record (not-found treated as success)");
        Ok(())
    }
}

/// Streams lines to a log-ingest HTTP endpoint with fixed `{job,service,namespace}` labels.
/// Best-effort: failures are logged, never propagated, matching §6's `Log`/`Flush` contract.
pub struct HttpBuildLogger {
    client: reqwest::Client,
    url: String,
    service: String,
    namespace: String,
    buffer: std::sync::Mutex<Vec<String>>,
}

impl HttpBuildLogger {
    pub fn new(url: String, service: String, namespace: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            service,
            namespace,
            buffer: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl BuildLogger for HttpBuildLogger {
    fn log(&self, line: &str) {
        self.buffer.lock().unwrap().push(line.to_string());
    }

    fn flush(&self) {
        let lines = std::mem::take(&mut *self.buffer.lock().unwrap());
        if lines.is_empty() || self.url.is_empty() {
            return;
        }

        let body = serde_json::json!({
            "job": "build",
            "service": self.service,
            "namespace": self.namespace,
            "lines": lines,
        });
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            if let Err(err) = client.post(&url).json(&body).send().await {
                tracing::warn!(%err, "build log flush failed (best-effort, ignored)");
            }
        });
    }
}
