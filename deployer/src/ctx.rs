use std::sync::Arc;

use mlg_common::models::{BuildConfig, BuildPack, EnvVar};
use mlg_common::ControlPlaneConfig;
use mlg_registry::RegistryClient;
use tokio::sync::Mutex;

use crate::clients::{BuildKitClient, BuildLogger, DnsClient, KubernetesClient};
use crate::dal::{DeploymentsDal, InternalReposDal, ProjectsDal, ServicesDal};

/// Values threaded between the steps of a single workflow run. A plain `Task<Ctx>` step
/// only gets `Ctx` back (never a typed return value from the previous step), so the steps
/// that need each other's output share this cell instead — the Rust analogue of the
/// typed-result chaining a real workflow framework's activity calls give you for free.
#[derive(Debug, Default, Clone)]
pub struct BuildScratch {
    pub source_path: Option<std::path::PathBuf>,
    pub commit_sha: Option<String>,
    pub build_pack: Option<BuildPack>,
    pub build_config: Option<BuildConfig>,
    pub namespace: Option<String>,
    pub service_name: Option<String>,
    pub port: Option<u16>,
    pub env: Vec<EnvVar>,
    pub image_ref: Option<String>,
    pub image_already_exists: bool,
    pub fqdn: Option<String>,
}

/// The bundle every `deployer` activity is written against. `Ctx: Clone` per
/// [`mlg_workflow::WorkflowRun`]'s bound, so everything here is `Arc`-wrapped; `scratch`
/// is the one piece of genuinely shared (not just shared-immutable) state.
#[derive(Clone)]
pub struct ActivityCtx {
    pub services: Arc<dyn ServicesDal>,
    pub projects: Arc<dyn ProjectsDal>,
    pub internal_repos: Arc<dyn InternalReposDal>,
    pub deployments: Arc<dyn DeploymentsDal>,
    pub registry: Arc<RegistryClient>,
    pub k8s: Arc<dyn KubernetesClient>,
    pub buildkit: Arc<dyn BuildKitClient>,
    pub dns: Arc<dyn DnsClient>,
    pub config: Arc<ControlPlaneConfig>,
    pub scratch: Arc<Mutex<BuildScratch>>,
}

impl ActivityCtx {
    pub fn new(
        services: Arc<dyn ServicesDal>,
        projects: Arc<dyn ProjectsDal>,
        internal_repos: Arc<dyn InternalReposDal>,
        deployments: Arc<dyn DeploymentsDal>,
        registry: Arc<RegistryClient>,
        k8s: Arc<dyn KubernetesClient>,
        buildkit: Arc<dyn BuildKitClient>,
        dns: Arc<dyn DnsClient>,
        config: Arc<ControlPlaneConfig>,
    ) -> Self {
        Self {
            services,
            projects,
            internal_repos,
            deployments,
            registry,
            k8s,
            buildkit,
            dns,
            config,
            scratch: Arc::new(Mutex::new(BuildScratch::default())),
        }
    }

    /// A fresh scratch pad for a new workflow run, sharing every long-lived client.
    pub fn for_new_run(&self) -> Self {
        Self {
            services: self.services.clone(),
            projects: self.projects.clone(),
            internal_repos: self.internal_repos.clone(),
            deployments: self.deployments.clone(),
            registry: self.registry.clone(),
            k8s: self.k8s.clone(),
            buildkit: self.buildkit.clone(),
            dns: self.dns.clone(),
            config: self.config.clone(),
            scratch: Arc::new(Mutex::new(BuildScratch::default())),
        }
    }
}
