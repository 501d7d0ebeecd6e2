use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A single environment binding. Kept as an ordered sequence (never a map) because
/// workflow bodies must not iterate collections in undefined order, and because the
/// build-time/runtime distinction changes how a variable is threaded into the build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub build_time: bool,
}

/// The strategy that turns a source tree into a container image. `DockerCompose` only
/// ever appears transiently during resolution, as a rejection, never as a persisted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum BuildPack {
    Auto,
    Dockerfile,
    Static,
    Railpack,
    /// Accepted as user input, normalized to `Railpack` before it is ever persisted.
    Nixpacks,
}

impl BuildPack {
    /// Canonicalizes the legacy `nixpacks` alias to `railpack`. `auto` is resolved
    /// elsewhere, during `ResolveBuildContext`, once the source tree is available.
    pub fn canonical(self) -> Self {
        match self {
            Self::Nixpacks => Self::Railpack,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum GitProvider {
    Github,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, sqlx::Type)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum BuildStatus {
    Queued,
    Building,
    Success,
    Failed,
}

impl Default for BuildStatus {
    fn default() -> Self {
        Self::Queued
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, sqlx::Type)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum RuntimeStatus {
    Running,
    Stopped,
    Exited,
}

impl Default for RuntimeStatus {
    fn default() -> Self {
        Self::Stopped
    }
}

/// Build configuration: the six inputs (alongside the commit SHA) that the build-tag
/// derivation folds together. An all-default config is the "legacy" empty config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub root_directory: Option<String>,
    #[serde(default)]
    pub dockerfile_path: Option<String>,
    #[serde(default)]
    pub publish_directory: Option<String>,
    #[serde(default)]
    pub build_command: Option<String>,
    #[serde(default)]
    pub start_command: Option<String>,
}

impl BuildConfig {
    pub fn is_empty(&self) -> bool {
        self.root_directory.is_none()
            && self.dockerfile_path.is_none()
            && self.publish_directory.is_none()
            && self.build_command.is_none()
            && self.start_command.is_none()
    }
}

/// The deployable unit. See `SPEC_FULL.md` §3 for the full attribute rationale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub name: String,
    /// Canonical `<host>/<owner>/<name>` or `<owner>/<name>`.
    pub repo: String,
    pub branch: String,
    pub provider: GitProvider,
    pub build_pack: BuildPack,
    pub build_config: BuildConfig,
    pub port: Option<u16>,
    pub env: Vec<EnvVar>,

    pub build_status: BuildStatus,
    pub runtime_status: RuntimeStatus,
    pub error_message: Option<String>,
    pub commit_sha: Option<String>,
    pub fqdn: Option<String>,

    /// Never cleared, even on failure — retained for debugging per the data model invariant.
    pub last_workflow_id: Option<String>,
    pub last_run_id: Option<String>,

    pub deleted: bool,
}

impl Service {
    pub fn short_id() -> String {
        ulid::Ulid::new().to_string().to_lowercase()
    }
}
