pub mod deployment;
pub mod git_token;
pub mod internal_repo;
pub mod project;
pub mod service;

pub use deployment::Deployment;
pub use git_token::{GitToken, TokenScope};
pub use internal_repo::InternalRepo;
pub use project::Project;
pub use service::{BuildConfig, BuildPack, BuildStatus, EnvVar, GitProvider, RuntimeStatus, Service};
