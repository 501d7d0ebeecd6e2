use serde::{Deserialize, Serialize};

/// Tenant-scoped namespace for services. Every user has a `default` project created on
/// first access — see `SPEC_FULL.md` §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// URL-safe ref, used verbatim (after sanitization) as part of the Kubernetes namespace.
    pub ref_: String,
}

impl Project {
    pub const DEFAULT_NAME: &'static str = "default";

    pub fn default_for_user(user_id: &str) -> Self {
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            user_id: user_id.to_string(),
            name: Self::DEFAULT_NAME.to_string(),
            ref_: Self::DEFAULT_NAME.to_string(),
        }
    }
}
