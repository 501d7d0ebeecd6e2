use serde::{Deserialize, Serialize};

/// Record of a private repository served by the internal git subsystem. Full-name is
/// globally unique and the filesystem directory must match `bare_path` exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalRepo {
    pub id: String,
    pub user_id: String,
    /// `<username>/<repo>`.
    pub full_name: String,
    pub bare_path: String,
}

impl InternalRepo {
    pub fn owner(&self) -> &str {
        self.full_name.split('/').next().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.full_name.split('/').nth(1).unwrap_or_default()
    }
}
