use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::service::BuildStatus;

/// Immutable record of one workflow run. Used for history and log-query keys; the workflow
/// itself never reads this table back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub service_id: String,
    pub workflow_id: String,
    pub run_id: String,
    pub commit_sha: String,
    pub image_ref: Option<String>,
    pub status: BuildStatus,
    pub error_message: Option<String>,
    pub build_started_at: DateTime<Utc>,
    pub build_ended_at: Option<DateTime<Utc>>,
}
