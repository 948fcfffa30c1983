use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::ProjectLocation;

/// An opened project as shown in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub location: ProjectLocation,
    pub display_name: String,
    /// Current branch, when the location is a repository
    pub branch: Option<String>,
    pub remote_url: Option<String>,
    pub opened_at: DateTime<Utc>,
}
