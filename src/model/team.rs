use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::Ruleset;
use super::user::UserCompact;

/// Team as embedded in a user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSummary {
    pub id: u32,
    pub name: String,
    pub short_name: String,
    pub flag_url: Option<String>,
}

/// Complete team page data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: u32,
    pub name: String,
    pub short_name: String,
    pub flag_url: Option<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub leader_id: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub playmode: Option<Ruleset>,
    #[serde(default)]
    pub members: Vec<UserCompact>,
}

/// A pending request to join a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRequest {
    pub user: UserCompact,
    pub team_id: u32,
    pub requested_at: Option<DateTime<Utc>>,
}

/// Fields accepted when creating or editing a team.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamForm {
    pub name: String,
    pub short_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playmode: Option<Ruleset>,
}
