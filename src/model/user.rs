use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{Country, Cover, Cursor, Ruleset};
use super::team::TeamSummary;

/// A full user profile as returned by `/api/v2/users/{user}` and `/api/v2/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub username: String,
    pub avatar_url: String,
    pub country_code: String,
    pub country: Option<Country>,
    #[serde(default)]
    pub cover: Cover,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub is_supporter: bool,
    pub join_date: Option<DateTime<Utc>>,
    pub last_visit: Option<DateTime<Utc>>,
    pub playmode: Option<Ruleset>,
    pub page: Option<UserPage>,
    pub statistics: Option<UserStatistics>,
    pub rank_history: Option<RankHistory>,
    pub team: Option<TeamSummary>,
    #[serde(default)]
    pub previous_usernames: Vec<String>,
    pub follower_count: Option<u32>,
}

/// The BBCode "about me" page, raw and server-rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPage {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub raw: String,
}

/// Per-ruleset statistics of a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStatistics {
    #[serde(default)]
    pub pp: f64,
    pub global_rank: Option<u32>,
    pub country_rank: Option<u32>,
    #[serde(default)]
    pub ranked_score: u64,
    #[serde(default)]
    pub total_score: u64,
    #[serde(default)]
    pub hit_accuracy: f64,
    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub play_time: u64,
    #[serde(default)]
    pub maximum_combo: u32,
    #[serde(default)]
    pub grade_counts: GradeCounts,
    pub level: Option<Level>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradeCounts {
    #[serde(default)]
    pub ssh: u32,
    #[serde(default)]
    pub ss: u32,
    #[serde(default)]
    pub sh: u32,
    #[serde(default)]
    pub s: u32,
    #[serde(default)]
    pub a: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Level {
    pub current: u32,
    pub progress: u32,
}

/// Daily global rank history, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankHistory {
    pub mode: Ruleset,
    pub data: Vec<u32>,
}

impl RankHistory {
    /// Best (lowest) rank in the window, ignoring zero entries which mean
    /// "unranked that day".
    pub fn best(&self) -> Option<u32> {
        self.data.iter().copied().filter(|r| *r > 0).min()
    }
}

/// Compact user shape used inside lists (rankings, friends, team members).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCompact {
    pub id: u32,
    pub username: String,
    pub avatar_url: String,
    pub country_code: String,
    #[serde(default)]
    pub is_online: bool,
}

/// One row of a rankings page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    pub user: UserCompact,
    #[serde(flatten)]
    pub statistics: UserStatistics,
}

/// A page of a leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rankings {
    pub ranking: Vec<RankingEntry>,
    pub total: Option<u32>,
    /// Next page, absent on the last one.
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

/// What a leaderboard is ordered by.
#[derive(
    Default, Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, strum_macros::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum RankingKind {
    #[default]
    Performance,
    Score,
}

/// Result of `/api/v2/search` restricted to users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSearch {
    pub data: Vec<UserCompact>,
    pub total: u32,
}
