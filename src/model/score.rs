use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::Ruleset;

/// Which list of a user's scores to fetch.
#[derive(
    Default, Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, strum_macros::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum ScoreKind {
    #[default]
    Best,
    Recent,
    Firsts,
    Pinned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub id: u64,
    pub user_id: u32,
    pub accuracy: f64,
    pub max_combo: u32,
    pub pp: Option<f64>,
    pub rank: String,
    pub total_score: u64,
    pub ruleset_id: Option<u8>,
    pub mode: Option<Ruleset>,
    #[serde(default)]
    pub mods: Vec<ScoreMod>,
    pub ended_at: Option<DateTime<Utc>>,
    pub beatmap: Option<BeatmapCompact>,
    pub beatmapset: Option<BeatmapsetCompact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreMod {
    pub acronym: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatmapCompact {
    pub id: u32,
    pub version: String,
    pub difficulty_rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatmapsetCompact {
    pub id: u32,
    pub artist: String,
    pub title: String,
    pub creator: String,
}
