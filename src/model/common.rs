use serde::{Deserialize, Serialize};

/// A game ruleset as the server names it, including the relax and autopilot
/// variants the server ranks separately.
#[derive(
    Default,
    Debug,
    Clone,
    Copy,
    Hash,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Ruleset {
    #[default]
    Osu,
    Taiko,
    Fruits,
    Mania,
    #[serde(rename = "osurx")]
    #[strum(serialize = "osurx")]
    OsuRelax,
    #[serde(rename = "osuap")]
    #[strum(serialize = "osuap")]
    OsuAutopilot,
    #[serde(rename = "taikorx")]
    #[strum(serialize = "taikorx")]
    TaikoRelax,
    #[serde(rename = "fruitsrx")]
    #[strum(serialize = "fruitsrx")]
    FruitsRelax,
}

impl Ruleset {
    /// The base ruleset a variant is played on.
    pub fn base(self) -> Ruleset {
        match self {
            Ruleset::OsuRelax | Ruleset::OsuAutopilot => Ruleset::Osu,
            Ruleset::TaikoRelax => Ruleset::Taiko,
            Ruleset::FruitsRelax => Ruleset::Fruits,
            other => other,
        }
    }
}

/// A country as attached to users and rankings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

/// Cover image of a user profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cover {
    pub url: Option<String>,
    pub custom_url: Option<String>,
    pub id: Option<String>,
}

/// Pagination cursor the server returns on list endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cursor {
    pub page: Option<u32>,
}
