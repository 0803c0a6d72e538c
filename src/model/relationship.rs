use serde::{Deserialize, Serialize};

/// How the acting user and a target user relate, as reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipStatus {
    #[serde(default)]
    pub is_friend: bool,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub is_mutual: bool,
    #[serde(default)]
    pub follows_me: bool,
}
