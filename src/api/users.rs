use tracing::{debug, instrument};

use crate::api::{self, Http};
use crate::error::Result;
use crate::model::{RankingKind, Rankings, Ruleset, Score, ScoreKind, User, UserSearch};

/// How a user is addressed in a profile URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Id(u32),
    Name(String),
}

impl UserRef {
    /// Usernames are percent-encoded so `/`, `?` or `#` stay inside the
    /// segment.
    fn path_segment(&self) -> String {
        match self {
            UserRef::Id(id) => id.to_string(),
            UserRef::Name(name) => format!("@{}", urlencoding::encode(name)),
        }
    }
}

impl From<u32> for UserRef {
    fn from(id: u32) -> Self {
        UserRef::Id(id)
    }
}

impl From<&str> for UserRef {
    /// Numeric strings are ids; anything else is a username.
    fn from(s: &str) -> Self {
        s.parse()
            .map(UserRef::Id)
            .unwrap_or_else(|_| UserRef::Name(s.trim_start_matches('@').to_string()))
    }
}

fn ruleset_suffix(ruleset: Option<Ruleset>) -> String {
    ruleset.map(|r| format!("/{r}")).unwrap_or_default()
}

#[instrument(skip(http))]
pub(crate) async fn get_me(http: &Http, ruleset: Option<Ruleset>) -> Result<User> {
    let path = format!("/api/v2/me{}", ruleset_suffix(ruleset));
    api::get_json(http, &path, &[]).await
}

#[instrument(skip(http))]
pub(crate) async fn get_user(http: &Http, user: &UserRef, ruleset: Option<Ruleset>) -> Result<User> {
    let path = format!(
        "/api/v2/users/{}{}",
        user.path_segment(),
        ruleset_suffix(ruleset)
    );
    let user: User = api::get_json(http, &path, &[]).await?;
    debug!(user_id = user.id, username = %user.username, "fetched user profile");
    Ok(user)
}

#[instrument(skip(http))]
pub(crate) async fn get_user_scores(
    http: &Http,
    user_id: u32,
    kind: ScoreKind,
    ruleset: Option<Ruleset>,
    limit: u32,
    offset: u32,
) -> Result<Vec<Score>> {
    let path = format!("/api/v2/users/{user_id}/scores/{kind}");
    let mut query = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
    if let Some(ruleset) = ruleset {
        query.push(("mode", ruleset.to_string()));
    }
    let scores: Vec<Score> = api::get_json(http, &path, &query).await?;
    debug!(count = scores.len(), user_id, %kind, "fetched user scores");
    Ok(scores)
}

#[instrument(skip(http))]
pub(crate) async fn get_rankings(
    http: &Http,
    ruleset: Ruleset,
    kind: RankingKind,
    country: Option<&str>,
    page: u32,
) -> Result<Rankings> {
    let path = format!("/api/v2/rankings/{ruleset}/{kind}");
    let mut query = vec![("page", page.max(1).to_string())];
    if let Some(country) = country {
        query.push(("country", country.to_uppercase()));
    }
    let rankings: Rankings = api::get_json(http, &path, &query).await?;
    debug!(count = rankings.ranking.len(), %ruleset, %kind, page, "fetched rankings");
    Ok(rankings)
}

#[instrument(skip(http))]
pub(crate) async fn search_users(http: &Http, query: &str, page: u32) -> Result<UserSearch> {
    #[derive(serde::Deserialize)]
    struct SearchResponse {
        user: UserSearch,
    }
    let params = [
        ("mode", "user".to_string()),
        ("query", query.to_string()),
        ("page", page.max(1).to_string()),
    ];
    let response: SearchResponse = api::get_json(http, "/api/v2/search", &params).await?;
    Ok(response.user)
}
