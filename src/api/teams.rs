use reqwest::Method;
use tracing::{debug, instrument};

use crate::api::{self, Http};
use crate::error::Result;
use crate::model::{Ruleset, Team, TeamForm, TeamRequest};

#[instrument(skip(http))]
pub(crate) async fn get_teams(http: &Http, ruleset: Option<Ruleset>) -> Result<Vec<Team>> {
    let query: Vec<(&str, String)> = ruleset.map(|r| ("mode", r.to_string())).into_iter().collect();
    let teams: Vec<Team> = api::get_json(http, "/api/private/teams", &query).await?;
    debug!(count = teams.len(), "fetched teams");
    Ok(teams)
}

#[instrument(skip(http))]
pub(crate) async fn get_team(http: &Http, team_id: u32) -> Result<Team> {
    api::get_json(http, &format!("/api/private/team/{team_id}"), &[]).await
}

#[instrument(skip(http))]
pub(crate) async fn create_team(http: &Http, form: &TeamForm) -> Result<Team> {
    api::send_json(http, Method::POST, "/api/private/team", form).await
}

#[instrument(skip(http))]
pub(crate) async fn update_team(http: &Http, team_id: u32, form: &TeamForm) -> Result<Team> {
    api::send_json(
        http,
        Method::PATCH,
        &format!("/api/private/team/{team_id}"),
        form,
    )
    .await
}

#[instrument(skip(http))]
pub(crate) async fn get_requests(http: &Http, team_id: u32) -> Result<Vec<TeamRequest>> {
    api::get_json(http, &format!("/api/private/team/{team_id}/requests"), &[]).await
}

#[instrument(skip(http))]
pub(crate) async fn request_join(http: &Http, team_id: u32) -> Result<()> {
    api::send_unit::<()>(
        http,
        Method::POST,
        &format!("/api/private/team/{team_id}/request"),
        None,
    )
    .await
}

#[instrument(skip(http))]
pub(crate) async fn accept_request(http: &Http, team_id: u32, user_id: u32) -> Result<()> {
    api::send_unit::<()>(
        http,
        Method::POST,
        &format!("/api/private/team/{team_id}/{user_id}/request"),
        None,
    )
    .await
}

#[instrument(skip(http))]
pub(crate) async fn reject_request(http: &Http, team_id: u32, user_id: u32) -> Result<()> {
    api::send_unit::<()>(
        http,
        Method::DELETE,
        &format!("/api/private/team/{team_id}/{user_id}/request"),
        None,
    )
    .await
}

/// Remove a member. Removing oneself is leaving the team.
#[instrument(skip(http))]
pub(crate) async fn remove_member(http: &Http, team_id: u32, user_id: u32) -> Result<()> {
    api::send_unit::<()>(
        http,
        Method::DELETE,
        &format!("/api/private/team/{team_id}/{user_id}"),
        None,
    )
    .await
}
