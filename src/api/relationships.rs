use reqwest::{Method, StatusCode};
use tracing::{debug, instrument};

use crate::api::{self, Http};
use crate::error::{PortalError, Result};
use crate::model::RelationshipStatus;

/// The server refuses to compare a user with themselves; recognise that
/// answer so callers can treat it as "own profile".
fn is_self_error(err: &PortalError) -> bool {
    match err {
        PortalError::UnexpectedStatus {
            status, message, ..
        } if *status == StatusCode::BAD_REQUEST || *status == StatusCode::UNPROCESSABLE_ENTITY => {
            message.as_deref().is_some_and(|m| {
                let m = m.to_lowercase();
                m.contains("yourself") || m.contains("self")
            })
        }
        _ => false,
    }
}

#[instrument(skip(http))]
pub(crate) async fn get_relationship(http: &Http, target_id: u32) -> Result<RelationshipStatus> {
    let path = format!("/api/private/relationship/check/{target_id}");
    match api::get_json::<RelationshipStatus>(http, &path, &[]).await {
        Ok(status) => {
            debug!(target_id, ?status, "fetched relationship");
            Ok(status)
        }
        Err(e) if is_self_error(&e) => Err(PortalError::SelfRelationship),
        Err(e) => Err(e),
    }
}

#[instrument(skip(http))]
pub(crate) async fn add_friend(http: &Http, target_id: u32) -> Result<()> {
    let path = format!("/api/v2/friends?target={target_id}");
    api::send_unit::<()>(http, Method::POST, &path, None).await
}

#[instrument(skip(http))]
pub(crate) async fn remove_friend(http: &Http, target_id: u32) -> Result<()> {
    let path = format!("/api/v2/friends/{target_id}");
    api::send_unit::<()>(http, Method::DELETE, &path, None).await
}

#[instrument(skip(http))]
pub(crate) async fn block(http: &Http, target_id: u32) -> Result<()> {
    let path = format!("/api/v2/blocks?target={target_id}");
    api::send_unit::<()>(http, Method::POST, &path, None).await
}

#[instrument(skip(http))]
pub(crate) async fn unblock(http: &Http, target_id: u32) -> Result<()> {
    let path = format!("/api/v2/blocks/{target_id}");
    api::send_unit::<()>(http, Method::DELETE, &path, None).await
}
