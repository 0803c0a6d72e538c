use reqwest::Method;
use serde_json::json;
use tracing::{debug, instrument};

use crate::api::{self, Http};
use crate::error::Result;
use crate::model::{ChatChannel, ChatMessage, NewPrivateMessage};

#[instrument(skip(http))]
pub(crate) async fn get_channels(http: &Http) -> Result<Vec<ChatChannel>> {
    let channels: Vec<ChatChannel> = api::get_json(http, "/api/v2/chat/channels", &[]).await?;
    debug!(count = channels.len(), "fetched chat channels");
    Ok(channels)
}

/// Messages of a channel, optionally only those after `since`.
#[instrument(skip(http))]
pub(crate) async fn get_messages(
    http: &Http,
    channel_id: u32,
    since: Option<u64>,
) -> Result<Vec<ChatMessage>> {
    let query: Vec<(&str, String)> = since.map(|s| ("since", s.to_string())).into_iter().collect();
    api::get_json(
        http,
        &format!("/api/v2/chat/channels/{channel_id}/messages"),
        &query,
    )
    .await
}

#[instrument(skip(http, message))]
pub(crate) async fn send_message(
    http: &Http,
    channel_id: u32,
    message: &str,
    is_action: bool,
) -> Result<ChatMessage> {
    api::send_json(
        http,
        Method::POST,
        &format!("/api/v2/chat/channels/{channel_id}/messages"),
        &json!({ "message": message, "is_action": is_action }),
    )
    .await
}

#[instrument(skip(http, message))]
pub(crate) async fn create_pm(http: &Http, target_id: u32, message: &str) -> Result<NewPrivateMessage> {
    api::send_json(
        http,
        Method::POST,
        "/api/v2/chat/new",
        &json!({ "target_id": target_id, "message": message, "is_action": false }),
    )
    .await
}

#[instrument(skip(http))]
pub(crate) async fn mark_read(http: &Http, channel_id: u32, message_id: u64) -> Result<()> {
    api::send_unit::<()>(
        http,
        Method::PUT,
        &format!("/api/v2/chat/channels/{channel_id}/mark-as-read/{message_id}"),
        None,
    )
    .await
}
