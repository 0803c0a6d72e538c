pub(crate) mod auth;
pub(crate) mod chat;
pub(crate) mod relationships;
pub(crate) mod settings;
pub(crate) mod teams;
pub(crate) mod users;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::session::TokenStore;

/// Everything an endpoint function needs: the HTTP client, where the API
/// lives, and the token store every request reads from.
pub(crate) struct Http {
    pub(crate) client: reqwest::Client,
    pub(crate) config: PortalConfig,
    pub(crate) tokens: Arc<dyn TokenStore>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl Http {
    pub(crate) fn new(
        client: reqwest::Client,
        config: PortalConfig,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            client,
            config,
            tokens,
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }
}

/// Send an authenticated request, refreshing the session once on 401.
///
/// `build` receives a builder that already has method, URL and bearer token
/// set; it may be called twice, so it must not move owned request state.
pub(crate) async fn execute<F>(http: &Http, method: Method, url: &Url, build: F) -> Result<Response>
where
    F: Fn(RequestBuilder) -> RequestBuilder,
{
    let used_token = http.tokens.access_token();
    let response = send(http, &method, url, used_token.as_deref(), &build).await?;
    if response.status() != StatusCode::UNAUTHORIZED {
        return check_status(url, response).await;
    }

    {
        let _guard = http.refresh_lock.lock().await;
        // Another request may have refreshed while we waited.
        if http.tokens.access_token() == used_token {
            let Some(refresh_token) = http.tokens.refresh_token() else {
                http.tokens.clear()?;
                return Err(PortalError::Unauthorized);
            };
            auth::refresh(http, &refresh_token).await?;
        }
    }

    let retry_token = http.tokens.access_token();
    let response = send(http, &method, url, retry_token.as_deref(), &build).await?;
    if response.status() == StatusCode::UNAUTHORIZED {
        warn!(url = %url, "still unauthorized after refresh, clearing session");
        http.tokens.clear()?;
        return Err(PortalError::SessionExpired);
    }
    check_status(url, response).await
}

async fn send<F>(
    http: &Http,
    method: &Method,
    url: &Url,
    token: Option<&str>,
    build: &F,
) -> Result<Response>
where
    F: Fn(RequestBuilder) -> RequestBuilder,
{
    debug!(%method, url = %url, "sending request");
    let mut request = http
        .client
        .request(method.clone(), url.clone())
        .header(reqwest::header::USER_AGENT, &http.config.user_agent);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    build(request).send().await.map_err(|e| PortalError::Http {
        url: url.to_string(),
        source: e,
    })
}

/// Turn a non-success response into [`PortalError::UnexpectedStatus`],
/// keeping whatever message the server sent.
pub(crate) async fn check_status(url: &Url, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body);
    debug!(url = %url, %status, ?message, "request failed");
    Err(PortalError::UnexpectedStatus {
        url: url.to_string(),
        status,
        message,
    })
}

/// Best-effort extraction of a human-readable message from an error body.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "error_description", "message", "error"]
        .iter()
        .filter_map(|key| value.get(key))
        .find_map(|v| match v {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            // FastAPI validation errors: [{"msg": ...}, ...]
            serde_json::Value::Array(items) => items
                .iter()
                .find_map(|i| i.get("msg").and_then(|m| m.as_str()))
                .map(str::to_string),
            _ => None,
        })
}

pub(crate) async fn read_json<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T> {
    let body = response.text().await.map_err(|e| PortalError::ResponseBody {
        url: url.to_string(),
        source: e,
    })?;
    serde_json::from_str(&body).map_err(|e| PortalError::Decode {
        url: url.to_string(),
        source: e,
    })
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Http,
    path: &str,
    query: &[(&str, String)],
) -> Result<T> {
    let url = http.config.endpoint(path)?;
    let response = execute(http, Method::GET, &url, |r| r.query(query)).await?;
    read_json(&url, response).await
}

pub(crate) async fn send_json<B, T>(
    http: &Http,
    method: Method,
    path: &str,
    body: &B,
) -> Result<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let url = http.config.endpoint(path)?;
    let response = execute(http, method, &url, |r| r.json(body)).await?;
    read_json(&url, response).await
}

/// Like [`send_json`] for endpoints that answer with an empty body.
pub(crate) async fn send_unit<B>(http: &Http, method: Method, path: &str, body: Option<&B>) -> Result<()>
where
    B: Serialize + ?Sized,
{
    let url = http.config.endpoint(path)?;
    execute(http, method, &url, |r| match body {
        Some(body) => r.json(body),
        None => r,
    })
    .await?;
    Ok(())
}
