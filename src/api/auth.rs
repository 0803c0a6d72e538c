use reqwest::{Method, StatusCode};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::api::{self, check_status, read_json, Http};
use crate::error::{PortalError, Result};
use crate::model::{TokenResponse, TotpCode, TotpEnabled, TotpSetup};
use crate::session::TokenPair;

const TOKEN_PATH: &str = "/oauth/token";

async fn token_request(http: &Http, params: &[(&str, &str)]) -> Result<TokenResponse> {
    let url = http.config.endpoint(TOKEN_PATH)?;
    let response = http
        .client
        .post(url.clone())
        .header(reqwest::header::USER_AGENT, &http.config.user_agent)
        .form(params)
        .send()
        .await
        .map_err(|e| PortalError::Http {
            url: url.to_string(),
            source: e,
        })?;
    let response = check_status(&url, response).await?;
    read_json(&url, response).await
}

/// Password grant. Stores the returned token pair.
#[instrument(skip(http, password))]
pub(crate) async fn login(http: &Http, username: &str, password: &str) -> Result<TokenResponse> {
    let client_id = http.config.client_id.to_string();
    let params = [
        ("grant_type", "password"),
        ("client_id", client_id.as_str()),
        ("client_secret", http.config.client_secret.as_str()),
        ("username", username),
        ("password", password),
        ("scope", "*"),
    ];
    let tokens = token_request(http, &params).await?;
    http.tokens.store(TokenPair::from(&tokens))?;
    debug!(username, expires_in = tokens.expires_in, "logged in");
    Ok(tokens)
}

/// Refresh-token grant.
///
/// A rejected refresh token (400 or 401 from the token endpoint) clears the
/// store and yields [`PortalError::SessionExpired`]. Other statuses and
/// network failures are returned as-is and leave the session untouched.
#[instrument(skip_all)]
pub(crate) async fn refresh(http: &Http, refresh_token: &str) -> Result<TokenResponse> {
    let client_id = http.config.client_id.to_string();
    let params = [
        ("grant_type", "refresh_token"),
        ("client_id", client_id.as_str()),
        ("client_secret", http.config.client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("scope", "*"),
    ];
    match token_request(http, &params).await {
        Ok(tokens) => {
            let mut pair = TokenPair::from(&tokens);
            if pair.refresh_token.is_none() {
                pair.refresh_token = Some(refresh_token.to_string());
            }
            http.tokens.store(pair)?;
            debug!("refreshed access token");
            Ok(tokens)
        }
        Err(PortalError::UnexpectedStatus { status, .. })
            if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) =>
        {
            warn!(%status, "refresh token rejected, clearing session");
            http.tokens.clear()?;
            Err(PortalError::SessionExpired)
        }
        Err(e) => Err(e),
    }
}

pub(crate) fn logout(http: &Http) -> Result<()> {
    http.tokens.clear()
}

/// Start TOTP enrolment; the secret is shown to the user as a QR code.
#[instrument(skip(http))]
pub(crate) async fn totp_create(http: &Http) -> Result<TotpSetup> {
    api::get_json(http, "/api/private/totp/create", &[]).await
}

/// Confirm enrolment with the first code from the authenticator.
#[instrument(skip_all)]
pub(crate) async fn totp_finish(http: &Http, code: &TotpCode) -> Result<TotpEnabled> {
    api::send_json(
        http,
        Method::POST,
        "/api/private/totp/create",
        &json!({ "code": code }),
    )
    .await
}

#[instrument(skip_all)]
pub(crate) async fn totp_disable(http: &Http, code: &TotpCode) -> Result<()> {
    api::send_unit(
        http,
        Method::DELETE,
        "/api/private/totp",
        Some(&json!({ "code": code })),
    )
    .await
}

/// Complete a login that the server flagged as needing second-factor
/// verification.
#[instrument(skip_all)]
pub(crate) async fn verify_session(http: &Http, code: &TotpCode) -> Result<()> {
    api::send_unit(
        http,
        Method::POST,
        "/api/v2/session/verify",
        Some(&json!({ "verification_key": code })),
    )
    .await
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::test_support::{http_for, logged_in};
    use crate::session::TokenStore;

    #[tokio::test]
    async fn test_login_stores_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "a1",
                "refresh_token": "r1",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let (http, store) = http_for(&server, TokenPair::default());
        login(&http, "player", "hunter2").await.unwrap();
        assert_eq!(store.access_token().as_deref(), Some("a1"));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "The provided authorization grant is invalid"
            })))
            .mount(&server)
            .await;

        let (http, store) = http_for(&server, TokenPair::default());
        let err = login(&http, "player", "wrong").await.unwrap_err();
        assert_eq!(
            err.user_message(),
            "The provided authorization grant is invalid"
        );
        assert!(store.access_token().is_none());
    }

    #[tokio::test]
    async fn test_refresh_keeps_old_refresh_token_when_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "a2",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let (http, store) = http_for(&server, logged_in());
        refresh(&http, "refresh").await.unwrap();
        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn test_totp_finish_sends_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/private/totp/create"))
            .and(body_string_contains("\"code\":\"123456\""))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"backup_codes": ["aaaa-bbbb"]})),
            )
            .mount(&server)
            .await;

        let (http, _) = http_for(&server, logged_in());
        let code = TotpCode::parse("123456").unwrap();
        let enabled = totp_finish(&http, &code).await.unwrap();
        assert_eq!(enabled.backup_codes, vec!["aaaa-bbbb".to_string()]);
    }
}
