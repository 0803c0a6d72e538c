use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::api::users::UserRef;
use crate::api::{self, Http};
use crate::bbcode::BbcodeValidator;
use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::model::*;
use crate::relationship::RelationshipApi;
use crate::session::{MemoryTokenStore, TokenStore};
use crate::upload::{self, CropRegion, Rotation, SelectedFile, UploadKind};

/// The main entry point for talking to the portal's API.
///
/// `PortalClient` wraps a [`reqwest::Client`], the [`PortalConfig`] and a
/// [`TokenStore`]. Every request carries the stored bearer token; an expired
/// access token is refreshed once and the request retried.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> osu_portal::Result<()> {
/// use osu_portal::{PortalClient, PortalConfig, RankingKind, Ruleset};
///
/// let client = PortalClient::new(PortalConfig::from_env()?);
/// client.login("peppy", "hunter2").await?;
/// let rankings = client
///     .get_rankings(Ruleset::Osu, RankingKind::Performance, None, 1)
///     .await?;
/// println!("Top player: {:?}", rankings.ranking.first().map(|r| &r.user.username));
/// # Ok(())
/// # }
/// ```
pub struct PortalClient {
    http: Http,
}

impl PortalClient {
    /// Create a client with an in-memory token store.
    pub fn new(config: PortalConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client using the provided [`reqwest::Client`].
    ///
    /// Use this when you need to configure timeouts, proxies, headers, etc.
    pub fn with_client(client: reqwest::Client, config: PortalConfig) -> Self {
        Self {
            http: Http::new(client, config, Arc::new(MemoryTokenStore::new())),
        }
    }

    /// Replace the token store, e.g. with a [`crate::FileTokenStore`] so the
    /// session survives restarts.
    pub fn with_token_store(self, tokens: Arc<dyn TokenStore>) -> Self {
        let Http { client, config, .. } = self.http;
        Self {
            http: Http::new(client, config, tokens),
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.http.config
    }

    pub fn is_logged_in(&self) -> bool {
        self.http.tokens.access_token().is_some()
    }

    // Session

    /// Log in with username and password and store the issued tokens.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        api::auth::login(&self.http, username, password).await
    }

    /// Exchange the stored refresh token for a new token pair.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<TokenResponse> {
        let refresh_token = self
            .http
            .tokens
            .refresh_token()
            .ok_or(PortalError::Unauthorized)?;
        api::auth::refresh(&self.http, &refresh_token).await
    }

    /// Forget the stored session.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<()> {
        api::auth::logout(&self.http)
    }

    #[instrument(skip(self))]
    pub async fn totp_create(&self) -> Result<TotpSetup> {
        api::auth::totp_create(&self.http).await
    }

    /// Confirm TOTP setup with the first code from the authenticator app.
    #[instrument(skip_all)]
    pub async fn totp_finish(&self, code: &str) -> Result<TotpEnabled> {
        let code = TotpCode::parse(code)?;
        api::auth::totp_finish(&self.http, &code).await
    }

    #[instrument(skip_all)]
    pub async fn totp_disable(&self, code: &str) -> Result<()> {
        let code = TotpCode::parse(code)?;
        api::auth::totp_disable(&self.http, &code).await
    }

    /// Verify a new login session with a TOTP or e-mailed code.
    #[instrument(skip_all)]
    pub async fn verify_session(&self, code: &str) -> Result<()> {
        let code = TotpCode::parse(code)?;
        api::auth::verify_session(&self.http, &code).await
    }

    // Users

    /// Fetch the logged-in user.
    #[instrument(skip(self))]
    pub async fn get_me(&self, ruleset: Option<Ruleset>) -> Result<User> {
        api::users::get_me(&self.http, ruleset).await
    }

    /// Fetch a user by id or name (`"2"`, `"peppy"` and `"@peppy"` all work).
    #[instrument(skip(self, user))]
    pub async fn get_user(
        &self,
        user: impl Into<UserRef> + Send,
        ruleset: Option<Ruleset>,
    ) -> Result<User> {
        api::users::get_user(&self.http, &user.into(), ruleset).await
    }

    #[instrument(skip(self))]
    pub async fn get_user_scores(
        &self,
        user_id: u32,
        kind: ScoreKind,
        ruleset: Option<Ruleset>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Score>> {
        api::users::get_user_scores(&self.http, user_id, kind, ruleset, limit, offset).await
    }

    #[instrument(skip(self))]
    pub async fn get_rankings(
        &self,
        ruleset: Ruleset,
        kind: RankingKind,
        country: Option<&str>,
        page: u32,
    ) -> Result<Rankings> {
        api::users::get_rankings(&self.http, ruleset, kind, country, page).await
    }

    #[instrument(skip(self))]
    pub async fn search_users(&self, query: &str, page: u32) -> Result<UserSearch> {
        api::users::search_users(&self.http, query, page).await
    }

    // Teams

    #[instrument(skip(self))]
    pub async fn get_teams(&self, ruleset: Option<Ruleset>) -> Result<Vec<Team>> {
        api::teams::get_teams(&self.http, ruleset).await
    }

    #[instrument(skip(self))]
    pub async fn get_team(&self, team_id: u32) -> Result<Team> {
        api::teams::get_team(&self.http, team_id).await
    }

    #[instrument(skip(self, form))]
    pub async fn create_team(&self, form: &TeamForm) -> Result<Team> {
        api::teams::create_team(&self.http, form).await
    }

    #[instrument(skip(self, form))]
    pub async fn update_team(&self, team_id: u32, form: &TeamForm) -> Result<Team> {
        api::teams::update_team(&self.http, team_id, form).await
    }

    /// Pending join requests of a team (captain only).
    #[instrument(skip(self))]
    pub async fn get_team_requests(&self, team_id: u32) -> Result<Vec<TeamRequest>> {
        api::teams::get_requests(&self.http, team_id).await
    }

    #[instrument(skip(self))]
    pub async fn request_join(&self, team_id: u32) -> Result<()> {
        api::teams::request_join(&self.http, team_id).await
    }

    #[instrument(skip(self))]
    pub async fn accept_request(&self, team_id: u32, user_id: u32) -> Result<()> {
        api::teams::accept_request(&self.http, team_id, user_id).await
    }

    #[instrument(skip(self))]
    pub async fn reject_request(&self, team_id: u32, user_id: u32) -> Result<()> {
        api::teams::reject_request(&self.http, team_id, user_id).await
    }

    /// Remove a member from a team (captain only).
    #[instrument(skip(self))]
    pub async fn kick_member(&self, team_id: u32, user_id: u32) -> Result<()> {
        api::teams::remove_member(&self.http, team_id, user_id).await
    }

    /// Leave a team as the logged-in user.
    #[instrument(skip(self))]
    pub async fn leave_team(&self, team_id: u32) -> Result<()> {
        let me = api::users::get_me(&self.http, None).await?;
        debug!(team_id, user_id = me.id, "leaving team");
        api::teams::remove_member(&self.http, team_id, me.id).await
    }

    // Chat

    #[instrument(skip(self))]
    pub async fn get_channels(&self) -> Result<Vec<ChatChannel>> {
        api::chat::get_channels(&self.http).await
    }

    #[instrument(skip(self))]
    pub async fn get_messages(&self, channel_id: u32, since: Option<u64>) -> Result<Vec<ChatMessage>> {
        api::chat::get_messages(&self.http, channel_id, since).await
    }

    #[instrument(skip(self, message))]
    pub async fn send_message(
        &self,
        channel_id: u32,
        message: &str,
        is_action: bool,
    ) -> Result<ChatMessage> {
        api::chat::send_message(&self.http, channel_id, message, is_action).await
    }

    /// Open (or reuse) a private channel with `target_id` and send a first
    /// message.
    #[instrument(skip(self, message))]
    pub async fn create_pm(&self, target_id: u32, message: &str) -> Result<NewPrivateMessage> {
        api::chat::create_pm(&self.http, target_id, message).await
    }

    #[instrument(skip(self))]
    pub async fn mark_read(&self, channel_id: u32, message_id: u64) -> Result<()> {
        api::chat::mark_read(&self.http, channel_id, message_id).await
    }

    // Relationships

    #[instrument(skip(self))]
    pub async fn get_relationship(&self, target_id: u32) -> Result<RelationshipStatus> {
        api::relationships::get_relationship(&self.http, target_id).await
    }

    // Settings

    /// Ask the server to validate BBCode. Content over the configured limit
    /// is rejected without a request.
    #[instrument(skip(self, content))]
    pub async fn validate_bbcode(&self, content: &str) -> Result<BbcodeValidation> {
        api::settings::validate_bbcode(&self.http, content).await
    }

    #[instrument(skip(self, content))]
    pub async fn update_userpage(&self, content: &str) -> Result<UserPage> {
        api::settings::update_userpage(&self.http, content).await
    }

    #[instrument(skip(self))]
    pub async fn rename(&self, new_name: &str) -> Result<()> {
        api::settings::rename(&self.http, new_name).await
    }

    /// Crop, rotate, resize and encode `file` with the avatar preset, then
    /// upload it. Returns the new avatar URL.
    #[instrument(skip(self, file), fields(file = %file.name))]
    pub async fn upload_avatar(
        &self,
        file: &SelectedFile,
        crop: CropRegion,
        rotation: Rotation,
    ) -> Result<String> {
        self.upload(UploadKind::Avatar, file, crop, rotation).await
    }

    /// Same as [`Self::upload_avatar`] with the cover preset.
    #[instrument(skip(self, file), fields(file = %file.name))]
    pub async fn upload_cover(
        &self,
        file: &SelectedFile,
        crop: CropRegion,
        rotation: Rotation,
    ) -> Result<String> {
        self.upload(UploadKind::Cover, file, crop, rotation).await
    }

    async fn upload(
        &self,
        kind: UploadKind,
        file: &SelectedFile,
        crop: CropRegion,
        rotation: Rotation,
    ) -> Result<String> {
        let preset = match kind {
            UploadKind::Avatar => &self.http.config.avatar,
            UploadKind::Cover => &self.http.config.cover,
        };
        let encoded = upload::prepare(file, crop, rotation, preset)?;
        api::settings::upload_image(&self.http, kind, &encoded).await
    }
}

#[async_trait]
impl BbcodeValidator for PortalClient {
    async fn validate_bbcode(&self, content: &str) -> Result<BbcodeValidation> {
        PortalClient::validate_bbcode(self, content).await
    }
}

#[async_trait]
impl RelationshipApi for PortalClient {
    async fn relationship(&self, target_id: u32) -> Result<RelationshipStatus> {
        self.get_relationship(target_id).await
    }

    async fn add_friend(&self, target_id: u32) -> Result<()> {
        api::relationships::add_friend(&self.http, target_id).await
    }

    async fn remove_friend(&self, target_id: u32) -> Result<()> {
        api::relationships::remove_friend(&self.http, target_id).await
    }

    async fn block(&self, target_id: u32) -> Result<()> {
        api::relationships::block(&self.http, target_id).await
    }

    async fn unblock(&self, target_id: u32) -> Result<()> {
        api::relationships::unblock(&self.http, target_id).await
    }
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, Rgb, RgbImage};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::session::TokenPair;

    fn client_for(server: &MockServer) -> PortalClient {
        let config = PortalConfig::default()
            .with_base_url(&server.uri())
            .unwrap()
            .with_credentials(5, "secret");
        PortalClient::new(config)
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 80, 120]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_login_then_authenticated_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "token_type": "Bearer",
                "expires_in": 86400
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/private/relationship/check/3"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "is_friend": true,
                "is_blocked": false,
                "is_mutual": false,
                "follows_me": false
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(!client.is_logged_in());
        client.login("peppy", "password").await.unwrap();
        assert!(client.is_logged_in());

        let status = client.relationship(3).await.unwrap();
        assert!(status.is_friend);

        client.logout().unwrap();
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_invalid_totp_code_sends_nothing() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let err = client.totp_finish("12a456").await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidTotpCode));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_avatar_rejects_bad_type_without_request() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let file = SelectedFile {
            name: "notes.txt".to_string(),
            mime: "text/plain".to_string(),
            bytes: b"hello".to_vec(),
        };
        let err = client
            .upload_avatar(&file, CropRegion::centered(1, 1, 1.0), Rotation::None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::UnsupportedFileType { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_avatar_sends_jpeg() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/private/avatar/upload"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "url": "https://a.example/avatars/2.jpg" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).with_token_store(Arc::new(MemoryTokenStore::with_tokens(
            TokenPair {
                access_token: Some("token".to_string()),
                refresh_token: None,
            },
        )));
        let file = SelectedFile {
            name: "me.png".to_string(),
            mime: "image/png".to_string(),
            bytes: png(600, 400),
        };
        let crop = CropRegion::centered(600, 400, 1.0);
        let url = client
            .upload_avatar(&file, crop, Rotation::Quarter)
            .await
            .unwrap();
        assert_eq!(url, "https://a.example/avatars/2.jpg");

        let requests = server.received_requests().await.unwrap();
        let body = &requests[0].body;
        assert!(String::from_utf8_lossy(body).contains("filename=\"avatar.jpg\""));
        assert!(body.windows(3).any(|w| w == [0xff, 0xd8, 0xff]));
    }

    #[tokio::test]
    async fn test_client_drives_validation_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/private/user/validate-bbcode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valid": true,
                "errors": [],
                "preview": { "html": "<strong>x</strong>", "raw": "[b]x[/b]" }
            })))
            .mount(&server)
            .await;

        let client = Arc::new(client_for(&server));
        let config = client.config().clone();
        let mut session = crate::bbcode::ValidationSession::new(client, &config);
        let mut rx = session.subscribe();
        session.submit("[b]x[/b]");
        let state = rx
            .wait_for(|s| s.status == crate::bbcode::ValidationStatus::Valid)
            .await
            .unwrap()
            .clone();
        assert_eq!(state.preview_html.as_deref(), Some("<strong>x</strong>"));
    }
}
