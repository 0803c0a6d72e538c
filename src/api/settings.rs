use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::api::{self, Http};
use crate::error::{PortalError, Result};
use crate::model::{BbcodeValidation, UserPage};
use crate::upload::{EncodedImage, UploadKind};

/// Ask the server to validate and render a BBCode document.
#[instrument(skip(http, content), fields(len = content.chars().count()))]
pub(crate) async fn validate_bbcode(http: &Http, content: &str) -> Result<BbcodeValidation> {
    let length = content.chars().count();
    let limit = http.config.bbcode_max_length;
    if length > limit {
        return Err(PortalError::ContentTooLong { length, limit });
    }
    let validation: BbcodeValidation = api::send_json(
        http,
        Method::POST,
        "/api/private/user/validate-bbcode",
        &json!({ "content": content }),
    )
    .await?;
    debug!(
        valid = validation.valid,
        errors = validation.errors.len(),
        "validated bbcode"
    );
    Ok(validation)
}

/// Replace the "about me" page; the server answers with the rendered page.
#[instrument(skip(http, content))]
pub(crate) async fn update_userpage(http: &Http, content: &str) -> Result<UserPage> {
    let length = content.chars().count();
    let limit = http.config.bbcode_max_length;
    if length > limit {
        return Err(PortalError::ContentTooLong { length, limit });
    }
    api::send_json(
        http,
        Method::PUT,
        "/api/private/user/page",
        &json!({ "body": content }),
    )
    .await
}

#[instrument(skip(http))]
pub(crate) async fn rename(http: &Http, new_name: &str) -> Result<()> {
    api::send_unit(
        http,
        Method::POST,
        "/api/private/rename",
        Some(&json!({ "new_name": new_name })),
    )
    .await
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub url: String,
}

/// Upload an already processed avatar or cover. Returns the new image URL.
#[instrument(skip(http, image), fields(bytes = image.bytes.len()))]
pub(crate) async fn upload_image(http: &Http, kind: UploadKind, image: &EncodedImage) -> Result<String> {
    let path = match kind {
        UploadKind::Avatar => "/api/private/avatar/upload",
        UploadKind::Cover => "/api/private/cover/upload",
    };
    let url = http.config.endpoint(path)?;
    let file_name = format!("{kind}.jpg");
    let response = api::execute(http, Method::POST, &url, |r| {
        let part = Part::bytes(image.bytes.clone()).file_name(file_name.clone());
        r.multipart(Form::new().part("content", part))
    })
    .await?;
    let uploaded: UploadResponse = api::read_json(&url, response).await?;
    debug!(url = %uploaded.url, %kind, "uploaded image");
    Ok(uploaded.url)
}
