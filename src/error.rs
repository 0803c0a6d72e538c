use std::io;

use scraper::error::SelectorErrorKind;

/// All errors that can occur while talking to the portal API or preparing
/// data for it.
#[derive(thiserror::Error, Debug)]
pub enum PortalError {
    /// HTTP request failed (network, DNS, TLS, timeout, etc.).
    #[error("http request failed for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    /// Server returned a non-success HTTP status code.
    ///
    /// `message` holds whatever the server put in its error payload, if
    /// anything could be extracted.
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
        message: Option<String>,
    },

    /// Failed to read the response body.
    #[error("failed to read response body from {url}: {source}")]
    ResponseBody {
        url: String,
        source: reqwest::Error,
    },

    /// The response body was not the JSON shape we expected.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    /// The request needed a session but none is stored, or the server
    /// rejected the stored token and no refresh was possible.
    #[error("not logged in")]
    Unauthorized,

    /// The refresh token was rejected; stored tokens have been cleared.
    #[error("session expired, please log in again")]
    SessionExpired,

    /// Asked for the relationship between a user and themselves.
    #[error("cannot check relationship with self")]
    SelfRelationship,

    /// A relationship change was requested before any target was loaded.
    #[error("no user selected")]
    NoTarget,

    /// A relationship mutation for this target is still in flight.
    #[error("another relationship change for user {target_id} is still in progress")]
    MutationInFlight { target_id: u32 },

    /// The file's MIME type is not accepted for upload.
    #[error("unsupported file type: {mime}")]
    UnsupportedFileType { mime: String },

    /// The file exceeds the upload size limit.
    #[error("file is too large ({size} bytes, limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    /// Decoding or encoding an image failed.
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// The crop region does not fit the source image.
    #[error("invalid crop region: {0}")]
    InvalidCrop(String),

    /// A TOTP code was not exactly six digits.
    #[error("invalid verification code")]
    InvalidTotpCode,

    /// BBCode content exceeds the configured length ceiling.
    #[error("content is too long ({length} characters, limit {limit})")]
    ContentTooLong { length: usize, limit: usize },

    /// A URL could not be built or parsed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Reading or writing the token store failed.
    #[error("token store error: {0}")]
    TokenStore(#[from] io::Error),

    /// A CSS selector string could not be parsed.
    #[error("invalid CSS selector: {0}")]
    Selector(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl<'a> From<SelectorErrorKind<'a>> for PortalError {
    fn from(err: SelectorErrorKind<'a>) -> Self {
        PortalError::Selector(err.to_string())
    }
}

impl PortalError {
    /// Text suitable for a toast: the server's own message when it sent one,
    /// otherwise a generic description of the failure.
    pub fn user_message(&self) -> String {
        match self {
            PortalError::UnexpectedStatus {
                message: Some(message),
                ..
            } => message.clone(),
            PortalError::UnexpectedStatus { status, .. } => {
                format!("request failed ({status})")
            }
            PortalError::Http { .. } | PortalError::ResponseBody { .. } => {
                "network error, please try again".to_string()
            }
            PortalError::Decode { .. } => "the server sent an unexpected response".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
