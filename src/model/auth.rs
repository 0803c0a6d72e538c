use serde::{Deserialize, Serialize};

/// OAuth token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: u64,
}

/// Secret material returned when starting TOTP enrolment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpSetup {
    pub secret: String,
    pub uri: String,
}

/// Backup codes returned once TOTP enrolment is confirmed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TotpEnabled {
    #[serde(default)]
    pub backup_codes: Vec<String>,
}

/// A six-digit one-time code typed by the user, checked before any request
/// is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TotpCode(String);

impl TotpCode {
    /// Accepts exactly six ASCII digits. Whitespace anywhere is dropped first,
    /// so `123 456` as authenticator apps display it is fine.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let digits: String = input.split_whitespace().collect();
        if digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(digits))
        } else {
            Err(crate::PortalError::InvalidTotpCode)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
