use serde::{Deserialize, Serialize};

/// Server response of the BBCode validation endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BbcodeValidation {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    pub preview: Option<BbcodePreview>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BbcodePreview {
    pub html: String,
    #[serde(default)]
    pub raw: String,
}
