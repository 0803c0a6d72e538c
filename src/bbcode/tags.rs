use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#[0-9a-fA-F]{3}|#[0-9a-fA-F]{6}|[a-zA-Z]{1,20})$").expect("valid color regex")
});

static YOUTUBE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{6,20}$").expect("valid youtube id regex"));

pub const MIN_FONT_SIZE: u32 = 30;
pub const MAX_FONT_SIZE: u32 = 200;

/// Every tag the portal understands. Anything else in brackets is text.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TagName {
    B,
    I,
    U,
    S,
    Color,
    Size,
    Url,
    Img,
    Quote,
    Code,
    List,
    #[strum(serialize = "*")]
    ListItem,
    Centre,
    Heading,
    Spoiler,
    Spoilerbox,
    Box,
    Notice,
    Youtube,
    Audio,
    Imagemap,
}

/// Whether a tag takes an `=parameter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRule {
    Forbidden,
    Optional,
    Required,
}

impl TagName {
    pub fn param_rule(self) -> ParamRule {
        match self {
            TagName::Color | TagName::Size => ParamRule::Required,
            TagName::Url | TagName::Quote | TagName::List | TagName::Box => ParamRule::Optional,
            _ => ParamRule::Forbidden,
        }
    }

    /// Body is taken verbatim up to the closing tag; nested tags are text.
    pub fn has_raw_body(self) -> bool {
        matches!(
            self,
            TagName::Code | TagName::Img | TagName::Youtube | TagName::Audio | TagName::Imagemap
        )
    }

    /// Block tags swallow one newline directly after their open and close
    /// markers so that they do not leave blank lines behind.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            TagName::Quote
                | TagName::Code
                | TagName::List
                | TagName::Centre
                | TagName::Heading
                | TagName::Spoilerbox
                | TagName::Box
                | TagName::Notice
                | TagName::Youtube
                | TagName::Audio
                | TagName::Imagemap
        )
    }
}

/// Accept http(s), mailto and site-relative links. Returns the trimmed URL.
pub(crate) fn sanitize_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.chars().any(char::is_control) {
        return None;
    }
    if raw.starts_with('/') && !raw.starts_with("//") {
        return Some(raw.to_string());
    }
    let parsed = Url::parse(raw).ok()?;
    match parsed.scheme() {
        "http" | "https" | "mailto" => Some(raw.to_string()),
        _ => None,
    }
}

/// Absolute http(s) links. Schemes compare case-insensitively.
pub(crate) fn is_external(url: &str) -> bool {
    Url::parse(url.trim()).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

pub(crate) fn valid_color(value: &str) -> bool {
    COLOR.is_match(value)
}

pub(crate) fn valid_youtube_id(value: &str) -> bool {
    YOUTUBE_ID.is_match(value)
}

/// Parse a `[size=N]` value and clamp it to the allowed percentage range.
pub(crate) fn font_size(value: &str) -> Option<u32> {
    value
        .trim()
        .trim_end_matches('%')
        .parse::<u32>()
        .ok()
        .map(|n| n.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE))
}
