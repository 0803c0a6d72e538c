//! Debounced remote validation for the userpage editor.
//!
//! Every edit gets a sequence number. Only the newest sequence is ever
//! written to the published state; a newer edit aborts the pending timer or
//! request of the previous one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bbcode::{parser, render};
use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::model::BbcodeValidation;

/// Anything that can validate BBCode remotely.
#[async_trait]
pub trait BbcodeValidator: Send + Sync {
    async fn validate_bbcode(&self, content: &str) -> Result<BbcodeValidation>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ValidationStatus {
    /// Nothing to validate.
    #[default]
    Idle,
    /// Waiting for the debounce timer or the server.
    Pending,
    Valid,
    Invalid { errors: Vec<String> },
    /// The server could not be reached; `errors` come from the local parser.
    Fallback { errors: Vec<String>, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationState {
    pub seq: u64,
    pub content: String,
    pub status: ValidationStatus,
    /// Server preview when one was returned, otherwise a local render.
    pub preview_html: Option<String>,
}

impl ValidationState {
    /// Short status text for the editor footer.
    pub fn indicator(&self) -> Option<String> {
        let errors = match &self.status {
            ValidationStatus::Idle | ValidationStatus::Pending => return None,
            ValidationStatus::Valid => return Some("✓ valid".to_string()),
            ValidationStatus::Invalid { errors } | ValidationStatus::Fallback { errors, .. } => {
                errors
            }
        };
        Some(if errors.is_empty() {
            "✓ valid".to_string()
        } else {
            format!("✗ {} errors", errors.len())
        })
    }

    pub fn errors(&self) -> &[String] {
        match &self.status {
            ValidationStatus::Invalid { errors } | ValidationStatus::Fallback { errors, .. } => {
                errors
            }
            _ => &[],
        }
    }
}

pub struct ValidationSession {
    validator: Arc<dyn BbcodeValidator>,
    debounce: Duration,
    max_length: usize,
    next_seq: u64,
    state: Arc<watch::Sender<ValidationState>>,
    pending: Option<JoinHandle<()>>,
}

impl ValidationSession {
    pub fn new(validator: Arc<dyn BbcodeValidator>, config: &PortalConfig) -> Self {
        let (tx, _rx) = watch::channel(ValidationState::default());
        Self {
            validator,
            debounce: config.validation_debounce,
            max_length: config.bbcode_max_length,
            next_seq: 0,
            state: Arc::new(tx),
            pending: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ValidationState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ValidationState {
        self.state.borrow().clone()
    }

    /// Record an edit. Returns the sequence number assigned to it.
    pub fn submit(&mut self, content: impl Into<String>) -> u64 {
        let content = content.into();
        self.next_seq += 1;
        let seq = self.next_seq;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }

        let length = content.chars().count();
        if content.trim().is_empty() {
            self.state.send_replace(ValidationState {
                seq,
                content,
                ..ValidationState::default()
            });
            return seq;
        }
        if length > self.max_length {
            let err = PortalError::ContentTooLong {
                length,
                limit: self.max_length,
            };
            debug!(seq, length, "content over limit, not sending");
            self.state.send_replace(ValidationState {
                seq,
                content,
                status: ValidationStatus::Invalid {
                    errors: vec![err.to_string()],
                },
                preview_html: None,
            });
            return seq;
        }

        self.state.send_modify(|state| {
            state.seq = seq;
            state.content = content.clone();
            state.status = ValidationStatus::Pending;
        });

        let validator = Arc::clone(&self.validator);
        let state = Arc::clone(&self.state);
        let debounce = self.debounce;
        let max_length = self.max_length;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            debug!(seq, "validating bbcode");
            let outcome = validator.validate_bbcode(&content).await;
            let next = resolve(seq, content, outcome, max_length);
            let applied = state.send_if_modified(|current| {
                if current.seq != seq {
                    return false;
                }
                *current = next;
                true
            });
            if !applied {
                debug!(seq, "discarding stale validation response");
            }
        }));
        seq
    }
}

impl Drop for ValidationSession {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

fn resolve(
    seq: u64,
    content: String,
    outcome: Result<BbcodeValidation>,
    max_length: usize,
) -> ValidationState {
    match outcome {
        Ok(validation) => {
            let status = if validation.valid && validation.errors.is_empty() {
                ValidationStatus::Valid
            } else {
                ValidationStatus::Invalid {
                    errors: validation.errors,
                }
            };
            let preview_html = validation
                .preview
                .map(|preview| preview.html)
                .unwrap_or_else(|| render::to_html(&content));
            ValidationState {
                seq,
                content,
                status,
                preview_html: Some(preview_html),
            }
        }
        Err(err) => {
            warn!(seq, error = %err, "remote validation failed, using local parser");
            let doc = parser::parse_with_limit(&content, max_length);
            let preview_html = render::render(&doc.nodes);
            ValidationState {
                seq,
                content,
                status: ValidationStatus::Fallback {
                    errors: doc.error_messages(),
                    reason: err.user_message(),
                },
                preview_html: Some(preview_html),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::BbcodePreview;

    #[derive(Default)]
    struct FakeValidator {
        calls: Mutex<Vec<String>>,
        slow: Option<(String, Duration)>,
        fail: bool,
    }

    impl FakeValidator {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BbcodeValidator for FakeValidator {
        async fn validate_bbcode(&self, content: &str) -> Result<BbcodeValidation> {
            self.calls.lock().unwrap().push(content.to_string());
            if let Some((slow, delay)) = &self.slow {
                if slow == content {
                    tokio::time::sleep(*delay).await;
                }
            }
            if self.fail {
                return Err(PortalError::UnexpectedStatus {
                    url: "http://localhost/api/private/user/validate-bbcode".to_string(),
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    message: None,
                });
            }
            let errors = if content.contains("bad") {
                vec!["bad content".to_string()]
            } else {
                Vec::new()
            };
            Ok(BbcodeValidation {
                valid: errors.is_empty(),
                errors,
                preview: Some(BbcodePreview {
                    html: format!("<p>{content}</p>"),
                    raw: content.to_string(),
                }),
            })
        }
    }

    fn session(validator: &Arc<FakeValidator>) -> ValidationSession {
        let config = PortalConfig::default().with_validation_debounce(Duration::from_millis(500));
        ValidationSession::new(validator.clone(), &config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_sends_only_last_edit() {
        let validator = Arc::new(FakeValidator::default());
        let mut session = session(&validator);

        session.submit("a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.submit("ab");
        tokio::time::sleep(Duration::from_millis(100)).await;
        let seq = session.submit("abc");
        assert_eq!(session.state().status, ValidationStatus::Pending);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(validator.calls(), vec!["abc".to_string()]);
        let state = session.state();
        assert_eq!(state.seq, seq);
        assert_eq!(state.status, ValidationStatus::Valid);
        assert_eq!(state.preview_html.as_deref(), Some("<p>abc</p>"));
        assert_eq!(state.indicator().as_deref(), Some("✓ valid"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_response_never_overwrites_newer_edit() {
        let validator = Arc::new(FakeValidator {
            slow: Some(("slow".to_string(), Duration::from_secs(5))),
            ..FakeValidator::default()
        });
        let mut session = session(&validator);

        session.submit("slow");
        tokio::time::sleep(Duration::from_millis(600)).await;
        session.submit("bad edit");
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(
            validator.calls(),
            vec!["slow".to_string(), "bad edit".to_string()]
        );
        let state = session.state();
        assert_eq!(state.content, "bad edit");
        assert_eq!(state.errors(), ["bad content".to_string()]);
        assert_eq!(state.indicator().as_deref(), Some("✗ 1 errors"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_long_is_rejected_without_request() {
        let validator = Arc::new(FakeValidator::default());
        let config = PortalConfig::default().with_bbcode_max_length(5);
        let mut session = ValidationSession::new(validator.clone(), &config);

        session.submit("abcdefgh");
        let state = session.state();
        assert_eq!(
            state.errors(),
            ["content is too long (8 characters, limit 5)".to_string()]
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(validator.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_failure_falls_back_to_local_parse() {
        let validator = Arc::new(FakeValidator {
            fail: true,
            ..FakeValidator::default()
        });
        let mut session = session(&validator);

        session.submit("[b]unclosed");
        tokio::time::sleep(Duration::from_secs(1)).await;
        let state = session.state();
        let ValidationStatus::Fallback { errors, reason } = &state.status else {
            panic!("expected fallback, got {:?}", state.status);
        };
        assert_eq!(errors, &vec!["unclosed tag [b]".to_string()]);
        assert_eq!(reason, "request failed (503 Service Unavailable)");
        assert_eq!(state.preview_html.as_deref(), Some("[b]unclosed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_content_is_idle() {
        let validator = Arc::new(FakeValidator::default());
        let mut session = session(&validator);
        session.submit("   ");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(session.state().status, ValidationStatus::Idle);
        assert_eq!(session.state().indicator(), None);
        assert!(validator.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_result() {
        let validator = Arc::new(FakeValidator::default());
        let mut session = session(&validator);
        let mut rx = session.subscribe();
        session.submit("[b]x[/b]");
        rx.wait_for(|s| s.status == ValidationStatus::Valid)
            .await
            .unwrap();
    }
}
