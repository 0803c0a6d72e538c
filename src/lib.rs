//! Client library for the web portal of osu!-compatible private servers.
//!
//! [`PortalClient`] covers the REST API (profiles, rankings, teams, chat,
//! settings, uploads and two-factor setup). The [`bbcode`] module parses,
//! renders and validates userpage markup; [`relationship`] tracks the
//! friend/block state of a viewed profile; [`upload`] turns a picked image
//! into an upload-ready JPEG.

pub use client::PortalClient;
pub use config::PortalConfig;
pub use error::{PortalError, Result};
pub use model::*;
pub use notify::{Notifier, Toast, ToastLevel, ToastQueue};
pub use relationship::{RelationshipApi, RelationshipState, RelationshipTracker};
pub use session::{FileTokenStore, MemoryTokenStore, TokenPair, TokenStore};
pub use api::users::UserRef;

pub(crate) mod api;
pub mod bbcode;
mod client;
pub mod config;
mod error;
mod model;
pub mod notify;
pub mod relationship;
pub mod session;
pub mod upload;
