mod auth;
mod bbcode;
mod chat;
mod common;
mod relationship;
mod score;
mod team;
mod user;

pub use auth::*;
pub use bbcode::*;
pub use chat::*;
pub use common::*;
pub use relationship::*;
pub use score::*;
pub use team::*;
pub use user::*;
