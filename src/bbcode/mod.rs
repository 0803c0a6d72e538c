//! BBCode support for userpages: parsing, HTML rendering, the editor model,
//! remote validation and the headless mount model.

pub mod editor;
pub mod imagemap;
pub mod mount;
pub mod parser;
pub mod render;
pub mod tags;
pub mod validation;

pub use editor::{shortcut_action, EditorBuffer, KeyCombo, ToolbarAction};
pub use imagemap::{ImageMap, ImageMapRegion};
pub use mount::{Key, MountEffect, MountEvent, MountedContent, ToggleEvent};
pub use parser::{parse, parse_with_limit, Document, Element, Node, ParseError, ParseErrorKind};
pub use render::{render, to_html};
pub use tags::TagName;
pub use validation::{BbcodeValidator, ValidationSession, ValidationState, ValidationStatus};

use crate::model::{BbcodePreview, BbcodeValidation};

/// Validate and render locally, producing the same shape the server
/// returns.
pub fn validate(input: &str, max_length: usize) -> BbcodeValidation {
    let doc = parse_with_limit(input, max_length);
    let html = render(&doc.nodes);
    BbcodeValidation {
        valid: doc.is_valid(),
        errors: doc.error_messages(),
        preview: Some(BbcodePreview {
            html,
            raw: input.to_string(),
        }),
    }
}
