use std::str::FromStr;

use crate::bbcode::imagemap::{self, ImageMap};
use crate::bbcode::tags::{self, ParamRule, TagName};
use crate::config::DEFAULT_BBCODE_MAX_LENGTH;

/// One defect found while parsing. Parsing never stops at a defect; the
/// offending markup is kept as text.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    #[error("unclosed tag [{tag}]")]
    Unclosed { tag: TagName },

    #[error("closing tag [/{tag}] has no matching opening tag")]
    UnexpectedClose { tag: TagName },

    #[error("invalid value \"{value}\" for [{tag}]")]
    InvalidParameter { tag: TagName, value: String },

    #[error("invalid url \"{url}\"")]
    InvalidUrl { url: String },

    #[error("invalid youtube video id \"{id}\"")]
    InvalidVideoId { id: String },

    #[error("imagemap: {reason}")]
    InvalidImageMap { reason: String },

    #[error("content is too long ({length} characters, limit {limit})")]
    TooLong { length: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Byte offset of the offending markup.
    pub offset: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: TagName,
    pub param: Option<String>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    LineBreak,
    Element(Element),
    ImageMap(ImageMap),
}

/// A parsed document together with everything that was wrong with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub nodes: Vec<Node>,
    pub errors: Vec<ParseError>,
}

impl Document {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

pub fn parse(input: &str) -> Document {
    parse_with_limit(input, DEFAULT_BBCODE_MAX_LENGTH)
}

/// Parse, refusing to interpret markup in documents longer than `limit`
/// characters.
pub fn parse_with_limit(input: &str, limit: usize) -> Document {
    let length = input.chars().count();
    if length > limit {
        return Document {
            nodes: vec![Node::Text(input.to_string())],
            errors: vec![ParseError {
                kind: ParseErrorKind::TooLong { length, limit },
                offset: 0,
            }],
        };
    }
    Parser::new(input).run()
}

enum Token<'a> {
    Open {
        name: TagName,
        param: Option<String>,
        raw: &'a str,
    },
    Close {
        name: TagName,
        raw: &'a str,
    },
}

/// Recognise a tag marker at the start of `rest` (which begins with `[`).
fn scan_tag(rest: &str) -> Option<Token<'_>> {
    let end = rest.find(']')?;
    let inner = &rest[1..end];
    if inner.is_empty() || inner.contains(['[', '\n']) {
        return None;
    }
    let raw = &rest[..=end];
    if let Some(name) = inner.strip_prefix('/') {
        let name = TagName::from_str(name.trim()).ok()?;
        return Some(Token::Close { name, raw });
    }
    let (name, param) = match inner.split_once('=') {
        Some((name, param)) => (name, Some(unquote(param).to_string())),
        None => (inner, None),
    };
    let name = TagName::from_str(name.trim()).ok()?;
    match (name.param_rule(), &param) {
        (ParamRule::Forbidden, Some(_)) | (ParamRule::Required, None) => None,
        _ => Some(Token::Open { name, param, raw }),
    }
}

fn unquote(param: &str) -> &str {
    let param = param.trim();
    param
        .strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(param)
}

struct Frame {
    tag: TagName,
    param: Option<String>,
    open_raw: String,
    offset: usize,
    /// Parameter was rejected: on close, emit only the children.
    degraded: bool,
    children: Vec<Node>,
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    stack: Vec<Frame>,
    root: Vec<Node>,
    errors: Vec<ParseError>,
    skip_newline: bool,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            stack: Vec::new(),
            root: Vec::new(),
            errors: Vec::new(),
            skip_newline: false,
        }
    }

    fn run(mut self) -> Document {
        let input = self.input;
        while self.pos < input.len() {
            let rest = &input[self.pos..];
            match rest.find(['[', '\n']) {
                None => {
                    self.push_text(rest);
                    self.pos = input.len();
                }
                Some(0) if rest.starts_with('\n') => {
                    if !std::mem::take(&mut self.skip_newline) {
                        self.push_node(Node::LineBreak);
                    }
                    self.pos += 1;
                }
                Some(0) => match scan_tag(rest) {
                    Some(token) => self.handle(token),
                    None => {
                        self.push_text("[");
                        self.pos += 1;
                    }
                },
                Some(n) => {
                    self.push_text(&rest[..n]);
                    self.pos += n;
                }
            }
        }
        while let Some(frame) = self.stack.pop() {
            if frame.tag == TagName::ListItem {
                self.close(frame);
            } else {
                self.unclosed(frame);
            }
        }
        Document {
            nodes: self.root,
            errors: self.errors,
        }
    }

    fn error(&mut self, kind: ParseErrorKind, offset: usize) {
        self.errors.push(ParseError { kind, offset });
    }

    fn children_mut(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(frame) => &mut frame.children,
            None => &mut self.root,
        }
    }

    fn push_node(&mut self, node: Node) {
        self.skip_newline = false;
        self.children_mut().push(node);
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.skip_newline = false;
        let children = self.children_mut();
        if let Some(Node::Text(last)) = children.last_mut() {
            last.push_str(text);
        } else {
            children.push(Node::Text(text.to_string()));
        }
    }

    fn push_nodes(&mut self, nodes: Vec<Node>) {
        for node in nodes {
            match node {
                Node::Text(text) => self.push_text(&text),
                other => self.push_node(other),
            }
        }
    }

    fn handle(&mut self, token: Token<'a>) {
        let offset = self.pos;
        match token {
            Token::Open { name, param, raw } => {
                self.pos += raw.len();
                if name.has_raw_body() {
                    self.open_raw_body(name, param, raw, offset);
                } else if name == TagName::ListItem {
                    self.open_list_item(raw, offset);
                } else {
                    self.open(name, param, raw, offset);
                }
            }
            Token::Close { name, raw } => {
                self.pos += raw.len();
                self.close_tag(name, raw, offset);
            }
        }
    }

    fn open(&mut self, tag: TagName, param: Option<String>, raw: &str, offset: usize) {
        let (param, degraded) = match (tag, param) {
            (TagName::Color, Some(value)) if !tags::valid_color(value.trim()) => {
                self.error(ParseErrorKind::InvalidParameter { tag, value }, offset);
                (None, true)
            }
            (TagName::Color, Some(value)) => (Some(value.trim().to_string()), false),
            (TagName::Size, Some(value)) => match tags::font_size(&value) {
                Some(size) => (Some(size.to_string()), false),
                None => {
                    self.error(ParseErrorKind::InvalidParameter { tag, value }, offset);
                    (None, true)
                }
            },
            (TagName::Url, Some(value)) => match tags::sanitize_url(&value) {
                Some(url) => (Some(url), false),
                None => {
                    self.error(ParseErrorKind::InvalidUrl { url: value }, offset);
                    (None, true)
                }
            },
            (_, param) => (param, false),
        };
        self.skip_newline = false;
        self.stack.push(Frame {
            tag,
            param,
            open_raw: raw.to_string(),
            offset,
            degraded,
            children: Vec::new(),
        });
        if tag.is_block() {
            self.skip_newline = true;
        }
    }

    fn open_list_item(&mut self, raw: &str, offset: usize) {
        if self.stack.last().is_some_and(|f| f.tag == TagName::ListItem) {
            if let Some(item) = self.stack.pop() {
                self.close(item);
            }
        }
        if self.stack.last().is_some_and(|f| f.tag == TagName::List) {
            self.stack.push(Frame {
                tag: TagName::ListItem,
                param: None,
                open_raw: raw.to_string(),
                offset,
                degraded: false,
                children: Vec::new(),
            });
            self.skip_newline = false;
        } else {
            self.push_text(raw);
        }
    }

    /// `[code]`, `[img]` and friends: everything up to the matching closing
    /// marker is taken literally.
    fn open_raw_body(&mut self, tag: TagName, param: Option<String>, raw: &str, offset: usize) {
        let input = self.input;
        let rest = &input[self.pos..];
        let marker = format!("[/{tag}]");
        let Some(end) = rest.to_ascii_lowercase().find(&marker) else {
            self.error(ParseErrorKind::Unclosed { tag }, offset);
            self.push_text(raw);
            return;
        };
        let body = &rest[..end];
        let source = &input[offset..self.pos + end + marker.len()];
        self.pos += end + marker.len();

        let body_offset = offset + raw.len();
        match self.raw_node(tag, param, body, body_offset) {
            Some(node) => self.push_node(node),
            None => self.push_text(source),
        }
        if tag.is_block() {
            self.skip_newline = true;
        }
    }

    fn raw_node(
        &mut self,
        tag: TagName,
        param: Option<String>,
        body: &str,
        offset: usize,
    ) -> Option<Node> {
        match tag {
            TagName::Code => {
                let body = body.strip_prefix('\n').unwrap_or(body);
                Some(Node::Element(Element {
                    tag,
                    param,
                    children: vec![Node::Text(body.to_string())],
                }))
            }
            TagName::Img | TagName::Audio => match tags::sanitize_url(body) {
                Some(url) => Some(Node::Element(Element {
                    tag,
                    param: Some(url),
                    children: Vec::new(),
                })),
                None => {
                    let url = body.trim().to_string();
                    self.error(ParseErrorKind::InvalidUrl { url }, offset);
                    None
                }
            },
            TagName::Youtube => {
                let id = body.trim();
                if tags::valid_youtube_id(id) {
                    Some(Node::Element(Element {
                        tag,
                        param: Some(id.to_string()),
                        children: Vec::new(),
                    }))
                } else {
                    let id = id.to_string();
                    self.error(ParseErrorKind::InvalidVideoId { id }, offset);
                    None
                }
            }
            TagName::Imagemap => {
                let (map, errors) = imagemap::parse_imagemap(body);
                for reason in errors {
                    self.error(ParseErrorKind::InvalidImageMap { reason }, offset);
                }
                map.map(Node::ImageMap)
            }
            _ => None,
        }
    }

    fn close_tag(&mut self, tag: TagName, raw: &str, offset: usize) {
        let Some(index) = self.stack.iter().rposition(|f| f.tag == tag) else {
            self.error(ParseErrorKind::UnexpectedClose { tag }, offset);
            self.push_text(raw);
            return;
        };
        while self.stack.len() > index + 1 {
            if let Some(inner) = self.stack.pop() {
                if inner.tag == TagName::ListItem {
                    self.close(inner);
                } else {
                    self.unclosed(inner);
                }
            }
        }
        if let Some(frame) = self.stack.pop() {
            self.close(frame);
        }
        self.skip_newline = tag.is_block();
    }

    fn close(&mut self, mut frame: Frame) {
        if frame.degraded {
            self.push_nodes(frame.children);
            return;
        }
        if frame.tag == TagName::Url && frame.param.is_none() {
            let text = plain_text(&frame.children);
            match tags::sanitize_url(&text) {
                Some(url) => frame.param = Some(url),
                None => {
                    self.error(ParseErrorKind::InvalidUrl { url: text }, frame.offset);
                    self.push_nodes(frame.children);
                    return;
                }
            }
        }
        self.push_node(Node::Element(Element {
            tag: frame.tag,
            param: frame.param,
            children: frame.children,
        }));
    }

    /// An open tag that never got closed: report it and keep its marker as
    /// text.
    fn unclosed(&mut self, frame: Frame) {
        self.error(ParseErrorKind::Unclosed { tag: frame.tag }, frame.offset);
        self.push_text(&frame.open_raw);
        let children = frame
            .children
            .into_iter()
            .flat_map(|node| match node {
                Node::Element(Element {
                    tag: TagName::ListItem,
                    children,
                    ..
                }) => std::iter::once(Node::Text("[*]".to_string()))
                    .chain(children)
                    .collect::<Vec<_>>(),
                other => vec![other],
            })
            .collect();
        self.push_nodes(children);
    }
}

/// Concatenated text content, line breaks as `\n`.
pub fn plain_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::LineBreak => out.push('\n'),
            Node::Element(element) => out.push_str(&plain_text(&element.children)),
            Node::ImageMap(_) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    fn el(tag: TagName, param: Option<&str>, children: Vec<Node>) -> Node {
        Node::Element(Element {
            tag,
            param: param.map(str::to_string),
            children,
        })
    }

    #[test]
    fn nested_tags_in_order() {
        let doc = parse("[b][i]x[/i][/b]");
        assert!(doc.is_valid());
        assert_eq!(
            doc.nodes,
            vec![el(TagName::B, None, vec![el(TagName::I, None, vec![text("x")])])]
        );
    }

    #[test]
    fn unclosed_tag_is_one_error() {
        let doc = parse("[b]text");
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].kind, ParseErrorKind::Unclosed { tag: TagName::B });
        assert_eq!(doc.nodes, vec![text("[b]text")]);
    }

    #[test]
    fn stray_close_is_kept_as_text() {
        let doc = parse("a[/i]b");
        assert_eq!(doc.error_messages(), vec!["closing tag [/i] has no matching opening tag"]);
        assert_eq!(doc.nodes, vec![text("a[/i]b")]);
    }

    #[test]
    fn crossed_tags_report_each_defect() {
        let doc = parse("[b][i]x[/b][/i]");
        assert_eq!(doc.errors.len(), 2);
        assert_eq!(doc.errors[0].kind, ParseErrorKind::Unclosed { tag: TagName::I });
        assert_eq!(doc.errors[1].kind, ParseErrorKind::UnexpectedClose { tag: TagName::I });
        assert_eq!(
            doc.nodes,
            vec![el(TagName::B, None, vec![text("[i]x")]), text("[/i]")]
        );
    }

    #[test]
    fn unknown_brackets_are_text() {
        let doc = parse("[script]alert(1)[/script] [b=1]x [ ]");
        assert!(doc.is_valid());
        assert_eq!(doc.nodes, vec![text("[script]alert(1)[/script] [b=1]x [ ]")]);
    }

    #[test]
    fn tag_names_ignore_case() {
        let doc = parse("[B]x[/b]");
        assert!(doc.is_valid());
        assert_eq!(doc.nodes, vec![el(TagName::B, None, vec![text("x")])]);
    }

    #[test]
    fn code_body_is_raw() {
        let doc = parse("[code]\n[b]not bold[/b]\n[/code]after");
        assert!(doc.is_valid());
        assert_eq!(
            doc.nodes,
            vec![
                el(TagName::Code, None, vec![text("[b]not bold[/b]\n")]),
                text("after")
            ]
        );
    }

    #[test]
    fn block_tags_swallow_one_newline() {
        let doc = parse("[centre]\nhi\n[/centre]\nnext");
        assert!(doc.is_valid());
        assert_eq!(
            doc.nodes,
            vec![
                el(TagName::Centre, None, vec![text("hi"), Node::LineBreak]),
                text("next")
            ]
        );
    }

    #[test]
    fn list_items_close_each_other() {
        let doc = parse("[list]\n[*]one\n[*]two\n[/list]");
        assert!(doc.is_valid());
        let Node::Element(list) = &doc.nodes[0] else {
            panic!("expected list element");
        };
        assert_eq!(list.tag, TagName::List);
        let items: Vec<_> = list
            .children
            .iter()
            .filter(|n| matches!(n, Node::Element(e) if e.tag == TagName::ListItem))
            .collect();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            &el(TagName::ListItem, None, vec![text("one"), Node::LineBreak])
        );
    }

    #[test]
    fn list_item_outside_list_is_text() {
        let doc = parse("[*] not a list");
        assert!(doc.is_valid());
        assert_eq!(doc.nodes, vec![text("[*] not a list")]);
    }

    #[test]
    fn quoted_parameter() {
        let doc = parse("[quote=\"peppy\"]hi[/quote]");
        assert!(doc.is_valid());
        assert_eq!(doc.nodes, vec![el(TagName::Quote, Some("peppy"), vec![text("hi")])]);
    }

    #[test]
    fn url_forms() {
        let doc = parse("[url]https://osu.ppy.sh[/url] [url=/home]home[/url]");
        assert!(doc.is_valid());
        assert_eq!(
            doc.nodes,
            vec![
                el(TagName::Url, Some("https://osu.ppy.sh"), vec![text("https://osu.ppy.sh")]),
                text(" "),
                el(TagName::Url, Some("/home"), vec![text("home")]),
            ]
        );
    }

    #[test]
    fn unsafe_url_degrades_to_text() {
        let doc = parse("[url=javascript:alert(1)]click[/url]");
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.nodes, vec![text("click")]);
    }

    #[test]
    fn invalid_color_degrades_to_content() {
        let doc = parse("[color=red;x:y]hi[/color]");
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.nodes, vec![text("hi")]);
    }

    #[test]
    fn size_is_clamped() {
        let doc = parse("[size=999]big[/size]");
        assert!(doc.is_valid());
        assert_eq!(doc.nodes, vec![el(TagName::Size, Some("200"), vec![text("big")])]);
    }

    #[test]
    fn unclosed_raw_tag() {
        let doc = parse("[code]never closed");
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.nodes, vec![text("[code]never closed")]);
    }

    #[test]
    fn bad_image_url_is_reported() {
        let doc = parse("[img]javascript:alert(1)[/img]");
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.nodes, vec![text("[img]javascript:alert(1)[/img]")]);
    }

    #[test]
    fn too_long_input() {
        let doc = parse_with_limit("[b]abcdef[/b]", 5);
        assert_eq!(
            doc.errors[0].kind,
            ParseErrorKind::TooLong {
                length: 13,
                limit: 5
            }
        );
        assert_eq!(doc.nodes, vec![text("[b]abcdef[/b]")]);
    }

    #[test]
    fn unclosed_list_keeps_item_markers() {
        let doc = parse("[list][*]a");
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.nodes, vec![text("[list][*]a")]);
    }
}
