//! HTML output for parsed BBCode.
//!
//! Text and attribute values are always escaped; only the tags below ever
//! produce markup. The class names are the ones the portal's stylesheet and
//! [`super::mount::MountedContent`] look for.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::bbcode::imagemap::ImageMap;
use crate::bbcode::parser::{self, Element, Node};
use crate::bbcode::tags::{self, TagName};

pub const SPOILERBOX_TITLE: &str = "SPOILER";

/// Parse and render in one go, ignoring errors.
pub fn to_html(input: &str) -> String {
    render(&parser::parse(input).nodes)
}

pub fn render(nodes: &[Node]) -> String {
    let mut out = String::new();
    render_into(&mut out, nodes);
    out
}

fn render_into(out: &mut String, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&encode_text(text)),
            Node::LineBreak => out.push_str("<br />"),
            Node::Element(element) => render_element(out, element),
            Node::ImageMap(map) => render_imagemap(out, map),
        }
    }
}

fn attr(value: &str) -> std::borrow::Cow<'_, str> {
    encode_double_quoted_attribute(value)
}

/// Writes `<a ...` without closing the start tag. External links always get
/// a new tab and `noopener noreferrer`.
fn link_open(out: &mut String, href: &str, class: Option<&str>, nofollow: bool) {
    out.push_str("<a");
    if let Some(class) = class {
        out.push_str(&format!(" class=\"{class}\""));
    }
    out.push_str(&format!(" href=\"{}\"", attr(href)));
    let external = tags::is_external(href);
    if external {
        out.push_str(" target=\"_blank\"");
    }
    let rel = match (nofollow, external) {
        (true, true) => "nofollow noopener noreferrer",
        (false, true) => "noopener noreferrer",
        (true, false) => "nofollow",
        (false, false) => return,
    };
    out.push_str(&format!(" rel=\"{rel}\""));
}

fn wrap(out: &mut String, open: &str, children: &[Node], close: &str) {
    out.push_str(open);
    render_into(out, children);
    out.push_str(close);
}

fn render_element(out: &mut String, element: &Element) {
    let param = element.param.as_deref().unwrap_or_default();
    let children = &element.children;
    match element.tag {
        TagName::B => wrap(out, "<strong>", children, "</strong>"),
        TagName::I => wrap(out, "<em>", children, "</em>"),
        TagName::U => wrap(out, "<u>", children, "</u>"),
        TagName::S => wrap(out, "<del>", children, "</del>"),
        TagName::Color => wrap(
            out,
            &format!("<span style=\"color:{};\">", attr(param)),
            children,
            "</span>",
        ),
        TagName::Size => wrap(
            out,
            &format!("<span style=\"font-size:{}%;\">", attr(param)),
            children,
            "</span>",
        ),
        TagName::Url => {
            link_open(out, param, None, true);
            out.push('>');
            render_into(out, children);
            out.push_str("</a>");
        }
        TagName::Img => out.push_str(&format!(
            "<img class=\"bbcode__image\" loading=\"lazy\" data-src=\"{}\" alt=\"\" />",
            attr(param)
        )),
        TagName::Quote => {
            out.push_str("<blockquote>");
            if !param.is_empty() {
                out.push_str(&format!("<h4>{} wrote:</h4>", encode_text(param)));
            }
            render_into(out, children);
            out.push_str("</blockquote>");
        }
        TagName::Code => {
            out.push_str("<pre><code>");
            out.push_str(&encode_text(&parser::plain_text(children)));
            out.push_str("</code></pre>");
        }
        TagName::List => {
            let (open, close) = if element.param.is_some() {
                ("<ol>", "</ol>")
            } else {
                ("<ul>", "</ul>")
            };
            out.push_str(open);
            for child in children {
                match child {
                    Node::LineBreak => {}
                    Node::Text(text) if text.trim().is_empty() => {}
                    other => render_into(out, std::slice::from_ref(other)),
                }
            }
            out.push_str(close);
        }
        TagName::ListItem => {
            let trimmed = match children.split_last() {
                Some((Node::LineBreak, rest)) => rest,
                _ => children.as_slice(),
            };
            wrap(out, "<li>", trimmed, "</li>");
        }
        TagName::Centre => wrap(out, "<center>", children, "</center>"),
        TagName::Heading => wrap(out, "<h2>", children, "</h2>"),
        TagName::Spoiler => wrap(out, "<span class=\"spoiler\">", children, "</span>"),
        TagName::Spoilerbox => render_box(out, SPOILERBOX_TITLE, children),
        TagName::Box => render_box(out, param, children),
        TagName::Notice => wrap(out, "<div class=\"well\">", children, "</div>"),
        TagName::Youtube => out.push_str(&format!(
            "<div class=\"bbcode__video-box\"><iframe class=\"u-embed-wide\" \
             src=\"https://www.youtube.com/embed/{}?rel=0\" allowfullscreen></iframe></div>",
            attr(param)
        )),
        TagName::Audio => out.push_str(&format!(
            "<audio controls=\"controls\" preload=\"none\" src=\"{}\"></audio>",
            attr(param)
        )),
        // Parsed into Node::ImageMap; an Element never carries this tag.
        TagName::Imagemap => render_into(out, children),
    }
}

fn render_box(out: &mut String, title: &str, children: &[Node]) {
    out.push_str(
        "<div class=\"js-spoilerbox bbcode-spoilerbox\">\
         <button type=\"button\" class=\"js-spoilerbox__link bbcode-spoilerbox__link\" \
         aria-expanded=\"false\"><span class=\"bbcode-spoilerbox__link-icon\"></span>",
    );
    out.push_str(&encode_text(title));
    out.push_str("</button><div class=\"js-spoilerbox__body bbcode-spoilerbox__body\">");
    render_into(out, children);
    out.push_str("</div></div>");
}

fn render_imagemap(out: &mut String, map: &ImageMap) {
    out.push_str(&format!(
        "<div class=\"imagemap\"><img class=\"imagemap__image\" loading=\"lazy\" data-src=\"{}\" alt=\"\" />",
        attr(&map.image_url)
    ));
    for region in &map.regions {
        let style = region.style();
        let title = attr(&region.title);
        match &region.link {
            Some(link) => {
                link_open(out, link, Some("imagemap__link"), false);
                out.push_str(&format!(" title=\"{title}\" style=\"{style}\"></a>"));
            }
            None => out.push_str(&format!(
                "<span class=\"imagemap__link\" title=\"{title}\" style=\"{style}\"></span>"
            )),
        }
    }
    out.push_str("</div>");
}
