//! Text buffer behind the BBCode editor: toolbar actions wrap the selection
//! in tag markers and keyboard shortcuts map onto those actions.
//!
//! Positions are counted in characters, not bytes, so selections behave the
//! same for CJK text as for ASCII.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::EnumIter)]
pub enum ToolbarAction {
    Bold,
    Italic,
    Underline,
    Strike,
    Color,
    Size,
    Link,
    Image,
    Quote,
    Code,
    List,
    OrderedList,
    Centre,
    Heading,
    Spoiler,
    Spoilerbox,
    Notice,
    Youtube,
    Audio,
    Imagemap,
}

impl ToolbarAction {
    pub fn markers(self) -> (&'static str, &'static str) {
        match self {
            ToolbarAction::Bold => ("[b]", "[/b]"),
            ToolbarAction::Italic => ("[i]", "[/i]"),
            ToolbarAction::Underline => ("[u]", "[/u]"),
            ToolbarAction::Strike => ("[s]", "[/s]"),
            ToolbarAction::Color => ("[color=#ff66aa]", "[/color]"),
            ToolbarAction::Size => ("[size=150]", "[/size]"),
            ToolbarAction::Link => ("[url=https://example.com]", "[/url]"),
            ToolbarAction::Image => ("[img]", "[/img]"),
            ToolbarAction::Quote => ("[quote]", "[/quote]"),
            ToolbarAction::Code => ("[code]", "[/code]"),
            ToolbarAction::List => ("[list]\n[*]", "\n[/list]"),
            ToolbarAction::OrderedList => ("[list=1]\n[*]", "\n[/list]"),
            ToolbarAction::Centre => ("[centre]", "[/centre]"),
            ToolbarAction::Heading => ("[heading]", "[/heading]"),
            ToolbarAction::Spoiler => ("[spoiler]", "[/spoiler]"),
            ToolbarAction::Spoilerbox => ("[spoilerbox]", "[/spoilerbox]"),
            ToolbarAction::Notice => ("[notice]", "[/notice]"),
            ToolbarAction::Youtube => ("[youtube]", "[/youtube]"),
            ToolbarAction::Audio => ("[audio]", "[/audio]"),
            ToolbarAction::Imagemap => ("[imagemap]\n", "\n[/imagemap]"),
        }
    }

    /// Inserted when nothing is selected.
    pub fn placeholder(self) -> &'static str {
        match self {
            ToolbarAction::Bold => "粗体文本",
            ToolbarAction::Italic => "斜体文本",
            ToolbarAction::Underline => "下划线文本",
            ToolbarAction::Strike => "删除线文本",
            ToolbarAction::Color => "彩色文本",
            ToolbarAction::Size => "大号文本",
            ToolbarAction::Link => "链接文本",
            ToolbarAction::Image => "https://example.com/image.png",
            ToolbarAction::Quote => "引用内容",
            ToolbarAction::Code => "代码",
            ToolbarAction::List | ToolbarAction::OrderedList => "列表项",
            ToolbarAction::Centre => "居中文本",
            ToolbarAction::Heading => "标题",
            ToolbarAction::Spoiler => "剧透内容",
            ToolbarAction::Spoilerbox => "折叠内容",
            ToolbarAction::Notice => "公告内容",
            ToolbarAction::Youtube => "dQw4w9WgXcQ",
            ToolbarAction::Audio => "https://example.com/audio.mp3",
            ToolbarAction::Imagemap => "https://example.com/image.png\n0 0 50 50 # 区域说明",
        }
    }
}

/// A key press with its modifiers, as delivered by the input widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyCombo {
    pub key: char,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyCombo {
    /// Ctrl on most platforms, Cmd on macOS.
    pub fn primary(key: char) -> Self {
        Self {
            key,
            ctrl: true,
            ..Self::default()
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// Map a key combination to a toolbar action. Unknown combinations map to
/// nothing.
pub fn shortcut_action(combo: KeyCombo) -> Option<ToolbarAction> {
    if !(combo.ctrl || combo.meta) || combo.alt {
        return None;
    }
    match (combo.key.to_ascii_lowercase(), combo.shift) {
        ('b', false) => Some(ToolbarAction::Bold),
        ('i', false) => Some(ToolbarAction::Italic),
        ('u', false) => Some(ToolbarAction::Underline),
        ('s', true) => Some(ToolbarAction::Strike),
        ('k', false) => Some(ToolbarAction::Link),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorBuffer {
    text: String,
    selection: Range<usize>,
    focused: bool,
}

impl EditorBuffer {
    /// New buffer with the caret at the end.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let end = text.chars().count();
        Self {
            text,
            selection: end..end,
            focused: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn selection(&self) -> Range<usize> {
        self.selection.clone()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn selected_text(&self) -> &str {
        let range = self.byte_range(self.selection.clone());
        &self.text[range]
    }

    /// Replace the whole text, as a controlled input does on change. The
    /// selection is clamped to the new length.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        let len = self.char_len();
        self.selection = self.selection.start.min(len)..self.selection.end.min(len);
    }

    /// Select a character range; reversed ranges are normalised.
    pub fn select(&mut self, start: usize, end: usize) {
        let len = self.char_len();
        let (start, end) = (start.min(end).min(len), start.max(end).min(len));
        self.selection = start..end;
    }

    /// Replace the selection with typed text and put the caret after it.
    pub fn insert(&mut self, s: &str) {
        let start = self.selection.start;
        self.replace_selection(s);
        let caret = start + s.chars().count();
        self.selection = caret..caret;
    }

    /// Wrap the selection (or the action's placeholder) in the action's
    /// markers and select the wrapped text.
    pub fn apply(&mut self, action: ToolbarAction) {
        let (open, close) = action.markers();
        let inner = match self.selected_text() {
            "" => action.placeholder().to_string(),
            selected => selected.to_string(),
        };
        let start = self.selection.start;
        self.replace_selection(&format!("{open}{inner}{close}"));
        let inner_start = start + open.chars().count();
        self.selection = inner_start..inner_start + inner.chars().count();
        self.focused = true;
    }

    /// Apply the action bound to a key combination. Returns the action, or
    /// `None` when the combination is not a shortcut and nothing changed.
    pub fn handle_key(&mut self, combo: KeyCombo) -> Option<ToolbarAction> {
        let action = shortcut_action(combo)?;
        self.apply(action);
        Some(action)
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.text
            .char_indices()
            .nth(chars)
            .map_or(self.text.len(), |(i, _)| i)
    }

    fn byte_range(&self, range: Range<usize>) -> Range<usize> {
        self.byte_offset(range.start)..self.byte_offset(range.end)
    }

    fn replace_selection(&mut self, replacement: &str) {
        let range = self.byte_range(self.selection.clone());
        self.text.replace_range(range, replacement);
    }
}
