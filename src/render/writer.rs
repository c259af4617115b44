//! Segment writer: runs the dispatched action of every resolved token and
//! collects ordered output segments for the layout pass.

use crate::html::HtmlState;
use crate::model::{OutputSegment, TagCommand, Token};
use crate::tags::{self, FormulaKind, RenderAction};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static RE_PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Output formats `\image` may name before the file.
const IMAGE_FORMATS: &[&str] = &["html", "latex", "rtf", "docbook", "xml"];

const PARAM_TYPE_UNKNOWN: &str = "none";

/// Render resolved tokens into segments. Segment order is the index of the
/// token that produced it.
pub fn write(tokens: &[Token], param_types: &HashMap<String, String>) -> Vec<OutputSegment> {
    let mut writer = Writer::new(param_types);
    for (order, token) in tokens.iter().enumerate() {
        writer.token(order, token);
    }
    writer.segments
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    /// `Label: text`
    Labeled,
    /// One line per parameter, whitespace collapsed.
    Params,
    /// Untitled paragraph started by a tag.
    Plain,
}

#[derive(Debug)]
struct OpenSection {
    tag: String,
    body: Body,
}

impl OpenSection {
    fn mergeable(&self) -> bool {
        self.body != Body::Plain
    }
}

struct Writer<'a> {
    param_types: &'a HashMap<String, String>,
    segments: Vec<OutputSegment>,
    /// Text of the output line being written.
    line: String,
    open: Option<OpenSection>,
    /// Tag of the section closed last, while its break is still pending.
    closed: Option<String>,
    pending_break: bool,
    /// Drop leading whitespace of the next text.
    trim_next: bool,
    /// Drop one leading newline of the next text.
    eat_newline: bool,
    html: HtmlState,
}

impl<'a> Writer<'a> {
    fn new(param_types: &'a HashMap<String, String>) -> Self {
        Self {
            param_types,
            segments: Vec::new(),
            line: String::new(),
            open: None,
            closed: None,
            pending_break: false,
            trim_next: false,
            eat_newline: false,
            html: HtmlState::default(),
        }
    }

    fn token(&mut self, order: usize, token: &Token) {
        match token {
            Token::Text(text) => self.text(order, text),
            Token::Tag(tag) => self.tag(order, tag),
            Token::BraceOpen | Token::BraceClose => self.emit(order, &token.literal()),
            Token::MarkerOpen(marker) | Token::MarkerClose(marker) => {
                self.emit(order, marker.delim)
            }
            Token::Html(tag) => {
                let text = self.html.render(tag, &self.line);
                self.emit(order, &text);
            }
        }
    }

    // -- Text ------------------------------------------------------------------

    fn text(&mut self, order: usize, text: &str) {
        let mut rest = text;
        while let Some(open) = &self.open {
            let collapse = open.body == Body::Params;
            let (body, tail) = match RE_PARAGRAPH_BREAK.find(rest) {
                Some(m) => (&rest[..m.start()], Some(&rest[m.end()..])),
                None => (rest, None),
            };
            if collapse {
                let body = RE_WHITESPACE.replace_all(body, " ");
                self.emit(order, &body);
            } else {
                self.emit(order, body);
            }
            let Some(tail) = tail else {
                return;
            };
            self.close_section();
            rest = tail;
        }
        self.emit(order, rest);
    }

    /// Content path: applies the pending trims and the pending section break.
    fn emit(&mut self, order: usize, text: &str) {
        let mut text = text;
        if self.eat_newline && !text.is_empty() {
            let after = text.trim_start_matches([' ', '\t']);
            text = after.strip_prefix('\n').unwrap_or(text);
            self.eat_newline = false;
        }
        if self.trim_next {
            text = text.trim_start();
            if text.is_empty() {
                return;
            }
            self.trim_next = false;
        }
        if text.is_empty() {
            return;
        }
        if self.pending_break {
            if text.trim().is_empty() {
                return;
            }
            self.flush_break(order);
        }
        self.push_text(order, text);
    }

    fn push_text(&mut self, order: usize, text: &str) {
        match text.rfind('\n') {
            Some(at) => self.line = text[at + 1..].to_string(),
            None => self.line.push_str(text),
        }
        self.segments.push(OutputSegment::text(order, text));
    }

    fn push_label(&mut self, order: usize, label: String) {
        self.line = label.clone();
        self.segments.push(OutputSegment::label(order, label));
    }

    fn ensure_line_start(&mut self, order: usize) {
        if !self.line.trim().is_empty() {
            self.push_text(order, "\n");
        }
    }

    /// Text on lines of its own: block formulas, images, code.
    fn emit_block(&mut self, order: usize, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.flush_break(order);
        self.trim_next = false;
        self.ensure_line_start(order);
        self.push_text(order, text);
        self.push_text(order, "\n");
        self.eat_newline = true;
    }

    // -- Sections --------------------------------------------------------------

    fn close_section(&mut self) {
        if let Some(open) = self.open.take() {
            self.closed = open.mergeable().then_some(open.tag);
            self.pending_break = true;
            self.trim_next = false;
        }
    }

    fn flush_break(&mut self, order: usize) {
        if self.pending_break {
            self.segments.push(OutputSegment::brk(order));
            self.pending_break = false;
            self.closed = None;
            self.line.clear();
        }
    }

    /// True when `tag` continues the section that is open or was just closed
    /// by a blank line, so it shares that label.
    fn continues(&mut self, tag: &str) -> bool {
        if let Some(open) = &self.open {
            return open.mergeable() && open.tag == tag;
        }
        if self.pending_break && self.closed.as_deref() == Some(tag) {
            self.pending_break = false;
            self.closed = None;
            return true;
        }
        false
    }

    fn open_section(&mut self, tag: &TagCommand, body: Body) {
        self.open = Some(OpenSection {
            tag: tag.name.clone(),
            body,
        });
        self.trim_next = true;
    }

    fn labeled(&mut self, order: usize, tag: &TagCommand, label: &str, continuing: bool) {
        if continuing {
            self.ensure_line_start(order);
        } else {
            self.flush_break(order);
            self.push_label(order, format!("{label}: "));
        }
        self.open_section(tag, Body::Labeled);
    }

    fn param(&mut self, order: usize, tag: &TagCommand, continuing: bool) {
        if !continuing {
            self.flush_break(order);
            self.push_label(order, "Arguments:".to_string());
        }
        self.ensure_line_start(order);
        let name = tag.arg_or_empty();
        let ty = self
            .param_types
            .get(name)
            .map_or(PARAM_TYPE_UNKNOWN, String::as_str);
        self.push_text(order, &format!("  {name} ({ty}) -- "));
        self.open_section(tag, Body::Params);
    }

    fn title(&mut self, order: usize, tag: &TagCommand) {
        let title = tag.arg_or_empty();
        if title.is_empty() {
            self.open_section(tag, Body::Plain);
            return;
        }
        self.flush_break(order);
        self.push_label(order, format!("Title: {title}"));
        self.push_text(order, "\n");
        self.open_section(tag, Body::Plain);
    }

    // -- Tags ------------------------------------------------------------------

    fn tag(&mut self, order: usize, tag: &TagCommand) {
        let action = tags::dispatch(tag);
        let mut continuing = false;
        if action.starts_block() {
            continuing = action.shares_label() && self.continues(&tag.name);
            if !continuing {
                self.close_section();
            }
        }
        tracing::trace!(tag = %tag.name, ?action, continuing, "dispatch");

        let arg = tag.arg_or_empty();
        match action {
            RenderAction::Section { label } => self.labeled(order, tag, label, continuing),
            RenderAction::SectionEach { label } => self.labeled(order, tag, label, false),
            RenderAction::Params => self.param(order, tag, continuing),
            RenderAction::Title => self.title(order, tag),
            RenderAction::Paragraph => self.open_section(tag, Body::Plain),
            RenderAction::Inline { wrap } => {
                if !arg.is_empty() {
                    self.emit(order, &format!("{wrap}{arg}{wrap}"));
                }
            }
            RenderAction::Reference => {
                let target = reference_text(arg);
                if !target.is_empty() {
                    self.emit(order, &format!("'{target}'"));
                }
            }
            RenderAction::ListItem => {
                self.flush_break(order);
                self.ensure_line_start(order);
                self.push_text(order, " - ");
                self.trim_next = true;
            }
            RenderAction::Message(text) => self.emit(order, text),
            RenderAction::Newline => {
                if !self.pending_break {
                    self.push_text(order, "\n");
                }
            }
            RenderAction::Verbatim => {
                let code = strip_language(arg).trim_matches('\n').trim_end();
                self.emit_block(order, code);
            }
            RenderAction::FormatRestricted => self.emit(order, arg.trim()),
            RenderAction::Formula(FormulaKind::Inline) => self.emit(order, arg),
            RenderAction::Formula(kind) => {
                let formula = match kind {
                    FormulaKind::Environment => arg.split_once("}{").map_or(arg, |(_, body)| body),
                    _ => arg,
                };
                self.emit_block(order, &format!("    {}", formula.trim()));
            }
            RenderAction::Image => self.emit_block(order, &image_text(arg)),
            RenderAction::Include => self.emit(order, arg),
            RenderAction::Ignore => {}
            RenderAction::Structural(_) | RenderAction::PassThrough => {
                tracing::debug!(tag = %tag.raw, "tag passed through literally");
                self.emit(order, &tag.raw);
            }
        }
    }
}

/// `name "Title"` → `Title`, `name` → `name`.
fn reference_text(arg: &str) -> &str {
    match arg.split_once(" \"") {
        Some((_, title)) => title.trim_end_matches('"'),
        None => arg,
    }
}

/// Drops a `{.py}` language hint at the start of a code block.
fn strip_language(code: &str) -> &str {
    let trimmed = code.trim_start_matches([' ', '\t']);
    if trimmed.starts_with('{') {
        if let Some(close) = trimmed.find('}') {
            if !trimmed[..close].contains('\n') {
                return &trimmed[close + 1..];
            }
        }
    }
    code
}

/// `html file.png "Caption" width=10` → `Image: file.png("Caption")`.
fn image_text(arg: &str) -> String {
    let (head, caption) = match arg.split_once('"') {
        Some((head, rest)) => (head, rest.split('"').next()),
        None => (arg, None),
    };
    let mut words = head.split_whitespace().peekable();
    if words.peek().is_some_and(|w| IMAGE_FORMATS.contains(w)) {
        words.next();
    }
    let file = words.next().unwrap_or("");
    match caption {
        Some(caption) => format!("Image: {file}(\"{caption}\")"),
        None => format!("Image: {file}"),
    }
}
