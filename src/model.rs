//! Data model shared by the translation stages: tokens, conditional nodes
//! and output segments.

use std::collections::BTreeSet;
use std::ops::Range;

/// One lexical unit of a raw comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text run.
    Text(String),
    /// `\name` with its optional inline argument.
    Tag(TagCommand),
    /// `{` owned by a structural tag.
    BraceOpen,
    /// `}` closing a structural `{`.
    BraceClose,
    MarkerOpen(Marker),
    MarkerClose(Marker),
    /// `<b>`, `</b>`, `<br/>` for known HTML tag names.
    Html(HtmlTag),
}

impl Token {
    /// Source text of the token, used when a token degrades to literal text.
    pub fn literal(&self) -> String {
        match self {
            Token::Text(text) => text.clone(),
            Token::Tag(tag) => tag.raw.clone(),
            Token::BraceOpen => "{".to_string(),
            Token::BraceClose => "}".to_string(),
            Token::MarkerOpen(marker) | Token::MarkerClose(marker) => marker.delim.to_string(),
            Token::Html(html) => html.raw.clone(),
        }
    }

    /// True for text that contains nothing but whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Token::Text(text) if text.trim().is_empty())
    }
}

/// Join adjacent text tokens.
pub fn merge_text(tokens: Vec<Token>) -> Vec<Token> {
    let mut merged: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Token::Text(text) = &token {
            if let Some(Token::Text(prev)) = merged.last_mut() {
                prev.push_str(text);
                continue;
            }
        }
        merged.push(token);
    }
    merged
}

/// A tag command as it appeared in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCommand {
    pub name: String,
    pub arg: Option<String>,
    /// Exact source text: escape character, name and captured argument.
    pub raw: String,
}

impl TagCommand {
    /// The inline argument, empty when it was missing.
    pub fn arg_or_empty(&self) -> &str {
        self.arg.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Emphasis,
    Strong,
    Code,
}

/// Inline marker together with the punctuation it was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub delim: &'static str,
}

/// An HTML tag embedded in the comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlTag {
    /// Lowercased element name.
    pub name: String,
    /// `</name>`
    pub closing: bool,
    /// Attribute text after the name, untouched.
    pub attrs: String,
    pub raw: String,
}

/// `\if A { … } \elseif B { … } \else { … }` after structural matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalNode {
    pub branches: Vec<Branch>,
    /// Index one past the last token belonging to the node.
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub kind: BranchKind,
    /// Token range of the branch content, delimiters excluded.
    pub body: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchKind {
    If(String),
    IfNot(String),
    ElseIf(String),
    Else,
    /// `\cond` section; `None` when no label was given.
    Cond(Option<String>),
}

impl BranchKind {
    fn is_taken(&self, enabled: &BTreeSet<String>) -> bool {
        match self {
            BranchKind::If(cond) | BranchKind::ElseIf(cond) => enabled.contains(cond),
            BranchKind::IfNot(cond) => !enabled.contains(cond),
            BranchKind::Else => true,
            BranchKind::Cond(label) => label.as_ref().is_some_and(|l| enabled.contains(l)),
        }
    }
}

impl ConditionalNode {
    /// The single branch kept for `enabled`, if any.
    pub fn select(&self, enabled: &BTreeSet<String>) -> Option<&Branch> {
        self.branches.iter().find(|b| b.kind.is_taken(enabled))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Text,
    /// Section label such as `Arguments:` or `Returns: `.
    Label,
    /// End of a section block.
    Break,
}

/// Rendered, resolved text waiting for layout normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSegment {
    /// Position of the originating token in the token stream.
    pub order: usize,
    pub kind: SegmentKind,
    pub text: String,
}

impl OutputSegment {
    pub fn text(order: usize, text: impl Into<String>) -> Self {
        Self {
            order,
            kind: SegmentKind::Text,
            text: text.into(),
        }
    }

    pub fn label(order: usize, text: impl Into<String>) -> Self {
        Self {
            order,
            kind: SegmentKind::Label,
            text: text.into(),
        }
    }

    pub fn brk(order: usize) -> Self {
        Self {
            order,
            kind: SegmentKind::Break,
            text: String::new(),
        }
    }
}
