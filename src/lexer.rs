//! Tokenizer: raw comment text to a flat token sequence.
//!
//! Single left-to-right scan. Tag arguments are captured according to the
//! tag table, so the tokenizer and the dispatcher always agree on where an
//! argument ends.

use crate::html;
use crate::model::{merge_text, HtmlTag, Marker, MarkerKind, TagCommand, Token};
use crate::tags::{self, ArgShape, RenderAction};
use regex::Regex;
use std::sync::LazyLock;

/// Characters that `\` escapes to themselves.
const ESCAPED_SYMBOLS: &[char] = &['$', '@', '\\', '&', '~', '<', '>', '#', '%', '"', '.'];

/// Trailing punctuation left out of word arguments (`\b word.`).
const WORD_TRAILING_PUNCT: &[char] = &['.', ',', ';', ':', '!', '?'];

static RE_HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<(/?)([A-Za-z][A-Za-z0-9]*)((?:\s[^<>]*?)?)\s*/?>").unwrap()
});

static RE_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^&([A-Za-z]+);").unwrap());

/// Scan `raw` into tokens.
pub fn tokenize(raw: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(raw);
    lexer.run();
    lexer.finish()
}

struct OpenMarker {
    index: usize,
    marker: Marker,
    depth: usize,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    text: String,
    /// One entry per unclosed `{`; `true` when structural.
    braces: Vec<bool>,
    structural_depth: usize,
    markers: Vec<OpenMarker>,
    /// Set after a structural tag until the next significant character.
    expect_brace: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            tokens: Vec::new(),
            text: String::new(),
            braces: Vec::new(),
            structural_depth: 0,
            markers: Vec::new(),
            expect_brace: false,
        }
    }

    fn run(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() && c != '{' {
                self.expect_brace = false;
            }
            match c {
                '\\' => self.escape(),
                '{' => self.open_brace(),
                '}' => self.close_brace(),
                '`' => self.code_span(),
                '*' | '_' => self.emphasis(c),
                '<' => self.html_tag(),
                '&' => self.entity(),
                '\n' => {
                    self.literal_char('\n');
                    if self.at_blank_line() {
                        self.demote_markers(0);
                    }
                }
                _ => self.literal_char(c),
            }
        }
    }

    fn finish(mut self) -> Vec<Token> {
        self.flush_text();
        self.demote_markers(0);
        merge_text(self.tokens)
    }

    // -- Scanning helpers ------------------------------------------------------

    fn rest(&self) -> &'a str {
        let src: &'a str = self.src;
        &src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset..)?.chars().next()
    }

    fn prev_char(&self) -> Option<char> {
        self.src[..self.pos].chars().next_back()
    }

    fn literal_char(&mut self, c: char) {
        self.text.push(c);
        self.pos += c.len_utf8();
    }

    fn skip_blanks(&mut self) {
        let skipped = self.rest().len() - self.rest().trim_start_matches([' ', '\t']).len();
        self.pos += skipped;
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            self.tokens.push(Token::Text(std::mem::take(&mut self.text)));
        }
    }

    fn push(&mut self, token: Token) {
        self.flush_text();
        self.tokens.push(token);
    }

    /// True when the line after the newline just consumed is blank.
    fn at_blank_line(&self) -> bool {
        self.rest().trim_start_matches([' ', '\t']).starts_with('\n')
    }

    // -- Tag commands ----------------------------------------------------------

    fn escape(&mut self) {
        let src = self.src;
        let start = self.pos;
        let after = &src[start + 1..];

        if after.starts_with("::") {
            self.text.push_str("::");
            self.pos += 3;
            return;
        }
        let Some(next) = after.chars().next() else {
            self.literal_char('\\');
            return;
        };
        if ESCAPED_SYMBOLS.contains(&next) {
            self.text.push(next);
            self.pos += 1 + next.len_utf8();
            return;
        }
        if !next.is_ascii_alphabetic() {
            self.literal_char('\\');
            return;
        }

        let name_len = after
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(after.len());
        let mut name = after[..name_len].to_string();
        self.pos += 1 + name_len;

        // Formula openers: \f$ \f[ \f{
        if name == "f" {
            if let Some(delim @ ('$' | '[' | '{')) = self.peek() {
                name.push(delim);
                self.pos += 1;
            }
        }

        let Some(spec) = tags::lookup(&name) else {
            self.push(Token::Tag(TagCommand {
                raw: self.src[start..self.pos].to_string(),
                name,
                arg: None,
            }));
            return;
        };

        let arg = self.capture_arg(spec.arg);
        self.push(Token::Tag(TagCommand {
            raw: self.src[start..self.pos].to_string(),
            name,
            arg,
        }));
        if let RenderAction::Structural(kind) = spec.action {
            self.expect_brace = kind.opens_brace();
        }
    }

    fn capture_arg(&mut self, shape: ArgShape) -> Option<String> {
        match shape {
            ArgShape::None => None,
            ArgShape::Word => {
                self.skip_blanks();
                Some(self.word())
            }
            ArgShape::OptionalWord => {
                let blanks = self.rest().len() - self.rest().trim_start_matches([' ', '\t']).len();
                let next = self.peek_at(blanks);
                if next.is_some_and(|c| c.is_alphanumeric() || c == '_') {
                    self.pos += blanks;
                    Some(self.word())
                } else {
                    None
                }
            }
            ArgShape::Param => {
                self.skip_blanks();
                if self.peek() == Some('[') {
                    if let Some(close) = self.rest().find(']') {
                        if !self.rest()[..close].contains('\n') {
                            self.pos += close + 1;
                            self.skip_blanks();
                        }
                    }
                }
                Some(self.word())
            }
            ArgShape::Reference => {
                self.skip_blanks();
                let mut arg = self.word();
                let blanks = self.rest().len() - self.rest().trim_start_matches([' ', '\t']).len();
                if self.peek_at(blanks) == Some('"') {
                    let title_start = self.pos + blanks + 1;
                    let line_end = self.src[title_start..]
                        .find('\n')
                        .map_or(self.src.len(), |i| title_start + i);
                    if let Some(close) = self.src[title_start..line_end].find('"') {
                        arg.push_str(" \"");
                        arg.push_str(&self.src[title_start..title_start + close]);
                        arg.push('"');
                        self.pos = title_start + close + 1;
                    }
                }
                Some(arg)
            }
            ArgShape::Line => {
                let line_len = self.rest().find('\n').unwrap_or(self.rest().len());
                let line = self.rest()[..line_len].trim().to_string();
                self.pos += line_len;
                Some(line)
            }
            ArgShape::Raw { end } => {
                // Inside a conditional branch the payload stops at the branch's `}`.
                let rest = self.rest();
                let limit = if self.structural_depth > 0 {
                    closing_brace(rest)
                } else {
                    rest.len()
                };
                match rest[..limit].find(end) {
                    Some(idx) => {
                        self.pos += idx + end.len();
                        Some(rest[..idx].to_string())
                    }
                    None => {
                        tracing::debug!(end, "unterminated raw block, taking rest of its region");
                        self.pos += limit;
                        Some(rest[..limit].to_string())
                    }
                }
            }
        }
    }

    /// Next word: up to whitespace, `\`, `{` or `}`, minus trailing punctuation.
    fn word(&mut self) -> String {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '\\' | '{' | '}'))
            .unwrap_or(rest.len());
        let word = rest[..len].trim_end_matches(WORD_TRAILING_PUNCT);
        self.pos += word.len();
        word.to_string()
    }

    // -- Braces ----------------------------------------------------------------

    fn open_brace(&mut self) {
        if std::mem::take(&mut self.expect_brace) {
            self.pos += 1;
            self.push(Token::BraceOpen);
            self.braces.push(true);
            self.structural_depth += 1;
        } else {
            self.literal_char('{');
            self.braces.push(false);
        }
    }

    fn close_brace(&mut self) {
        match self.braces.pop() {
            Some(true) => {
                self.pos += 1;
                self.push(Token::BraceClose);
                self.structural_depth -= 1;
                self.demote_markers_deeper_than(self.structural_depth);
            }
            Some(false) | None => self.literal_char('}'),
        }
    }

    // -- Inline markers --------------------------------------------------------

    fn code_span(&mut self) {
        let next = self.peek_at(1);
        if is_word(self.prev_char()) || next.map_or(true, char::is_whitespace) {
            self.literal_char('`');
            return;
        }
        let src = self.src;
        let body_start = self.pos + 1;
        let Some(close) = src[body_start..].find('`') else {
            self.literal_char('`');
            return;
        };
        let body = &src[body_start..body_start + close];
        if body.contains("\n\n") || body.ends_with(char::is_whitespace) {
            self.literal_char('`');
            return;
        }
        let marker = Marker {
            kind: MarkerKind::Code,
            delim: "`",
        };
        self.push(Token::MarkerOpen(marker));
        self.push(Token::Text(body.to_string()));
        self.push(Token::MarkerClose(marker));
        self.pos = body_start + close + 1;
    }

    fn emphasis(&mut self, c: char) {
        let doubled = self.peek_at(1) == Some(c);
        let marker = match (c, doubled) {
            ('*', true) => Marker { kind: MarkerKind::Strong, delim: "**" },
            ('_', true) => Marker { kind: MarkerKind::Strong, delim: "__" },
            ('*', false) => Marker { kind: MarkerKind::Emphasis, delim: "*" },
            _ => Marker { kind: MarkerKind::Emphasis, delim: "_" },
        };
        let prev = self.prev_char();
        let next = self.peek_at(marker.delim.len());

        let open_at = self.markers.iter().rposition(|m| m.marker == marker);
        if let Some(at) = open_at {
            if prev.is_some_and(|p| !p.is_whitespace()) && !is_word(next) {
                self.pos += marker.delim.len();
                self.demote_markers(at + 1);
                self.markers.pop();
                self.push(Token::MarkerClose(marker));
                return;
            }
        }
        if !is_word(prev) && next.is_some_and(|n| !n.is_whitespace()) {
            self.pos += marker.delim.len();
            self.push(Token::MarkerOpen(marker));
            self.markers.push(OpenMarker {
                index: self.tokens.len() - 1,
                marker,
                depth: self.structural_depth,
            });
            return;
        }
        self.text.push_str(marker.delim);
        self.pos += marker.delim.len();
    }

    /// Turn open markers from position `from` on back into literal text.
    fn demote_markers(&mut self, from: usize) {
        for open in self.markers.drain(from..) {
            tracing::debug!(delim = open.marker.delim, "unterminated inline marker kept literal");
            self.tokens[open.index] = Token::Text(open.marker.delim.to_string());
        }
    }

    fn demote_markers_deeper_than(&mut self, depth: usize) {
        if let Some(from) = self.markers.iter().position(|m| m.depth > depth) {
            self.demote_markers(from);
        }
    }

    // -- HTML ------------------------------------------------------------------

    fn html_tag(&mut self) {
        let Some(caps) = RE_HTML_TAG.captures(self.rest()) else {
            self.literal_char('<');
            return;
        };
        let name = caps[2].to_ascii_lowercase();
        if !html::is_known_tag(&name) {
            self.literal_char('<');
            return;
        }
        let raw = caps[0].to_string();
        let tag = HtmlTag {
            name,
            closing: !caps[1].is_empty(),
            attrs: caps[3].to_string(),
            raw,
        };
        self.pos += tag.raw.len();
        self.push(Token::Html(tag));
    }

    fn entity(&mut self) {
        let replacement = RE_ENTITY
            .captures(self.rest())
            .and_then(|caps| Some((caps[0].len(), html::entity(&caps[1])?)));
        match replacement {
            Some((len, text)) => {
                self.text.push_str(text);
                self.pos += len;
            }
            None => self.literal_char('&'),
        }
    }
}

/// Offset of the `}` that closes the enclosing brace, or the end of `rest`.
fn closing_brace(rest: &str) -> usize {
    let mut depth = 0usize;
    for (i, c) in rest.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return i,
            '}' => depth -= 1,
            _ => {}
        }
    }
    rest.len()
}

fn is_word(c: Option<char>) -> bool {
    c.is_some_and(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    fn tag(name: &str, arg: Option<&str>, raw: &str) -> Token {
        Token::Tag(TagCommand {
            name: name.to_string(),
            arg: arg.map(str::to_string),
            raw: raw.to_string(),
        })
    }

    #[test]
    fn plain_text_is_one_token() {
        assert_eq!(tokenize("hello\nworld"), vec![text("hello\nworld")]);
    }

    #[test]
    fn word_argument() {
        assert_eq!(
            tokenize("call \\c foo now"),
            vec![text("call "), tag("c", Some("foo"), "\\c foo"), text(" now")]
        );
    }

    #[test]
    fn word_argument_leaves_trailing_period() {
        assert_eq!(
            tokenize("\\b func03()."),
            vec![tag("b", Some("func03()"), "\\b func03()"), text(".")]
        );
    }

    #[test]
    fn missing_argument_is_empty() {
        assert_eq!(tokenize("\\c\nx")[0], tag("c", Some(""), "\\c"));
    }

    #[test]
    fn unknown_tag_has_no_argument() {
        assert_eq!(
            tokenize("\\weirdtag arg"),
            vec![tag("weirdtag", None, "\\weirdtag"), text(" arg")]
        );
    }

    #[test]
    fn escaped_symbols() {
        assert_eq!(
            tokenize("\\$ \\@ \\\\ \\& \\~ \\< \\> \\# \\% \\\" \\. \\::"),
            vec![text("$ @ \\ & ~ < > # % \" . ::")]
        );
    }

    #[test]
    fn lone_backslash_is_literal() {
        assert_eq!(tokenize("a \\ b \\1"), vec![text("a \\ b \\1")]);
    }

    #[test]
    fn structural_braces() {
        assert_eq!(
            tokenize("\\if A { x }"),
            vec![
                tag("if", Some("A"), "\\if A"),
                text(" "),
                Token::BraceOpen,
                text(" x "),
                Token::BraceClose,
            ]
        );
    }

    #[test]
    fn literal_braces_stay_text() {
        assert_eq!(
            tokenize("\\if A { f{x} }"),
            vec![
                tag("if", Some("A"), "\\if A"),
                text(" "),
                Token::BraceOpen,
                text(" f{x} "),
                Token::BraceClose,
            ]
        );
        assert_eq!(tokenize("a } b { c"), vec![text("a } b { c")]);
    }

    #[test]
    fn param_direction_dropped() {
        assert_eq!(
            tokenize("\\param[in] a the value")[0],
            tag("param", Some("a"), "\\param[in] a")
        );
    }

    #[test]
    fn reference_with_title() {
        assert_eq!(
            tokenize("\\ref anchor \"Anchor description\" rest")[0],
            tag(
                "ref",
                Some("anchor \"Anchor description\""),
                "\\ref anchor \"Anchor description\""
            )
        );
    }

    #[test]
    fn raw_block_keeps_content() {
        assert_eq!(
            tokenize("\\code x = {1}; \\b y \\endcode after"),
            vec![
                tag(
                    "code",
                    Some(" x = {1}; \\b y "),
                    "\\code x = {1}; \\b y \\endcode"
                ),
                text(" after"),
            ]
        );
    }

    #[test]
    fn structural_brace_consumed_once() {
        let tokens = tokenize("\\if A {x} y");
        assert_eq!(
            tokens,
            vec![
                tag("if", Some("A"), "\\if A"),
                text(" "),
                Token::BraceOpen,
                text("x"),
                Token::BraceClose,
                text(" y"),
            ]
        );
    }

    #[test]
    fn unterminated_raw_block_stops_at_branch_end() {
        assert_eq!(
            tokenize("\\if A { \\code x {1} } after"),
            vec![
                tag("if", Some("A"), "\\if A"),
                text(" "),
                Token::BraceOpen,
                text(" "),
                tag("code", Some(" x {1} "), "\\code x {1} "),
                Token::BraceClose,
                text(" after"),
            ]
        );
        assert_eq!(
            tokenize("\\code x } y")[0],
            tag("code", Some(" x } y"), "\\code x } y")
        );
    }

    #[test]
    fn formula_braces_are_not_structural() {
        let tokens = tokenize("\\f$\\sqrt{(x_2-x_1)^2}\\f$");
        assert_eq!(
            tokens,
            vec![tag(
                "f$",
                Some("\\sqrt{(x_2-x_1)^2}"),
                "\\f$\\sqrt{(x_2-x_1)^2}\\f$"
            )]
        );
    }

    #[test]
    fn emphasis_markers() {
        let strong = Marker {
            kind: MarkerKind::Strong,
            delim: "**",
        };
        assert_eq!(
            tokenize("a **b** c"),
            vec![
                text("a "),
                Token::MarkerOpen(strong),
                text("b"),
                Token::MarkerClose(strong),
                text(" c"),
            ]
        );
    }

    #[test]
    fn snake_case_is_not_a_marker() {
        assert_eq!(tokenize("snake_case_name"), vec![text("snake_case_name")]);
    }

    #[test]
    fn unterminated_marker_is_literal() {
        assert_eq!(tokenize("a *b c"), vec![text("a *b c")]);
        assert_eq!(tokenize("a *b\n\nc*"), vec![text("a *b\n\nc*")]);
    }

    #[test]
    fn code_span_hides_tags() {
        let code = Marker {
            kind: MarkerKind::Code,
            delim: "`",
        };
        assert_eq!(
            tokenize("`\\param`"),
            vec![
                Token::MarkerOpen(code),
                text("\\param"),
                Token::MarkerClose(code),
            ]
        );
    }

    #[test]
    fn html_known_and_unknown() {
        let tokens = tokenize("<b>x</b> <sometag>");
        assert!(matches!(&tokens[0], Token::Html(h) if h.name == "b" && !h.closing));
        assert!(matches!(&tokens[2], Token::Html(h) if h.name == "b" && h.closing));
        assert_eq!(tokens[3], text(" <sometag>"));
    }

    #[test]
    fn entities() {
        assert_eq!(tokenize("&copy; a & b &bogus;"), vec![text("(C) a & b &bogus;")]);
    }
}
