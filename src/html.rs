//! HTML tags and entities embedded in comments, rendered as plain text.

use crate::model::HtmlTag;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HtmlAction {
    /// Same text on the opening and the closing tag.
    Wrap(&'static str),
    /// Text on the opening tag only.
    Open(&'static str),
    /// `<a href>`: the URL follows the link text.
    Anchor,
    Image,
    Row,
    Cell,
    HeaderCell,
}

const RULE: &str = "--------------------------------------------------------------------\n";

static HTML_TAGS: LazyLock<HashMap<&'static str, HtmlAction>> = LazyLock::new(|| {
    use HtmlAction::*;
    HashMap::from([
        ("a", Anchor),
        ("b", Wrap("__")),
        ("strong", Wrap("__")),
        ("em", Wrap("__")),
        ("i", Wrap("_")),
        ("var", Wrap("_")),
        ("code", Wrap("'")),
        ("tt", Open("")),
        ("kbd", Open("")),
        ("span", Wrap("'")),
        ("blockquote", Open("Quote: ")),
        ("br", Open("\n")),
        ("p", Open("\n")),
        ("hr", Open(RULE)),
        ("h1", Open("# ")),
        ("h2", Open("## ")),
        ("h3", Open("### ")),
        ("li", Open("- ")),
        ("dd", Open("    ")),
        ("sub", Open(" ")),
        ("sup", Open(" ")),
        ("img", Image),
        ("tr", Row),
        ("td", Cell),
        ("th", HeaderCell),
        ("body", Open("")),
        ("caption", Open("")),
        ("center", Open("")),
        ("dfn", Open("")),
        ("div", Open("")),
        ("dl", Open("")),
        ("dt", Open("")),
        ("form", Open("")),
        ("input", Open("")),
        ("meta", Open("")),
        ("multicol", Open("")),
        ("ol", Open("")),
        ("pre", Open("")),
        ("small", Open("")),
        ("table", Open("")),
        ("ul", Open("")),
    ])
});

static ENTITIES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("copy", "(C)"),
        ("trade", " TM"),
        ("reg", "(R)"),
        ("lt", "<"),
        ("gt", ">"),
        ("amp", "&"),
        ("apos", "'"),
        ("quot", "\""),
        ("lsquo", "`"),
        ("rsquo", "'"),
        ("ldquo", "\""),
        ("rdquo", "\""),
        ("ndash", "-"),
        ("mdash", "--"),
        ("nbsp", " "),
        ("times", "x"),
        ("minus", "-"),
        ("sdot", "."),
        ("sim", "~"),
        ("le", "<="),
        ("ge", ">="),
        ("larr", "<--"),
        ("rarr", "-->"),
    ])
});

static RE_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});

static RE_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});

/// True for element names rendered by [`HtmlState`].
pub fn is_known_tag(name: &str) -> bool {
    HTML_TAGS.contains_key(name)
}

/// Plain-text replacement for a named entity (`copy` for `&copy;`).
pub fn entity(name: &str) -> Option<&'static str> {
    ENTITIES.get(name).copied()
}

fn attr_value(re: &Regex, attrs: &str) -> Option<String> {
    let caps = re.captures(attrs)?;
    (1..=3)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
}

/// Per-translation HTML rendering state (open link target, table rows).
#[derive(Debug, Default)]
pub struct HtmlState {
    url: Option<String>,
    prev_row_is_th: bool,
    table_line_len: usize,
}

impl HtmlState {
    /// Text for `tag`, given the output line written so far.
    pub fn render(&mut self, tag: &HtmlTag, line: &str) -> String {
        let Some(action) = HTML_TAGS.get(tag.name.as_str()).copied() else {
            return tag.raw.clone();
        };
        match (action, tag.closing) {
            (HtmlAction::Wrap(wrap), _) => wrap.to_string(),
            (HtmlAction::Open(text), false) => text.to_string(),
            (HtmlAction::Open(_), true) => String::new(),
            (HtmlAction::Anchor, false) => {
                self.url = attr_value(&RE_HREF, &tag.attrs);
                String::new()
            }
            (HtmlAction::Anchor, true) => match self.url.take() {
                Some(url) => format!(" ({url})"),
                None => String::new(),
            },
            (HtmlAction::Image, false) => match attr_value(&RE_SRC, &tag.attrs) {
                Some(src) => format!("Image: {src}"),
                None => "Image:".to_string(),
            },
            (HtmlAction::Image, true) => String::new(),
            (HtmlAction::Cell, false) => "|".to_string(),
            (HtmlAction::HeaderCell, false) => {
                self.prev_row_is_th = true;
                "|".to_string()
            }
            (HtmlAction::Cell | HtmlAction::HeaderCell, true) => String::new(),
            (HtmlAction::Row, true) => {
                let start = line.len() - line.trim_start_matches([' ', '\t']).len();
                self.table_line_len = line.len() + 1 - start;
                "|".to_string()
            }
            (HtmlAction::Row, false) => {
                if !self.prev_row_is_th {
                    return String::new();
                }
                self.prev_row_is_th = false;
                // Separator under a header row, then re-indent for this row.
                let indent = &line[..line.len() - line.trim_start_matches([' ', '\t']).len()];
                format!("{}\n{}", "-".repeat(self.table_line_len), indent)
            }
        }
    }
}
