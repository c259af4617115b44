//! Static tag table: tag name → argument shape and render action.
//!
//! The table is built once and only read afterwards, so concurrent
//! translations share it without synchronization.

use crate::model::TagCommand;
use std::collections::HashMap;
use std::sync::LazyLock;

/// How the tokenizer captures the inline argument of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    None,
    /// Next word on the same line; empty when missing.
    Word,
    /// Next word on the same line, only if one is there.
    OptionalWord,
    /// Optional `[in,out]` direction, then a word.
    Param,
    /// A word, then an optional `"quoted title"`.
    Reference,
    /// Rest of the line.
    Line,
    /// Everything up to the closing command, no tag processing inside.
    Raw { end: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaKind {
    Inline,
    Display,
    Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structural {
    If,
    IfNot,
    ElseIf,
    Else,
    EndIf,
    Cond,
    EndCond,
}

impl Structural {
    /// Tags whose following `{` is a structural brace.
    pub fn opens_brace(self) -> bool {
        matches!(
            self,
            Structural::If | Structural::IfNot | Structural::ElseIf | Structural::Else
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderAction {
    /// `Label: body`, one block per paragraph.
    Section { label: &'static str },
    /// Like `Section`, but every occurrence repeats the label.
    SectionEach { label: &'static str },
    /// `Arguments:` block, one line per parameter.
    Params,
    /// `Title: arg` followed by the paragraph.
    Title,
    /// Tag stripped, body kept as a paragraph.
    Paragraph,
    /// Argument wrapped in punctuation.
    Inline { wrap: &'static str },
    Reference,
    ListItem,
    Message(&'static str),
    Newline,
    Verbatim,
    /// Output restricted to another backend; payload kept as plain text.
    FormatRestricted,
    Formula(FormulaKind),
    Image,
    Include,
    /// Argument consumed, nothing rendered.
    Ignore,
    Structural(Structural),
    PassThrough,
}

impl RenderAction {
    /// Actions that end the current section body.
    pub fn starts_block(self) -> bool {
        matches!(
            self,
            RenderAction::Section { .. }
                | RenderAction::SectionEach { .. }
                | RenderAction::Params
                | RenderAction::Title
                | RenderAction::Paragraph
        )
    }

    /// Sections whose back-to-back repeats merge under one label.
    pub fn shares_label(self) -> bool {
        matches!(self, RenderAction::Section { .. } | RenderAction::Params)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TagSpec {
    pub arg: ArgShape,
    pub action: RenderAction,
}

const OVERLOAD_NOTICE: &str = "This is an overloaded member function, provided for convenience.\n\
It differs from the above function only in what argument(s) it accepts.";

const fn spec(arg: ArgShape, action: RenderAction) -> TagSpec {
    TagSpec { arg, action }
}

const fn section(label: &'static str) -> TagSpec {
    spec(ArgShape::None, RenderAction::Section { label })
}

const fn paragraph() -> TagSpec {
    spec(ArgShape::None, RenderAction::Paragraph)
}

const fn wrap(wrap: &'static str) -> TagSpec {
    spec(ArgShape::Word, RenderAction::Inline { wrap })
}

const fn raw(end: &'static str, action: RenderAction) -> TagSpec {
    spec(ArgShape::Raw { end }, action)
}

const fn structural(arg: ArgShape, kind: Structural) -> TagSpec {
    spec(arg, RenderAction::Structural(kind))
}

static TAGS: LazyLock<HashMap<&'static str, TagSpec>> = LazyLock::new(|| {
    use RenderAction as A;
    HashMap::from([
        // Labelled sections
        ("author", section("Author")),
        ("authors", section("Authors")),
        ("copyright", section("Copyright")),
        ("deprecated", section("Deprecated")),
        ("example", section("Example")),
        ("exception", section("Throws")),
        ("throws", section("Throws")),
        ("throw", section("Throw")),
        ("note", section("Notes")),
        ("notes", section("Notes")),
        ("remark", section("Remarks")),
        ("remarks", section("Remarks")),
        ("warning", section("Warning")),
        ("return", section("Return")),
        ("result", section("Return")),
        ("returns", section("Returns")),
        ("sa", spec(ArgShape::None, A::SectionEach { label: "See also" })),
        ("see", spec(ArgShape::None, A::SectionEach { label: "See also" })),
        ("since", section("Since")),
        ("todo", section("TODO")),
        ("version", section("Version")),
        ("param", spec(ArgShape::Param, A::Params)),
        ("tparam", spec(ArgShape::Param, A::Params)),
        ("par", spec(ArgShape::Line, A::Title)),
        // Plain paragraphs
        ("attention", paragraph()),
        ("brief", paragraph()),
        ("bug", paragraph()),
        ("date", paragraph()),
        ("details", paragraph()),
        ("invariant", paragraph()),
        ("partofdescription", paragraph()),
        ("post", paragraph()),
        ("pre", paragraph()),
        ("short", paragraph()),
        // Inline wraps
        ("a", wrap("_")),
        ("e", wrap("_")),
        ("em", wrap("")),
        ("b", wrap("__")),
        ("c", wrap("'")),
        ("cite", wrap("'")),
        ("p", wrap("")),
        ("ref", spec(ArgShape::Reference, A::Reference)),
        ("anchor", spec(ArgShape::Word, A::Ignore)),
        ("link", spec(ArgShape::Word, A::Ignore)),
        ("endlink", spec(ArgShape::None, A::Ignore)),
        // Lists and fixed text
        ("li", spec(ArgShape::None, A::ListItem)),
        ("arg", spec(ArgShape::None, A::ListItem)),
        ("overload", spec(ArgShape::None, A::Message(OVERLOAD_NOTICE))),
        ("n", spec(ArgShape::None, A::Newline)),
        // Literal payloads
        ("code", raw("\\endcode", A::Verbatim)),
        ("verbatim", raw("\\endverbatim", A::Verbatim)),
        ("htmlonly", raw("\\endhtmlonly", A::FormatRestricted)),
        ("latexonly", raw("\\endlatexonly", A::FormatRestricted)),
        ("manonly", raw("\\endmanonly", A::FormatRestricted)),
        ("rtfonly", raw("\\endrtfonly", A::FormatRestricted)),
        ("xmlonly", raw("\\endxmlonly", A::FormatRestricted)),
        ("docbookonly", raw("\\enddocbookonly", A::FormatRestricted)),
        ("f$", raw("\\f$", A::Formula(FormulaKind::Inline))),
        ("f[", raw("\\f]", A::Formula(FormulaKind::Display))),
        ("f{", raw("\\f}", A::Formula(FormulaKind::Environment))),
        ("image", spec(ArgShape::Line, A::Image)),
        ("include", spec(ArgShape::Line, A::Include)),
        ("includelineno", spec(ArgShape::Line, A::Include)),
        ("dontinclude", spec(ArgShape::Line, A::Include)),
        ("snippet", spec(ArgShape::Line, A::Include)),
        // Conditionals
        ("if", structural(ArgShape::Word, Structural::If)),
        ("ifnot", structural(ArgShape::Word, Structural::IfNot)),
        ("elseif", structural(ArgShape::Word, Structural::ElseIf)),
        ("else", structural(ArgShape::None, Structural::Else)),
        ("endif", structural(ArgShape::None, Structural::EndIf)),
        ("cond", structural(ArgShape::OptionalWord, Structural::Cond)),
        ("endcond", structural(ArgShape::None, Structural::EndCond)),
    ])
});

/// Look up a tag by its canonical name.
pub fn lookup(name: &str) -> Option<&'static TagSpec> {
    TAGS.get(name)
}

/// Render action for a tag; unknown names pass through.
pub fn dispatch(tag: &TagCommand) -> RenderAction {
    lookup(&tag.name).map_or(RenderAction::PassThrough, |spec| spec.action)
}

/// Structural kind of a tag, if it has one.
pub fn structural_kind(tag: &TagCommand) -> Option<Structural> {
    match dispatch(tag) {
        RenderAction::Structural(kind) => Some(kind),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> TagCommand {
        TagCommand {
            name: name.to_string(),
            arg: None,
            raw: format!("\\{name}"),
        }
    }

    #[test]
    fn synonyms_keep_their_own_labels() {
        assert_eq!(
            dispatch(&tag("return")),
            RenderAction::Section { label: "Return" }
        );
        assert_eq!(
            dispatch(&tag("returns")),
            RenderAction::Section { label: "Returns" }
        );
        assert_eq!(
            dispatch(&tag("throw")),
            RenderAction::Section { label: "Throw" }
        );
        assert_eq!(
            dispatch(&tag("throws")),
            RenderAction::Section { label: "Throws" }
        );
    }

    #[test]
    fn unknown_tag_passes_through() {
        assert_eq!(dispatch(&tag("weirdtag")), RenderAction::PassThrough);
    }

    #[test]
    fn format_restricted_tags() {
        for name in ["htmlonly", "latexonly", "manonly", "rtfonly", "xmlonly"] {
            assert_eq!(dispatch(&tag(name)), RenderAction::FormatRestricted, "{name}");
        }
    }

    #[test]
    fn only_conditionals_open_braces() {
        assert_eq!(structural_kind(&tag("if")), Some(Structural::If));
        assert!(Structural::Else.opens_brace());
        assert!(!Structural::Cond.opens_brace());
        assert_eq!(structural_kind(&tag("b")), None);
    }

    #[test]
    fn sections_start_blocks() {
        assert!(dispatch(&tag("returns")).starts_block());
        assert!(dispatch(&tag("param")).starts_block());
        assert!(!dispatch(&tag("b")).starts_block());
    }

    #[test]
    fn see_also_never_shares_its_label() {
        let action = dispatch(&tag("see"));
        assert_eq!(action, RenderAction::SectionEach { label: "See also" });
        assert_eq!(dispatch(&tag("sa")), action);
        assert!(action.starts_block());
        assert!(!action.shares_label());
        assert!(dispatch(&tag("note")).shares_label());
    }

    #[test]
    fn em_is_unwrapped() {
        assert_eq!(dispatch(&tag("em")), RenderAction::Inline { wrap: "" });
        assert_eq!(dispatch(&tag("e")), RenderAction::Inline { wrap: "_" });
    }
}
