//! doctrans — translate tagged documentation comments into plain-text
//! docstrings.
//!
//! A raw comment goes through four stages:
//!
//! 1. [`lexer::tokenize`] scans `\tag` commands, braces, inline markers and
//!    HTML into [`model::Token`]s.
//! 2. [`resolver::resolve`] keeps one branch of every `\if` / `\cond` block.
//! 3. [`render::writer::write`] runs the action [`tags::dispatch`] picks for
//!    every tag and produces ordered [`model::OutputSegment`]s.
//! 4. [`render::layout::normalize`] fixes blank lines and trailing
//!    whitespace; [`render::render`] joins the result.
//!
//! ```
//! use std::collections::BTreeSet;
//!
//! let enabled: BTreeSet<String> = ["A".to_string()].into();
//! let text = doctrans::translate("\\if A { kept } \\else { dropped }", &enabled);
//! assert_eq!(text, "kept");
//! ```

pub mod html;
pub mod lexer;
pub mod model;
pub mod render;
pub mod resolver;
pub mod tags;

use model::OutputSegment;
use std::collections::{BTreeSet, HashMap};

/// Caller-supplied knowledge the translator cannot derive from the comment.
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// Condition names whose `\if` branches are kept.
    pub enabled: BTreeSet<String>,
    /// Parameter name → type shown in the `Arguments:` block.
    pub param_types: HashMap<String, String>,
}

impl TranslateOptions {
    pub fn enable(mut self, condition: impl Into<String>) -> Self {
        self.enabled.insert(condition.into());
        self
    }

    pub fn param_type(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.param_types.insert(name.into(), ty.into());
        self
    }
}

/// Reusable translator. Holds only its options; every call starts fresh.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    options: TranslateOptions,
}

impl Translator {
    pub fn new(options: TranslateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TranslateOptions {
        &self.options
    }

    /// Translate one raw comment block.
    pub fn translate(&self, raw: &str) -> String {
        render::render(&self.segments(raw))
    }

    /// Normalized segments for `raw`, before concatenation.
    pub fn segments(&self, raw: &str) -> Vec<OutputSegment> {
        let raw = raw.replace("\r\n", "\n");
        let tokens = lexer::tokenize(&raw);
        tracing::trace!(tokens = tokens.len(), "tokenized");
        let resolved = resolver::resolve(&tokens, &self.options.enabled);
        tracing::trace!(tokens = resolved.len(), "conditionals resolved");
        let written = render::writer::write(&resolved, &self.options.param_types);
        tracing::trace!(segments = written.len(), "segments written");
        render::layout::normalize(written)
    }
}

/// Translate `raw` keeping the conditional branches named in `enabled`.
pub fn translate(raw: &str, enabled: &BTreeSet<String>) -> String {
    let options = TranslateOptions {
        enabled: enabled.clone(),
        ..TranslateOptions::default()
    };
    Translator::new(options).translate(raw)
}
