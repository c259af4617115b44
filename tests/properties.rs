//! Property-based tests for layout normalization and conditional selection.

use doctrans::translate;
use proptest::prelude::*;
use std::collections::BTreeSet;

const CONDITIONS: [&str; 3] = ["A", "B", "C"];

/// Expected layout of untagged text: trailing whitespace trimmed, blank
/// runs collapsed, blank lines at both ends removed.
fn normalized(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank = false;
    for line in text.split('\n') {
        let line = line.trim_end();
        if line.is_empty() {
            blank = !lines.is_empty();
            continue;
        }
        if blank {
            lines.push("");
        }
        lines.push(line);
        blank = false;
    }
    lines.join("\n")
}

fn enabled_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    proptest::sample::subsequence(CONDITIONS.to_vec(), 0..=CONDITIONS.len())
        .prop_map(|names| names.into_iter().map(str::to_string).collect())
}

/// Markup fragments, joined in any order.
fn fragment_strategy() -> impl Strategy<Value = &'static str> {
    proptest::sample::select(vec![
        "word", " ", "\n", "\n\n", "\t", "  \n", "\\return ", "\\returns ", "\\param x ",
        "\\see ", "\\par Title\n", "\\brief ", "\\b ", "\\c ", "\\li ", "\\n", "\\weirdtag",
        "\\if A {", "\\ifnot B {", "\\else {", "\\elseif C {", "}", "{", "\\endif",
        "\\cond A", "\\endcond", "*", "**", "_", "`", "<b>", "</b>", "<br>", "&copy;",
        "\\code x\\endcode", "\\f[ x \\f]", "\\image a.png",
    ])
}

#[derive(Debug, Clone)]
enum Tree {
    Leaf,
    If {
        negated: bool,
        cond: usize,
        then: Vec<Tree>,
        elseifs: Vec<(usize, Vec<Tree>)>,
        otherwise: Option<Vec<Tree>>,
    },
}

fn tree_strategy() -> impl Strategy<Value = Tree> {
    Just(Tree::Leaf).prop_recursive(5, 48, 4, |inner| {
        let body = prop::collection::vec(inner, 0..3);
        (
            any::<bool>(),
            0..CONDITIONS.len(),
            body.clone(),
            prop::collection::vec((0..CONDITIONS.len(), body.clone()), 0..2),
            prop::option::of(body),
        )
            .prop_map(|(negated, cond, then, elseifs, otherwise)| Tree::If {
                negated,
                cond,
                then,
                elseifs,
                otherwise,
            })
    })
}

/// Writes markup for `trees` and collects, in order, the leaf words a
/// correct resolution keeps.
struct Builder<'a> {
    enabled: &'a BTreeSet<String>,
    next_leaf: usize,
    markup: String,
    kept: Vec<String>,
}

impl Builder<'_> {
    fn trees(&mut self, trees: &[Tree], active: bool) {
        for tree in trees {
            self.markup.push(' ');
            self.tree(tree, active);
        }
    }

    fn branch(&mut self, header: String, body: &[Tree], active: bool) {
        self.markup.push_str(&header);
        self.markup.push_str(" {");
        self.trees(body, active);
        self.markup.push_str(" }");
    }

    fn tree(&mut self, tree: &Tree, active: bool) {
        match tree {
            Tree::Leaf => {
                let word = format!("w{}", self.next_leaf);
                self.next_leaf += 1;
                self.markup.push_str(&word);
                if active {
                    self.kept.push(word);
                }
            }
            Tree::If {
                negated,
                cond,
                then,
                elseifs,
                otherwise,
            } => {
                let name = CONDITIONS[*cond];
                let taken = self.enabled.contains(name) != *negated;
                let mut selected = taken;
                let tag = if *negated { "\\ifnot" } else { "\\if" };
                self.branch(format!("{tag} {name}"), then, active && taken);
                for (cond, body) in elseifs {
                    let name = CONDITIONS[*cond];
                    let taken = !selected && self.enabled.contains(name);
                    selected |= taken;
                    self.branch(format!(" \\elseif {name}"), body, active && taken);
                }
                if let Some(body) = otherwise {
                    self.branch(" \\else".to_string(), body, active && !selected);
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn untagged_text_only_gets_layout(text in "[a-zA-Z0-9 ,.\t\n]{0,120}") {
        let out = translate(&text, &BTreeSet::new());
        prop_assert_eq!(&out, &normalized(&text));
        prop_assert_eq!(translate(&out, &BTreeSet::new()), out);
    }

    #[test]
    fn layout_invariants_hold(
        fragments in prop::collection::vec(fragment_strategy(), 0..40),
        enabled in enabled_strategy(),
    ) {
        let raw: String = fragments.concat();
        let out = translate(&raw, &enabled);
        prop_assert!(!out.contains("\n\n\n"), "double blank line in {:?}", out);
        prop_assert!(!out.starts_with('\n'), "leading blank line in {:?}", out);
        prop_assert!(!out.ends_with('\n'), "trailing blank line in {:?}", out);
        for line in out.lines() {
            prop_assert_eq!(line, line.trim_end());
        }
    }

    #[test]
    fn exactly_the_selected_branches_survive(
        trees in prop::collection::vec(tree_strategy(), 1..4),
        enabled in enabled_strategy(),
    ) {
        let mut builder = Builder {
            enabled: &enabled,
            next_leaf: 0,
            markup: String::new(),
            kept: Vec::new(),
        };
        builder.trees(&trees, true);
        let out = translate(&builder.markup, &enabled);
        let words: Vec<&str> = out.split_whitespace().collect();
        prop_assert_eq!(words, builder.kept.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn bare_symbols_pass_through(text in "[ $@&~#%\".:0-9<>]{0,60}") {
        prop_assert_eq!(translate(&text, &BTreeSet::new()), text.trim_end());
    }
}
