//! Conditional resolver. Keeps one branch of every `\if` / `\cond` block.
//!
//! Blocks are paired up front with an explicit stack, then the token stream
//! is walked with a work stack of token ranges. Only the selected branch of
//! a node is pushed back onto the work stack, so rejected branches are never
//! looked at beyond the jump over their pairs, and nesting depth does not
//! depend on the call stack.

use crate::model::{merge_text, Branch, BranchKind, ConditionalNode, Token};
use crate::tags::{self, Structural};
use std::collections::BTreeSet;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opener {
    Brace,
    EndIf,
    EndCond,
}

/// Outcome of reading a conditional starting at a structural tag.
enum Scan {
    Node(ConditionalNode),
    /// Opener whose block never closes.
    Unmatched,
    /// Continuation or closer with no block to belong to.
    Stray,
}

struct Work {
    range: Range<usize>,
    trim_start: bool,
    trim_end: bool,
}

/// Resolve every conditional block against `enabled`.
pub fn resolve(tokens: &[Token], enabled: &BTreeSet<String>) -> Vec<Token> {
    let closers = pair_blocks(tokens);
    let mut out = Vec::with_capacity(tokens.len());
    let mut work = vec![Work {
        range: 0..tokens.len(),
        trim_start: false,
        trim_end: false,
    }];

    while let Some(Work {
        range,
        trim_start,
        trim_end,
    }) = work.pop()
    {
        let mut i = range.start;
        while i < range.end {
            match &tokens[i] {
                Token::Tag(tag) if tags::structural_kind(tag).is_some() => {
                    match scan_node(tokens, &closers, i, range.end) {
                        Scan::Node(node) => {
                            work.push(Work {
                                range: node.end..range.end,
                                trim_start: false,
                                trim_end,
                            });
                            if let Some(branch) = node.select(enabled) {
                                work.push(Work {
                                    range: branch.body.clone(),
                                    trim_start: true,
                                    trim_end: true,
                                });
                            }
                            break;
                        }
                        Scan::Unmatched => {
                            tracing::debug!(
                                tag = %tag.raw,
                                "unmatched conditional, rest of block kept literally"
                            );
                            out.extend(tokens[i..range.end].iter().map(|t| Token::Text(t.literal())));
                            i = range.end;
                            continue;
                        }
                        Scan::Stray => {
                            tracing::debug!(tag = %tag.raw, "stray conditional tag kept literally");
                            out.push(Token::Text(tag.raw.clone()));
                        }
                    }
                }
                Token::BraceOpen | Token::BraceClose => out.push(Token::Text(tokens[i].literal())),
                Token::Text(text) => {
                    let mut text = text.as_str();
                    if trim_start && i == range.start {
                        text = text.trim_start();
                    }
                    if trim_end && i + 1 == range.end {
                        text = text.trim_end();
                    }
                    if !text.is_empty() {
                        out.push(Token::Text(text.to_string()));
                    }
                }
                other => out.push(other.clone()),
            }
            i += 1;
        }
    }

    merge_text(out)
}

/// Closing index for every block opener; `None` for unmatched openers and
/// for tokens that open nothing.
fn pair_blocks(tokens: &[Token]) -> Vec<Option<usize>> {
    let mut closers = vec![None; tokens.len()];
    let mut stack: Vec<(Opener, usize)> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let (opener, opens) = match token {
            Token::BraceOpen => (Opener::Brace, true),
            Token::BraceClose => (Opener::Brace, false),
            Token::Tag(tag) => match tags::structural_kind(tag) {
                Some(Structural::If | Structural::IfNot) if brace_after(tokens, i).is_none() => {
                    (Opener::EndIf, true)
                }
                Some(Structural::EndIf) => (Opener::EndIf, false),
                Some(Structural::Cond) => (Opener::EndCond, true),
                Some(Structural::EndCond) => (Opener::EndCond, false),
                _ => continue,
            },
            _ => continue,
        };
        if opens {
            stack.push((opener, i));
            continue;
        }
        // Openers crossed by this closer stay unmatched.
        if let Some(at) = stack.iter().rposition(|(kind, _)| *kind == opener) {
            closers[stack[at].1] = Some(i);
            stack.truncate(at);
        }
    }

    closers
}

/// Index of the structural `{` right after token `i`, whitespace skipped.
fn brace_after(tokens: &[Token], i: usize) -> Option<usize> {
    let j = next_significant(tokens, i + 1, tokens.len())?;
    matches!(tokens[j], Token::BraceOpen).then_some(j)
}

fn next_significant(tokens: &[Token], from: usize, limit: usize) -> Option<usize> {
    (from..limit).find(|&j| !tokens[j].is_blank_text())
}

fn structural_at(tokens: &[Token], i: usize) -> Option<(Structural, String)> {
    match &tokens[i] {
        Token::Tag(tag) => {
            tags::structural_kind(tag).map(|kind| (kind, tag.arg_or_empty().to_string()))
        }
        _ => None,
    }
}

/// `{ … }` group right after token `i`, if it closes before `limit`.
fn brace_body(tokens: &[Token], closers: &[Option<usize>], i: usize, limit: usize) -> Option<Range<usize>> {
    let open = brace_after(tokens, i)?;
    let close = closers[open].filter(|&c| c < limit)?;
    Some(open + 1..close)
}

fn scan_node(tokens: &[Token], closers: &[Option<usize>], i: usize, limit: usize) -> Scan {
    let Some((kind, arg)) = structural_at(tokens, i) else {
        return Scan::Stray;
    };
    let first = match kind {
        Structural::If => BranchKind::If(arg),
        Structural::IfNot => BranchKind::IfNot(arg),
        Structural::Cond => {
            let Some(end) = closers[i].filter(|&c| c < limit) else {
                return Scan::Unmatched;
            };
            let label = match &tokens[i] {
                Token::Tag(tag) => tag.arg.clone(),
                _ => None,
            };
            return Scan::Node(ConditionalNode {
                branches: vec![Branch {
                    kind: BranchKind::Cond(label),
                    body: i + 1..end,
                }],
                end: end + 1,
            });
        }
        Structural::ElseIf | Structural::Else | Structural::EndIf | Structural::EndCond => {
            return Scan::Stray;
        }
    };

    if brace_after(tokens, i).is_some() {
        scan_brace_chain(tokens, closers, i, limit, first)
    } else {
        scan_endif_block(tokens, closers, i, limit, first)
    }
}

/// `\if A { … } \elseif B { … } \else { … }`
fn scan_brace_chain(
    tokens: &[Token],
    closers: &[Option<usize>],
    i: usize,
    limit: usize,
    first: BranchKind,
) -> Scan {
    let Some(body) = brace_body(tokens, closers, i, limit) else {
        return Scan::Unmatched;
    };
    let mut end = body.end + 1;
    let mut branches = vec![Branch { kind: first, body }];

    while let Some(next) = next_significant(tokens, end, limit) {
        let kind = match structural_at(tokens, next) {
            Some((Structural::ElseIf, cond)) => BranchKind::ElseIf(cond),
            Some((Structural::Else, _)) => BranchKind::Else,
            _ => break,
        };
        let Some(body) = brace_body(tokens, closers, next, limit) else {
            break;
        };
        end = body.end + 1;
        let is_else = kind == BranchKind::Else;
        branches.push(Branch { kind, body });
        if is_else {
            break;
        }
    }

    Scan::Node(ConditionalNode { branches, end })
}

/// `\if A … \elseif B … \else … \endif`
fn scan_endif_block(
    tokens: &[Token],
    closers: &[Option<usize>],
    i: usize,
    limit: usize,
    first: BranchKind,
) -> Scan {
    let Some(endif) = closers[i].filter(|&c| c < limit) else {
        return Scan::Unmatched;
    };

    let mut branches = Vec::new();
    let mut kind = first;
    let mut start = i + 1;
    let mut j = i + 1;
    while j < endif {
        if let Some(close) = closers[j] {
            j = close + 1;
            continue;
        }
        let split = match structural_at(tokens, j) {
            Some((Structural::ElseIf, cond)) if brace_after(tokens, j).is_none() => {
                Some(BranchKind::ElseIf(cond))
            }
            Some((Structural::Else, _)) if brace_after(tokens, j).is_none() => Some(BranchKind::Else),
            _ => None,
        };
        if let Some(next_kind) = split {
            branches.push(Branch {
                kind: std::mem::replace(&mut kind, next_kind),
                body: start..j,
            });
            start = j + 1;
        }
        j += 1;
    }
    branches.push(Branch {
        kind,
        body: start..endif,
    });

    Scan::Node(ConditionalNode {
        branches,
        end: endif + 1,
    })
}
