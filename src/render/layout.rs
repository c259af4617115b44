//! Layout normalization over rendered segments.
//!
//! Works line by line: trailing whitespace goes, runs of blank lines become
//! one, blank lines at either end are dropped, and every section label or
//! section break gets exactly one blank line in front of the next content.

use crate::model::{OutputSegment, SegmentKind};

#[derive(Debug)]
struct Line {
    order: usize,
    text: String,
    label: bool,
    blank_before: bool,
}

impl Line {
    fn new(order: usize, text: &str, blank_before: bool) -> Self {
        Self {
            order,
            text: text.to_string(),
            label: false,
            blank_before,
        }
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Normalize `segments` into one segment per output line. Each segment
/// carries its own leading separator, so concatenation yields the text.
pub fn normalize(segments: Vec<OutputSegment>) -> Vec<OutputSegment> {
    let mut out: Vec<OutputSegment> = Vec::new();
    let mut pending_blank = false;

    for line in split_lines(segments) {
        let text = line.text.trim_end();
        if text.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        let sep = if out.is_empty() {
            ""
        } else if pending_blank || line.blank_before {
            "\n\n"
        } else {
            "\n"
        };
        out.push(OutputSegment {
            order: line.order,
            kind: if line.label {
                SegmentKind::Label
            } else {
                SegmentKind::Text
            },
            text: format!("{sep}{text}"),
        });
        pending_blank = false;
    }

    out
}

fn split_lines(segments: Vec<OutputSegment>) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current: Option<Line> = None;
    let mut blank_next = false;

    for segment in segments {
        match segment.kind {
            SegmentKind::Text => {
                let mut parts = segment.text.split('\n');
                if let Some(first) = parts.next() {
                    match current.as_mut() {
                        Some(line) => line.text.push_str(first),
                        None => {
                            current = Some(Line::new(
                                segment.order,
                                first,
                                std::mem::take(&mut blank_next),
                            ))
                        }
                    }
                }
                for part in parts {
                    lines.extend(current.take());
                    current = Some(Line::new(
                        segment.order,
                        part,
                        std::mem::take(&mut blank_next),
                    ));
                }
            }
            SegmentKind::Label => {
                // A whitespace-only line in front of a label is dropped.
                if let Some(line) = current.take().filter(|l| !l.is_blank()) {
                    lines.push(line);
                }
                blank_next = false;
                current = Some(Line {
                    order: segment.order,
                    text: segment.text,
                    label: true,
                    blank_before: true,
                });
            }
            SegmentKind::Break => {
                lines.extend(current.take());
                blank_next = true;
            }
        }
    }
    lines.extend(current);
    lines
}
