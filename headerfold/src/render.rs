//! Canonical spacing and statement-per-line formatting of token runs.

use std::sync::LazyLock;

use regex::Regex;

use crate::token::{CursorKind, Token, TokenKind};

/// Tightening applied to every space-joined token run
const TIGHTEN: &[(&str, &str)] = &[
    (" . ", "."),
    (" [", "["),
    ("[ ", "["),
    (" ]", "]"),
    (" ,", ","),
    (" )", ")"),
    ("( ", "("),
    ("# ", "#"),
    (" ;", ";"),
    ("~ ", "~"),
    (" ##", "##"),
    (" -> ", "->"),
];

/// Extra tightening for `#include` bodies
const TIGHTEN_INCLUDE: &[(&str, &str)] = &[("< ", "<"), (" / ", "/"), (" >", ">")];

/// Tokens after a closing brace that continue the same declaration
const BRACE_CONTINUATIONS: &[&str] = &[";", "else", "__attribute__", "__attribute", "__packed"];

#[allow(clippy::unwrap_used)]
static CALL_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\w+) \(").unwrap());

/// Canonicalize the spacing of space-joined token text
///
/// Removes the spaces the joiner put around member access, subscripts,
/// commas, parentheses and `;`, and between a word and a following `(`.
/// With `is_include`, `<`, `>` and `/` are tightened as well so that
/// `< linux / types.h >` becomes `<linux/types.h>`.
#[must_use]
pub fn strip_space(text: &str, is_include: bool) -> String {
    let mut result = text.to_string();
    for (from, to) in TIGHTEN {
        result = result.replace(from, to);
    }
    if is_include {
        for (from, to) in TIGHTEN_INCLUDE {
            result = result.replace(from, to);
        }
    }
    CALL_SPACE.replace_all(&result, "${1}(").into_owned()
}

/// Format a text run one statement per line
///
/// `{` opens a two-space indentation level, `;` ends a line, and enum
/// constants each get their own line. Comments are copied verbatim.
/// `indent` carries the brace depth across consecutive text runs; the
/// updated depth is returned with the lines.
#[must_use]
pub fn format_statements(tokens: &[Token], mut indent: usize) -> (Vec<String>, usize) {
    let mut lines = Vec::new();
    let mut buf = String::new();
    let mut at_line_start = true;

    for (i, token) in tokens.iter().enumerate() {
        match token.id() {
            comment if token.kind() == TokenKind::Comment => {
                if !at_line_start {
                    lines.push(strip_space(&buf, false));
                    buf.clear();
                }
                lines.extend(comment.lines().map(str::to_string));
                at_line_start = true;
            }
            "{" => {
                indent += 2;
                buf.push_str(" {");
                lines.push(strip_space(&buf, false));
                buf.clear();
                at_line_start = true;
            }
            "}" => {
                indent = indent.saturating_sub(2);
                if !at_line_start {
                    lines.push(strip_space(&buf, false));
                }
                let continues = tokens.get(i + 1).is_some_and(|next| {
                    BRACE_CONTINUATIONS.contains(&next.id()) || next.kind() == TokenKind::Identifier
                });
                if continues {
                    buf = format!("{}}}", " ".repeat(indent));
                    at_line_start = false;
                } else {
                    lines.push(format!("{}}}", " ".repeat(indent)));
                    buf.clear();
                    at_line_start = true;
                }
            }
            ";" => {
                lines.push(strip_space(&buf, false) + ";");
                buf.clear();
                at_line_start = true;
            }
            "," if token.cursor().kind == CursorKind::EnumDecl => {
                lines.push(strip_space(&buf, false) + ",");
                buf.clear();
                at_line_start = true;
            }
            id => {
                if at_line_start {
                    buf.push_str(&" ".repeat(indent));
                } else {
                    buf.push(' ');
                }
                buf.push_str(id);
                at_line_start = false;
            }
        }
    }

    if !buf.is_empty() {
        lines.push(strip_space(&buf, false));
    }
    (lines, indent)
}
