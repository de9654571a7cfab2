//! Passes and queries over the blocks of one header.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::slice;

use crate::block::Block;
use crate::error::Result;
use crate::macros::MacroTable;
use crate::optimizer;
use crate::render::format_statements;
use crate::token::{Token, TokenKind};

/// The blocks of one header, in source order
#[derive(Clone, Debug, Default)]
pub struct BlockList {
    blocks: Vec<Block>,
}

/// Progress of the declaration filter across text blocks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeclState {
    /// Between declarations
    Normal,
    /// Inside a type definition, ends with `;`
    Type,
    /// Inside a variable declaration, ends with `;`
    Variable,
    /// Inside a function, ends with `;` or its closing `}`
    Function,
}

impl BlockList {
    /// Wrap parsed blocks
    #[must_use]
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Number of blocks
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether there are no blocks
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate over the blocks
    pub fn iter(&self) -> slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    /// Blocks as a slice
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Substitute `macros` into every `#if`/`#elif` condition
    pub fn optimize_macros(&mut self, macros: &MacroTable) {
        for block in &mut self.blocks {
            block.optimize_macros(macros);
        }
    }

    /// Eliminate constant `#if` regions
    pub fn optimize_if01(&mut self) {
        self.blocks = optimizer::optimize_if01(&self.blocks);
    }

    /// [`optimize_macros`](Self::optimize_macros) followed by
    /// [`optimize_if01`](Self::optimize_if01)
    pub fn optimize_all(&mut self, macros: &MacroTable) {
        self.optimize_macros(macros);
        self.optimize_if01();
    }

    /// Drop `#define` blocks for the given macro names
    ///
    /// Function-like macros match by their name without the parameter list.
    pub fn remove_macro_defines(&mut self, names: &HashSet<String>) {
        self.blocks.retain(|block| {
            block
                .define_id()
                .and_then(|id| id.split('(').next())
                .is_none_or(|name| !names.contains(name))
        });
    }

    /// Rename identifiers and `#define` names, `#include` bodies excepted
    ///
    /// Fails if a renamed condition no longer parses.
    pub fn replace_tokens(&mut self, replacements: &HashMap<String, String>) -> Result<()> {
        for block in &mut self.blocks {
            block.replace_tokens(replacements)?;
        }
        Ok(())
    }

    /// Targets of the `#include` directives, in order
    #[must_use]
    pub fn find_includes(&self) -> Vec<String> {
        self.blocks.iter().filter_map(Block::include_target).collect()
    }

    /// Names of the macros defined, in order
    #[must_use]
    pub fn defined_macros(&self) -> Vec<&str> {
        self.blocks.iter().filter_map(Block::define_id).collect()
    }

    /// Drop variable and function declarations from text blocks
    ///
    /// Type definitions (`struct`, `union`, `enum`, `typedef`) always stay, as
    /// do declarations whose name is in `known_statics`. A declaration may span
    /// several text blocks when directives are interleaved with it; a
    /// declaration that never terminates is kept.
    pub fn remove_vars_and_funcs(&mut self, known_statics: &HashSet<String>) {
        let mut state = DeclState::Normal;
        let mut depth = 0usize;
        let mut skipping = false;
        let mut kept = Vec::with_capacity(self.blocks.len());

        for block in std::mem::take(&mut self.blocks) {
            if block.is_directive() {
                kept.push(block);
                continue;
            }
            let tokens = block.tokens();
            let n = tokens.len();
            let mut first = if skipping { n } else { 0 };
            let mut i = 0;

            while i < n {
                let id = tokens[i].id();
                if state != DeclState::Normal {
                    let terminator = match id {
                        "{" => {
                            depth += 1;
                            false
                        }
                        "}" => {
                            depth = depth.saturating_sub(1);
                            depth == 0 && state == DeclState::Function
                        }
                        ";" => depth == 0,
                        _ => false,
                    };
                    if terminator {
                        state = DeclState::Normal;
                        if skipping {
                            skipping = false;
                            first = i + 1;
                        }
                    }
                    i += 1;
                    continue;
                }

                if matches!(id, "struct" | "typedef" | "enum" | "union" | "__extension__") {
                    state = DeclState::Type;
                    i += 1;
                    continue;
                }

                // The name is the last identifier before `(` or `;`
                let mut name = "";
                let mut kind = None;
                for token in &tokens[i..] {
                    match token.id() {
                        "(" => {
                            kind = Some(DeclState::Function);
                            break;
                        }
                        ";" => {
                            kind = Some(DeclState::Variable);
                            break;
                        }
                        _ if token.is_identifier() => name = token.id(),
                        _ => {}
                    }
                }
                let Some(kind) = kind else {
                    // Unterminated in this block, keep the rest
                    i = n;
                    break;
                };

                state = kind;
                if !known_statics.contains(name) {
                    if i > first {
                        kept.push(Block::text(tokens[first..i].to_vec()));
                    }
                    skipping = true;
                    first = n;
                }
                i += 1;
            }

            if i > first {
                kept.push(Block::text(tokens[first..i].to_vec()));
            }
        }
        self.blocks = kept;
    }

    /// Prepend a text block holding `disclaimer`, usually a comment
    pub fn insert_disclaimer(&mut self, disclaimer: &str) {
        let token = Token::synthetic(TokenKind::Comment, disclaimer.trim_end());
        self.blocks.insert(0, Block::text(vec![token]));
    }

    /// Canonicalize whitespace in every text block
    pub fn remove_white_space(&mut self) {
        for block in &mut self.blocks {
            block.remove_white_space();
        }
    }

    /// Render for output files: directives one per line, declarations one
    /// statement per line with brace indentation
    #[must_use]
    pub fn to_formatted_string(&self) -> String {
        let mut out = String::new();
        let mut indent = 0;
        for block in &self.blocks {
            if block.is_directive() {
                out.push_str(&block.to_string());
                out.push('\n');
                continue;
            }
            let (lines, next_indent) = format_statements(block.tokens(), indent);
            indent = next_indent;
            for line in lines {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

impl fmt::Display for BlockList {
    /// One block per line, with a blank line after each `#define` or
    /// `#endif` group unless an `#endif` follows
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut separate = false;
        for block in &self.blocks {
            if !block.is_directive() && block.tokens().is_empty() {
                continue;
            }
            if separate && !block.is_endif() {
                writeln!(f)?;
            }
            writeln!(f, "{block}")?;
            separate = block.define_id().is_some() || block.is_endif();
        }
        Ok(())
    }
}

impl FromIterator<Block> for BlockList {
    fn from_iter<I: IntoIterator<Item = Block>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for BlockList {
    type Item = Block;
    type IntoIter = std::vec::IntoIter<Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.into_iter()
    }
}

impl<'a> IntoIterator for &'a BlockList {
    type Item = &'a Block;
    type IntoIter = slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}
