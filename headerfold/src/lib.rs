#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # C Header Conditional Folding
//!
//! This library partially evaluates the preprocessor conditionals of C headers
//! against a set of known macros and regenerates minimal, canonical source.
//! It is meant for build pipelines that import third-party headers, such as
//! Linux UAPI headers, and want deterministic userspace versions of them.
//!
//! ## Features
//!
//! - Block model of headers: one block per directive, text blocks in between
//! - `#if`/`#elif` expression parsing, macro substitution and constant folding
//! - Dead-branch elimination of `#if 0` / `#if 1` regions, nested or chained
//! - Identifier renaming, `#define` removal and declaration filtering
//! - Canonical output, one directive or statement per line
//! - Kernel header preset with per-architecture macros
//!
//! ## Example
//!
//! ```rust
//! use headerfold::{CleanerConfig, clean_header};
//!
//! let header = "\
//! #ifdef __KERNEL__
//! #include <linux/kernel.h>
//! #endif
//! #define ANSWER 42
//! ";
//!
//! let config = CleanerConfig::new().with_undefined("__KERNEL__").without_disclaimer();
//! let cleaned = clean_header(header, &config).unwrap();
//! assert_eq!(cleaned, "#define ANSWER 42\n");
//! ```

mod block;
mod block_list;
mod cleaner;
mod config;
mod error;
mod expr;
mod frontend;
mod macros;
mod optimizer;
mod parser;
mod render;
mod token;

pub use block::{Block, Directive};
pub use block_list::BlockList;
pub use cleaner::{CleanOutput, HeaderCleaner};
pub use config::{Arch, CleanerConfig, DEFAULT_DISCLAIMER, KERNEL_DISCLAIMER};
pub use error::{FoldError, Result};
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use frontend::tokenize;
pub use macros::{DEFAULT_RECURSION_LIMIT, MacroTable, MacroValue};
pub use optimizer::{find_matching_endif, optimize_if01};
pub use parser::{BlockParser, parse_source};
pub use render::{format_statements, strip_space};
pub use token::{Cursor, CursorKind, Extent, SourceLocation, Token, TokenKind};

use std::path::Path;

/// Clean header source with the given configuration
///
/// # Errors
/// Returns `FoldError` if a directive is malformed or a condition does not
/// parse.
pub fn clean_header<S: AsRef<str>>(input: S, config: &CleanerConfig) -> Result<String> {
    let cleaner = HeaderCleaner::new(config.clone());
    Ok(cleaner.clean(input.as_ref())?.text)
}

/// Clean a header file and write the result to another file
///
/// # Errors
/// Returns `FoldError` if the input file cannot be read,
/// the output file cannot be written, or if cleaning fails.
pub fn clean_header_file<P: AsRef<Path>>(
    input_path: P,
    output_path: P,
    config: &CleanerConfig,
) -> Result<()> {
    let input = std::fs::read_to_string(input_path)?;
    let output = clean_header(&input, config)?;
    std::fs::write(output_path, output)?;
    Ok(())
}

/// Clean a header file and return the result as a string
///
/// # Errors
/// Returns `FoldError` if the file cannot be read or if cleaning fails.
pub fn clean_header_file_to_string<P: AsRef<Path>>(
    input_path: P,
    config: &CleanerConfig,
) -> Result<String> {
    let input = std::fs::read_to_string(input_path)?;
    clean_header(&input, config)
}
