//! The header cleanup pipeline.

use log::{debug, info};

use crate::block_list::BlockList;
use crate::config::CleanerConfig;
use crate::error::Result;
use crate::frontend;
use crate::parser::BlockParser;

/// Result of cleaning one header
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanOutput {
    /// Formatted header text
    pub text: String,
    /// `#include` targets left in the cleaned header
    pub includes: Vec<String>,
    /// Macros still defined by the cleaned header
    pub defined_macros: Vec<String>,
}

/// Runs the cleanup pipeline over headers with one configuration
///
/// Each header goes through parsing, identifier replacement, macro
/// substitution, dead-branch elimination, declaration filtering, removal of
/// unwanted `#define`s and whitespace canonicalization, in that order.
#[derive(Clone, Debug)]
pub struct HeaderCleaner {
    config: CleanerConfig,
}

impl Default for HeaderCleaner {
    fn default() -> Self {
        Self::new(CleanerConfig::default())
    }
}

impl HeaderCleaner {
    /// Create a cleaner for `config`
    #[must_use]
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// Clean header source text
    ///
    /// # Errors
    /// Returns `FoldError` if a directive is malformed or a condition does not
    /// parse.
    pub fn clean(&self, source: &str) -> Result<CleanOutput> {
        let tokens = frontend::tokenize(source);
        debug!("{} tokens", tokens.len());

        let mut parser = BlockParser::new();
        if let Some(statics) = &self.config.known_statics {
            parser = parser.with_known_statics(statics.iter().cloned());
        }
        let mut blocks = self.clean_blocks(parser.parse(&tokens)?)?;

        let includes = blocks.find_includes();
        let defined_macros = blocks
            .defined_macros()
            .into_iter()
            .map(str::to_string)
            .collect();

        if let Some(disclaimer) = &self.config.disclaimer {
            blocks.insert_disclaimer(disclaimer);
        }
        Ok(CleanOutput {
            text: blocks.to_formatted_string(),
            includes,
            defined_macros,
        })
    }

    /// Apply every cleanup step after parsing to `blocks`
    ///
    /// The disclaimer is not inserted.
    ///
    /// # Errors
    /// Returns `FoldError` if a renamed condition no longer parses.
    pub fn clean_blocks(&self, mut blocks: BlockList) -> Result<BlockList> {
        let before = blocks.len();

        blocks.replace_tokens(&self.config.replacements)?;
        blocks.optimize_all(&self.config.macro_table());
        if let Some(statics) = &self.config.known_statics {
            blocks.remove_vars_and_funcs(statics);
        }
        blocks.remove_macro_defines(&self.config.removed_defines);
        blocks.remove_white_space();

        info!("cleaned header: {before} blocks in, {} blocks out", blocks.len());
        Ok(blocks)
    }
}
