//! Segmentation of a classified token stream into blocks.

use std::collections::HashSet;

use log::trace;

use crate::block::{Block, Directive};
use crate::block_list::BlockList;
use crate::error::{FoldError, Result};
use crate::frontend;
use crate::token::{CursorKind, Extent, Token, TokenKind};

/// Builds a [`BlockList`] from classified tokens
///
/// Directives become one block each. Other tokens are grouped into text
/// blocks following the front end's classification: a declaration runs to the
/// end of its extent, anything unclassified runs to the end of its line.
#[derive(Clone, Debug, Default)]
pub struct BlockParser {
    known_statics: Option<HashSet<String>>,
}

impl BlockParser {
    /// Create a parser that keeps declarations inline in the surrounding text
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Give every variable or function declaration not named in `statics`
    /// its own text block, so that it can be filtered out later
    #[must_use]
    pub fn with_known_statics<I, S>(mut self, statics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_statics = Some(statics.into_iter().map(Into::into).collect());
        self
    }

    /// Split `tokens` into blocks
    ///
    /// Comments are dropped and an end-of-stream token stops the parse.
    pub fn parse(&self, tokens: &[Token]) -> Result<BlockList> {
        let mut blocks = Vec::new();
        let mut pending = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind() {
                TokenKind::Comment => {
                    i += 1;
                    continue;
                }
                TokenKind::EndOfStream => break,
                _ => {}
            }

            let cursor = token.cursor();
            let (next, run) = match cursor.kind {
                CursorKind::PreprocessingDirective | CursorKind::InclusionDirective => {
                    flush(&mut pending, &mut blocks);
                    let (next, block) = parse_directive(tokens, i)?;
                    trace!("line {}: #{}", block.line(), directive_name(&block));
                    blocks.push(block);
                    i = next;
                    continue;
                }
                CursorKind::VarDecl | CursorKind::FunctionDecl => {
                    flush(&mut pending, &mut blocks);
                    let (next, run) = consume_extent(tokens, i, cursor.extent, true);
                    if next > i && self.is_filtered(&run) {
                        trace!("line {}: separate declaration", token.location().line);
                        blocks.push(Block::text(run));
                        i = next;
                        continue;
                    }
                    (next, run)
                }
                CursorKind::StructDecl | CursorKind::EnumDecl
                    if cursor.extent.contains(token.location()) =>
                {
                    flush(&mut pending, &mut blocks);
                    consume_extent(tokens, i, cursor.extent, true)
                }
                _ => consume_line(tokens, i),
            };

            let (next, run) = ensure_progress(tokens, i, next, run);
            pending.extend(run);
            i = next;
        }

        flush(&mut pending, &mut blocks);
        Ok(BlockList::new(blocks))
    }

    fn is_filtered(&self, declaration: &[Token]) -> bool {
        self.known_statics
            .as_ref()
            .is_some_and(|statics| !statics.contains(declared_name(declaration)))
    }
}

/// Tokenize `source` with the built-in front end and split it into blocks
pub fn parse_source(source: &str) -> Result<BlockList> {
    BlockParser::new().parse(&frontend::tokenize(source))
}

fn directive_name(block: &Block) -> &str {
    block.directive_kind().map_or("", Directive::keyword)
}

fn flush(pending: &mut Vec<Token>, blocks: &mut Vec<Block>) {
    if !pending.is_empty() {
        blocks.push(Block::text(std::mem::take(pending)));
    }
}

/// Name of a declaration: the last identifier before `(`, `;`, `=`, `[` or `:`
fn declared_name(declaration: &[Token]) -> &str {
    declaration
        .iter()
        .take_while(|t| !matches!(t.id(), "(" | ";" | "=" | "[" | ":"))
        .filter(|t| t.is_identifier())
        .last()
        .map_or("", Token::id)
}

fn next_significant(tokens: &[Token], mut i: usize) -> usize {
    while tokens.get(i).is_some_and(|t| t.kind() == TokenKind::Comment) {
        i += 1;
    }
    i
}

fn is_directive_token(token: &Token) -> bool {
    matches!(
        token.cursor().kind,
        CursorKind::PreprocessingDirective | CursorKind::InclusionDirective
    )
}

/// Collect the tokens inside `extent`, skipping comments
///
/// With `detect_change`, stops at a directive that is not the construct
/// being consumed.
fn consume_extent(
    tokens: &[Token],
    mut i: usize,
    extent: Extent,
    detect_change: bool,
) -> (usize, Vec<Token>) {
    let mut run = Vec::new();
    while let Some(token) = tokens.get(i)
        && extent.contains(token.location())
    {
        match token.kind() {
            TokenKind::Comment => {
                i += 1;
                continue;
            }
            TokenKind::EndOfStream => break,
            _ => {}
        }
        if detect_change && is_directive_token(token) && token.cursor().extent != extent {
            break;
        }
        run.push(token.clone());
        i += 1;
    }
    (i, run)
}

/// Collect the rest of the physical line, stopping at a directive
fn consume_line(tokens: &[Token], mut i: usize) -> (usize, Vec<Token>) {
    let mut run = Vec::new();
    let Some(line) = tokens.get(i).map(|t| t.location().line) else {
        return (i, run);
    };
    while let Some(token) = tokens.get(i)
        && token.location().line == line
    {
        match token.kind() {
            TokenKind::Comment => {
                i += 1;
                continue;
            }
            TokenKind::EndOfStream => break,
            _ => {}
        }
        if is_directive_token(token) {
            break;
        }
        run.push(token.clone());
        i += 1;
    }
    (i, run)
}

/// Fall back to line grouping, then to a single token, when a consumer stalls
fn ensure_progress(
    tokens: &[Token],
    start: usize,
    next: usize,
    run: Vec<Token>,
) -> (usize, Vec<Token>) {
    if next > start {
        return (next, run);
    }
    let (next, run) = consume_line(tokens, start);
    if next > start {
        return (next, run);
    }
    (start + 1, tokens[start..=start].to_vec())
}

/// Parse the directive whose `#` is at `start`, returning the index after it
fn parse_directive(tokens: &[Token], start: usize) -> Result<(usize, Block)> {
    let hash = &tokens[start];
    let extent = hash.cursor().extent;
    let line = hash.location().line;
    let inside = |t: &&Token| extent.contains(t.location()) && t.kind() != TokenKind::EndOfStream;

    let k = next_significant(tokens, start + 1);
    let Some(keyword) = tokens.get(k).filter(inside) else {
        return Err(FoldError::malformed_directive(
            hash.location(),
            "expected directive name after `#`",
        ));
    };
    let directive = Directive::from_keyword(keyword.id());

    if directive == Directive::Define {
        let j = next_significant(tokens, k + 1);
        let Some(name_token) = tokens.get(j).filter(inside).filter(|t| t.is_identifier()) else {
            return Err(FoldError::malformed_directive(
                keyword.location(),
                "expected macro name after `#define`",
            ));
        };
        let mut name = name_token.id().to_string();
        let mut j = j + 1;

        // Function-like only when `(` touches the name
        let adjacent_paren = tokens.get(j).is_some_and(|t| {
            t.id() == "("
                && t.location().line == name_token.location().line
                && t.location().column == name_token.end_column()
        });
        if adjacent_paren {
            while let Some(t) = tokens.get(j).filter(inside) {
                j += 1;
                if t.kind() == TokenKind::Comment {
                    continue;
                }
                name.push_str(t.id());
                if t.id() == ")" {
                    break;
                }
            }
        }

        let (next, body) = consume_extent(tokens, j, extent, false);
        return Ok((next, Block::define(name, body, line)));
    }

    let (next, body) = consume_extent(tokens, k + 1, extent, false);
    let is_inclusion =
        directive.is_inclusion() || hash.cursor().kind == CursorKind::InclusionDirective;
    if is_inclusion && body.is_empty() {
        return Err(FoldError::malformed_directive(
            keyword.location(),
            format!("expected file name after `#{directive}`"),
        ));
    }
    Ok((next, Block::directive(directive, body, line)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Cursor, SourceLocation};

    fn rendered(source: &str) -> Vec<String> {
        parse_source(source)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn single_directive() {
        assert_eq!(rendered("#error hello"), ["#error hello"]);
    }

    #[test]
    fn directive_with_continuation() {
        let blocks = rendered("#define A \\\n  (1 + 2)\nint x;\n");
        assert_eq!(blocks, ["#define A (1 + 2)", "int\nx\n;"]);
    }

    #[test]
    fn function_like_define_keeps_parameters_in_name() {
        let list = parse_source("#define MAX(a, b) ((a) > (b) ? (a) : (b))\n").unwrap();
        assert_eq!(list.defined_macros(), ["MAX(a,b)"]);
        assert_eq!(
            list.iter().next().unwrap().to_string(),
            "#define MAX(a,b) ((a) > (b) ? (a) : (b))"
        );
    }

    #[test]
    fn object_like_define_with_parenthesized_body() {
        let list = parse_source("#define NEG (-1)\n").unwrap();
        assert_eq!(list.defined_macros(), ["NEG"]);
    }

    #[test]
    fn ifdef_is_desugared_and_rerendered() {
        let list = parse_source("#ifdef FOO\nint x;\n#endif /* FOO */\n").unwrap();
        let blocks: Vec<_> = list.iter().collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].directive_kind(), Some(&Directive::If));
        assert_eq!(blocks[0].expr().unwrap().dump(), "(defined FOO)");
        assert_eq!(blocks[0].to_string(), "#ifdef FOO");
        assert_eq!(blocks[2].to_string(), "#endif");
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            rendered("/* header */\n#if A /* why */ && B\n#endif\n"),
            ["#if A && B", "#endif"]
        );
    }

    #[test]
    fn struct_with_embedded_directive_is_split() {
        let blocks = rendered("struct s {\n#ifdef X\n int a;\n#endif\n int b;\n};\n");
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[0], "struct\ns\n{");
        assert_eq!(blocks[1], "#ifdef X");
        assert_eq!(blocks[2], "int\na\n;");
        assert_eq!(blocks[3], "#endif");
        assert_eq!(blocks[4], "int\nb\n;\n}\n;");
    }

    #[test]
    fn unclassified_tokens_group_by_line() {
        let blocks = rendered("__BEGIN_DECLS\n#define X 1\n__END_DECLS\n");
        assert_eq!(blocks, ["__BEGIN_DECLS", "#define X 1", "__END_DECLS"]);
    }

    #[test]
    fn declarations_outside_known_statics_are_separated() {
        let source = "static int keep(void) { return 0; }\nextern int drop;\n";
        let parser = BlockParser::new().with_known_statics(["keep"]);
        let list = parser.parse(&frontend::tokenize(source)).unwrap();
        let blocks: Vec<_> = list.iter().map(ToString::to_string).collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("static\nint\nkeep"));
        assert_eq!(blocks[1], "extern\nint\ndrop\n;");
    }

    #[test]
    fn declared_names() {
        let name = |s: &str| declared_name(&frontend::tokenize(s)).to_string();
        assert_eq!(name("extern unsigned long foo[4];"), "foo");
        assert_eq!(name("static inline int bar(int x);"), "bar");
        assert_eq!(name("int baz = 3;"), "baz");
    }

    #[test]
    fn missing_directive_name_is_an_error() {
        let err = parse_source("int x;\n#\n").unwrap_err();
        assert!(matches!(err, FoldError::MalformedDirective { .. }));
        assert_eq!(err.location(), Some(SourceLocation::new(2, 1)));
    }

    #[test]
    fn define_without_name_is_an_error() {
        let err = parse_source("#define\n").unwrap_err();
        assert!(matches!(err, FoldError::MalformedDirective { .. }));
        assert!(parse_source("#define 3 4\n").is_err());
    }

    #[test]
    fn include_without_file_is_an_error() {
        let err = parse_source("#include\n").unwrap_err();
        assert!(err.to_string().contains("expected file name"));
    }

    #[test]
    fn bad_condition_is_an_expression_error() {
        let err = parse_source("#if (A\n#endif\n").unwrap_err();
        assert!(matches!(err, FoldError::Expression { .. }));
    }

    #[test]
    fn end_of_stream_stops_parsing() {
        let mut tokens = frontend::tokenize("int x;\n");
        tokens.push(Token::synthetic(TokenKind::EndOfStream, ""));
        tokens.push(Token::new(
            TokenKind::Identifier,
            "ignored",
            SourceLocation::new(2, 1),
            Cursor::default(),
        ));
        let list = BlockParser::new().parse(&tokens).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn stalled_consumers_still_advance() {
        // A declaration cursor whose extent does not contain its token
        let cursor = Cursor::new(
            CursorKind::VarDecl,
            Extent::new(SourceLocation::new(9, 1), SourceLocation::new(9, 5)),
        );
        let tokens = vec![Token::new(
            TokenKind::Identifier,
            "stray",
            SourceLocation::new(1, 1),
            cursor,
        )];
        let list = BlockParser::new().parse(&tokens).unwrap();
        assert_eq!(list.len(), 1);
    }
}
