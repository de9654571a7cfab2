//! Directive and text blocks, the unit of work of the optimizer.

use std::collections::HashMap;
use std::fmt;

use crate::error::Result;
use crate::expr::{Expr, UnaryOp};
use crate::macros::MacroTable;
use crate::render::strip_space;
use crate::token::{Token, TokenKind, join_ids};

/// Preprocessor directive keyword
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Directive {
    /// `#if`
    If,
    /// `#ifdef`, desugared into [`Directive::If`] when a block is built
    Ifdef,
    /// `#ifndef`, desugared into [`Directive::If`] when a block is built
    Ifndef,
    /// `#elif`
    Elif,
    /// `#else`
    Else,
    /// `#endif`
    Endif,
    /// `#define`
    Define,
    /// `#undef`
    Undef,
    /// `#include`
    Include,
    /// `#error`
    Error,
    /// `#warning`
    Warning,
    /// `#pragma`
    Pragma,
    /// `#line`
    Line,
    /// Any other keyword, passed through verbatim
    Other(String),
}

impl Directive {
    /// Map a directive keyword to its variant
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "if" => Directive::If,
            "ifdef" => Directive::Ifdef,
            "ifndef" => Directive::Ifndef,
            "elif" => Directive::Elif,
            "else" => Directive::Else,
            "endif" => Directive::Endif,
            "define" => Directive::Define,
            "undef" => Directive::Undef,
            "include" => Directive::Include,
            "error" => Directive::Error,
            "warning" => Directive::Warning,
            "pragma" => Directive::Pragma,
            "line" => Directive::Line,
            other => Directive::Other(other.to_string()),
        }
    }

    /// Keyword as written after `#`
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Directive::If => "if",
            Directive::Ifdef => "ifdef",
            Directive::Ifndef => "ifndef",
            Directive::Elif => "elif",
            Directive::Else => "else",
            Directive::Endif => "endif",
            Directive::Define => "define",
            Directive::Undef => "undef",
            Directive::Include => "include",
            Directive::Error => "error",
            Directive::Warning => "warning",
            Directive::Pragma => "pragma",
            Directive::Line => "line",
            Directive::Other(keyword) => keyword,
        }
    }

    /// `#if`, `#ifdef` or `#ifndef`: opens a conditional group
    #[must_use]
    pub fn opens_conditional(&self) -> bool {
        matches!(self, Directive::If | Directive::Ifdef | Directive::Ifndef)
    }

    /// `#if` or `#elif`: carries a condition
    #[must_use]
    pub fn is_if_like(&self) -> bool {
        matches!(self, Directive::If | Directive::Elif)
    }

    /// Whether the body names a file rather than an expression
    #[must_use]
    pub fn is_inclusion(&self) -> bool {
        match self {
            Directive::Include => true,
            Directive::Other(keyword) => matches!(keyword.as_str(), "include_next" | "import"),
            _ => false,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One directive, or a run of non-directive text
///
/// For directive blocks, `tokens` holds the directive body: what follows the
/// keyword (and, for `#define`, what follows the macro name). `#ifdef X` and
/// `#ifndef X` are stored as `#if defined X` and `#if ! defined X`, and every
/// `#if`/`#elif` block keeps the expression parsed from its tokens.
#[derive(Clone, Debug)]
pub struct Block {
    directive: Option<Directive>,
    tokens: Vec<Token>,
    line: u32,
    define_id: Option<String>,
    expr: Option<Expr>,
}

impl Block {
    /// Create a text block
    #[must_use]
    pub fn text(tokens: Vec<Token>) -> Self {
        let line = tokens.first().map_or(0, |t| t.location().line);
        Self {
            directive: None,
            tokens,
            line,
            define_id: None,
            expr: None,
        }
    }

    /// Create a directive block from its body, desugaring `#ifdef`/`#ifndef`
    ///
    /// Fails when the body of an `#if`-like directive is not a valid expression.
    pub fn directive(directive: Directive, body: Vec<Token>, line: u32) -> Result<Self> {
        let (directive, tokens) = match directive {
            Directive::Ifdef => {
                let mut tokens = vec![Token::synthetic(TokenKind::Identifier, "defined")];
                tokens.extend(body);
                (Directive::If, tokens)
            }
            Directive::Ifndef => {
                let mut tokens = vec![
                    Token::synthetic(TokenKind::Punctuation, "!"),
                    Token::synthetic(TokenKind::Identifier, "defined"),
                ];
                tokens.extend(body);
                (Directive::If, tokens)
            }
            other => (other, body),
        };
        let expr = if directive.is_if_like() {
            Some(Expr::parse(&tokens)?)
        } else {
            None
        };
        Ok(Self {
            directive: Some(directive),
            tokens,
            line,
            define_id: None,
            expr,
        })
    }

    /// Create a `#define` block for macro `name` (parameter list included)
    pub fn define<S: Into<String>>(name: S, body: Vec<Token>, line: u32) -> Self {
        Self {
            directive: Some(Directive::Define),
            tokens: body,
            line,
            define_id: Some(name.into()),
            expr: None,
        }
    }

    /// Copy of this block turned into an `if`-like `directive` with a constant condition
    pub(crate) fn with_constant(&self, directive: Directive, value: i128) -> Self {
        Self {
            directive: Some(directive),
            tokens: vec![Token::synthetic(TokenKind::Literal, value.to_string())],
            line: self.line,
            define_id: None,
            expr: Some(Expr::Int(value)),
        }
    }

    /// Copy of this block with its directive replaced, keeping tokens and condition
    pub(crate) fn with_directive(&self, directive: Directive) -> Self {
        Self {
            directive: Some(directive),
            ..self.clone()
        }
    }

    /// Directive, `None` for text blocks
    #[must_use]
    pub fn directive_kind(&self) -> Option<&Directive> {
        self.directive.as_ref()
    }

    /// Body tokens
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Source line the block starts on, 0 when unknown
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Condition of an `#if`/`#elif` block
    #[must_use]
    pub fn expr(&self) -> Option<&Expr> {
        self.expr.as_ref()
    }

    /// Whether this is a directive block
    #[must_use]
    pub fn is_directive(&self) -> bool {
        self.directive.is_some()
    }

    /// Whether this is an `#if`/`#elif` block
    #[must_use]
    pub fn is_if_like(&self) -> bool {
        self.directive.as_ref().is_some_and(Directive::is_if_like)
    }

    /// Whether this is an `#endif` block
    #[must_use]
    pub fn is_endif(&self) -> bool {
        self.directive == Some(Directive::Endif)
    }

    /// Macro name of a `#define` block
    #[must_use]
    pub fn define_id(&self) -> Option<&str> {
        match self.directive {
            Some(Directive::Define) => self.define_id.as_deref(),
            _ => None,
        }
    }

    /// Included file of an `#include` block, with its quotes or angle brackets
    ///
    /// Anything after the closing `>` is ignored.
    #[must_use]
    pub fn include_target(&self) -> Option<String> {
        if self.directive != Some(Directive::Include) {
            return None;
        }
        let first = self.tokens.first()?;
        if first.kind() == TokenKind::String {
            return Some(first.id().to_string());
        }
        if first.id() != "<" {
            return None;
        }
        let close = self.tokens.iter().position(|t| t.id() == ">")?;
        Some(join_ids(&self.tokens[..=close], ""))
    }

    /// Replace the condition with its optimized form
    pub fn optimize_macros(&mut self, macros: &MacroTable) {
        if let Some(expr) = &mut self.expr {
            *expr = expr.optimize(macros);
        }
    }

    /// Rename identifiers found in `replacements`, `#include` bodies excepted
    ///
    /// The condition of a changed `#if`/`#elif` block is parsed again from the
    /// renamed tokens. Returns whether anything changed.
    pub fn replace_tokens(&mut self, replacements: &HashMap<String, String>) -> Result<bool> {
        if self.directive == Some(Directive::Include) {
            return Ok(false);
        }
        let mut changed = false;
        for token in &mut self.tokens {
            if token.is_identifier()
                && let Some(new_id) = replacements.get(token.id())
            {
                *token = token.renamed(new_id.as_str());
                changed = true;
            }
        }
        if self.directive == Some(Directive::Define)
            && let Some(name) = &mut self.define_id
            && let Some(new_name) = replacements.get(name.as_str())
        {
            *name = new_name.clone();
            changed = true;
        }
        if changed && self.is_if_like() {
            self.expr = Some(Expr::parse(&self.tokens)?);
        }
        Ok(changed)
    }

    /// Collapse space runs and drop blank lines in a text block
    ///
    /// Only meaningful for token streams that carry explicit `" "` and `"\n"`
    /// tokens; directive blocks are left alone.
    pub fn remove_white_space(&mut self) {
        if self.directive.is_some() {
            return;
        }
        let mut kept = Vec::with_capacity(self.tokens.len());
        let mut pending_space: Option<&Token> = None;
        let mut line_has_content = false;
        for token in &self.tokens {
            if token.is_space() {
                pending_space.get_or_insert(token);
            } else if token.is_newline() {
                if line_has_content {
                    kept.push(token.clone());
                }
                pending_space = None;
                line_has_content = false;
            } else {
                if let Some(space) = pending_space.take() {
                    kept.push(space.renamed(" "));
                }
                kept.push(token.clone());
                line_has_content = true;
            }
        }
        self.tokens = kept;
    }

    fn fmt_directive(&self, directive: &Directive, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(expr) = &self.expr {
            if *directive == Directive::If {
                if let Expr::Defined(name) = expr {
                    return write!(f, "#ifdef {name}");
                }
                if let Expr::Unary(UnaryOp::Not, child) = expr
                    && let Expr::Defined(name) = child.as_ref()
                {
                    return write!(f, "#ifndef {name}");
                }
            }
            return write!(f, "#{directive} {expr}");
        }

        if *directive == Directive::Include
            && let Some(target) = self.include_target()
        {
            return write!(f, "#include {target}");
        }

        let body = join_ids(&self.tokens, " ");
        match directive {
            Directive::Define => {
                write!(f, "#define {}", self.define_id.as_deref().unwrap_or_default())?;
                if !self.tokens.is_empty() {
                    write!(f, " {}", strip_space(&body, false))?;
                }
                Ok(())
            }
            _ => {
                write!(f, "#{directive}")?;
                if !self.tokens.is_empty() {
                    write!(f, " {}", strip_space(&body, directive.is_inclusion()))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Block {
    /// Source form: the directive line, or one line per token for text
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.directive {
            Some(directive) => self.fmt_directive(directive, f),
            None => f.write_str(&join_ids(&self.tokens, "\n")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::tokenize;
    use crate::token::SourceLocation;

    fn body(source: &str) -> Vec<Token> {
        tokenize(source)
            .into_iter()
            .filter(|t| t.kind() != TokenKind::Comment)
            .collect()
    }

    fn directive(kind: Directive, source: &str) -> Block {
        Block::directive(kind, body(source), 1).unwrap()
    }

    #[test]
    fn ifdef_is_desugared() {
        let block = directive(Directive::Ifdef, "MACRO");
        assert_eq!(block.directive_kind(), Some(&Directive::If));
        assert_eq!(join_ids(block.tokens(), " "), "defined MACRO");
        let plain = directive(Directive::If, "defined(MACRO)");
        assert!(block.expr().unwrap().is_equal(plain.expr().unwrap()));
        assert_eq!(block.to_string(), "#ifdef MACRO");
        assert_eq!(plain.to_string(), "#ifdef MACRO");
    }

    #[test]
    fn ifndef_is_desugared() {
        let block = directive(Directive::Ifndef, "MACRO");
        assert_eq!(block.expr().unwrap().dump(), "(! (defined MACRO))");
        assert_eq!(block.to_string(), "#ifndef MACRO");
    }

    #[test]
    fn if_renders_from_expression() {
        let block = directive(Directive::If, "A  ==  1 || defined B");
        assert_eq!(block.to_string(), "#if A == 1 || defined(B)");
        let block = directive(Directive::Elif, "defined(B)");
        assert_eq!(block.to_string(), "#elif defined(B)");
        let block = directive(Directive::If, "!(A && B)");
        assert_eq!(block.to_string(), "#if !(A && B)");
    }

    #[test]
    fn invalid_condition_fails() {
        assert!(Block::directive(Directive::If, body("A +"), 1).is_err());
        assert!(Block::directive(Directive::Error, body("A +"), 1).is_ok());
    }

    #[test]
    fn define_rendering() {
        let block = Block::define("FOO(x)", body("( ( x ) + bar ( 1 , 2 ) )"), 3);
        assert_eq!(block.to_string(), "#define FOO(x) ((x) + bar(1, 2))");
        assert_eq!(block.define_id(), Some("FOO(x)"));
        assert_eq!(block.line(), 3);
        assert_eq!(Block::define("EMPTY", Vec::new(), 1).to_string(), "#define EMPTY");
    }

    #[test]
    fn include_targets() {
        let block = directive(Directive::Include, "<asm-generic/int-ll64.h> junk");
        assert_eq!(
            block.include_target().as_deref(),
            Some("<asm-generic/int-ll64.h>")
        );
        assert_eq!(block.to_string(), "#include <asm-generic/int-ll64.h>");

        let block = directive(Directive::Include, "\"local.h\"");
        assert_eq!(block.include_target().as_deref(), Some("\"local.h\""));
        assert_eq!(block.to_string(), "#include \"local.h\"");

        let block = directive(Directive::Include, "< unterminated");
        assert!(block.include_target().is_none());
    }

    #[test]
    fn other_directives_keep_their_body() {
        assert_eq!(directive(Directive::Error, "hello").to_string(), "#error hello");
        assert_eq!(directive(Directive::Endif, "").to_string(), "#endif");
        assert_eq!(
            directive(Directive::from_keyword("ident"), "\"v1\"").to_string(),
            "#ident \"v1\""
        );
        assert_eq!(
            directive(Directive::Pragma, "pack ( push , 1 )").to_string(),
            "#pragma pack(push, 1)"
        );
    }

    #[test]
    fn replace_tokens_reparses_condition() {
        let mut replacements = HashMap::new();
        replacements.insert("SIGRTMAX".to_string(), "__SIGRTMAX".to_string());

        let mut block = directive(Directive::Ifndef, "SIGRTMAX");
        assert!(block.replace_tokens(&replacements).unwrap());
        assert_eq!(block.to_string(), "#ifndef __SIGRTMAX");

        let mut define = Block::define("SIGRTMAX", body("123"), 1);
        assert!(define.replace_tokens(&replacements).unwrap());
        assert_eq!(define.to_string(), "#define __SIGRTMAX 123");

        let mut include = directive(Directive::Include, "<SIGRTMAX.h>");
        assert!(!include.replace_tokens(&replacements).unwrap());
    }

    #[test]
    fn constant_rewrites() {
        let block = directive(Directive::Else, "");
        let rewritten = block.with_constant(Directive::If, 1);
        assert_eq!(rewritten.expr().and_then(Expr::to_int), Some(1));
        assert_eq!(rewritten.to_string(), "#if 1");

        let elif = directive(Directive::Elif, "X");
        assert_eq!(elif.with_directive(Directive::If).to_string(), "#if X");
    }

    #[test]
    fn text_renders_one_token_per_line() {
        let block = Block::text(body("int x;"));
        assert_eq!(block.to_string(), "int\nx\n;");
        assert_eq!(block.line(), 1);
    }

    #[test]
    fn white_space_is_collapsed() {
        let at = SourceLocation::new(1, 1);
        let tok = |id: &str, kind| Token::new(kind, id, at, Default::default());
        let space = || tok(" ", TokenKind::Punctuation);
        let newline = || tok("\n", TokenKind::Punctuation);
        let mut block = Block::text(vec![
            space(),
            space(),
            newline(),
            tok("int", TokenKind::Identifier),
            space(),
            space(),
            tok("x", TokenKind::Identifier),
            space(),
            newline(),
            newline(),
            tok(";", TokenKind::Punctuation),
        ]);
        block.remove_white_space();
        let ids: Vec<_> = block.tokens().iter().map(Token::id).collect();
        assert_eq!(ids, ["int", " ", "x", "\n", ";"]);
    }
}
