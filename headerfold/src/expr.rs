//! Expression trees for `#if` and `#elif` conditions.
//!
//! Conditions are parsed by precedence climbing into an [`Expr`], partially
//! evaluated against a [`MacroTable`] with [`Expr::optimize`], and rendered
//! back either in source form (`Display`) or in a fully parenthesized debug
//! form ([`Expr::dump`]).

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::error::{FoldError, Result};
use crate::frontend;
use crate::macros::{MacroTable, MacroValue};
use crate::token::{Token, TokenKind, join_ids};

/// Precedence of leaves, higher than any operator
const ATOM_PRECEDENCE: u8 = u8::MAX;

/// Prefix operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `~`
    Complement,
}

impl UnaryOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "!" => Some(UnaryOp::Not),
            "~" => Some(UnaryOp::Complement),
            _ => None,
        }
    }

    /// Source spelling
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Complement => "~",
        }
    }

    /// Binding strength
    #[must_use]
    pub const fn precedence(self) -> u8 {
        12
    }
}

/// Infix operators
///
/// The conditional operator is modeled as two left-associative operators of
/// the lowest precedence: `a ? b : c` is `(a ? b) : c`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `||`
    LogicalOr,
    /// `&&`
    LogicalAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Remainder,
}

impl BinaryOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "?" => BinaryOp::Question,
            ":" => BinaryOp::Colon,
            "||" => BinaryOp::LogicalOr,
            "&&" => BinaryOp::LogicalAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "&" => BinaryOp::BitAnd,
            "==" => BinaryOp::Equal,
            "!=" => BinaryOp::NotEqual,
            "<" => BinaryOp::Less,
            "<=" => BinaryOp::LessEqual,
            ">" => BinaryOp::Greater,
            ">=" => BinaryOp::GreaterEqual,
            "<<" => BinaryOp::ShiftLeft,
            ">>" => BinaryOp::ShiftRight,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Subtract,
            "*" => BinaryOp::Multiply,
            "/" => BinaryOp::Divide,
            "%" => BinaryOp::Remainder,
            _ => return None,
        };
        Some(op)
    }

    /// Source spelling
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Question => "?",
            BinaryOp::Colon => ":",
            BinaryOp::LogicalOr => "||",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
        }
    }

    /// Binding strength, from 1 (`?`, `:`) to 11 (`*`, `/`, `%`)
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Question | BinaryOp::Colon => 1,
            BinaryOp::LogicalOr => 2,
            BinaryOp::LogicalAnd => 3,
            BinaryOp::BitOr => 4,
            BinaryOp::BitXor => 5,
            BinaryOp::BitAnd => 6,
            BinaryOp::Equal | BinaryOp::NotEqual => 7,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => 8,
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => 9,
            BinaryOp::Add | BinaryOp::Subtract => 10,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Remainder => 11,
        }
    }
}

/// A parsed preprocessor condition
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Decimal (or octal) integer constant
    ///
    /// Wide enough for every unsigned 64-bit literal.
    Int(i128),
    /// Hexadecimal integer constant
    Hex(i128),
    /// Bare identifier
    Ident(String),
    /// `defined(NAME)` test
    Defined(String),
    /// Function-like macro invocation, arguments kept as raw token ids
    Call {
        /// Macro name
        name: String,
        /// Arguments split on top-level commas
        args: Vec<Vec<String>>,
    },
    /// Prefix operation
    Unary(UnaryOp, Box<Expr>),
    /// Infix operation
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse a condition from the tokens following `#if` or `#elif`
    ///
    /// Every token must be consumed; comments are not expected in `tokens`.
    pub fn parse(tokens: &[Token]) -> Result<Expr> {
        let mut parser = ExprParser { tokens, pos: 0 };
        let expr = parser.parse_expression(0)?;
        if parser.pos < tokens.len() {
            return Err(parser.error("unexpected token after expression"));
        }
        Ok(expr)
    }

    fn unary(op: UnaryOp, child: Expr) -> Expr {
        Expr::Unary(op, Box::new(child))
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary(op, Box::new(left), Box::new(right))
    }

    /// Value of a constant root, `None` when the expression is not a constant
    #[must_use]
    pub fn to_int(&self) -> Option<i128> {
        match self {
            Expr::Int(value) | Expr::Hex(value) => Some(*value),
            _ => None,
        }
    }

    /// Structural equality of two trees
    #[must_use]
    pub fn is_equal(&self, other: &Expr) -> bool {
        self == other
    }

    /// Binding strength of the root
    #[must_use]
    pub fn precedence(&self) -> u8 {
        match self {
            Expr::Unary(op, _) => op.precedence(),
            Expr::Binary(op, _, _) => op.precedence(),
            _ => ATOM_PRECEDENCE,
        }
    }

    /// Debug form, fully parenthesized: `(|| (ident A) (defined B))`
    #[must_use]
    pub fn dump(&self) -> String {
        Dump(self).to_string()
    }

    /// Substitute known macros and fold what becomes constant
    ///
    /// Only `defined`, identifiers, `!`, `&&` and `||` are folded; other
    /// operators keep their shape with optimized operands.
    #[must_use]
    pub fn optimize(&self, macros: &MacroTable) -> Expr {
        self.optimize_node(macros, 0)
    }

    fn optimize_node(&self, macros: &MacroTable, depth: usize) -> Expr {
        match self {
            Expr::Defined(name) => match macros.get(name) {
                Some(MacroValue::Undefined) => Expr::Int(0),
                Some(value @ MacroValue::Value(alias)) => match value.as_int() {
                    Some(n) => Expr::Int(i128::from(n)),
                    None => Expr::Defined(alias.clone()),
                },
                None if macros.is_removed(name) => Expr::Int(0),
                None => self.clone(),
            },
            Expr::Ident(name) => match macros.get(name) {
                Some(value @ MacroValue::Value(alias)) => {
                    if depth >= macros.recursion_limit() {
                        debug!("alias chain through `{name}` exceeds the recursion limit");
                        return self.clone();
                    }
                    let expanded = match value.as_int() {
                        Some(n) => Expr::Int(i128::from(n)),
                        None => Expr::Ident(alias.clone()),
                    };
                    expanded.optimize_node(macros, depth + 1)
                }
                _ => self.clone(),
            },
            Expr::Unary(UnaryOp::Not, child) => {
                let child = child.optimize_node(macros, depth);
                match child.to_int() {
                    Some(0) => Expr::Int(1),
                    Some(_) => Expr::Int(0),
                    None => Expr::unary(UnaryOp::Not, child),
                }
            }
            Expr::Binary(op @ (BinaryOp::LogicalAnd | BinaryOp::LogicalOr), left, right) => {
                let left = left.optimize_node(macros, depth);
                let right = right.optimize_node(macros, depth);
                let is_and = *op == BinaryOp::LogicalAnd;
                // A zero side decides `&&`, a nonzero side decides `||`;
                // the other constant is neutral and yields the remaining side.
                match (left.to_int(), right.to_int()) {
                    (Some(l), _) if (l == 0) == is_and => Expr::Int(i128::from(!is_and)),
                    (Some(_), _) => right,
                    (None, Some(r)) if (r == 0) == is_and => Expr::Int(i128::from(!is_and)),
                    (None, Some(_)) => left,
                    (None, None) => Expr::binary(*op, left, right),
                }
            }
            Expr::Unary(op, child) => Expr::unary(*op, child.optimize_node(macros, depth)),
            Expr::Binary(op, left, right) => Expr::binary(
                *op,
                left.optimize_node(macros, depth),
                right.optimize_node(macros, depth),
            ),
            Expr::Int(_) | Expr::Hex(_) | Expr::Call { .. } => self.clone(),
        }
    }
}

impl FromStr for Expr {
    type Err = FoldError;

    /// Parse a condition written as source text
    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<Token> = frontend::tokenize(s)
            .into_iter()
            .filter(|t| t.kind() != TokenKind::Comment)
            .collect();
        Expr::parse(&tokens)
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, value: i128) -> fmt::Result {
    if value < 0 {
        write!(f, "-0x{:x}", value.unsigned_abs())
    } else {
        write!(f, "0x{value:x}")
    }
}

impl fmt::Display for Expr {
    /// Source form, parenthesized only where precedence requires it
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(value) => write!(f, "{value}"),
            Expr::Hex(value) => write_hex(f, *value),
            Expr::Ident(name) => f.write_str(name),
            Expr::Defined(name) => write!(f, "defined({name})"),
            Expr::Call { name, args } => {
                let args: Vec<String> = args.iter().map(|arg| arg.join(" ")).collect();
                write!(f, "{name}({})", args.join(", "))
            }
            Expr::Unary(op, child) => {
                if child.precedence() < op.precedence() {
                    write!(f, "{}({child})", op.symbol())
                } else {
                    write!(f, "{}{child}", op.symbol())
                }
            }
            Expr::Binary(op, left, right) => {
                let prec = op.precedence();
                if left.precedence() < prec {
                    write!(f, "({left})")?;
                } else {
                    write!(f, "{left}")?;
                }
                write!(f, " {} ", op.symbol())?;
                // Parsing folds to the left, so an equal right operand needs parentheses
                if right.precedence() <= prec {
                    write!(f, "({right})")
                } else {
                    write!(f, "{right}")
                }
            }
        }
    }
}

/// Debug rendering adapter behind [`Expr::dump`]
struct Dump<'a>(&'a Expr);

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::Int(value) => write!(f, "(int {value})"),
            Expr::Hex(value) => {
                f.write_str("(hex ")?;
                write_hex(f, *value)?;
                f.write_str(")")
            }
            Expr::Ident(name) => write!(f, "(ident {name})"),
            Expr::Defined(name) => write!(f, "(defined {name})"),
            Expr::Call { name, args } => {
                let args: Vec<String> = args.iter().map(|arg| arg.concat()).collect();
                write!(f, "(call {name} [{}])", args.join(","))
            }
            Expr::Unary(op, child) => write!(f, "({} {})", op.symbol(), Dump(child)),
            Expr::Binary(op, left, right) => {
                write!(f, "({} {} {})", op.symbol(), Dump(left), Dump(right))
            }
        }
    }
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_id(&self) -> Option<&'a str> {
        self.peek().map(Token::id)
    }

    fn error<S: Into<String>>(&self, message: S) -> FoldError {
        let token = self.peek();
        FoldError::Expression {
            message: message.into(),
            location: token.map(Token::location),
            found: token.map(|t| t.id().to_string()),
            expression: join_ids(self.tokens, " "),
        }
    }

    fn expect(&mut self, id: &str) -> Result<()> {
        if self.peek_id() == Some(id) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected `{id}`")))
        }
    }

    fn peek_binary(&self) -> Option<BinaryOp> {
        self.peek()
            .filter(|t| t.kind() == TokenKind::Punctuation)
            .and_then(|t| BinaryOp::from_symbol(t.id()))
    }

    fn parse_expression(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut node = self.parse_primary()?;
        while let Some(op) = self.peek_binary()
            && op.precedence() >= min_precedence
        {
            self.pos += 1;
            let rhs = self.parse_expression(op.precedence() + 1)?;
            node = Expr::binary(op, node, rhs);
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let Some(token) = self.peek() else {
            return Err(self.error("expected expression"));
        };

        if token.kind() == TokenKind::Punctuation
            && let Some(op) = UnaryOp::from_symbol(token.id())
        {
            self.pos += 1;
            let child = self.parse_expression(op.precedence())?;
            return Ok(Expr::unary(op, child));
        }

        match (token.kind(), token.id()) {
            (TokenKind::Punctuation, "(") => {
                self.pos += 1;
                let inner = self.parse_expression(0)?;
                self.expect(")")?;
                Ok(inner)
            }
            (TokenKind::Punctuation, "?") => {
                self.pos += 1;
                let inner = self.parse_expression(0)?;
                self.expect(":")?;
                Ok(inner)
            }
            (TokenKind::Punctuation, "+" | "-")
                if self
                    .tokens
                    .get(self.pos + 1)
                    .is_some_and(|t| t.kind() == TokenKind::Literal) =>
            {
                self.parse_number()
            }
            (TokenKind::Literal, _) => self.parse_number(),
            (_, "defined") => self.parse_defined(),
            (TokenKind::Identifier, _) => self.parse_call_or_ident(),
            _ => Err(self.error("unexpected token")),
        }
    }

    fn parse_number(&mut self) -> Result<Expr> {
        let negative = match self.peek_id() {
            Some("-") => {
                self.pos += 1;
                true
            }
            Some("+") => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        let Some(spelling) = self.peek_id() else {
            return Err(self.error("expected integer literal"));
        };
        let digits = spelling.trim_end_matches(['U', 'L', 'u', 'l']);

        let parsed = if let Some(hex) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            Self::parse_digits(hex, 16).map(Expr::Hex)
        } else if digits.len() > 1 && digits.starts_with('0') {
            Self::parse_digits(&digits[1..], 8).map(Expr::Int)
        } else {
            Self::parse_digits(digits, 10).map(Expr::Int)
        };

        let Some(expr) = parsed else {
            return Err(self.error("expected integer literal"));
        };
        self.pos += 1;
        Ok(match expr {
            Expr::Int(v) if negative => Expr::Int(-v),
            Expr::Hex(v) if negative => Expr::Hex(-v),
            other => other,
        })
    }

    fn parse_digits(digits: &str, radix: u32) -> Option<i128> {
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return None;
        }
        i128::from_str_radix(digits, radix).ok()
    }

    fn parse_defined(&mut self) -> Result<Expr> {
        self.pos += 1;
        let parenthesized = self.peek_id() == Some("(");
        if parenthesized {
            self.pos += 1;
        }
        let name = match self.peek() {
            Some(t) if t.is_identifier() => t.id().to_string(),
            _ => return Err(self.error("expected macro name after `defined`")),
        };
        self.pos += 1;
        if parenthesized {
            self.expect(")")?;
        }
        Ok(Expr::Defined(name))
    }

    fn parse_call_or_ident(&mut self) -> Result<Expr> {
        let name = self.peek_id().unwrap_or_default().to_string();
        self.pos += 1;
        if self.peek_id() != Some("(") {
            return Ok(Expr::Ident(name));
        }
        self.pos += 1;

        let mut args = Vec::new();
        let mut current = Vec::new();
        let mut depth = 1usize;
        loop {
            let Some(id) = self.peek_id() else {
                return Err(self.error(format!("expected `)` closing the arguments of `{name}`")));
            };
            self.pos += 1;
            match id {
                "(" => depth += 1,
                ")" if depth == 1 => {
                    args.push(current);
                    break;
                }
                ")" => depth -= 1,
                "," if depth == 1 => {
                    args.push(std::mem::take(&mut current));
                    continue;
                }
                _ => {}
            }
            current.push(id.to_string());
        }
        Ok(Expr::Call { name, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(source: &str) -> String {
        source.parse::<Expr>().unwrap().dump()
    }

    fn optimized(source: &str, macros: &[(&str, MacroValue)]) -> String {
        let table: MacroTable = macros.iter().cloned().collect();
        source.parse::<Expr>().unwrap().optimize(&table).dump()
    }

    fn source(text: &str) -> String {
        text.parse::<Expr>().unwrap().to_string()
    }

    fn value(text: &str) -> MacroValue {
        MacroValue::value(text)
    }

    #[test]
    fn parses_literals() {
        assert_eq!(dump("0"), "(int 0)");
        assert_eq!(dump("(0)"), "(int 0)");
        assert_eq!(dump("0x10UL"), "(hex 0x10)");
        assert_eq!(dump("010"), "(int 8)");
        assert_eq!(dump("-3"), "(int -3)");
        assert_eq!(dump("+7L"), "(int 7)");
    }

    #[test]
    fn parses_by_precedence() {
        assert_eq!(dump("1 && 1"), "(&& (int 1) (int 1))");
        assert_eq!(dump("EXAMPLE - 3"), "(- (ident EXAMPLE) (int 3))");
        assert_eq!(
            dump("A == 1 || defined(B)"),
            "(|| (== (ident A) (int 1)) (defined B))"
        );
        assert_eq!(
            dump("1 + 2 * 3 << 4"),
            "(<< (+ (int 1) (* (int 2) (int 3))) (int 4))"
        );
        assert_eq!(dump("A - B - C"), "(- (- (ident A) (ident B)) (ident C))");
    }

    #[test]
    fn parses_defined_forms() {
        assert_eq!(dump("defined ( EXAMPLE ) "), "(defined EXAMPLE)");
        assert_eq!(dump("defined EXAMPLE"), "(defined EXAMPLE)");
        assert_eq!(dump("!defined(EXAMPLE)"), "(! (defined EXAMPLE))");
        assert_eq!(
            dump("defined(ABC) || defined(BINGO)"),
            "(|| (defined ABC) (defined BINGO))"
        );
    }

    #[test]
    fn parses_calls_with_raw_arguments() {
        assert_eq!(dump("FOO(BAR,5)"), "(call FOO [BAR,5])");
        assert_eq!(dump("F(g(1, 2), x)"), "(call F [g(1,2),x])");
        assert_eq!(dump("F()"), "(call F [])");
    }

    #[test]
    fn parses_conditional_operator() {
        assert_eq!(
            dump("A ? B : C"),
            "(: (? (ident A) (ident B)) (ident C))"
        );
    }

    #[test]
    fn rejects_leftover_tokens() {
        let err = "A B".parse::<Expr>().unwrap_err();
        match err {
            FoldError::Expression {
                found, expression, ..
            } => {
                assert_eq!(found.as_deref(), Some("B"));
                assert_eq!(expression, "A B");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reports_end_of_input() {
        for text in ["(A", "defined(", "", "A &&", "F(1"] {
            let err = text.parse::<Expr>().unwrap_err();
            assert!(err.location().is_none(), "{text}: {err}");
        }
    }

    #[test]
    fn rejects_non_integer_literals() {
        assert!("'a' == 97".parse::<Expr>().is_err());
        assert!("1.5".parse::<Expr>().is_err());
        assert!("09".parse::<Expr>().is_err());
    }

    #[test]
    fn folds_constants() {
        assert_eq!(optimized("1 && 1", &[]), "(int 1)");
        assert_eq!(optimized("1 && 0", &[]), "(int 0)");
        assert_eq!(optimized("0 && 1", &[]), "(int 0)");
        assert_eq!(optimized("1 || 0", &[]), "(int 1)");
        assert_eq!(optimized("0 || 0", &[]), "(int 0)");
        assert_eq!(optimized("!0x0", &[]), "(int 1)");
    }

    #[test]
    fn short_circuits_known_identifiers() {
        assert_eq!(optimized("A", &[("A", value("1"))]), "(int 1)");
        assert_eq!(optimized("A || B", &[("A", value("1"))]), "(int 1)");
        assert_eq!(optimized("A || B", &[("B", value("1"))]), "(int 1)");
        assert_eq!(optimized("A && B", &[("A", value("1"))]), "(ident B)");
        assert_eq!(optimized("A && B", &[("B", value("1"))]), "(ident A)");
        assert_eq!(optimized("A && B", &[]), "(&& (ident A) (ident B))");
    }

    #[test]
    fn folds_defined() {
        assert_eq!(optimized("defined(EXAMPLE)", &[]), "(defined EXAMPLE)");
        assert_eq!(
            optimized("defined(EXAMPLE)", &[("EXAMPLE", value("XOWOE"))]),
            "(defined XOWOE)"
        );
        assert_eq!(
            optimized("defined(EXAMPLE)", &[("EXAMPLE", MacroValue::Undefined)]),
            "(int 0)"
        );
        assert_eq!(
            optimized("!defined(EXAMPLE)", &[("EXAMPLE", value("XOWOE"))]),
            "(! (defined XOWOE))"
        );
        assert_eq!(
            optimized("!defined(EXAMPLE)", &[("EXAMPLE", MacroValue::Undefined)]),
            "(int 1)"
        );
    }

    #[test]
    fn folds_defined_combinations() {
        let undefined = || MacroValue::Undefined;
        assert_eq!(
            optimized("defined(A) || defined(B)", &[("A", value("1"))]),
            "(int 1)"
        );
        assert_eq!(
            optimized("defined(A) || defined(B)", &[("B", undefined())]),
            "(defined A)"
        );
        assert_eq!(
            optimized(
                "defined(A) || defined(B)",
                &[("A", undefined()), ("B", undefined())]
            ),
            "(int 0)"
        );
        assert_eq!(
            optimized("defined(A) && defined(B)", &[("A", value("1"))]),
            "(defined B)"
        );
        assert_eq!(
            optimized("defined(A) && defined(B)", &[("B", value("1"))]),
            "(defined A)"
        );
        assert_eq!(
            optimized("defined(A) && defined(B)", &[("A", undefined())]),
            "(int 0)"
        );
    }

    #[test]
    fn folds_kernel_guard() {
        assert_eq!(
            optimized(
                "defined(__KERNEL__) || !defined(__GLIBC__) || (__GLIBC__ < 2)",
                &[("__KERNEL__", MacroValue::Undefined)]
            ),
            "(|| (! (defined __GLIBC__)) (< (ident __GLIBC__) (int 2)))"
        );
    }

    #[test]
    fn other_operators_optimize_their_operands() {
        assert_eq!(
            optimized("A + 1 == B", &[("A", value("2")), ("B", value("C"))]),
            "(== (+ (int 2) (int 1)) (ident C))"
        );
    }

    #[test]
    fn removed_prefix_folds_defined_only() {
        let table = MacroTable::new().with_removed_prefix("CONFIG_");
        let expr: Expr = "defined(CONFIG_SMP) || CONFIG_NR".parse().unwrap();
        assert_eq!(expr.optimize(&table).dump(), "(ident CONFIG_NR)");
    }

    #[test]
    fn alias_chains_are_bounded() {
        let mut table = MacroTable::new().with_recursion_limit(4);
        table.define("A", "B");
        table.define("B", "A");
        let expr: Expr = "A".parse().unwrap();
        assert!(matches!(expr.optimize(&table), Expr::Ident(_)));

        table.define("B", "C");
        assert_eq!(expr.optimize(&table).dump(), "(ident C)");
    }

    #[test]
    fn undefined_identifier_is_left_alone() {
        assert_eq!(
            optimized("FOO > 2", &[("FOO", MacroValue::Undefined)]),
            "(> (ident FOO) (int 2))"
        );
    }

    #[test]
    fn renders_source_form() {
        for text in [
            "0",
            "1 && 1",
            "0 || 1",
            "EXAMPLE",
            "EXAMPLE - 3",
            "defined(EXAMPLE)",
            "A == 1 || defined(B)",
        ] {
            assert_eq!(source(text), text);
        }
        assert_eq!(source("defined EXAMPLE"), "defined(EXAMPLE)");
        assert_eq!(source("(A || B) && C"), "(A || B) && C");
        assert_eq!(source("!(A && B)"), "!(A && B)");
        assert_eq!(source("A - (B - C)"), "A - (B - C)");
        assert_eq!(source("FOO(BAR,5)"), "FOO(BAR, 5)");
        assert_eq!(source("0x1f"), "0x1f");
    }

    #[test]
    fn source_form_round_trips() {
        for text in ["A - (B - C)", "!(A || B) && ~C", "(A ? B : C) + 1", "F(x, (y))"] {
            let first: Expr = text.parse().unwrap();
            let second: Expr = first.to_string().parse().unwrap();
            assert!(first.is_equal(&second), "{text} -> {first}");
        }
    }

    #[test]
    fn to_int_on_constants_only() {
        assert_eq!("0x20".parse::<Expr>().unwrap().to_int(), Some(32));
        assert_eq!("7".parse::<Expr>().unwrap().to_int(), Some(7));
        assert_eq!("A".parse::<Expr>().unwrap().to_int(), None);
        assert_eq!("1 + 1".parse::<Expr>().unwrap().to_int(), None);
    }

    #[test]
    fn unsigned_64_bit_literals() {
        let all_ones = "0xffffffffffffffffUL".parse::<Expr>().unwrap();
        assert_eq!(all_ones.to_int(), Some(i128::from(u64::MAX)));
        assert_eq!(all_ones.to_string(), "0xffffffffffffffff");
        assert_eq!(
            "18446744073709551615ULL".parse::<Expr>().unwrap().to_int(),
            Some(i128::from(u64::MAX))
        );
        assert_eq!(
            dump("X == 0xffffffffffffffffUL"),
            "(== (ident X) (hex 0xffffffffffffffff))"
        );
    }
}
