//! Tokens, source locations and structural cursors.

use std::fmt;

/// Check if a character can start an identifier (letter or underscore)
pub const fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Check if a character can continue an identifier (letter, digit, or underscore)
pub const fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Lexical category of a token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// Operators and separators
    Punctuation,
    /// Identifiers and keywords
    Identifier,
    /// Numbers and character constants
    Literal,
    /// String literals
    String,
    /// Block and line comments
    Comment,
    /// End of the token stream
    EndOfStream,
}

/// A 1-based line/column position in the source
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    /// Line number, starting at 1
    pub line: u32,
    /// Column number, starting at 1
    pub column: u32,
}

impl SourceLocation {
    /// Create a location
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Inclusive source range of a syntactic construct
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    /// First position covered
    pub start: SourceLocation,
    /// Last position covered
    pub end: SourceLocation,
}

impl Extent {
    /// Create an extent
    #[must_use]
    pub const fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }

    /// Whether `location` lies within this extent
    #[must_use]
    pub fn contains(&self, location: SourceLocation) -> bool {
        self.start <= location && location <= self.end
    }
}

/// Structural classification of the construct a token belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorKind {
    /// `#define`, `#if`, `#pragma`, ...
    PreprocessingDirective,
    /// `#include` and friends
    InclusionDirective,
    /// Variable declaration
    VarDecl,
    /// Function declaration or definition
    FunctionDecl,
    /// `struct` or `union` declaration
    StructDecl,
    /// `enum` declaration
    EnumDecl,
    /// Anything else
    Other,
}

/// Classification handed over by the front end, with the construct's extent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    /// Kind of the enclosing construct
    pub kind: CursorKind,
    /// Source range of the enclosing construct
    pub extent: Extent,
}

impl Cursor {
    /// Create a cursor
    #[must_use]
    pub const fn new(kind: CursorKind, extent: Extent) -> Self {
        Self { kind, extent }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new(CursorKind::Other, Extent::default())
    }
}

/// A classified lexical token
///
/// Tokens are values: renaming an identifier produces a new token through
/// [`Token::renamed`] rather than mutating a shared one.
#[derive(Clone, Debug)]
pub struct Token {
    kind: TokenKind,
    spelling: String,
    id: Option<String>,
    location: SourceLocation,
    cursor: Cursor,
}

impl Token {
    /// Create a token as produced by a front end
    pub fn new<S: Into<String>>(
        kind: TokenKind,
        spelling: S,
        location: SourceLocation,
        cursor: Cursor,
    ) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            id: None,
            location,
            cursor,
        }
    }

    /// Create a token that does not come from the source text
    pub fn synthetic<S: Into<String>>(kind: TokenKind, spelling: S) -> Self {
        Self::new(kind, spelling, SourceLocation::default(), Cursor::default())
    }

    /// Copy of this token whose logical id is `id`
    #[must_use]
    pub fn renamed<S: Into<String>>(&self, id: S) -> Self {
        Self {
            id: Some(id.into()),
            ..self.clone()
        }
    }

    /// Lexical kind
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Text as it appears in the source
    #[must_use]
    pub fn spelling(&self) -> &str {
        &self.spelling
    }

    /// Logical id, the spelling unless overridden
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.spelling)
    }

    /// Source position of the first character
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// Structural classification supplied by the front end
    #[must_use]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Whether this is an identifier token
    #[must_use]
    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    pub(crate) fn is_space(&self) -> bool {
        self.id() == " "
    }

    pub(crate) fn is_newline(&self) -> bool {
        self.id() == "\n"
    }

    /// Column just past the last character, for adjacency checks
    pub(crate) fn end_column(&self) -> u32 {
        let width = u32::try_from(self.spelling.chars().count()).unwrap_or(u32::MAX);
        self.location.column.saturating_add(width)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Join the logical ids of `tokens` with `separator`
pub(crate) fn join_ids(tokens: &[Token], separator: &str) -> String {
    tokens
        .iter()
        .map(Token::id)
        .collect::<Vec<_>>()
        .join(separator)
}
