//! Built-in C front end.
//!
//! Turns raw header text into the classified token stream consumed by
//! [`BlockParser`](crate::BlockParser). Line continuations are spliced
//! transparently, every token of a directive line is tagged with the directive's
//! extent, and top-level declarations are tagged with their statement extent.
//! Anything the classifier does not recognize is left as [`CursorKind::Other`],
//! which the block parser groups line by line.

use crate::token::{
    Cursor, CursorKind, Extent, SourceLocation, Token, TokenKind, is_identifier_continue,
    is_identifier_start,
};

/// Punctuators, longest first
const PUNCTUATORS: &[&str] = &[
    "...", "<<=", ">>=", "##", "&&", "||", "<<", ">>", "==", "!=", "<=", ">=", "->", "++", "--",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "::",
];

/// Keywords that start a new declaration when they open a physical line
const DECLARATION_STARTERS: &[&str] = &[
    "struct", "union", "enum", "typedef", "extern", "static", "inline",
];

/// Tokenize and classify `source`
#[must_use]
pub fn tokenize(source: &str) -> Vec<Token> {
    let raw = Lexer::new(source).lex();
    classify(raw)
}

#[derive(Clone, Copy)]
struct SourceChar {
    ch: char,
    location: SourceLocation,
}

/// Remove backslash-newline pairs, keeping the physical location of every character
fn line_splice(source: &str) -> Vec<SourceChar> {
    let mut out = Vec::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut line = 1;
    let mut column = 1;
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some('\n') => {
                    chars.next();
                    line += 1;
                    column = 1;
                    continue;
                }
                Some('\r') => {
                    chars.next();
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    line += 1;
                    column = 1;
                    continue;
                }
                _ => {}
            }
        }
        out.push(SourceChar {
            ch,
            location: SourceLocation::new(line, column),
        });
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    out
}

struct RawToken {
    kind: TokenKind,
    text: String,
    start: SourceLocation,
    end: SourceLocation,
    /// Index of the logical line, continuations and comments included
    logical_line: usize,
    /// First non-comment token of its logical line
    starts_line: bool,
}

struct Lexer {
    chars: Vec<SourceChar>,
    pos: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: line_splice(source),
            pos: 0,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|c| c.ch)
    }

    fn lex(mut self) -> Vec<RawToken> {
        let mut tokens = Vec::new();
        let mut logical_line = 0;
        let mut at_line_start = true;

        while let Some(ch) = self.peek(0) {
            if ch == '\n' {
                logical_line += 1;
                at_line_start = true;
                self.pos += 1;
                continue;
            }
            if ch.is_whitespace() {
                self.pos += 1;
                continue;
            }

            let start = self.pos;
            let kind = self.lex_one(ch);
            let text: String = self.chars[start..self.pos].iter().map(|c| c.ch).collect();
            let is_comment = kind == TokenKind::Comment;
            tokens.push(RawToken {
                kind,
                text,
                start: self.chars[start].location,
                end: self.chars[self.pos - 1].location,
                logical_line,
                starts_line: at_line_start && !is_comment,
            });
            if !is_comment {
                at_line_start = false;
            }
        }
        tokens
    }

    /// Consume one token starting with `ch` and return its kind
    fn lex_one(&mut self, ch: char) -> TokenKind {
        let start = self.pos;
        if ch == '/' && self.peek(1) == Some('/') {
            while self.peek(0).is_some_and(|c| c != '\n') {
                self.pos += 1;
            }
            return TokenKind::Comment;
        }
        if ch == '/' && self.peek(1) == Some('*') {
            self.pos += 2;
            while let Some(c) = self.peek(0) {
                self.pos += 1;
                if c == '*' && self.peek(0) == Some('/') {
                    self.pos += 1;
                    break;
                }
            }
            return TokenKind::Comment;
        }
        if is_identifier_start(ch) {
            while self.peek(0).is_some_and(is_identifier_continue) {
                self.pos += 1;
            }
            // Encoding prefixes: L"x", u8"x", U'x'
            let word: String = self.chars[start..self.pos].iter().map(|c| c.ch).collect();
            let is_prefix = matches!(word.as_str(), "L" | "u" | "U" | "u8");
            if is_prefix && let Some(quote @ ('"' | '\'')) = self.peek(0) {
                self.pos += 1;
                return self.lex_quoted(quote);
            }
            return TokenKind::Identifier;
        }
        if ch.is_ascii_digit() || (ch == '.' && self.peek(1).is_some_and(|c| c.is_ascii_digit())) {
            self.pos += 1;
            while let Some(c) = self.peek(0) {
                if matches!(c, 'e' | 'E' | 'p' | 'P') && matches!(self.peek(1), Some('+' | '-')) {
                    self.pos += 2;
                } else if is_identifier_continue(c) || c == '.' {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            return TokenKind::Literal;
        }
        if ch == '"' || ch == '\'' {
            self.pos += 1;
            return self.lex_quoted(ch);
        }
        for punct in PUNCTUATORS {
            let matched = punct
                .chars()
                .enumerate()
                .all(|(i, p)| self.peek(i) == Some(p));
            if matched {
                self.pos += punct.len();
                return TokenKind::Punctuation;
            }
        }
        self.pos += 1;
        TokenKind::Punctuation
    }

    /// Consume the rest of a quoted literal whose opening quote was consumed
    fn lex_quoted(&mut self, quote: char) -> TokenKind {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
            if c == '\\' {
                if self.peek(0).is_some_and(|n| n != '\n') {
                    self.pos += 1;
                }
            } else if c == quote {
                break;
            }
        }
        if quote == '"' {
            TokenKind::String
        } else {
            TokenKind::Literal
        }
    }
}

fn classify(raw: Vec<RawToken>) -> Vec<Token> {
    let mut cursors = vec![Cursor::default(); raw.len()];
    let mut in_directive = vec![false; raw.len()];

    // Directives: from a line-initial `#` to the end of its logical line
    let mut i = 0;
    while i < raw.len() {
        if !(raw[i].starts_line && raw[i].text == "#") {
            i += 1;
            continue;
        }
        let line = raw[i].logical_line;
        let end = i + raw[i..].iter().take_while(|t| t.logical_line == line).count();
        let keyword = raw[i + 1..end]
            .iter()
            .find(|t| t.kind != TokenKind::Comment)
            .map(|t| t.text.as_str());
        let kind = match keyword {
            Some("include" | "include_next" | "import") => CursorKind::InclusionDirective,
            _ => CursorKind::PreprocessingDirective,
        };
        let cursor = Cursor::new(kind, Extent::new(raw[i].start, raw[end - 1].end));
        cursors[i..end].fill(cursor);
        in_directive[i..end].fill(true);
        i = end;
    }

    // Declarations: top-level statements among the remaining tokens
    let code: Vec<usize> = (0..raw.len())
        .filter(|&k| !in_directive[k] && raw[k].kind != TokenKind::Comment)
        .collect();
    for statement in split_statements(&raw, &code) {
        let kind = classify_statement(&raw, &statement);
        if kind == CursorKind::Other {
            continue;
        }
        let (Some(&first), Some(&last)) = (statement.indices.first(), statement.indices.last())
        else {
            continue;
        };
        let cursor = Cursor::new(kind, Extent::new(raw[first].start, raw[last].end));
        for &k in &statement.indices {
            cursors[k] = cursor;
        }
    }

    raw.into_iter()
        .zip(cursors)
        .map(|(t, cursor)| Token::new(t.kind, t.text, t.start, cursor))
        .collect()
}

struct Statement {
    indices: Vec<usize>,
    /// Ended with `;` or a function body's closing brace
    terminated: bool,
}

fn finish(current: &mut Vec<usize>, terminated: bool, statements: &mut Vec<Statement>) {
    if !current.is_empty() {
        statements.push(Statement {
            indices: std::mem::take(current),
            terminated,
        });
    }
}

/// A declaration keyword opening a new physical line after an identifier or `)`
/// starts a new statement, so that bare macro invocations stay unclassified.
fn starts_new_declaration(raw: &[RawToken], current: &[usize], k: usize) -> bool {
    let Some(&last) = current.last() else {
        return false;
    };
    let prev = &raw[last];
    raw[k].start.line > prev.end.line
        && (prev.kind == TokenKind::Identifier || prev.text == ")")
        && DECLARATION_STARTERS.contains(&raw[k].text.as_str())
}

fn split_statements(raw: &[RawToken], code: &[usize]) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut braces = 0usize;
    let mut parens = 0usize;
    // Braces opened by `extern "C" {`
    let mut linkage_blocks = 0usize;
    let mut function_head = false;

    let mut pos = 0;
    while pos < code.len() {
        let k = code[pos];
        let text = raw[k].text.as_str();
        pos += 1;

        if braces == 0 && parens == 0 {
            if current.is_empty() {
                let opens_linkage = text == "extern"
                    && code.get(pos).is_some_and(|&n| raw[n].kind == TokenKind::String)
                    && code.get(pos + 1).is_some_and(|&n| raw[n].text == "{");
                if opens_linkage {
                    statements.push(Statement {
                        indices: vec![k, code[pos], code[pos + 1]],
                        terminated: false,
                    });
                    linkage_blocks += 1;
                    pos += 2;
                    continue;
                }
                if text == "}" && linkage_blocks > 0 {
                    linkage_blocks -= 1;
                    statements.push(Statement {
                        indices: vec![k],
                        terminated: false,
                    });
                    continue;
                }
            } else if starts_new_declaration(raw, &current, k) {
                finish(&mut current, false, &mut statements);
                function_head = false;
            }
        }

        current.push(k);
        match text {
            "(" => {
                if braces == 0 && parens == 0 {
                    function_head = true;
                }
                parens += 1;
            }
            ")" => parens = parens.saturating_sub(1),
            "{" => braces += 1,
            "}" => {
                braces = braces.saturating_sub(1);
                if braces == 0 && parens == 0 && function_head {
                    finish(&mut current, true, &mut statements);
                    function_head = false;
                }
            }
            ";" if braces == 0 && parens == 0 => {
                finish(&mut current, true, &mut statements);
                function_head = false;
            }
            _ => {}
        }
    }
    finish(&mut current, false, &mut statements);
    statements
}

fn classify_statement(raw: &[RawToken], statement: &Statement) -> CursorKind {
    if !statement.terminated || statement.indices.len() < 2 {
        return CursorKind::Other;
    }
    let texts: Vec<&str> = statement
        .indices
        .iter()
        .map(|&k| raw[k].text.as_str())
        .skip_while(|t| *t == "__extension__")
        .collect();

    match texts.first().copied() {
        None | Some("typedef") => return CursorKind::Other,
        Some(head @ ("struct" | "union" | "enum")) => {
            let has_body = texts
                .iter()
                .take_while(|t| **t != ";" && **t != "(")
                .any(|t| *t == "{");
            if has_body {
                return if head == "enum" {
                    CursorKind::EnumDecl
                } else {
                    CursorKind::StructDecl
                };
            }
        }
        _ => {}
    }

    // A parenthesis at depth 0 before any initializer or body makes it a function
    let mut skip_parens = 0usize;
    let mut previous = "";
    for &t in &texts {
        if skip_parens > 0 {
            match t {
                "(" => skip_parens += 1,
                ")" => skip_parens -= 1,
                _ => {}
            }
        } else {
            match t {
                "(" if matches!(previous, "__attribute__" | "__attribute") => skip_parens = 1,
                "(" => return CursorKind::FunctionDecl,
                "=" | "{" | ";" => break,
                _ => {}
            }
        }
        previous = t;
    }
    CursorKind::VarDecl
}
