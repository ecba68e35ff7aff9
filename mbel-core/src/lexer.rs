//! Lexer for MBEL source text.
//!
//! The lexer is a forward-only cursor: every call to
//! [`Lexer::next_token`] yields exactly one token and never backtracks.
//! Unrecognized input becomes a [`TokenKind::Illegal`] token so that the
//! parser decides how to report it.

use core::fmt;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Special
    Illegal,
    Eof,
    Newline,
    /// `# text`, literal is the text after the marker.
    Comment,

    // Identifiers and literals
    Ident,
    Number,
    /// `"..."` or `"""..."""`, literal is the raw content.
    Str,

    // Punctuation
    Assign,   // =
    Arrow,    // =>
    At,       // @
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]
    LParen,   // (
    RParen,   // )
    Colon,    // :
    Comma,    // ,
    DotRange, // ..
    Minus,    // -
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Illegal => "illegal character",
            TokenKind::Eof => "end of input",
            TokenKind::Newline => "newline",
            TokenKind::Comment => "comment",
            TokenKind::Ident => "identifier",
            TokenKind::Number => "number",
            TokenKind::Str => "string",
            TokenKind::Assign => "`=`",
            TokenKind::Arrow => "`=>`",
            TokenKind::At => "`@`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::Colon => "`:`",
            TokenKind::Comma => "`,`",
            TokenKind::DotRange => "`..`",
            TokenKind::Minus => "`-`",
        };
        f.write_str(text)
    }
}

/// A single token with its literal text and 1-indexed start position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

pub struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    index: usize,
    line: u32,
    column: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            index: 0,
            line: 1,
            column: 1,
        }
    }

    /// Advance past the next token and return it.
    ///
    /// Once the input is exhausted every further call returns an
    /// [`TokenKind::Eof`] token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.index;
        let line = self.line;
        let column = self.column;

        let Some(ch) = self.peek_char() else {
            return self.token(TokenKind::Eof, String::new(), line, column);
        };

        let kind = match ch {
            b'\n' => {
                self.consume_char();
                TokenKind::Newline
            }
            b'=' => {
                self.consume_char();
                if self.peek_char() == Some(b'>') {
                    self.consume_char();
                    TokenKind::Arrow
                } else {
                    TokenKind::Assign
                }
            }
            b'.' => {
                self.consume_char();
                if self.peek_char() == Some(b'.') {
                    self.consume_char();
                    TokenKind::DotRange
                } else {
                    TokenKind::Illegal
                }
            }
            b'@' => self.single(TokenKind::At),
            b'{' => self.single(TokenKind::LBrace),
            b'}' => self.single(TokenKind::RBrace),
            b'[' => self.single(TokenKind::LBracket),
            b']' => self.single(TokenKind::RBracket),
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b':' => self.single(TokenKind::Colon),
            b',' => self.single(TokenKind::Comma),
            b'-' => self.single(TokenKind::Minus),
            b'"' => {
                let literal = if self.at_triple_quote() {
                    self.lex_triple_quoted()
                } else {
                    self.lex_string()
                };
                return self.token(TokenKind::Str, literal, line, column);
            }
            b'#' => {
                let literal = self.lex_comment();
                return self.token(TokenKind::Comment, literal, line, column);
            }
            b'0'..=b'9' => {
                self.lex_number();
                TokenKind::Number
            }
            _ if is_ident_start(ch) => {
                self.lex_ident();
                TokenKind::Ident
            }
            _ => {
                // Take the whole character so multi-byte input is never split.
                let width = self.source[start..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
                for _ in 0..width {
                    self.consume_char();
                }
                TokenKind::Illegal
            }
        };

        let literal = self.source[start..self.index].to_string();
        self.token(kind, literal, line, column)
    }

    fn token(&self, kind: TokenKind, literal: String, line: u32, column: u32) -> Token {
        Token {
            kind,
            literal,
            line,
            column,
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.consume_char();
        kind
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\r') = self.peek_char() {
            self.consume_char();
        }
    }

    fn lex_ident(&mut self) {
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.consume_char();
            } else if ch == b'.' && self.peek_next().is_some_and(is_ident_continue) {
                // A single interior dot joins compound names; `..` is a range.
                self.consume_char();
            } else {
                break;
            }
        }
    }

    /// A single dot belongs to the number (`1.5`, `1.`); `..` is left for the range operator.
    fn lex_number(&mut self) {
        self.consume_digits();
        if self.peek_char() == Some(b'.') && self.peek_next() != Some(b'.') {
            self.consume_char();
            self.consume_digits();
        }
    }

    fn consume_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.consume_char();
        }
    }

    /// Content of a `"..."` string; an unterminated string runs to end of input.
    fn lex_string(&mut self) -> String {
        self.consume_char();
        let content_start = self.index;
        while let Some(ch) = self.peek_char() {
            if ch == b'"' {
                let content = self.source[content_start..self.index].to_string();
                self.consume_char();
                return content;
            }
            self.consume_char();
        }
        self.source[content_start..].to_string()
    }

    fn at_triple_quote(&self) -> bool {
        self.bytes[self.index..].starts_with(b"\"\"\"")
    }

    fn lex_triple_quoted(&mut self) -> String {
        for _ in 0..3 {
            self.consume_char();
        }
        let content_start = self.index;
        while self.peek_char().is_some() {
            if self.at_triple_quote() {
                let content = self.source[content_start..self.index].to_string();
                for _ in 0..3 {
                    self.consume_char();
                }
                return content;
            }
            self.consume_char();
        }
        self.source[content_start..].to_string()
    }

    /// Comment text without the leading `#`; the newline is left for the next token.
    fn lex_comment(&mut self) -> String {
        self.consume_char();
        let content_start = self.index;
        while self.peek_char().is_some_and(|c| c != b'\n') {
            self.consume_char();
        }
        self.source[content_start..self.index].to_string()
    }

    fn peek_char(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        let Some(ch) = self.peek_char() else {
            return;
        };
        self.index += 1;
        if ch == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if ch & 0xC0 != 0x80 {
            // UTF-8 continuation bytes do not start a new column.
            self.column += 1;
        }
    }
}

/// Lex a whole source string; the last token is always `Eof`.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.is(TokenKind::Eof);
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}
