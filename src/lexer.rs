use std::{iter::Peekable, num::ParseIntError};

use crate::token::{Span, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the provided file contents, appending the tokens into the provided
/// buffer. `base` is the offset of the file inside the source map, so that
/// every produced span is global.
///
/// No end-of-input token is produced; the parser synthesizes one once the
/// buffer is exhausted, which allows several files to share a buffer.
pub fn lex(src: &str, base: usize, tokens: &mut Vec<Token>) {
    Lexer::new(src, base, tokens).lex();
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, 0, &mut tokens);
    tokens
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnexpectedChar,
    UnclosedString,
    /// Integer literal does not fit in 64 bits.
    ParseInt,
}

/// The Acorn lexer
struct Lexer<'src, 'tok> {
    src: &'src str,
    base: usize,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    tokens: &'tok mut Vec<Token>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    fn lex(mut self) {
        while self.skip_trivia() {
            let next = self.scan_token_kind();
            self.produce(next);
        }
    }

    /// Skips whitespace and line comments. Returns false once the input is
    /// exhausted.
    fn skip_trivia(&mut self) -> bool {
        loop {
            match self.peek() {
                c if c.is_whitespace() => {
                    self.advance();
                }
                '/' if self.peek_second() == '/' => {
                    while !matches!(self.peek(), '\n' | '\0') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
        self.cursor < self.src.len()
    }

    /// Tries to scan the current character.
    fn scan_token_kind(&mut self) -> TokenKind {
        use TokenKind::*;
        match self.mark_advance() {
            '{' => LBrace,
            '}' => RBrace,
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            ',' => Comma,
            '.' => Dot,
            '=' => Eq,
            '@' => At,
            ':' => Colon,
            '+' => Plus,
            '-' => match self.peek() {
                '>' => self.advance_with(Arrow),
                _ => Minus,
            },
            '*' => Star,
            '/' => Slash,
            '"' => self.string(String),
            'c' if self.peek() == '"' => {
                self.advance();
                self.string(CString)
            }
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            _ => Error(self::Error::UnexpectedChar),
        }
    }

    /// Scans a string body, up to (and including) the closing quotation mark.
    /// Escapes are only recognized here; they are performed by [`extract`].
    fn string(&mut self, kind: TokenKind) -> TokenKind {
        // Whether the current character is being escaped
        let mut is_escaping = false;
        loop {
            match (is_escaping, self.advance()) {
                // The input was exhausted before the string was closed.
                (_, '\0') if self.cursor >= self.src.len() => {
                    return TokenKind::Error(Error::UnclosedString);
                }
                (false, '"') => return kind,
                (false, '\\') => is_escaping = true,
                (_, _) => is_escaping = false,
            }
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let valid_identifier_suffix = |c: char| c.is_ascii_alphanumeric() || c == '_';

        loop {
            match self.peek() {
                c if valid_identifier_suffix(c) => {
                    self.advance();
                }
                // Namespace separator, only when followed by another segment.
                ':' if self.peek_second() == ':' && self.peek_third_is_ident_start() => {
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
        match KEYWORDS.get(self.substr()).copied() {
            Some(keyword) => keyword,
            None => TokenKind::Identifier,
        }
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_second().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            return TokenKind::Float;
        }
        match self.substr().parse::<i64>() {
            Ok(_) => TokenKind::Integer,
            Err(_) => TokenKind::Error(Error::ParseInt),
        }
    }
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(
        src: &'src str,
        base: usize,
        tokens: &'tok mut Vec<Token>,
    ) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            base,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            tokens,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next character and advances the iterator.
    fn advance(&mut self) -> char {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
            .unwrap_or('\0')
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the character after the next one.
    fn peek_second(&self) -> char {
        self.iter.clone().nth(1).unwrap_or('\0')
    }

    fn peek_third_is_ident_start(&self) -> bool {
        self.iter
            .clone()
            .nth(2)
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    }

    /// Returns the current (file local) span.
    fn local_span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.local_span().substr(self.src)
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        let span = Span::new_of_bounds(self.base + self.current_lo..self.base + self.cursor);
        self.tokens.push(Token::new(kind, span));
    }
}

/// Extraction of token payloads. Spans are global, hence `src` is the whole
/// source map text.
pub mod extract {
    use super::*;

    pub fn int(token: Token, src: &str) -> Result<i64, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Integer);
        token.span().substr(src).parse()
    }

    pub fn ident(token: Token, src: &str) -> &str {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.span().substr(src)
    }

    /// Contents of a `c"..."` literal, with `\0` and `\n` escapes performed.
    pub fn c_string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::CString);
        let raw = token.span().offset(2, -1).substr(src);
        perform_escape(raw, true).into_boxed_str()
    }

    /// Contents of a `"..."` literal, with only `\n` escapes performed.
    pub fn string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::String);
        let raw = token.span().offset(1, -1).substr(src);
        perform_escape(raw, false).into_boxed_str()
    }
}

fn perform_escape(raw: &str, allow_nul: bool) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut buf = String::with_capacity(raw.len());
    let mut escaped = false;
    for char in raw.chars() {
        let char = match (escaped, char) {
            (true, 'n') => '\n',
            (true, '0') if allow_nul => '\0',
            (true, c @ ('\\' | '"')) => c,
            // Unknown escapes are kept verbatim.
            (true, c) => {
                buf.push('\\');
                c
            }
            (false, '\\') => {
                escaped = true;
                continue;
            }
            (false, c) => c,
        };
        escaped = false;
        buf.push(char);
    }
    buf
}
