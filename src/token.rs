use std::{fmt, ops::Range};

use crate::lexer;

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            len: span.len,
            lo: span.lo,
        }
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

/// A byte range into the [`SourceMap`](crate::source::SourceMap). Spans are
/// global: the offset of the owning file is already folded into `lo`.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        Self::new_of_length(lo, u32::try_from(hi - lo).unwrap())
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns a span which covers both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        let lo = self.lo.min(other.lo);
        let hi = self.hi().max(other.hi());
        Span::new_of_bounds(lo..hi)
    }

    /// Shrinks (or grows) the span on each side.
    pub fn offset(self, lo: isize, hi: isize) -> Span {
        let new_lo = self.lo.checked_add_signed(lo).unwrap();
        let new_hi = self.hi().checked_add_signed(hi).unwrap();
        Span::new_of_bounds(new_lo..new_hi)
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo..self.hi()]
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Fn,
    Return,
    Type,
    Box,
    Unbox,
    Struct,

    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eq,
    At,
    /// `->`
    Arrow,
    Plus,
    Minus,
    Star,
    Slash,
    Colon,

    Identifier,
    Integer,
    Float,
    /// `c"..."`, null-terminated on emission.
    CString,
    String,

    Eof,
    Error(lexer::Error),
}

impl TokenKind {
    /// Human readable name, used in diagnostics.
    pub fn describe(&self) -> &'static str {
        use TokenKind::*;
        match self {
            Fn => "`fn`",
            Return => "`return`",
            Type => "`type`",
            Box => "`box`",
            Unbox => "`unbox`",
            Struct => "`struct`",
            LBrace => "`{`",
            RBrace => "`}`",
            LParen => "`(`",
            RParen => "`)`",
            LBracket => "`[`",
            RBracket => "`]`",
            Comma => "`,`",
            Dot => "`.`",
            Eq => "`=`",
            At => "`@`",
            Arrow => "`->`",
            Plus => "`+`",
            Minus => "`-`",
            Star => "`*`",
            Slash => "`/`",
            Colon => "`:`",
            Identifier => "identifier",
            Integer => "integer",
            Float => "float",
            CString => "c-string",
            String => "string",
            Eof => "end of input",
            Error(_) => "invalid token",
        }
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "fn" => TokenKind::Fn,
    "return" => TokenKind::Return,
    "type" => TokenKind::Type,
    "box" => TokenKind::Box,
    "unbox" => TokenKind::Unbox,
    "struct" => TokenKind::Struct,
};
