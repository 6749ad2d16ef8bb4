use tracing::debug;

use crate::{
    ast::{
        Annotation, Expr, ExprKind, FieldInit, Function, Header, Ident, Param, Stmt, StmtKind,
        TypeAlias,
    },
    lexer::{self, extract},
    token::{Span, Spanned, Token, TokenKind},
    types::{AstType, StructField},
    util::intern::Interner,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

const ATOM_START: &[TokenKind] = &[
    TokenKind::Integer,
    TokenKind::CString,
    TokenKind::String,
    TokenKind::Identifier,
    TokenKind::LBrace,
    TokenKind::LBracket,
];

const TYPE_START: &[TokenKind] = &[
    TokenKind::LBracket,
    TokenKind::LBrace,
    TokenKind::Struct,
    TokenKind::Unbox,
    TokenKind::Identifier,
];

/// Lexes and parses a single source text.
pub fn parse_program(
    src: &str,
    tokens: &mut Vec<Token>,
    ident_interner: &mut Interner<str>,
) -> Result<Vec<Header>> {
    assert!(tokens.is_empty());
    lexer::lex(src, 0, tokens);
    parse_tokens(src, tokens, ident_interner)
}

/// Parses already lexed tokens. `src` is the text every token span points
/// into. The first lexical error token, if any, is reported as the error.
pub fn parse_tokens(
    src: &str,
    tokens: &[Token],
    ident_interner: &mut Interner<str>,
) -> Result<Vec<Header>> {
    if let Some(error) = first_lexer_error(tokens) {
        return Err(error);
    }
    let mut p = Parser::new(src, tokens, ident_interner);
    let headers = p.parse_headers()?;
    debug!(headers = headers.len(), tokens = tokens.len(), "parsed");
    Ok(headers)
}

pub fn parse_expr(
    src: &str,
    tokens: &mut Vec<Token>,
    ident_interner: &mut Interner<str>,
) -> Result<Expr> {
    assert!(tokens.is_empty());
    lexer::lex(src, 0, tokens);
    if let Some(error) = first_lexer_error(tokens) {
        return Err(error);
    }
    let mut p = Parser::new(src, tokens, ident_interner);
    let expr = p.parse_expr()?;
    p.consume(TokenKind::Eof)?;
    Ok(expr)
}

fn first_lexer_error(tokens: &[Token]) -> Option<Spanned<Error>> {
    tokens.iter().find_map(|token| match token.kind {
        TokenKind::Error(inner) => Some(token.span().wrap(Error::Lexer(inner))),
        _ => None,
    })
}

struct Parser<'src, 'tok, 'ident> {
    src: &'src str,
    tokens: &'tok [Token],
    ident_interner: &'ident mut Interner<str>,
    cursor: usize,
}

impl Parser<'_, '_, '_> {
    fn parse_headers(&mut self) -> Result<Vec<Header>> {
        let mut headers = Vec::with_capacity(16);
        while !self.is(TokenKind::Eof) {
            let annotations = self.parse_annotations()?;
            let keyword = self.consume_any(&[TokenKind::Fn, TokenKind::Type])?;
            let header = match keyword.kind {
                TokenKind::Fn => Header::Function(self.parse_function(annotations)?),
                TokenKind::Type => Header::TypeAlias(self.parse_type_alias(annotations)?),
                _ => unreachable!(),
            };
            headers.push(header);
        }
        Ok(headers)
    }

    /// `('@' ID ['(' [atom (',' atom)*] ')'])*`
    fn parse_annotations(&mut self) -> Result<Vec<Annotation>> {
        let mut annotations = Vec::new();
        while self.take(TokenKind::At) {
            let name = self.parse_ident()?;
            let args = if self.take(TokenKind::LParen) {
                let args =
                    self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_atom)?;
                self.consume(TokenKind::RParen)?;
                args
            } else {
                Vec::new()
            };
            annotations.push(Annotation { name, args });
        }
        Ok(annotations)
    }

    fn parse_type_alias(&mut self, annotations: Vec<Annotation>) -> Result<TypeAlias> {
        let name = self.parse_ident()?;
        self.consume(TokenKind::Eq)?;
        let (ty, ty_span) = self.parse_spanned_type()?;
        Ok(TypeAlias {
            name,
            ty,
            ty_span,
            annotations,
        })
    }

    fn parse_function(&mut self, annotations: Vec<Annotation>) -> Result<Function> {
        let name = self.parse_ident()?;
        self.consume(TokenKind::LParen)?;
        let params = self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_param)?;
        self.consume(TokenKind::RParen)?;
        self.consume(TokenKind::Arrow)?;
        let (return_ty, return_ty_span) = self.parse_spanned_type()?;

        let body = if self.take(TokenKind::LBrace) {
            let mut body = Vec::new();
            while !self.is(TokenKind::RBrace) {
                body.push(self.parse_stmt()?);
            }
            self.consume(TokenKind::RBrace)?;
            Some(body)
        } else {
            None
        };

        Ok(Function {
            name,
            return_ty,
            return_ty_span,
            params,
            body,
            annotations,
        })
    }

    /// `ID [':'] type`, for both parameters and struct type fields.
    fn parse_param(&mut self) -> Result<Param> {
        let name = self.parse_ident()?;
        self.take(TokenKind::Colon);
        let (ty, ty_span) = self.parse_spanned_type()?;
        Ok(Param { name, ty, ty_span })
    }

    /// Parses a type, along with the span of every token it was written
    /// with.
    fn parse_spanned_type(&mut self) -> Result<(AstType, Span)> {
        let start = self.peek().span();
        let ty = self.parse_type()?;
        let end = self.previous().map_or(start, |token| token.span());
        Ok((ty, start.to(end)))
    }

    fn parse_type(&mut self) -> Result<AstType> {
        let token = self.peek();
        let ty = match token.kind {
            TokenKind::LBracket => {
                self.advance();
                let element = self.parse_type()?;
                self.consume(TokenKind::RBracket)?;
                AstType::Array(Box::new(element)).boxed()
            }
            TokenKind::Struct | TokenKind::LBrace => {
                self.take(TokenKind::Struct);
                self.consume(TokenKind::LBrace)?;
                let fields = self.parse_list(TokenKind::RBrace, TokenKind::Comma, |p| {
                    let Param { name, ty, .. } = p.parse_param()?;
                    Ok(StructField {
                        name: name.name,
                        ty,
                    })
                })?;
                self.consume(TokenKind::RBrace)?;
                AstType::Struct(fields).boxed()
            }
            TokenKind::Unbox => {
                self.advance();
                self.parse_unboxed_type()?
            }
            TokenKind::Identifier => {
                self.advance();
                match extract::ident(token, self.src) {
                    "unsafe::raw" => self.parse_unboxed_type()?,
                    "void" => AstType::Void,
                    name => self.named_type(name).boxed(),
                }
            }
            _ => {
                return Err(token.span().wrap(Error::Unexpected {
                    actual: token.kind,
                    expected: Box::from(TYPE_START),
                }));
            }
        };
        Ok(ty)
    }

    /// The type following `unbox` or `unsafe::raw`, which may be
    /// parenthesized.
    fn parse_unboxed_type(&mut self) -> Result<AstType> {
        let ty = if self.take(TokenKind::LParen) {
            let ty = self.parse_type()?;
            self.consume(TokenKind::RParen)?;
            ty
        } else {
            self.parse_type()?
        };
        match ty {
            AstType::Boxed(inner) => Ok(*inner),
            other => Ok(other),
        }
    }

    fn named_type(&mut self, name: &str) -> AstType {
        if name == "libc::ptr" {
            return AstType::LibCPointer;
        }
        if let Some(bits) = name.strip_prefix('i') {
            if bits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(bits @ 1..) = bits.parse::<u32>() {
                    return AstType::Integer(bits);
                }
            }
        }
        AstType::Unresolved(self.ident_interner.intern(name))
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        if self.is(TokenKind::Return) {
            let token = self.advance();
            if self.is(TokenKind::RBrace) {
                return Ok(Stmt {
                    kind: StmtKind::Return(None),
                    span: token.span(),
                });
            }
            let value = self.parse_expr()?;
            return Ok(Stmt {
                span: token.span().to(value.span),
                kind: StmtKind::Return(Some(value)),
            });
        }

        let expr = self.parse_expr()?;
        if self.take(TokenKind::Eq) {
            let value = self.parse_expr()?;
            return Ok(Stmt {
                span: expr.span.to(value.span),
                kind: StmtKind::Store {
                    target: expr,
                    value,
                },
            });
        }
        Ok(Stmt {
            span: expr.span,
            kind: StmtKind::Expr(expr),
        })
    }

    /// Additions, left associative. Operands are unboxed and the sum boxed.
    fn parse_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_invocation()?;
        while self.take(TokenKind::Plus) {
            let rhs = self.parse_invocation()?;
            let span = lhs.span.to(rhs.span);
            let addition = ExprKind::Addition {
                lhs: Box::new(lhs.unboxed()),
                rhs: Box::new(rhs.unboxed()),
            };
            lhs = Expr::new(addition, span).boxed();
        }
        Ok(lhs)
    }

    fn parse_invocation(&mut self) -> Result<Expr> {
        let mut callee = self.parse_boxing()?;
        while self.take(TokenKind::LParen) {
            let args = self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_expr)?;
            let end = self.consume(TokenKind::RParen)?;
            let span = callee.span.to(end.span());
            let invocation = ExprKind::Invocation {
                callee: Box::new(callee),
                args,
            };
            callee = Expr::new(invocation, span);
        }
        Ok(callee)
    }

    fn parse_boxing(&mut self) -> Result<Expr> {
        let token = self.peek();
        let wrap = match token.kind {
            TokenKind::Box => ExprKind::Box,
            TokenKind::Unbox => ExprKind::Unbox,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let inner = self.parse_postfix()?;
        let span = token.span().to(inner.span);
        Ok(Expr::new(wrap(Box::new(inner)), span))
    }

    /// Field accesses and subscripts, left associative.
    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut base = if self.is(TokenKind::LParen) {
            let start = self.advance();
            let mut inner = self.parse_expr()?;
            let end = self.consume(TokenKind::RParen)?;
            inner.span = start.span().to(end.span());
            inner
        } else {
            self.parse_atom()?
        };

        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let field = self.parse_ident()?;
                    let span = base.span.to(field.span);
                    let access = ExprKind::FieldAccess {
                        base: Box::new(base),
                        field,
                    };
                    base = Expr::new(access, span);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    let end = self.consume(TokenKind::RBracket)?;
                    let span = base.span.to(end.span());
                    let subscript = ExprKind::Subscript {
                        base: Box::new(base),
                        index: Box::new(index.unboxed()),
                    };
                    base = Expr::new(subscript, span);
                }
                _ => break Ok(base),
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let token = self.advance();
        let span = token.span();
        let expr = match token.kind {
            TokenKind::Integer => {
                let value =
                    extract::int(token, self.src).map_err(|_| span.wrap(Error::ParseInt))?;
                Expr::new(ExprKind::Integer(value), span).boxed()
            }
            TokenKind::CString => {
                let text = extract::c_string(token, self.src);
                Expr::new(ExprKind::CString(text), span)
            }
            TokenKind::String => {
                let text = extract::string(token, self.src);
                Expr::new(ExprKind::String(text), span)
            }
            TokenKind::Identifier => {
                let name = self.ident_interner.intern(extract::ident(token, self.src));
                Expr::new(ExprKind::Variable(name), span)
            }
            TokenKind::LBrace => {
                let fields = self.parse_list(
                    TokenKind::RBrace,
                    TokenKind::Comma,
                    Parser::parse_field_init,
                )?;
                let end = self.consume(TokenKind::RBrace)?;
                Expr::new(ExprKind::StructLiteral(fields), span.to(end.span())).boxed()
            }
            TokenKind::LBracket => {
                let elements =
                    self.parse_list(TokenKind::RBracket, TokenKind::Comma, Parser::parse_expr)?;
                let end = self.consume(TokenKind::RBracket)?;
                Expr::new(ExprKind::ArrayLiteral(elements), span.to(end.span())).boxed()
            }
            actual => {
                return Err(span.wrap(Error::Unexpected {
                    actual,
                    expected: Box::from(ATOM_START),
                }));
            }
        };
        Ok(expr)
    }

    /// `ID [':'] type '=' expr`
    fn parse_field_init(&mut self) -> Result<FieldInit> {
        let Param { name, ty, .. } = self.parse_param()?;
        self.consume(TokenKind::Eq)?;
        let value = self.parse_expr()?;
        Ok(FieldInit { name, ty, value })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(Ident {
            name: self.ident_interner.intern(extract::ident(token, self.src)),
            span: token.span(),
        })
    }

    /// Parses `item (delim item)*` until `end_delim` is found. Does **NOT**
    /// consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        separator: TokenKind,
        parse_item: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        debug_assert_ne!(end_delim, separator);

        let mut items = Vec::new();
        while !self.is(end_delim) {
            items.push(parse_item(self)?);
            if !self.take(separator) {
                if self.is(end_delim) {
                    break;
                }
                let c = self.peek();
                return Err(c.span().wrap(Error::Unexpected {
                    actual: c.kind,
                    expected: Box::from([separator, end_delim]),
                }));
            }
        }
        Ok(items)
    }
}

impl Parser<'_, '_, '_> {
    fn new<'src, 'tok, 'ident>(
        src: &'src str,
        tokens: &'tok [Token],
        ident_interner: &'ident mut Interner<str>,
    ) -> Parser<'src, 'tok, 'ident> {
        Parser {
            src,
            tokens,
            ident_interner,
            cursor: 0,
        }
    }

    /// Returns the current token. Once the tokens are exhausted, an
    /// end-of-input token positioned at the end of `src` is returned.
    #[inline]
    fn peek(&self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(token) => *token,
            None => Token::new(TokenKind::Eof, Span::new_of_length(self.src.len(), 0)),
        }
    }

    /// Returns the last consumed token.
    fn previous(&self) -> Option<Token> {
        self.tokens.get(self.cursor.checked_sub(1)?).copied()
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one. If not,
    /// returns an error.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        self.consume_any(&[expect])
    }

    /// Advances if the current token matches any of the provided tokens. If
    /// not, returns an error.
    fn consume_any(&mut self, expect: &[TokenKind]) -> Result<Token> {
        if expect.iter().any(|t| self.is(*t)) {
            return Ok(self.advance());
        }
        let c = self.peek();
        Err(c.span().wrap(Error::Unexpected {
            actual: c.kind,
            expected: Box::from(expect),
        }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Unexpected {
        actual: TokenKind,
        expected: Box<[TokenKind]>,
    },
    ParseInt,
    Lexer(lexer::Error),
}


#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use parser;

        fn test_addition_unboxes_operands() {
            let expr = "a + b + 1";
            let tree_ok = "
                box (0..9)
                  add (0..9)
                    unbox (0..5)
                      box (0..5)
                        add (0..5)
                          unbox (0..1)
                            ident a (0..1)
                          unbox (4..5)
                            ident b (4..5)
                    unbox (8..9)
                      box (8..9)
                        int 1 (8..9)
            ";
        }

        fn test_literals() {
            let expr = r#"[c"hi\n", "raw\0", {x i32 = 2}]"#;
            let tree_ok = r#"
                box (0..31)
                  array (0..31)
                    cstring "hi\n" (1..8)
                    string "raw\\0" (10..17)
                    box (19..30)
                      struct (19..30)
                        field x: i32
                          box (28..29)
                            int 2 (28..29)
            "#;
        }

        fn test_chained_postfix() {
            let expr = "p.items[i].length";
            let tree_ok = "
                field length (0..17)
                  subscript (0..10)
                    field items (0..7)
                      ident p (0..1)
                    unbox (8..9)
                      ident i (8..9)
            ";
        }

        fn test_chained_invocation() {
            let expr = "make(1)(x, y)";
            let tree_ok = "
                call (0..13)
                  call (0..7)
                    ident make (0..4)
                    box (5..6)
                      int 1 (5..6)
                  ident x (8..9)
                  ident y (11..12)
            ";
        }

        fn test_box_and_unbox() {
            let expr = "unbox(box(c\"s\"))";
            let tree_ok = r#"
                unbox (0..16)
                  box (5..16)
                    cstring "s" (9..15)
            "#;
        }

        fn test_function_with_statements() {
            let program =
                "fn main(argc unbox i32, argv: unbox libc::ptr) -> i32 { x = 1 x = x + 2 print(x) return x }";
            let tree_ok = "
                fn main(argc: unbox i32, argv: unbox libc::ptr) -> i32
                  store (56..61)
                    ident x (56..57)
                    box (60..61)
                      int 1 (60..61)
                  store (62..71)
                    ident x (62..63)
                    box (66..71)
                      add (66..71)
                        unbox (66..67)
                          ident x (66..67)
                        unbox (70..71)
                          box (70..71)
                            int 2 (70..71)
                  eval (72..80)
                    call (72..80)
                      ident print (72..77)
                      ident x (78..79)
                  return (81..89)
                    ident x (88..89)
            ";
        }

        fn test_empty_return() {
            let program = "fn f() -> void { return }";
            let tree_ok = "
                fn f() -> void
                  return (17..23)
            ";
        }

        fn test_declarations_and_annotations() {
            let program = r#"
                @varargs
                @mangle_as(c"printf")
                fn printf(fmt unbox libc::ptr) -> unbox i32
                type Point = struct {x: i32, y unbox(i64)}
                type Bytes = [unsafe::raw(i8)]
                type Raw = unbox Point
            "#;
            let tree_ok = r#"
                @varargs
                @mangle_as
                  cstring "printf" (53..62)
                fn printf(fmt: unbox libc::ptr) -> unbox i32 extern
                type Point = {x: i32, y: unbox i64}
                type Bytes = [unbox i8]
                type Raw = unbox Point
            "#;
        }

        fn test_error_missing_arrow() {
            let program = "fn f() i32 {}";
            let expected_errors = &["7..10: Expected tokens `->`, found token identifier."];
        }

        fn test_error_unclosed_list() {
            let expr = "f(a b)";
            let expected_errors = &["4..5: Expected tokens `,`, `)`, found token identifier."];
        }

        fn test_error_bad_atom() {
            let expr = "1 + )";
            let expected_errors = &[
                "4..5: Expected tokens integer, c-string, string, identifier, `{`, `[`, found token `)`."
            ];
        }

        fn test_error_bad_header() {
            let program = "x = 1";
            let expected_errors =
                &["0..1: Expected tokens `fn`, `type`, found token identifier."];
        }

        fn test_error_float_has_no_expression() {
            let expr = "1.5";
            let expected_errors = &[
                "0..3: Expected tokens integer, c-string, string, identifier, `{`, `[`, found token float."
            ];
        }

        fn test_error_lexer_unexpected_char() {
            let program = "fn f() -> void { $ }";
            let expected_errors = &["17..18: Unexpected character."];
        }

        fn test_error_lexer_unclosed_string() {
            let expr = "c\"abc";
            let expected_errors = &["0..5: Unclosed string literal."];
        }

        fn test_error_integer_too_large() {
            let expr = "99999999999999999999";
            let expected_errors = &["0..20: Integer literal out of range."];
        }

        fn test_error_unexpected_end() {
            let program = "fn f() -> ";
            let expected_errors = &[
                "10..10: Expected tokens `[`, `{`, `struct`, `unbox`, identifier, found token end of input."
            ];
        }
    );

    #[test]
    fn type_spans_cover_every_token() {
        use super::test_utils::parse_headers;
        use crate::{ast::Header, token::Span};

        let (_, headers) = parse_headers("fn f(a unbox (i32), b [T]) -> unbox i8 type T = struct {}");
        let Header::Function(f) = &headers[0] else {
            panic!("expected a function");
        };
        assert_eq!(f.params[0].ty_span, Span::new_of_bounds(7..18));
        assert_eq!(f.params[1].ty_span, Span::new_of_bounds(22..25));
        assert_eq!(f.return_ty_span, Span::new_of_bounds(30..38));
        let Header::TypeAlias(alias) = &headers[1] else {
            panic!("expected an alias");
        };
        assert_eq!(alias.ty_span, Span::new_of_bounds(48..57));
    }
}
