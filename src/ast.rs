// headers ::= (annotation* (type_alias | function))*
// annotation ::= '@' ID ['(' [atom (',' atom)*] ')']
// type_alias ::= 'type' ID '=' type
// function ::= 'fn' ID '(' [param (',' param)*] ')' '->' type [body]
// param ::= ID [':'] type
// body ::= '{' stmt* '}'
// stmt ::= 'return' [expr]
//        | expr ['=' expr]
// expr ::= invocation ('+' invocation)*
// invocation ::= boxing ('(' [expr (',' expr)*] ')')*
// boxing ::= ['box' | 'unbox'] postfix
// postfix ::= ('(' expr ')' | atom) ('.' ID | '[' expr ']')*
// atom ::= integer | cstring | string | ID
//        | '{' [ID [':'] type '=' expr (',' ...)*] '}'
//        | '[' [expr (',' expr)*] ']'
// type ::= '[' type ']'
//        | ['struct'] '{' [param (',' param)*] '}'
//        | ('unbox' | 'unsafe::raw') ['('] type [')']
//        | 'void'
//        | ID

use crate::{token::Span, types::AstType, util::intern::Interned};

#[derive(Debug, PartialEq)]
pub enum Header {
    Function(Function),
    TypeAlias(TypeAlias),
}

impl Header {
    pub fn name(&self) -> Ident {
        match self {
            Header::Function(function) => function.name,
            Header::TypeAlias(alias) => alias.name,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Function {
    pub name: Ident,
    pub return_ty: AstType,
    pub return_ty_span: Span,
    pub params: Vec<Param>,
    /// `None` for declarations of external symbols.
    pub body: Option<Vec<Stmt>>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, PartialEq)]
pub struct TypeAlias {
    pub name: Ident,
    pub ty: AstType,
    pub ty_span: Span,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: AstType,
    pub ty_span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Annotation {
    pub name: Ident,
    /// Only atoms are accepted as arguments.
    pub args: Vec<Expr>,
}

#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    Return(Option<Expr>),
    /// `target = value`. Assigning to an unknown variable declares it.
    Store { target: Expr, value: Expr },
    /// Evaluated for its side effects, the result is discarded.
    Expr(Expr),
}

impl StmtKind {
    pub fn describe(&self) -> &'static str {
        match self {
            StmtKind::Return(_) => "return",
            StmtKind::Store { .. } => "store",
            StmtKind::Expr(_) => "expression",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Expr {
        Expr { kind, span }
    }

    /// Wraps the expression in a [`ExprKind::Box`] node of the same span.
    pub fn boxed(self) -> Expr {
        let span = self.span;
        Expr::new(ExprKind::Box(Box::new(self)), span)
    }

    pub fn unboxed(self) -> Expr {
        let span = self.span;
        Expr::new(ExprKind::Unbox(Box::new(self)), span)
    }
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Variable(Interned<str>),
    Invocation {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Both operands are unboxed by the parser.
    Addition {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Integer(i64),
    CString(Box<str>),
    String(Box<str>),
    Box(Box<Expr>),
    Unbox(Box<Expr>),
    FieldAccess {
        base: Box<Expr>,
        field: Ident,
    },
    Subscript {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    StructLiteral(Vec<FieldInit>),
    ArrayLiteral(Vec<Expr>),
}

impl ExprKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ExprKind::Variable(_) => "variable",
            ExprKind::Invocation { .. } => "invocation",
            ExprKind::Addition { .. } => "addition",
            ExprKind::Integer(_) => "integer",
            ExprKind::CString(_) => "c-string",
            ExprKind::String(_) => "string",
            ExprKind::Box(_) => "box",
            ExprKind::Unbox(_) => "unbox",
            ExprKind::FieldAccess { .. } => "field",
            ExprKind::Subscript { .. } => "subscript",
            ExprKind::StructLiteral(_) => "struct",
            ExprKind::ArrayLiteral(_) => "array",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct FieldInit {
    pub name: Ident,
    pub ty: AstType,
    pub value: Expr,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ident {
    pub name: Interned<str>,
    pub span: Span,
}

impl From<Ident> for Interned<str> {
    fn from(value: Ident) -> Self {
        value.name
    }
}

impl From<&Ident> for Interned<str> {
    fn from(value: &Ident) -> Self {
        value.name
    }
}
