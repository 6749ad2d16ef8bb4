#![allow(clippy::items_after_statements)]

use std::fmt;

use crate::{
    codegen, lexer, parser,
    token::Spanned,
    types::AstType,
    util::{fmt::Show, intern::Interner},
};

impl Show for Spanned<codegen::Error> {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &super::Context<'_>) -> fmt::Result {
        let i = ctx.ident_interner;
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use codegen::Error::*;
        match error {
            VariableDoesNotExist(name) => {
                let name = i.get(name);
                write!(f, "Variable `{name}` does not exist.")
            }
            UnknownType(name) => {
                let name = i.get(name);
                write!(f, "Unknown type `{name}`.")
            }
            CyclicTypeAlias(name) => {
                let name = i.get(name);
                write!(f, "Type alias `{name}` refers to itself.")
            }
            AlreadyDefined(name) => {
                let name = i.get(name);
                write!(f, "`{name}` is already defined.")
            }
            WrongType { expected, found } => {
                write!(
                    f,
                    "Expected types {}, found type `{}`.",
                    TypeList(expected, i),
                    found.write(i)
                )
            }
            WrongArgumentCount { expected, found } => {
                write!(f, "Expected {expected} argument(s), found {found}.")
            }
            DoesNotSupportField { ty, field } => {
                let field = i.get(field);
                write!(f, "Field `{field}` was not found on type `{}`.", ty.write(i))
            }
            DoesNotSupportSubscripting(ty) => {
                write!(f, "Type `{}` does not support subscripting.", ty.write(i))
            }
            DoesNotSupportPathing(ty) => {
                write!(f, "Type `{}` can not be pathed into.", ty.write(i))
            }
            DoesNotSupportCalling(ty) => write!(f, "Type `{}` can not be called.", ty.write(i)),
            DoesNotSupportArithmetic(ty) => {
                write!(f, "Type `{}` does not support arithmetic.", ty.write(i))
            }
            VoidValue => write!(f, "Expression of type `void` has no value."),
            InvalidAnnotation(name) => {
                let name = i.get(name);
                write!(f, "Invalid arguments for annotation `@{name}`.")
            }
            NotYetSupported(what) => write!(f, "{what} are not yet supported."),
        }
    }
}

struct TypeList<'a>(&'a [AstType], &'a Interner<str>);

impl fmt::Display for TypeList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let TypeList(types, i) = self;
        for (idx, ty) in types.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "`{}`", ty.write(i))?;
        }
        Ok(())
    }
}

impl Show for Spanned<parser::Error> {
    fn show(&self, f: &mut fmt::Formatter<'_>, _: &super::Context<'_>) -> fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use parser::Error::*;
        match error {
            Unexpected { actual, expected } => {
                f.write_str("Expected tokens ")?;
                for (idx, kind) in expected.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(kind.describe())?;
                }
                write!(f, ", found token {}.", actual.describe())
            }
            ParseInt | Lexer(lexer::Error::ParseInt) => {
                write!(f, "Integer literal out of range.")
            }
            Lexer(lexer::Error::UnexpectedChar) => write!(f, "Unexpected character."),
            Lexer(lexer::Error::UnclosedString) => write!(f, "Unclosed string literal."),
        }
    }
}
