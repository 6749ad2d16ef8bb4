use std::fmt;

use crate::{
    codegen::{Error, Result},
    context::GlobalContext,
    ir,
    token::Span,
    util::intern::{Interned, Interner},
};

/// A type as written in (or inferred from) the source.
///
/// Equality is structural. Aliases ([`AstType::Unresolved`]) must go through
/// the [`GlobalContext`] before two types can be meaningfully compared; see
/// [`AstType::same_as`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AstType {
    Integer(u32),
    Void,
    LibCPointer,
    Any,
    /// Heap allocated, reference counted wrapper of the inner type.
    Boxed(Box<AstType>),
    Function {
        returns: Box<AstType>,
        params: Vec<AstType>,
        varargs: bool,
    },
    Struct(Vec<StructField>),
    Array(Box<AstType>),
    Unresolved(Interned<str>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructField {
    pub name: Interned<str>,
    pub ty: AstType,
}

impl AstType {
    pub fn boxed(self) -> AstType {
        AstType::Boxed(Box::new(self))
    }

    pub fn is_void(&self) -> bool {
        *self == AstType::Void
    }

    /// Strips every [`AstType::Boxed`] layer and follows aliases until
    /// reaching a type which is neither.
    pub fn unbox(&self, ctx: &GlobalContext, span: Span) -> Result<AstType> {
        let mut seen = Vec::new();
        let mut current = self;
        loop {
            match current {
                AstType::Boxed(inner) => current = inner,
                AstType::Unresolved(name) => {
                    if seen.contains(name) {
                        return Err(span.wrap(Error::CyclicTypeAlias(*name)));
                    }
                    seen.push(*name);
                    current = ctx.alias(*name, span)?;
                }
                other => return Ok(other.clone()),
            }
        }
    }

    /// Replaces every alias by its definition.
    ///
    /// A boxed alias whose definition is boxed itself yields a single box:
    /// writing `P` in type position, with `type P = {x: i32}`, denotes
    /// `Boxed(Struct)`. Aliases referring back to themselves through a box
    /// are kept nominal; any other cycle is an error.
    pub fn resolve(&self, ctx: &GlobalContext, span: Span) -> Result<AstType> {
        self.resolve_in(ctx, span, &mut Vec::new(), 0)
    }

    fn resolve_in(
        &self,
        ctx: &GlobalContext,
        span: Span,
        expanding: &mut Vec<(Interned<str>, usize)>,
        depth: usize,
    ) -> Result<AstType> {
        let resolved = match self {
            AstType::Integer(_) | AstType::Void | AstType::LibCPointer | AstType::Any => {
                self.clone()
            }
            AstType::Boxed(inner) => match inner.resolve_in(ctx, span, expanding, depth + 1)? {
                boxed @ AstType::Boxed(_) if matches!(**inner, AstType::Unresolved(_)) => boxed,
                other => other.boxed(),
            },
            AstType::Unresolved(name) => {
                if let Some(&(_, pushed_at)) = expanding.iter().find(|(n, _)| n == name) {
                    if pushed_at < depth {
                        return Ok(self.clone());
                    }
                    return Err(span.wrap(Error::CyclicTypeAlias(*name)));
                }
                expanding.push((*name, depth));
                let resolved = ctx.alias(*name, span)?.resolve_in(ctx, span, expanding, depth);
                expanding.pop();
                resolved?
            }
            AstType::Function {
                returns,
                params,
                varargs,
            } => AstType::Function {
                returns: Box::new(returns.resolve_in(ctx, span, expanding, depth)?),
                params: params
                    .iter()
                    .map(|param| param.resolve_in(ctx, span, expanding, depth))
                    .collect::<Result<_>>()?,
                varargs: *varargs,
            },
            AstType::Struct(fields) => AstType::Struct(
                fields
                    .iter()
                    .map(|field| {
                        Ok(StructField {
                            name: field.name,
                            ty: field.ty.resolve_in(ctx, span, expanding, depth)?,
                        })
                    })
                    .collect::<Result<_>>()?,
            ),
            AstType::Array(element) => {
                AstType::Array(Box::new(element.resolve_in(ctx, span, expanding, depth)?))
            }
        };
        Ok(resolved)
    }

    /// Type equality, modulo aliases.
    pub fn same_as(&self, other: &AstType, ctx: &GlobalContext, span: Span) -> Result<bool> {
        if self == other {
            return Ok(true);
        }
        Ok(self.resolve(ctx, span)? == other.resolve(ctx, span)?)
    }

    /// Lowers to the intermediate representation's type vocabulary.
    pub fn lower(&self, ctx: &GlobalContext, span: Span) -> Result<ir::Type> {
        self.lower_in(ctx, span, &mut Vec::new())
    }

    fn lower_in(
        &self,
        ctx: &GlobalContext,
        span: Span,
        expanding: &mut Vec<Interned<str>>,
    ) -> Result<ir::Type> {
        let ty = match self {
            AstType::Integer(bits) => ir::Type::Int(*bits),
            AstType::Void => ir::Type::Void,
            // Function values are addresses; calls use `signature`.
            AstType::Boxed(_) | AstType::LibCPointer | AstType::Any | AstType::Function { .. } => {
                ir::Type::Ptr
            }
            AstType::Struct(fields) => ir::Type::Struct(
                fields
                    .iter()
                    .map(|field| field.ty.lower_in(ctx, span, expanding))
                    .collect::<Result<_>>()?,
            ),
            AstType::Array(_) => array_header(),
            AstType::Unresolved(name) => {
                if expanding.contains(name) {
                    return Err(span.wrap(Error::CyclicTypeAlias(*name)));
                }
                expanding.push(*name);
                let lowered = ctx.alias(*name, span)?.lower_in(ctx, span, expanding);
                expanding.pop();
                lowered?
            }
        };
        Ok(ty)
    }

    /// The call signature of a function type. Aliases are followed, but a
    /// boxed function is not callable.
    pub fn signature(&self, ctx: &GlobalContext, span: Span) -> Result<Option<ir::Signature>> {
        let AstType::Function {
            returns,
            params,
            varargs,
        } = self.resolve(ctx, span)?
        else {
            return Ok(None);
        };
        Ok(Some(ir::Signature {
            ret: returns.lower(ctx, span)?,
            params: params
                .iter()
                .map(|param| param.lower(ctx, span))
                .collect::<Result<_>>()?,
            variadic: varargs,
        }))
    }

    /// Returns a displayable form of the type, in source syntax.
    pub fn write<'a>(&'a self, idents: &'a Interner<str>) -> impl fmt::Display + 'a {
        TypeWriter {
            ty: self,
            idents,
            boxed: false,
        }
    }
}

/// The unboxed representation of every array: `{ length, data }`.
pub fn array_header() -> ir::Type {
    ir::Type::Struct(vec![ir::Type::I64, ir::Type::Ptr])
}

struct TypeWriter<'a> {
    ty: &'a AstType,
    idents: &'a Interner<str>,
    /// Whether a `Boxed` layer was just crossed.
    boxed: bool,
}

impl TypeWriter<'_> {
    fn nested<'b>(&'b self, ty: &'b AstType, boxed: bool) -> TypeWriter<'b> {
        TypeWriter {
            ty,
            idents: self.idents,
            boxed,
        }
    }
}

impl fmt::Display for TypeWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unboxed_prefix = if self.boxed { "" } else { "unbox " };
        match self.ty {
            AstType::Boxed(inner) => write!(f, "{}", self.nested(inner, true)),
            AstType::Void => f.write_str("void"),
            AstType::Any => f.write_str("any"),
            AstType::Integer(bits) => write!(f, "{unboxed_prefix}i{bits}"),
            AstType::LibCPointer => write!(f, "{unboxed_prefix}libc::ptr"),
            AstType::Unresolved(name) => write!(f, "{unboxed_prefix}{}", self.idents.get(name)),
            AstType::Array(element) => {
                write!(f, "{unboxed_prefix}[{}]", self.nested(element, false))
            }
            AstType::Struct(fields) => {
                write!(f, "{unboxed_prefix}{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    let name = self.idents.get(field.name);
                    write!(f, "{name}: {}", self.nested(&field.ty, false))?;
                }
                f.write_str("}")
            }
            AstType::Function {
                returns,
                params,
                varargs,
            } => {
                f.write_str("fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", self.nested(param, false))?;
                }
                if *varargs {
                    f.write_str(if params.is_empty() { "..." } else { ", ..." })?;
                }
                write!(f, ") -> {}", self.nested(returns, false))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::intern::Interner;
    use pretty_assertions::assert_eq;

    const SPAN: Span = Span { len: 0, lo: 0 };

    fn int(bits: u32) -> AstType {
        AstType::Integer(bits)
    }

    #[test]
    fn unbox_strips_boxes_and_aliases() {
        let mut i = Interner::with_capacity(8);
        let mut ctx = GlobalContext::default();
        let byte = i.intern("Byte");
        let word = i.intern("Word");
        ctx.define_alias(byte, int(8), SPAN).unwrap();
        ctx.define_alias(word, AstType::Unresolved(byte).boxed(), SPAN)
            .unwrap();

        let ty = AstType::Unresolved(word).boxed().boxed();
        assert_eq!(ty.unbox(&ctx, SPAN).unwrap(), int(8));
        assert_eq!(int(32).unbox(&ctx, SPAN).unwrap(), int(32));
    }

    #[test]
    fn unbox_unknown_alias_fails() {
        let mut i = Interner::with_capacity(8);
        let ctx = GlobalContext::default();
        let missing = i.intern("Missing");
        let error = AstType::Unresolved(missing).unbox(&ctx, SPAN).unwrap_err();
        assert_eq!(error.inner, Error::UnknownType(missing));
    }

    #[test]
    fn direct_alias_cycles_are_rejected() {
        let mut i = Interner::with_capacity(8);
        let mut ctx = GlobalContext::default();
        let a = i.intern("A");
        let b = i.intern("B");
        ctx.define_alias(a, AstType::Unresolved(b), SPAN).unwrap();
        ctx.define_alias(b, AstType::Unresolved(a), SPAN).unwrap();

        let ty = AstType::Unresolved(a);
        assert!(matches!(
            ty.unbox(&ctx, SPAN).unwrap_err().inner,
            Error::CyclicTypeAlias(_)
        ));
        assert!(matches!(
            ty.resolve(&ctx, SPAN).unwrap_err().inner,
            Error::CyclicTypeAlias(_)
        ));
        assert!(matches!(
            ty.lower(&ctx, SPAN).unwrap_err().inner,
            Error::CyclicTypeAlias(_)
        ));
    }

    #[test]
    fn recursive_alias_through_box_is_nominal() {
        let mut i = Interner::with_capacity(8);
        let mut ctx = GlobalContext::default();
        let list = i.intern("List");
        let next = i.intern("next");
        let node = AstType::Struct(vec![StructField {
            name: next,
            ty: AstType::Unresolved(list).boxed(),
        }]);
        ctx.define_alias(list, node.clone().boxed(), SPAN).unwrap();

        let resolved = AstType::Unresolved(list).boxed().resolve(&ctx, SPAN).unwrap();
        assert_eq!(resolved, node.boxed());
        assert_eq!(
            AstType::Unresolved(list).unbox(&ctx, SPAN).unwrap().lower(&ctx, SPAN).unwrap(),
            ir::Type::Struct(vec![ir::Type::Ptr])
        );
    }

    #[test]
    fn boxed_alias_of_boxed_type_is_one_box() {
        let mut i = Interner::with_capacity(8);
        let mut ctx = GlobalContext::default();
        let point = i.intern("Point");
        let x = i.intern("x");
        let st = AstType::Struct(vec![StructField { name: x, ty: int(32).boxed() }]);
        ctx.define_alias(point, st.clone().boxed(), SPAN).unwrap();

        let written = AstType::Unresolved(point).boxed();
        assert!(written.same_as(&st.clone().boxed(), &ctx, SPAN).unwrap());
        assert!(!written.same_as(&st, &ctx, SPAN).unwrap());
    }

    #[test]
    fn lowering() {
        let ctx = GlobalContext::default();
        let lower = |ty: AstType| ty.lower(&ctx, SPAN).unwrap();
        assert_eq!(lower(int(16)), ir::Type::Int(16));
        assert_eq!(lower(AstType::Void), ir::Type::Void);
        assert_eq!(lower(int(32).boxed()), ir::Type::Ptr);
        assert_eq!(lower(AstType::LibCPointer), ir::Type::Ptr);
        assert_eq!(lower(AstType::Array(Box::new(int(8)))), array_header());
        assert_eq!(
            lower(AstType::Struct(vec![])),
            ir::Type::Struct(vec![])
        );
    }

    #[test]
    fn written_in_source_syntax() {
        let mut i = Interner::with_capacity(8);
        let x = i.intern("x");
        let ty = AstType::Function {
            returns: Box::new(int(32)),
            params: vec![
                int(32).boxed(),
                AstType::Array(Box::new(int(8).boxed())).boxed(),
                AstType::Struct(vec![StructField { name: x, ty: AstType::LibCPointer }]).boxed(),
            ],
            varargs: true,
        };
        assert_eq!(
            ty.write(&i).to_string(),
            "fn(i32, [i8], {x: unbox libc::ptr}, ...) -> unbox i32"
        );
    }
}
