use crate::{
    ast::{Expr, ExprKind, FieldInit},
    codegen::{Binding, Error, Generator, Result},
    token::Span,
    types::{AstType, StructField},
    util::intern::Interned,
};

/// Integer literals which fit are `i32`, wider ones `i64`.
fn literal_type(value: i64) -> AstType {
    if i32::try_from(value).is_ok() {
        AstType::Integer(32)
    } else {
        AstType::Integer(64)
    }
}

impl Generator<'_> {
    /// Computes the type of the expression, checking its operands along the
    /// way. No code is emitted.
    pub(super) fn infer(&self, expr: &Expr) -> Result<AstType> {
        let ctx = self.ctx;
        let span = expr.span;
        let ty = match &expr.kind {
            ExprKind::Variable(name) => match self.lookup(*name, span)? {
                Binding::Local(local) => local.ty,
                Binding::Function(record) => record.ty(),
            },
            ExprKind::Invocation { callee, args } => {
                let (returns, params, varargs) = self.callee_type(callee)?;
                self.check_arguments(&params, varargs, args, span)?;
                returns
            }
            ExprKind::Addition { lhs, rhs } => {
                let lhs_ty = self.infer(lhs)?;
                let rhs_ty = self.infer(rhs)?;
                if !rhs_ty.same_as(&lhs_ty, ctx, rhs.span)? {
                    return Err(rhs.span.wrap(Error::WrongType {
                        expected: vec![lhs_ty],
                        found: rhs_ty,
                    }));
                }
                if !matches!(lhs_ty.resolve(ctx, span)?, AstType::Integer(_)) {
                    return Err(span.wrap(Error::DoesNotSupportArithmetic(lhs_ty)));
                }
                lhs_ty
            }
            ExprKind::Integer(value) => literal_type(*value),
            ExprKind::CString(_) => AstType::LibCPointer,
            ExprKind::String(_) => {
                return Err(span.wrap(Error::NotYetSupported("String literals")));
            }
            ExprKind::Box(inner) => {
                let inner_ty = self.infer(inner)?;
                if self.is_void(&inner_ty, inner.span)? {
                    return Err(inner.span.wrap(Error::VoidValue));
                }
                inner_ty.boxed()
            }
            ExprKind::Unbox(inner) => self.infer(inner)?.unbox(ctx, span)?,
            ExprKind::FieldAccess { base, field } => {
                let base_ty = self.infer(base)?;
                let (aggregate, _) = self.layout_of(&base_ty, base.span)?;
                match aggregate {
                    AstType::Struct(fields) => {
                        let index = self.field_index(&fields, &base_ty, field.name, field.span)?;
                        fields[index].ty.clone()
                    }
                    AstType::Array(_) if self.is_length(field.name) => AstType::Integer(64).boxed(),
                    _ => {
                        return Err(field.span.wrap(Error::DoesNotSupportField {
                            ty: base_ty,
                            field: field.name,
                        }));
                    }
                }
            }
            ExprKind::Subscript { base, index } => self.element_type(base, index)?,
            ExprKind::StructLiteral(fields) => {
                let mut struct_fields = Vec::with_capacity(fields.len());
                for FieldInit { name, ty, value } in fields {
                    let found = self.infer(value)?;
                    if !found.same_as(ty, ctx, value.span)? {
                        return Err(value.span.wrap(Error::WrongType {
                            expected: vec![ty.clone()],
                            found,
                        }));
                    }
                    struct_fields.push(StructField {
                        name: name.name,
                        ty: ty.clone(),
                    });
                }
                AstType::Struct(struct_fields)
            }
            ExprKind::ArrayLiteral(elements) => {
                let Some((first, rest)) = elements.split_first() else {
                    return Ok(AstType::Array(Box::new(AstType::Any)));
                };
                let element_ty = self.infer(first)?;
                if self.is_void(&element_ty, first.span)? {
                    return Err(first.span.wrap(Error::VoidValue));
                }
                for element in rest {
                    let found = self.infer(element)?;
                    if !found.same_as(&element_ty, ctx, element.span)? {
                        return Err(element.span.wrap(Error::WrongType {
                            expected: vec![element_ty],
                            found,
                        }));
                    }
                }
                AstType::Array(Box::new(element_ty))
            }
        };
        Ok(ty)
    }

    /// The return type, parameter types and variadicity of a callee.
    pub(super) fn callee_type(&self, callee: &Expr) -> Result<(AstType, Vec<AstType>, bool)> {
        let callee_ty = self.infer(callee)?;
        match callee_ty.resolve(self.ctx, callee.span)? {
            AstType::Function {
                returns,
                params,
                varargs,
            } => Ok((*returns, params, varargs)),
            _ => Err(callee.span.wrap(Error::DoesNotSupportCalling(callee_ty))),
        }
    }

    fn check_arguments(
        &self,
        params: &[AstType],
        varargs: bool,
        args: &[Expr],
        span: Span,
    ) -> Result<()> {
        if args.len() < params.len() || (args.len() > params.len() && !varargs) {
            return Err(span.wrap(Error::WrongArgumentCount {
                expected: params.len(),
                found: args.len(),
            }));
        }
        for (param, arg) in params.iter().zip(args) {
            let found = self.infer(arg)?;
            if !found.same_as(param, self.ctx, arg.span)? {
                return Err(arg.span.wrap(Error::WrongType {
                    expected: vec![param.clone()],
                    found,
                }));
            }
        }
        for arg in &args[params.len()..] {
            let found = self.infer(arg)?;
            if self.is_void(&found, arg.span)? {
                return Err(arg.span.wrap(Error::VoidValue));
            }
        }
        Ok(())
    }

    /// Splits the type of a field access or subscript base into the
    /// aggregate being accessed and whether it sits behind a box.
    pub(super) fn layout_of(&self, base_ty: &AstType, span: Span) -> Result<(AstType, bool)> {
        match base_ty.resolve(self.ctx, span)? {
            AstType::Boxed(inner) => Ok((*inner, true)),
            other => Ok((other, false)),
        }
    }

    pub(super) fn field_index(
        &self,
        fields: &[StructField],
        base_ty: &AstType,
        field: Interned<str>,
        span: Span,
    ) -> Result<usize> {
        fields
            .iter()
            .position(|candidate| candidate.name == field)
            .ok_or_else(|| {
                span.wrap(Error::DoesNotSupportField {
                    ty: base_ty.clone(),
                    field,
                })
            })
    }

    pub(super) fn is_length(&self, field: Interned<str>) -> bool {
        self.ident_interner.lookup("length") == Some(field)
    }

    /// Type of `base[index]`. The base must be an array, the (unboxed)
    /// index an integer.
    pub(super) fn element_type(&self, base: &Expr, index: &Expr) -> Result<AstType> {
        let base_ty = self.infer(base)?;
        let (aggregate, _) = self.layout_of(&base_ty, base.span)?;
        let AstType::Array(element) = aggregate else {
            return Err(base.span.wrap(Error::DoesNotSupportSubscripting(base_ty)));
        };
        let index_ty = self.infer(index)?;
        if !matches!(index_ty.resolve(self.ctx, index.span)?, AstType::Integer(_)) {
            return Err(index.span.wrap(Error::WrongType {
                expected: vec![AstType::Integer(64)],
                found: index_ty,
            }));
        }
        Ok(*element)
    }
}
