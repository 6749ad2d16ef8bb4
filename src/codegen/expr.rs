use crate::{
    ast::{Expr, ExprKind},
    codegen::{Binding, Error, Generator, Result},
    ir::{Operand, Type, Value},
    token::Span,
    types::{array_header, AstType},
};

/// Field of the array header holding the element buffer.
const BUFFER_FIELD: usize = 1;

impl Generator<'_> {
    /// Lowers the expression to its runtime value.
    pub(super) fn g_value(&mut self, expr: &Expr) -> Result<Operand> {
        self.enter("value", expr.kind.describe(), expr.span);
        let value = self.g_value_kind(expr)?;
        self.exit("value", expr.kind.describe(), expr.span);
        Ok(value)
    }

    /// Lowers the expression to the address its value lives at.
    pub(super) fn g_path(&mut self, expr: &Expr) -> Result<Value> {
        self.enter("path", expr.kind.describe(), expr.span);
        let ptr = self.g_path_kind(expr)?;
        self.exit("path", expr.kind.describe(), expr.span);
        Ok(ptr)
    }

    fn g_value_kind(&mut self, expr: &Expr) -> Result<Operand> {
        let ctx = self.ctx;
        let span = expr.span;
        match &expr.kind {
            ExprKind::Variable(name) => match self.lookup(*name, span)? {
                Binding::Local(local) => {
                    let ty = local.ty.lower(ctx, span)?;
                    Ok(self.fb.load(&ty, &local.slot).typed(ty))
                }
                Binding::Function(record) => {
                    Ok(Value::Global(record.mangled.clone()).typed(Type::Ptr))
                }
            },
            ExprKind::Invocation { callee, args } => {
                let callee_ty = self.infer(callee)?;
                let Some(sig) = callee_ty.signature(ctx, callee.span)? else {
                    return Err(callee.span.wrap(Error::DoesNotSupportCalling(callee_ty)));
                };
                // Checks the arguments.
                self.infer(expr)?;

                let callee = self.g_value(callee)?.value;
                let mut operands = Vec::with_capacity(args.len());
                for arg in args {
                    operands.push(self.g_value(arg)?);
                }
                if sig.ret.is_void() {
                    self.fb.call_void(&sig, &callee, &operands);
                    return Ok(Value::Undef.typed(Type::Void));
                }
                let ret = sig.ret.clone();
                Ok(self.fb.call(&sig, &callee, &operands).typed(ret))
            }
            ExprKind::Addition { lhs, rhs } => {
                self.infer(expr)?;
                let lhs = self.g_value(lhs)?;
                let rhs = self.g_value(rhs)?;
                let sum = self.fb.add(&lhs.ty, &lhs.value, &rhs.value);
                Ok(sum.typed(lhs.ty))
            }
            ExprKind::Integer(value) => {
                let ty = self.infer(expr)?.lower(ctx, span)?;
                Ok(Operand::int(ty, *value))
            }
            ExprKind::CString(text) => {
                let mut bytes = Vec::with_capacity(text.len() + 1);
                bytes.extend_from_slice(text.as_bytes());
                bytes.push(0);
                Ok(self.module.add_string_constant(&bytes).typed(Type::Ptr))
            }
            ExprKind::String(_) => Err(span.wrap(Error::NotYetSupported("String literals"))),
            ExprKind::Box(inner) => {
                self.infer(expr)?;
                let value = self.g_value(inner)?;
                Ok(self.g_box(&value).typed(Type::Ptr))
            }
            ExprKind::Unbox(inner) => {
                let inner_ty = self.infer(inner)?;
                if !self.is_boxed(&inner_ty, span)? {
                    return self.g_value(inner);
                }
                let unboxed = inner_ty.unbox(ctx, span)?.lower(ctx, span)?;
                let wrapper = self.g_value(inner)?.value;
                let Some(data) = self.g_unwrap(wrapper, &inner_ty, span)? else {
                    unreachable!("checked to be boxed");
                };
                Ok(self.fb.load(&unboxed, &data).typed(unboxed))
            }
            ExprKind::FieldAccess { base, field } => {
                let ty = self.infer(expr)?;
                let base_ty = self.infer(base)?;
                let (aggregate, boxed) = self.layout_of(&base_ty, base.span)?;
                match (&aggregate, boxed) {
                    (AstType::Struct(_), true) => {
                        let ptr = self.g_path(expr)?;
                        let ty = ty.lower(ctx, span)?;
                        Ok(self.fb.load(&ty, &ptr).typed(ty))
                    }
                    (AstType::Struct(fields), false) => {
                        let index = self.field_index(fields, &base_ty, field.name, field.span)?;
                        let aggregate = self.g_value(base)?;
                        let ty = ty.lower(ctx, span)?;
                        Ok(self.fb.extract_value(&aggregate, index).typed(ty))
                    }
                    // `length`, the only field of arrays.
                    (_, boxed) => {
                        let header = if boxed {
                            let wrapper = self.g_value(base)?.value;
                            let data = self.g_data_ptr(&wrapper);
                            self.fb.load(&array_header(), &data).typed(array_header())
                        } else {
                            self.g_value(base)?
                        };
                        let length = self.fb.extract_value(&header, 0).typed(Type::I64);
                        Ok(self.g_box(&length).typed(Type::Ptr))
                    }
                }
            }
            ExprKind::Subscript { base, index } => {
                let (ptr, element) = self.g_element_ptr(base, index)?;
                let ty = element.lower(ctx, span)?;
                Ok(self.fb.load(&ty, &ptr).typed(ty))
            }
            ExprKind::StructLiteral(fields) => {
                let ty = self.infer(expr)?.lower(ctx, span)?;
                let mut aggregate = Value::Undef.typed(ty.clone());
                for (index, field) in fields.iter().enumerate() {
                    let value = self.g_value(&field.value)?;
                    aggregate = self
                        .fb
                        .insert_value(&aggregate, &value, index)
                        .typed(ty.clone());
                }
                Ok(aggregate)
            }
            ExprKind::ArrayLiteral(elements) => {
                let AstType::Array(element) = self.infer(expr)? else {
                    unreachable!("array literals have array types");
                };
                let element_ty = element.lower(ctx, span)?;
                let count = elements.len() as u64;
                let buffer = self.g_malloc(count * element_ty.size_of());
                for (i, element) in elements.iter().enumerate() {
                    let value = self.g_value(element)?;
                    let slot = self.fb.gep(&element_ty, &buffer, &[Operand::size(i as u64)]);
                    self.fb.store(&value, &slot);
                }

                let header_ty = array_header();
                let header = Value::Undef.typed(header_ty.clone());
                let header = self.fb.insert_value(&header, &Operand::size(count), 0);
                let header = self.fb.insert_value(
                    &header.typed(header_ty.clone()),
                    &buffer.typed(Type::Ptr),
                    BUFFER_FIELD,
                );
                Ok(header.typed(header_ty))
            }
        }
    }

    fn g_path_kind(&mut self, expr: &Expr) -> Result<Value> {
        let ctx = self.ctx;
        let span = expr.span;
        match &expr.kind {
            ExprKind::Variable(name) => match self.lookup(*name, span)? {
                Binding::Local(local) => Ok(local.slot),
                Binding::Function(record) => {
                    Err(span.wrap(Error::DoesNotSupportPathing(record.ty())))
                }
            },
            ExprKind::Unbox(inner) => {
                let inner_ty = self.infer(inner)?;
                if !self.is_boxed(&inner_ty, span)? {
                    return self.g_path(inner);
                }
                let wrapper = self.g_value(inner)?.value;
                let Some(data) = self.g_unwrap(wrapper, &inner_ty, span)? else {
                    unreachable!("checked to be boxed");
                };
                Ok(data)
            }
            ExprKind::FieldAccess { base, field } => {
                let ty = self.infer(expr)?;
                let base_ty = self.infer(base)?;
                let (aggregate, boxed) = self.layout_of(&base_ty, base.span)?;
                let AstType::Struct(fields) = &aggregate else {
                    // `length` is computed, not stored.
                    return Err(span.wrap(Error::DoesNotSupportPathing(ty)));
                };
                let index = self.field_index(fields, &base_ty, field.name, field.span)?;
                let aggregate_ir = aggregate.lower(ctx, base.span)?;
                let base_ptr = if boxed {
                    let wrapper = self.g_value(base)?.value;
                    self.g_data_ptr(&wrapper)
                } else {
                    self.g_path(base)?
                };
                Ok(self.fb.gep(
                    &aggregate_ir,
                    &base_ptr,
                    &[Operand::field(0), Operand::field(index)],
                ))
            }
            ExprKind::Subscript { base, index } => Ok(self.g_element_ptr(base, index)?.0),
            _ => Err(span.wrap(Error::DoesNotSupportPathing(self.infer(expr)?))),
        }
    }

    /// Address of `base[index]`, with the element type. The element buffer
    /// lives on the heap, so an unboxed base need not be addressable.
    fn g_element_ptr(&mut self, base: &Expr, index: &Expr) -> Result<(Value, AstType)> {
        let ctx = self.ctx;
        let element = self.element_type(base, index)?;
        let element_ty = element.lower(ctx, base.span)?;
        let base_ty = self.infer(base)?;
        let (_, boxed) = self.layout_of(&base_ty, base.span)?;

        let header_ty = array_header();
        let buffer = if boxed {
            let wrapper = self.g_value(base)?.value;
            let header = self.g_data_ptr(&wrapper);
            let field = self.fb.gep(
                &header_ty,
                &header,
                &[Operand::field(0), Operand::field(BUFFER_FIELD)],
            );
            self.fb.load(&Type::Ptr, &field)
        } else {
            let header = self.g_value(base)?;
            self.fb.extract_value(&header, BUFFER_FIELD)
        };
        let index = self.g_value(index)?;
        let ptr = self.fb.gep(&element_ty, &buffer, &[index]);
        Ok((ptr, element))
    }

    fn is_boxed(&self, ty: &AstType, span: Span) -> Result<bool> {
        Ok(matches!(ty.resolve(self.ctx, span)?, AstType::Boxed(_)))
    }
}
