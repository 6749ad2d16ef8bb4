//! Heap layout of boxed values.
//!
//! A boxed value is a pointer to a wrapper `{ strong: i32, weak: i32, data:
//! ptr }`, where `data` points to a separate allocation holding the unboxed
//! value. Both counts start at one; nothing adjusts them yet.

use crate::{
    codegen::{Generator, Result},
    ir::{Operand, Signature, Type, Value},
    token::Span,
    types::AstType,
};

const MALLOC: &str = "malloc";
const DATA_FIELD: usize = 2;

pub fn wrapper_type() -> Type {
    Type::Struct(vec![Type::I32, Type::I32, Type::Ptr])
}

fn malloc_signature() -> Signature {
    Signature {
        ret: Type::Ptr,
        params: vec![Type::I64],
        variadic: false,
    }
}

impl Generator<'_> {
    pub(super) fn g_malloc(&mut self, size: u64) -> Value {
        let sig = malloc_signature();
        self.module.require_extern(MALLOC, sig.clone());
        self.fb
            .call(&sig, &Value::global(MALLOC), &[Operand::size(size)])
    }

    /// Moves the value to the heap, returning the wrapper pointer.
    pub(super) fn g_box(&mut self, value: &Operand) -> Value {
        let data = self.g_malloc(value.ty.size_of());
        self.fb.store(value, &data);

        let wrapper_ty = wrapper_type();
        let one = Operand::int(Type::I32, 1);
        let mut header = Value::Undef.typed(wrapper_ty.clone());
        for (index, field) in [one.clone(), one, data.typed(Type::Ptr)].iter().enumerate() {
            header = self
                .fb
                .insert_value(&header, field, index)
                .typed(wrapper_ty.clone());
        }

        let wrapper = self.g_malloc(wrapper_ty.size_of());
        self.fb.store(&header, &wrapper);
        wrapper
    }

    /// Loads the data pointer out of a wrapper.
    pub(super) fn g_data_ptr(&mut self, wrapper: &Value) -> Value {
        let field = self.fb.gep(
            &wrapper_type(),
            wrapper,
            &[Operand::field(0), Operand::field(DATA_FIELD)],
        );
        self.fb.load(&Type::Ptr, &field)
    }

    /// Follows every box layer of `ty`, starting at `wrapper`, returning
    /// the address of the innermost unboxed value. `None` if `ty` is not
    /// boxed at all.
    pub(super) fn g_unwrap(
        &mut self,
        wrapper: Value,
        ty: &AstType,
        span: Span,
    ) -> Result<Option<Value>> {
        let AstType::Boxed(mut inner) = ty.resolve(self.ctx, span)? else {
            return Ok(None);
        };
        let mut wrapper = wrapper;
        loop {
            let data = self.g_data_ptr(&wrapper);
            match *inner {
                AstType::Boxed(next) => {
                    wrapper = self.fb.load(&Type::Ptr, &data);
                    inner = next;
                }
                _ => return Ok(Some(data)),
            }
        }
    }
}
