use std::{
    fmt::{self, Write},
    format_args as f,
};

use super::{Operand, Signature, Type, Value};

const DEFAULT_BODY_CAPACITY: usize = 1024;

/// Builds the body of one function, instruction by instruction.
///
/// Instructions emitted after a terminator land in a fresh (unreachable)
/// basic block, so callers never produce a malformed block.
pub struct FunctionBuilder {
    code: String,
    next_temp: u32,
    next_block: u32,
    terminated: bool,
}

impl Default for FunctionBuilder {
    fn default() -> Self {
        FunctionBuilder::new()
    }
}

impl FunctionBuilder {
    pub fn new() -> FunctionBuilder {
        let mut fb = FunctionBuilder {
            code: String::with_capacity(DEFAULT_BODY_CAPACITY),
            next_temp: 0,
            next_block: 0,
            terminated: false,
        };
        fb.out_label(f!("entry"));
        fb
    }

    pub fn param(index: usize) -> Value {
        Value::Param(index)
    }

    pub fn comment(&mut self, text: impl fmt::Display) {
        let text = text.to_string().replace('\n', "[nl]");
        self.out(f!("; {text}"));
    }

    pub fn alloca(&mut self, ty: &Type) -> Value {
        self.assign(f!("alloca {ty}"))
    }

    pub fn load(&mut self, ty: &Type, ptr: &Value) -> Value {
        self.assign(f!("load {ty}, ptr {ptr}"))
    }

    pub fn store(&mut self, value: &Operand, ptr: &Value) {
        self.instruction(f!("store {value}, ptr {ptr}"));
    }

    pub fn gep(&mut self, ty: &Type, ptr: &Value, indices: &[Operand]) -> Value {
        self.assign(f!("getelementptr {ty}, ptr {ptr}{}", Args(indices, ", ")))
    }

    pub fn call(&mut self, sig: &Signature, callee: &Value, args: &[Operand]) -> Value {
        debug_assert!(!sig.ret.is_void());
        self.assign(f!("call {sig} {callee}({})", Args(args, "")))
    }

    pub fn call_void(&mut self, sig: &Signature, callee: &Value, args: &[Operand]) {
        self.instruction(f!("call {sig} {callee}({})", Args(args, "")));
    }

    pub fn add(&mut self, ty: &Type, lhs: &Value, rhs: &Value) -> Value {
        self.assign(f!("add {ty} {lhs}, {rhs}"))
    }

    pub fn insert_value(&mut self, aggregate: &Operand, value: &Operand, index: usize) -> Value {
        self.assign(f!("insertvalue {aggregate}, {value}, {index}"))
    }

    pub fn extract_value(&mut self, aggregate: &Operand, index: usize) -> Value {
        self.assign(f!("extractvalue {aggregate}, {index}"))
    }

    pub fn ret(&mut self, value: &Operand) {
        self.instruction(f!("ret {value}"));
        self.terminated = true;
    }

    pub fn ret_void(&mut self) {
        self.instruction(f!("ret void"));
        self.terminated = true;
    }

    pub(super) fn finish(self) -> String {
        self.code
    }
}

/// Utility functions.
impl FunctionBuilder {
    /// Emits an instruction whose result is bound to a fresh temporary.
    fn assign(&mut self, f: fmt::Arguments<'_>) -> Value {
        self.reopen();
        let temp = Value::Temp(self.next_temp);
        self.next_temp += 1;
        self.out(f!("{temp} = {f}"));
        temp
    }

    fn instruction(&mut self, f: fmt::Arguments<'_>) {
        self.reopen();
        self.out(f);
    }

    /// Starts a new block if the current one is already terminated.
    fn reopen(&mut self) {
        if self.terminated {
            let n = self.next_block;
            self.next_block += 1;
            self.out_label(f!("dead{n}"));
            self.terminated = false;
        }
    }

    fn out(&mut self, f: fmt::Arguments<'_>) {
        writeln!(self.code, "  {f}").expect("code emit should be infallible");
    }

    fn out_label(&mut self, f: fmt::Arguments<'_>) {
        writeln!(self.code, "{f}:").expect("code emit should be infallible");
    }
}

/// Comma separated operands, optionally preceded by `prefix` when non-empty.
struct Args<'a>(&'a [Operand], &'static str);

impl fmt::Display for Args<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Args(operands, prefix) = self;
        for (i, operand) in operands.iter().enumerate() {
            f.write_str(if i == 0 { prefix } else { ", " })?;
            write!(f, "{operand}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn instructions_after_return_open_a_new_block() {
        let mut fb = FunctionBuilder::new();
        let slot = fb.alloca(&Type::I32);
        fb.store(&Operand::int(Type::I32, 7), &slot);
        fb.ret_void();
        let loaded = fb.load(&Type::I32, &slot);
        let agg = Type::Struct(vec![Type::I32, Type::Ptr]);
        let undef = Value::Undef.typed(agg.clone());
        let with_int = fb.insert_value(&undef, &loaded.typed(Type::I32), 0);
        fb.extract_value(&with_int.typed(agg.clone()), 0);
        fb.gep(&agg, &slot, &[Operand::field(0), Operand::field(1)]);
        fb.ret_void();

        assert_eq!(
            fb.finish(),
            indoc! {"
                entry:
                  %t0 = alloca i32
                  store i32 7, ptr %t0
                  ret void
                dead0:
                  %t1 = load i32, ptr %t0
                  %t2 = insertvalue { i32, ptr } undef, i32 %t1, 0
                  %t3 = extractvalue { i32, ptr } %t2, 0
                  %t4 = getelementptr { i32, ptr }, ptr %t0, i32 0, i32 1
                  ret void
            "}
        );
    }
}
