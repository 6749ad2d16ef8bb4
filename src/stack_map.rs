use std::collections::HashMap;

use crate::{
    codegen::{Error, Result},
    context::GlobalContext,
    ir,
    token::Span,
    types::AstType,
    util::intern::Interned,
};

/// A local variable: its type and the stack slot holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub ty: AstType,
    pub slot: ir::Value,
}

#[derive(Debug, Default)]
struct Frame {
    locals: HashMap<Interned<str>, Local>,
}

/// Lexical frames of the function being compiled, innermost last.
#[derive(Debug, Default)]
pub struct StackMap {
    frames: Vec<Frame>,
}

impl StackMap {
    pub fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop_frame(&mut self) {
        let popped = self.frames.pop();
        debug_assert!(popped.is_some(), "popped frame from empty stack map");
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Looks the variable up, innermost frame first.
    pub fn get(&self, name: Interned<str>) -> Option<&Local> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.locals.get(&name))
    }

    /// Declares a variable in the innermost frame.
    ///
    /// Declaring a visible variable again is a no-op if the types agree and
    /// a type error otherwise. In both cases the original slot is kept.
    pub fn declare(
        &mut self,
        name: Interned<str>,
        local: Local,
        ctx: &GlobalContext,
        span: Span,
    ) -> Result<()> {
        if let Some(existing) = self.get(name) {
            if existing.ty.same_as(&local.ty, ctx, span)? {
                return Ok(());
            }
            return Err(span.wrap(Error::WrongType {
                expected: vec![existing.ty.clone()],
                found: local.ty,
            }));
        }
        let Some(frame) = self.frames.last_mut() else {
            unreachable!("declared variable outside of any frame");
        };
        frame.locals.insert(name, local);
        Ok(())
    }
}
