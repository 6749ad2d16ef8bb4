use std::format_args as f;

use tracing::{debug, trace};

use crate::{
    ast::{Expr, ExprKind, Function, Header, Stmt, StmtKind},
    context::{FunctionRecord, GlobalContext},
    ir::{self, FunctionBuilder},
    stack_map::{Local, StackMap},
    token::{Span, Spanned},
    types::AstType,
    util::intern::{Interned, Interner},
};

mod expr;
mod infer;
mod memory;
#[cfg(test)]
mod tests;

pub type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Emits `ENTER`/`EXIT` comments around the lowering of every statement
    /// and expression.
    pub annotate_ir: bool,
    pub target_triple: Option<String>,
}

/// Emits a module for the provided headers. The context must have been
/// preprocessed from the same headers.
pub fn generate(
    headers: &[Header],
    ctx: &GlobalContext,
    ident_interner: &Interner<str>,
    options: &Options,
) -> Result<ir::Module> {
    let mut generator = Generator::new(ctx, ident_interner, options);
    for header in headers {
        if let Header::Function(function) = header {
            generator.g_function(function)?;
        }
    }
    Ok(generator.module)
}

pub struct Generator<'a> {
    module: ir::Module,
    ctx: &'a GlobalContext,
    ident_interner: &'a Interner<str>,
    annotate_ir: bool,

    // State of the function being emitted.
    fb: FunctionBuilder,
    stack: StackMap,
    return_ty: AstType,
}

/// What a name refers to, locals first.
enum Binding<'a> {
    Local(Local),
    Function(&'a FunctionRecord),
}

impl<'a> Generator<'a> {
    fn new(
        ctx: &'a GlobalContext,
        ident_interner: &'a Interner<str>,
        options: &Options,
    ) -> Generator<'a> {
        Generator {
            module: ir::Module::new(options.target_triple.clone()),
            ctx,
            ident_interner,
            annotate_ir: options.annotate_ir,
            fb: FunctionBuilder::new(),
            stack: StackMap::default(),
            return_ty: AstType::Void,
        }
    }

    fn g_function(&mut self, function: &Function) -> Result<()> {
        let ctx = self.ctx;
        let name = function.name;
        let Some(record) = ctx.function(name.name) else {
            unreachable!("function was not preprocessed");
        };
        let sig = ir::Signature {
            ret: function.return_ty.lower(ctx, name.span)?,
            params: function
                .params
                .iter()
                .map(|param| param.ty.lower(ctx, param.name.span))
                .collect::<Result<_>>()?,
            variadic: record.varargs,
        };

        let Some(body) = &function.body else {
            self.module.declare_function(&record.mangled, sig);
            return Ok(());
        };

        debug!(
            name = self.ident_interner.get(name),
            mangled = &*record.mangled,
            "emitting function"
        );
        self.fb = FunctionBuilder::new();
        self.return_ty = function.return_ty.clone();

        self.stack.push_frame();
        for (i, (param, ty)) in function.params.iter().zip(&sig.params).enumerate() {
            if self.stack.get(param.name.name).is_some() {
                return Err(param.name.span.wrap(Error::AlreadyDefined(param.name.name)));
            }
            let slot = self.fb.alloca(ty);
            self.fb.store(&FunctionBuilder::param(i).typed(ty.clone()), &slot);
            let local = Local {
                ty: param.ty.clone(),
                slot,
            };
            self.stack.declare(param.name.name, local, ctx, param.name.span)?;
        }

        self.stack.push_frame();
        for stmt in body {
            self.g_stmt(stmt)?;
        }
        self.stack.pop_frame();
        self.stack.pop_frame();

        let ends_in_return = matches!(
            body.last(),
            Some(Stmt {
                kind: StmtKind::Return(_),
                ..
            })
        );
        if !ends_in_return {
            if !self.is_void(&function.return_ty, name.span)? {
                return Err(name.span.wrap(Error::WrongType {
                    expected: vec![function.return_ty.clone()],
                    found: AstType::Void,
                }));
            }
            self.fb.ret_void();
        }

        let fb = std::mem::take(&mut self.fb);
        self.module.define_function(&record.mangled, sig, fb);
        Ok(())
    }

    fn g_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        self.enter("statement", stmt.kind.describe(), stmt.span);
        match &stmt.kind {
            StmtKind::Return(value) => self.g_return(value.as_ref(), stmt.span)?,
            StmtKind::Store { target, value } => self.g_store(target, value)?,
            StmtKind::Expr(expr) => {
                self.g_value(expr)?;
            }
        }
        self.exit("statement", stmt.kind.describe(), stmt.span);
        Ok(())
    }

    fn g_return(&mut self, value: Option<&Expr>, span: Span) -> Result<()> {
        let ctx = self.ctx;
        let expected = self.return_ty.clone();
        let (found, span) = match value {
            Some(value) => (self.infer(value)?, value.span),
            None => (AstType::Void, span),
        };
        if !found.same_as(&expected, ctx, span)? {
            return Err(span.wrap(Error::WrongType {
                expected: vec![expected],
                found,
            }));
        }

        match value {
            Some(value) if !self.is_void(&expected, span)? => {
                let value = self.g_value(value)?;
                self.fb.ret(&value);
            }
            Some(value) => {
                self.g_value(value)?;
                self.fb.ret_void();
            }
            None => self.fb.ret_void(),
        }
        Ok(())
    }

    /// Stores into an addressable target. A bare name which does not
    /// refer to anything yet declares a new local of the value's type.
    fn g_store(&mut self, target: &Expr, value: &Expr) -> Result<()> {
        let ctx = self.ctx;
        let value_ty = self.infer(value)?;
        if self.is_void(&value_ty, value.span)? {
            return Err(value.span.wrap(Error::VoidValue));
        }

        if let ExprKind::Variable(name) = target.kind {
            if self.stack.get(name).is_none() && ctx.function(name).is_none() {
                let ty = value_ty.lower(ctx, value.span)?;
                let slot = self.fb.alloca(&ty);
                let local = Local {
                    ty: value_ty.clone(),
                    slot,
                };
                self.stack.declare(name, local, ctx, target.span)?;
            }
        }

        let target_ty = self.infer(target)?;
        if !value_ty.same_as(&target_ty, ctx, value.span)? {
            return Err(value.span.wrap(Error::WrongType {
                expected: vec![target_ty],
                found: value_ty,
            }));
        }

        let value = self.g_value(value)?;
        let ptr = self.g_path(target)?;
        self.fb.store(&value, &ptr);
        Ok(())
    }
}

/// Utility functions.
impl<'a> Generator<'a> {
    fn lookup(&self, name: Interned<str>, span: Span) -> Result<Binding<'a>> {
        if let Some(local) = self.stack.get(name) {
            return Ok(Binding::Local(local.clone()));
        }
        match self.ctx.function(name) {
            Some(record) => Ok(Binding::Function(record)),
            None => Err(span.wrap(Error::VariableDoesNotExist(name))),
        }
    }

    fn is_void(&self, ty: &AstType, span: Span) -> Result<bool> {
        Ok(ty.resolve(self.ctx, span)?.is_void())
    }

    fn enter(&mut self, mode: &'static str, node: &'static str, span: Span) {
        trace!(mode, node, %span, "enter");
        if self.annotate_ir {
            self.fb.comment(f!("ENTER {mode} {node} {span}"));
        }
    }

    fn exit(&mut self, mode: &'static str, node: &'static str, span: Span) {
        trace!(mode, node, %span, "exit");
        if self.annotate_ir {
            self.fb.comment(f!("EXIT {mode} {node} {span}"));
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    VariableDoesNotExist(Interned<str>),
    UnknownType(Interned<str>),
    CyclicTypeAlias(Interned<str>),
    AlreadyDefined(Interned<str>),
    WrongType {
        expected: Vec<AstType>,
        found: AstType,
    },
    WrongArgumentCount {
        expected: usize,
        found: usize,
    },
    DoesNotSupportField {
        ty: AstType,
        field: Interned<str>,
    },
    DoesNotSupportSubscripting(AstType),
    DoesNotSupportPathing(AstType),
    DoesNotSupportCalling(AstType),
    DoesNotSupportArithmetic(AstType),
    /// A `void` expression used where a value is required.
    VoidValue,
    InvalidAnnotation(Interned<str>),
    NotYetSupported(&'static str),
}
