use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use tracing::debug;

use crate::{
    ast::{Annotation, ExprKind, Function, Header},
    codegen::{Error, Result},
    token::Span,
    types::AstType,
    util::intern::{Interned, Interner},
};

const MANGLE_PREFIX: &str = "acorn_coded::";

/// Per compilation symbol tables.
///
/// Filled by [`GlobalContext::preprocess`] before any code is emitted, so
/// that every function and alias can be referenced regardless of the order
/// in which headers appear. Read-only afterwards.
#[derive(Debug, Default)]
pub struct GlobalContext {
    functions: HashMap<Interned<str>, FunctionRecord>,
    aliases: HashMap<Interned<str>, AstType>,
    /// Module level symbols claimed so far, after mangling.
    symbols: HashSet<Rc<str>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    /// The symbol used at the module level.
    pub mangled: Rc<str>,
    pub varargs: bool,
    pub params: Vec<AstType>,
    pub return_ty: AstType,
}

impl FunctionRecord {
    /// The type of the function, when used as a value.
    pub fn ty(&self) -> AstType {
        AstType::Function {
            returns: Box::new(self.return_ty.clone()),
            params: self.params.clone(),
            varargs: self.varargs,
        }
    }
}

impl GlobalContext {
    /// Registers every alias, then every function signature. Every type
    /// named by an alias or a signature must resolve.
    pub fn preprocess(headers: &[Header], idents: &Interner<str>) -> Result<GlobalContext> {
        let mut ctx = GlobalContext::default();
        for header in headers {
            if let Header::TypeAlias(alias) = header {
                ctx.define_alias(alias.name.name, alias.ty.clone(), alias.name.span)?;
            }
        }
        for header in headers {
            if let Header::TypeAlias(alias) = header {
                alias.ty.resolve(&ctx, alias.ty_span)?;
            }
        }
        for header in headers {
            if let Header::Function(function) = header {
                for param in &function.params {
                    param.ty.resolve(&ctx, param.ty_span)?;
                }
                function.return_ty.resolve(&ctx, function.return_ty_span)?;
                let record = FunctionRecord::new(function, idents)?;
                debug!(
                    name = idents.get(function.name),
                    mangled = &*record.mangled,
                    "registered function",
                );
                ctx.define_function(function.name.name, record, function.name.span)?;
            }
        }
        Ok(ctx)
    }

    pub fn define_alias(&mut self, name: Interned<str>, ty: AstType, span: Span) -> Result<()> {
        if self.aliases.contains_key(&name) {
            return Err(span.wrap(Error::AlreadyDefined(name)));
        }
        self.aliases.insert(name, ty);
        Ok(())
    }

    pub fn define_function(
        &mut self,
        name: Interned<str>,
        record: FunctionRecord,
        span: Span,
    ) -> Result<()> {
        if self.functions.contains_key(&name) || self.symbols.contains(&record.mangled) {
            return Err(span.wrap(Error::AlreadyDefined(name)));
        }
        self.symbols.insert(Rc::clone(&record.mangled));
        self.functions.insert(name, record);
        Ok(())
    }

    /// Returns the definition of the alias, failing with an unknown type
    /// error at `span`.
    pub fn alias(&self, name: Interned<str>, span: Span) -> Result<&AstType> {
        self.aliases
            .get(&name)
            .ok_or_else(|| span.wrap(Error::UnknownType(name)))
    }

    pub fn function(&self, name: Interned<str>) -> Option<&FunctionRecord> {
        self.functions.get(&name)
    }
}

impl FunctionRecord {
    fn new(function: &Function, idents: &Interner<str>) -> Result<FunctionRecord> {
        let params: Vec<_> = function.params.iter().map(|p| p.ty.clone()).collect();
        let mut record = FunctionRecord {
            mangled: mangle(function, idents).into(),
            varargs: false,
            params,
            return_ty: function.return_ty.clone(),
        };
        for annotation in &function.annotations {
            match idents.get(annotation.name) {
                "varargs" => record.varargs = true,
                "mangle_as" => record.mangled = mangle_as(annotation)?.into(),
                _ => (),
            }
        }
        Ok(record)
    }
}

fn mangle_as(annotation: &Annotation) -> Result<&str> {
    let mut arg = match &annotation.args[..] {
        [arg] => arg,
        _ => return Err(annotation.name.span.wrap(Error::InvalidAnnotation(annotation.name.name))),
    };
    while let ExprKind::Box(inner) = &arg.kind {
        arg = inner;
    }
    match &arg.kind {
        ExprKind::CString(symbol) | ExprKind::String(symbol) => Ok(symbol),
        _ => Err(arg.span.wrap(Error::InvalidAnnotation(annotation.name.name))),
    }
}

/// Derives the module level symbol of the function from its name and the
/// displayed names of its parameter and return types.
pub fn mangle(function: &Function, idents: &Interner<str>) -> String {
    use std::fmt::Write;

    let mut qualified = String::with_capacity(64);
    qualified.push_str(MANGLE_PREFIX);
    qualified.push_str(idents.get(function.name));
    qualified.push('(');
    for (i, param) in function.params.iter().enumerate() {
        if i > 0 {
            qualified.push(',');
        }
        let _ = write!(qualified, "{}", param.ty.write(idents));
    }
    let _ = write!(qualified, ")::{}", function.return_ty.write(idents));
    sanitize(&qualified)
}

fn sanitize(qualified: &str) -> String {
    let mut out = String::with_capacity(qualified.len() * 2);
    for c in qualified.chars() {
        match c {
            '(' => out.push_str("_op_"),
            ')' => out.push_str("_cl_"),
            ',' => out.push_str("_sep_"),
            '[' => out.push_str("_ob_"),
            ']' => out.push_str("_cb_"),
            '{' => out.push_str("_obr_"),
            '}' => out.push_str("_cbr_"),
            c if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$') => out.push(c),
            _ => out.push('_'),
        }
    }
    out
}
