//! A small builder for textual LLVM IR. The code generator only relies on
//! the operations exposed here; nothing in this module knows about Acorn.

use std::{
    fmt::{self, Write},
    format_args as f,
    rc::Rc,
};

mod builder;
mod types;

pub use builder::FunctionBuilder;
pub use types::{Signature, Type, POINTER_WIDTH};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// An instruction result, `%tN`.
    Temp(u32),
    /// A function parameter, `%pN`.
    Param(usize),
    Global(Rc<str>),
    Int(i64),
    Undef,
}

impl Value {
    pub fn global(name: &str) -> Value {
        Value::Global(name.into())
    }

    pub fn typed(self, ty: Type) -> Operand {
        Operand { ty, value: self }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Temp(n) => write!(f, "%t{n}"),
            Value::Param(n) => write!(f, "%p{n}"),
            Value::Global(name) => write!(f, "@{}", Symbol(name)),
            Value::Int(n) => write!(f, "{n}"),
            Value::Undef => f.write_str("undef"),
        }
    }
}

/// A value together with its type, as required by most instruction operands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operand {
    pub ty: Type,
    pub value: Value,
}

impl Operand {
    pub fn int(ty: Type, value: i64) -> Operand {
        Value::Int(value).typed(ty)
    }

    /// An `i32` aggregate index, as used by `getelementptr`.
    #[allow(clippy::cast_possible_wrap)]
    pub fn field(index: usize) -> Operand {
        Operand::int(Type::I32, index as i64)
    }

    /// An `i64` byte size or element count.
    pub fn size(size: u64) -> Operand {
        Operand::int(Type::I64, i64::try_from(size).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.value)
    }
}

/// Global symbol names, quoted unless they are plain LLVM identifiers.
struct Symbol<'a>(&'a str);

impl fmt::Display for Symbol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.0;
        let plain_start = |c: char| c.is_ascii_alphabetic() || matches!(c, '-' | '$' | '.' | '_');
        let plain = name.chars().next().is_some_and(plain_start)
            && name.chars().all(|c| plain_start(c) || c.is_ascii_digit());
        if plain {
            return f.write_str(name);
        }
        f.write_char('"')?;
        for byte in name.bytes() {
            match byte {
                b'"' | b'\\' => write!(f, "\\{byte:02X}")?,
                0x20..=0x7e => f.write_char(char::from(byte))?,
                _ => write!(f, "\\{byte:02X}")?,
            }
        }
        f.write_char('"')
    }
}

struct FunctionDecl {
    name: Rc<str>,
    sig: Signature,
    /// Rendered instructions, `None` for declarations.
    body: Option<String>,
}

const DEFAULT_CODE_CAPACITY: usize = 4 * 1024; // 4 KiB

/// A module under construction.
#[derive(Default)]
pub struct Module {
    target_triple: Option<String>,
    strings: Vec<(Rc<str>, Vec<u8>)>,
    functions: Vec<FunctionDecl>,
    /// Runtime symbols the generated code relies on; only declared if no
    /// function of the same name is part of the module.
    externs: Vec<(Rc<str>, Signature)>,
}

impl Module {
    pub fn new(target_triple: Option<String>) -> Module {
        Module {
            target_triple,
            ..Module::default()
        }
    }

    /// Adds a private constant holding the provided bytes, returning its
    /// address. No terminator is appended.
    pub fn add_string_constant(&mut self, bytes: &[u8]) -> Value {
        let name: Rc<str> = format!(".str.{}", self.strings.len()).into();
        self.strings.push((Rc::clone(&name), bytes.to_vec()));
        Value::Global(name)
    }

    pub fn declare_function(&mut self, name: &str, sig: Signature) {
        self.functions.push(FunctionDecl {
            name: name.into(),
            sig,
            body: None,
        });
    }

    pub fn define_function(&mut self, name: &str, sig: Signature, body: FunctionBuilder) {
        self.functions.push(FunctionDecl {
            name: name.into(),
            sig,
            body: Some(body.finish()),
        });
    }

    /// Registers a runtime symbol, once.
    pub fn require_extern(&mut self, name: &str, sig: Signature) {
        if !self.externs.iter().any(|(n, _)| &**n == name) {
            self.externs.push((name.into(), sig));
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.iter().any(|function| &*function.name == name)
    }

    /// Serializes the module.
    pub fn emit(&self) -> String {
        let mut out = Emitter(String::with_capacity(DEFAULT_CODE_CAPACITY));
        out.line(f!("; ModuleID = 'acorn'"));
        out.line(f!("source_filename = \"acorn\""));
        if let Some(triple) = &self.target_triple {
            out.line(f!("target triple = \"{triple}\""));
        }

        if !self.strings.is_empty() {
            out.line(f!(""));
        }
        for (name, bytes) in &self.strings {
            out.line(f!(
                "@{name} = private unnamed_addr constant [{} x i8] c\"{}\"",
                bytes.len(),
                EscapedBytes(bytes),
            ));
        }

        let externs = self
            .externs
            .iter()
            .filter(|(name, _)| !self.has_function(name));
        let declared = self
            .functions
            .iter()
            .filter(|function| function.body.is_none())
            .map(|function| (&function.name, &function.sig));
        let mut declarations = externs.map(|(name, sig)| (name, sig)).chain(declared).peekable();
        if declarations.peek().is_some() {
            out.line(f!(""));
        }
        for (name, sig) in declarations {
            out.line(f!("declare {}", Header(name, sig, false)));
        }

        for function in &self.functions {
            if let Some(body) = &function.body {
                out.line(f!(""));
                out.line(f!(
                    "define {} {{",
                    Header(&function.name, &function.sig, true)
                ));
                out.0.push_str(body);
                out.line(f!("}}"));
            }
        }
        out.0
    }
}

struct Emitter(String);

impl Emitter {
    fn line(&mut self, f: fmt::Arguments<'_>) {
        self.0
            .write_fmt(f!("{f}\n"))
            .expect("code emit should be infallible");
    }
}

/// `ret @name(params)`; parameters are named `%pN` on definitions.
struct Header<'a>(&'a str, &'a Signature, bool);

impl fmt::Display for Header<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Header(name, sig, named) = self;
        write!(f, "{} @{}(", sig.ret, Symbol(name))?;
        for (i, param) in sig.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
            if *named {
                write!(f, " {}", Value::Param(i))?;
            }
        }
        if sig.variadic {
            if !sig.params.is_empty() {
                f.write_str(", ")?;
            }
            f.write_str("...")?;
        }
        f.write_str(")")
    }
}

struct EscapedBytes<'a>(&'a [u8]);

impl fmt::Display for EscapedBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in self.0 {
            match byte {
                b'"' | b'\\' => write!(f, "\\{byte:02X}")?,
                0x20..=0x7e => f.write_char(char::from(byte))?,
                _ => write!(f, "\\{byte:02X}")?,
            }
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
    fn emits_declarations_definitions_and_strings() {
        let mut module = Module::new(None);
        let hello = module.add_string_constant(b"hi\n\0");
        let printf = Signature {
            ret: Type::I32,
            params: vec![Type::Ptr],
            variadic: true,
        };
        module.declare_function("printf", printf.clone());
        module.require_extern("printf", printf.clone());
        module.require_extern(
            "malloc",
            Signature {
                ret: Type::Ptr,
                params: vec![Type::I64],
                variadic: false,
            },
        );

        let mut fb = FunctionBuilder::new();
        fb.call(&printf, &Value::global("printf"), &[hello.typed(Type::Ptr)]);
        fb.ret(&Operand::int(Type::I32, 0));
        let main = Signature {
            ret: Type::I32,
            params: vec![],
            variadic: false,
        };
        module.define_function("main", main, fb);

        assert_eq!(
            module.emit(),
            indoc! {r#"
                ; ModuleID = 'acorn'
                source_filename = "acorn"

                @.str.0 = private unnamed_addr constant [4 x i8] c"hi\0A\00"

                declare ptr @malloc(i64)
                declare i32 @printf(ptr, ...)

                define i32 @main() {
                entry:
                  %t0 = call i32 (ptr, ...) @printf(ptr @.str.0)
                  ret i32 0
                }
            "#}
        );
    }

    #[test]
    fn symbols_are_quoted_when_needed() {
        assert_eq!(Value::global("main").to_string(), "@main");
        assert_eq!(Value::global("a::b(c)").to_string(), "@\"a::b(c)\"");
    }
}
