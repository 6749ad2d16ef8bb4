/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The code generator takes the AST of every input file, checks the types of
/// each function body as it goes, and lowers it into an LLVM module.
pub mod codegen;

/// Program-wide symbol tables, filled before code generation starts.
pub mod context;

/// Ties every compilation phase together over a set of source files.
pub mod driver;

/// A textual LLVM IR builder.
pub mod ir;

pub mod ast;
pub mod source;
pub mod stack_map;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt;
    pub mod intern;
    #[cfg(test)]
    pub(crate) mod test_utils;
}
