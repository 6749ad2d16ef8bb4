//! Compilation sessions: every input file goes through lexing, parsing,
//! preprocessing and emission, producing a module or a single diagnostic.

use std::fmt;

use tracing::{debug, debug_span};

use crate::{
    codegen::{self, Options},
    context::GlobalContext,
    lexer, parser,
    source::SourceMap,
    token::{Span, Spanned},
    util::{
        fmt::{Context, Show},
        intern::Interner,
    },
};

pub const PRELUDE_NAME: &str = "<prelude>";
pub const PRELUDE: &str = include_str!("../std/prelude.acorn");

#[derive(Debug, Clone)]
pub struct Config {
    /// Compiles `std/prelude.acorn` ahead of the user files.
    pub include_prelude: bool,
    pub annotate_ir: bool,
    pub target_triple: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            include_prelude: true,
            annotate_ir: false,
            target_triple: None,
        }
    }
}

pub struct Session {
    config: Config,
    source_map: SourceMap,
}

impl Session {
    pub fn new(config: Config) -> Session {
        let mut source_map = SourceMap::default();
        if config.include_prelude {
            source_map.add(PRELUDE_NAME, PRELUDE);
        }
        Session { config, source_map }
    }

    pub fn add_file(&mut self, name: &str, contents: &str) {
        self.source_map.add(name, contents);
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    /// Compiles every added file as a single module, returning its textual
    /// IR.
    pub fn compile(&self) -> Result<String, Diagnostic> {
        let mut interner = Interner::with_capacity(256);
        let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);

        {
            let _span = debug_span!("lex", files = self.source_map.file_count()).entered();
            for file in 0..self.source_map.file_count() {
                let base = self.source_map.file_base(file);
                lexer::lex(self.source_map.file_text(file), base, &mut tokens);
            }
            debug!(tokens = tokens.len(), "lexed");
        }

        let text = self.source_map.text();
        let headers = parser::parse_tokens(text, &tokens, &mut interner)
            .map_err(|error| self.diagnostic(&interner, &error))?;

        let ctx = GlobalContext::preprocess(&headers, &interner)
            .map_err(|error| self.diagnostic(&interner, &error))?;

        let options = Options {
            annotate_ir: self.config.annotate_ir,
            target_triple: self.config.target_triple.clone(),
        };
        let module = codegen::generate(&headers, &ctx, &interner, &options)
            .map_err(|error| self.diagnostic(&interner, &error))?;
        debug!("emitted module");
        Ok(module.emit())
    }

    fn diagnostic<E>(&self, interner: &Interner<str>, error: &Spanned<E>) -> Diagnostic
    where
        Spanned<E>: Show,
    {
        let ctx = Context::new(interner);
        let message = error.display(&ctx).to_string();
        Diagnostic::new(&self.source_map, error.span, message)
    }
}

/// A compilation error located in the source map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub file: String,
    pub row: usize,
    pub column: usize,
    /// The source line the error starts in.
    pub line: String,
}

impl Diagnostic {
    pub fn new(source_map: &SourceMap, span: Span, message: String) -> Diagnostic {
        let location = source_map.locate(span);
        Diagnostic {
            message,
            span,
            file: location.file.to_owned(),
            row: location.row,
            column: location.column,
            line: source_map.line_of(span).to_owned(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        writeln!(f, "{}", self.line)?;
        let pad = " ".repeat(self.column - 1);
        writeln!(f, "{pad}^")?;
        write!(f, "{} @ {}", self.file, self.row)
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn bare() -> Session {
        Session::new(Config {
            include_prelude: false,
            ..Config::default()
        })
    }

    #[test]
    fn compiles_with_prelude() {
        let mut session = Session::new(Config::default());
        session.add_file(
            "main.acorn",
            indoc! {r#"
                fn main() -> i32 {
                    printf(c"%d\n", unbox 42)
                    return 0
                }
            "#},
        );
        let ir = session.compile().unwrap();

        assert!(ir.contains("define i32 @main()"), "{ir}");
        assert!(ir.contains("call ptr () @acorn_coded__main_op__cl___i32()"), "{ir}");
        assert!(ir.contains("declare i32 @printf(ptr, ...)"), "{ir}");
        assert_eq!(ir.matches("declare ptr @malloc(i64)").count(), 1);
    }

    #[test]
    fn compiles_demo() {
        let mut session = Session::new(Config::default());
        session.add_file("main.acorn", include_str!("../demos/main.acorn"));
        let ir = session.compile().unwrap();
        let count = "define void @acorn_coded__count_op_Counter_sep_unbox_i64_cl___void(ptr %p0, i64 %p1)";
        assert!(ir.contains(count), "{ir}");
        let counted = r#"@.str.2 = private unnamed_addr constant [14 x i8] c"counted: %ld\0A\00""#;
        assert!(ir.contains(counted), "{ir}");
    }

    #[test]
    fn diagnostic_points_into_the_right_file() {
        let mut session = bare();
        session.add_file("a.acorn", "fn f() -> void {}\n");
        session.add_file("b.acorn", "fn g() -> void {\n    x = y\n}\n");
        let diagnostic = session.compile().unwrap_err();

        assert_eq!(diagnostic.message, "Variable `y` does not exist.");
        assert_eq!((diagnostic.file.as_str(), diagnostic.row), ("b.acorn", 2));
        assert_eq!(
            diagnostic.to_string(),
            indoc! {"
                Variable `y` does not exist.
                    x = y
                        ^
                b.acorn @ 2"}
        );
    }

    #[test]
    fn lexical_errors_are_reported() {
        let mut session = bare();
        session.add_file("a.acorn", "fn f() -> void {\n  x = c\"oops\n}\n");
        let diagnostic = session.compile().unwrap_err();
        assert_eq!(diagnostic.message, "Unclosed string literal.");
        assert_eq!((diagnostic.row, diagnostic.column), (2, 7));
    }

    #[test]
    fn user_code_can_not_reclaim_prelude_symbols() {
        let mut session = Session::new(Config::default());
        session.add_file(
            "main.acorn",
            indoc! {r#"
                @varargs
                @mangle_as("printf")
                fn p() -> unbox i32
                fn main() -> i32 { return 0 }
            "#},
        );
        let diagnostic = session.compile().unwrap_err();
        assert_eq!(diagnostic.message, "`p` is already defined.");
        assert_eq!(
            (diagnostic.file.as_str(), diagnostic.row, diagnostic.column),
            ("main.acorn", 3, 4)
        );
    }

    #[test]
    fn unknown_signature_types_are_reported() {
        let mut session = Session::new(Config::default());
        session.add_file("main.acorn", "fn f(x Foo) -> void {}
fn main() -> i32 { return 0 }
");
        let diagnostic = session.compile().unwrap_err();
        assert_eq!(diagnostic.message, "Unknown type `Foo`.");
        assert_eq!((diagnostic.row, diagnostic.column), (1, 8));
    }

    #[test]
    fn prelude_requires_user_main() {
        let session = Session::new(Config::default());
        // The prelude refers to `main`, which only user code defines.
        let diagnostic = session.compile().unwrap_err();
        assert_eq!(diagnostic.file, PRELUDE_NAME);
        assert_eq!(diagnostic.message, "Variable `main` does not exist.");
    }
}
