use crate::{
    codegen,
    context::GlobalContext,
    parser,
    token::Spanned,
    util::{
        self,
        fmt::{tree, Show},
        intern::Interner,
    },
};

pub fn format_error<E>(i: &Interner<str>, e: &Spanned<E>) -> String
where
    Spanned<E>: Show,
{
    let ctx = util::fmt::Context::new(i);
    format!("{:#}", e.display(&ctx))
}

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ParserExpr(&'static str),
    CodegenProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    ExpectedErrors(&'static [&'static str]),
    /// Every fragment must occur in the output, which must have no errors.
    Contains(&'static [&'static str]),
}

/// Runs the pipeline up to the stage named by the test, returning the
/// printed output (an AST tree or the emitted IR) and the formatted errors.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let tokens_buf = &mut Vec::with_capacity(1024);
    let interner = &mut Interner::with_capacity(128);

    match test {
        Test::ParserProgram(input) => {
            match parser::parse_program(input, tokens_buf, interner) {
                Ok(headers) => (tree::print_headers_string(interner, &headers), vec![]),
                Err(error) => (String::new(), vec![format_error(interner, &error)]),
            }
        }
        Test::ParserExpr(input) => match parser::parse_expr(input, tokens_buf, interner) {
            Ok(expr) => (tree::print_expr_string(interner, &expr), vec![]),
            Err(error) => (String::new(), vec![format_error(interner, &error)]),
        },
        Test::CodegenProgram(input) => {
            let headers = match parser::parse_program(input, tokens_buf, interner) {
                Ok(headers) => headers,
                Err(error) => return (String::new(), vec![format_error(interner, &error)]),
            };
            let interner = &*interner;
            let module = GlobalContext::preprocess(&headers, interner).and_then(|ctx| {
                codegen::generate(&headers, &ctx, interner, &codegen::Options::default())
            });
            match module {
                Ok(module) => (module.emit(), vec![]),
                Err(error) => (String::new(), vec![format_error(interner, &error)]),
            }
        }
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    let no_errors: &[&str] = &[];
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, no_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors)
        }
        Assertion::Contains(fragments) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, no_errors);
            for fragment in fragments {
                assert!(
                    formatted_actual_tree.contains(fragment),
                    "`{fragment}` not found in:\n{formatted_actual_tree}"
                );
            }
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };
    (@@assertion, contains, $expected:expr) => {
        crate::util::test_utils::Assertion::Contains($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(codegen, program), $source:expr) => {
        crate::util::test_utils::Test::CodegenProgram($source)
    };
}
pub(crate) use tree_tests;
