use indoc::indoc;
use pretty_assertions::assert_eq;

use crate::{
    codegen::{self, Options},
    context::GlobalContext,
    parser,
    util::{
        intern::Interner,
        test_utils::{run_pipeline, tree_tests, Test},
    },
};

#[track_caller]
fn compile(src: &'static str) -> String {
    let (ir, errors) = run_pipeline(Test::CodegenProgram(src));
    assert_eq!(errors, Vec::<String>::new());
    ir
}

#[test]
fn unbox_of_boxed_literal() {
    let ir = compile("fn answer() -> unbox i32 { return unbox 42 }");
    assert_eq!(
        ir,
        indoc! {"
            ; ModuleID = 'acorn'
            source_filename = \"acorn\"

            declare ptr @malloc(i64)

            define i32 @acorn_coded__answer_op__cl___unbox_i32() {
            entry:
              %t0 = call ptr (i64) @malloc(i64 4)
              store i32 42, ptr %t0
              %t1 = insertvalue { i32, i32, ptr } undef, i32 1, 0
              %t2 = insertvalue { i32, i32, ptr } %t1, i32 1, 1
              %t3 = insertvalue { i32, i32, ptr } %t2, ptr %t0, 2
              %t4 = call ptr (i64) @malloc(i64 16)
              store { i32, i32, ptr } %t3, ptr %t4
              %t5 = getelementptr { i32, i32, ptr }, ptr %t4, i32 0, i32 2
              %t6 = load ptr, ptr %t5
              %t7 = load i32, ptr %t6
              ret i32 %t7
            }
        "}
    );
}

#[test]
fn void_function_gets_implicit_return() {
    let ir = compile("fn f() -> void {}");
    assert_eq!(
        ir,
        indoc! {"
            ; ModuleID = 'acorn'
            source_filename = \"acorn\"

            define void @acorn_coded__f_op__cl___void() {
            entry:
              ret void
            }
        "}
    );
}

#[test]
fn parameters_are_spilled_to_the_stack() {
    let ir = compile("fn id(x unbox i32) -> unbox i32 { return x }");
    assert_eq!(
        ir,
        indoc! {"
            ; ModuleID = 'acorn'
            source_filename = \"acorn\"

            define i32 @acorn_coded__id_op_unbox_i32_cl___unbox_i32(i32 %p0) {
            entry:
              %t0 = alloca i32
              store i32 %p0, ptr %t0
              %t1 = load i32, ptr %t0
              ret i32 %t1
            }
        "}
    );
}

#[test]
fn array_literal_stores_elements_and_length() {
    let ir = compile("fn f(x unbox i32, y unbox i32) -> void { a = [x, y] }");
    assert_eq!(
        ir,
        indoc! {"
            ; ModuleID = 'acorn'
            source_filename = \"acorn\"

            declare ptr @malloc(i64)

            define void @acorn_coded__f_op_unbox_i32_sep_unbox_i32_cl___void(i32 %p0, i32 %p1) {
            entry:
              %t0 = alloca i32
              store i32 %p0, ptr %t0
              %t1 = alloca i32
              store i32 %p1, ptr %t1
              %t2 = alloca ptr
              %t3 = call ptr (i64) @malloc(i64 8)
              %t4 = load i32, ptr %t0
              %t5 = getelementptr i32, ptr %t3, i64 0
              store i32 %t4, ptr %t5
              %t6 = load i32, ptr %t1
              %t7 = getelementptr i32, ptr %t3, i64 1
              store i32 %t6, ptr %t7
              %t8 = insertvalue { i64, ptr } undef, i64 2, 0
              %t9 = insertvalue { i64, ptr } %t8, ptr %t3, 1
              %t10 = call ptr (i64) @malloc(i64 16)
              store { i64, ptr } %t9, ptr %t10
              %t11 = insertvalue { i32, i32, ptr } undef, i32 1, 0
              %t12 = insertvalue { i32, i32, ptr } %t11, i32 1, 1
              %t13 = insertvalue { i32, i32, ptr } %t12, ptr %t10, 2
              %t14 = call ptr (i64) @malloc(i64 16)
              store { i32, i32, ptr } %t13, ptr %t14
              store ptr %t14, ptr %t2
              ret void
            }
        "}
    );
}

#[test]
fn redeclaring_with_same_type_reuses_the_slot() {
    let ir = compile("fn f() -> void { x = 1 x = 2 }");
    assert_eq!(ir.matches("alloca").count(), 1);
}

#[test]
fn annotated_ir_has_enter_and_exit_comments() {
    let src = "fn f() -> unbox i32 { return unbox 1 }";
    let mut i = Interner::with_capacity(16);
    let headers = parser::parse_program(src, &mut Vec::new(), &mut i).unwrap();
    let ctx = GlobalContext::preprocess(&headers, &i).unwrap();
    let options = Options {
        annotate_ir: true,
        ..Options::default()
    };
    let ir = codegen::generate(&headers, &ctx, &i, &options)
        .unwrap()
        .emit();

    assert!(ir.contains("; ENTER statement return 22..36"), "{ir}");
    assert!(ir.contains("; ENTER value unbox 29..36"), "{ir}");
    assert!(ir.contains("; ENTER value integer 35..36"), "{ir}");
    assert!(ir.contains("; EXIT statement return 22..36"), "{ir}");
}

#[test]
fn target_triple_is_emitted() {
    let mut i = Interner::with_capacity(16);
    let headers = parser::parse_program("fn f() -> void {}", &mut Vec::new(), &mut i).unwrap();
    let ctx = GlobalContext::preprocess(&headers, &i).unwrap();
    let options = Options {
        target_triple: Some("x86_64-pc-linux-gnu".into()),
        ..Options::default()
    };
    let ir = codegen::generate(&headers, &ctx, &i, &options)
        .unwrap()
        .emit();
    assert!(ir.contains("target triple = \"x86_64-pc-linux-gnu\""));
}

tree_tests!(
    use codegen;

    fn test_forward_reference() {
        let program = "fn g() -> unbox i32 { return f() } fn f() -> unbox i32 { return unbox 1 }";
        let contains = &["call i32 () @acorn_coded__f_op__cl___unbox_i32()"];
    }

    fn test_arrays() {
        let program = "
            fn f() -> i32 {
                a = [1, 2, 3]
                n = a.length
                return a[1]
            }
        ";
        let contains = &[
            "@malloc(i64 24)",
            "insertvalue { i64, ptr } undef, i64 3, 0",
            "load { i64, ptr }, ptr",
            "extractvalue { i64, ptr }",
            "getelementptr ptr, ptr",
        ];
    }

    fn test_struct_field_offsets() {
        let program = "
            fn f(a unbox i32, b unbox i64, c unbox libc::ptr) -> void {
                s = {a unbox i32 = a, b unbox i64 = b, c unbox libc::ptr = c}
                s.b = b
            }
        ";
        let contains = &["getelementptr { i32, i64, ptr }, ptr", "i32 0, i32 1"];
    }

    fn test_varargs_extern() {
        let program = r#"
            @varargs
            @mangle_as("printf")
            fn printf(fmt unbox libc::ptr) -> unbox i32
            fn main() -> void {
                printf(c"%d\n", unbox 7)
            }
        "#;
        let contains = &[
            "declare i32 @printf(ptr, ...)",
            r#"c"%d\0A\00""#,
            "call i32 (ptr, ...) @printf(",
        ];
    }

    fn test_extern_malloc_is_not_declared_twice() {
        let program = r#"
            @mangle_as("malloc")
            fn malloc(size unbox i64) -> unbox libc::ptr
            fn f() -> i32 { return 1 }
        "#;
        let contains = &["declare ptr @malloc(i64)\n\ndefine"];
    }

    fn test_locals_shadow_functions() {
        let program = "fn f() -> void {} fn g(f i32) -> i32 { return f }";
        let contains = &["define ptr @acorn_coded__g_op_i32_cl___i32(ptr %p0)"];
    }

    fn test_boxed_struct_field_read() {
        let program = "
            type Point = {x unbox i32, y unbox i32}
            fn f(p Point) -> unbox i32 { return p.y }
        ";
        let contains = &["getelementptr { i32, i32 }, ptr", "load i32, ptr"];
    }

    fn test_statements_after_return() {
        let program = "fn f() -> void { return f() x = 2 }";
        let contains = &["  ret void\ndead0:\n"];
    }

    fn test_error_wrong_return_type() {
        let program = r#"fn main() -> i32 { return box(c"hi") }"#;
        let expected_errors = &["26..36: Expected types `i32`, found type `libc::ptr`."];
    }

    fn test_error_unknown_variable() {
        let program = "fn main() -> i32 { return y }";
        let expected_errors = &["26..27: Variable `y` does not exist."];
    }

    fn test_error_store_changes_type() {
        let program = r#"fn main() -> void { x = 1 x = c"s" }"#;
        let expected_errors = &["30..34: Expected types `i32`, found type `unbox libc::ptr`."];
    }

    fn test_error_unknown_field() {
        let program = "fn main() -> void { p = {x i32 = 1} p.y = 2 }";
        let expected_errors = &["38..39: Field `y` was not found on type `{x: i32}`."];
    }

    fn test_error_subscript_integer() {
        let program = "fn main() -> void { x = 1 x[0] }";
        let expected_errors = &["26..27: Type `i32` does not support subscripting."];
    }

    fn test_error_store_to_literal() {
        let program = "fn main() -> void { 1 = 2 }";
        let expected_errors = &["20..21: Type `i32` can not be pathed into."];
    }

    fn test_error_store_to_length() {
        let program = "fn main() -> void { a = [1] a.length = a.length }";
        let expected_errors = &["28..36: Type `i64` can not be pathed into."];
    }

    fn test_error_pointer_arithmetic() {
        let program = r#"fn main() -> void { x = c"a" + c"b" }"#;
        let expected_errors = &["24..35: Type `unbox libc::ptr` does not support arithmetic."];
    }

    fn test_error_argument_count() {
        let program = "fn f(a i32) -> void {} fn main() -> void { f() }";
        let expected_errors = &["43..46: Expected 1 argument(s), found 0."];
    }

    fn test_error_call_integer() {
        let program = "fn main() -> void { x = 1 x() }";
        let expected_errors = &["26..27: Type `i32` can not be called."];
    }

    fn test_error_missing_return() {
        let program = "fn f() -> i32 { x = 1 }";
        let expected_errors = &["3..4: Expected types `i32`, found type `void`."];
    }

    fn test_error_duplicate_parameter() {
        let program = "fn f(a i32, a i32) -> void {}";
        let expected_errors = &["12..13: `a` is already defined."];
    }

    fn test_error_string_literal() {
        let program = r#"fn f() -> void { x = "s" }"#;
        let expected_errors = &["21..24: String literals are not yet supported."];
    }

    fn test_error_duplicate_function() {
        let program = "fn f() -> void {} fn f() -> void {}";
        let expected_errors = &["21..22: `f` is already defined."];
    }

    fn test_error_unknown_parameter_type() {
        let program = "fn f(x Foo) -> void {} fn main() -> i32 { return 0 }";
        let expected_errors = &["7..10: Unknown type `Foo`."];
    }

    fn test_error_unknown_return_type() {
        let program = "fn f() -> Foo";
        let expected_errors = &["10..13: Unknown type `Foo`."];
    }

    fn test_error_unknown_type_in_alias() {
        let program = "type Pair = {a i32, b [Missing]}";
        let expected_errors = &["12..32: Unknown type `Missing`."];
    }

    fn test_error_clashing_symbols() {
        let program = r#"
            @mangle_as("printf") fn printf(f unbox libc::ptr) -> unbox i32
            @varargs @mangle_as("printf") fn p() -> unbox i32
        "#;
        let expected_errors = &["121..122: `p` is already defined."];
    }

    fn test_error_store_void() {
        let program = "fn f() -> void {} fn g() -> void { x = f() }";
        let expected_errors = &["39..42: Expression of type `void` has no value."];
    }
);
