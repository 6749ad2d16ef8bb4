use std::io::Write;

use crate::{ast::*, util::intern::Interner};

const INDENT_WIDTH: usize = 2;

pub fn print_headers_string(idents: &Interner<str>, headers: &[Header]) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_headers(&mut buf, idents, headers).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_expr_string(idents: &Interner<str>, expr: &Expr) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, idents, 0, expr).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_headers(
    w: &mut impl Write,
    idents: &Interner<str>,
    headers: &[Header],
) -> std::io::Result<()> {
    for header in headers {
        match header {
            Header::Function(function) => print_function(w, idents, 0, function)?,
            Header::TypeAlias(TypeAlias {
                name,
                ty,
                annotations,
                ..
            }) => {
                print_annotations(w, idents, 0, annotations)?;
                writeln!(w, "type {} = {}", idents.get(name), ty.write(idents))?;
            }
        }
    }
    Ok(())
}

fn print_annotations(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    annotations: &[Annotation],
) -> std::io::Result<()> {
    for annotation in annotations {
        sp(w, i)?;
        writeln!(w, "@{}", idents.get(annotation.name))?;
        for arg in &annotation.args {
            print_expr(w, idents, i + 1, arg)?;
        }
    }
    Ok(())
}

fn print_function(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    function: &Function,
) -> std::io::Result<()> {
    print_annotations(w, idents, i, &function.annotations)?;
    sp(w, i)?;
    write!(w, "fn {}(", idents.get(function.name))?;
    for (idx, param) in function.params.iter().enumerate() {
        if idx > 0 {
            write!(w, ", ")?;
        }
        write!(w, "{}: {}", idents.get(param.name), param.ty.write(idents))?;
    }
    write!(w, ") -> {}", function.return_ty.write(idents))?;
    let Some(body) = &function.body else {
        return writeln!(w, " extern");
    };
    writeln!(w)?;
    for stmt in body {
        print_stmt(w, idents, i + 1, stmt)?;
    }
    Ok(())
}

fn print_stmt(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    stmt: &Stmt,
) -> std::io::Result<()> {
    sp(w, i)?;
    match &stmt.kind {
        StmtKind::Return(value) => {
            writeln!(w, "return ({})", stmt.span)?;
            if let Some(value) = value {
                print_expr(w, idents, i + 1, value)?;
            }
        }
        StmtKind::Store { target, value } => {
            writeln!(w, "store ({})", stmt.span)?;
            print_expr(w, idents, i + 1, target)?;
            print_expr(w, idents, i + 1, value)?;
        }
        StmtKind::Expr(expr) => {
            writeln!(w, "eval ({})", stmt.span)?;
            print_expr(w, idents, i + 1, expr)?;
        }
    }
    Ok(())
}

fn print_expr(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    expr: &Expr,
) -> std::io::Result<()> {
    sp(w, i)?;
    let span = expr.span;
    match &expr.kind {
        ExprKind::Variable(name) => writeln!(w, "ident {} ({span})", idents.get(name))?,
        ExprKind::Integer(value) => writeln!(w, "int {value} ({span})")?,
        ExprKind::CString(text) => writeln!(w, "cstring {text:?} ({span})")?,
        ExprKind::String(text) => writeln!(w, "string {text:?} ({span})")?,
        ExprKind::Invocation { callee, args } => {
            writeln!(w, "call ({span})")?;
            print_expr(w, idents, i + 1, callee)?;
            for arg in args {
                print_expr(w, idents, i + 1, arg)?;
            }
        }
        ExprKind::Addition { lhs, rhs } => {
            writeln!(w, "add ({span})")?;
            print_expr(w, idents, i + 1, lhs)?;
            print_expr(w, idents, i + 1, rhs)?;
        }
        ExprKind::Box(inner) => {
            writeln!(w, "box ({span})")?;
            print_expr(w, idents, i + 1, inner)?;
        }
        ExprKind::Unbox(inner) => {
            writeln!(w, "unbox ({span})")?;
            print_expr(w, idents, i + 1, inner)?;
        }
        ExprKind::FieldAccess { base, field } => {
            writeln!(w, "field {} ({span})", idents.get(field))?;
            print_expr(w, idents, i + 1, base)?;
        }
        ExprKind::Subscript { base, index } => {
            writeln!(w, "subscript ({span})")?;
            print_expr(w, idents, i + 1, base)?;
            print_expr(w, idents, i + 1, index)?;
        }
        ExprKind::StructLiteral(fields) => {
            writeln!(w, "struct ({span})")?;
            for FieldInit { name, ty, value } in fields {
                sp(w, i + 1)?;
                writeln!(w, "field {}: {}", idents.get(name), ty.write(idents))?;
                print_expr(w, idents, i + 2, value)?;
            }
        }
        ExprKind::ArrayLiteral(elements) => {
            writeln!(w, "array ({span})")?;
            for element in elements {
                print_expr(w, idents, i + 1, element)?;
            }
        }
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{}", " ".repeat(i * INDENT_WIDTH))
}
