//! Compile orchestration: platform setup, the resolver phases, IR
//! emission, layout, and diagnostic rendering.

use std::rc::Rc;

use ember_ast::{expr::ExprKind, Expr};
use ember_link::Linker;
use ember_lower::IrBuilder;
use ember_platform::Mos6502;
use ember_reporting::render;
use ember_sema::{Platform, Sema};
use ember_source::{identifier::Identifier, string::InternedStr, SourceLocation, SourceMap, Span};

/// Compile a program and return the stored banks' byte images, or `Err`
/// after rendering diagnostics.
pub fn compile(
    sources: SourceMap,
    program: &ember_ast::Stmt,
    defines: &[String],
) -> Result<Vec<(String, Vec<u8>)>, ()> {
    let mut sema = Sema::new(sources);

    let mut platform = Mos6502::new();
    platform.reserve_definitions(&mut sema);
    sema.install_platform(Rc::new(platform));

    for define in defines {
        let (key, value) = parse_define(define);
        sema.add_define(key, value);
    }

    let succeeded = sema.resolve_program(program)
        && {
            let mut builder = IrBuilder::new(&mut sema);
            if builder.emit_program(program) {
                let ir = builder.finish();
                Linker::new(&mut sema, ir).link()
            } else {
                false
            }
        };

    let mut stderr = std::io::stderr();
    let _ = render::write_all(&sema.reporter, &sema.sources, &mut stderr);
    if !succeeded {
        return Err(());
    }

    let banks = sema
        .banks
        .iter()
        .filter(|bank| bank.kind().is_stored())
        .map(|bank| (bank.name().name(), bank.data().to_vec()))
        .collect();
    Ok(banks)
}

/// `KEY` defines as boolean true; `KEY=n` as an integer literal.
fn parse_define(define: &str) -> (Identifier, Expr) {
    let location = SourceLocation::new(Span::empty(), 0usize.into());
    match define.split_once('=') {
        Some((key, value)) => {
            let kind = match value.parse::<i128>() {
                Ok(number) => ExprKind::IntegerLiteral(number),
                Err(_) => ExprKind::StringLiteral(InternedStr::intern(value.as_bytes())),
            };
            (Identifier::from(key), Expr::new(kind, location))
        }
        None => (Identifier::from(define), Expr::new(ExprKind::BooleanLiteral(true), location)),
    }
}
