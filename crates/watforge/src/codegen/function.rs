//! Function rendering.

use super::instruction::emit_seq;
use super::types::{format_export, format_result};
use super::utils::Emitter;
use crate::backend::Backend;
use crate::ir::*;

/// Header line: `(func $name (export "name") (param $p i32) (result i32)`.
fn func_header<B: Backend>(backend: &B, func: &FuncDef) -> String {
    let mut parts = vec![format!("(func ${}", func.name())];
    if let Some(export) = func.export_name() {
        parts.push(format_export(backend, export));
    }
    for param in func.params() {
        parts.push(format!("(param ${} {})", param.name(), param.ty()));
    }
    parts.extend(format_result(func.result_type()));
    parts.join(" ")
}

/// Emit a complete function definition at the emitter's current level.
pub fn emit_function<B: Backend>(backend: &B, out: &mut Emitter, func: &FuncDef) {
    out.push_line(func_header(backend, func));
    out.indent();
    for local in func.locals() {
        out.push_line(format!("(local ${} {})", local.name(), local.ty()));
    }
    emit_seq(backend, out, func.body());
    out.dedent();
    out.push_line(backend.emit_close());
}
