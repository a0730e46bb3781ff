//! Module-level code generation.
//!
//! Sections are emitted in declaration order: types, imports, globals,
//! memory, constant pool data, user data, table, functions.

use super::function::emit_function;
use super::instruction::emit_instr;
use super::types::{format_export, format_func_type, format_global_type};
use super::utils::Emitter;
use crate::backend::Backend;
use crate::ir::*;
use log::debug;

/// Render a whole module record as one document.
pub fn generate_module<B: Backend>(backend: &B, record: &ModuleRecord, step: usize) -> String {
    let mut out = Emitter::new(step, 0);
    match record.identifier() {
        Some(id) => out.push_line(format!("(module ${id}")),
        None => out.push_line("(module"),
    }
    out.indent();

    for ty in record.types() {
        out.push_line(format!(
            "(type ${} {})",
            ty.name,
            format_func_type(None, &ty.signature)
        ));
    }

    for import in record.imports() {
        out.push_line(format!(
            "(import {} {} {})",
            backend.emit_data_string(import.module.as_bytes()),
            backend.emit_data_string(import.name.as_bytes()),
            format_func_type(Some(&import.id), &import.signature)
        ));
    }

    for global in record.globals() {
        out.push_line(global_line(backend, global));
    }

    if let Some(memory) = record.memory() {
        if memory.exported {
            out.push_line(format!(
                "(memory {} {})",
                format_export(backend, "memory"),
                memory.pages
            ));
        } else {
            out.push_line(format!("(memory {})", memory.pages));
        }
    }

    for entry in record.pool().entries() {
        out.push_line(data_line(backend, entry.offset, &entry.bytes));
    }
    for segment in record.data_segments() {
        out.push_line(data_line(backend, segment.offset, &segment.data));
    }

    if record.has_table() {
        out.push_line(format!("(table {} funcref)", record.table_size()));
    }

    for func in record.functions() {
        emit_function(backend, &mut out, func);
    }

    out.dedent();
    out.push_line(backend.emit_close());

    debug!(
        "rendered module `{}` ({} functions, {} data entries)",
        record.name(),
        record.functions().len(),
        record.pool().len() + record.data_segments().len()
    );
    out.finish()
}

/// `(global $g (export "g") (mut i32) (i32.const 0))`
///
/// Each initializer instruction is wrapped in its own parentheses.
fn global_line<B: Backend>(backend: &B, global: &GlobalDef) -> String {
    let mut parts = vec![format!("(global ${}", global.name)];
    if global.exported {
        parts.push(format_export(backend, &global.name));
    }
    parts.push(format_global_type(global.ty, global.mutable));

    let mut init = Emitter::new(0, 0);
    for instr in &global.init {
        emit_instr(backend, &mut init, instr);
    }
    let init = init.finish();
    for line in init.lines() {
        parts.push(format!("({line})"));
    }
    format!("{})", parts.join(" "))
}

fn data_line<B: Backend>(backend: &B, offset: u32, bytes: &[u8]) -> String {
    format!(
        "(data (i32.const {offset}) {})",
        backend.emit_data_string(bytes)
    )
}
