//! Type and signature fragments for declarations.

use crate::backend::Backend;
use crate::ir::*;

/// `(param i32 i64)`, or nothing for an empty list.
pub fn format_params(params: &[WasmType]) -> Option<String> {
    if params.is_empty() {
        return None;
    }
    let names: Vec<String> = params.iter().map(|t| t.to_string()).collect();
    Some(format!("(param {})", names.join(" ")))
}

/// `(result i32)`, or nothing for no result.
pub fn format_result(ty: Option<WasmType>) -> Option<String> {
    ty.map(|t| format!("(result {t})"))
}

/// `(func (param ..) (result ..))` with an optional identifier.
pub fn format_func_type(id: Option<&str>, sig: &Signature) -> String {
    let mut parts = vec!["func".to_string()];
    if let Some(id) = id {
        parts.push(format!("${id}"));
    }
    parts.extend(format_params(&sig.params));
    parts.extend(format_result(sig.result));
    format!("({})", parts.join(" "))
}

/// `i32` or `(mut i32)`.
pub fn format_global_type(ty: WasmType, mutable: bool) -> String {
    if mutable {
        format!("(mut {ty})")
    } else {
        ty.to_string()
    }
}

/// `(export "name")`, with the name quoted like a data string.
pub fn format_export<B: Backend>(backend: &B, name: &str) -> String {
    format!("(export {})", backend.emit_data_string(name.as_bytes()))
}
