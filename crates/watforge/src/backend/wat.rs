//! WebAssembly text format backend.

use crate::backend::Backend;
use crate::ir::*;
use std::fmt::Write;

/// Format a float literal, handling NaN and infinity special values.
///
/// Finite values use the shortest representation that round-trips, which is
/// always valid WAT float syntax (`5.0`, `0.1`, `1e-7`). `nan` carries the
/// NaN mantissa, with `0` standing for the canonical one.
fn float_literal<F>(value: F, is_infinite: bool, negative: bool, nan: Option<u64>) -> String
where
    F: std::fmt::Debug,
{
    let sign = if negative { "-" } else { "" };
    match nan {
        Some(0) => format!("{sign}nan"),
        Some(payload) => format!("{sign}nan:0x{payload:x}"),
        None if is_infinite => format!("{sign}inf"),
        None => format!("{value:?}"),
    }
}

const F32_MANTISSA: u32 = 0x007f_ffff;
const F32_CANONICAL_NAN: u32 = 0x0040_0000;
const F64_MANTISSA: u64 = 0x000f_ffff_ffff_ffff;
const F64_CANONICAL_NAN: u64 = 0x0008_0000_0000_0000;

/// `Some(0)` for a canonical NaN, `Some(mantissa)` for any other NaN.
fn f32_nan(v: f32) -> Option<u64> {
    let mantissa = match v.to_bits() & F32_MANTISSA {
        F32_CANONICAL_NAN => 0,
        other => other,
    };
    v.is_nan().then_some(u64::from(mantissa))
}

fn f64_nan(v: f64) -> Option<u64> {
    let mantissa = match v.to_bits() & F64_MANTISSA {
        F64_CANONICAL_NAN => 0,
        other => other,
    };
    v.is_nan().then_some(mantissa)
}

/// WAT text backend.
pub struct WatBackend;

impl WatBackend {
    pub fn new() -> Self {
        WatBackend
    }
}

impl Default for WatBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for WatBackend {
    fn emit_const(&self, value: &IrValue) -> String {
        match *value {
            IrValue::I32(v) => format!("i32.const {v}"),
            IrValue::I64(v) => format!("i64.const {v}"),
            IrValue::F32(v) => format!(
                "f32.const {}",
                float_literal(v, v.is_infinite(), v.is_sign_negative(), f32_nan(v))
            ),
            IrValue::F64(v) => format!(
                "f64.const {}",
                float_literal(v, v.is_infinite(), v.is_sign_negative(), f64_nan(v))
            ),
        }
    }

    fn emit_binop(&self, op: BinaryOp, ty: WasmType) -> String {
        format!("{ty}.{}", op.mnemonic())
    }

    fn emit_unop(&self, op: UnaryOp, ty: WasmType) -> String {
        format!("{ty}.{}", op.mnemonic())
    }

    fn emit_convert(&self, op: Conversion) -> String {
        op.name().to_string()
    }

    fn emit_load(&self, arg: &MemArg) -> String {
        let mut text = format!("{}.load", arg.ty);
        if let Some(bits) = arg.width.bits() {
            let suffix = match arg.sign {
                Some(SignExtension::Signed) => "s",
                _ => "u",
            };
            let _ = write!(text, "{bits}_{suffix}");
        }
        if arg.offset > 0 {
            let _ = write!(text, " offset={}", arg.offset);
        }
        text
    }

    fn emit_store(&self, arg: &MemArg) -> String {
        let mut text = format!("{}.store", arg.ty);
        if let Some(bits) = arg.width.bits() {
            let _ = write!(text, "{bits}");
        }
        if arg.offset > 0 {
            let _ = write!(text, " offset={}", arg.offset);
        }
        text
    }

    fn emit_get(&self, var: &VarRef) -> String {
        match var.scope() {
            Scope::Local => format!("local.get ${}", var.name()),
            Scope::Global => format!("global.get ${}", var.name()),
        }
    }

    fn emit_set(&self, var: &VarRef) -> String {
        match var.scope() {
            Scope::Local => format!("local.set ${}", var.name()),
            Scope::Global => format!("global.set ${}", var.name()),
        }
    }

    fn emit_tee(&self, var: &VarRef) -> String {
        format!("local.tee ${}", var.name())
    }

    fn emit_call(&self, name: &str) -> String {
        format!("call ${name}")
    }

    fn emit_const_ref(&self, offset: u32) -> String {
        format!("i32.const {offset}")
    }

    fn emit_branch(&self, label: &str, conditional: bool) -> String {
        if conditional {
            format!("br_if ${label}")
        } else {
            format!("br ${label}")
        }
    }

    fn emit_return(&self) -> String {
        "return".to_string()
    }

    fn emit_drop(&self) -> String {
        "drop".to_string()
    }

    fn emit_nop(&self) -> String {
        "nop".to_string()
    }

    fn emit_unreachable(&self) -> String {
        "unreachable".to_string()
    }

    fn emit_label_open(&self, kind: LabelKind, label: &str, result: Option<WasmType>) -> String {
        let keyword = match kind {
            LabelKind::Block => "block",
            LabelKind::Loop => "loop",
        };
        match result {
            Some(ty) => format!("({keyword} ${label} (result {ty})"),
            None => format!("({keyword} ${label}"),
        }
    }

    fn emit_if_open(&self, result: Option<WasmType>) -> String {
        match result {
            Some(ty) => format!("(if (result {ty})"),
            None => "(if".to_string(),
        }
    }

    fn emit_then_open(&self) -> String {
        "(then".to_string()
    }

    fn emit_else_open(&self) -> String {
        "(else".to_string()
    }

    fn emit_close(&self) -> String {
        ")".to_string()
    }

    fn emit_data_string(&self, bytes: &[u8]) -> String {
        let mut text = String::with_capacity(bytes.len() + 2);
        text.push('"');
        for &b in bytes {
            match b {
                b'"' => text.push_str("\\\""),
                b'\\' => text.push_str("\\\\"),
                b'\n' => text.push_str("\\n"),
                b'\t' => text.push_str("\\t"),
                b'\r' => text.push_str("\\r"),
                0x20..=0x7e => text.push(b as char),
                _ => {
                    let _ = write!(text, "\\{b:02x}");
                }
            }
        }
        text.push('"');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_constants() {
        let b = WatBackend::new();
        assert_eq!(b.emit_const(&IrValue::F32(5.0)), "f32.const 5.0");
        assert_eq!(b.emit_const(&IrValue::F64(0.1)), "f64.const 0.1");
        assert_eq!(b.emit_const(&IrValue::F32(f32::NAN)), "f32.const nan");
        assert_eq!(
            b.emit_const(&IrValue::F64(f64::NEG_INFINITY)),
            "f64.const -inf"
        );
        assert_eq!(b.emit_const(&IrValue::I64(-3)), "i64.const -3");
    }

    #[test]
    fn test_nan_payloads() {
        let b = WatBackend::new();
        assert_eq!(
            b.emit_const(&IrValue::F32(f32::from_bits(0x7fc0_0001))),
            "f32.const nan:0x400001"
        );
        assert_eq!(
            b.emit_const(&IrValue::F32(f32::from_bits(0xff80_0001))),
            "f32.const -nan:0x1"
        );
        assert_eq!(
            b.emit_const(&IrValue::F64(-f64::NAN)),
            "f64.const -nan"
        );
        assert_eq!(
            b.emit_const(&IrValue::F64(f64::from_bits(0x7ff0_0000_0000_002a))),
            "f64.const nan:0x2a"
        );
    }

    #[test]
    fn test_memory_access_forms() {
        let b = WatBackend::new();
        assert_eq!(b.emit_load(&MemArg::full(WasmType::F64)), "f64.load");
        let byte = MemArg::narrow(
            WasmType::I32,
            MemoryAccessWidth::I8,
            SignExtension::Unsigned,
        )
        .with_offset(4);
        assert_eq!(b.emit_load(&byte), "i32.load8_u offset=4");
        assert_eq!(b.emit_store(&byte), "i32.store8 offset=4");
        let word = MemArg::narrow(
            WasmType::I64,
            MemoryAccessWidth::I32,
            SignExtension::Signed,
        );
        assert_eq!(b.emit_load(&word), "i64.load32_s");
    }

    #[test]
    fn test_variable_access() {
        let b = WatBackend::new();
        let g = VarRef::global("count", WasmType::I32);
        let l = VarRef::local("i", WasmType::I64);
        assert_eq!(b.emit_get(&g), "global.get $count");
        assert_eq!(b.emit_set(&l), "local.set $i");
        assert_eq!(b.emit_tee(&l), "local.tee $i");
    }

    #[test]
    fn test_control_headers() {
        let b = WatBackend::new();
        assert_eq!(
            b.emit_label_open(LabelKind::Block, "exit", Some(WasmType::I32)),
            "(block $exit (result i32)"
        );
        assert_eq!(b.emit_label_open(LabelKind::Loop, "top", None), "(loop $top");
        assert_eq!(b.emit_if_open(None), "(if");
        assert_eq!(b.emit_branch("top", true), "br_if $top");
    }

    #[test]
    fn test_data_string_escaping() {
        let b = WatBackend::new();
        assert_eq!(b.emit_data_string(b"abc"), "\"abc\"");
        assert_eq!(
            b.emit_data_string(b"say \"hi\"\n\\"),
            "\"say \\\"hi\\\"\\n\\\\\""
        );
        assert_eq!(b.emit_data_string(&[0x00, 0x7f, 0xff]), "\"\\00\\7f\\ff\"");
    }
}
