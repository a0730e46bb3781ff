//! Code generation backends.
//!
//! A backend turns individual IR operations into single lines of text. The
//! code generator owns layout (nesting, indentation, ordering); the backend
//! only knows the instruction syntax.

mod wat;
pub use wat::WatBackend;

use crate::ir::*;

/// Code generation backend trait.
///
/// Every `emit_*` method returns one line without indentation or newline.
pub trait Backend {
    /// Emit a typed constant.
    fn emit_const(&self, value: &IrValue) -> String;

    /// Emit a binary operation on two operands of type `ty`.
    fn emit_binop(&self, op: BinaryOp, ty: WasmType) -> String;

    /// Emit a unary operation on an operand of type `ty`.
    fn emit_unop(&self, op: UnaryOp, ty: WasmType) -> String;

    fn emit_convert(&self, op: Conversion) -> String;

    /// Emit a memory load (full or sub-width).
    fn emit_load(&self, arg: &MemArg) -> String;

    /// Emit a memory store (full or sub-width).
    fn emit_store(&self, arg: &MemArg) -> String;

    fn emit_get(&self, var: &VarRef) -> String;

    fn emit_set(&self, var: &VarRef) -> String;

    fn emit_tee(&self, var: &VarRef) -> String;

    fn emit_call(&self, name: &str) -> String;

    /// Emit the address of an interned constant.
    fn emit_const_ref(&self, offset: u32) -> String;

    /// Emit `br` or `br_if` to a label.
    fn emit_branch(&self, label: &str, conditional: bool) -> String;

    fn emit_return(&self) -> String;

    fn emit_drop(&self) -> String;

    fn emit_nop(&self) -> String;

    fn emit_unreachable(&self) -> String;

    /// Opening line of a labeled block or loop.
    fn emit_label_open(&self, kind: LabelKind, label: &str, result: Option<WasmType>) -> String;

    /// Opening line of an `if`; the condition is already on the stack.
    fn emit_if_open(&self, result: Option<WasmType>) -> String;

    fn emit_then_open(&self) -> String;

    fn emit_else_open(&self) -> String;

    /// Closing line of any construct opened above.
    fn emit_close(&self) -> String;

    /// Quote a byte string for a data declaration.
    fn emit_data_string(&self, bytes: &[u8]) -> String;
}
