//! Instruction rendering.
//!
//! Operands are emitted before the instruction that consumes them (linear
//! stack order). Blocks, loops and conditionals use the folded form so every
//! nested body sits one level deeper and ends with its own `)` line.

use super::utils::Emitter;
use crate::backend::Backend;
use crate::ir::*;

/// Concrete value for a literal.
///
/// Expansion narrows every generic literal before rendering; one that
/// slips through renders as `i32` when it fits and `i64` otherwise.
fn literal_value(lit: &Literal) -> IrValue {
    match *lit {
        Literal::Typed(v) => v,
        Literal::Int(v) => match i32::try_from(v) {
            Ok(small) => IrValue::I32(small),
            Err(_) => IrValue::I64(v),
        },
    }
}

fn operand_width(instr: &Instr) -> WasmType {
    instr
        .operand_type()
        .and_then(|t| t.concrete())
        .unwrap_or(WasmType::I32)
}

/// Render every instruction of `seq` at the emitter's current level.
pub fn emit_seq<B: Backend>(backend: &B, out: &mut Emitter, seq: &InstrSeq) {
    for instr in seq {
        emit_instr(backend, out, instr);
    }
}

/// Render one instruction and its operands.
pub fn emit_instr<B: Backend>(backend: &B, out: &mut Emitter, instr: &Instr) {
    match instr {
        Instr::Const(lit) => out.push_line(backend.emit_const(&literal_value(lit))),
        Instr::Binary { op, lhs, rhs } => {
            emit_instr(backend, out, lhs);
            emit_instr(backend, out, rhs);
            out.push_line(backend.emit_binop(*op, operand_width(instr)));
        }
        Instr::Unary { op, operand } => {
            emit_instr(backend, out, operand);
            out.push_line(backend.emit_unop(*op, operand_width(instr)));
        }
        Instr::Convert { op, operand } => {
            emit_instr(backend, out, operand);
            out.push_line(backend.emit_convert(*op));
        }
        Instr::Load { arg, address } => {
            emit_instr(backend, out, address);
            out.push_line(backend.emit_load(arg));
        }
        Instr::Store {
            arg,
            address,
            value,
        } => {
            emit_instr(backend, out, address);
            emit_instr(backend, out, value);
            out.push_line(backend.emit_store(arg));
        }
        Instr::Get(var) => out.push_line(backend.emit_get(var)),
        Instr::Set { var, value } => {
            emit_instr(backend, out, value);
            out.push_line(backend.emit_set(var));
        }
        Instr::Tee { var, value } => {
            emit_instr(backend, out, value);
            out.push_line(backend.emit_tee(var));
        }
        Instr::Call { name, args, .. } => {
            for arg in args {
                emit_instr(backend, out, arg);
            }
            out.push_line(backend.emit_call(name));
        }
        Instr::Raw { text, .. } => out.push_lines(text),
        // only reachable for trees that never went through expansion
        Instr::Str(_) => out.push_line(backend.emit_const_ref(0)),
        Instr::ConstRef { offset, .. } => out.push_line(backend.emit_const_ref(*offset)),
        Instr::Block(block) => emit_labeled(
            backend,
            out,
            LabelKind::Block,
            block.label(),
            block.result(),
            block.body(),
        ),
        Instr::Loop(lp) => emit_labeled(
            backend,
            out,
            LabelKind::Loop,
            lp.label(),
            lp.result(),
            lp.body(),
        ),
        Instr::If(node) => emit_if(backend, out, node),
        Instr::Branch(br) => {
            if let Some(cond) = br.condition() {
                emit_instr(backend, out, cond);
            }
            out.push_line(backend.emit_branch(br.label(), br.is_conditional()));
        }
        Instr::Return(value) => {
            if let Some(value) = value {
                emit_instr(backend, out, value);
            }
            out.push_line(backend.emit_return());
        }
        Instr::Drop(value) => {
            emit_instr(backend, out, value);
            out.push_line(backend.emit_drop());
        }
        Instr::Nop => out.push_line(backend.emit_nop()),
        Instr::Unreachable => out.push_line(backend.emit_unreachable()),
        Instr::Seq(seq) => emit_seq(backend, out, seq),
    }
}

fn emit_labeled<B: Backend>(
    backend: &B,
    out: &mut Emitter,
    kind: LabelKind,
    label: &str,
    result: Option<WasmType>,
    body: &InstrSeq,
) {
    out.push_line(backend.emit_label_open(kind, label, result));
    out.indent();
    emit_seq(backend, out, body);
    out.dedent();
    out.push_line(backend.emit_close());
}

fn emit_if<B: Backend>(backend: &B, out: &mut Emitter, node: &IfElse) {
    emit_instr(backend, out, node.condition());
    out.push_line(backend.emit_if_open(node.result()));
    out.indent();

    out.push_line(backend.emit_then_open());
    out.indent();
    emit_seq(backend, out, node.then_body());
    out.dedent();
    out.push_line(backend.emit_close());

    if let Some(else_body) = node.else_body() {
        out.push_line(backend.emit_else_open());
        out.indent();
        emit_seq(backend, out, else_body);
        out.dedent();
        out.push_line(backend.emit_close());
    }

    out.dedent();
    out.push_line(backend.emit_close());
}
