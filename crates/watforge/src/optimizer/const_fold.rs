//! Constant folding.
//!
//! Rewrites `Binary(Const, Const)` and integer `Unary(Const)` into a single
//! `Const`, bottom-up, so nested constant trees collapse completely.
//!
//! Concrete integers fold with wasm semantics (wrapping arithmetic, shift
//! counts masked by width). Two generic literals fold only when the result
//! cannot depend on the width they are later narrowed to, which rules out
//! anything that could overflow 32 bits.
//!
//! Operations that trap at runtime are never folded: division or remainder
//! by zero and signed `MIN / -1`. Float operations are left alone.

use crate::ir::{BinaryOp, Instr, InstrSeq, IrValue, Literal, UnaryOp};

/// Fold every constant subtree of `seq`.
pub fn fold_seq(seq: InstrSeq) -> InstrSeq {
    seq.map(&mut fold)
}

/// Fold `instr` and its descendants.
pub fn fold(instr: Instr) -> Instr {
    let instr = instr.map_children(&mut fold);
    match &instr {
        Instr::Binary { op, lhs, rhs } => match (lhs.as_ref(), rhs.as_ref()) {
            (Instr::Const(a), Instr::Const(b)) => match try_eval_binop(*op, *a, *b) {
                Some(lit) => Instr::Const(lit),
                None => instr,
            },
            _ => instr,
        },
        Instr::Unary { op, operand } => match operand.as_ref() {
            Instr::Const(Literal::Typed(v)) => match try_eval_unop(*op, *v) {
                Some(value) => Instr::from(value),
                None => instr,
            },
            _ => instr,
        },
        _ => instr,
    }
}

fn try_eval_binop(op: BinaryOp, lhs: Literal, rhs: Literal) -> Option<Literal> {
    match (lhs, rhs) {
        (Literal::Typed(IrValue::I32(a)), Literal::Typed(IrValue::I32(b))) => {
            eval_i32(op, a, b).map(|v| Literal::Typed(IrValue::I32(v)))
        }
        (Literal::Typed(IrValue::I64(a)), Literal::Typed(IrValue::I64(b))) => {
            eval_i64(op, a, b).map(|v| {
                // comparisons yield i32 even for i64 operands
                if op.is_comparison() {
                    Literal::Typed(IrValue::I32(v as i32))
                } else {
                    Literal::Typed(IrValue::I64(v))
                }
            })
        }
        (Literal::Int(a), Literal::Int(b)) => eval_generic(op, a, b).map(Literal::Int),
        _ => None,
    }
}

fn flag(b: bool) -> i32 {
    i32::from(b)
}

fn eval_i32(op: BinaryOp, a: i32, b: i32) -> Option<i32> {
    let (ua, ub) = (a as u32, b as u32);
    let v = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        // checked_div is None on zero and on MIN / -1
        BinaryOp::DivS => a.checked_div(b)?,
        BinaryOp::DivU => ua.checked_div(ub)? as i32,
        BinaryOp::RemS => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        BinaryOp::RemU => ua.checked_rem(ub)? as i32,
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl => a.wrapping_shl(ub & 31),
        BinaryOp::ShrS => a.wrapping_shr(ub & 31),
        BinaryOp::ShrU => ua.wrapping_shr(ub & 31) as i32,
        BinaryOp::Rotl => ua.rotate_left(ub & 31) as i32,
        BinaryOp::Rotr => ua.rotate_right(ub & 31) as i32,
        BinaryOp::Eq => flag(a == b),
        BinaryOp::Ne => flag(a != b),
        BinaryOp::LtS => flag(a < b),
        BinaryOp::LtU => flag(ua < ub),
        BinaryOp::GtS => flag(a > b),
        BinaryOp::GtU => flag(ua > ub),
        BinaryOp::LeS => flag(a <= b),
        BinaryOp::LeU => flag(ua <= ub),
        BinaryOp::GeS => flag(a >= b),
        BinaryOp::GeU => flag(ua >= ub),
        _ => return None,
    };
    Some(v)
}

fn eval_i64(op: BinaryOp, a: i64, b: i64) -> Option<i64> {
    let (ua, ub) = (a as u64, b as u64);
    let v = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::DivS => a.checked_div(b)?,
        BinaryOp::DivU => ua.checked_div(ub)? as i64,
        BinaryOp::RemS => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        BinaryOp::RemU => ua.checked_rem(ub)? as i64,
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl => a.wrapping_shl((ub & 63) as u32),
        BinaryOp::ShrS => a.wrapping_shr((ub & 63) as u32),
        BinaryOp::ShrU => ua.wrapping_shr((ub & 63) as u32) as i64,
        BinaryOp::Rotl => ua.rotate_left((ub & 63) as u32) as i64,
        BinaryOp::Rotr => ua.rotate_right((ub & 63) as u32) as i64,
        BinaryOp::Eq => i64::from(a == b),
        BinaryOp::Ne => i64::from(a != b),
        BinaryOp::LtS => i64::from(a < b),
        BinaryOp::LtU => i64::from(ua < ub),
        BinaryOp::GtS => i64::from(a > b),
        BinaryOp::GtU => i64::from(ua > ub),
        BinaryOp::LeS => i64::from(a <= b),
        BinaryOp::LeU => i64::from(ua <= ub),
        BinaryOp::GeS => i64::from(a >= b),
        BinaryOp::GeU => i64::from(ua >= ub),
        _ => return None,
    };
    Some(v)
}

/// Width-independent folding of two generic literals.
///
/// Only add, sub, mul and the bitwise ops on non-negative values, and only
/// while the result stays inside the signed 32-bit range.
fn eval_generic(op: BinaryOp, a: i64, b: i64) -> Option<i64> {
    let v = match op {
        BinaryOp::Add => a.checked_add(b)?,
        BinaryOp::Sub => a.checked_sub(b)?,
        BinaryOp::Mul => a.checked_mul(b)?,
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor if a >= 0 && b >= 0 => match op {
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            _ => a ^ b,
        },
        _ => return None,
    };
    i32::try_from(v).ok().map(i64::from)
}

fn try_eval_unop(op: UnaryOp, value: IrValue) -> Option<IrValue> {
    match (op, value) {
        (UnaryOp::Clz, IrValue::I32(v)) => Some(IrValue::I32(v.leading_zeros() as i32)),
        (UnaryOp::Ctz, IrValue::I32(v)) => Some(IrValue::I32(v.trailing_zeros() as i32)),
        (UnaryOp::Popcnt, IrValue::I32(v)) => Some(IrValue::I32(v.count_ones() as i32)),
        (UnaryOp::Eqz, IrValue::I32(v)) => Some(IrValue::I32(flag(v == 0))),
        (UnaryOp::Clz, IrValue::I64(v)) => Some(IrValue::I64(i64::from(v.leading_zeros()))),
        (UnaryOp::Ctz, IrValue::I64(v)) => Some(IrValue::I64(i64::from(v.trailing_zeros()))),
        (UnaryOp::Popcnt, IrValue::I64(v)) => Some(IrValue::I64(i64::from(v.count_ones()))),
        (UnaryOp::Eqz, IrValue::I64(v)) => Some(IrValue::I32(flag(v == 0))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{VarRef, WasmType};

    #[test]
    fn test_fold_i32_arithmetic_wraps() {
        let instr = Instr::add(Instr::i32(i32::MAX), Instr::i32(1)).unwrap();
        assert_eq!(fold(instr), Instr::i32(i32::MIN));
    }

    #[test]
    fn test_fold_nested_tree() {
        let instr = Instr::mul(
            Instr::add(Instr::i64(2), Instr::i64(3)).unwrap(),
            Instr::sub(Instr::i64(10), Instr::i64(4)).unwrap(),
        )
        .unwrap();
        assert_eq!(fold(instr), Instr::i64(30));
    }

    #[test]
    fn test_fold_keeps_variables() {
        let x = VarRef::local("x", WasmType::I32);
        let instr = Instr::add(&x, Instr::add(Instr::i32(1), Instr::i32(2)).unwrap()).unwrap();
        assert_eq!(fold(instr), Instr::add(&x, Instr::i32(3)).unwrap());
    }

    #[test]
    fn test_no_fold_on_trapping_division() {
        let div0 = Instr::binary(BinaryOp::DivS, Instr::i32(7), Instr::i32(0)).unwrap();
        assert_eq!(fold(div0.clone()), div0);

        let overflow =
            Instr::binary(BinaryOp::DivS, Instr::i32(i32::MIN), Instr::i32(-1)).unwrap();
        assert_eq!(fold(overflow.clone()), overflow);

        let rem = Instr::binary(BinaryOp::RemS, Instr::i32(i32::MIN), Instr::i32(-1)).unwrap();
        assert_eq!(fold(rem), Instr::i32(0));
    }

    #[test]
    fn test_fold_shift_masks_count() {
        let shl = Instr::binary(BinaryOp::Shl, Instr::i32(1), Instr::i32(33)).unwrap();
        assert_eq!(fold(shl), Instr::i32(2));
        let shr = Instr::binary(BinaryOp::ShrU, Instr::i64(-1), Instr::i64(60)).unwrap();
        assert_eq!(fold(shr), Instr::i64(15));
    }

    #[test]
    fn test_i64_comparison_folds_to_i32() {
        let cmp = Instr::binary(BinaryOp::LtU, Instr::i64(-1), Instr::i64(1)).unwrap();
        assert_eq!(fold(cmp), Instr::i32(0));
    }

    #[test]
    fn test_generic_folding_stays_generic() {
        let instr = Instr::add(Instr::mul(2, 3).unwrap(), 1).unwrap();
        assert_eq!(fold(instr), Instr::int(7));

        let big = Instr::mul(Instr::int(1 << 20), Instr::int(1 << 20)).unwrap();
        assert_eq!(fold(big.clone()), big);
    }

    #[test]
    fn test_floats_are_not_folded() {
        let instr = Instr::add(Instr::f64(0.1), Instr::f64(0.2)).unwrap();
        assert_eq!(fold(instr.clone()), instr);
    }

    #[test]
    fn test_unary_folding() {
        let eqz = Instr::unary(UnaryOp::Eqz, Instr::i64(0)).unwrap();
        assert_eq!(fold(eqz), Instr::i32(1));
        let clz = Instr::unary(UnaryOp::Clz, Instr::i32(1)).unwrap();
        assert_eq!(fold(clz), Instr::i32(31));
    }

    #[test]
    fn test_fold_inside_sequences() {
        let x = VarRef::local("x", WasmType::I32);
        let seq = InstrSeq::new(vec![
            x.set(Instr::add(Instr::i32(20), Instr::i32(22)).unwrap())
                .unwrap(),
            x.get(),
        ]);
        let folded = fold_seq(seq);
        assert_eq!(folded.instructions()[0], x.set(Instr::i32(42)).unwrap());
    }
}
