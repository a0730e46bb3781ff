//! Value types, literals, and the type lattice.
//!
//! Four concrete WebAssembly number types plus a generic integer literal
//! whose width is decided later by context. Narrowing only goes from generic
//! to concrete; two different concrete types never unify.

use crate::error::{CompileError, CompileResult};
use std::fmt;

/// WebAssembly number types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WasmType {
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for WasmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WasmType::I32 => write!(f, "i32"),
            WasmType::I64 => write!(f, "i64"),
            WasmType::F32 => write!(f, "f32"),
            WasmType::F64 => write!(f, "f64"),
        }
    }
}

impl WasmType {
    pub fn is_integer(&self) -> bool {
        matches!(self, WasmType::I32 | WasmType::I64)
    }

    pub fn is_float(&self) -> bool {
        !self.is_integer()
    }

    /// Size of a full-width value in linear memory.
    pub fn byte_width(&self) -> u32 {
        match self {
            WasmType::I32 | WasmType::F32 => 4,
            WasmType::I64 | WasmType::F64 => 8,
        }
    }

    /// The zero value of this type, used for implicit initializers.
    pub fn zero(&self) -> IrValue {
        match self {
            WasmType::I32 => IrValue::I32(0),
            WasmType::I64 => IrValue::I64(0),
            WasmType::F32 => IrValue::F32(0.0),
            WasmType::F64 => IrValue::F64(0.0),
        }
    }
}

/// Type of a value on the operand stack.
///
/// `IntLiteral` is a bare integer literal that has not met a typed context yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandType {
    Typed(WasmType),
    IntLiteral,
}

impl OperandType {
    pub fn concrete(&self) -> Option<WasmType> {
        match self {
            OperandType::Typed(ty) => Some(*ty),
            OperandType::IntLiteral => None,
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, OperandType::IntLiteral)
    }
}

impl From<WasmType> for OperandType {
    fn from(ty: WasmType) -> Self {
        OperandType::Typed(ty)
    }
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandType::Typed(ty) => write!(f, "{ty}"),
            OperandType::IntLiteral => write!(f, "integer literal"),
        }
    }
}

/// What an instruction or sequence leaves on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultType {
    /// Statements: stores, writes, branches.
    Empty,
    /// Exactly one value.
    Value(OperandType),
    /// Several instructions whose combined stack effect is not inferred.
    Unknown,
}

impl ResultType {
    pub fn typed(ty: WasmType) -> Self {
        ResultType::Value(OperandType::Typed(ty))
    }

    pub fn from_option(ty: Option<WasmType>) -> Self {
        match ty {
            Some(ty) => ResultType::typed(ty),
            None => ResultType::Empty,
        }
    }

    /// The single value type, if there is one.
    pub fn operand(&self) -> Option<OperandType> {
        match self {
            ResultType::Value(op) => Some(*op),
            _ => None,
        }
    }

    pub fn concrete(&self) -> Option<WasmType> {
        self.operand().and_then(|op| op.concrete())
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultType::Empty => write!(f, "no value"),
            ResultType::Value(op) => write!(f, "{op}"),
            ResultType::Unknown => write!(f, "an unknown stack effect"),
        }
    }
}

/// Unify two operand types for a binary operation.
///
/// - equal concrete types unify to themselves
/// - a generic literal takes on the other side's concrete type
/// - two generic literals stay generic
/// - different concrete types are a `TypeMismatch`
pub fn unify(context: &str, lhs: OperandType, rhs: OperandType) -> CompileResult<OperandType> {
    match (lhs, rhs) {
        (OperandType::Typed(a), OperandType::Typed(b)) if a == b => Ok(lhs),
        (OperandType::Typed(_), OperandType::Typed(_)) => Err(CompileError::TypeMismatch {
            context: context.to_string(),
            lhs,
            rhs,
        }),
        (OperandType::Typed(_), OperandType::IntLiteral) => Ok(lhs),
        (OperandType::IntLiteral, OperandType::Typed(_)) => Ok(rhs),
        (OperandType::IntLiteral, OperandType::IntLiteral) => Ok(OperandType::IntLiteral),
    }
}

/// Check that a value of `found` can be used where `expected` is required.
pub fn check_assignable(
    context: &str,
    expected: WasmType,
    found: OperandType,
) -> CompileResult<()> {
    unify(context, OperandType::Typed(expected), found).map(|_| ())
}

/// Constant value of a concrete type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IrValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl IrValue {
    pub fn wasm_type(&self) -> WasmType {
        match self {
            IrValue::I32(_) => WasmType::I32,
            IrValue::I64(_) => WasmType::I64,
            IrValue::F32(_) => WasmType::F32,
            IrValue::F64(_) => WasmType::F64,
        }
    }

    /// Give an integer literal a concrete type.
    ///
    /// i32 accepts the whole signed and unsigned 32-bit range (the unsigned
    /// half wraps, matching how `i32.const` reads it). Floats accept only
    /// integers they represent exactly.
    pub fn from_int(value: i64, ty: WasmType) -> CompileResult<IrValue> {
        match ty {
            WasmType::I32 => {
                if (i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&value) {
                    Ok(IrValue::I32(value as u32 as i32))
                } else {
                    Err(CompileError::LiteralOutOfRange { value, ty })
                }
            }
            WasmType::I64 => Ok(IrValue::I64(value)),
            // i128 so the saturating cast at 2^63 cannot pass for i64::MAX
            WasmType::F32 if (value as f32) as i128 == i128::from(value) => {
                Ok(IrValue::F32(value as f32))
            }
            WasmType::F64 if (value as f64) as i128 == i128::from(value) => {
                Ok(IrValue::F64(value as f64))
            }
            WasmType::F32 | WasmType::F64 => Err(CompileError::LiteralOutOfRange { value, ty }),
        }
    }
}

/// A literal as written by the front end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    /// Bare integer; width decided during expansion.
    Int(i64),
    Typed(IrValue),
}

impl Literal {
    pub fn operand_type(&self) -> OperandType {
        match self {
            Literal::Int(_) => OperandType::IntLiteral,
            Literal::Typed(v) => OperandType::Typed(v.wasm_type()),
        }
    }

    pub fn narrow(self, ty: WasmType) -> CompileResult<Literal> {
        match self {
            Literal::Int(v) => IrValue::from_int(v, ty).map(Literal::Typed),
            Literal::Typed(v) => {
                check_assignable("literal", ty, OperandType::Typed(v.wasm_type()))?;
                Ok(self)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [WasmType; 4] = [WasmType::I32, WasmType::I64, WasmType::F32, WasmType::F64];

    #[test]
    fn test_wasm_type_display() {
        assert_eq!(WasmType::I32.to_string(), "i32");
        assert_eq!(WasmType::I64.to_string(), "i64");
        assert_eq!(WasmType::F32.to_string(), "f32");
        assert_eq!(WasmType::F64.to_string(), "f64");
    }

    #[test]
    fn test_unify_same_concrete() {
        for ty in ALL {
            assert_eq!(unify("t", ty.into(), ty.into()), Ok(OperandType::Typed(ty)));
        }
    }

    #[test]
    fn test_unify_different_concrete_fails() {
        for a in ALL {
            for b in ALL {
                if a == b {
                    continue;
                }
                let err = unify("add", a.into(), b.into()).unwrap_err();
                assert!(matches!(err, CompileError::TypeMismatch { .. }), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_unify_generic_takes_concrete() {
        for ty in ALL {
            assert_eq!(
                unify("t", OperandType::IntLiteral, ty.into()),
                Ok(OperandType::Typed(ty))
            );
            assert_eq!(
                unify("t", ty.into(), OperandType::IntLiteral),
                Ok(OperandType::Typed(ty))
            );
        }
        assert_eq!(
            unify("t", OperandType::IntLiteral, OperandType::IntLiteral),
            Ok(OperandType::IntLiteral)
        );
    }

    #[test]
    fn test_from_int_i32_range() {
        assert_eq!(IrValue::from_int(5, WasmType::I32), Ok(IrValue::I32(5)));
        assert_eq!(IrValue::from_int(-1, WasmType::I32), Ok(IrValue::I32(-1)));
        assert_eq!(
            IrValue::from_int(0xFFFF_FFFF, WasmType::I32),
            Ok(IrValue::I32(-1))
        );
        assert!(matches!(
            IrValue::from_int(1 << 33, WasmType::I32),
            Err(CompileError::LiteralOutOfRange { .. })
        ));
    }

    #[test]
    fn test_from_int_float() {
        assert_eq!(IrValue::from_int(5, WasmType::F32), Ok(IrValue::F32(5.0)));
        assert_eq!(IrValue::from_int(-3, WasmType::F64), Ok(IrValue::F64(-3.0)));
        assert_eq!(
            IrValue::from_int(1 << 24, WasmType::F32),
            Ok(IrValue::F32(16_777_216.0))
        );
    }

    #[test]
    fn test_from_int_float_rejects_rounding() {
        assert_eq!(
            IrValue::from_int(16_777_217, WasmType::F32),
            Err(CompileError::LiteralOutOfRange {
                value: 16_777_217,
                ty: WasmType::F32
            })
        );
        assert!(IrValue::from_int((1 << 53) + 1, WasmType::F64).is_err());
        assert!(IrValue::from_int(i64::MAX, WasmType::F64).is_err());
        assert_eq!(
            IrValue::from_int(i64::MIN, WasmType::F64),
            Ok(IrValue::F64(-9_223_372_036_854_775_808.0))
        );
    }

    #[test]
    fn test_literal_narrow_typed_mismatch() {
        let lit = Literal::Typed(IrValue::I64(1));
        assert!(lit.narrow(WasmType::I64).is_ok());
        assert!(matches!(
            lit.narrow(WasmType::I32),
            Err(CompileError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_result_type_concrete() {
        assert_eq!(ResultType::typed(WasmType::F32).concrete(), Some(WasmType::F32));
        assert_eq!(ResultType::Value(OperandType::IntLiteral).concrete(), None);
        assert_eq!(ResultType::Unknown.operand(), None);
        assert_eq!(ResultType::from_option(None), ResultType::Empty);
    }
}
