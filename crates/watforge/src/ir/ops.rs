//! Operation catalog.
//!
//! Operations are named independently of their operand type; the type comes
//! from the operands when an instruction is built. Which names are legal for
//! which type is a static table.

use super::types::{OperandType, WasmType};

/// Binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    DivS, // integer, signed
    DivU, // integer, unsigned
    Div,  // float
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Rotl,
    Rotr,
    Min,
    Max,
    Copysign,

    // comparisons (always produce i32)
    Eq,
    Ne,
    LtS,
    LtU,
    Lt,
    GtS,
    GtU,
    Gt,
    LeS,
    LeU,
    Le,
    GeS,
    GeU,
    Ge,
}

/// Binary operations defined on i32 and i64.
pub const INTEGER_BINARY_OPS: &[BinaryOp] = &[
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::DivS,
    BinaryOp::DivU,
    BinaryOp::RemS,
    BinaryOp::RemU,
    BinaryOp::And,
    BinaryOp::Or,
    BinaryOp::Xor,
    BinaryOp::Shl,
    BinaryOp::ShrS,
    BinaryOp::ShrU,
    BinaryOp::Rotl,
    BinaryOp::Rotr,
    BinaryOp::Eq,
    BinaryOp::Ne,
    BinaryOp::LtS,
    BinaryOp::LtU,
    BinaryOp::GtS,
    BinaryOp::GtU,
    BinaryOp::LeS,
    BinaryOp::LeU,
    BinaryOp::GeS,
    BinaryOp::GeU,
];

/// Binary operations defined on f32 and f64.
pub const FLOAT_BINARY_OPS: &[BinaryOp] = &[
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::Div,
    BinaryOp::Min,
    BinaryOp::Max,
    BinaryOp::Copysign,
    BinaryOp::Eq,
    BinaryOp::Ne,
    BinaryOp::Lt,
    BinaryOp::Gt,
    BinaryOp::Le,
    BinaryOp::Ge,
];

impl BinaryOp {
    /// Instruction name without the type prefix (`add`, `div_s`, ...).
    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::DivS => "div_s",
            BinaryOp::DivU => "div_u",
            BinaryOp::Div => "div",
            BinaryOp::RemS => "rem_s",
            BinaryOp::RemU => "rem_u",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::ShrS => "shr_s",
            BinaryOp::ShrU => "shr_u",
            BinaryOp::Rotl => "rotl",
            BinaryOp::Rotr => "rotr",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
            BinaryOp::Copysign => "copysign",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::LtS => "lt_s",
            BinaryOp::LtU => "lt_u",
            BinaryOp::Lt => "lt",
            BinaryOp::GtS => "gt_s",
            BinaryOp::GtU => "gt_u",
            BinaryOp::Gt => "gt",
            BinaryOp::LeS => "le_s",
            BinaryOp::LeU => "le_u",
            BinaryOp::Le => "le",
            BinaryOp::GeS => "ge_s",
            BinaryOp::GeU => "ge_u",
            BinaryOp::Ge => "ge",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::LtS
                | BinaryOp::LtU
                | BinaryOp::Lt
                | BinaryOp::GtS
                | BinaryOp::GtU
                | BinaryOp::Gt
                | BinaryOp::LeS
                | BinaryOp::LeU
                | BinaryOp::Le
                | BinaryOp::GeS
                | BinaryOp::GeU
                | BinaryOp::Ge
        )
    }

    pub fn is_defined_for(&self, ty: WasmType) -> bool {
        ty.binary_ops().contains(self)
    }

    /// Result type given the unified operand type.
    ///
    /// Comparisons produce i32 regardless of operand type.
    pub fn result_type(&self, operand: OperandType) -> OperandType {
        if self.is_comparison() {
            OperandType::Typed(WasmType::I32)
        } else {
            operand
        }
    }
}

/// Unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Clz,
    Ctz,
    Popcnt,
    Eqz, // produces i32
    Abs,
    Neg,
    Ceil,
    Floor,
    Trunc,
    Nearest,
    Sqrt,
}

pub const INTEGER_UNARY_OPS: &[UnaryOp] =
    &[UnaryOp::Clz, UnaryOp::Ctz, UnaryOp::Popcnt, UnaryOp::Eqz];

pub const FLOAT_UNARY_OPS: &[UnaryOp] = &[
    UnaryOp::Abs,
    UnaryOp::Neg,
    UnaryOp::Ceil,
    UnaryOp::Floor,
    UnaryOp::Trunc,
    UnaryOp::Nearest,
    UnaryOp::Sqrt,
];

impl UnaryOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            UnaryOp::Clz => "clz",
            UnaryOp::Ctz => "ctz",
            UnaryOp::Popcnt => "popcnt",
            UnaryOp::Eqz => "eqz",
            UnaryOp::Abs => "abs",
            UnaryOp::Neg => "neg",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Floor => "floor",
            UnaryOp::Trunc => "trunc",
            UnaryOp::Nearest => "nearest",
            UnaryOp::Sqrt => "sqrt",
        }
    }

    pub fn is_defined_for(&self, ty: WasmType) -> bool {
        ty.unary_ops().contains(self)
    }

    pub fn result_type(&self, operand: OperandType) -> OperandType {
        match self {
            UnaryOp::Eqz => OperandType::Typed(WasmType::I32),
            _ => operand,
        }
    }
}

impl WasmType {
    /// Catalog of binary operations legal for this type.
    pub fn binary_ops(&self) -> &'static [BinaryOp] {
        if self.is_integer() {
            INTEGER_BINARY_OPS
        } else {
            FLOAT_BINARY_OPS
        }
    }

    /// Catalog of unary operations legal for this type.
    pub fn unary_ops(&self) -> &'static [UnaryOp] {
        if self.is_integer() {
            INTEGER_UNARY_OPS
        } else {
            FLOAT_UNARY_OPS
        }
    }
}

/// Numeric conversions. Source and target types are fixed per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    I32WrapI64,
    I64ExtendI32S,
    I64ExtendI32U,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F32DemoteF64,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
}

impl Conversion {
    /// `(source, target, full instruction name)`.
    fn entry(&self) -> (WasmType, WasmType, &'static str) {
        use WasmType::*;
        match self {
            Conversion::I32WrapI64 => (I64, I32, "i32.wrap_i64"),
            Conversion::I64ExtendI32S => (I32, I64, "i64.extend_i32_s"),
            Conversion::I64ExtendI32U => (I32, I64, "i64.extend_i32_u"),
            Conversion::I32TruncF32S => (F32, I32, "i32.trunc_f32_s"),
            Conversion::I32TruncF32U => (F32, I32, "i32.trunc_f32_u"),
            Conversion::I32TruncF64S => (F64, I32, "i32.trunc_f64_s"),
            Conversion::I32TruncF64U => (F64, I32, "i32.trunc_f64_u"),
            Conversion::I64TruncF32S => (F32, I64, "i64.trunc_f32_s"),
            Conversion::I64TruncF32U => (F32, I64, "i64.trunc_f32_u"),
            Conversion::I64TruncF64S => (F64, I64, "i64.trunc_f64_s"),
            Conversion::I64TruncF64U => (F64, I64, "i64.trunc_f64_u"),
            Conversion::F32ConvertI32S => (I32, F32, "f32.convert_i32_s"),
            Conversion::F32ConvertI32U => (I32, F32, "f32.convert_i32_u"),
            Conversion::F32ConvertI64S => (I64, F32, "f32.convert_i64_s"),
            Conversion::F32ConvertI64U => (I64, F32, "f32.convert_i64_u"),
            Conversion::F64ConvertI32S => (I32, F64, "f64.convert_i32_s"),
            Conversion::F64ConvertI32U => (I32, F64, "f64.convert_i32_u"),
            Conversion::F64ConvertI64S => (I64, F64, "f64.convert_i64_s"),
            Conversion::F64ConvertI64U => (I64, F64, "f64.convert_i64_u"),
            Conversion::F32DemoteF64 => (F64, F32, "f32.demote_f64"),
            Conversion::F64PromoteF32 => (F32, F64, "f64.promote_f32"),
            Conversion::I32ReinterpretF32 => (F32, I32, "i32.reinterpret_f32"),
            Conversion::I64ReinterpretF64 => (F64, I64, "i64.reinterpret_f64"),
            Conversion::F32ReinterpretI32 => (I32, F32, "f32.reinterpret_i32"),
            Conversion::F64ReinterpretI64 => (I64, F64, "f64.reinterpret_i64"),
        }
    }

    pub fn source(&self) -> WasmType {
        self.entry().0
    }

    pub fn target(&self) -> WasmType {
        self.entry().1
    }

    pub fn name(&self) -> &'static str {
        self.entry().2
    }
}
