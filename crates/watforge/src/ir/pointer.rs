//! Typed pointer views over i32 variables.
//!
//! `Ptr<E>` turns `p[i]` into `load(p + i * stride)`. The element type is a
//! marker, so the stride and access width are fixed at compile time.

use super::instr::{Instr, MemArg, MemoryAccessWidth, SignExtension, VarRef};
use super::types::{Literal, OperandType, WasmType};
use crate::error::{CompileError, CompileResult};
use std::marker::PhantomData;

/// Element type of a pointer view.
pub trait Element {
    /// Distance in bytes between consecutive elements.
    const STRIDE: u32;

    /// How one element is read and written.
    fn mem_arg() -> MemArg;
}

#[derive(Debug, Clone, Copy)]
pub struct I32Cell;

#[derive(Debug, Clone, Copy)]
pub struct I64Cell;

#[derive(Debug, Clone, Copy)]
pub struct F32Cell;

#[derive(Debug, Clone, Copy)]
pub struct F64Cell;

/// Unsigned byte, read into an i32.
#[derive(Debug, Clone, Copy)]
pub struct U8Cell;

impl Element for I32Cell {
    const STRIDE: u32 = 4;
    fn mem_arg() -> MemArg {
        MemArg::full(WasmType::I32)
    }
}

impl Element for I64Cell {
    const STRIDE: u32 = 8;
    fn mem_arg() -> MemArg {
        MemArg::full(WasmType::I64)
    }
}

impl Element for F32Cell {
    const STRIDE: u32 = 4;
    fn mem_arg() -> MemArg {
        MemArg::full(WasmType::F32)
    }
}

impl Element for F64Cell {
    const STRIDE: u32 = 8;
    fn mem_arg() -> MemArg {
        MemArg::full(WasmType::F64)
    }
}

impl Element for U8Cell {
    const STRIDE: u32 = 1;
    fn mem_arg() -> MemArg {
        MemArg::narrow(WasmType::I32, MemoryAccessWidth::I8, SignExtension::Unsigned)
    }
}

/// An i32 variable read as the base address of an array of `E`.
#[derive(Debug, Clone)]
pub struct Ptr<E> {
    base: VarRef,
    _elem: PhantomData<E>,
}

impl<E: Element> Ptr<E> {
    pub fn new(base: VarRef) -> CompileResult<Self> {
        if base.ty() != WasmType::I32 {
            return Err(CompileError::TypeMismatch {
                context: format!("pointer `{}`", base.name()),
                lhs: OperandType::Typed(WasmType::I32),
                rhs: OperandType::Typed(base.ty()),
            });
        }
        Ok(Self {
            base,
            _elem: PhantomData,
        })
    }

    pub fn base(&self) -> &VarRef {
        &self.base
    }

    /// Address of element `index`.
    ///
    /// Literal indices are scaled here; anything else becomes a multiply.
    pub fn address(&self, index: impl Into<Instr>) -> CompileResult<Instr> {
        let index = index.into();
        let stride = i64::from(E::STRIDE);
        match index {
            Instr::Const(Literal::Int(0)) => Ok(self.base.get()),
            Instr::Const(Literal::Int(n)) => {
                let offset = n.checked_mul(stride).ok_or(CompileError::LiteralOutOfRange {
                    value: n,
                    ty: WasmType::I32,
                })?;
                Instr::add(&self.base, Instr::int(offset))
            }
            other => {
                let scaled = if stride == 1 {
                    other
                } else {
                    Instr::mul(other, Instr::int(stride))?
                };
                Instr::add(&self.base, scaled)
            }
        }
    }

    /// Load element `index`.
    pub fn at(&self, index: impl Into<Instr>) -> CompileResult<Instr> {
        let address = self.address(index)?;
        Instr::load_with(E::mem_arg(), address)
    }

    /// Store `value` into element `index`.
    pub fn set_at(&self, index: impl Into<Instr>, value: impl Into<Instr>) -> CompileResult<Instr> {
        let address = self.address(index)?;
        Instr::store_with(E::mem_arg(), address, value.into())
    }
}
