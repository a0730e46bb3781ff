//! Compilation conditions raised while building, expanding, or assembling IR.
//!
//! Every variant is fatal: the input tree or the session lifecycle is wrong,
//! and the only fix is to correct the input and compile again from scratch.

use crate::ir::{OperandType, ResultType, WasmType};
use thiserror::Error;

/// Result alias used throughout the IR and compiler layers.
pub type CompileResult<T> = std::result::Result<T, CompileError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Two concrete operand types disagree.
    #[error("type mismatch in {context}: {lhs} vs {rhs}")]
    TypeMismatch {
        context: String,
        lhs: OperandType,
        rhs: OperandType,
    },

    /// An operand position holds something that does not produce one value.
    #[error("{context} expects a single value but the operand produces {found}")]
    NotAValue { context: String, found: ResultType },

    /// A branch names a label that no enclosing block or loop declares.
    #[error("branch to unknown label `{label}`")]
    UnknownLabel { label: String },

    /// A block or loop reuses a label that is already open around it.
    #[error("label `{label}` is already in scope")]
    DuplicateLabel { label: String },

    /// The constant pool or the global type table was used outside a session.
    #[error("no compilation session is active")]
    NotCompiling,

    /// A session was started while another one is still live on this thread.
    #[error("a compilation session is already active")]
    ReentrancyError,

    /// A global was referenced that the module never declared.
    #[error("global `{name}` is not declared")]
    UndeclaredGlobal { name: String },

    /// A local was referenced that the function never declared.
    #[error("local `{name}` is not declared in function `{func}`")]
    UndeclaredLocal { name: String, func: String },

    /// A generic literal survived expansion without a concrete type.
    #[error("cannot infer a concrete type for literal {value} in {context}")]
    UnresolvedLiteral { value: i64, context: String },

    /// A generic literal does not fit the type it was narrowed to.
    #[error("literal {value} does not fit in {ty}")]
    LiteralOutOfRange { value: i64, ty: WasmType },

    /// The operation has no entry in the catalog for this type.
    #[error("{op} is not defined for {ty}")]
    UnsupportedOperation { op: &'static str, ty: WasmType },

    /// An `if` declares a result type but has no else body.
    #[error("if with result {ty} requires an else body")]
    MissingElse { ty: WasmType },

    /// A declared result type disagrees with what the body produces.
    #[error("{context} declares {expected} but produces {found}")]
    ResultMismatch {
        context: String,
        expected: ResultType,
        found: ResultType,
    },

    /// A call passes a different number of arguments than the callee takes.
    #[error("call to `{callee}` passes {found} arguments, expected {expected}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },

    /// A declared data segment overlaps the constant pool region.
    #[error("data segment at offset {offset} overlaps constants in {start}..{end}")]
    OverlappingData { offset: u32, start: u32, end: u32 },

    /// A constant does not fit below the top of the 32-bit address space.
    #[error("constant of {len} bytes at offset {offset} runs past the address space")]
    PoolOverflow { len: usize, offset: u32 },
}
