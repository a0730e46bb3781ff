//! Intermediate representation for WebAssembly text modules.
//!
//! Front ends build trees of typed [`Instr`] nodes, group them into function
//! bodies with [`BodyBuilder`], and declare the rest of the module on a
//! [`ModuleDef`]. The compiler expands and assembles that into a
//! [`ModuleRecord`], which is what the backend renders.

mod types;
pub use types::*;

mod ops;
pub use ops::*;

mod instr;
pub use instr::*;

mod seq;
pub use seq::{Effects, InstrSeq};

mod control;
pub use control::{Block, Branch, IfElse, LabelKind, Loop};

mod pointer;
pub use pointer::{Element, F32Cell, F64Cell, I32Cell, I64Cell, Ptr, U8Cell};

mod builder;
pub use builder::BodyBuilder;

pub mod expand;

mod module;
pub use module::*;
