//! Compilation: the session, the constant pool, and module assembly.

pub mod pool;
pub mod session;

mod assemble;
pub use assemble::assemble;
