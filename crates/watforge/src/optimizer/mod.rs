//! IR optimization passes.
//!
//! Runs on expanded code only, where every literal has a concrete type.
//! The single pass today is constant folding.

use crate::ir::{FuncDef, GlobalDef};
use log::trace;

// ── Passes ───────────────────────────────────────────────────────────────────
pub mod const_fold;

/// Run all passes over one function body.
pub fn optimize_function(func: FuncDef) -> FuncDef {
    trace!("optimize: function {}", func.name());
    let body = const_fold::fold_seq(func.body().clone());
    func.with_expanded_body(body)
}

/// Run all passes over a global initializer.
pub fn optimize_global(global: GlobalDef) -> GlobalDef {
    GlobalDef {
        init: const_fold::fold_seq(global.init),
        ..global
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instr, WasmType};

    #[test]
    fn optimize_function_folds_body() {
        let func = FuncDef::new("seven")
            .result(WasmType::I32)
            .with_body(|b| {
                b.push(Instr::add(Instr::i32(3), Instr::i32(4))?);
                Ok(())
            })
            .unwrap();
        let func = optimize_function(func);
        assert_eq!(func.body().instructions(), &[Instr::i32(7)]);
    }

    #[test]
    fn optimize_global_folds_initializer() {
        let g = GlobalDef::new("g", WasmType::I64)
            .init(Instr::mul(Instr::i64(6), Instr::i64(7)).unwrap());
        assert_eq!(optimize_global(g).init.instructions(), &[Instr::i64(42)]);
    }
}
