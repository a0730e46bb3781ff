//! Code generation: emits WebAssembly text from an assembled module.
//!
//! # Overview
//!
//! The generator walks a [`ModuleRecord`] and asks a [`Backend`] for the
//! text of each individual operation. Layout (ordering, nesting,
//! indentation) lives here; instruction syntax lives in the backend.
//!
//! ```text
//!        ModuleRecord
//!             │
//!             ▼
//!      generate_module()
//!        ├─ header            (module $Name
//!        ├─ types             (type $t (func ...))
//!        ├─ imports           (import "m" "n" (func $id ...))
//!        ├─ globals           (global $g (mut i32) (i32.const 0))
//!        ├─ memory            (memory 1)
//!        ├─ pool + data       (data (i32.const 255) "...")
//!        ├─ table             (table 4 funcref)
//!        └─ functions         (func $f ... body ...)
//!             │
//!             ▼
//!         WAT text
//! ```
//!
//! # Sub-modules
//!
//! - **`module`**: section ordering and module-level declarations
//! - **`function`**: function headers, locals, bodies
//! - **`instruction`**: instruction trees in stack order, folded control flow
//! - **`types`**: signature and type fragments
//! - **`utils`**: the indenting line buffer
//!
//! Rendering never changes its input, so rendering the same record twice
//! yields identical text.

pub mod function;
pub mod instruction;
pub mod module;
pub mod types;
pub mod utils;

use crate::backend::Backend;
use crate::ir::*;
use utils::Emitter;

/// Main code generator struct that orchestrates emission of text from IR.
///
/// # Example
///
/// ```ignore
/// let backend = WatBackend::new();
/// let codegen = CodeGenerator::new(&backend);
/// let wat = codegen.generate_module(&record);
/// ```
pub struct CodeGenerator<'a, B: Backend> {
    backend: &'a B,
    indent: usize,
}

impl<'a, B: Backend> CodeGenerator<'a, B> {
    /// Create a new code generator with a given backend and two-space indentation.
    pub fn new(backend: &'a B) -> Self {
        CodeGenerator { backend, indent: 2 }
    }

    /// Spaces per nesting level.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Generate the complete module document.
    pub fn generate_module(&self, record: &ModuleRecord) -> String {
        module::generate_module(self.backend, record, self.indent)
    }

    /// Render a single node, starting `level` levels deep.
    pub fn render(&self, node: &Instr, level: usize) -> String {
        let mut out = Emitter::new(self.indent, level);
        instruction::emit_instr(self.backend, &mut out, node);
        out.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::WatBackend;
    use crate::compiler::assemble;
    use crate::CompileOptions;

    fn counter() -> ModuleDef {
        let mut def = ModuleDef::new("counter");
        def.global(GlobalDef::new("count", WasmType::I32).mutable().init(0));
        let count = def.global_ref("count").unwrap();
        def.func(
            FuncDef::new("next")
                .export()
                .result(WasmType::I32)
                .with_body(|b| {
                    b.push(count.set(Instr::add(&count, 1)?)?);
                    b.push(count.get());
                    Ok(())
                })
                .unwrap(),
        );
        def
    }

    #[test]
    fn test_generate_counter_module() {
        let record = assemble(counter(), &CompileOptions::default()).unwrap();
        let backend = WatBackend::new();
        let wat = CodeGenerator::new(&backend).generate_module(&record);
        assert_eq!(
            wat,
            "(module $Counter\n\
             \x20 (global $count (mut i32) (i32.const 0))\n\
             \x20 (func $next (export \"next\") (result i32)\n\
             \x20   global.get $count\n\
             \x20   i32.const 1\n\
             \x20   i32.add\n\
             \x20   global.set $count\n\
             \x20   global.get $count\n\
             \x20 )\n\
             )"
        );
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let record = assemble(counter(), &CompileOptions::default()).unwrap();
        let backend = WatBackend::new();
        let codegen = CodeGenerator::new(&backend);
        assert_eq!(
            codegen.generate_module(&record),
            codegen.generate_module(&record)
        );
    }

    #[test]
    fn test_nested_blocks_indent_one_level() {
        let mut def = ModuleDef::new("m");
        def.func(
            FuncDef::new("f")
                .param("n", WasmType::I32)
                .with_body(|b| {
                    let n = b.local("n")?;
                    b.block("exit", None, |b| {
                        b.loop_("top", None, |b| {
                            b.br_if("exit", Instr::unary(UnaryOp::Eqz, n.get())?)?;
                            b.push(n.set(Instr::sub(&n, 1)?)?);
                            b.br("top")?;
                            Ok(())
                        })?;
                        Ok(())
                    })?;
                    Ok(())
                })
                .unwrap(),
        );
        let record = assemble(def, &CompileOptions::default()).unwrap();
        let backend = WatBackend::new();
        let body = record.function("f").unwrap().body();
        let text = CodeGenerator::new(&backend).render(&body.instructions()[0], 0);
        assert_eq!(
            text,
            "(block $exit\n\
             \x20 (loop $top\n\
             \x20   local.get $n\n\
             \x20   i32.eqz\n\
             \x20   br_if $exit\n\
             \x20   local.get $n\n\
             \x20   i32.const 1\n\
             \x20   i32.sub\n\
             \x20   local.set $n\n\
             \x20   br $top\n\
             \x20 )\n\
             )"
        );
    }

    #[test]
    fn test_if_else_layout_with_custom_indent() {
        let x = VarRef::local("x", WasmType::I32);
        let node = Instr::If(
            IfElse::new(
                x.get(),
                Some(WasmType::I32),
                InstrSeq::from(Instr::i32(1)),
                Some(InstrSeq::from(Instr::i32(2))),
            )
            .unwrap(),
        );
        let backend = WatBackend::new();
        let text = CodeGenerator::new(&backend).with_indent(4).render(&node, 0);
        assert_eq!(
            text,
            "local.get $x\n\
             (if (result i32)\n\
             \x20   (then\n\
             \x20       i32.const 1\n\
             \x20   )\n\
             \x20   (else\n\
             \x20       i32.const 2\n\
             \x20   )\n\
             )"
        );
    }
}
