//! watforge: typed IR and WebAssembly text generation.
//!
//! Build a module as typed instruction trees ([`ir`]), assemble it inside a
//! compilation session that interns constants and narrows literals
//! ([`compiler`]), and render the result as WAT ([`codegen`]).

pub mod backend;
pub mod codegen;
pub mod compiler;
pub mod error;
pub mod inspect;
pub mod ir;
pub mod optimizer;
pub mod samples;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use error::{CompileError, CompileResult};
use backend::WatBackend;
use codegen::CodeGenerator;
use compiler::assemble;
use ir::{ModuleDef, ModuleRecord};

/// Configuration options for compilation
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Linear-memory offset of the first interned constant
    pub constant_base: u32,
    /// Fold constant arithmetic after expansion
    pub fold_constants: bool,
    /// Spaces per nesting level in rendered text
    pub indent: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            constant_base: 0xFF,
            fold_constants: true,
            indent: 2,
        }
    }
}

/// Compile a module definition to WebAssembly text.
///
/// This is the main entry point: it assembles the module (expanding every
/// body inside a session) and renders the record.
///
/// # Example
/// ```no_run
/// use watforge::{compile, samples, CompileOptions};
///
/// let def = samples::counter().unwrap();
/// let wat = compile(def, &CompileOptions::default()).unwrap();
/// std::fs::write("counter.wat", wat).unwrap();
/// ```
pub fn compile(def: ModuleDef, options: &CompileOptions) -> Result<String> {
    let name = def.name().to_string();
    let record =
        assemble(def, options).with_context(|| format!("failed to assemble module `{name}`"))?;
    Ok(render_module(&record, options))
}

/// Render an already assembled record.
pub fn render_module(record: &ModuleRecord, options: &CompileOptions) -> String {
    let backend = WatBackend::new();
    CodeGenerator::new(&backend)
        .with_indent(options.indent)
        .generate_module(record)
}

/// Compile a module definition to a validated binary module.
pub fn compile_to_wasm(def: ModuleDef, options: &CompileOptions) -> Result<Vec<u8>> {
    let text = compile(def, options)?;
    let wasm = wat::parse_str(&text).context("failed to encode rendered text")?;
    inspect::inspect_wasm(&wasm).context("encoded module is invalid")?;
    Ok(wasm)
}
