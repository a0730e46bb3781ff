//! Helpers for running compiled watforge modules under wasmtime.
//!
//! Every module gets an `env.print(ptr, len)` import whose output is
//! collected in the store, so tests can check what a module printed.

use anyhow::{Context, Result};
use wasmtime::{Caller, Engine, Instance, Linker, Module, Store, WasmParams, WasmResults};
use watforge::ir::ModuleDef;
use watforge::{compile, CompileOptions};

/// A compiled and instantiated module.
pub struct Harness {
    store: Store<Vec<String>>,
    instance: Instance,
    wat: String,
}

impl Harness {
    /// Compile `def` with default options and instantiate it.
    pub fn new(def: ModuleDef) -> Result<Self> {
        Self::with_options(def, &CompileOptions::default())
    }

    pub fn with_options(def: ModuleDef, options: &CompileOptions) -> Result<Self> {
        let wat = compile(def, options)?;
        let engine = Engine::default();
        let module = Module::new(&engine, &wat)
            .with_context(|| format!("wasmtime rejected the module:\n{wat}"))?;
        let mut store = Store::new(&engine, Vec::new());
        let mut linker = Linker::new(&engine);
        linker.func_wrap(
            "env",
            "print",
            |mut caller: Caller<'_, Vec<String>>, ptr: i32, len: i32| -> wasmtime::Result<()> {
                let memory = caller
                    .get_export("memory")
                    .and_then(|export| export.into_memory())
                    .context("print needs an exported memory")?;
                let start = ptr as u32 as usize;
                let end = start + len as u32 as usize;
                let text = memory
                    .data(&caller)
                    .get(start..end)
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .context("print range is out of bounds")?;
                caller.data_mut().push(text);
                Ok(())
            },
        )?;
        let instance = linker
            .instantiate(&mut store, &module)
            .context("instantiation failed")?;
        Ok(Self {
            store,
            instance,
            wat,
        })
    }

    /// The rendered text the module was built from.
    pub fn wat(&self) -> &str {
        &self.wat
    }

    /// Call an export with typed parameters and results.
    pub fn call<P, R>(&mut self, name: &str, params: P) -> Result<R>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = self
            .instance
            .get_typed_func::<P, R>(&mut self.store, name)
            .with_context(|| format!("missing export `{name}`"))?;
        func.call(&mut self.store, params)
            .with_context(|| format!("call to `{name}` trapped"))
    }

    /// Copy `len` bytes out of the exported memory.
    pub fn read_memory(&mut self, offset: u32, len: usize) -> Result<Vec<u8>> {
        let memory = self
            .instance
            .get_memory(&mut self.store, "memory")
            .context("module does not export memory")?;
        let start = offset as usize;
        memory
            .data(&self.store)
            .get(start..start + len)
            .map(<[u8]>::to_vec)
            .context("read is out of bounds")
    }

    /// Everything the module passed to `env.print`, in call order.
    pub fn printed(&self) -> &[String] {
        self.store.data()
    }
}
