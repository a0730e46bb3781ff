//! Module declarations and the assembled module record.
//!
//! [`ModuleDef`] is what a front end fills in: globals, memory, imports, type
//! signatures, table size, and function bodies. Assembly turns it into a
//! [`ModuleRecord`], which is immutable and is the only thing the backend
//! renders.

use super::builder::{typed_body, BodyBuilder};
use super::instr::{Instr, VarRef};
use super::seq::InstrSeq;
use super::types::{Literal, WasmType};
use crate::compiler::pool::FrozenPool;
use crate::error::{CompileError, CompileResult};
use heck::ToUpperCamelCase;
use std::collections::HashMap;

/// Parameter and result types of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    pub params: Vec<WasmType>,
    pub result: Option<WasmType>,
}

impl Signature {
    pub fn new(params: impl Into<Vec<WasmType>>, result: Option<WasmType>) -> Self {
        Self {
            params: params.into(),
            result,
        }
    }
}

/// Named type signature, `(type $name (func ...))`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub signature: Signature,
}

/// Imported host function, called as `$id` inside the module.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncImport {
    pub module: String,
    pub name: String,
    pub id: String,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDef {
    pub name: String,
    pub ty: WasmType,
    pub mutable: bool,
    pub exported: bool,
    /// Constant initializer; defaults to the type's zero.
    pub init: InstrSeq,
}

impl GlobalDef {
    pub fn new(name: impl Into<String>, ty: WasmType) -> Self {
        Self {
            name: name.into(),
            ty,
            mutable: false,
            exported: false,
            init: InstrSeq::from(Instr::from(ty.zero())),
        }
    }

    pub fn mutable(mut self) -> Self {
        self.mutable = true;
        self
    }

    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    pub fn init(mut self, value: impl Into<Instr>) -> Self {
        self.init = InstrSeq::from(value.into());
        self
    }

    /// A reference usable in function bodies.
    pub fn var(&self) -> VarRef {
        VarRef::global(self.name.clone(), self.ty)
    }

    /// The initializer value, when it is a single literal.
    pub fn literal(&self) -> Option<Literal> {
        match self.init.instructions() {
            [Instr::Const(lit)] => Some(*lit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryDef {
    pub pages: u32,
    pub exported: bool,
}

/// Initial bytes placed at a fixed offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegmentDef {
    pub offset: u32,
    pub data: Vec<u8>,
}

/// A function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    name: String,
    export: Option<String>,
    params: Vec<VarRef>,
    locals: Vec<VarRef>,
    result: Option<WasmType>,
    body: InstrSeq,
}

impl FuncDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            export: None,
            params: Vec::new(),
            locals: Vec::new(),
            result: None,
            body: InstrSeq::empty(),
        }
    }

    /// Export under the function's own name.
    pub fn export(self) -> Self {
        let name = self.name.clone();
        self.export_as(name)
    }

    pub fn export_as(mut self, name: impl Into<String>) -> Self {
        self.export = Some(name.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: WasmType) -> Self {
        self.params.push(VarRef::local(name, ty));
        self
    }

    pub fn local(mut self, name: impl Into<String>, ty: WasmType) -> Self {
        self.locals.push(VarRef::local(name, ty));
        self
    }

    pub fn result(mut self, ty: WasmType) -> Self {
        self.result = Some(ty);
        self
    }

    /// Build the body with access to the parameters and locals declared so
    /// far.
    pub fn with_body<F>(mut self, fill: F) -> CompileResult<Self>
    where
        F: FnOnce(&mut BodyBuilder) -> CompileResult<()>,
    {
        let vars = self.params.iter().chain(&self.locals).cloned();
        let mut builder = BodyBuilder::new(self.name.clone(), vars);
        fill(&mut builder)?;
        let instrs = builder.finish()?;
        self.body = typed_body(&format!("function `{}`", self.name), self.result, instrs)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn export_name(&self) -> Option<&str> {
        self.export.as_deref()
    }

    pub fn params(&self) -> &[VarRef] {
        &self.params
    }

    pub fn locals(&self) -> &[VarRef] {
        &self.locals
    }

    pub fn result_type(&self) -> Option<WasmType> {
        self.result
    }

    pub fn body(&self) -> &InstrSeq {
        &self.body
    }

    pub fn signature(&self) -> Signature {
        Signature::new(
            self.params.iter().map(VarRef::ty).collect::<Vec<_>>(),
            self.result,
        )
    }

    pub(crate) fn with_expanded_body(self, body: InstrSeq) -> Self {
        Self { body, ..self }
    }
}

/// Everything a front end declares for one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleDef {
    pub(crate) name: String,
    pub(crate) types: Vec<TypeDef>,
    pub(crate) imports: Vec<FuncImport>,
    pub(crate) globals: Vec<GlobalDef>,
    pub(crate) memory: Option<MemoryDef>,
    pub(crate) data: Vec<DataSegmentDef>,
    pub(crate) table_size: u32,
    pub(crate) constants: Vec<Vec<u8>>,
    pub(crate) functions: Vec<FuncDef>,
}

impl ModuleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_def(&mut self, name: impl Into<String>, signature: Signature) -> &mut Self {
        self.types.push(TypeDef {
            name: name.into(),
            signature,
        });
        self
    }

    pub fn import(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        id: impl Into<String>,
        signature: Signature,
    ) -> &mut Self {
        self.imports.push(FuncImport {
            module: module.into(),
            name: name.into(),
            id: id.into(),
            signature,
        });
        self
    }

    pub fn global(&mut self, global: GlobalDef) -> &mut Self {
        self.globals.push(global);
        self
    }

    /// Declare linear memory of `pages` pages.
    pub fn memory(&mut self, pages: u32) -> &mut Self {
        let exported = self.memory.is_some_and(|m| m.exported);
        self.memory = Some(MemoryDef { pages, exported });
        self
    }

    /// Export memory as `"memory"`, declaring it if needed.
    pub fn export_memory(&mut self) -> &mut Self {
        let pages = self.memory.map_or(0, |m| m.pages);
        self.memory = Some(MemoryDef {
            pages,
            exported: true,
        });
        self
    }

    pub fn data(&mut self, offset: u32, data: impl Into<Vec<u8>>) -> &mut Self {
        self.data.push(DataSegmentDef {
            offset,
            data: data.into(),
        });
        self
    }

    /// Number of table slots to declare.
    pub fn table(&mut self, size: u32) -> &mut Self {
        self.table_size = size;
        self
    }

    /// Intern `bytes` before any function body is expanded.
    pub fn constant(&mut self, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.constants.push(bytes.into());
        self
    }

    pub fn func(&mut self, func: FuncDef) -> &mut Self {
        self.functions.push(func);
        self
    }

    /// A reference to a declared global.
    pub fn global_ref(&self, name: &str) -> CompileResult<VarRef> {
        self.globals
            .iter()
            .find(|g| g.name == name)
            .map(GlobalDef::var)
            .ok_or_else(|| CompileError::UndeclaredGlobal {
                name: name.to_string(),
            })
    }

    /// Signatures of every callable name: local functions and import ids.
    pub fn signatures(&self) -> HashMap<String, Signature> {
        self.imports
            .iter()
            .map(|i| (i.id.clone(), i.signature.clone()))
            .chain(self.functions.iter().map(|f| (f.name.clone(), f.signature())))
            .collect()
    }
}

/// The assembled module. Built once by the compiler and never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRecord {
    pub(crate) name: String,
    pub(crate) types: Vec<TypeDef>,
    pub(crate) imports: Vec<FuncImport>,
    pub(crate) globals: Vec<GlobalDef>,
    pub(crate) memory: Option<MemoryDef>,
    pub(crate) data: Vec<DataSegmentDef>,
    pub(crate) table_size: u32,
    pub(crate) pool: FrozenPool,
    pub(crate) functions: Vec<FuncDef>,
}

impl ModuleRecord {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier used in the module header, e.g. `sum_to` → `SumTo`.
    ///
    /// `None` when the name has no ASCII letters or digits to keep.
    pub fn identifier(&self) -> Option<String> {
        let id: String = self
            .name
            .to_upper_camel_case()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        (!id.is_empty()).then_some(id)
    }

    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    pub fn imports(&self) -> &[FuncImport] {
        &self.imports
    }

    pub fn globals(&self) -> &[GlobalDef] {
        &self.globals
    }

    pub fn memory(&self) -> Option<MemoryDef> {
        self.memory
    }

    pub fn data_segments(&self) -> &[DataSegmentDef] {
        &self.data
    }

    pub fn table_size(&self) -> u32 {
        self.table_size
    }

    pub fn has_table(&self) -> bool {
        self.table_size > 0
    }

    pub fn pool(&self) -> &FrozenPool {
        &self.pool
    }

    pub fn functions(&self) -> &[FuncDef] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&FuncDef> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn has_mutable_globals(&self) -> bool {
        self.globals.iter().any(|g| g.mutable)
    }
}
