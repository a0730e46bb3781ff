//! Binary module inspection.
//!
//! Wraps the `wasmparser` crate to validate an encoded module and report
//! what ended up in it. Used to check the output of [`crate::compile_to_wasm`].

use anyhow::{Context, Result};
use wasmparser::{ExternalKind, Operator, Parser, Payload, TypeRef, Validator};

/// An active data segment as encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSummary {
    pub offset: u32,
    pub len: usize,
}

/// What a validated binary contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinarySummary {
    pub types: usize,
    /// `(module, name)` of every function import.
    pub imports: Vec<(String, String)>,
    /// Defined functions, excluding imports.
    pub functions: usize,
    pub globals: usize,
    /// Initial page count of memory 0.
    pub memory_pages: Option<u32>,
    pub table_size: Option<u32>,
    pub data: Vec<DataSummary>,
    /// Exported function names, in export order.
    pub function_exports: Vec<String>,
    pub exports_memory: bool,
}

fn data_offset(expr: wasmparser::ConstExpr) -> Result<u32> {
    let mut reader = expr.get_operators_reader();
    match reader.read().context("reading data offset operator")? {
        Operator::I32Const { value } => Ok(value as u32),
        op => anyhow::bail!("unsupported data offset expression: {op:?}"),
    }
}

/// Validate `wasm_bytes` and summarize its sections.
pub fn inspect_wasm(wasm_bytes: &[u8]) -> Result<BinarySummary> {
    Validator::new()
        .validate_all(wasm_bytes)
        .context("module failed validation")?;

    let mut summary = BinarySummary::default();

    for payload in Parser::new(0).parse_all(wasm_bytes) {
        let payload = payload.context("parsing wasm payload")?;

        match payload {
            Payload::TypeSection(reader) => {
                for rec_group in reader {
                    let rec_group = rec_group.context("reading rec group")?;
                    summary.types += rec_group.types().count();
                }
            }

            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.context("reading import")?;
                    if let TypeRef::Func(_) = import.ty {
                        summary
                            .imports
                            .push((import.module.to_string(), import.name.to_string()));
                    }
                }
            }

            Payload::FunctionSection(reader) => {
                summary.functions += reader.count() as usize;
            }

            Payload::GlobalSection(reader) => {
                summary.globals += reader.count() as usize;
            }

            Payload::MemorySection(reader) => {
                if let Some(mem) = reader.into_iter().next() {
                    let mem = mem.context("reading memory type")?;
                    summary.memory_pages = Some(mem.initial as u32);
                }
            }

            Payload::TableSection(reader) => {
                if let Some(table) = reader.into_iter().next() {
                    let table = table.context("reading table type")?;
                    summary.table_size = Some(table.ty.initial as u32);
                }
            }

            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.context("reading export")?;
                    match export.kind {
                        ExternalKind::Func => {
                            summary.function_exports.push(export.name.to_string())
                        }
                        ExternalKind::Memory => summary.exports_memory = true,
                        _ => {}
                    }
                }
            }

            Payload::DataSection(reader) => {
                for data in reader {
                    let data = data.context("reading data segment")?;
                    if let wasmparser::DataKind::Active { offset_expr, .. } = data.kind {
                        summary.data.push(DataSummary {
                            offset: data_offset(offset_expr)?,
                            len: data.data.len(),
                        });
                    }
                }
            }

            _ => {}
        }
    }

    Ok(summary)
}
