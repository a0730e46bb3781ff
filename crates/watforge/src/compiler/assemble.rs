//! Module assembly.
//!
//! Opens a session seeded with the declared global types, expands every
//! global initializer and function body inside it, closes the session to
//! freeze the constant pool, and builds the [`ModuleRecord`].

use super::pool::{FrozenPool, PAGE_SIZE};
use super::session;
use crate::error::CompileError;
use crate::ir::expand::{expand_function, expand_global};
use crate::ir::{DataSegmentDef, MemoryDef, ModuleDef, ModuleRecord};
use crate::optimizer;
use crate::CompileOptions;
use anyhow::{Context, Result};
use log::debug;

/// Assemble a module definition into an immutable record.
///
/// Fails without a record if any global or function fails to expand; the
/// session is released either way.
pub fn assemble(def: ModuleDef, options: &CompileOptions) -> Result<ModuleRecord> {
    let signatures = def.signatures();
    let ModuleDef {
        name,
        types,
        imports,
        globals,
        memory,
        data,
        table_size,
        constants,
        functions,
    } = def;

    let global_types = globals.iter().map(|g| (g.name.clone(), g.ty));
    let guard = session::begin(global_types, options.constant_base)
        .with_context(|| format!("failed to open a session for module `{name}`"))?;

    for bytes in &constants {
        session::intern(bytes).context("failed to intern declared constant")?;
    }

    let globals = globals
        .into_iter()
        .map(|g| {
            let global_name = g.name.clone();
            expand_global(g, &signatures)
                .with_context(|| format!("failed to expand global `{global_name}`"))
        })
        .collect::<Result<Vec<_>>>()?;

    let functions = functions
        .into_iter()
        .map(|f| {
            let func_name = f.name().to_string();
            expand_function(f, &signatures)
                .with_context(|| format!("failed to expand function `{func_name}`"))
        })
        .collect::<Result<Vec<_>>>()?;

    let pool = guard.done().context("failed to close the session")?;

    let (globals, functions) = if options.fold_constants {
        (
            globals.into_iter().map(optimizer::optimize_global).collect(),
            functions
                .into_iter()
                .map(optimizer::optimize_function)
                .collect(),
        )
    } else {
        (globals, functions)
    };

    check_data_layout(&data, &pool)?;
    let memory = size_memory(memory, &data, &pool);

    debug!(
        "assembled `{name}`: {} globals, {} functions, {} constants, memory {:?}",
        globals.len(),
        functions.len(),
        pool.len(),
        memory.map(|m| m.pages)
    );

    Ok(ModuleRecord {
        name,
        types,
        imports,
        globals,
        memory,
        data,
        table_size,
        pool,
        functions,
    })
}

/// User data segments may not overlap the constant pool.
fn check_data_layout(data: &[DataSegmentDef], pool: &FrozenPool) -> Result<()> {
    for seg in data {
        let len = u32::try_from(seg.data.len()).unwrap_or(u32::MAX);
        if pool.overlaps(seg.offset, len) {
            return Err(CompileError::OverlappingData {
                offset: seg.offset,
                start: pool.base_offset(),
                end: pool.end_offset(),
            })
            .context("invalid data segment layout");
        }
    }
    Ok(())
}

/// Declared memory grown to cover the pool and every data segment.
fn size_memory(
    declared: Option<MemoryDef>,
    data: &[DataSegmentDef],
    pool: &FrozenPool,
) -> Option<MemoryDef> {
    let data_pages = data
        .iter()
        .map(|seg| {
            let len = u32::try_from(seg.data.len()).unwrap_or(u32::MAX);
            seg.offset.saturating_add(len).div_ceil(PAGE_SIZE)
        })
        .max()
        .unwrap_or(0);
    let needed = pool.pages_needed().max(data_pages);
    match declared {
        Some(mem) => Some(MemoryDef {
            pages: mem.pages.max(needed),
            ..mem
        }),
        None if needed > 0 => Some(MemoryDef {
            pages: needed,
            exported: false,
        }),
        None => None,
    }
}
