//! End-to-end tests for the constant pool.
//!
//! Interned strings must be readable at the offsets the compiler handed out,
//! and identical strings must share storage.

use anyhow::Result;
use watforge::ir::*;
use watforge::samples::{self, GREETING};
use watforge::CompileOptions;
use watforge_tests::Harness;

#[test]
fn test_message_is_in_memory() -> Result<()> {
    let mut m = Harness::new(samples::greeting()?)?;
    let ptr = m.call::<(), i32>("message", ())?;
    let len = m.call::<(), i32>("length", ())?;
    assert_eq!(ptr, 0xFF);
    assert_eq!(len as usize, GREETING.len());
    assert_eq!(m.read_memory(ptr as u32, len as usize)?, GREETING.as_bytes());
    Ok(())
}

#[test]
fn test_byte_pointer_reads_each_byte() -> Result<()> {
    let mut m = Harness::new(samples::greeting()?)?;
    for (i, expected) in GREETING.bytes().enumerate() {
        assert_eq!(m.call::<i32, i32>("byte_at", i as i32)?, i32::from(expected));
    }
    // terminator slot reserved after the payload
    assert_eq!(m.call::<i32, i32>("byte_at", GREETING.len() as i32)?, 0);
    Ok(())
}

#[test]
fn test_import_receives_the_string() -> Result<()> {
    let mut m = Harness::new(samples::greeting()?)?;
    m.call::<(), ()>("greet", ())?;
    m.call::<(), ()>("greet", ())?;
    assert_eq!(m.printed(), [GREETING, GREETING]);
    Ok(())
}

#[test]
fn test_duplicate_strings_share_an_address() -> Result<()> {
    let mut def = ModuleDef::new("dups");
    def.export_memory();
    for (name, text) in [("first", "abc"), ("second", "def"), ("third", "abc")] {
        def.func(
            FuncDef::new(name)
                .export()
                .result(WasmType::I32)
                .with_body(|b| {
                    b.push(Instr::str(text));
                    Ok(())
                })?,
        );
    }

    let mut m = Harness::new(def)?;
    let first = m.call::<(), i32>("first", ())?;
    let second = m.call::<(), i32>("second", ())?;
    let third = m.call::<(), i32>("third", ())?;
    assert_eq!(first, third);
    assert_ne!(first, second);
    assert_eq!(m.read_memory(first as u32, 3)?, b"abc");
    assert_eq!(m.read_memory(second as u32, 3)?, b"def");
    Ok(())
}

#[test]
fn test_escaped_bytes_survive_encoding() -> Result<()> {
    let payload: &[u8] = b"quote\" back\\ nl\n nul\0 high\xff";
    let mut def = ModuleDef::new("escapes");
    def.export_memory();
    def.func(
        FuncDef::new("addr")
            .export()
            .result(WasmType::I32)
            .with_body(|b| {
                b.push(Instr::str(payload));
                Ok(())
            })?,
    );

    let options = CompileOptions {
        constant_base: 64,
        ..CompileOptions::default()
    };
    let mut m = Harness::with_options(def, &options)?;
    let ptr = m.call::<(), i32>("addr", ())?;
    assert_eq!(ptr, 64);
    assert_eq!(m.read_memory(64, payload.len())?, payload);
    Ok(())
}
