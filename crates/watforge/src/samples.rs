//! Bundled sample modules, used by the CLI and the end-to-end tests.

use crate::error::CompileResult;
use crate::ir::*;

/// A mutable global bumped on every call.
///
/// `next()` returns 1, 2, 3, ...; `reset()` starts over.
pub fn counter() -> CompileResult<ModuleDef> {
    let mut def = ModuleDef::new("counter");
    def.global(GlobalDef::new("count", WasmType::I32).mutable().init(0));
    let count = def.global_ref("count")?;

    def.func(
        FuncDef::new("next")
            .export()
            .result(WasmType::I32)
            .with_body(|b| {
                b.push(count.set(Instr::add(&count, 1)?)?);
                b.push(count.get());
                Ok(())
            })?,
    );
    def.func(FuncDef::new("reset").export().with_body(|b| {
        b.push(count.set(Instr::int(0))?);
        Ok(())
    })?);
    Ok(def)
}

pub const GREETING: &str = "Hello, watforge!";

/// A constant string in exported memory, handed to an imported printer.
///
/// - `message()` returns the string's address
/// - `length()` returns its byte length
/// - `byte_at(i)` reads one byte through a byte pointer
/// - `greet()` calls `env.print(address, length)`
pub fn greeting() -> CompileResult<ModuleDef> {
    let mut def = ModuleDef::new("greeting");
    def.import(
        "env",
        "print",
        "print",
        Signature::new([WasmType::I32, WasmType::I32], None),
    )
    .export_memory();

    let len = i64::try_from(GREETING.len()).unwrap_or(i64::MAX);

    def.func(
        FuncDef::new("message")
            .export()
            .result(WasmType::I32)
            .with_body(|b| {
                b.push(Instr::str(GREETING));
                Ok(())
            })?,
    );
    def.func(
        FuncDef::new("length")
            .export()
            .result(WasmType::I32)
            .with_body(|b| {
                b.push(Instr::int(len));
                Ok(())
            })?,
    );
    def.func(
        FuncDef::new("byte_at")
            .export()
            .param("index", WasmType::I32)
            .local("text", WasmType::I32)
            .result(WasmType::I32)
            .with_body(|b| {
                let index = b.local("index")?;
                let text = b.local("text")?;
                b.push(text.set(Instr::str(GREETING))?);
                b.push(text.as_ptr::<U8Cell>()?.at(&index)?);
                Ok(())
            })?,
    );
    def.func(FuncDef::new("greet").export().with_body(|b| {
        b.push(Instr::call(
            "print",
            vec![Instr::str(GREETING), Instr::int(len)],
            None,
        )?);
        Ok(())
    })?);
    Ok(def)
}

/// Loops and conditionals.
///
/// - `sum_to(n)` adds `1..=n` with a counting loop
/// - `max(a, b)` picks the larger signed value
pub fn sum_to() -> CompileResult<ModuleDef> {
    let mut def = ModuleDef::new("sum_to");

    def.func(
        FuncDef::new("sum_to")
            .export()
            .param("n", WasmType::I32)
            .local("i", WasmType::I32)
            .local("acc", WasmType::I32)
            .result(WasmType::I32)
            .with_body(|b| {
                let n = b.local("n")?;
                let i = b.local("i")?;
                let acc = b.local("acc")?;
                b.push(i.set(Instr::int(1))?);
                b.block("done", None, |b| {
                    b.loop_("next", None, |b| {
                        b.br_if("done", Instr::binary(BinaryOp::GtS, i.get(), n.get())?)?;
                        b.push(acc.set(Instr::add(&acc, &i)?)?);
                        b.push(i.set(Instr::add(&i, 1)?)?);
                        b.br("next")
                    })
                })?;
                b.push(acc.get());
                Ok(())
            })?,
    );
    def.func(
        FuncDef::new("max")
            .export()
            .param("a", WasmType::I32)
            .param("b", WasmType::I32)
            .result(WasmType::I32)
            .with_body(|b| {
                let x = b.local("a")?;
                let y = b.local("b")?;
                b.if_else(
                    Instr::binary(BinaryOp::GeS, x.get(), y.get())?,
                    Some(WasmType::I32),
                    |b| {
                        b.push(x.get());
                        Ok(())
                    },
                    |b| {
                        b.push(y.get());
                        Ok(())
                    },
                )
            })?,
    );
    Ok(def)
}
