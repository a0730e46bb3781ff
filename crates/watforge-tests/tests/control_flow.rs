//! End-to-end tests for blocks, loops, branches and conditionals.

use anyhow::Result;
use watforge::ir::*;
use watforge::samples;
use watforge_tests::Harness;

fn sum_reference(n: i32) -> i32 {
    (1..=n).sum()
}

#[test]
fn test_sum_to_matches_reference() -> Result<()> {
    let mut m = Harness::new(samples::sum_to()?)?;
    for n in [0, 1, 2, 10, 100] {
        assert_eq!(m.call::<i32, i32>("sum_to", n)?, sum_reference(n), "sum_to({n})");
    }
    // loop body never runs for non-positive bounds
    assert_eq!(m.call::<i32, i32>("sum_to", -5)?, 0);
    Ok(())
}

#[test]
fn test_max_picks_larger_signed() -> Result<()> {
    let mut m = Harness::new(samples::sum_to()?)?;
    assert_eq!(m.call::<(i32, i32), i32>("max", (3, 7))?, 7);
    assert_eq!(m.call::<(i32, i32), i32>("max", (7, 3))?, 7);
    assert_eq!(m.call::<(i32, i32), i32>("max", (-1, -9))?, -1);
    Ok(())
}

#[test]
fn test_early_return_and_if_without_else() -> Result<()> {
    let mut def = ModuleDef::new("clamp");
    def.func(
        FuncDef::new("clamp")
            .export()
            .param("x", WasmType::I64)
            .result(WasmType::I64)
            .with_body(|b| {
                let x = b.local("x")?;
                b.if_then(Instr::binary(BinaryOp::LtS, x.get(), Instr::int(0))?, |b| {
                    b.ret(Some(Instr::int(0)))
                })?;
                b.if_then(
                    Instr::binary(BinaryOp::GtS, x.get(), Instr::int(100))?,
                    |b| b.ret(Some(Instr::int(100))),
                )?;
                b.push(x.get());
                Ok(())
            })?,
    );

    let mut m = Harness::new(def)?;
    assert_eq!(m.call::<i64, i64>("clamp", -20)?, 0);
    assert_eq!(m.call::<i64, i64>("clamp", 42)?, 42);
    assert_eq!(m.call::<i64, i64>("clamp", 1 << 40)?, 100);
    Ok(())
}

#[test]
fn test_block_with_result_and_tee() -> Result<()> {
    let mut def = ModuleDef::new("tee");
    def.func(
        FuncDef::new("double_plus_one")
            .export()
            .param("x", WasmType::I32)
            .local("tmp", WasmType::I32)
            .result(WasmType::I32)
            .with_body(|b| {
                let x = b.local("x")?;
                let tmp = b.local("tmp")?;
                b.block("value", Some(WasmType::I32), |b| {
                    b.push(Instr::add(tmp.tee(Instr::mul(&x, 2)?)?, 1)?);
                    Ok(())
                })
            })?,
    );

    let mut m = Harness::new(def)?;
    assert_eq!(m.call::<i32, i32>("double_plus_one", 20)?, 41);
    Ok(())
}

#[test]
fn test_float_loop_with_generic_literals() -> Result<()> {
    let mut def = ModuleDef::new("halves");
    def.func(
        FuncDef::new("halve")
            .export()
            .param("x", WasmType::F64)
            .param("times", WasmType::I32)
            .result(WasmType::F64)
            .with_body(|b| {
                let x = b.local("x")?;
                let times = b.local("times")?;
                b.block("done", None, |b| {
                    b.loop_("again", None, |b| {
                        b.br_if("done", Instr::unary(UnaryOp::Eqz, times.get())?)?;
                        b.push(x.set(Instr::binary(BinaryOp::Div, x.get(), Instr::int(2))?)?);
                        b.push(times.set(Instr::sub(&times, 1)?)?);
                        b.br("again")
                    })
                })?;
                b.push(x.get());
                Ok(())
            })?,
    );

    let mut m = Harness::new(def)?;
    assert!(m.wat().contains("f64.const 2.0"));
    assert_eq!(m.call::<(f64, i32), f64>("halve", (80.0, 3))?, 10.0);
    Ok(())
}

#[test]
fn test_loop_without_continue_runs_once() -> Result<()> {
    let mut def = ModuleDef::new("once");
    def.func(
        FuncDef::new("once")
            .export()
            .local("count", WasmType::I32)
            .result(WasmType::I32)
            .with_body(|b| {
                let count = b.local("count")?;
                b.loop_("body", None, |b| {
                    b.push(count.set(Instr::add(&count, 1)?)?);
                    Ok(())
                })?;
                b.push(count.get());
                Ok(())
            })?,
    );

    let mut m = Harness::new(def)?;
    assert!(m.wat().contains("(loop $body"));
    assert!(!m.wat().contains("br $body"));
    assert_eq!(m.call::<(), i32>("once", ())?, 1);
    assert_eq!(m.call::<(), i32>("once", ())?, 1);
    Ok(())
}
