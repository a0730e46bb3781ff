//! End-to-end tests for mutable globals.
//!
//! The counter sample keeps its state in a mutable global that `next()`
//! increments and returns.

use anyhow::Result;
use watforge::samples;
use watforge::CompileOptions;
use watforge_tests::Harness;

#[test]
fn test_next_counts_up() -> Result<()> {
    let mut counter = Harness::new(samples::counter()?)?;
    assert_eq!(counter.call::<(), i32>("next", ())?, 1);
    assert_eq!(counter.call::<(), i32>("next", ())?, 2);
    assert_eq!(counter.call::<(), i32>("next", ())?, 3);
    Ok(())
}

#[test]
fn test_reset_starts_over() -> Result<()> {
    let mut counter = Harness::new(samples::counter()?)?;
    counter.call::<(), i32>("next", ())?;
    counter.call::<(), i32>("next", ())?;
    counter.call::<(), ()>("reset", ())?;
    assert_eq!(counter.call::<(), i32>("next", ())?, 1);
    Ok(())
}

#[test]
fn test_instances_do_not_share_state() -> Result<()> {
    let mut a = Harness::new(samples::counter()?)?;
    let mut b = Harness::new(samples::counter()?)?;
    a.call::<(), i32>("next", ())?;
    a.call::<(), i32>("next", ())?;
    assert_eq!(b.call::<(), i32>("next", ())?, 1);
    Ok(())
}

#[test]
fn test_unfolded_module_behaves_the_same() -> Result<()> {
    let options = CompileOptions {
        fold_constants: false,
        indent: 4,
        ..CompileOptions::default()
    };
    let mut counter = Harness::with_options(samples::counter()?, &options)?;
    assert!(counter.wat().contains("\n    (func $next"));
    assert_eq!(counter.call::<(), i32>("next", ())?, 1);
    assert_eq!(counter.call::<(), i32>("next", ())?, 2);
    Ok(())
}
