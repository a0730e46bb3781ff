use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use watforge::ir::ModuleDef;
use watforge::{compile, compile_to_wasm, inspect, samples, CompileOptions};

/// Bundled modules the CLI can render.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Sample {
    Counter,
    Greeting,
    SumTo,
}

impl Sample {
    fn build(self) -> watforge::CompileResult<ModuleDef> {
        match self {
            Sample::Counter => samples::counter(),
            Sample::Greeting => samples::greeting(),
            Sample::SumTo => samples::sum_to(),
        }
    }
}

/// watforge: render typed IR modules as WebAssembly.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Sample module to render
    #[arg(value_enum)]
    sample: Sample,

    /// Output file
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Emit a binary module instead of text
    #[arg(long)]
    wasm: bool,

    /// Spaces per nesting level in text output
    #[arg(long, default_value_t = 2)]
    indent: usize,

    /// Skip constant folding
    #[arg(long)]
    no_fold: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    eprintln!("watforge: rendering {:?}", cli.sample);

    let def = cli
        .sample
        .build()
        .with_context(|| format!("failed to build sample {:?}", cli.sample))?;

    let options = CompileOptions {
        fold_constants: !cli.no_fold,
        indent: cli.indent,
        ..CompileOptions::default()
    };

    let bytes = if cli.wasm {
        let wasm = compile_to_wasm(def, &options).context("compilation failed")?;
        let summary = inspect::inspect_wasm(&wasm)?;
        eprintln!(
            "watforge: {} functions, {} data segments, exports {:?}",
            summary.functions,
            summary.data.len(),
            summary.function_exports
        );
        wasm
    } else {
        compile(def, &options)
            .context("compilation failed")?
            .into_bytes()
    };

    // Write output
    if let Some(output_path) = cli.output {
        fs::write(&output_path, &bytes)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        eprintln!("watforge: wrote {}", output_path.display());
    } else if cli.wasm {
        anyhow::bail!("refusing to write a binary module to stdout; pass --output");
    } else {
        // Print to stdout if no output file specified
        println!("{}", String::from_utf8_lossy(&bytes));
    }

    eprintln!("watforge: done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["watforge", "counter"]);
        assert_eq!(cli.sample, Sample::Counter);
        assert!(cli.output.is_none());
        assert!(!cli.wasm);
        assert_eq!(cli.indent, 2);
    }

    #[test]
    fn cli_parses_kebab_case_sample() {
        let cli = Cli::parse_from(["watforge", "sum-to", "--wasm", "-o", "out.wasm"]);
        assert_eq!(cli.sample, Sample::SumTo);
        assert!(cli.wasm);
        assert_eq!(cli.output, Some(PathBuf::from("out.wasm")));
    }

    #[test]
    fn every_sample_compiles() {
        for sample in [Sample::Counter, Sample::Greeting, Sample::SumTo] {
            let def = sample.build().unwrap();
            assert!(compile_to_wasm(def, &CompileOptions::default()).is_ok());
        }
    }
}
