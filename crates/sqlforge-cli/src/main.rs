//! sqlforge CLI - driver for the dynamic SQL query DSL compiler (spec.md §6.1, C6).
//!
//! Reads a `key = "value";` config file naming the schema file, the query
//! file, and where to write generated output; runs the lex/parse -> check ->
//! emit pipeline; writes the result. Check errors are accumulated and all
//! printed to stderr before exiting non-zero, without writing any output.

mod cli;
mod input;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use sqlforge_core::{check_all, emit_module, parse_config, parse_queries, parse_schema, Emitter, RustEmitter};

use cli::{Args, DumpAst};

#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    #[cfg(feature = "tracing")]
    init_tracing();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("sqlforge: error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the full driver. Returns `Ok(true)` on success (output written, or
/// `--check` passed with no errors), `Ok(false)` when check errors were
/// reported (already printed to stderr).
fn run() -> Result<bool> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(|| PathBuf::from("sqlforge.conf"));
    let config_source = input::read_file(&config_path)?;
    let config = parse_config(&config_source)
        .with_context(|| format!("invalid config file: {}", config_path.display()))?;

    let schema_source = input::read_file(&PathBuf::from(&config.schema_path))?;
    let schema = parse_schema(&schema_source).context("failed to parse schema")?;

    let query_source = input::read_file(&PathBuf::from(&config.query_path))?;
    let mut queries = parse_queries(&query_source).context("failed to parse queries")?;

    if let Err(errors) = check_all(&mut queries, &schema) {
        for error in &errors {
            eprintln!("sqlforge: {error}");
        }
        return Ok(false);
    }

    if !args.quiet {
        let count = queries.queries.iter().filter(|q| !q.is_fragment).count();
        eprintln!("sqlforge: {count} quer{} checked OK", if count == 1 { "y" } else { "ies" });
    }

    if args.dump_ast == DumpAst::Json {
        println!("{}", output::dump_ast_json(&queries)?);
    }

    if args.check {
        return Ok(true);
    }

    let mut emitter = RustEmitter::new();
    let module_body = emit_module(&mut emitter, &queries).context("failed to emit generated source")?;
    let wrapped = output::wrap_in_package(&config.output_package, &module_body);

    std::fs::write(&config.output_path, wrapped)
        .with_context(|| format!("failed to write output: {}", config.output_path))?;

    if !args.quiet {
        eprintln!("sqlforge: wrote {}", config.output_path);
    }

    Ok(true)
}

