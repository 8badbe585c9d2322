//! CLI argument parsing using clap (spec.md §6.1, expanded in SPEC_FULL.md §6.1).

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// sqlforge - compiler for the dynamic SQL query DSL
#[derive(Parser, Debug)]
#[command(name = "sqlforge")]
#[command(about = "Compile a schema + query DSL file into target-language query functions", long_about = None)]
#[command(version)]
pub struct Args {
    /// Config file location (defaults to `sqlforge.conf` in the working directory).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run lex/parse/check only; report errors without emitting output.
    #[arg(long)]
    pub check: bool,

    /// Dump the checked query AST alongside normal output.
    #[arg(long, value_enum, default_value = "none")]
    pub dump_ast: DumpAst,

    /// Suppress non-error stderr output.
    #[arg(short, long)]
    pub quiet: bool,
}

/// `--dump-ast` modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum DumpAst {
    #[default]
    None,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no_dump_and_not_quiet() {
        let args = Args::parse_from(["sqlforge"]);
        assert_eq!(args.dump_ast, DumpAst::None);
        assert!(!args.quiet);
        assert!(!args.check);
        assert!(args.config.is_none());
    }

    #[test]
    fn parses_all_flags() {
        let args = Args::parse_from([
            "sqlforge",
            "--config",
            "alt.conf",
            "--check",
            "--dump-ast",
            "json",
            "--quiet",
        ]);
        assert_eq!(args.config.unwrap().to_str().unwrap(), "alt.conf");
        assert!(args.check);
        assert_eq!(args.dump_ast, DumpAst::Json);
        assert!(args.quiet);
    }
}
