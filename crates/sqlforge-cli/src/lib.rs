//! sqlforge CLI library.
//!
//! Exposes internal modules for the integration test suite; the actual
//! entry point is the `sqlforge` binary (`src/main.rs`).

pub mod cli;
pub mod input;
pub mod output;

pub use cli::Args;
