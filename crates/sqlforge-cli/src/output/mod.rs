//! Output formatting: wrapping emitted source in its output package/module,
//! and the `--dump-ast json` debug dump.

pub mod ast_dump;
pub mod module;

pub use ast_dump::dump_ast_json;
pub use module::wrap_in_package;
