//! Wraps an emitted module body in the config file's `output_package` name
//! (spec.md §6.1's `output_package` key; spec.md §6.4's "a single source
//! file containing" the per-query functions).

/// Indents every non-empty line of `body` by one level and wraps it in
/// `pub mod <package> { ... }`.
pub fn wrap_in_package(package: &str, body: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("pub mod {package} {{\n"));
    for line in body.lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_body_in_named_module() {
        let wrapped = wrap_in_package("db", "pub fn query_Foo() {}\n");
        assert!(wrapped.starts_with("pub mod db {\n"));
        assert!(wrapped.contains("    pub fn query_Foo() {}\n"));
        assert!(wrapped.trim_end().ends_with('}'));
    }

    #[test]
    fn preserves_blank_lines_without_trailing_whitespace() {
        let wrapped = wrap_in_package("db", "a\n\nb\n");
        assert!(wrapped.contains("    a\n\n    b\n"));
    }
}
