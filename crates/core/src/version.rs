//! NCO version banner parsing.

use std::sync::LazyLock;

use regex::Regex;

/// Matches the banner operators print for `--version`, e.g.
/// `NCO netCDF Operators version "5.1.4" last modified ...`.
const VERSION_PATTERN: &str = r#"NCO netCDF Operators version "(\d.*)" last "#;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(VERSION_PATTERN).expect("valid regex"));

/// Extract the NCO version from `--version` output.
pub fn parse_version(banner: &str) -> Option<String> {
    VERSION_RE
        .captures(banner)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Version of this crate.
pub fn module_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
