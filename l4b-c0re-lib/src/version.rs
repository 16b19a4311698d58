//! 🤓 Single source of truth for the l4b version string

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `l4b <version>` banner used by `--version` and reports
pub fn banner() -> String {
    format!("l4b {VERSION}")
}
