//! Bootstrap module for the l4b lab
//!
//! The tool-agnostic phases of `l4b up`:
//! - Prerequisite checking (required binaries, versions)
//! - Auto-installation of missing tooling
//! - Container runtime / kube context detection
//! - State skeleton generation (~/.l4b/ directories)
//! - TOML reporting

pub mod detection;
pub mod installer;
pub mod prereq;
pub mod report;
pub mod skeleton;

pub use installer::{install_missing_optional, install_missing_required};
pub use prereq::{PrereqResult, check_prerequisites};
pub use report::{BootstrapReport, print_prereqs, print_report, write_report};
pub use skeleton::create_skeleton;
