//! Core shared library for l4b
//!
//! Everything the `l4b` binary needs that is not tied to a particular
//! tool driver lives here:
//! - typed errors ([`error`])
//! - the `l4b.toml` configuration model ([`config`])
//! - external command execution over duct ([`exec`])
//! - tracing setup and colored status output ([`logging`])

pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod version;

pub use config::{
    AppConfig, ArgocdConfig, BinarySpec, ClusterConfig, ConfigSource, GitlabConfig, L4bConfig,
    PrereqConfig, PushConfig, TunnelConfig,
};
pub use error::{L4bError, Result};
pub use exec::{Cmd, command_available};
pub use logging::{init_tracing, ui};
