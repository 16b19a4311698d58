//! Typed errors for the l4b core
//!
//! The CLI crate wraps these in `anyhow` at the command layer.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum L4bError {
    #[snafu(display("failed to execute `{command}`: {source}"))]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("`{command}` failed ({status}): {stderr}"))]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse {}: {source}", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("failed to serialize configuration: {source}"))]
    ConfigSerialize { source: toml::ser::Error },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("{} already exists (use --force to overwrite)", path.display()))]
    ConfigExists { path: PathBuf },

    #[snafu(display("failed to locate user configuration: {source}"))]
    UserConfig { source: confy::ConfyError },

    #[snafu(display("could not determine home directory"))]
    NoHomeDir,

    #[snafu(display("required binary `{name}` not found ({hint})"))]
    MissingBinary { name: String, hint: String },

    #[snafu(display("timed out after {secs}s waiting for {what}"))]
    Timeout { what: String, secs: u64 },

    #[snafu(display("secret {namespace}/{name} has no `{key}` entry"))]
    SecretData {
        namespace: String,
        name: String,
        key: String,
    },
}

pub type Result<T, E = L4bError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display() {
        let err = CommandFailedSnafu {
            command: "k3d cluster list",
            status: "exit status: 1",
            stderr: "boom",
        }
        .build();
        assert_eq!(
            err.to_string(),
            "`k3d cluster list` failed (exit status: 1): boom"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = TimeoutSnafu {
            what: "pods in argocd",
            secs: 600u64,
        }
        .build();
        assert_eq!(err.to_string(), "timed out after 600s waiting for pods in argocd");
    }
}
