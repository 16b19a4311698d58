//! External command execution
//!
//! Thin builder over duct. Every driver in l4b-cli (k3d, kubectl, helm,
//! argocd, git) goes through [`Cmd`] so failures carry the command line and
//! stderr, and secrets registered with [`Cmd::secret`] never reach logs.

use crate::error::{CommandFailedSnafu, Result, SpawnSnafu};
use snafu::ResultExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;

#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    dir: Option<PathBuf>,
    env: Vec<(String, String)>,
    secrets: Vec<String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            env: Vec::new(),
            secrets: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Mark a value that must be masked whenever this command is displayed
    #[must_use]
    pub fn secret(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.secrets.push(value);
        }
        self
    }

    /// Command line with secrets replaced by `***`
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        self.redact(&line)
    }

    fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret, "***"))
    }

    fn expression(&self) -> duct::Expression {
        let args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        let mut expr = duct::cmd(&self.program, args);
        if let Some(dir) = &self.dir {
            expr = expr.dir(dir);
        }
        for (key, value) in &self.env {
            expr = expr.env(key, value);
        }
        expr
    }

    fn check(&self, command: String, output: &Output) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        CommandFailedSnafu {
            command,
            status: output.status.to_string(),
            stderr: self.redact(stderr.trim()),
        }
        .fail()
    }

    /// Run with captured output, returning stdout; non-zero exit is an error
    pub fn output(&self) -> Result<String> {
        let command = self.display();
        tracing::debug!(%command, "exec");
        let output = self
            .expression()
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .context(SpawnSnafu {
                command: command.clone(),
            })?;
        self.check(command, &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run with stdout inherited (progress visible); stderr is still captured
    /// for the error message
    pub fn run(&self) -> Result<()> {
        let command = self.display();
        tracing::debug!(%command, "exec (streaming)");
        let output = self
            .expression()
            .stderr_capture()
            .unchecked()
            .run()
            .context(SpawnSnafu {
                command: command.clone(),
            })?;
        self.check(command, &output)
    }

    /// Run attached to the terminal (logs --follow and friends)
    pub fn run_interactive(&self) -> Result<()> {
        let command = self.display();
        tracing::debug!(%command, "exec (interactive)");
        let output = self
            .expression()
            .unchecked()
            .run()
            .context(SpawnSnafu {
                command: command.clone(),
            })?;
        self.check(command, &output)
    }

    /// True when the command could be spawned and exited zero
    pub fn succeeds(&self) -> bool {
        self.expression()
            .stdout_null()
            .stderr_null()
            .unchecked()
            .run()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// `self | next`, returning the captured stdout of `next`
    pub fn pipe_into(&self, next: &Cmd) -> Result<String> {
        let command = format!("{} | {}", self.display(), next.display());
        tracing::debug!(%command, "exec (pipeline)");
        let output = self
            .expression()
            .pipe(next.expression())
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .context(SpawnSnafu {
                command: command.clone(),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return CommandFailedSnafu {
                command,
                status: output.status.to_string(),
                stderr: next.redact(&self.redact(stderr.trim())),
            }
            .fail();
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Check if a command is available in PATH
pub fn command_available(cmd: &str) -> bool {
    Cmd::new("which").arg(cmd).succeeds()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_redacts_secrets() {
        let cmd = Cmd::new("argocd")
            .args(["login", "127.0.0.1:8080", "--password", "hunter2"])
            .secret("hunter2");
        assert_eq!(cmd.display(), "argocd login 127.0.0.1:8080 --password ***");
    }

    #[test]
    fn test_empty_secret_is_ignored() {
        let cmd = Cmd::new("echo").arg("a").secret("");
        assert_eq!(cmd.display(), "echo a");
    }

    #[test]
    fn test_output_captures_stdout() {
        let out = Cmd::new("sh").args(["-c", "echo hello"]).output().unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[test]
    fn test_output_failure_carries_stderr() {
        let err = Cmd::new("sh")
            .args(["-c", "echo nope-s3cret >&2; exit 3"])
            .secret("s3cret")
            .output()
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("nope-***"), "{message}");
        assert!(!message.contains("s3cret"));
    }

    #[test]
    fn test_spawn_failure() {
        let err = Cmd::new("definitely-not-a-real-binary-l4b").output().unwrap_err();
        assert!(err.to_string().starts_with("failed to execute"));
    }

    #[test]
    fn test_succeeds() {
        assert!(Cmd::new("true").succeeds());
        assert!(!Cmd::new("false").succeeds());
        assert!(!Cmd::new("definitely-not-a-real-binary-l4b").succeeds());
    }

    #[test]
    fn test_dir_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let out = Cmd::new("sh")
            .args(["-c", "pwd; echo $L4B_TEST_VALUE"])
            .dir(dir.path())
            .env("L4B_TEST_VALUE", "42")
            .output()
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(Path::new(lines[0]).canonicalize().unwrap(), expected);
        assert_eq!(lines[1], "42");
    }

    #[test]
    fn test_pipe_into() {
        let out = Cmd::new("printf")
            .arg("b\na\n")
            .pipe_into(&Cmd::new("sort"))
            .unwrap();
        assert_eq!(out, "a\nb\n");
    }
}
