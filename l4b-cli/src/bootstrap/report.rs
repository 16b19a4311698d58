//! Bootstrap report
//!
//! A TOML snapshot of what `l4b up` found and did: prerequisites, state
//! skeleton, installed components and the endpoints they are reachable on.
//! Credentials are never written here; `l4b password` reads them live.

use crate::bootstrap::prereq::PrereqResult;
use crate::bootstrap::skeleton::SkeletonResult;
use anyhow::{Context, Result};
use colored::Colorize;
use l4b_c0re_lib::ui;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Outcome of one installation phase
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComponentStatus {
    pub name: String,
    pub namespace: String,
    /// "installed", "skipped" or "failed"
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A URL the user can open once tunnels are up
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Endpoint {
    pub name: String,
    pub url: String,
    pub username: String,
}

/// Bootstrap report encompassing all phases
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub timestamp: String,
    pub version: String,
    pub cluster: String,
    pub prereq_result: PrereqResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton_result: Option<SkeletonResult>,
    pub components: Vec<ComponentStatus>,
    pub endpoints: Vec<Endpoint>,
}

impl BootstrapReport {
    pub fn new(cluster: &str, prereq_result: PrereqResult) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: l4b_c0re_lib::version::VERSION.to_string(),
            cluster: cluster.to_string(),
            prereq_result,
            skeleton_result: None,
            components: Vec::new(),
            endpoints: Vec::new(),
        }
    }

    pub fn record(&mut self, name: &str, namespace: &str, state: &str, detail: Option<String>) {
        self.components.push(ComponentStatus {
            name: name.to_string(),
            namespace: namespace.to_string(),
            state: state.to_string(),
            detail,
        });
    }
}

/// Serialize report to TOML
pub fn serialize_report(report: &BootstrapReport) -> Result<String> {
    let body = toml::to_string_pretty(report).context("Failed to serialize bootstrap report")?;
    Ok(format!("# l4b bootstrap report\n\n{body}"))
}

/// Write report to `output_path`, creating parent directories
pub fn write_report(report: &BootstrapReport, output_path: &Path) -> Result<()> {
    let content = serialize_report(report)?;

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {}", parent.display()))?;
    }

    fs::write(output_path, content)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    Ok(())
}

/// Print the prerequisite table
pub fn print_prereqs(prereq: &PrereqResult) {
    println!("{}", "Required:".bold());
    for bin in &prereq.required {
        print_binary(bin);
    }
    if !prereq.optional.is_empty() {
        println!("{}", "Optional:".bold());
        for bin in &prereq.optional {
            print_binary(bin);
        }
    }
}

fn print_binary(bin: &crate::bootstrap::prereq::BinaryCheck) {
    let mark = if bin.found && bin.meets_requirement {
        "✓".green()
    } else {
        "✗".red()
    };
    let version = bin.installed_version.as_deref().unwrap_or("not installed");
    println!(
        "  {mark} {:<28} {:<12} (needs {})",
        bin.label,
        version,
        bin.required_version
    );
    if !(bin.found && bin.meets_requirement) {
        if let Some(hint) = &bin.install_hint {
            println!("      {} {}", "hint:".dimmed(), hint);
        }
    }
}

/// Print the human summary of a finished bootstrap
pub fn print_report(report: &BootstrapReport) {
    ui::step(&format!("Summary for cluster {}", report.cluster));

    for component in &report.components {
        let state = match component.state.as_str() {
            "installed" => component.state.green(),
            "failed" => component.state.red(),
            _ => component.state.yellow(),
        };
        println!("  {:<10} {:<10} {}", component.name, component.namespace, state);
        if let Some(detail) = &component.detail {
            println!("      {}", detail.dimmed());
        }
    }

    if !report.endpoints.is_empty() {
        println!();
        for endpoint in &report.endpoints {
            ui::kv(&endpoint.name, &format!("{} (user: {})", endpoint.url, endpoint.username));
        }
        println!();
        ui::info("Run `l4b password <gitlab|argocd>` to print the generated passwords");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_prereqs() -> PrereqResult {
        PrereqResult {
            required: Vec::new(),
            optional: Vec::new(),
            all_required_met: true,
        }
    }

    #[test]
    fn test_report_records_components() {
        let mut report = BootstrapReport::new("l4b", empty_prereqs());
        report.record("gitlab", "gitlab", "installed", None);
        report.record("argocd", "argocd", "failed", Some("timed out".to_string()));
        assert_eq!(report.components.len(), 2);
        assert_eq!(report.components[1].state, "failed");
        assert_eq!(report.components[1].detail.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_write_report_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("bootstrap.toml");

        let mut report = BootstrapReport::new("l4b", empty_prereqs());
        report.record("gitlab", "gitlab", "installed", None);
        report.endpoints.push(Endpoint {
            name: "gitlab".to_string(),
            url: "http://127.0.0.1:8929".to_string(),
            username: "root".to_string(),
        });

        write_report(&report, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# l4b bootstrap report"));

        let parsed: toml::Value = toml::from_str(&content).unwrap();
        assert_eq!(parsed["cluster"].as_str(), Some("l4b"));
        assert_eq!(parsed["components"][0]["state"].as_str(), Some("installed"));
        assert_eq!(
            parsed["endpoints"][0]["url"].as_str(),
            Some("http://127.0.0.1:8929")
        );
        assert!(!content.contains("password"));
    }
}
