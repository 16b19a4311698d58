//! Prerequisite checker for l4b bootstrap
//!
//! Validates that the tools the lab drives (docker, k3d, kubectl, helm, git,
//! optionally argocd) are installed with acceptable versions.

use anyhow::{Context, Result};
use l4b_c0re_lib::{BinarySpec, Cmd, PrereqConfig};
use serde::Serialize;
use std::path::PathBuf;

/// Result of prerequisite check for a single binary
#[derive(Debug, Clone, Serialize)]
pub struct BinaryCheck {
    pub name: String,
    /// Display label, differs from `name` when an alternative satisfied it
    pub label: String,
    pub found: bool,
    pub installed_version: Option<String>,
    pub required_version: String,
    pub meets_requirement: bool,
    pub path: Option<PathBuf>,
    pub install_hint: Option<String>,
    pub using_alternative: bool,
    #[serde(skip)]
    pub priority: u8,
}

/// Overall prerequisite check result
#[derive(Debug, Clone, Serialize)]
pub struct PrereqResult {
    pub required: Vec<BinaryCheck>,
    pub optional: Vec<BinaryCheck>,
    pub all_required_met: bool,
}

impl PrereqResult {
    /// Get list of missing required binaries
    pub fn missing_required(&self) -> Vec<&BinaryCheck> {
        self.required
            .iter()
            .filter(|b| !b.found || !b.meets_requirement)
            .collect()
    }

    /// Get list of missing optional binaries
    pub fn missing_optional(&self) -> Vec<&BinaryCheck> {
        self.optional
            .iter()
            .filter(|b| !b.found || !b.meets_requirement)
            .collect()
    }

    /// Whether a binary (required or optional) is usable
    pub fn is_available(&self, name: &str) -> bool {
        self.required
            .iter()
            .chain(self.optional.iter())
            .any(|b| b.name == name && b.found && b.meets_requirement)
    }
}

/// Check if binary exists in PATH
fn find_binary(name: &str) -> Option<PathBuf> {
    Cmd::new("which")
        .arg(name)
        .output()
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Get version of binary by running `<binary> <version_args>`
fn get_version(name: &str, version_args: &[String]) -> Option<String> {
    let output = Cmd::new(name).args(version_args.iter().cloned()).output().ok()?;
    extract_version(&output)
}

/// Check if docker binary is actually podman
/// 🤓 Checks both symlink target and version output
fn is_docker_actually_podman(docker_path: &std::path::Path) -> bool {
    if let Ok(canonical) = std::fs::canonicalize(docker_path) {
        if canonical.to_string_lossy().contains("podman") {
            return true;
        }
    }

    Cmd::new("docker")
        .arg("--version")
        .output()
        .map(|out| out.to_lowercase().contains("podman"))
        .unwrap_or(false)
}

/// Extract semantic version from version output
/// Handles various formats:
///   "git version 2.34.1" -> "2.34.1"
///   "Docker version 24.0.5, build ced0996" -> "24.0.5"
///   "k3d version v5.6.0" -> "5.6.0"
///   "v3.14.2+g9bc4ed2" -> "3.14.2"
pub fn extract_version(output: &str) -> Option<String> {
    let re = regex::Regex::new(r"v?(\d+\.\d+\.\d+)").ok()?;
    re.captures(output)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// Check if installed version meets requirement
/// Parses requirement like ">=1.0.0" and compares versions
pub fn version_meets_requirement(installed: &str, requirement: &str) -> Result<bool> {
    let requirement = requirement.trim();

    let (op, required_ver_str) = [">=", "<=", ">", "<", "="]
        .iter()
        .find_map(|op| requirement.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("=", requirement));

    let installed_ver = semver::Version::parse(installed.trim())
        .with_context(|| format!("Failed to parse installed version: {installed}"))?;

    let required_ver = semver::Version::parse(required_ver_str.trim())
        .with_context(|| format!("Failed to parse required version: {required_ver_str}"))?;

    Ok(match op {
        ">=" => installed_ver >= required_ver,
        "<=" => installed_ver <= required_ver,
        ">" => installed_ver > required_ver,
        "<" => installed_ver < required_ver,
        _ => installed_ver == required_ver,
    })
}

/// Check a single binary against its `BinarySpec`
/// 🤓 docker can be satisfied by podman; k3d then needs DOCKER_HOST pointed at it
fn check_binary(name: &str, spec: &BinarySpec) -> BinaryCheck {
    let mut path = find_binary(name);
    let mut label = name.to_string();
    let mut using_alternative = false;
    let mut version_binary = name.to_string();

    if name == "docker" {
        match &path {
            Some(docker_path) if is_docker_actually_podman(docker_path) => {
                label = "docker (via podman)".to_string();
                using_alternative = true;
            }
            None => {
                if let Some(podman_path) = find_binary("podman") {
                    path = Some(podman_path);
                    label = "podman (docker alternative)".to_string();
                    using_alternative = true;
                    version_binary = "podman".to_string();
                }
            }
            Some(_) => {}
        }
    }

    let found = path.is_some();
    let (installed_version, meets_requirement) = if found {
        if let Some(version) = get_version(&version_binary, &spec.version_args) {
            // 🤓 podman versions don't track docker's, accept the alternative
            let meets = using_alternative
                || version_meets_requirement(&version, &spec.version).unwrap_or(false);
            (Some(version), meets)
        } else {
            // 🤓 Binary found but version unknown - assume OK
            (Some("unknown".to_string()), true)
        }
    } else {
        (None, false)
    };

    tracing::debug!(name, found, ?installed_version, meets_requirement, "prerequisite checked");

    BinaryCheck {
        name: name.to_string(),
        label,
        found,
        installed_version,
        required_version: spec.version.clone(),
        meets_requirement,
        path,
        install_hint: spec.install_hint.clone(),
        using_alternative,
        priority: spec.priority,
    }
}

/// Check all prerequisites from the configured binary lists
pub fn check_prerequisites(config: &PrereqConfig) -> PrereqResult {
    let mut required: Vec<BinaryCheck> = config
        .required_bins
        .iter()
        .map(|(name, spec)| check_binary(name, spec))
        .collect();

    let mut optional: Vec<BinaryCheck> = config
        .optional_bins
        .iter()
        .map(|(name, spec)| check_binary(name, spec))
        .collect();

    // Sort by priority (lower number = higher priority)
    required.sort_by_key(|check| check.priority);
    optional.sort_by_key(|check| check.priority);

    let all_required_met = required
        .iter()
        .all(|check| check.found && check.meets_requirement);

    PrereqResult {
        required,
        optional,
        all_required_met,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_extract_version() {
        assert_eq!(
            extract_version("git version 2.34.1"),
            Some("2.34.1".to_string())
        );
        assert_eq!(
            extract_version("Docker version 24.0.5, build ced0996"),
            Some("24.0.5".to_string())
        );
        assert_eq!(
            extract_version("k3d version v5.6.0\nk3s version v1.27.4-k3s1 (default)"),
            Some("5.6.0".to_string())
        );
        assert_eq!(
            extract_version("v3.14.2+g9bc4ed2"),
            Some("3.14.2".to_string())
        );
        assert_eq!(extract_version("no digits here"), None);
    }

    #[test]
    fn test_version_comparison() {
        assert!(version_meets_requirement("2.34.1", ">=2.30.0").unwrap());
        assert!(!version_meets_requirement("2.29.0", ">=2.30.0").unwrap());
        assert!(version_meets_requirement("1.0.0", "=1.0.0").unwrap());
        assert!(!version_meets_requirement("1.0.1", "=1.0.0").unwrap());
        assert!(version_meets_requirement("1.0.1", "1.0.1").unwrap());
        assert!(version_meets_requirement("0.9.0", "<1.0.0").unwrap());
        assert!(version_meets_requirement("1.0.0", "<=1.0.0").unwrap());
        assert!(!version_meets_requirement("1.0.0", ">1.0.0").unwrap());
        assert!(version_meets_requirement("garbage", ">=1.0.0").is_err());
    }

    #[test]
    fn test_missing_binary_reported() {
        let mut required_bins = BTreeMap::new();
        required_bins.insert(
            "definitely-not-a-real-binary-l4b".to_string(),
            BinarySpec {
                version: ">=1.0.0".to_string(),
                priority: 1,
                version_args: vec!["--version".to_string()],
                install_hint: Some("nowhere".to_string()),
            },
        );
        let config = PrereqConfig {
            required_bins,
            optional_bins: BTreeMap::new(),
        };

        let result = check_prerequisites(&config);
        assert!(!result.all_required_met);
        assert_eq!(result.missing_required().len(), 1);
        assert!(result.missing_optional().is_empty());
        assert!(!result.is_available("definitely-not-a-real-binary-l4b"));
        assert_eq!(result.required[0].install_hint.as_deref(), Some("nowhere"));
    }

    #[test]
    fn test_required_sorted_by_priority() {
        let spec = |priority| BinarySpec {
            version: ">=0.0.1".to_string(),
            priority,
            version_args: vec!["--version".to_string()],
            install_hint: None,
        };
        let mut required_bins = BTreeMap::new();
        required_bins.insert("zzz-l4b-missing".to_string(), spec(1));
        required_bins.insert("aaa-l4b-missing".to_string(), spec(9));
        let config = PrereqConfig {
            required_bins,
            optional_bins: BTreeMap::new(),
        };

        let result = check_prerequisites(&config);
        let names: Vec<&str> = result.required.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["zzz-l4b-missing", "aaa-l4b-missing"]);
    }
}
