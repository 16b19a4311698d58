//! helm invocations used by the GitLab install

use anyhow::{Context, Result};
use l4b_c0re_lib::Cmd;

/// Chart installation request
#[derive(Debug, Clone)]
pub struct Release<'a> {
    pub name: &'a str,
    pub chart: &'a str,
    pub namespace: &'a str,
    pub version: Option<&'a str>,
    pub values: &'a [(String, String)],
    pub timeout_secs: u64,
}

fn helm(kube_context: &str) -> Cmd {
    Cmd::new("helm").args(["--kube-context", kube_context])
}

/// `helm repo add --force-update`, safe to repeat
pub fn repo_add(name: &str, url: &str) -> Result<()> {
    Cmd::new("helm")
        .args(["repo", "add", name, url, "--force-update"])
        .output()
        .with_context(|| format!("Failed to add helm repo {name} ({url})"))?;
    Ok(())
}

pub fn repo_update(name: &str) -> Result<()> {
    Cmd::new("helm")
        .args(["repo", "update", name])
        .output()
        .with_context(|| format!("Failed to update helm repo {name}"))?;
    Ok(())
}

/// `helm upgrade --install` arguments
///
/// No `--wait`: readiness is polled through the kube client so progress can
/// be reported while GitLab's many pods come up.
pub fn upgrade_install_args(release: &Release<'_>) -> Vec<String> {
    let mut args = vec![
        "upgrade".to_string(),
        "--install".to_string(),
        release.name.to_string(),
        release.chart.to_string(),
        "--namespace".to_string(),
        release.namespace.to_string(),
        "--create-namespace".to_string(),
        "--timeout".to_string(),
        format!("{}s", release.timeout_secs),
    ];
    if let Some(version) = release.version {
        args.push("--version".to_string());
        args.push(version.to_string());
    }
    for (key, value) in release.values {
        args.push("--set".to_string());
        args.push(format!("{key}={value}"));
    }
    args
}

pub fn upgrade_install(kube_context: &str, release: &Release<'_>) -> Result<()> {
    helm(kube_context)
        .args(upgrade_install_args(release))
        .run()
        .with_context(|| format!("helm upgrade --install {} failed", release.name))?;
    Ok(())
}

/// Whether `helm status` knows the release
pub fn release_installed(kube_context: &str, name: &str, namespace: &str) -> bool {
    helm(kube_context)
        .args(["status", name, "--namespace", namespace])
        .succeeds()
}
