//! Auto-installer for missing lab tooling
//!
//! Uses the upstream install scripts on Linux and brew on macOS. Docker and
//! git are never auto-installed.

use crate::bootstrap::prereq::PrereqResult;
use anyhow::{Context, Result};
use l4b_c0re_lib::{Cmd, ui};

const K3D_INSTALL_SCRIPT: &str = "https://raw.githubusercontent.com/k3d-io/k3d/main/install.sh";
const HELM_INSTALL_SCRIPT: &str =
    "https://raw.githubusercontent.com/helm/helm/main/scripts/get-helm-3";
const KUBECTL_STABLE: &str = "https://dl.k8s.io/release/stable.txt";
const ARGOCD_RELEASES: &str = "https://github.com/argoproj/argo-cd/releases/latest/download";

/// Optional tools the installer has a recipe for
const INSTALLABLE_OPTIONAL: &[&str] = &["argocd"];

/// Install missing required binaries based on OS
pub async fn install_missing_required(prereq: &PrereqResult) -> Result<Vec<String>> {
    install_all(prereq.missing_required().into_iter().map(|b| b.name.as_str())).await
}

/// Install missing optional binaries (argocd) when asked to; others only
/// get their install hint
pub async fn install_missing_optional(prereq: &PrereqResult) -> Result<Vec<String>> {
    let (installable, manual): (Vec<_>, Vec<_>) = prereq
        .missing_optional()
        .into_iter()
        .partition(|b| INSTALLABLE_OPTIONAL.contains(&b.name.as_str()));

    for binary in manual {
        match &binary.install_hint {
            Some(hint) => ui::info(&format!("{} is not installed: {hint}", binary.name)),
            None => ui::info(&format!("{} is not installed", binary.name)),
        }
    }

    install_all(installable.into_iter().map(|b| b.name.as_str())).await
}

async fn install_all<'a>(names: impl Iterator<Item = &'a str>) -> Result<Vec<String>> {
    let mut installed = Vec::new();

    for name in names {
        ui::info(&format!("🔧 Installing {name}..."));

        match install_binary(name).await {
            Ok(()) => {
                installed.push(name.to_string());
                ui::success(&format!("{name} installed"));
            }
            Err(e) => {
                ui::error(&format!("Failed to install {name}: {e:#}"));
            }
        }
    }

    Ok(installed)
}

/// Install a single binary using appropriate mechanism
async fn install_binary(name: &str) -> Result<()> {
    if cfg!(target_os = "linux") {
        install_linux(name).await
    } else if cfg!(target_os = "macos") {
        install_macos(name).await
    } else {
        anyhow::bail!("Unsupported OS for auto-install")
    }
}

/// Install on Linux using the projects' own install scripts
async fn install_linux(name: &str) -> Result<()> {
    match name {
        "k3d" => run_script(K3D_INSTALL_SCRIPT),
        "helm" => run_script(HELM_INSTALL_SCRIPT),
        "kubectl" => {
            let version = Cmd::new("curl").args(["-fsSL", KUBECTL_STABLE]).output()?;
            let arch = release_arch(std::env::consts::ARCH)?;
            let url = format!(
                "https://dl.k8s.io/release/{}/bin/linux/{arch}/kubectl",
                version.trim()
            );
            install_downloaded(&url, "kubectl")
        }
        "argocd" => {
            let arch = release_arch(std::env::consts::ARCH)?;
            install_downloaded(&format!("{ARGOCD_RELEASES}/argocd-linux-{arch}"), "argocd")
        }
        "docker" | "git" => anyhow::bail!(
            "{name} must be installed through your distribution's packages"
        ),
        _ => anyhow::bail!("Unknown binary: {name}"),
    }
}

/// Architecture name used in kubectl and argocd release artifacts
fn release_arch(arch: &str) -> Result<&'static str> {
    match arch {
        "x86_64" => Ok("amd64"),
        "aarch64" => Ok("arm64"),
        other => anyhow::bail!("No prebuilt kubectl/argocd release for {other}"),
    }
}

/// Install on macOS using brew
async fn install_macos(name: &str) -> Result<()> {
    match name {
        "k3d" | "helm" | "argocd" | "git" => {
            Cmd::new("brew").args(["install", name]).run()?;
        }
        "kubectl" => {
            Cmd::new("brew").args(["install", "kubernetes-cli"]).run()?;
        }
        "docker" => anyhow::bail!("install Docker Desktop, OrbStack or colima first"),
        _ => anyhow::bail!("Unknown binary: {name}"),
    }
    Ok(())
}

/// `curl -fsSL <url> | bash`
fn run_script(url: &str) -> Result<()> {
    Cmd::new("curl")
        .args(["-fsSL", url])
        .pipe_into(&Cmd::new("bash"))
        .with_context(|| format!("install script {url} failed"))?;
    Ok(())
}

/// Download a static binary and move it to /usr/local/bin
fn install_downloaded(url: &str, name: &str) -> Result<()> {
    let tmp = std::env::temp_dir().join(format!("l4b-{name}"));
    let tmp_str = tmp.to_string_lossy().to_string();

    let target = format!("/usr/local/bin/{name}");

    Cmd::new("curl")
        .args(["-fsSL", "-o", tmp_str.as_str(), url])
        .run()?;
    Cmd::new("sudo")
        .args(["install", "-m", "0755", tmp_str.as_str(), target.as_str()])
        .run()?;
    let _ = std::fs::remove_file(&tmp);
    Ok(())
}
