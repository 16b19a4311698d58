//! `l4b up`, `l4b down`, `l4b check`
//!
//! `up` runs the whole lab bring-up:
//! - Check prerequisites (auto-install missing tools unless skipped)
//! - Create the state skeleton (~/.l4b/*)
//! - Create or start the k3d cluster
//! - Install GitLab and ArgoCD and wait for their pods
//! - Open port-forward tunnels
//! - Optionally push a directory and wire it into ArgoCD
//! - Write the TOML report

use crate::bootstrap::report::{BootstrapReport, Endpoint};
use crate::bootstrap::{
    check_prerequisites, create_skeleton, detection, install_missing_optional,
    install_missing_required, print_prereqs, print_report, write_report,
};
use crate::cli::UpArgs;
use crate::cluster::{self, ClusterAction};
use crate::commands::push::{create_app, push, push_args_for};
use crate::commands::status::fetch_password;
use crate::commands::tunnel::{start_tunnels, stop_tunnels};
use crate::component::Component;
use crate::context::Lab;
use crate::kube::KubeCtx;
use crate::{argocd, gitlab, menu};
use anyhow::{Context, Result};
use l4b_c0re_lib::{ui, version};

pub async fn run_up(lab: &Lab, args: &UpArgs) -> Result<()> {
    println!("🥾 {} - local GitLab + ArgoCD lab", version::banner());
    ui::kv("config", &lab.source.to_string());

    // Check prerequisites
    ui::step("Checking prerequisites");
    let mut prereq_result = check_prerequisites(&lab.config.prereqs);

    if !args.skip_install && !prereq_result.all_required_met {
        ui::info("🔧 Auto-installing missing dependencies...");
        let installed = install_missing_required(&prereq_result)
            .await
            .context("Failed to auto-install dependencies")?;
        if !installed.is_empty() {
            ui::success(&format!("Installed: {}", installed.join(", ")));
            prereq_result = check_prerequisites(&lab.config.prereqs);
        }
    }
    if !args.skip_install && lab.config.argocd.enabled && !prereq_result.is_available("argocd") {
        let installed = install_missing_optional(&prereq_result).await?;
        if !installed.is_empty() {
            prereq_result = check_prerequisites(&lab.config.prereqs);
        }
    }
    print_prereqs(&prereq_result);

    if !prereq_result.all_required_met {
        let missing: Vec<&str> = prereq_result
            .missing_required()
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        anyhow::bail!(
            "⚠️  Bootstrap incomplete - required prerequisites missing: {}",
            missing.join(", ")
        );
    }

    let Some(runtime) = detection::container_runtime() else {
        anyhow::bail!("Container runtime daemon not reachable; start docker (or podman) first");
    };
    tracing::info!(runtime, "container runtime detected");

    let mut report = BootstrapReport::new(&lab.config.cluster.name, prereq_result);

    ui::step("Preparing state directory");
    let skeleton = create_skeleton(&lab.state_dir);
    if !skeleton.is_success() {
        for (path, error) in &skeleton.errors {
            ui::error(&format!("{}: {error}", path.display()));
        }
        anyhow::bail!("Failed to create state directory {}", lab.state_dir.display());
    }
    report.skeleton_result = Some(skeleton);

    let outcome = bring_up(lab, args, &mut report).await;

    if let Err(e) = write_report(&report, &lab.report_path()) {
        ui::warn(&format!("Could not write report: {e:#}"));
    }
    print_report(&report);
    outcome?;

    if !args.hide_credentials {
        print_credentials(lab, args).await;
    }

    ui::kv("report", &lab.report_path().display().to_string());
    println!();
    ui::success("Lab is up!");

    if args.menu {
        menu::run(lab).await?;
    }
    Ok(())
}

/// Cluster → components → tunnels → push; stops at the first failure
async fn bring_up(lab: &Lab, args: &UpArgs, report: &mut BootstrapReport) -> Result<()> {
    let config = &lab.config;

    ui::step(&format!("Cluster {}", config.cluster.name));
    match cluster::ensure_cluster(&config.cluster)? {
        ClusterAction::Created => ui::success("Cluster created"),
        ClusterAction::Started => ui::success("Cluster started"),
        ClusterAction::AlreadyRunning => {}
    }
    let kube = lab.kube().await?;
    let nodes = kube.wait_for_nodes(config.cluster.wait_timeout_secs).await?;
    ui::success(&format!("Nodes: {}", nodes.describe()));

    let mut installed = Vec::new();
    for component in Component::ALL {
        let skipped = match component {
            Component::Gitlab => args.skip_gitlab,
            Component::Argocd => args.skip_argocd,
        };
        let namespace = component.namespace(config).to_string();

        if skipped || !component.enabled(config) {
            report.record(component.name(), &namespace, "skipped", None);
            continue;
        }

        ui::step(&format!("Installing {}", component.title()));
        match install_component(lab, &kube, component).await {
            Ok(detail) => {
                ui::success(&format!("{} ready ({detail})", component.title()));
                report.record(component.name(), &namespace, "installed", Some(detail));
                installed.push(component);
            }
            Err(e) => {
                report.record(component.name(), &namespace, "failed", Some(format!("{e:#}")));
                return Err(e.context(format!("{} installation failed", component.title())));
            }
        }
    }

    if !args.no_tunnels && !installed.is_empty() {
        ui::step("Opening port-forward tunnels");
        start_tunnels(lab, &installed).await?;
        for &component in &installed {
            report.endpoints.push(Endpoint {
                name: component.name().to_string(),
                url: component.local_url(config),
                username: component.username(config).to_string(),
            });
        }
    }

    if let Some(dir) = &args.push {
        if !installed.contains(&Component::Gitlab) {
            anyhow::bail!("--push needs GitLab installed");
        }
        push(lab, &push_args_for(dir.clone())).await?;
        if installed.contains(&Component::Argocd) {
            create_app(lab, None, None).await?;
        }
    }

    Ok(())
}

async fn install_component(lab: &Lab, kube: &KubeCtx, component: Component) -> Result<String> {
    let readiness = match component {
        Component::Gitlab => gitlab::install(&lab.config.gitlab, kube).await?,
        Component::Argocd => argocd::install(&lab.config.argocd, kube).await?,
    };
    Ok(readiness.describe())
}

async fn print_credentials(lab: &Lab, args: &UpArgs) {
    ui::step("Credentials");
    for component in Component::ALL {
        let skipped = match component {
            Component::Gitlab => args.skip_gitlab,
            Component::Argocd => args.skip_argocd,
        };
        if skipped || !component.enabled(&lab.config) {
            continue;
        }
        match fetch_password(lab, component).await {
            Ok(password) => {
                ui::kv(
                    &format!("{} url", component.title()),
                    &component.local_url(&lab.config),
                );
                ui::kv(
                    &format!("{} user", component.title()),
                    component.username(&lab.config),
                );
                ui::kv(&format!("{} password", component.title()), &password);
            }
            Err(e) => ui::warn(&format!("{}: {e:#}", component.title())),
        }
    }
}

pub async fn run_down(lab: &Lab, keep_cluster: bool) -> Result<()> {
    ui::step("Closing tunnels");
    stop_tunnels(lab, &Component::ALL).await?;

    if keep_cluster {
        ui::info("Keeping cluster");
        return Ok(());
    }

    ui::step(&format!("Deleting cluster {}", lab.config.cluster.name));
    if cluster::delete_cluster(&lab.config.cluster)? {
        ui::success("Cluster deleted");
    } else {
        ui::info("Cluster did not exist");
    }
    Ok(())
}

pub async fn run_check(lab: &Lab, install: bool) -> Result<()> {
    ui::step("Checking prerequisites");
    let mut prereq_result = check_prerequisites(&lab.config.prereqs);

    if install && !prereq_result.all_required_met {
        let installed = install_missing_required(&prereq_result).await?;
        if !installed.is_empty() {
            prereq_result = check_prerequisites(&lab.config.prereqs);
        }
    }

    print_prereqs(&prereq_result);

    match detection::container_runtime() {
        Some(runtime) => ui::success(&format!("{runtime} daemon reachable")),
        None => ui::warn("No container runtime daemon reachable"),
    }

    if !prereq_result.all_required_met {
        anyhow::bail!(
            "{} required prerequisite(s) missing",
            prereq_result.missing_required().len()
        );
    }
    ui::success("All required prerequisites met");
    Ok(())
}
