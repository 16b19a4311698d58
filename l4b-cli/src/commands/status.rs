//! `l4b status`, `l4b password`, `l4b logs`

use crate::bootstrap::detection;
use crate::cluster;
use crate::commands::tunnel::print_tunnel_status;
use crate::component::Component;
use crate::context::Lab;
use crate::{argocd, gitlab};
use anyhow::Result;
use colored::Colorize;
use l4b_c0re_lib::ui;

pub async fn show_status(lab: &Lab) -> Result<()> {
    let cluster_cfg = &lab.config.cluster;
    ui::step(&format!("Cluster {}", cluster_cfg.name));

    match detection::container_runtime() {
        Some(runtime) => ui::kv("runtime", runtime),
        None => ui::warn("No container runtime daemon reachable (docker/podman)"),
    }
    if let Some(context) = detection::current_kube_context() {
        ui::kv("kube context", &context);
    }

    let Some(found) = cluster::find_cluster(&cluster_cfg.name)? else {
        ui::warn(&format!("Cluster {} does not exist; run `l4b up`", cluster_cfg.name));
        return Ok(());
    };
    ui::kv(
        "servers",
        &format!("{}/{} running", found.servers_running, found.servers_count),
    );
    ui::kv(
        "agents",
        &format!("{}/{} running", found.agents_running, found.agents_count),
    );
    if !found.is_running() {
        ui::warn("Cluster is stopped; run `l4b up` to start it");
        return Ok(());
    }

    let kube = lab.kube().await?;
    ui::kv("nodes", &kube.nodes_summary().await?.describe());

    ui::step("Components");
    for component in Component::ALL {
        if !component.enabled(&lab.config) {
            println!("  {:<8} {}", component.name(), "disabled".dimmed());
            continue;
        }
        let namespace = component.namespace(&lab.config);
        let readiness = kube.pods_summary(namespace).await?;
        let summary = if readiness.total == 0 {
            "not installed".yellow()
        } else if readiness.all_ready() {
            readiness.describe().green()
        } else {
            readiness.describe().yellow()
        };
        println!("  {:<8} {:<8} {}", component.name(), namespace, summary);
    }

    ui::step("Tunnels");
    print_tunnel_status(lab);
    Ok(())
}

/// Read a component's generated password from its secret
pub async fn fetch_password(lab: &Lab, component: Component) -> Result<String> {
    let kube = lab.kube().await?;
    match component {
        Component::Gitlab => gitlab::root_password(&lab.config.gitlab, &kube).await,
        Component::Argocd => argocd::admin_password(&lab.config.argocd, &kube).await,
    }
}

pub async fn show_password(lab: &Lab, component: Component) -> Result<()> {
    let password = fetch_password(lab, component).await?;
    ui::kv(
        &format!("{} user", component.title()),
        component.username(&lab.config),
    );
    ui::kv(&format!("{} password", component.title()), &password);
    ui::kv(&format!("{} url", component.title()), &component.local_url(&lab.config));
    Ok(())
}

pub async fn show_logs(lab: &Lab, component: Component, tail: u32, follow: bool) -> Result<()> {
    let kube = lab.kube().await?;
    kube.logs(
        component.namespace(&lab.config),
        component.log_selector(&lab.config),
        tail,
        follow,
    )
}
