//! `l4b tunnel`: open, close and inspect port-forwards

use crate::cli::TunnelAction;
use crate::component::Component;
use crate::context::Lab;
use crate::tunnel::{Tunnel, TunnelState};
use anyhow::Result;
use colored::Colorize;
use l4b_c0re_lib::ui;

/// The named component, or every enabled one
pub fn selected(lab: &Lab, component: Option<Component>) -> Vec<Component> {
    match component {
        Some(component) => vec![component],
        None => Component::ALL
            .into_iter()
            .filter(|c| c.enabled(&lab.config))
            .collect(),
    }
}

/// Make sure the component's tunnel is up before talking to it
pub async fn ensure_tunnel(lab: &Lab, component: Component) -> Result<()> {
    let tunnel = Tunnel::for_component(component, &lab.config);
    let status = lab.tunnels().start(&lab.kube_context(), &tunnel).await?;
    tracing::debug!(?status, "tunnel ensured");
    Ok(())
}

pub async fn start_tunnels(lab: &Lab, components: &[Component]) -> Result<()> {
    let manager = lab.tunnels();
    for &component in components {
        let tunnel = Tunnel::for_component(component, &lab.config);
        let was_running = manager.status(&tunnel).is_running();
        let status = manager.start(&lab.kube_context(), &tunnel).await?;
        if was_running {
            ui::info(&format!(
                "{} tunnel already open on port {}",
                component.title(),
                status.local_port
            ));
        } else {
            ui::success(&format!(
                "{} tunnel open: {}",
                component.title(),
                component.local_url(&lab.config)
            ));
        }
    }
    Ok(())
}

pub async fn stop_tunnels(lab: &Lab, components: &[Component]) -> Result<()> {
    let manager = lab.tunnels();
    for &component in components {
        let tunnel = Tunnel::for_component(component, &lab.config);
        if manager.stop(&tunnel).await? {
            ui::success(&format!("{} tunnel closed", component.title()));
        } else {
            ui::info(&format!("{} tunnel was not running", component.title()));
        }
    }
    Ok(())
}

pub async fn restart_tunnels(lab: &Lab, components: &[Component]) -> Result<()> {
    let manager = lab.tunnels();
    for &component in components {
        let tunnel = Tunnel::for_component(component, &lab.config);
        manager.restart(&lab.kube_context(), &tunnel).await?;
        ui::success(&format!(
            "{} tunnel restarted: {}",
            component.title(),
            component.local_url(&lab.config)
        ));
    }
    Ok(())
}

pub fn print_tunnel_status(lab: &Lab) {
    let manager = lab.tunnels();
    for component in Component::ALL {
        let tunnel = Tunnel::for_component(component, &lab.config);
        let status = manager.status(&tunnel);
        let state = match status.state {
            TunnelState::Running(pid) => format!("running (pid {pid})").green(),
            TunnelState::Stale(pid) => format!("stale pidfile (pid {pid})").yellow(),
            TunnelState::Stopped => "stopped".dimmed(),
        };
        println!(
            "  {:<8} :{:<6} → svc/{}:{}  {}",
            component.name(),
            tunnel.local_port,
            tunnel.service,
            tunnel.remote_port,
            state
        );
    }
}

pub async fn handle_tunnel_command(action: TunnelAction, lab: &Lab) -> Result<()> {
    match action {
        TunnelAction::Start { component } => start_tunnels(lab, &selected(lab, component)).await,
        TunnelAction::Stop { component } => stop_tunnels(lab, &selected(lab, component)).await,
        TunnelAction::Restart { component } => {
            restart_tunnels(lab, &selected(lab, component)).await
        }
        TunnelAction::Status => {
            print_tunnel_status(lab);
            Ok(())
        }
    }
}
