//! Interactive menu for re-running common lab actions
//!
//! Uses dialoguer for terminal-based selection. A failing action is reported
//! and the menu comes back; only Quit (or Esc) leaves the loop.

use crate::commands::push::{create_app, push, push_args_for, sync_app};
use crate::commands::status::{show_logs, show_password, show_status};
use crate::commands::tunnel::{restart_tunnels, selected};
use crate::component::Component;
use crate::context::Lab;
use anyhow::Result;
use dialoguer::{Input, Select};
use l4b_c0re_lib::ui;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Status,
    Logs(Component),
    Password(Component),
    RestartTunnels,
    Push,
    CreateApp,
    SyncApp,
    Quit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 10] = [
        MenuAction::Status,
        MenuAction::Logs(Component::Gitlab),
        MenuAction::Logs(Component::Argocd),
        MenuAction::Password(Component::Gitlab),
        MenuAction::Password(Component::Argocd),
        MenuAction::RestartTunnels,
        MenuAction::Push,
        MenuAction::CreateApp,
        MenuAction::SyncApp,
        MenuAction::Quit,
    ];

    pub fn label(self) -> String {
        match self {
            Self::Status => "📊 Show status".to_string(),
            Self::Logs(c) => format!("📜 Show {} logs", c.title()),
            Self::Password(c) => format!("🔑 Show {} password", c.title()),
            Self::RestartTunnels => "🔁 Restart port-forwards".to_string(),
            Self::Push => "📤 Push a directory to GitLab".to_string(),
            Self::CreateApp => "🧩 Create ArgoCD application".to_string(),
            Self::SyncApp => "🔄 Sync ArgoCD application".to_string(),
            Self::Quit => "👋 Quit".to_string(),
        }
    }
}

async fn perform(lab: &Lab, action: MenuAction) -> Result<()> {
    match action {
        MenuAction::Status => show_status(lab).await,
        MenuAction::Logs(component) => show_logs(lab, component, 50, false).await,
        MenuAction::Password(component) => show_password(lab, component).await,
        MenuAction::RestartTunnels => restart_tunnels(lab, &selected(lab, None)).await,
        MenuAction::Push => {
            let dir: String = Input::new()
                .with_prompt("Directory to push")
                .default(".".to_string())
                .interact_text()?;
            push(lab, &push_args_for(PathBuf::from(dir))).await.map(|_| ())
        }
        MenuAction::CreateApp => create_app(lab, None, None).await,
        MenuAction::SyncApp => sync_app(lab, None).await,
        MenuAction::Quit => Ok(()),
    }
}

pub async fn run(lab: &Lab) -> Result<()> {
    let labels: Vec<String> = MenuAction::ALL.iter().map(|a| a.label()).collect();

    loop {
        println!();
        let choice = Select::new()
            .with_prompt(format!("l4b · {}", lab.config.cluster.name))
            .items(&labels)
            .default(0)
            .interact_opt()?;

        let action = match choice {
            Some(index) => MenuAction::ALL[index],
            None => MenuAction::Quit,
        };
        if action == MenuAction::Quit {
            return Ok(());
        }

        if let Err(e) = perform(lab, action).await {
            ui::error(&format!("{e:#}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_has_quit_last_and_unique_labels() {
        assert_eq!(MenuAction::ALL.last(), Some(&MenuAction::Quit));
        let mut labels: Vec<String> = MenuAction::ALL.iter().map(|a| a.label()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), MenuAction::ALL.len());
    }
}
