pub mod bootstrap;
pub mod config;
pub mod push;
pub mod status;
pub mod tunnel;

use crate::cli::Commands;
use crate::context::Lab;
use anyhow::Result;

/// Dispatch a parsed subcommand
pub async fn handle_command(command: Commands, lab: &Lab) -> Result<()> {
    match command {
        Commands::Up(args) => bootstrap::run_up(lab, &args).await,
        Commands::Down { keep_cluster } => bootstrap::run_down(lab, keep_cluster).await,
        Commands::Check { install } => bootstrap::run_check(lab, install).await,
        Commands::Status => status::show_status(lab).await,
        Commands::Password { component } => status::show_password(lab, component).await,
        Commands::Tunnel { action } => tunnel::handle_tunnel_command(action, lab).await,
        Commands::Logs {
            component,
            tail,
            follow,
        } => status::show_logs(lab, component, tail, follow).await,
        Commands::Push(args) => push::push(lab, &args).await.map(|_| ()),
        Commands::App { action } => push::handle_app_command(action, lab).await,
        Commands::Menu => crate::menu::run(lab).await,
        Commands::Config { action } => config::handle_config_command(action, lab),
    }
}
