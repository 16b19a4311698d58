use clap::Parser;
use l4b_c0re_lib::{init_tracing, ui};
use l4b_cli::commands::handle_command;
use l4b_cli::{Cli, Lab};
use std::process::exit;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    let lab = match Lab::load(cli.config.as_deref(), cli.state_dir.as_deref()) {
        Ok(lab) => lab,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            exit(2);
        }
    };

    if let Err(e) = handle_command(cli.command, &lab).await {
        ui::error(&format!("{e:#}"));
        exit(1);
    }
}
