//! `l4b config`: show, init, locate

use crate::cli::ConfigAction;
use crate::context::Lab;
use anyhow::Result;
use l4b_c0re_lib::config::{LOCAL_CONFIG_FILE, user_config_path};
use l4b_c0re_lib::{L4bConfig, ui};
use std::path::PathBuf;

pub fn handle_config_command(action: ConfigAction, lab: &Lab) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# source: {}", lab.source);
            print!("{}", lab.config.to_toml_string()?);
            Ok(())
        }
        ConfigAction::Init { path, force } => {
            let path = path.unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE));
            L4bConfig::default().write_to(&path, force)?;
            ui::success(&format!("Wrote {}", path.display()));
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", lab.source);
            if let Ok(user) = user_config_path() {
                ui::kv("user config", &user.display().to_string());
            }
            ui::kv("state dir", &lab.state_dir.display().to_string());
            Ok(())
        }
    }
}
