//! Everything a command needs: resolved config and the state directory

use crate::kube::KubeCtx;
use crate::tunnel::TunnelManager;
use anyhow::Result;
use l4b_c0re_lib::config::state_dir;
use l4b_c0re_lib::{ConfigSource, L4bConfig};
use std::path::{Path, PathBuf};

/// File recording the last project pushed, consumed by `l4b app create`
pub const LAST_PUSH_FILE: &str = "last-push.toml";

#[derive(Debug, Clone)]
pub struct Lab {
    pub config: L4bConfig,
    pub source: ConfigSource,
    pub state_dir: PathBuf,
}

impl Lab {
    pub fn load(config_path: Option<&Path>, state: Option<&Path>) -> Result<Self> {
        let (config, source) = L4bConfig::load(config_path)?;
        Ok(Self {
            config,
            source,
            state_dir: state_dir(state)?,
        })
    }

    pub fn kube_context(&self) -> String {
        self.config.cluster.context_name()
    }

    pub async fn kube(&self) -> Result<KubeCtx> {
        KubeCtx::connect(&self.kube_context()).await
    }

    pub fn tunnels(&self) -> TunnelManager {
        TunnelManager::new(&self.state_dir, &self.config)
    }

    pub fn report_path(&self) -> PathBuf {
        self.state_dir
            .join(crate::bootstrap::skeleton::REPORTS_DIR)
            .join("bootstrap-report.toml")
    }

    pub fn last_push_path(&self) -> PathBuf {
        self.state_dir.join(LAST_PUSH_FILE)
    }
}
