//! k3d cluster lifecycle
//!
//! Create once, start if stopped, delete once. Everything else about the
//! cluster is read back from Kubernetes itself.

use anyhow::{Context, Result};
use l4b_c0re_lib::{ClusterConfig, Cmd, ui};
use serde::Deserialize;

/// One entry of `k3d cluster list -o json`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct K3dCluster {
    pub name: String,
    #[serde(default)]
    pub servers_count: u32,
    #[serde(default)]
    pub servers_running: u32,
    #[serde(default)]
    pub agents_count: u32,
    #[serde(default)]
    pub agents_running: u32,
}

impl K3dCluster {
    pub fn is_running(&self) -> bool {
        self.servers_count > 0 && self.servers_running == self.servers_count
    }
}

/// What `ensure_cluster` had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterAction {
    Created,
    Started,
    AlreadyRunning,
}

pub fn parse_cluster_list(json: &str) -> Result<Vec<K3dCluster>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json).context("Failed to parse `k3d cluster list -o json` output")
}

pub fn list_clusters() -> Result<Vec<K3dCluster>> {
    let out = Cmd::new("k3d")
        .args(["cluster", "list", "-o", "json"])
        .output()?;
    parse_cluster_list(&out)
}

pub fn find_cluster(name: &str) -> Result<Option<K3dCluster>> {
    Ok(list_clusters()?.into_iter().find(|c| c.name == name))
}

/// `k3d cluster create` arguments for this config
pub fn create_args(config: &ClusterConfig) -> Vec<String> {
    let mut args = vec![
        "cluster".to_string(),
        "create".to_string(),
        config.name.clone(),
        "--servers".to_string(),
        config.servers.to_string(),
        "--agents".to_string(),
        config.agents.to_string(),
        "--api-port".to_string(),
        config.api_port.to_string(),
        "-p".to_string(),
        format!("{}:80@loadbalancer", config.http_port),
        "--kubeconfig-update-default".to_string(),
        "--kubeconfig-switch-context".to_string(),
        "--wait".to_string(),
        "--timeout".to_string(),
        format!("{}s", config.wait_timeout_secs),
    ];
    if let Some(image) = &config.image {
        args.push("--image".to_string());
        args.push(image.clone());
    }
    args
}

/// Create the cluster, or start it when it exists but is stopped
pub fn ensure_cluster(config: &ClusterConfig) -> Result<ClusterAction> {
    let action = match find_cluster(&config.name)? {
        Some(cluster) if cluster.is_running() => {
            ui::info(&format!("Cluster {} already running", config.name));
            ClusterAction::AlreadyRunning
        }
        Some(_) => {
            ui::info(&format!("Starting stopped cluster {}", config.name));
            Cmd::new("k3d")
                .args(["cluster", "start", config.name.as_str(), "--wait"])
                .run()
                .with_context(|| format!("Failed to start cluster {}", config.name))?;
            ClusterAction::Started
        }
        None => {
            ui::info(&format!(
                "Creating cluster {} ({} server(s), {} agent(s))",
                config.name, config.servers, config.agents
            ));
            Cmd::new("k3d")
                .args(create_args(config))
                .run()
                .with_context(|| format!("Failed to create cluster {}", config.name))?;
            ClusterAction::Created
        }
    };

    use_context(config)?;
    Ok(action)
}

/// Point kubectl at the lab cluster
pub fn use_context(config: &ClusterConfig) -> Result<()> {
    Cmd::new("kubectl")
        .args(["config", "use-context", config.context_name().as_str()])
        .output()
        .with_context(|| format!("Failed to switch kube context to {}", config.context_name()))?;
    Ok(())
}

/// Delete the cluster; returns false when there was nothing to delete
pub fn delete_cluster(config: &ClusterConfig) -> Result<bool> {
    if find_cluster(&config.name)?.is_none() {
        return Ok(false);
    }
    Cmd::new("k3d")
        .args(["cluster", "delete", config.name.as_str()])
        .run()
        .with_context(|| format!("Failed to delete cluster {}", config.name))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_JSON: &str = r#"[
        {
            "name": "l4b",
            "network": "k3d-l4b",
            "token": "abc",
            "nodes": [],
            "serversCount": 1,
            "serversRunning": 1,
            "agentsCount": 2,
            "agentsRunning": 2,
            "hasLoadbalancer": true
        },
        {
            "name": "stopped",
            "serversCount": 1,
            "serversRunning": 0,
            "agentsCount": 0,
            "agentsRunning": 0
        }
    ]"#;

    #[test]
    fn test_parse_cluster_list() {
        let clusters = parse_cluster_list(LIST_JSON).unwrap();
        assert_eq!(clusters.len(), 2);
        assert!(clusters[0].is_running());
        assert_eq!(clusters[0].agents_count, 2);
        assert!(!clusters[1].is_running());
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_cluster_list("").unwrap().is_empty());
        assert!(parse_cluster_list("[]").unwrap().is_empty());
        assert!(parse_cluster_list("not json").is_err());
    }

    #[test]
    fn test_create_args() {
        let mut config = ClusterConfig::default();
        let args = create_args(&config);
        assert_eq!(&args[..3], ["cluster", "create", "l4b"]);
        assert!(args.contains(&"8081:80@loadbalancer".to_string()));
        assert!(args.contains(&"300s".to_string()));
        assert!(!args.contains(&"--image".to_string()));

        config.image = Some("rancher/k3s:v1.30.4-k3s1".to_string());
        let args = create_args(&config);
        assert_eq!(args[args.len() - 2], "--image");
        assert_eq!(args[args.len() - 1], "rancher/k3s:v1.30.4-k3s1");
    }
}
