//! Kubernetes access for the lab cluster
//!
//! Reads (pods, nodes, secrets) go through the kube client; writes and
//! streaming (apply, logs, port-forward) shell out to kubectl, always pinned
//! to the lab's context so a stray current-context can't redirect them.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Node, Pod, Secret};
use kube::api::ListParams;
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config};
use l4b_c0re_lib::error::{SecretDataSnafu, TimeoutSnafu};
use l4b_c0re_lib::{Cmd, ui};
use std::time::{Duration, Instant};
use tokio::time::sleep;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Readiness summary over a set of pods or nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readiness {
    pub total: usize,
    pub ready: usize,
    /// Finished job pods, neither blocking nor counted as ready
    pub completed: usize,
    pub not_ready: Vec<String>,
}

impl Readiness {
    /// An empty namespace is not ready: the installer hasn't created anything yet
    pub fn all_ready(&self) -> bool {
        self.ready > 0 && self.not_ready.is_empty()
    }

    pub fn describe(&self) -> String {
        let mut text = format!("{}/{} ready", self.ready, self.total - self.completed);
        if !self.not_ready.is_empty() {
            let preview: Vec<&str> = self.not_ready.iter().take(3).map(String::as_str).collect();
            text.push_str(&format!(", waiting on {}", preview.join(", ")));
            if self.not_ready.len() > 3 {
                text.push_str(&format!(" (+{} more)", self.not_ready.len() - 3));
            }
        }
        text
    }
}

fn condition_true<'a>(mut conditions: impl Iterator<Item = (&'a str, &'a str)>, kind: &str) -> bool {
    conditions.any(|(type_, status)| type_ == kind && status == "True")
}

fn owned_by_job(pod: &Pod) -> bool {
    pod.metadata
        .owner_references
        .as_ref()
        .is_some_and(|owners| owners.iter().any(|o| o.kind == "Job"))
}

/// Summarize pod readiness
///
/// Succeeded pods and failed job attempts (the job retries) are completed;
/// everything else must carry `Ready=True`.
pub fn pod_readiness(pods: &[Pod]) -> Readiness {
    let mut readiness = Readiness {
        total: pods.len(),
        ..Readiness::default()
    };

    for pod in pods {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let status = pod.status.as_ref();
        let phase = status.and_then(|s| s.phase.as_deref()).unwrap_or("Unknown");

        if phase == "Succeeded" || (phase == "Failed" && owned_by_job(pod)) {
            readiness.completed += 1;
            continue;
        }

        let ready = status
            .and_then(|s| s.conditions.as_ref())
            .is_some_and(|conds| {
                condition_true(conds.iter().map(|c| (c.type_.as_str(), c.status.as_str())), "Ready")
            });

        if ready {
            readiness.ready += 1;
        } else {
            readiness.not_ready.push(name);
        }
    }

    readiness
}

/// Summarize node readiness
pub fn node_readiness(nodes: &[Node]) -> Readiness {
    let mut readiness = Readiness {
        total: nodes.len(),
        ..Readiness::default()
    };

    for node in nodes {
        let ready = node
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .is_some_and(|conds| {
                condition_true(conds.iter().map(|c| (c.type_.as_str(), c.status.as_str())), "Ready")
            });
        if ready {
            readiness.ready += 1;
        } else {
            readiness
                .not_ready
                .push(node.metadata.name.clone().unwrap_or_default());
        }
    }

    readiness
}

/// Client bound to one kubeconfig context
#[derive(Clone)]
pub struct KubeCtx {
    client: Client,
    context: String,
}

impl KubeCtx {
    pub async fn connect(context: &str) -> Result<Self> {
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..KubeConfigOptions::default()
        };
        let config = Config::from_kubeconfig(&options)
            .await
            .with_context(|| format!("Failed to load kubeconfig context {context}"))?;
        let client = Client::try_from(config)
            .with_context(|| format!("Failed to build client for context {context}"))?;

        Ok(Self {
            client,
            context: context.to_string(),
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// kubectl pinned to this context
    pub fn kubectl(&self) -> Cmd {
        Cmd::new("kubectl").args(["--context", self.context.as_str()])
    }

    /// `kubectl create namespace --dry-run | kubectl apply`, the idempotent create
    pub fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        let create = self.kubectl().args([
            "create",
            "namespace",
            namespace,
            "--dry-run=client",
            "-o",
            "yaml",
        ]);
        let apply = self.kubectl().args(["apply", "-f", "-"]);
        create
            .pipe_into(&apply)
            .with_context(|| format!("Failed to ensure namespace {namespace}"))?;
        Ok(())
    }

    /// Server-side apply of a remote manifest into `namespace`
    pub fn apply_url(&self, namespace: &str, url: &str) -> Result<()> {
        self.kubectl()
            .args([
                "apply",
                "-n",
                namespace,
                "--server-side",
                "--force-conflicts",
                "-f",
                url,
            ])
            .output()
            .with_context(|| format!("Failed to apply {url}"))?;
        Ok(())
    }

    pub async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("Failed to list pods in {namespace}"))?;
        Ok(list.items)
    }

    pub async fn pods_summary(&self, namespace: &str) -> Result<Readiness> {
        Ok(pod_readiness(&self.list_pods(namespace).await?))
    }

    pub async fn nodes_summary(&self) -> Result<Readiness> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .context("Failed to list nodes")?;
        Ok(node_readiness(&list.items))
    }

    /// Poll until every node reports Ready
    pub async fn wait_for_nodes(&self, timeout_secs: u64) -> Result<Readiness> {
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);
        loop {
            let readiness = self.nodes_summary().await?;
            if readiness.all_ready() {
                return Ok(readiness);
            }
            tracing::debug!(status = %readiness.describe(), "nodes not ready");
            if Instant::now() >= deadline {
                return Err(TimeoutSnafu {
                    what: "cluster nodes",
                    secs: timeout_secs,
                }
                .build()
                .into());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Poll until every pod in `namespace` is Ready
    pub async fn wait_for_pods(&self, namespace: &str, timeout_secs: u64) -> Result<Readiness> {
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);
        let mut last = String::new();
        loop {
            let readiness = self.pods_summary(namespace).await?;
            if readiness.all_ready() {
                return Ok(readiness);
            }

            let described = readiness.describe();
            if described != last {
                ui::info(&format!("{namespace}: {described}"));
                last = described;
            }

            if Instant::now() >= deadline {
                return Err(TimeoutSnafu {
                    what: format!("pods in {namespace}"),
                    secs: timeout_secs,
                }
                .build()
                .into());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Read one key of a secret as UTF-8
    pub async fn read_secret(&self, namespace: &str, name: &str, key: &str) -> Result<String> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to read secret {namespace}/{name}"))?
            .with_context(|| format!("secret {namespace}/{name} not found"))?;

        secret_value(&secret, key).ok_or_else(|| {
            SecretDataSnafu {
                namespace,
                name,
                key,
            }
            .build()
            .into()
        })
    }

    /// `kubectl logs` for every pod matching `selector`
    pub fn logs(&self, namespace: &str, selector: &str, tail: u32, follow: bool) -> Result<()> {
        let tail = tail.to_string();
        let mut cmd = self.kubectl().args([
            "logs",
            "-n",
            namespace,
            "-l",
            selector,
            "--tail",
            tail.as_str(),
            "--all-containers",
            "--prefix",
            "--max-log-requests",
            "10",
        ]);
        if follow {
            cmd = cmd.arg("-f");
            cmd.run_interactive()?;
        } else {
            let out = cmd.output()?;
            if out.trim().is_empty() {
                ui::warn(&format!("No log lines for {selector} in {namespace}"));
            } else {
                print!("{out}");
            }
        }
        Ok(())
    }
}

/// Decoded value of `key`, from `data` or (unapplied) `stringData`
pub fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|bytes| String::from_utf8_lossy(&bytes.0).trim_end().to_string())
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|data| data.get(key))
                .cloned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus, PodCondition, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use std::collections::BTreeMap;

    fn pod(name: &str, phase: &str, ready: bool) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: if ready { "True" } else { "False" }.to_string(),
                    ..PodCondition::default()
                }]),
                ..PodStatus::default()
            }),
            ..Pod::default()
        }
    }

    fn job_pod(name: &str, phase: &str) -> Pod {
        let mut pod = pod(name, phase, false);
        pod.metadata.owner_references = Some(vec![OwnerReference {
            kind: "Job".to_string(),
            name: "gitlab-migrations-1".to_string(),
            ..OwnerReference::default()
        }]);
        pod
    }

    #[test]
    fn test_empty_namespace_not_ready() {
        let readiness = pod_readiness(&[]);
        assert!(!readiness.all_ready());
        assert_eq!(readiness.describe(), "0/0 ready");
    }

    #[test]
    fn test_all_pods_ready() {
        let pods = vec![pod("a", "Running", true), pod("b", "Running", true)];
        let readiness = pod_readiness(&pods);
        assert!(readiness.all_ready());
        assert_eq!(readiness.ready, 2);
    }

    #[test]
    fn test_pending_pod_blocks() {
        let pods = vec![pod("a", "Running", true), pod("webservice-0", "Pending", false)];
        let readiness = pod_readiness(&pods);
        assert!(!readiness.all_ready());
        assert_eq!(readiness.not_ready, vec!["webservice-0".to_string()]);
        assert_eq!(readiness.describe(), "1/2 ready, waiting on webservice-0");
    }

    #[test]
    fn test_finished_jobs_do_not_block() {
        let pods = vec![
            pod("server", "Running", true),
            job_pod("migrations-ok", "Succeeded"),
            job_pod("migrations-retry", "Failed"),
        ];
        let readiness = pod_readiness(&pods);
        assert!(readiness.all_ready());
        assert_eq!(readiness.completed, 2);
        assert_eq!(readiness.describe(), "1/1 ready");
    }

    #[test]
    fn test_failed_non_job_pod_blocks() {
        let pods = vec![pod("server", "Running", true), pod("crashed", "Failed", false)];
        assert!(!pod_readiness(&pods).all_ready());
    }

    #[test]
    fn test_describe_truncates() {
        let pods: Vec<Pod> = (0..5)
            .map(|i| pod(&format!("p{i}"), "Pending", false))
            .collect();
        assert_eq!(
            pod_readiness(&pods).describe(),
            "0/5 ready, waiting on p0, p1, p2 (+2 more)"
        );
    }

    #[test]
    fn test_node_readiness() {
        let node = |name: &str, status: &str| Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: status.to_string(),
                    ..NodeCondition::default()
                }]),
                ..NodeStatus::default()
            }),
            ..Node::default()
        };
        let readiness = node_readiness(&[node("server-0", "True"), node("agent-0", "Unknown")]);
        assert!(!readiness.all_ready());
        assert_eq!(readiness.not_ready, vec!["agent-0".to_string()]);
    }

    #[test]
    fn test_secret_value() {
        let mut data = BTreeMap::new();
        data.insert("password".to_string(), ByteString(b"s3cret\n".to_vec()));
        let secret = Secret {
            data: Some(data),
            ..Secret::default()
        };
        assert_eq!(secret_value(&secret, "password").as_deref(), Some("s3cret"));
        assert_eq!(secret_value(&secret, "username"), None);

        let mut string_data = BTreeMap::new();
        string_data.insert("username".to_string(), "admin".to_string());
        let secret = Secret {
            string_data: Some(string_data),
            ..Secret::default()
        };
        assert_eq!(secret_value(&secret, "username").as_deref(), Some("admin"));
    }
}
