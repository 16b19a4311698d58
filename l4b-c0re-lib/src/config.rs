//! l4b.toml configuration model
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) describes the stock lab: a 1-server/2-agent k3d cluster named `l4b`
//! running GitLab CE and ArgoCD.

use crate::error::{
    ConfigExistsSnafu, ConfigParseSnafu, ConfigReadSnafu, ConfigSerializeSnafu, ConfigWriteSnafu,
    NoHomeDirSnafu, Result, UserConfigSnafu,
};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the project-local config file
pub const LOCAL_CONFIG_FILE: &str = "l4b.toml";

/// Application name used for the confy user config location
pub const APP_NAME: &str = "l4b";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct L4bConfig {
    pub cluster: ClusterConfig,
    pub gitlab: GitlabConfig,
    pub argocd: ArgocdConfig,
    pub tunnels: TunnelConfig,
    pub push: PushConfig,
    pub app: AppConfig,
    pub prereqs: PrereqConfig,
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Local(PathBuf),
    User(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(p) | Self::Local(p) | Self::User(p) => write!(f, "{}", p.display()),
            Self::Defaults => write!(f, "(built-in defaults)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub name: String,
    pub servers: u32,
    pub agents: u32,
    pub api_port: u16,
    /// Host port mapped onto the k3d load balancer's port 80
    pub http_port: u16,
    /// Optional k3s image override, e.g. `rancher/k3s:v1.30.4-k3s1`
    pub image: Option<String>,
    pub wait_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: "l4b".to_string(),
            servers: 1,
            agents: 2,
            api_port: 6550,
            http_port: 8081,
            image: None,
            wait_timeout_secs: 300,
        }
    }
}

impl ClusterConfig {
    /// kubeconfig context k3d registers for this cluster
    pub fn context_name(&self) -> String {
        format!("k3d-{}", self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitlabConfig {
    pub enabled: bool,
    pub namespace: String,
    pub release: String,
    pub chart_repo_name: String,
    pub chart_repo_url: String,
    pub chart: String,
    pub chart_version: Option<String>,
    pub domain: String,
    pub external_ip: String,
    pub edition: String,
    pub root_user: String,
    pub password_secret: String,
    pub password_key: String,
    pub service: String,
    pub service_port: u16,
    pub local_port: u16,
    pub log_selector: String,
    pub timeout_secs: u64,
    /// Extra `--set key=value` pairs appended after the built-in ones
    pub values: BTreeMap<String, String>,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "gitlab".to_string(),
            release: "gitlab".to_string(),
            chart_repo_name: "gitlab".to_string(),
            chart_repo_url: "https://charts.gitlab.io/".to_string(),
            chart: "gitlab/gitlab".to_string(),
            chart_version: None,
            domain: "l4b.localhost".to_string(),
            external_ip: "127.0.0.1".to_string(),
            edition: "ce".to_string(),
            root_user: "root".to_string(),
            password_secret: "gitlab-gitlab-initial-root-password".to_string(),
            password_key: "password".to_string(),
            service: "gitlab-webservice-default".to_string(),
            service_port: 8181,
            local_port: 8929,
            log_selector: "app=webservice".to_string(),
            timeout_secs: 1200,
            values: BTreeMap::new(),
        }
    }
}

impl GitlabConfig {
    /// Ordered `--set` pairs for the GitLab chart
    ///
    /// Keeps the install small enough for a laptop: no cert-manager, no
    /// runner, no bundled prometheus, plain http.
    pub fn helm_values(&self) -> Vec<(String, String)> {
        let mut values = vec![
            ("global.hosts.domain".to_string(), self.domain.clone()),
            ("global.hosts.externalIP".to_string(), self.external_ip.clone()),
            ("global.hosts.https".to_string(), "false".to_string()),
            ("global.edition".to_string(), self.edition.clone()),
            ("global.ingress.configureCertmanager".to_string(), "false".to_string()),
            ("global.ingress.tls.enabled".to_string(), "false".to_string()),
            ("installCertmanager".to_string(), "false".to_string()),
            ("gitlab-runner.install".to_string(), "false".to_string()),
            ("prometheus.install".to_string(), "false".to_string()),
        ];

        for (key, value) in &self.values {
            match values.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1.clone_from(value),
                None => values.push((key.clone(), value.clone())),
            }
        }

        values
    }

    /// Base URL of the GitLab tunnel on this machine
    pub fn local_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.local_port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArgocdConfig {
    pub enabled: bool,
    pub namespace: String,
    pub manifest_url: String,
    pub admin_user: String,
    pub password_secret: String,
    pub password_key: String,
    pub service: String,
    pub service_port: u16,
    pub local_port: u16,
    pub log_selector: String,
    pub timeout_secs: u64,
}

impl Default for ArgocdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "argocd".to_string(),
            manifest_url:
                "https://raw.githubusercontent.com/argoproj/argo-cd/stable/manifests/install.yaml"
                    .to_string(),
            admin_user: "admin".to_string(),
            password_secret: "argocd-initial-admin-secret".to_string(),
            password_key: "password".to_string(),
            service: "argocd-server".to_string(),
            service_port: 443,
            local_port: 8080,
            log_selector: "app.kubernetes.io/name=argocd-server".to_string(),
            timeout_secs: 600,
        }
    }
}

impl ArgocdConfig {
    /// `host:port` the argocd CLI logs into through the tunnel
    pub fn local_server(&self) -> String {
        format!("127.0.0.1:{}", self.local_port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TunnelConfig {
    /// Seconds to wait for a fresh port-forward to accept connections
    pub ready_timeout_secs: u64,
    pub bind_address: String,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 20,
            bind_address: "127.0.0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PushConfig {
    /// Project name; defaults to the pushed directory's name
    pub project: Option<String>,
    pub branch: String,
    pub visibility: String,
    pub commit_message: String,
    pub remote_name: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            project: None,
            branch: "main".to_string(),
            visibility: "private".to_string(),
            commit_message: "Initial commit".to_string(),
            remote_name: "l4b".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    /// Path inside the repository holding the manifests
    pub path: String,
    pub dest_namespace: String,
    pub dest_server: String,
    pub auto_sync: bool,
    pub sync_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "l4b-app".to_string(),
            path: ".".to_string(),
            dest_namespace: "default".to_string(),
            dest_server: "https://kubernetes.default.svc".to_string(),
            auto_sync: false,
            sync_timeout_secs: 300,
        }
    }
}

/// Binaries checked before bootstrap. Entries from a config file are layered
/// over the built-in set: same name replaces, new name adds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "PrereqOverrides")]
pub struct PrereqConfig {
    pub required_bins: BTreeMap<String, BinarySpec>,
    pub optional_bins: BTreeMap<String, BinarySpec>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PrereqOverrides {
    required_bins: BTreeMap<String, BinarySpec>,
    optional_bins: BTreeMap<String, BinarySpec>,
}

impl From<PrereqOverrides> for PrereqConfig {
    fn from(overrides: PrereqOverrides) -> Self {
        let mut config = Self::default();
        config.required_bins.extend(overrides.required_bins);
        config.optional_bins.extend(overrides.optional_bins);
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinarySpec {
    pub version: String, // Format: ">=1.0.0"
    #[serde(default)]
    pub priority: u8,
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
    #[serde(default)]
    pub install_hint: Option<String>,
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

impl BinarySpec {
    fn new(version: &str, priority: u8, version_args: &[&str], hint: &str) -> Self {
        Self {
            version: version.to_string(),
            priority,
            version_args: version_args.iter().map(ToString::to_string).collect(),
            install_hint: Some(hint.to_string()),
        }
    }
}

impl Default for PrereqConfig {
    fn default() -> Self {
        let mut required_bins = BTreeMap::new();
        required_bins.insert(
            "docker".to_string(),
            BinarySpec::new(">=20.10.0", 1, &["--version"], "https://docs.docker.com/engine/install/"),
        );
        required_bins.insert(
            "k3d".to_string(),
            BinarySpec::new(">=5.0.0", 2, &["version"], "https://k3d.io/#installation"),
        );
        required_bins.insert(
            "kubectl".to_string(),
            BinarySpec::new(
                ">=1.25.0",
                3,
                &["version", "--client"],
                "https://kubernetes.io/docs/tasks/tools/",
            ),
        );
        required_bins.insert(
            "helm".to_string(),
            BinarySpec::new(">=3.8.0", 4, &["version", "--short"], "https://helm.sh/docs/intro/install/"),
        );
        required_bins.insert(
            "git".to_string(),
            BinarySpec::new(">=2.28.0", 5, &["--version"], "https://git-scm.com/downloads"),
        );

        let mut optional_bins = BTreeMap::new();
        optional_bins.insert(
            "argocd".to_string(),
            BinarySpec::new(
                ">=2.5.0",
                1,
                &["version", "--client", "--short"],
                "https://argo-cd.readthedocs.io/en/stable/cli_installation/",
            ),
        );
        optional_bins.insert(
            "curl".to_string(),
            BinarySpec::new(">=7.0.0", 2, &["--version"], "install curl with your package manager"),
        );

        Self {
            required_bins,
            optional_bins,
        }
    }
}

impl L4bConfig {
    /// Parse a config document; missing sections take their defaults
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).context(ConfigParseSnafu { path: origin })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context(ConfigReadSnafu { path })?;
        Self::from_toml_str(&content, path)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context(ConfigSerializeSnafu)
    }

    /// Write this config to `path`, refusing to clobber unless `force`
    pub fn write_to(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return ConfigExistsSnafu { path }.fail();
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(ConfigWriteSnafu { path: parent })?;
        }
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context(ConfigWriteSnafu { path })
    }

    /// Resolve and load the effective configuration
    ///
    /// Order: explicit path → `./l4b.toml` → confy user config → defaults.
    /// Environment overrides are applied on top in every case.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let (mut config, source) = if let Some(path) = explicit {
            let expanded = expand_path(&path.to_string_lossy());
            (Self::from_file(&expanded)?, ConfigSource::Explicit(expanded))
        } else if Path::new(LOCAL_CONFIG_FILE).is_file() {
            let path = PathBuf::from(LOCAL_CONFIG_FILE);
            (Self::from_file(&path)?, ConfigSource::Local(path))
        } else {
            let user_path = user_config_path()?;
            if user_path.is_file() {
                (Self::from_file(&user_path)?, ConfigSource::User(user_path))
            } else {
                (Self::default(), ConfigSource::Defaults)
            }
        };

        config.apply_env_overrides();
        tracing::debug!(%source, "configuration loaded");
        Ok((config, source))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply `L4B_*` overrides using `lookup` as the environment
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("L4B_CLUSTER_NAME").filter(|v| !v.is_empty()) {
            self.cluster.name = name;
        }
        if let Some(domain) = lookup("L4B_GITLAB_DOMAIN").filter(|v| !v.is_empty()) {
            self.gitlab.domain = domain;
        }
        if let Some(port) = lookup("L4B_GITLAB_PORT").and_then(|v| v.parse().ok()) {
            self.gitlab.local_port = port;
        }
        if let Some(port) = lookup("L4B_ARGOCD_PORT").and_then(|v| v.parse().ok()) {
            self.argocd.local_port = port;
        }
    }
}

/// Location of the per-user config file managed through confy
pub fn user_config_path() -> Result<PathBuf> {
    confy::get_configuration_file_path(APP_NAME, None).context(UserConfigSnafu)
}

/// Resolve the state directory (`--state-dir`, `L4B_HOME`, or `~/.l4b`)
pub fn state_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(expand_path(&path.to_string_lossy()));
    }
    let home = dirs::home_dir().context(NoHomeDirSnafu)?;
    Ok(home.join(".l4b"))
}

/// Expand `~` and `$VARS` in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}
