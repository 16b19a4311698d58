//! The two applications the lab installs, and where each one lives

use clap::ValueEnum;
use l4b_c0re_lib::L4bConfig;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Component {
    Gitlab,
    Argocd,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Gitlab, Component::Argocd];

    pub fn name(self) -> &'static str {
        match self {
            Self::Gitlab => "gitlab",
            Self::Argocd => "argocd",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Gitlab => "GitLab",
            Self::Argocd => "ArgoCD",
        }
    }

    pub fn enabled(self, config: &L4bConfig) -> bool {
        match self {
            Self::Gitlab => config.gitlab.enabled,
            Self::Argocd => config.argocd.enabled,
        }
    }

    pub fn namespace(self, config: &L4bConfig) -> &str {
        match self {
            Self::Gitlab => &config.gitlab.namespace,
            Self::Argocd => &config.argocd.namespace,
        }
    }

    /// (secret name, key) holding the generated admin password
    pub fn password_secret(self, config: &L4bConfig) -> (&str, &str) {
        match self {
            Self::Gitlab => (&config.gitlab.password_secret, &config.gitlab.password_key),
            Self::Argocd => (&config.argocd.password_secret, &config.argocd.password_key),
        }
    }

    pub fn username(self, config: &L4bConfig) -> &str {
        match self {
            Self::Gitlab => &config.gitlab.root_user,
            Self::Argocd => &config.argocd.admin_user,
        }
    }

    pub fn log_selector(self, config: &L4bConfig) -> &str {
        match self {
            Self::Gitlab => &config.gitlab.log_selector,
            Self::Argocd => &config.argocd.log_selector,
        }
    }

    /// URL shown to the user once the tunnel is up
    pub fn local_url(self, config: &L4bConfig) -> String {
        match self {
            Self::Gitlab => config.gitlab.local_url(),
            Self::Argocd => format!("https://{}", config.argocd.local_server()),
        }
    }

    pub fn ready_timeout_secs(self, config: &L4bConfig) -> u64 {
        match self {
            Self::Gitlab => config.gitlab.timeout_secs,
            Self::Argocd => config.argocd.timeout_secs,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_lookup() {
        let config = L4bConfig::default();
        assert_eq!(Component::Gitlab.namespace(&config), "gitlab");
        assert_eq!(
            Component::Argocd.password_secret(&config),
            ("argocd-initial-admin-secret", "password")
        );
        assert_eq!(Component::Argocd.local_url(&config), "https://127.0.0.1:8080");
        assert_eq!(Component::Gitlab.username(&config), "root");
        assert_eq!(Component::Argocd.to_string(), "argocd");
    }
}
