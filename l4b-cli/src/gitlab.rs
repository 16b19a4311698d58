//! GitLab: chart install, root credentials, and the bits of the REST API
//! needed to turn a local directory into a project

use crate::helm::{self, Release};
use crate::kube::{KubeCtx, Readiness};
use anyhow::{Context, Result};
use l4b_c0re_lib::error::TimeoutSnafu;
use l4b_c0re_lib::{GitlabConfig, ui};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Add the chart repo and `helm upgrade --install` GitLab, then wait for pods
pub async fn install(config: &GitlabConfig, kube: &KubeCtx) -> Result<Readiness> {
    ui::info(&format!(
        "Adding helm repo {} ({})",
        config.chart_repo_name, config.chart_repo_url
    ));
    helm::repo_add(&config.chart_repo_name, &config.chart_repo_url)?;
    helm::repo_update(&config.chart_repo_name)?;

    let values = config.helm_values();
    let release = Release {
        name: &config.release,
        chart: &config.chart,
        namespace: &config.namespace,
        version: config.chart_version.as_deref(),
        values: &values,
        timeout_secs: config.timeout_secs,
    };

    if helm::release_installed(kube.context(), &config.release, &config.namespace) {
        ui::info(&format!("Release {} present, upgrading in place", config.release));
    } else {
        ui::info(&format!(
            "Installing {} into namespace {} (this takes a while)",
            config.chart, config.namespace
        ));
    }
    helm::upgrade_install(kube.context(), &release)?;

    ui::info("Waiting for GitLab pods to become ready...");
    kube.wait_for_pods(&config.namespace, config.timeout_secs).await
}

/// Initial root password generated by the chart
pub async fn root_password(config: &GitlabConfig, kube: &KubeCtx) -> Result<String> {
    kube.read_secret(&config.namespace, &config.password_secret, &config.password_key)
        .await
        .context("GitLab root password unavailable (is the release installed?)")
}

/// A GitLab project as returned by `/api/v4/projects`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
    pub http_url_to_repo: String,
    pub web_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct CreateProject<'a> {
    name: &'a str,
    path: &'a str,
    visibility: &'a str,
    initialize_with_readme: bool,
}

/// Minimal GitLab REST client reached through the local tunnel
#[derive(Debug, Clone)]
pub struct GitlabApi {
    base: String,
    http: reqwest::Client,
    token: Option<String>,
}

impl GitlabApi {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            token: None,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Poll the sign-in page until the webservice answers
    pub async fn wait_ready(&self, timeout_secs: u64) -> Result<()> {
        let url = format!("{}/users/sign_in", self.base);
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);

        loop {
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => tracing::debug!(status = %resp.status(), "gitlab not ready"),
                Err(e) => tracing::debug!(error = %e, "gitlab not reachable"),
            }
            if Instant::now() >= deadline {
                return Err(TimeoutSnafu {
                    what: format!("GitLab at {}", self.base),
                    secs: timeout_secs,
                }
                .build()
                .into());
            }
            sleep(Duration::from_secs(3)).await;
        }
    }

    /// OAuth password grant for `username`
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let url = format!("{}/oauth/token", self.base);
        let resp = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitLab login as {username} failed ({status}): {}", body.trim());
        }

        let token: TokenResponse = resp
            .json()
            .await
            .context("Unexpected GitLab token response")?;
        self.token = Some(token.access_token);
        Ok(())
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .context("GitLab API call before login")?;
        Ok(builder.bearer_auth(token))
    }

    /// Fetch `namespace/path`; `None` when it doesn't exist
    pub async fn get_project(&self, path_with_namespace: &str) -> Result<Option<Project>> {
        let url = format!(
            "{}/api/v4/projects/{}",
            self.base,
            urlencoding::encode(path_with_namespace)
        );
        let resp = self
            .authed(self.http.get(&url))?
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(
                resp.json().await.context("Unexpected GitLab project response")?,
            )),
            status => {
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("GitLab project lookup failed ({status}): {}", body.trim())
            }
        }
    }

    /// Create a project under the logged-in user, or return the existing one
    pub async fn create_project(
        &self,
        owner: &str,
        name: &str,
        visibility: &str,
    ) -> Result<(Project, bool)> {
        let path = project_path(name);
        if let Some(existing) = self.get_project(&format!("{owner}/{path}")).await? {
            return Ok((existing, false));
        }

        let url = format!("{}/api/v4/projects", self.base);
        let body = CreateProject {
            name,
            path: &path,
            visibility,
            initialize_with_readme: false,
        };
        let resp = self
            .authed(self.http.post(&url))?
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitLab project creation failed ({status}): {}", body.trim());
        }

        let project = resp
            .json()
            .await
            .context("Unexpected GitLab project response")?;
        Ok((project, true))
    }
}

/// GitLab-safe project path for a directory name
pub fn project_path(name: &str) -> String {
    let mut path = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            path.push(ch.to_ascii_lowercase());
        } else if !path.ends_with('-') {
            path.push('-');
        }
    }
    let trimmed = path.trim_matches(|c| c == '-' || c == '.' || c == '_');
    if trimmed.is_empty() {
        "project".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Rewrite GitLab's advertised clone URL onto the local tunnel
///
/// GitLab advertises `http://gitlab.<domain>/root/x.git`, which only the
/// ingress knows; the tunnel serves the same path on `local_base`.
pub fn local_repo_url(http_url_to_repo: &str, local_base: &str) -> Result<String> {
    let remote = Url::parse(http_url_to_repo)
        .with_context(|| format!("Invalid repository URL {http_url_to_repo}"))?;
    let mut local =
        Url::parse(local_base).with_context(|| format!("Invalid GitLab URL {local_base}"))?;
    local.set_path(remote.path());
    Ok(local.to_string())
}

/// Clone URL ArgoCD uses from inside the cluster
pub fn in_cluster_repo_url(config: &GitlabConfig, path_with_namespace: &str) -> String {
    format!(
        "http://{}.{}.svc:{}/{}.git",
        config.service, config.namespace, config.service_port, path_with_namespace
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_path() {
        assert_eq!(project_path("my-app"), "my-app");
        assert_eq!(project_path("My App"), "my-app");
        assert_eq!(project_path("  weird!!name  "), "weird-name");
        assert_eq!(project_path("--"), "project");
        assert_eq!(project_path("v1.2_demo"), "v1.2_demo");
    }

    #[test]
    fn test_local_repo_url() {
        let url = local_repo_url(
            "http://gitlab.l4b.localhost/root/my-app.git",
            "http://127.0.0.1:8929",
        )
        .unwrap();
        assert_eq!(url, "http://127.0.0.1:8929/root/my-app.git");
        assert!(local_repo_url("not a url", "http://127.0.0.1:8929").is_err());
    }

    #[test]
    fn test_in_cluster_repo_url() {
        let config = GitlabConfig::default();
        assert_eq!(
            in_cluster_repo_url(&config, "root/my-app"),
            "http://gitlab-webservice-default.gitlab.svc:8181/root/my-app.git"
        );
    }

    #[test]
    fn test_project_response_parses() {
        let body = r#"{
            "id": 7,
            "name": "my-app",
            "path_with_namespace": "root/my-app",
            "http_url_to_repo": "http://gitlab.l4b.localhost/root/my-app.git",
            "web_url": "http://gitlab.l4b.localhost/root/my-app",
            "visibility": "private",
            "default_branch": null
        }"#;
        let project: Project = serde_json::from_str(body).unwrap();
        assert_eq!(project.id, 7);
        assert_eq!(project.path_with_namespace, "root/my-app");
    }

    #[test]
    fn test_base_trailing_slash() {
        let api = GitlabApi::new("http://127.0.0.1:8929/");
        assert_eq!(api.base(), "http://127.0.0.1:8929");
        assert!(api.token().is_none());
    }

    #[tokio::test]
    async fn test_calls_before_login_fail() {
        let api = GitlabApi::new("http://127.0.0.1:9");
        let err = api.get_project("root/x").await.unwrap_err();
        assert!(err.to_string().contains("before login"));
    }
}
