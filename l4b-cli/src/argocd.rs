//! ArgoCD: manifest install, admin credentials, and the argocd CLI calls
//! for registering the GitLab repo and syncing an application

use crate::kube::{KubeCtx, Readiness};
use anyhow::{Context, Result};
use l4b_c0re_lib::{AppConfig, ArgocdConfig, Cmd, ui};

/// Create the namespace, apply the upstream install manifest, wait for pods
pub async fn install(config: &ArgocdConfig, kube: &KubeCtx) -> Result<Readiness> {
    kube.ensure_namespace(&config.namespace)?;

    ui::info(&format!("Applying {}", config.manifest_url));
    kube.apply_url(&config.namespace, &config.manifest_url)?;

    ui::info("Waiting for ArgoCD pods to become ready...");
    kube.wait_for_pods(&config.namespace, config.timeout_secs).await
}

/// Initial admin password
///
/// ArgoCD deletes `argocd-initial-admin-secret` once the password is changed,
/// after which only the user knows it.
pub async fn admin_password(config: &ArgocdConfig, kube: &KubeCtx) -> Result<String> {
    kube.read_secret(&config.namespace, &config.password_secret, &config.password_key)
        .await
        .context(
            "ArgoCD admin password unavailable (not installed yet, or the initial secret \
             was removed after a password change)",
        )
}

pub fn login_args(server: &str, username: &str, password: &str) -> Vec<String> {
    [
        "login",
        server,
        "--username",
        username,
        "--password",
        password,
        "--insecure",
        "--grpc-web",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// `argocd login` through the local tunnel; the session is stored by the CLI
pub fn login(config: &ArgocdConfig, password: &str) -> Result<()> {
    Cmd::new("argocd")
        .args(login_args(&config.local_server(), &config.admin_user, password))
        .secret(password)
        .output()
        .context("argocd login failed (is the ArgoCD port-forward running?)")?;
    Ok(())
}

pub fn add_repo_args(repo_url: &str, username: &str, password: &str) -> Vec<String> {
    [
        "repo",
        "add",
        repo_url,
        "--username",
        username,
        "--password",
        password,
        "--upsert",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// Register repository credentials with ArgoCD
pub fn add_repo(repo_url: &str, username: &str, password: &str) -> Result<()> {
    Cmd::new("argocd")
        .args(add_repo_args(repo_url, username, password))
        .secret(password)
        .output()
        .with_context(|| format!("Failed to register repository {repo_url} with ArgoCD"))?;
    Ok(())
}

pub fn create_app_args(app: &AppConfig, repo_url: &str, revision: &str) -> Vec<String> {
    let mut args: Vec<String> = [
        "app",
        "create",
        app.name.as_str(),
        "--repo",
        repo_url,
        "--path",
        app.path.as_str(),
        "--revision",
        revision,
        "--dest-server",
        app.dest_server.as_str(),
        "--dest-namespace",
        app.dest_namespace.as_str(),
        "--sync-option",
        "CreateNamespace=true",
        "--upsert",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();

    if app.auto_sync {
        args.extend(["--sync-policy", "automated"].map(String::from));
    }
    args
}

/// Create (or update) the application pointing at `repo_url`
pub fn create_app(app: &AppConfig, repo_url: &str, revision: &str) -> Result<()> {
    Cmd::new("argocd")
        .args(create_app_args(app, repo_url, revision))
        .output()
        .with_context(|| format!("Failed to create ArgoCD application {}", app.name))?;
    Ok(())
}

/// Sync and wait until the application is healthy
pub fn sync_app(app: &AppConfig) -> Result<()> {
    Cmd::new("argocd")
        .args(["app", "sync", app.name.as_str()])
        .run()
        .with_context(|| format!("Failed to sync {}", app.name))?;

    let timeout = app.sync_timeout_secs.to_string();
    Cmd::new("argocd")
        .args([
            "app",
            "wait",
            app.name.as_str(),
            "--health",
            "--timeout",
            timeout.as_str(),
        ])
        .run()
        .with_context(|| format!("{} did not become healthy", app.name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_args() {
        let args = login_args("127.0.0.1:8080", "admin", "pw");
        assert_eq!(args[0], "login");
        assert_eq!(args[1], "127.0.0.1:8080");
        assert!(args.contains(&"--insecure".to_string()));
        assert!(args.windows(2).any(|w| w == ["--password", "pw"]));
    }

    #[test]
    fn test_add_repo_args() {
        let args = add_repo_args("http://gitlab-webservice-default.gitlab.svc:8181/root/x.git", "root", "pw");
        assert_eq!(&args[..2], ["repo", "add"]);
        assert!(args.contains(&"--upsert".to_string()));
    }

    #[test]
    fn test_create_app_args() {
        let mut app = AppConfig::default();
        let args = create_app_args(&app, "http://repo/x.git", "main");
        assert_eq!(&args[..3], ["app", "create", "l4b-app"]);
        assert!(args.windows(2).any(|w| w == ["--revision", "main"]));
        assert!(args.windows(2).any(|w| w == ["--dest-namespace", "default"]));
        assert!(!args.contains(&"--sync-policy".to_string()));

        app.auto_sync = true;
        let args = create_app_args(&app, "http://repo/x.git", "main");
        assert_eq!(args[args.len() - 2..], ["--sync-policy", "automated"]);
    }
}
