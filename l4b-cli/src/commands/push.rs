//! `l4b push` and `l4b app`: local dir → GitLab → ArgoCD

use crate::argocd;
use crate::cli::{AppAction, PushArgs};
use crate::commands::status::fetch_password;
use crate::commands::tunnel::ensure_tunnel;
use crate::component::Component;
use crate::context::Lab;
use crate::git::{PushRequest, push_directory};
use crate::gitlab::{GitlabApi, Project, in_cluster_repo_url, local_repo_url};
use anyhow::{Context, Result};
use l4b_c0re_lib::ui;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Seconds to wait for GitLab's webservice to answer through the tunnel
const GITLAB_READY_SECS: u64 = 120;

/// Recorded after every successful push
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastPush {
    pub path_with_namespace: String,
    pub branch: String,
    pub local_url: String,
    pub pushed_at: String,
}

pub fn read_last_push(path: &Path) -> Result<Option<LastPush>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let last = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(last))
}

pub fn write_last_push(path: &Path, last: &LastPush) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(last).context("Failed to serialize last push")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Project name for a directory: explicit, else the directory's own name
pub fn project_name_for(dir: &Path, explicit: Option<&str>) -> Result<String> {
    if let Some(name) = explicit.filter(|n| !n.trim().is_empty()) {
        return Ok(name.trim().to_string());
    }
    let canonical = dir
        .canonicalize()
        .with_context(|| format!("Cannot resolve {}", dir.display()))?;
    canonical
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("{} has no directory name; pass --project", dir.display()))
}

/// Create the GitLab project for `dir` and push its content
pub async fn push(lab: &Lab, args: &PushArgs) -> Result<Project> {
    let gitlab_cfg = &lab.config.gitlab;
    let push_cfg = &lab.config.push;

    let name = project_name_for(
        &args.dir,
        args.project.as_deref().or(push_cfg.project.as_deref()),
    )?;
    let branch = args.branch.as_deref().unwrap_or(&push_cfg.branch);
    let message = args.message.as_deref().unwrap_or(&push_cfg.commit_message);

    ui::step(&format!("Pushing {} to GitLab as {name}", args.dir.display()));

    let password = fetch_password(lab, Component::Gitlab).await?;
    ensure_tunnel(lab, Component::Gitlab).await?;

    let mut api = GitlabApi::new(&gitlab_cfg.local_url());
    api.wait_ready(GITLAB_READY_SECS).await?;
    api.login(&gitlab_cfg.root_user, &password).await?;

    let (project, created) = api
        .create_project(&gitlab_cfg.root_user, &name, &push_cfg.visibility)
        .await?;
    if created {
        ui::success(&format!("Created project {}", project.path_with_namespace));
    } else {
        ui::info(&format!("Project {} already exists", project.path_with_namespace));
    }

    let remote_url = local_repo_url(&project.http_url_to_repo, api.base())?;
    let token = api.token().context("GitLab login returned no token")?;
    push_directory(&PushRequest {
        dir: &args.dir,
        remote_url: &remote_url,
        remote_name: &push_cfg.remote_name,
        branch,
        message,
        username: "oauth2",
        token,
    })?;

    write_last_push(
        &lab.last_push_path(),
        &LastPush {
            path_with_namespace: project.path_with_namespace.clone(),
            branch: branch.to_string(),
            local_url: remote_url.clone(),
            pushed_at: chrono::Utc::now().to_rfc3339(),
        },
    )?;

    ui::success(&format!("Pushed to {remote_url} ({branch})"));
    ui::kv("web", &local_repo_url(&project.web_url, api.base())?);
    Ok(project)
}

/// Register the project's in-cluster URL with ArgoCD and create the app
pub async fn create_app(lab: &Lab, project: Option<&str>, name: Option<&str>) -> Result<()> {
    let mut app = lab.config.app.clone();
    if let Some(name) = name {
        app.name = name.to_string();
    }

    let last = read_last_push(&lab.last_push_path())?;
    let (path, branch) = match (project, &last) {
        (Some(path), _) => (path.to_string(), lab.config.push.branch.clone()),
        (None, Some(last)) => (last.path_with_namespace.clone(), last.branch.clone()),
        (None, None) => anyhow::bail!("No project pushed yet; pass --project or run `l4b push`"),
    };

    ui::step(&format!("Creating ArgoCD application {} from {path}", app.name));

    let argocd_password = fetch_password(lab, Component::Argocd).await?;
    let gitlab_password = fetch_password(lab, Component::Gitlab).await?;
    ensure_tunnel(lab, Component::Argocd).await?;
    argocd::login(&lab.config.argocd, &argocd_password)?;

    let repo_url = in_cluster_repo_url(&lab.config.gitlab, &path);
    argocd::add_repo(&repo_url, &lab.config.gitlab.root_user, &gitlab_password)?;
    argocd::create_app(&app, &repo_url, &branch)?;
    ui::success(&format!("Application {} → {repo_url}", app.name));
    Ok(())
}

pub async fn sync_app(lab: &Lab, name: Option<&str>) -> Result<()> {
    let mut app = lab.config.app.clone();
    if let Some(name) = name {
        app.name = name.to_string();
    }

    let password = fetch_password(lab, Component::Argocd).await?;
    ensure_tunnel(lab, Component::Argocd).await?;
    argocd::login(&lab.config.argocd, &password)?;

    ui::info(&format!("Syncing {}...", app.name));
    argocd::sync_app(&app)?;
    ui::success(&format!("{} synced and healthy", app.name));
    Ok(())
}

pub async fn handle_app_command(action: AppAction, lab: &Lab) -> Result<()> {
    match action {
        AppAction::Create { project, name } => {
            create_app(lab, project.as_deref(), name.as_deref()).await
        }
        AppAction::Sync { name } => sync_app(lab, name.as_deref()).await,
    }
}

/// `PushArgs` for a directory with everything else from config
pub fn push_args_for(dir: PathBuf) -> PushArgs {
    PushArgs {
        dir,
        project: None,
        branch: None,
        message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_name_for() {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("my-site");
        std::fs::create_dir(&site).unwrap();

        assert_eq!(project_name_for(&site, None).unwrap(), "my-site");
        assert_eq!(project_name_for(&site, Some("other")).unwrap(), "other");
        assert_eq!(project_name_for(&site, Some("  ")).unwrap(), "my-site");
        assert!(project_name_for(&dir.path().join("missing"), None).is_err());
    }

    #[test]
    fn test_last_push_roundtrip_and_absence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last-push.toml");
        assert!(read_last_push(&path).unwrap().is_none());

        let last = LastPush {
            path_with_namespace: "root/my-site".to_string(),
            branch: "main".to_string(),
            local_url: "http://127.0.0.1:8929/root/my-site.git".to_string(),
            pushed_at: "2026-10-19T00:00:00+00:00".to_string(),
        };
        write_last_push(&path, &last).unwrap();
        assert_eq!(read_last_push(&path).unwrap(), Some(last));
    }
}
