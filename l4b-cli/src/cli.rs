//! Command-line definition

use crate::component::Component;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "l4b",
    version,
    about = "🥾 Local GitLab + ArgoCD lab on k3d",
    long_about = "Stands up a local k3d cluster, installs GitLab and ArgoCD, \
                  retrieves their generated credentials, opens port-forward tunnels \
                  and pushes local directories as GitLab projects."
)]
pub struct Cli {
    /// Config file (default: ./l4b.toml, then the user config)
    #[arg(long, global = true, env = "L4B_CONFIG")]
    pub config: Option<PathBuf>,

    /// State directory for tunnels, logs and reports
    #[arg(long, global = true, env = "L4B_HOME")]
    pub state_dir: Option<PathBuf>,

    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the cluster, install everything, open tunnels
    #[command(alias = "init")]
    Up(UpArgs),

    /// Stop tunnels and delete the cluster
    Down {
        /// Only stop the tunnels
        #[arg(long)]
        keep_cluster: bool,
    },

    /// Check prerequisites only
    Check {
        /// Auto-install missing tools
        #[arg(long)]
        install: bool,
    },

    /// Cluster, pod and tunnel status
    Status,

    /// Print a component's generated admin password
    Password {
        #[arg(value_enum)]
        component: Component,
    },

    /// Manage port-forward tunnels
    Tunnel {
        #[command(subcommand)]
        action: TunnelAction,
    },

    /// Show logs of a component's main pods
    Logs {
        #[arg(value_enum)]
        component: Component,

        /// Lines per container
        #[arg(long, default_value_t = 100)]
        tail: u32,

        /// Stream until interrupted
        #[arg(short, long)]
        follow: bool,
    },

    /// Push a local directory as a new GitLab project
    Push(PushArgs),

    /// Manage the ArgoCD application fed from GitLab
    App {
        #[command(subcommand)]
        action: AppAction,
    },

    /// Interactive menu for common actions
    Menu,

    /// Inspect or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Args, Clone, Default)]
pub struct UpArgs {
    /// Don't install GitLab
    #[arg(long)]
    pub skip_gitlab: bool,

    /// Don't install ArgoCD
    #[arg(long)]
    pub skip_argocd: bool,

    /// Skip auto-installation of missing binaries
    #[arg(long)]
    pub skip_install: bool,

    /// Don't open port-forward tunnels
    #[arg(long)]
    pub no_tunnels: bool,

    /// Push this directory to GitLab (and wire it into ArgoCD) when done
    #[arg(long, value_name = "DIR")]
    pub push: Option<PathBuf>,

    /// Don't print the generated passwords at the end
    #[arg(long)]
    pub hide_credentials: bool,

    /// Drop into the interactive menu when done
    #[arg(long)]
    pub menu: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum TunnelAction {
    /// Open tunnels (all enabled components by default)
    Start {
        #[arg(value_enum)]
        component: Option<Component>,
    },
    /// Close tunnels
    Stop {
        #[arg(value_enum)]
        component: Option<Component>,
    },
    /// Close and reopen tunnels
    Restart {
        #[arg(value_enum)]
        component: Option<Component>,
    },
    /// Show tunnel state
    Status,
}

#[derive(Debug, Args, Clone)]
pub struct PushArgs {
    /// Directory to push
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Project name (default: directory name)
    #[arg(long)]
    pub project: Option<String>,

    /// Branch to push to
    #[arg(long)]
    pub branch: Option<String>,

    /// Commit message for uncommitted content
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum AppAction {
    /// Register the GitLab repo and create the application
    Create {
        /// Project path, e.g. root/my-app (default: last pushed)
        #[arg(long)]
        project: Option<String>,

        /// Application name
        #[arg(long)]
        name: Option<String>,
    },
    /// Sync the application and wait until healthy
    Sync {
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Destination (default: ./l4b.toml)
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
    /// Print where the configuration was loaded from
    Path,
}
