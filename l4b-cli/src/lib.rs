//! l4b: a local GitLab + ArgoCD lab on k3d
//!
//! Drives docker, k3d, kubectl, helm, argocd and git to stand up a
//! throwaway cluster, install GitLab and ArgoCD, hand out their generated
//! credentials, tunnel them to localhost and push local directories into
//! GitLab for ArgoCD to deploy.

pub mod argocd;
pub mod bootstrap;
pub mod cli;
pub mod cluster;
pub mod commands;
pub mod component;
pub mod context;
pub mod git;
pub mod gitlab;
pub mod helm;
pub mod kube;
pub mod menu;
pub mod tunnel;

pub use cli::{Cli, Commands};
pub use component::Component;
pub use context::Lab;
