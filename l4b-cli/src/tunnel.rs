//! Port-forward tunnels
//!
//! Each tunnel is a detached `kubectl port-forward` process. Its pid lives in
//! `<state>/tunnels/<name>.pid` and its output in `<state>/logs/<name>.log`,
//! so tunnels outlive the `l4b` invocation that opened them and any later
//! invocation can stop or restart them.

use crate::bootstrap::skeleton::{LOGS_DIR, TUNNELS_DIR};
use crate::component::Component;
use anyhow::{Context, Result};
use l4b_c0re_lib::L4bConfig;
use std::fs::{self, OpenOptions};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// One service port exposed on this machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunnel {
    pub name: String,
    pub namespace: String,
    pub service: String,
    pub local_port: u16,
    pub remote_port: u16,
}

impl Tunnel {
    pub fn for_component(component: Component, config: &L4bConfig) -> Self {
        match component {
            Component::Gitlab => Self {
                name: component.name().to_string(),
                namespace: config.gitlab.namespace.clone(),
                service: config.gitlab.service.clone(),
                local_port: config.gitlab.local_port,
                remote_port: config.gitlab.service_port,
            },
            Component::Argocd => Self {
                name: component.name().to_string(),
                namespace: config.argocd.namespace.clone(),
                service: config.argocd.service.clone(),
                local_port: config.argocd.local_port,
                remote_port: config.argocd.service_port,
            },
        }
    }

    pub fn port_forward_args(&self, kube_context: &str, bind_address: &str) -> Vec<String> {
        vec![
            "--context".to_string(),
            kube_context.to_string(),
            "port-forward".to_string(),
            "-n".to_string(),
            self.namespace.clone(),
            format!("svc/{}", self.service),
            format!("{}:{}", self.local_port, self.remote_port),
            "--address".to_string(),
            bind_address.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    Running(u32),
    /// Pidfile points at a process that is gone (or no longer a port-forward)
    Stale(u32),
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelStatus {
    pub name: String,
    pub local_port: u16,
    pub state: TunnelState,
}

impl TunnelStatus {
    pub fn is_running(&self) -> bool {
        matches!(self.state, TunnelState::Running(_))
    }
}

pub struct TunnelManager {
    state_dir: PathBuf,
    bind_address: String,
    ready_timeout: Duration,
    kubectl: PathBuf,
}

impl TunnelManager {
    pub fn new(state_dir: &Path, config: &L4bConfig) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            bind_address: config.tunnels.bind_address.clone(),
            ready_timeout: Duration::from_secs(config.tunnels.ready_timeout_secs),
            kubectl: PathBuf::from("kubectl"),
        }
    }

    /// Run port-forwards with `program` instead of `kubectl` from PATH
    #[must_use]
    pub fn with_kubectl(mut self, program: impl Into<PathBuf>) -> Self {
        self.kubectl = program.into();
        self
    }

    pub fn pid_file(&self, name: &str) -> PathBuf {
        self.state_dir.join(TUNNELS_DIR).join(format!("{name}.pid"))
    }

    pub fn log_file(&self, name: &str) -> PathBuf {
        self.state_dir.join(LOGS_DIR).join(format!("{name}.log"))
    }

    fn read_pid(&self, name: &str) -> Option<u32> {
        fs::read_to_string(self.pid_file(name))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    pub fn status(&self, tunnel: &Tunnel) -> TunnelStatus {
        let state = match self.read_pid(&tunnel.name) {
            Some(pid) if is_port_forward(pid) => TunnelState::Running(pid),
            Some(pid) => TunnelState::Stale(pid),
            None => TunnelState::Stopped,
        };
        TunnelStatus {
            name: tunnel.name.clone(),
            local_port: tunnel.local_port,
            state,
        }
    }

    /// Open the tunnel unless it is already up
    pub async fn start(&self, kube_context: &str, tunnel: &Tunnel) -> Result<TunnelStatus> {
        let current = self.status(tunnel);
        match current.state {
            TunnelState::Running(pid) => {
                tracing::debug!(name = %tunnel.name, pid, "tunnel already running");
                return Ok(current);
            }
            TunnelState::Stale(pid) => {
                tracing::debug!(name = %tunnel.name, pid, "removing stale pidfile");
                let _ = fs::remove_file(self.pid_file(&tunnel.name));
            }
            TunnelState::Stopped => {}
        }

        let addr = local_addr(&self.bind_address, tunnel.local_port)?;
        if port_accepts(&addr) {
            anyhow::bail!(
                "port {} is already in use by another process; free it or change the {} local_port",
                tunnel.local_port,
                tunnel.name
            );
        }

        let pid = self.spawn(kube_context, tunnel)?;
        fs::write(self.pid_file(&tunnel.name), pid.to_string())
            .with_context(|| format!("Failed to write {}", self.pid_file(&tunnel.name).display()))?;

        let deadline = Instant::now() + self.ready_timeout;
        loop {
            if port_accepts(&addr) {
                return Ok(TunnelStatus {
                    name: tunnel.name.clone(),
                    local_port: tunnel.local_port,
                    state: TunnelState::Running(pid),
                });
            }
            if !process_alive(pid) {
                let _ = fs::remove_file(self.pid_file(&tunnel.name));
                anyhow::bail!(
                    "kubectl port-forward for {} exited; see {}",
                    tunnel.name,
                    self.log_file(&tunnel.name).display()
                );
            }
            if Instant::now() >= deadline {
                self.stop(tunnel).await?;
                anyhow::bail!(
                    "port-forward for {} did not accept connections within {}s; see {}",
                    tunnel.name,
                    self.ready_timeout.as_secs(),
                    self.log_file(&tunnel.name).display()
                );
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    fn spawn(&self, kube_context: &str, tunnel: &Tunnel) -> Result<u32> {
        let log_path = self.log_file(&tunnel.name);
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Some(parent) = self.pid_file(&tunnel.name).parent() {
            fs::create_dir_all(parent)?;
        }

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open {}", log_path.display()))?;
        let log_err = log.try_clone()?;

        // Own process group: Ctrl-C in the menu must not take the tunnel down
        let child = Command::new(&self.kubectl)
            .args(tunnel.port_forward_args(kube_context, &self.bind_address))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .process_group(0)
            .spawn()
            .context("Failed to spawn kubectl port-forward")?;

        tracing::info!(name = %tunnel.name, pid = child.id(), "port-forward spawned");
        Ok(child.id())
    }

    /// Stop the tunnel; returns false when nothing was running
    pub async fn stop(&self, tunnel: &Tunnel) -> Result<bool> {
        let pid_file = self.pid_file(&tunnel.name);
        let status = self.status(tunnel);

        let stopped = match status.state {
            TunnelState::Running(pid) => {
                terminate(pid).await?;
                true
            }
            TunnelState::Stale(_) | TunnelState::Stopped => false,
        };

        if pid_file.exists() {
            fs::remove_file(&pid_file)
                .with_context(|| format!("Failed to remove {}", pid_file.display()))?;
        }
        Ok(stopped)
    }

    pub async fn restart(&self, kube_context: &str, tunnel: &Tunnel) -> Result<TunnelStatus> {
        self.stop(tunnel).await?;
        self.start(kube_context, tunnel).await
    }
}

fn local_addr(bind_address: &str, port: u16) -> Result<SocketAddr> {
    (bind_address, port)
        .to_socket_addrs()
        .with_context(|| format!("Invalid bind address {bind_address}"))?
        .next()
        .with_context(|| format!("No address for {bind_address}"))
}

/// Something is listening on `addr`
pub fn port_accepts(addr: &SocketAddr) -> bool {
    TcpStream::connect_timeout(addr, Duration::from_millis(300)).is_ok()
}

fn pid_t(pid: u32) -> Option<libc::pid_t> {
    libc::pid_t::try_from(pid).ok().filter(|p| *p > 0)
}

/// Reap `pid` if it is our exited child so it stops looking alive
fn reap(pid: libc::pid_t) {
    // SAFETY: WNOHANG never blocks; ECHILD for foreign pids is ignored
    unsafe {
        libc::waitpid(pid, std::ptr::null_mut(), libc::WNOHANG);
    }
}

pub fn process_alive(pid: u32) -> bool {
    let Some(pid) = pid_t(pid) else {
        return false;
    };
    reap(pid);
    // SAFETY: signal 0 performs the permission/existence check only
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Alive and, where /proc can tell us, still a kubectl port-forward
fn is_port_forward(pid: u32) -> bool {
    if !process_alive(pid) {
        return false;
    }
    match fs::read(format!("/proc/{pid}/cmdline")) {
        Ok(cmdline) => String::from_utf8_lossy(&cmdline).contains("port-forward"),
        Err(_) => true,
    }
}

/// SIGTERM, then wait up to two seconds for the process to go away
async fn terminate(pid: u32) -> Result<()> {
    let Some(raw) = pid_t(pid) else {
        return Ok(());
    };
    // SAFETY: plain signal delivery to a pid we recorded
    let rc = unsafe { libc::kill(raw, libc::SIGTERM) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err).with_context(|| format!("Failed to signal pid {pid}"));
        }
    }

    let deadline = Instant::now() + Duration::from_secs(2);
    while process_alive(pid) && Instant::now() < deadline {
        sleep(Duration::from_millis(50)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::os::unix::fs::PermissionsExt;

    /// Stands in for kubectl: listens on the LOCAL half of `LOCAL:REMOTE`
    /// and keeps `port-forward` in its command line
    const FAKE_KUBECTL: &str = r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in *:*) port="${arg%%:*}" ;; esac
done
exec python3 -c 'import socket, sys
s = socket.socket()
s.setsockopt(socket.SOL_SOCKET, socket.SO_REUSEADDR, 1)
s.bind(("127.0.0.1", int(sys.argv[1])))
s.listen(8)
while True:
    c, _ = s.accept()
    c.close()' "$port" port-forward
"#;

    fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn manager(dir: &Path) -> TunnelManager {
        TunnelManager::new(dir, &L4bConfig::default())
    }

    fn tunnel(port: u16) -> Tunnel {
        Tunnel {
            name: "test".to_string(),
            namespace: "default".to_string(),
            service: "nothing".to_string(),
            local_port: port,
            remote_port: 80,
        }
    }

    #[test]
    fn test_for_component() {
        let config = L4bConfig::default();
        let gitlab = Tunnel::for_component(Component::Gitlab, &config);
        assert_eq!(gitlab.local_port, 8929);
        assert_eq!(gitlab.remote_port, 8181);
        assert_eq!(gitlab.service, "gitlab-webservice-default");

        let argocd = Tunnel::for_component(Component::Argocd, &config);
        let args = argocd.port_forward_args("k3d-l4b", "127.0.0.1");
        assert_eq!(
            args,
            vec![
                "--context",
                "k3d-l4b",
                "port-forward",
                "-n",
                "argocd",
                "svc/argocd-server",
                "8080:443",
                "--address",
                "127.0.0.1",
            ]
        );
    }

    #[test]
    fn test_status_stopped_and_stale() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let t = tunnel(1);

        assert_eq!(manager.status(&t).state, TunnelState::Stopped);

        fs::create_dir_all(dir.path().join(TUNNELS_DIR)).unwrap();
        // pid_max on Linux stays well below this
        fs::write(manager.pid_file("test"), "999999999").unwrap();
        assert_eq!(manager.status(&t).state, TunnelState::Stale(999_999_999));

        // our own pid is alive but not a port-forward
        fs::write(manager.pid_file("test"), std::process::id().to_string()).unwrap();
        let state = manager.status(&t).state;
        if Path::new("/proc/self/cmdline").exists() {
            assert_eq!(state, TunnelState::Stale(std::process::id()));
        }
    }

    #[tokio::test]
    async fn test_stop_removes_stale_pidfile() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        fs::create_dir_all(dir.path().join(TUNNELS_DIR)).unwrap();
        fs::write(manager.pid_file("test"), "999999999").unwrap();

        assert!(!manager.stop(&tunnel(1)).await.unwrap());
        assert!(!manager.pid_file("test").exists());
    }

    #[tokio::test]
    async fn test_start_refuses_busy_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let dir = tempfile::tempdir().unwrap();

        let err = manager(dir.path())
            .start("k3d-none", &tunnel(port))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_terminates() {
        if !l4b_c0re_lib::command_available("python3") {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("kubectl");
        fs::write(&fake, FAKE_KUBECTL).unwrap();
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();

        let manager = manager(dir.path()).with_kubectl(fake.clone());
        let t = tunnel(free_port());

        let started = manager.start("k3d-test", &t).await.unwrap();
        let TunnelState::Running(pid) = started.state else {
            panic!("expected a running tunnel, got {:?}", started.state);
        };
        let recorded = fs::read_to_string(manager.pid_file("test")).unwrap();
        assert_eq!(recorded.trim(), pid.to_string());
        assert_eq!(manager.status(&t).state, TunnelState::Running(pid));

        // already up: no second process
        let again = manager.start("k3d-test", &t).await.unwrap();
        assert_eq!(again.state, TunnelState::Running(pid));

        assert!(manager.stop(&t).await.unwrap());
        assert!(!manager.pid_file("test").exists());
        assert!(!process_alive(pid));
        assert_eq!(manager.status(&t).state, TunnelState::Stopped);
    }

    #[test]
    fn test_process_alive() {
        assert!(process_alive(std::process::id()));
        assert!(!process_alive(0));
        assert!(!process_alive(999_999_999));
    }
}
