// Environment detection
// Is the container runtime up, which kube context is active

use l4b_c0re_lib::Cmd;

/// Container runtime k3d will talk to, if its daemon answers
pub fn container_runtime() -> Option<&'static str> {
    ["docker", "podman"]
        .into_iter()
        .find(|runtime| daemon_running(runtime))
}

/// `<runtime> info` only succeeds when the daemon/socket is reachable
pub fn daemon_running(runtime: &str) -> bool {
    Cmd::new(runtime).arg("info").succeeds()
}

/// Active kubeconfig context, if kubectl has one configured
pub fn current_kube_context() -> Option<String> {
    Cmd::new("kubectl")
        .args(["config", "current-context"])
        .output()
        .ok()
        .map(|out| out.trim().to_string())
        .filter(|ctx| !ctx.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_runtime_is_not_running() {
        assert!(!daemon_running("definitely-not-a-real-binary-l4b"));
    }
}
