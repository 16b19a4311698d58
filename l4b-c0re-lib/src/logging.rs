//! Logging setup and colored terminal status lines
//!
//! Two channels:
//! - `tracing` diagnostics on stderr, filtered by `-v` / `L4B_LOG` / `RUST_LOG`
//! - [`ui`] status lines on stdout, the human-facing progress log

use tracing_subscriber::EnvFilter;

/// Map the `-v` count to a default filter directive
pub fn verbosity_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global tracing subscriber
///
/// `L4B_LOG` wins over `RUST_LOG`, which wins over the `-v` count.
pub fn init_tracing(verbosity: u8, no_color: bool) {
    let filter = std::env::var("L4B_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(verbosity_directive(verbosity)));

    let colored_output = !no_color && std::env::var_os("NO_COLOR").is_none();
    if !colored_output {
        colored::control::set_override(false);
    }

    // Ignore the error: a subscriber may already be installed (tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(colored_output)
        .with_target(verbosity > 1)
        .try_init();
}

/// Colored status output, one line per event
pub mod ui {
    use colored::Colorize;

    /// Section header for a bootstrap phase
    pub fn step(msg: &str) {
        println!();
        println!("{} {}", "==>".blue().bold(), msg.bold());
    }

    pub fn info(msg: &str) {
        println!("{} {}", "ℹ️ ".cyan(), msg);
    }

    pub fn success(msg: &str) {
        println!("{} {}", "✅".green(), msg.green());
    }

    pub fn warn(msg: &str) {
        println!("{} {}", "⚠️ ".yellow(), msg.yellow());
    }

    pub fn error(msg: &str) {
        eprintln!("{} {}", "❌".red(), msg.red().bold());
    }

    /// Aligned `key: value` line used for endpoints and credentials
    pub fn kv(key: &str, value: &str) {
        println!("   {:<18} {}", format!("{key}:").dimmed(), value.cyan());
    }
}
