//! Runtime configuration: CLI-provided port plus optional environment overrides.
//!
//! Every override is read once at startup; nothing here is re-read per request.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
/// Size of the single read that makes up a request.
pub const READ_BUFFER_SIZE: usize = 1024;
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub const DEFAULT_DEVCONTAINER_BIN: &str = "devcontainer";
pub const DEFAULT_RUNTIME: &str = "docker";
pub const DEFAULT_CONTAINER_USER: &str = "vscode";
pub const DEFAULT_KNOWN_HOST: &str = "github.com";
pub const DEFAULT_FIXUP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_host: String,
    pub port: u16,
    pub read_buffer: usize,
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            read_buffer: READ_BUFFER_SIZE,
            poll_interval: ACCEPT_POLL_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn from_env(port: u16) -> Self {
        Self {
            bind_host: env_nonempty("DEVCONTAINER_LAUNCHER_BIND")
                .unwrap_or_else(|| DEFAULT_BIND_HOST.to_string()),
            port,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Explicit provisioning executable; bypasses platform resolution.
    pub devcontainer_bin: Option<PathBuf>,
    /// Container runtime used for `exec` fix-ups.
    pub runtime: String,
    pub container_user: String,
    pub known_host: String,
    /// Host home directory consulted for optional mounts; `None` means the user's home.
    pub home: Option<PathBuf>,
    /// Cap on the `up` run. `None` waits for the tool indefinitely.
    pub up_timeout: Option<Duration>,
    pub fixup_timeout: Duration,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            devcontainer_bin: None,
            runtime: DEFAULT_RUNTIME.to_string(),
            container_user: DEFAULT_CONTAINER_USER.to_string(),
            known_host: DEFAULT_KNOWN_HOST.to_string(),
            home: None,
            up_timeout: None,
            fixup_timeout: DEFAULT_FIXUP_TIMEOUT,
        }
    }
}

impl ProvisionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            devcontainer_bin: env_nonempty("DEVCONTAINER_LAUNCHER_BIN").map(PathBuf::from),
            runtime: env_nonempty("DEVCONTAINER_LAUNCHER_RUNTIME").unwrap_or(defaults.runtime),
            container_user: env_nonempty("DEVCONTAINER_LAUNCHER_USER")
                .unwrap_or(defaults.container_user),
            known_host: env_nonempty("DEVCONTAINER_LAUNCHER_KNOWN_HOST")
                .unwrap_or(defaults.known_host),
            home: None,
            up_timeout: env_nonempty("DEVCONTAINER_LAUNCHER_UP_TIMEOUT_SECS")
                .as_deref()
                .and_then(parse_secs),
            fixup_timeout: env_nonempty("DEVCONTAINER_LAUNCHER_FIXUP_TIMEOUT_SECS")
                .as_deref()
                .and_then(parse_secs)
                .unwrap_or(defaults.fixup_timeout),
        }
    }

    pub fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone().or_else(home::home_dir)
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a positive number of seconds; zero and garbage both mean "unset".
pub(crate) fn parse_secs(s: &str) -> Option<Duration> {
    s.trim()
        .parse::<u64>()
        .ok()
        .filter(|&v| v > 0)
        .map(Duration::from_secs)
}
