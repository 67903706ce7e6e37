//! Locate the `devcontainer` executable.
//!
//! Unix hosts invoke the bare name and let PATH resolve it. Windows installs
//! via npm rarely put the `.cmd` shim on the service's PATH, so a short list
//! of well-known locations is checked first.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::{ProvisionConfig, DEFAULT_DEVCONTAINER_BIN};

const WINDOWS_SHIM: &str = "devcontainer.cmd";

/// Program to spawn for `devcontainer up`.
pub fn devcontainer_program(cfg: &ProvisionConfig) -> OsString {
    if let Some(p) = &cfg.devcontainer_bin {
        return p.clone().into_os_string();
    }
    platform_program()
}

#[cfg(not(windows))]
fn platform_program() -> OsString {
    OsString::from(DEFAULT_DEVCONTAINER_BIN)
}

#[cfg(windows)]
fn platform_program() -> OsString {
    let found = which::which(DEFAULT_DEVCONTAINER_BIN).ok().or_else(|| {
        let appdata = std::env::var_os("APPDATA").map(PathBuf::from);
        let candidates = windows_candidates(npm_global_prefix().as_deref(), appdata.as_deref());
        first_existing(&candidates)
    });
    match found {
        Some(p) => {
            tracing::debug!("resolved devcontainer at {}", p.display());
            p.into_os_string()
        }
        None => {
            tracing::debug!("devcontainer not found in known locations; using bare name");
            OsString::from(DEFAULT_DEVCONTAINER_BIN)
        }
    }
}

// `npm` is itself a `.cmd` shim on Windows; `Command::new("npm")` skips
// PATHEXT, so resolve it the same way as the devcontainer shim.
#[cfg(windows)]
fn npm_global_prefix() -> Option<PathBuf> {
    let npm = which::which("npm").ok()?;
    query_npm_prefix(&npm)
}

/// `<npm> config get prefix`, trimmed; `None` when the program fails or prints nothing.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn query_npm_prefix(npm: &Path) -> Option<PathBuf> {
    let out = Command::new(npm)
        .args(["config", "get", "prefix"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(PathBuf::from(s))
    }
}

/// Install locations checked after the PATH lookup, in priority order.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn windows_candidates(npm_prefix: Option<&Path>, appdata: Option<&Path>) -> Vec<PathBuf> {
    let shim = WINDOWS_SHIM;
    let mut out = Vec::new();
    if let Some(prefix) = npm_prefix {
        out.push(prefix.join(shim));
    }
    if let Some(appdata) = appdata {
        out.push(appdata.join("npm").join(shim));
    }
    out.push(PathBuf::from(r"C:\Program Files\nodejs").join(shim));
    out
}

#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_file()).cloned()
}
