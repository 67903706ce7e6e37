#![allow(clippy::module_name_repetitions)]
//! Optional host resources bind-mounted into the dev container.
//!
//! Each resource is checked on its own; any subset may be present.

use std::path::{Path, PathBuf};

/// Private keys tried in order; the first existing file is mounted.
const SSH_KEY_CANDIDATES: &[&str] = &["id_ed25519", "id_rsa"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    SshKey,
    GitConfig,
    Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMount {
    pub kind: MountKind,
    pub source: PathBuf,
    pub target: String,
}

impl HostMount {
    /// Value for the tool's `--mount` flag.
    pub fn to_mount_arg(&self) -> String {
        format!(
            "type=bind,source={},target={}",
            self.source.display(),
            self.target
        )
    }
}

/// Container-side home of the conventional non-root user.
pub fn container_home(user: &str) -> String {
    format!("/home/{user}")
}

/// Container path of the CLI credentials directory for `user`.
pub fn credentials_target(user: &str) -> String {
    format!("{}/.config/gh", container_home(user))
}

/// Resources found under `home`. Missing files produce no entry.
pub fn discover(home: &Path, user: &str) -> Vec<HostMount> {
    let chome = container_home(user);
    let mut mounts = Vec::new();

    let ssh_dir = home.join(".ssh");
    if let Some(name) = SSH_KEY_CANDIDATES
        .iter()
        .find(|n| ssh_dir.join(n).is_file())
    {
        mounts.push(HostMount {
            kind: MountKind::SshKey,
            source: ssh_dir.join(name),
            target: format!("{chome}/.ssh/{name}"),
        });
    }

    let gitconfig = home.join(".gitconfig");
    if gitconfig.is_file() {
        mounts.push(HostMount {
            kind: MountKind::GitConfig,
            source: gitconfig,
            target: format!("{chome}/.gitconfig"),
        });
    }

    let creds = home.join(".config").join("gh");
    if creds.is_dir() {
        mounts.push(HostMount {
            kind: MountKind::Credentials,
            source: creds,
            target: credentials_target(user),
        });
    }

    mounts
}

/// Full argument list for `devcontainer up`.
pub fn up_args(workspace: &str, mounts: &[HostMount]) -> Vec<String> {
    let mut args = vec![
        "up".to_string(),
        "--workspace-folder".to_string(),
        workspace.to_string(),
    ];
    for m in mounts {
        args.push("--mount".to_string());
        args.push(m.to_mount_arg());
    }
    args
}
