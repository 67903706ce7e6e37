//! Post-provisioning fix-ups executed inside the new container.
//!
//! Steps are independent and best-effort: each runs in fixed order, failures
//! are logged and reported, nothing is rolled back, and the provisioning
//! result never depends on them.

use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::provision::mounts::{container_home, credentials_target};
use crate::util::{shell_join, ExecRequest, ExecService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixupStep {
    pub name: &'static str,
    /// User passed to `exec -u`.
    pub exec_user: String,
    pub script: String,
}

impl FixupStep {
    /// `<runtime> exec ...` arguments, without the runtime itself.
    pub fn exec_args(&self, container_id: &str) -> Vec<String> {
        vec![
            "exec".to_string(),
            "-u".to_string(),
            self.exec_user.clone(),
            container_id.to_string(),
            "sh".to_string(),
            "-c".to_string(),
            self.script.clone(),
        ]
    }
}

#[derive(Debug)]
pub struct FixupReport {
    pub step: &'static str,
    pub result: Result<()>,
}

/// Build the step list for `user`. The credentials step is only present when
/// the credentials directory was mounted.
pub fn plan(user: &str, known_host: &str, credentials_mounted: bool) -> Vec<FixupStep> {
    let home = container_home(user);
    let has_user = format!("id -u {user} >/dev/null 2>&1");
    let mut steps = vec![FixupStep {
        name: "ssh-dir",
        exec_user: "root".to_string(),
        script: format!(
            "if {has_user}; then mkdir -p {home}/.ssh && chown {user}:{user} {home}/.ssh && chmod 700 {home}/.ssh; fi"
        ),
    }];
    if credentials_mounted {
        steps.push(FixupStep {
            name: "credentials-owner",
            exec_user: "root".to_string(),
            script: format!(
                "if {has_user}; then chown -R {user}:{user} {}; fi",
                credentials_target(user)
            ),
        });
    }
    steps.push(FixupStep {
        name: "known-hosts",
        exec_user: user.to_string(),
        script: format!(
            "mkdir -p ~/.ssh && ssh-keyscan {known_host} >> ~/.ssh/known_hosts 2>/dev/null"
        ),
    });
    steps
}

/// Run every step against `container_id`. Never fails as a whole.
pub fn run(
    runtime: &str,
    container_id: &str,
    steps: &[FixupStep],
    timeout: Duration,
) -> Vec<FixupReport> {
    let exec = ExecService::new(timeout);
    steps
        .iter()
        .map(|step| {
            let result = run_step(&exec, runtime, container_id, step);
            match &result {
                Ok(()) => tracing::debug!(step = step.name, "fix-up applied"),
                Err(e) => tracing::warn!(step = step.name, "fix-up failed: {e:#}"),
            }
            FixupReport {
                step: step.name,
                result,
            }
        })
        .collect()
}

fn run_step(exec: &ExecService, runtime: &str, container_id: &str, step: &FixupStep) -> Result<()> {
    let args = step.exec_args(container_id);
    tracing::debug!("{} {}", runtime, shell_join(&args));
    let out = exec.run(ExecRequest::new(runtime).args(&args).capture_output(true))?;
    if out.status.success() {
        Ok(())
    } else {
        let detail = failure_detail(&out.stdout, &out.stderr);
        Err(anyhow!(
            "{} exited with {}{}{}",
            runtime,
            out.status,
            if detail.is_empty() { "" } else { ": " },
            detail
        ))
    }
}

// `docker exec` relays the script's own output; many scripts report on stdout.
fn failure_detail<'a>(stdout: &'a str, stderr: &'a str) -> &'a str {
    match stderr.trim() {
        "" => stdout.trim(),
        err => err,
    }
}

/// Runtime program for `exec`: PATH lookup, falling back to the bare name.
pub fn runtime_program(runtime: &str) -> String {
    match which::which(runtime) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => runtime.to_string(),
    }
}
