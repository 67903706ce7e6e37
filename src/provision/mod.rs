/*!
Provisioning invoker: turns a workspace path into a container id.

- Resolve the `devcontainer` program and build `up --workspace-folder <path>`
  plus optional `--mount` flags for host resources that exist.
- Run it with stdout/stderr merged into one line stream, logging every line
  and feeding it to the id scanner (last matching line wins).
- Exit code decides: non-zero is an error regardless of any id seen; zero
  with an id runs the fix-up pipeline; zero without an id returns the log.
*/

pub mod fixup;
pub mod mounts;
pub mod resolve;
pub mod scan;

use std::ffi::OsString;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::ProvisionConfig;
use crate::errors::ProvisionError;
use crate::util::shell_join;

use self::mounts::{HostMount, MountKind};
use self::scan::ContainerIdScanner;

/// Result of one provisioning request. Rendered to the wire with `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Ready { container_id: String },
    Unknown { output: String },
    Failed { reason: String },
}

impl ProvisionOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        ProvisionOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProvisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionOutcome::Ready { container_id } => f.write_str(container_id),
            ProvisionOutcome::Unknown { output } => write!(f, "unknown: {output}"),
            ProvisionOutcome::Failed { reason } => write!(f, "error: {reason}"),
        }
    }
}

/// The fully built `devcontainer up` invocation.
#[derive(Debug, Clone)]
pub struct UpCommand {
    pub program: OsString,
    pub args: Vec<String>,
    pub mounts: Vec<HostMount>,
}

impl UpCommand {
    fn mounted(&self, kind: MountKind) -> bool {
        self.mounts.iter().any(|m| m.kind == kind)
    }
}

/// What the `up` run produced before the outcome policy is applied.
#[derive(Debug)]
pub struct RunReport {
    pub exit_code: i32,
    pub lines: Vec<String>,
    pub container_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Provisioner {
    config: ProvisionConfig,
}

impl Provisioner {
    pub fn new(config: ProvisionConfig) -> Self {
        Self { config }
    }

    /// Provision `workspace`. All failures are folded into the outcome.
    pub fn provision(&self, workspace: &str) -> ProvisionOutcome {
        let cmd = self.up_command(workspace);
        let report = match self.run_up(&cmd) {
            Ok(r) => r,
            Err(e) => return ProvisionOutcome::failed(e.to_string()),
        };
        let outcome = outcome_for(report);
        if let ProvisionOutcome::Ready { container_id } = &outcome {
            self.apply_fixups(container_id, cmd.mounted(MountKind::Credentials));
        }
        outcome
    }

    /// Program, arguments and mounts for `workspace`, without running anything.
    pub fn up_command(&self, workspace: &str) -> UpCommand {
        let mounts = match self.config.home_dir() {
            Some(home) => mounts::discover(&home, &self.config.container_user),
            None => {
                tracing::warn!("home directory unknown; skipping optional mounts");
                Vec::new()
            }
        };
        UpCommand {
            program: resolve::devcontainer_program(&self.config),
            args: mounts::up_args(workspace, &mounts),
            mounts,
        }
    }

    /// Spawn `cmd`, stream its merged output and wait for it to exit.
    pub fn run_up(&self, cmd: &UpCommand) -> Result<RunReport, ProvisionError> {
        tracing::debug!(
            "running: {} {}",
            cmd.program.to_string_lossy(),
            shell_join(&cmd.args)
        );
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ProvisionError::Message(format!(
                    "failed to start {}: {e}",
                    cmd.program.to_string_lossy()
                ))
            })?;

        let (tx, rx) = mpsc::channel::<String>();
        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(so) = child.stdout.take() {
            readers.push(forward_lines(so, tx.clone()));
        }
        if let Some(se) = child.stderr.take() {
            readers.push(forward_lines(se, tx.clone()));
        }
        drop(tx);

        let deadline = self.config.up_timeout.map(|t| (t, Instant::now() + t));
        let mut scanner = ContainerIdScanner::new();
        let mut lines = Vec::new();
        loop {
            let next = match deadline {
                None => rx.recv().map_err(|_| mpsc::RecvTimeoutError::Disconnected),
                Some((_, at)) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
            };
            match next {
                Ok(line) => {
                    tracing::info!(target: "devcontainer", "{line}");
                    scanner.observe(&line);
                    lines.push(line);
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    let limit = deadline.map(|(t, _)| t).unwrap_or_default();
                    return Err(kill_after_timeout(&mut child, limit));
                }
            }
        }
        for h in readers {
            let _ = h.join();
        }

        let status = match deadline {
            None => child.wait()?,
            // Streams are closed but the process may linger; keep honoring the cap.
            Some((limit, at)) => match wait_until(&mut child, at)? {
                Some(st) => st,
                None => return Err(kill_after_timeout(&mut child, limit)),
            },
        };

        Ok(RunReport {
            exit_code: exit_code_of(&status),
            lines,
            container_id: scanner.into_container_id(),
        })
    }

    fn apply_fixups(&self, container_id: &str, credentials_mounted: bool) {
        let steps = fixup::plan(
            &self.config.container_user,
            &self.config.known_host,
            credentials_mounted,
        );
        let runtime = fixup::runtime_program(&self.config.runtime);
        let reports = fixup::run(&runtime, container_id, &steps, self.config.fixup_timeout);
        let failed = reports.iter().filter(|r| r.result.is_err()).count();
        if failed > 0 {
            tracing::warn!(
                container_id,
                "{failed} of {} fix-up step(s) failed",
                reports.len()
            );
        }
    }
}

/// Apply the exit-code policy to a finished run.
pub fn outcome_for(report: RunReport) -> ProvisionOutcome {
    if report.exit_code != 0 {
        return ProvisionOutcome::failed(format!(
            "devcontainer failed with exit code {}",
            report.exit_code
        ));
    }
    match report.container_id {
        Some(container_id) => ProvisionOutcome::Ready { container_id },
        None => ProvisionOutcome::Unknown {
            output: report.lines.join("\n"),
        },
    }
}

fn forward_lines<R: Read + Send + 'static>(reader: R, tx: mpsc::Sender<String>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    if tx.send(String::from_utf8_lossy(&buf).into_owned()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    })
}

fn wait_until(child: &mut Child, at: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(st) = child.try_wait()? {
            return Ok(Some(st));
        }
        if Instant::now() >= at {
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn kill_after_timeout(child: &mut Child, limit: Duration) -> ProvisionError {
    let _ = child.kill();
    let _ = child.wait();
    ProvisionError::Message(format!(
        "devcontainer timed out after {}s",
        limit.as_secs()
    ))
}

#[cfg(unix)]
fn exit_code_of(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|s| -s))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code_of(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
