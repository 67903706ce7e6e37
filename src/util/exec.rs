use std::ffi::OsString;
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use wait_timeout::ChildExt;

/// Short-lived command execution with a hard timeout.
///
/// Used for the post-provisioning `exec` calls; the long-running `up` call
/// streams its output instead and does not go through here.
#[derive(Debug, Clone)]
pub struct ExecService {
    default_timeout: Duration,
}

impl ExecService {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn run(&self, request: ExecRequest) -> Result<ExecOutput> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args);
        cmd.stdin(Stdio::null());
        if request.capture_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let mut child = cmd.spawn().with_context(|| {
            format!(
                "failed to spawn {:?} with args {:?}",
                request.program, request.args
            )
        })?;

        let h_out = child.stdout.take().map(drain);
        let h_err = child.stderr.take().map(drain);

        let timeout = self.default_timeout;
        let status = if timeout.is_zero() {
            child.wait().context("failed to wait for process")?
        } else {
            match child
                .wait_timeout(timeout)
                .context("failed to wait with timeout")?
            {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(anyhow!(
                        "command {:?} timed out after {:?}",
                        request.program,
                        timeout
                    ));
                }
            }
        };

        let stdout = join_drain(h_out)?;
        let stderr = join_drain(h_err)?;

        Ok(ExecOutput {
            status,
            stdout,
            stderr,
        })
    }
}

// Pipes are drained off-thread so a chatty child cannot block on a full pipe
// while we sit in wait_timeout.
fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_drain(handle: Option<JoinHandle<io::Result<Vec<u8>>>>) -> Result<String> {
    let Some(h) = handle else {
        return Ok(String::new());
    };
    let bytes = h
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
        .context("failed to read process output")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl Default for ExecService {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[derive(Debug, Default)]
pub struct ExecRequest {
    program: OsString,
    args: Vec<OsString>,
    capture_output: bool,
}

impl ExecRequest {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }
}

#[derive(Debug)]
pub struct ExecOutput {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_both_streams() {
        let svc = ExecService::default();
        let out = svc
            .run(
                ExecRequest::new("sh")
                    .args(["-c", "echo out; echo err >&2; exit 3"])
                    .capture_output(true),
            )
            .expect("run sh");
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn kills_on_timeout() {
        let svc = ExecService::new(Duration::from_millis(200));
        let err = svc
            .run(ExecRequest::new("sleep").arg("5"))
            .expect_err("should time out");
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let svc = ExecService::default();
        let err = svc
            .run(ExecRequest::new("/nonexistent/definitely-not-here"))
            .expect_err("spawn should fail");
        assert!(err.to_string().contains("failed to spawn"), "{err}");
    }
}
