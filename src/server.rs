/*!
Connection acceptor.

- Non-blocking listener polled at a short interval so a cancelled
  `ShutdownToken` is noticed promptly.
- One detached thread per connection; workers are never joined. Each one
  holds an `InFlight` guard, so `Server::run` can wait for them to drain
  after the accept loop stops.
- Request framing is a single read of up to `read_buffer` bytes; longer
  payloads are truncated.
*/

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::provision::{ProvisionOutcome, Provisioner};

/// Cooperative stop signal for [`Server::serve`].
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Count of connection workers that have not finished yet.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    count: Arc<AtomicUsize>,
}

impl InFlight {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            count: Arc::clone(&self.count),
        }
    }

    /// Block until every worker has dropped its guard.
    pub fn wait_idle(&self, poll: Duration) {
        while self.count() > 0 {
            std::thread::sleep(poll);
        }
    }
}

// Released on drop, so a worker that panics or never starts still counts down.
struct InFlightGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Seam between the acceptor and whatever turns a path into an outcome.
pub trait Provision: Send + Sync + 'static {
    fn provision(&self, workspace: &str) -> ProvisionOutcome;
}

impl Provision for Provisioner {
    fn provision(&self, workspace: &str) -> ProvisionOutcome {
        Provisioner::provision(self, workspace)
    }
}

impl<F> Provision for F
where
    F: Fn(&str) -> ProvisionOutcome + Send + Sync + 'static,
{
    fn provision(&self, workspace: &str) -> ProvisionOutcome {
        self(workspace)
    }
}

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    read_buffer: usize,
    poll_interval: Duration,
    handler: Arc<dyn Provision>,
    inflight: InFlight,
}

impl Server {
    pub fn bind<P: Provision>(cfg: &ServerConfig, handler: P) -> io::Result<Self> {
        let listener = TcpListener::bind((cfg.bind_host.as_str(), cfg.port)).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("bind {}:{} failed: {e}", cfg.bind_host, cfg.port),
            )
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            read_buffer: cfg.read_buffer.max(1),
            poll_interval: cfg.poll_interval,
            handler: Arc::new(handler),
            inflight: InFlight::default(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` is cancelled, then wait for in-flight requests
    /// to finish before returning.
    pub fn run(self, shutdown: &ShutdownToken) {
        let poll = self.poll_interval;
        let inflight = self.serve(shutdown);
        let pending = inflight.count();
        if pending > 0 {
            tracing::info!("waiting for {pending} in-flight request(s)");
        }
        inflight.wait_idle(poll);
    }

    /// Accept until `shutdown` is cancelled, then release the listening socket.
    /// Workers still running are left alone; the returned counter tracks them.
    pub fn serve(self, shutdown: &ShutdownToken) -> InFlight {
        tracing::info!("listening on {}", self.local_addr);
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            let (stream, peer) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(e) => {
                    if e.kind() != io::ErrorKind::WouldBlock {
                        tracing::warn!("accept error: {e}");
                    }
                    std::thread::sleep(self.poll_interval);
                    continue;
                }
            };
            let _ = stream.set_nonblocking(false);
            let handler = Arc::clone(&self.handler);
            let read_buffer = self.read_buffer;
            let guard = self.inflight.enter();
            let spawned = std::thread::Builder::new()
                .name(format!("conn-{peer}"))
                .spawn(move || {
                    let _guard = guard;
                    let mut s = stream;
                    handle_connection(&mut s, peer, handler.as_ref(), read_buffer);
                    let _ = s.shutdown(Shutdown::Both);
                });
            if let Err(e) = spawned {
                tracing::warn!("failed to spawn worker for {peer}: {e}");
            }
        }
        tracing::info!("listener on {} closed", self.local_addr);
        self.inflight
    }
}

/// One request/response cycle. Never panics and never returns an error;
/// every failure becomes an `error: ...` reply when the socket still allows it.
pub fn handle_connection<S: Read + Write>(
    stream: &mut S,
    peer: SocketAddr,
    handler: &dyn Provision,
    read_buffer: usize,
) {
    let reply = match read_request(stream, read_buffer) {
        Ok(Some(path)) => {
            tracing::info!("received {path} from {peer}");
            dispatch(handler, &path)
        }
        Ok(None) => {
            tracing::info!("empty request from {peer}");
            ProvisionOutcome::failed("empty request")
        }
        Err(e) => {
            tracing::warn!("read from {peer} failed: {e}");
            ProvisionOutcome::failed(e.to_string())
        }
    };
    let wire = reply.to_wire();
    if let Err(e) = stream.write_all(wire.as_bytes()).and_then(|_| stream.flush()) {
        tracing::warn!("write to {peer} failed: {e}");
        return;
    }
    tracing::info!("replied to {peer}: {}", first_line(&wire));
}

/// A single read; `None` when the peer sent nothing at all.
fn read_request<S: Read>(stream: &mut S, read_buffer: usize) -> io::Result<Option<String>> {
    let mut buf = vec![0u8; read_buffer];
    let n = stream.read(&mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    let text = std::str::from_utf8(&buf[..n]).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("request is not valid UTF-8: {e}"),
        )
    })?;
    Ok(Some(text.trim().to_string()))
}

fn dispatch(handler: &dyn Provision, path: &str) -> ProvisionOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.provision(path))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "provisioning panicked".to_string());
            tracing::warn!("provisioning {path} panicked: {msg}");
            ProvisionOutcome::failed(msg)
        }
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
