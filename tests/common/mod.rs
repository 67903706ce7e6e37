#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use devcontainer_launcher::{Provision, Server, ServerConfig, ShutdownToken};

/// Fake `devcontainer` that dispatches on the basename of `--workspace-folder`.
#[cfg(unix)]
const FAKE_DEVCONTAINER: &str = r#"#!/bin/sh
ws="$3"
case "$(basename "$ws")" in
  ok*)
    echo "Starting..."
    echo '"containerId":"abc123def4567890"'
    exit 0 ;;
  multi*)
    echo '{"outcome":"success","containerId":"1111111111111111"}'
    echo "restarted container 2222222222222222"
    echo "Done."
    exit 0 ;;
  bad*)
    exit 1 ;;
  partial*)
    echo '"containerId":"abc123def4567890"'
    echo "post-create failed" >&2
    exit 2 ;;
  noid*)
    echo "Starting..."
    echo "nothing to see"
    echo "Done."
    exit 0 ;;
  stderr*)
    echo "Starting..."
    echo '"containerId":"feedfacefeedface"' >&2
    exit 0 ;;
  args*)
    printf '%s\n' "$@" > "$ws/args.log"
    echo '"containerId":"0123456789abcdef"'
    exit 0 ;;
  slow*)
    echo "Starting..."
    sleep 5
    echo '"containerId":"abc123def4567890"'
    exit 0 ;;
  *)
    echo "unexpected workspace $ws" >&2
    exit 3 ;;
esac
"#;

#[cfg(unix)]
static FIXTURES: once_cell::sync::Lazy<tempfile::TempDir> = once_cell::sync::Lazy::new(|| {
    use std::os::unix::fs::PermissionsExt;
    let td = tempfile::tempdir().expect("fixture dir");
    let path = td.path().join("devcontainer");
    {
        let mut f = std::fs::File::create(&path).expect("create fake devcontainer");
        f.write_all(FAKE_DEVCONTAINER.as_bytes()).expect("write fake devcontainer");
        f.sync_all().expect("sync fake devcontainer");
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake devcontainer");
    td
});

/// Path of the fake tool. Call before spawning anything in a test so the
/// script is fully written before any fork happens in this process.
#[cfg(unix)]
pub fn fake_devcontainer() -> PathBuf {
    FIXTURES.path().join("devcontainer")
}

pub fn empty_home() -> tempfile::TempDir {
    tempfile::tempdir().expect("tmp home")
}

pub fn populated_home() -> tempfile::TempDir {
    let td = tempfile::tempdir().expect("tmp home");
    let home = td.path();
    std::fs::create_dir_all(home.join(".ssh")).unwrap();
    std::fs::write(home.join(".ssh/id_ed25519"), "key").unwrap();
    std::fs::write(home.join(".gitconfig"), "[user]\n").unwrap();
    std::fs::create_dir_all(home.join(".config/gh")).unwrap();
    td
}

/// Workspace directory whose basename starts with `prefix`.
pub fn workspace(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tmp workspace")
}

pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        bind_host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: ShutdownToken,
    pub handle: JoinHandle<()>,
}

impl RunningServer {
    pub fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.join();
    }
}

pub fn start_server<P: Provision>(handler: P) -> RunningServer {
    let server = Server::bind(&test_server_config(), handler).expect("bind test server");
    let addr = server.local_addr();
    let shutdown = ShutdownToken::new();
    let token = shutdown.clone();
    let handle = std::thread::spawn(move || {
        server.serve(&token);
    });
    RunningServer {
        addr,
        shutdown,
        handle,
    }
}

/// Send one payload and read until the server closes the connection.
pub fn request(addr: SocketAddr, payload: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect failed");
    let _ = stream.set_read_timeout(Some(Duration::from_secs(30)));
    stream.write_all(payload.as_bytes()).expect("write");
    let mut buf = String::new();
    let mut tmp = [0u8; 1024];
    loop {
        match stream.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => buf.push_str(&String::from_utf8_lossy(&tmp[..n])),
            Err(_) => break,
        }
    }
    buf
}

pub fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}
