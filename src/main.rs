mod cli;

use std::process::ExitCode;
#[cfg(unix)]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(unix)]
use std::time::Duration;

use clap::Parser;
#[cfg(unix)]
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use devcontainer_launcher::{
    exit_code_for_io_error, telemetry, ProvisionConfig, Provisioner, Server, ServerConfig,
    ShutdownToken,
};

use crate::cli::Cli;

// Only the signal handler writes this; the watcher thread turns it into a token cancel.
#[cfg(unix)]
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn handle_interrupt(_sig: i32) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_interrupt_handler(token: ShutdownToken) {
    let act = SigAction::new(
        SigHandler::Handler(handle_interrupt),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe {
        let _ = signal::sigaction(Signal::SIGINT, &act);
        let _ = signal::sigaction(Signal::SIGTERM, &act);
    }
    std::thread::spawn(move || {
        while !INTERRUPTED.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(50));
        }
        tracing::info!("interrupt received, shutting down");
        token.cancel();
    });
}

// Without a handler Ctrl+C terminates the process directly.
#[cfg(not(unix))]
fn install_interrupt_handler(_token: ShutdownToken) {}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    tracing::debug!(
        "devcontainer-launcher {} build {}",
        env!("CARGO_PKG_VERSION"),
        env!("LAUNCHER_BUILD_INFO")
    );

    let server_cfg = ServerConfig::from_env(cli.port);
    let provision_cfg = ProvisionConfig::from_env();
    tracing::debug!(?provision_cfg, "provisioning settings");

    let server = match Server::bind(&server_cfg, Provisioner::new(provision_cfg)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(exit_code_for_io_error(&e));
        }
    };

    let shutdown = ShutdownToken::new();
    install_interrupt_handler(shutdown.clone());

    tracing::info!("server listening on port {}", server.local_addr().port());
    tracing::info!("press Ctrl+C to stop");
    server.run(&shutdown);
    tracing::info!("shutting down server");
    ExitCode::SUCCESS
}
