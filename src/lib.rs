//! Network trigger for `devcontainer up`.
//!
//! A client writes a workspace path to a plain TCP socket; the server runs
//! the devcontainer CLI against it, extracts the container id from the tool's
//! output, applies a few best-effort fix-ups inside the new container and
//! replies with the id, `unknown: <output>` or `error: <reason>`.

pub mod config;
pub mod errors;
pub mod provision;
pub mod server;
pub mod telemetry;
pub mod util;

pub use config::{ProvisionConfig, ServerConfig, DEFAULT_PORT};
pub use errors::{display_for_provision_error, exit_code_for_io_error, ProvisionError};
pub use provision::{outcome_for, ProvisionOutcome, Provisioner, RunReport, UpCommand};
pub use server::{handle_connection, InFlight, Provision, Server, ShutdownToken};
