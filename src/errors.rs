//! Error mapping guide:
//! - Map io::ErrorKind::NotFound to exit code 127; all others to 1.
//! - ProvisionError never crosses the acceptor boundary; it is rendered into
//!   an `error: ...` reply by the invoker.
use std::fmt;
use std::io;

/// Map an io::Error to a process exit code:
/// - 127 for NotFound (command not found)
/// - 1 for all other errors
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

/// Failures raised while resolving, spawning or draining the provisioning command.
#[derive(Debug)]
pub enum ProvisionError {
    Io(io::Error),
    Message(String),
}

impl From<io::Error> for ProvisionError {
    fn from(e: io::Error) -> Self {
        ProvisionError::Io(e)
    }
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display_for_provision_error(self))
    }
}

impl std::error::Error for ProvisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProvisionError::Io(e) => Some(e),
            ProvisionError::Message(_) => None,
        }
    }
}

/// Render the user-facing text carried after `error: ` on the wire.
pub fn display_for_provision_error(e: &ProvisionError) -> String {
    match e {
        ProvisionError::Io(ioe) => ioe.to_string(),
        ProvisionError::Message(s) => s.clone(),
    }
}
