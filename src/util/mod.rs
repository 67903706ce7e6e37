#![allow(clippy::module_name_repetitions)]
//! Small utilities: shell quoting for log previews, short command execution.

pub mod exec;

pub use exec::{ExecOutput, ExecRequest, ExecService};

/// Join arguments into a copy-pasteable shell line (used for debug logs only).
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape(a))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_=./:@,".contains(c))
    {
        s.to_string()
    } else {
        let escaped = s.replace('\'', "'\"'\"'");
        format!("'{}'", escaped)
    }
}
