//! Container id extraction from `devcontainer up` output.

use once_cell::sync::Lazy;
use regex::Regex;

// `"containerId":"<hex>"` as printed in the tool's JSON result line.
static STRUCTURED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""containerId"\s*:\s*"([a-f0-9]+)""#).expect("static regex")
});

// Any bare run of 12+ lowercase hex characters (short or full docker ids).
static LOOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-f0-9]{12,}").expect("static regex"));

/// Extract a container id from a single line: structured field first, then the loose run.
pub fn match_line(line: &str) -> Option<&str> {
    if let Some(c) = STRUCTURED.captures(line) {
        return c.get(1).map(|m| m.as_str());
    }
    LOOSE.find(line).map(|m| m.as_str())
}

/// Observes output lines in order; the latest matching line wins.
#[derive(Debug, Default)]
pub struct ContainerIdScanner {
    current: Option<String>,
}

impl ContainerIdScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, line: &str) {
        if let Some(id) = match_line(line) {
            self.current = Some(id.to_string());
        }
    }

    pub fn container_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn into_container_id(self) -> Option<String> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(lines: &[&str]) -> Option<String> {
        let mut s = ContainerIdScanner::new();
        for l in lines {
            s.observe(l);
        }
        s.into_container_id()
    }

    #[test]
    fn structured_field_is_extracted() {
        assert_eq!(
            scan(&["Starting...", r#""containerId":"abc123def4567890""#]).as_deref(),
            Some("abc123def4567890")
        );
    }

    #[test]
    fn structured_field_tolerates_spacing_and_short_ids() {
        assert_eq!(match_line(r#"{"outcome":"success", "containerId" : "abc1"}"#), Some("abc1"));
    }

    #[test]
    fn structured_wins_over_loose_within_a_line() {
        let line = r#"deadbeefdeadbeef0000 {"containerId":"0123456789abcdef"}"#;
        assert_eq!(match_line(line), Some("0123456789abcdef"));
    }

    #[test]
    fn loose_run_is_the_fallback() {
        assert_eq!(
            match_line("Container started: 3f4e5d6c7b8a9f0e"),
            Some("3f4e5d6c7b8a9f0e")
        );
    }

    #[test]
    fn short_or_uppercase_hex_is_ignored() {
        assert_eq!(match_line("id abc123def45"), None);
        assert_eq!(match_line("ABCDEF0123456789"), None);
        assert_eq!(scan(&["Starting...", "done"]), None);
    }

    #[test]
    fn last_matching_line_wins() {
        let out = scan(&[
            r#""containerId":"aaaaaaaaaaaaaaaa""#,
            "unrelated",
            "bbbbbbbbbbbbbbbb",
            "trailing noise",
        ]);
        assert_eq!(out.as_deref(), Some("bbbbbbbbbbbbbbbb"));
    }

    #[test]
    fn non_matching_lines_do_not_clear_a_previous_match() {
        let mut s = ContainerIdScanner::new();
        s.observe(r#""containerId":"cafebabecafebabe""#);
        s.observe("Done.");
        assert_eq!(s.container_id(), Some("cafebabecafebabe"));
    }
}
