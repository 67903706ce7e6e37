use std::process::Command;

// Stamp the binary with the source revision it was built from, so the
// `--verbose` startup line identifies which launcher answered a request.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=DEVCONTAINER_LAUNCHER_REVISION");

    let revision = std::env::var("DEVCONTAINER_LAUNCHER_REVISION")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(git_short_rev)
        .unwrap_or_else(|| "unknown".to_string());
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=LAUNCHER_BUILD_INFO={revision} ({target})");
}

fn git_short_rev() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let rev = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!rev.is_empty()).then_some(rev)
}
