use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run the gateway CLI (or any helper) with a timeout and return trimmed
/// stdout. Non-zero exit is an error carrying the child's stderr.
pub async fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<String> {
    tracing::debug!(cmd, ?args, "spawning");
    let output = tokio::time::timeout(
        timeout,
        tokio::process::Command::new(cmd)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .with_context(|| format!("`{}` timed out after {}s", cmd, timeout.as_secs()))?
    .with_context(|| format!("Failed to execute `{}`", cmd))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("`{}` exited with {}: {}", cmd, output.status, stderr.trim());
    }

    let stdout =
        String::from_utf8(output.stdout).with_context(|| format!("Non-UTF8 output from `{}`", cmd))?;
    Ok(stdout.trim().to_string())
}

/// Check if a binary exists in PATH. Returns the full path if found.
pub fn which(binary: &str) -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(binary))
            .find(|p| p.is_file())
    })
}

/// Locate `cmd`: a path is taken as-is when it points at a file, a bare name
/// is looked up in PATH.
pub fn resolve_command(cmd: &str) -> Option<PathBuf> {
    if cmd.contains(std::path::MAIN_SEPARATOR) {
        let path = Path::new(cmd);
        return path.is_file().then(|| path.to_path_buf());
    }
    which(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn which_finds_existing_binary() {
        assert!(which("sh").is_some());
    }

    #[test]
    fn which_returns_none_for_nonexistent() {
        assert!(which("totally_nonexistent_gateway_xyz").is_none());
    }

    #[test]
    fn resolve_command_accepts_paths() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("openclaw");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        let as_str = script.to_string_lossy().to_string();
        assert_eq!(resolve_command(&as_str), Some(script));
        assert!(resolve_command("/no/such/openclaw").is_none());
    }

    #[tokio::test]
    async fn run_command_returns_trimmed_stdout() {
        let result = run_command("echo", &["  hello  "], Duration::from_secs(5)).await;
        assert_eq!(result.unwrap(), "hello");
    }

    #[tokio::test]
    async fn run_command_failure_carries_stderr() {
        let err = run_command("sh", &["-c", "echo boom >&2; exit 3"], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("boom"));
    }

    #[tokio::test]
    async fn run_command_times_out() {
        let err = run_command("sleep", &["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
