//! Availability probe for the `cross` wrapper.
//!
//! The probe runs at most once per process, the first time a cross-compiled
//! cell asks for it. Concurrent cells wait on the same probe.

use std::path::Path;
use tokio::process::Command;
use tokio::sync::OnceCell;

static HAS_CROSS: OnceCell<bool> = OnceCell::const_new();

/// Whether `cross` is on PATH and answers `--version`.
pub async fn has_cross() -> bool {
    *HAS_CROSS
        .get_or_init(|| async {
            match tokio::task::spawn_blocking(|| which::which("cross")).await {
                Ok(Ok(path)) => probe_version(&path).await,
                Ok(Err(e)) => {
                    log::debug!("cross not found in PATH: {e}");
                    false
                }
                Err(e) => {
                    log::warn!("PATH lookup for cross did not complete: {e}");
                    false
                }
            }
        })
        .await
}

/// Runs `<tool> --version`; true when it exits successfully.
pub async fn probe_version(tool: &Path) -> bool {
    match Command::new(tool).arg("--version").kill_on_drop(true).output().await {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            log::info!(
                "✓ {} available: {}",
                tool.display(),
                version.lines().next().unwrap_or_default().trim()
            );
            true
        }
        Ok(output) => {
            log::warn!(
                "{} --version exited with {:?}; cross-compiled targets will fail. Stderr: {}",
                tool.display(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Err(e) => {
            log::warn!("Failed to execute {}: {e}", tool.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_tool_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!probe_version(&dir.path().join("no-such-cross")).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn version_probe_follows_exit_status() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("cross-ok");
        std::fs::write(&ok, "#!/bin/sh\necho 'cross 0.2.5'\n").unwrap();
        std::fs::set_permissions(&ok, std::fs::Permissions::from_mode(0o755)).unwrap();
        let broken = dir.path().join("cross-broken");
        std::fs::write(&broken, "#!/bin/sh\nexit 2\n").unwrap();
        std::fs::set_permissions(&broken, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert!(probe_version(&ok).await);
        assert!(!probe_version(&broken).await);
    }

    #[tokio::test]
    async fn result_is_cached() {
        assert_eq!(has_cross().await, has_cross().await);
        assert!(HAS_CROSS.initialized());
    }
}
