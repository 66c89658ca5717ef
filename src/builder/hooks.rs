//! Pre-build hooks keyed by host kind.
//!
//! Some hosts need an environment adjustment before any compilation can
//! succeed. Hooks run at most once per host per process; every cell on that
//! host reuses the resulting environment.

use super::toolchain::BuildEnv;
use crate::catalog::HostKind;
use crate::error::ToolchainError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::OnceCell;

/// Environment adjustment that must happen before building on a host.
#[async_trait]
pub trait PreBuildHook: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Computes the environment the toolchain needs on this host
    async fn prepare(&self) -> Result<BuildEnv, ToolchainError>;
}

/// Normalizes the macOS SDK location for the toolchain.
///
/// Resolves the active SDK through `xcrun` and exports it as `SDKROOT`, so the
/// linker never picks up a stale Command Line Tools SDK. The SDK's platform
/// version becomes `MACOSX_DEPLOYMENT_TARGET` unless the caller already set one.
#[derive(Debug, Default)]
pub struct MacosSdkHook;

impl MacosSdkHook {
    async fn xcrun(arg: &str) -> Result<String, ToolchainError> {
        let output = Command::new("xcrun")
            .args(["--sdk", "macosx", arg])
            .output()
            .await
            .map_err(|e| ToolchainError::Hook {
                host: HostKind::MacOs.to_string(),
                reason: format!("failed to run xcrun {arg}: {e}"),
            })?;

        if !output.status.success() {
            return Err(ToolchainError::Hook {
                host: HostKind::MacOs.to_string(),
                reason: format!(
                    "xcrun {arg} failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl PreBuildHook for MacosSdkHook {
    fn name(&self) -> &'static str {
        "macos-sdk"
    }

    async fn prepare(&self) -> Result<BuildEnv, ToolchainError> {
        let sdk_path = Self::xcrun("--show-sdk-path").await?;
        if sdk_path.is_empty() {
            return Err(ToolchainError::Hook {
                host: HostKind::MacOs.to_string(),
                reason: "xcrun reported an empty SDK path".into(),
            });
        }
        log::info!("Using macOS SDK at {}", sdk_path);

        let mut env = vec![("SDKROOT".to_string(), sdk_path)];
        if std::env::var_os("MACOSX_DEPLOYMENT_TARGET").is_none() {
            let version = Self::xcrun("--show-sdk-platform-version").await?;
            if !version.is_empty() {
                env.push(("MACOSX_DEPLOYMENT_TARGET".to_string(), version));
            }
        }
        Ok(env)
    }
}

/// Hooks registered per host kind, each evaluated once.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<HostKind, Vec<Arc<dyn PreBuildHook>>>,
    prepared: HashMap<HostKind, OnceCell<BuildEnv>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: HashMap<_, Vec<_>> = self
            .hooks
            .iter()
            .map(|(host, hooks)| (host, hooks.iter().map(|h| h.name()).collect()))
            .collect();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}

impl HookRegistry {
    /// Registry with no hooks
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the hooks every release build needs
    pub fn standard() -> Self {
        Self::empty().with_hook(HostKind::MacOs, Arc::new(MacosSdkHook))
    }

    /// Adds a hook for a host kind; hooks run in registration order
    pub fn with_hook(mut self, host: HostKind, hook: Arc<dyn PreBuildHook>) -> Self {
        self.hooks.entry(host).or_default().push(hook);
        self.prepared.entry(host).or_default();
        self
    }

    /// Environment for cells on `host`, running its hooks on first use.
    pub async fn prepare(&self, host: HostKind) -> Result<BuildEnv, ToolchainError> {
        let (Some(hooks), Some(cell)) = (self.hooks.get(&host), self.prepared.get(&host)) else {
            return Ok(BuildEnv::new());
        };

        let env = cell
            .get_or_try_init(|| async {
                let mut env = BuildEnv::new();
                for hook in hooks {
                    log::info!("Running pre-build hook `{}` for {} host", hook.name(), host);
                    env.extend(hook.prepare().await?);
                }
                Ok::<_, ToolchainError>(env)
            })
            .await?;
        Ok(env.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHook {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PreBuildHook for CountingHook {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn prepare(&self) -> Result<BuildEnv, ToolchainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![("SDKROOT".into(), "/sdk".into())])
        }
    }

    #[tokio::test]
    async fn hook_runs_once_per_host() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(HookRegistry::empty().with_hook(
            HostKind::MacOs,
            Arc::new(CountingHook {
                calls: calls.clone(),
            }),
        ));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.prepare(HostKind::MacOs).await
            }));
        }
        for handle in handles {
            let env = handle.await.unwrap().unwrap();
            assert_eq!(env, vec![("SDKROOT".to_string(), "/sdk".to_string())]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hosts_without_hooks_get_empty_env() {
        let registry = HookRegistry::standard();
        assert!(registry.prepare(HostKind::Linux).await.unwrap().is_empty());
        assert!(registry.prepare(HostKind::Windows).await.unwrap().is_empty());
    }
}
