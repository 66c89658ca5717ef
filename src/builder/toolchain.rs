//! Toolchain invocation for one matrix cell.

use super::tool_detection::has_cross;
use crate::catalog::Target;
use crate::error::ToolchainError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Number of stderr lines kept as the failure diagnostic
const DIAGNOSTIC_TAIL_LINES: usize = 40;

/// Environment variables applied to a toolchain invocation
pub type BuildEnv = Vec<(String, String)>;

/// Everything a toolchain needs to produce one binary
#[derive(Clone, Debug)]
pub struct BuildRequest {
    /// Target to build
    pub target: Target,
    /// Binary (cargo `--bin`) name
    pub binary: String,
    /// Isolated cargo target directory for this cell
    pub target_dir: PathBuf,
    /// Extra environment from pre-build hooks
    pub env: BuildEnv,
}

impl BuildRequest {
    /// Where cargo places the binary for this request
    pub fn expected_binary(&self) -> PathBuf {
        self.target_dir
            .join(&self.target.triple)
            .join("release")
            .join(self.target.binary_file_name(&self.binary))
    }
}

/// Produces one binary for one target.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Builds the requested binary and returns its path
    async fn build(&self, request: &BuildRequest) -> Result<PathBuf, ToolchainError>;
}

/// `cargo build` for native targets, `cross build` for cross-compiled ones.
#[derive(Clone, Debug)]
pub struct CargoToolchain {
    workspace: PathBuf,
    extra_args: Vec<String>,
    timeout: Option<Duration>,
}

impl CargoToolchain {
    /// Toolchain building the crate workspace at `workspace`.
    ///
    /// # Arguments
    ///
    /// * `workspace` - Directory containing the Cargo.toml to build
    /// * `extra_args` - Appended to every `build` invocation (e.g. `--locked`)
    /// * `timeout` - Per-invocation limit; `None` waits forever
    pub fn new(workspace: PathBuf, extra_args: Vec<String>, timeout: Option<Duration>) -> Self {
        Self {
            workspace,
            extra_args,
            timeout,
        }
    }

    /// Program and arguments for a request
    pub fn command_line(&self, request: &BuildRequest) -> (&'static str, Vec<String>) {
        let program = if request.target.requires_cross_compilation() {
            "cross"
        } else {
            "cargo"
        };
        let mut args = vec![
            "build".to_string(),
            "--release".to_string(),
            "--target".to_string(),
            request.target.triple.clone(),
            "--bin".to_string(),
            request.binary.clone(),
        ];
        args.extend(self.extra_args.iter().cloned());
        (program, args)
    }

    async fn run(&self, program: &str, args: &[String], request: &BuildRequest) -> Result<(), ToolchainError> {
        let command_str = format!("{} {}", program, args.join(" "));
        log::debug!(
            "[{}] Running `{}` in {}",
            request.target.triple,
            command_str,
            self.workspace.display()
        );

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.workspace)
            .env("CARGO_TARGET_DIR", &request.target_dir)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolchainError::Spawn {
                command: command_str.clone(),
                source,
            })?;

        let triple = request.target.triple.as_str();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both streams must be drained before the exit status is trustworthy
        let completion = async {
            let (_, tail) = tokio::join!(
                async {
                    if let Some(stdout) = stdout {
                        let mut lines = BufReader::new(stdout).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            log::debug!("[{}] {}", triple, line);
                        }
                    }
                },
                async {
                    let mut tail = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);
                    if let Some(stderr) = stderr {
                        let mut lines = BufReader::new(stderr).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            log::debug!("[{}] {}", triple, line);
                            if tail.len() == DIAGNOSTIC_TAIL_LINES {
                                tail.pop_front();
                            }
                            tail.push_back(line);
                        }
                    }
                    tail
                }
            );
            let status = child.wait().await;
            (status, tail)
        };

        let (status, tail) = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, completion).await {
                Ok(done) => done,
                Err(_elapsed) => {
                    // Dropping the future drops the child, which kills it
                    return Err(ToolchainError::TimedOut {
                        triple: triple.to_string(),
                        secs: limit.as_secs(),
                    });
                }
            },
            None => completion.await,
        };

        let status = status.map_err(|source| ToolchainError::Spawn {
            command: command_str.clone(),
            source,
        })?;

        if !status.success() {
            return Err(ToolchainError::Failed {
                command: command_str,
                status: status.to_string(),
                diagnostic: Vec::from(tail).join("\n"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Toolchain for CargoToolchain {
    async fn build(&self, request: &BuildRequest) -> Result<PathBuf, ToolchainError> {
        if request.target.requires_cross_compilation() && !has_cross().await {
            return Err(ToolchainError::CrossUnavailable {
                triple: request.target.triple.clone(),
            });
        }

        let (program, args) = self.command_line(request);
        self.run(program, &args, request).await?;

        let binary = request.expected_binary();
        if !path_exists(&binary).await {
            return Err(ToolchainError::MissingBinary { path: binary });
        }
        Ok(binary)
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HostKind;

    fn request(target: Target) -> BuildRequest {
        BuildRequest {
            target,
            binary: "webhook-server".into(),
            target_dir: PathBuf::from("/scratch/cell"),
            env: Vec::new(),
        }
    }

    #[test]
    fn native_targets_use_cargo() {
        let toolchain = CargoToolchain::new(PathBuf::from("."), vec!["--locked".into()], None);
        let (program, args) =
            toolchain.command_line(&request(Target::native("x86_64-unknown-linux-gnu", HostKind::Linux)));
        assert_eq!(program, "cargo");
        assert_eq!(
            args,
            [
                "build",
                "--release",
                "--target",
                "x86_64-unknown-linux-gnu",
                "--bin",
                "webhook-server",
                "--locked"
            ]
        );
    }

    #[test]
    fn cross_targets_use_cross() {
        let toolchain = CargoToolchain::new(PathBuf::from("."), Vec::new(), None);
        let (program, _) = toolchain.command_line(&request(Target::cross("x86_64-unknown-freebsd")));
        assert_eq!(program, "cross");
    }

    #[test]
    fn expected_binary_is_per_triple() {
        let req = request(Target::native("x86_64-pc-windows-msvc", HostKind::Windows));
        assert_eq!(
            req.expected_binary(),
            PathBuf::from("/scratch/cell/x86_64-pc-windows-msvc/release/webhook-server.exe")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_captures_stderr_tail() {
        let toolchain = CargoToolchain::new(std::env::temp_dir(), Vec::new(), None);
        let req = request(Target::native("x86_64-unknown-linux-gnu", HostKind::Linux));
        let err = toolchain
            .run(
                "sh",
                &["-c".to_string(), "echo boom >&2; exit 3".to_string()],
                &req,
            )
            .await
            .unwrap_err();
        match err {
            ToolchainError::Failed { diagnostic, .. } => assert_eq!(diagnostic, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let toolchain = CargoToolchain::new(
            std::env::temp_dir(),
            Vec::new(),
            Some(Duration::from_millis(100)),
        );
        let req = request(Target::native("x86_64-unknown-linux-gnu", HostKind::Linux));
        let err = toolchain
            .run("sh", &["-c".to_string(), "sleep 5".to_string()], &req)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolchainError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let toolchain = CargoToolchain::new(std::env::temp_dir(), Vec::new(), None);
        let req = request(Target::native("x86_64-unknown-linux-gnu", HostKind::Linux));
        let err = toolchain
            .run("definitely-not-a-real-toolchain", &[], &req)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolchainError::Spawn { .. }));
    }
}
