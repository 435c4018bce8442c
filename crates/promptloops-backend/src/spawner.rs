use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{BackendConfig, BackendError, Completion};

/// Utility for spawning backend processes
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// True when `<binary> --version` runs and exits cleanly
    pub async fn answers_version(binary: &Path) -> bool {
        match Command::new(binary).arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!(binary = %binary.display(), error = %e, "Version check failed");
                false
            }
        }
    }

    /// Locate `binary` without running it. Bare names are searched on `PATH`;
    /// anything with a directory component is checked as given.
    pub fn locate(binary: &Path) -> Option<PathBuf> {
        if binary.components().count() > 1 {
            return is_executable(binary).then(|| binary.to_path_buf());
        }

        let path_var = std::env::var_os("PATH")?;
        std::env::split_paths(&path_var)
            .flat_map(|dir| {
                let candidate = dir.join(binary);
                let mut candidates = vec![candidate.clone()];
                if !std::env::consts::EXE_EXTENSION.is_empty() {
                    candidates.push(candidate.with_extension(std::env::consts::EXE_EXTENSION));
                }
                candidates
            })
            .find(|candidate| is_executable(candidate))
    }

    /// Spawn a process, optionally feed `stdin`, and capture its output.
    ///
    /// When `config.timeout` is set and elapses, the child is killed and
    /// [`BackendError::Timeout`] is returned.
    pub async fn spawn(
        binary: &Path,
        args: &[&str],
        stdin: Option<&str>,
        config: &BackendConfig,
    ) -> Result<Completion, BackendError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            args = ?args,
            stdin_len = stdin.map(str::len).unwrap_or(0),
            working_dir = %config.working_dir.display(),
            "Spawning backend process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(&config.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        for (key, value) in &config.env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;

        // Feed stdin from a separate task so a chatty child cannot fill its
        // stdout pipe while we are still writing.
        let writer = match (child.stdin.take(), stdin) {
            (Some(mut pipe), Some(input)) => {
                let input = input.to_owned();
                Some(tokio::spawn(async move {
                    let result = pipe.write_all(input.as_bytes()).await;
                    drop(pipe);
                    result
                }))
            }
            _ => None,
        };

        let wait = child.wait_with_output();
        let output = match config.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(timeout = ?limit, binary = %binary.display(), "Backend call timed out");
                    return Err(BackendError::Timeout(limit));
                }
            },
            None => wait.await?,
        };

        if let Some(handle) = writer {
            match handle.await {
                Ok(Ok(())) => {}
                // The child may legitimately exit without draining stdin.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(BackendError::SpawnFailed(e)),
                Err(e) => {
                    return Err(BackendError::ExecutionFailed(format!(
                        "stdin writer panicked: {}",
                        e
                    )))
                }
            }
        }

        let duration = start.elapsed();
        let exit_code = output.status.code().unwrap_or(-1);

        debug!(
            exit_code,
            duration_ms = duration.as_millis(),
            "Backend process completed"
        );

        Ok(Completion::new(
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
            duration,
        ))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_pipes_stdin_through() {
        let config = BackendConfig::default();
        let completion = ProcessSpawner::spawn(Path::new("cat"), &[], Some("hello prompt"), &config)
            .await
            .unwrap();
        assert!(completion.success());
        assert_eq!(completion.text, "hello prompt");
    }

    #[tokio::test]
    async fn test_spawn_reports_exit_code() {
        let config = BackendConfig::default();
        let completion = ProcessSpawner::spawn(
            Path::new("sh"),
            &["-c", "echo oops >&2; exit 3"],
            None,
            &config,
        )
        .await
        .unwrap();
        assert_eq!(completion.exit_code, 3);
        assert_eq!(completion.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_spawn_times_out() {
        let config = BackendConfig::default().with_timeout(Duration::from_millis(50));
        let result = ProcessSpawner::spawn(Path::new("sleep"), &["5"], None, &config).await;
        assert!(matches!(result, Err(BackendError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let config = BackendConfig::default();
        let result = ProcessSpawner::spawn(
            Path::new("promptloops-definitely-not-a-binary"),
            &[],
            None,
            &config,
        )
        .await;
        assert!(matches!(result, Err(BackendError::SpawnFailed(_))));
    }
}
