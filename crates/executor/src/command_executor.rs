use bashai_protocol::{
    CandidateKind, CommandCandidate, ExecutionResult, OsProfile, SIGNAL_EXIT_CODE,
};
use parking_lot::Mutex;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
const DEFAULT_OUTPUT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to start command: {0}")]
    SpawnFailed(String),
    #[error("Command exceeded its {timeout:?} timeout")]
    TimeoutExceeded {
        timeout: Duration,
        result: ExecutionResult,
    },
    #[error("Execution cancelled")]
    Cancelled,
}

/// Runs candidates in the profile's native interpreter and captures output.
///
/// A non-zero exit status is an ordinary `Ok` result. Errors are reserved for
/// commands that could not start, hit their deadline, or were cancelled; in
/// the last two cases the whole process group is killed first.
pub struct ExecutionEngine {
    profile: OsProfile,
    max_output_bytes: usize,
    output_grace: Duration,
}

enum WaitOutcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

impl ExecutionEngine {
    pub fn new(profile: OsProfile) -> Self {
        Self {
            profile,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            output_grace: DEFAULT_OUTPUT_GRACE,
        }
    }

    /// Per-stream capture cap; output beyond it is discarded.
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// How long to keep reading pipes after the interpreter exits, for
    /// background children that inherited them.
    pub fn with_output_grace(mut self, grace: Duration) -> Self {
        self.output_grace = grace;
        self
    }

    pub fn profile(&self) -> &OsProfile {
        &self.profile
    }

    pub async fn execute(
        &self,
        candidate: &CommandCandidate,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.execute_with_cancel(candidate, timeout, &CancellationToken::new())
            .await
    }

    pub async fn execute_with_cancel(
        &self,
        candidate: &CommandCandidate,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, ExecutionError> {
        match &candidate.kind {
            CandidateKind::Shell => self.run_shell(&candidate.text, timeout, cancel).await,
            CandidateKind::FileGeneration { file_name } => {
                Ok(self.write_file(file_name, &candidate.text).await)
            }
        }
    }

    async fn run_shell(
        &self,
        command_line: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, ExecutionError> {
        if cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        let (program, prefix) = self.profile.interpreter();
        info!("Executing via {}: {}", program, command_line);

        let mut cmd = Command::new(program);
        cmd.args(prefix)
            .arg(command_line)
            .current_dir(&self.profile.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a kill reaches everything the shell started.
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(format!("{}: {}", program, e)))?;

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::new();
        if let Some(out) = child.stdout.take() {
            readers.push(tokio::spawn(drain(out, stdout_buf.clone(), self.max_output_bytes)));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(tokio::spawn(drain(err, stderr_buf.clone(), self.max_output_bytes)));
        }

        let outcome = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = tokio::time::sleep(timeout) => WaitOutcome::TimedOut,
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
        };

        if !matches!(outcome, WaitOutcome::Exited(_)) {
            terminate(&mut child).await;
        }
        self.finish_readers(readers).await;

        let duration = start.elapsed();
        let stdout = lossy(&stdout_buf);
        let stderr = lossy(&stderr_buf);

        match outcome {
            WaitOutcome::Exited(Ok(status)) => {
                let exit_code = status.code().unwrap_or(SIGNAL_EXIT_CODE);
                debug!("Command exited with {} after {:?}", exit_code, duration);
                Ok(ExecutionResult {
                    exit_code,
                    stdout,
                    stderr,
                    duration,
                    timed_out: false,
                })
            }
            WaitOutcome::Exited(Err(e)) => Err(ExecutionError::SpawnFailed(format!(
                "failed waiting on {}: {}",
                program, e
            ))),
            WaitOutcome::TimedOut => {
                warn!("Command timed out after {:?}", timeout);
                Err(ExecutionError::TimeoutExceeded {
                    timeout,
                    result: ExecutionResult::timed_out(stdout, stderr, duration),
                })
            }
            WaitOutcome::Cancelled => {
                info!("Command cancelled after {:?}", duration);
                Err(ExecutionError::Cancelled)
            }
        }
    }

    async fn finish_readers(&self, mut readers: Vec<JoinHandle<()>>) {
        let wait_all = async {
            for reader in readers.iter_mut() {
                let _ = reader.await;
            }
        };
        if tokio::time::timeout(self.output_grace, wait_all).await.is_err() {
            debug!("Output pipes still open after exit, keeping partial output");
        }
        for reader in &readers {
            reader.abort();
        }
    }

    /// Writing a generated file is the whole "execution"; failures are
    /// reported through the result, not as errors.
    async fn write_file(&self, file_name: &str, contents: &str) -> ExecutionResult {
        let start = Instant::now();
        let outcome = match output_path(&self.profile.cwd, file_name) {
            Ok(path) => write_contents(&path, contents)
                .await
                .map(|_| format!("Wrote {} bytes to {}\n", contents.len(), path.display()))
                .map_err(|e| format!("Failed to write {}: {}\n", path.display(), e)),
            Err(reason) => Err(format!("Refusing to write '{}': {}\n", file_name, reason)),
        };

        let duration = start.elapsed();
        match outcome {
            Ok(stdout) => {
                info!("{}", stdout.trim_end());
                ExecutionResult {
                    exit_code: 0,
                    stdout,
                    stderr: String::new(),
                    duration,
                    timed_out: false,
                }
            }
            Err(stderr) => {
                warn!("{}", stderr.trim_end());
                ExecutionResult {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr,
                    duration,
                    timed_out: false,
                }
            }
        }
    }
}

async fn write_contents(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await
}

/// Generated files stay inside the working directory.
fn output_path(cwd: &Path, file_name: &str) -> Result<PathBuf, &'static str> {
    let name = file_name.trim();
    if name.is_empty() {
        return Err("empty file name");
    }
    let relative = Path::new(name);
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err("path escapes the working directory"),
            Component::RootDir | Component::Prefix(_) => return Err("absolute paths are not allowed"),
        }
    }
    Ok(cwd.join(relative))
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R, sink: Arc<Mutex<Vec<u8>>>, limit: usize) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut out = sink.lock();
                let room = limit.saturating_sub(out.len());
                out.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
}

fn lossy(buf: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&buf.lock()).into_owned()
}

async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // Negative pid addresses the process group created at spawn.
            unsafe {
                libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
            }
        }
    }
    if let Err(e) = child.kill().await {
        debug!("kill after group signal: {}", e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use bashai_protocol::{SPAWN_FAILURE_EXIT_CODE, TIMEOUT_EXIT_CODE};

    fn engine_in(dir: &Path) -> ExecutionEngine {
        ExecutionEngine::new(OsProfile::generic_posix(dir))
    }

    #[tokio::test]
    async fn test_successful_command() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let result = engine
            .execute(&CommandCandidate::shell("echo hello", 1), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_failure_is_a_result() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let result = engine
            .execute(
                &CommandCandidate::shell("echo oops >&2; exit 13", 1),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(result.exit_code, 13);
        assert_eq!(result.stderr.trim(), "oops");
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn test_runs_in_profile_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let engine = engine_in(dir.path());
        let result = engine
            .execute(&CommandCandidate::shell("ls", 1), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(result.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let start = Instant::now();
        let err = engine
            .execute(
                &CommandCandidate::shell("echo started; sleep 30", 1),
                Duration::from_millis(300),
            )
            .await
            .unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(10));
        match err {
            ExecutionError::TimeoutExceeded { result, .. } => {
                assert!(result.timed_out);
                assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
                assert_eq!(result.stdout.trim(), "started");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });
        let err = engine
            .execute_with_cancel(
                &CommandCandidate::shell("sleep 30", 1),
                Duration::from_secs(60),
                &token,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Cancelled));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let engine = ExecutionEngine::new(OsProfile::generic_posix("/nonexistent/bashai/cwd"));
        let err = engine
            .execute(&CommandCandidate::shell("true", 1), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::SpawnFailed(_)));
        assert_eq!(ExecutionResult::spawn_failure("x").exit_code, SPAWN_FAILURE_EXIT_CODE);
    }

    #[tokio::test]
    async fn test_background_child_does_not_hang() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path()).with_output_grace(Duration::from_millis(200));
        let start = Instant::now();
        let result = engine
            .execute(
                &CommandCandidate::shell("sleep 5 & echo started", 1),
                Duration::from_secs(10),
            )
            .await
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("started"));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_output_cap() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path()).with_max_output_bytes(10);
        let result = engine
            .execute(
                &CommandCandidate::shell("printf 'aaaaaaaaaaaaaaaaaaaa'", 1),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(result.stdout.len(), 10);
    }

    #[tokio::test]
    async fn test_file_generation_writes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let candidate = CommandCandidate::file("scripts/hello.py", "print('hi')\n", 1);
        let result = engine
            .execute(&candidate, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.exit_code, 0);
        let written = std::fs::read_to_string(dir.path().join("scripts/hello.py")).unwrap();
        assert_eq!(written, "print('hi')\n");
    }

    #[tokio::test]
    async fn test_file_generation_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        for name in ["../evil.sh", "/etc/evil.sh", "  "] {
            let result = engine
                .execute(&CommandCandidate::file(name, "x", 1), Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(result.exit_code, 1, "expected refusal for {name:?}");
            assert!(result.stderr.contains("Refusing"));
        }
    }
}
