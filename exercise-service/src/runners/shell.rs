// Shell Runner
// Executes exercise check commands and captures their output

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Shell executable and leading arguments for the host platform
fn shell_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "windows") {
        ("cmd", &["/C"])
    } else {
        ("sh", &["-c"])
    }
}

/// Configuration for shell execution
#[derive(Debug, Clone, Default)]
pub struct ShellConfig {
    /// Timeout (None = no timeout)
    pub timeout: Option<Duration>,
}

/// Output collected during script execution
#[derive(Debug, Clone, Default)]
pub struct ShellOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code (None when killed by a signal or never started)
    pub exit_code: Option<i32>,
    /// Whether the process was killed because it ran past the timeout
    pub timed_out: bool,
    /// Wall-clock duration
    pub duration: Duration,
}

impl ShellOutput {
    /// Whether the script exited normally with code 0
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Shell runner for executing scripts
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }

    /// Execute a script with the platform shell
    pub async fn run_script(
        &self,
        script: &str,
        env: &HashMap<String, String>,
        working_dir: &Path,
        config: &ShellConfig,
    ) -> ShellOutput {
        let start = Instant::now();
        let (shell_cmd, shell_args) = shell_command();

        let mut cmd = Command::new(shell_cmd);
        cmd.args(shell_args);
        cmd.arg(script);
        cmd.current_dir(working_dir);
        cmd.envs(env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ShellOutput {
                    stderr: format!("Failed to spawn shell process '{}': {}", shell_cmd, e),
                    duration: start.elapsed(),
                    ..Default::default()
                };
            }
        };

        // Read output streams concurrently
        let stdout_handle = child.stdout.take().map(|s| tokio::spawn(collect_lines(s)));
        let stderr_handle = child.stderr.take().map(|s| tokio::spawn(collect_lines(s)));

        // Wait for completion with optional timeout
        let (wait_result, timed_out) = match config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                Ok(result) => (result, false),
                Err(_) => {
                    let _ = child.kill().await;
                    (child.wait().await, true)
                }
            },
            None => (child.wait().await, false),
        };

        let exit_code = wait_result.ok().and_then(|s| s.code());
        let stdout = join_output(stdout_handle, timed_out).await;
        let mut stderr = join_output(stderr_handle, timed_out).await;

        if timed_out {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str(&format!(
                "Process timed out after {:?}",
                config.timeout.unwrap_or_default()
            ));
        }

        ShellOutput {
            stdout,
            stderr,
            exit_code: if timed_out { None } else { exit_code },
            timed_out,
            duration: start.elapsed(),
        }
    }
}

async fn collect_lines<R: AsyncRead + Unpin>(reader: R) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut output = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&line);
    }
    output
}

/// How long to keep reading after a timeout kill. Grandchildren of the
/// shell can hold the pipes open past that point.
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

async fn join_output(handle: Option<tokio::task::JoinHandle<String>>, timed_out: bool) -> String {
    let Some(handle) = handle else {
        return String::new();
    };

    if timed_out {
        match tokio::time::timeout(OUTPUT_GRACE, handle).await {
            Ok(result) => result.unwrap_or_default(),
            Err(_) => String::new(),
        }
    } else {
        handle.await.unwrap_or_default()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_runner_echo() {
        let runner = ShellRunner::new();
        let env = HashMap::new();
        let working_dir = std::env::current_dir().unwrap();
        let config = ShellConfig::default();

        let output = runner
            .run_script("echo hello", &env, &working_dir, &config)
            .await;

        assert_eq!(output.exit_code, Some(0));
        assert!(output.succeeded());
        assert_eq!(output.stdout, "hello");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_shell_runner_with_env() {
        let runner = ShellRunner::new();
        let mut env = HashMap::new();
        env.insert("MY_VAR".to_string(), "test_value".to_string());
        let working_dir = std::env::current_dir().unwrap();

        let output = runner
            .run_script("echo $MY_VAR", &env, &working_dir, &ShellConfig::default())
            .await;

        assert!(output.stdout.contains("test_value"));
    }

    #[tokio::test]
    async fn test_shell_runner_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "found").unwrap();

        let output = ShellRunner::new()
            .run_script(
                "cat marker.txt",
                &HashMap::new(),
                dir.path(),
                &ShellConfig::default(),
            )
            .await;

        assert_eq!(output.stdout, "found");
    }

    #[tokio::test]
    async fn test_shell_runner_failure_and_stderr() {
        let output = ShellRunner::new()
            .run_script(
                "echo oops >&2; exit 3",
                &HashMap::new(),
                &std::env::current_dir().unwrap(),
                &ShellConfig::default(),
            )
            .await;

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.succeeded());
        assert_eq!(output.stderr, "oops");
    }

    #[tokio::test]
    async fn test_shell_runner_timeout() {
        let config = ShellConfig {
            timeout: Some(Duration::from_millis(200)),
        };

        let output = ShellRunner::new()
            .run_script(
                "exec sleep 5",
                &HashMap::new(),
                &std::env::current_dir().unwrap(),
                &config,
            )
            .await;

        assert!(output.timed_out);
        assert!(!output.succeeded());
        assert!(output.stderr.contains("timed out"));
    }
}
