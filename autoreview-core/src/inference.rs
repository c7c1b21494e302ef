//! Review generation through an external command

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::InferenceConfig;
use crate::{Error, Result};

/// Longest stderr excerpt carried in a process error
const STDERR_EXCERPT: usize = 512;

/// Trait for anything that turns a prompt into review text
#[async_trait]
pub trait InferenceRunner: Send + Sync {
    /// Get the name of this runner
    fn name(&self) -> &str;

    /// Generate a review for `prompt`
    async fn run(&self, prompt: &str, cancel: &CancellationToken) -> Result<String>;
}

/// Runs `<program> <args...> <prompt>` and returns its stdout
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRunner {
    /// Create a runner for `program` with no extra arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: InferenceConfig::default().timeout,
        }
    }

    /// Create a runner from the inference section of the config
    pub fn from_config(config: &InferenceConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout,
        }
    }

    /// Add an argument placed before the prompt
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the timeout for a single run
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::from_config(&InferenceConfig::default())
    }
}

#[async_trait]
impl InferenceRunner for CommandRunner {
    fn name(&self) -> &str {
        &self.program
    }

    async fn run(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        let child = self.build_command(prompt).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Process(format!(
                    "Inference executable not found at '{}'. Is it installed?",
                    self.program
                ))
            } else {
                Error::Process(format!("Failed to start '{}': {}", self.program, e))
            }
        })?;

        debug!(program = %self.program, args = ?self.args, "Inference started");

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => match result {
                Ok(output) => output
                    .map_err(|e| Error::Process(format!("Failed to collect output: {}", e)))?,
                Err(_) => {
                    return Err(Error::Process(format!(
                        "'{}' timed out after {:?}",
                        self.program, self.timeout
                    )))
                }
            },
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(Error::Process(format!(
                "'{}' exited with {}: {}",
                self.program, output.status, excerpt
            )));
        }

        let review = String::from_utf8(output.stdout)
            .map_err(|_| Error::Process(format!("'{}' produced non-UTF-8 output", self.program)))?;

        if review.trim().is_empty() {
            return Err(Error::Process(format!("'{}' produced no output", self.program)));
        }

        Ok(review)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout_with_prompt_last() {
        let runner = CommandRunner::new("echo").arg("review:");
        let out = runner.run("review this diff", &CancellationToken::new()).await.unwrap();
        assert_eq!(out, "review: review this diff\n");
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let runner = CommandRunner::new("/usr/bin/nonexistent-inference-binary");
        let err = runner.run("prompt", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Process(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let runner = CommandRunner::new("sh").arg("-c").arg("echo boom >&2; exit 3").arg("sh");
        let err = runner.run("ignored", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Process(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_empty_output_rejected() {
        let runner = CommandRunner::new("true");
        let err = runner.run("prompt", &CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("no output"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = CommandRunner::new("sleep").with_timeout(Duration::from_millis(100));
        let err = runner.run("10", &CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        // A killed child may linger as a zombie until the runtime reaps it.
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => !stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| rest.trim_start().starts_with('Z')),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_leaves_no_child_behind() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("child.pid");

        let runner = CommandRunner::new("sh")
            .arg("-c")
            .arg(r#"echo $$ > "$1"; exec sleep 30"#)
            .arg("sh")
            .with_timeout(Duration::from_millis(500));
        let err = runner
            .run(pid_file.to_str().unwrap(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let mut gone = false;
        for _ in 0..100 {
            if !is_running(&pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(gone, "child {} still running after timeout", pid);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let runner = CommandRunner::new("sleep");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = runner.run("10", &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_from_config() {
        let runner = CommandRunner::from_config(&InferenceConfig::default());
        assert_eq!(runner.name(), "ollama");
        assert_eq!(runner.args, vec!["run", "magicoder"]);
    }
}
