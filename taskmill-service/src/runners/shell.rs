// Shell Runner
// Runs built invocations through the top-level executor

use crate::config::Deadline;
use crate::runners::{ExecutionError, Invocation};

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Callback for handling output lines in real-time, `(line, is_stderr)`
pub type OutputCallback = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Where subprocess output goes
#[derive(Clone, Default)]
pub enum OutputMode {
    /// Forward stdout/stderr to the parent's streams
    #[default]
    Inherit,
    /// Deliver each line to a callback
    Stream(OutputCallback),
}

impl std::fmt::Debug for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputMode::Inherit => f.write_str("Inherit"),
            OutputMode::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Shell runner for executing invocations
#[derive(Debug, Clone)]
pub struct ShellRunner {
    executor: PathBuf,
}

impl ShellRunner {
    pub fn new(executor: impl Into<PathBuf>) -> Self {
        Self {
            executor: executor.into(),
        }
    }

    pub fn executor(&self) -> &Path {
        &self.executor
    }

    /// Run `<executor> -c <script>`; stdin is inherited
    pub async fn run(
        &self,
        invocation: &Invocation,
        output: &OutputMode,
        deadline: Deadline,
    ) -> Result<(), ExecutionError> {
        let executor = self.executor.display().to_string();
        tracing::debug!(executor = %executor, script = %invocation.script, "running invocation");

        let mut cmd = Command::new(&self.executor);
        cmd.arg("-c");
        cmd.arg(&invocation.script);
        cmd.stdin(Stdio::inherit());
        cmd.kill_on_drop(true);

        match output {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit());
                cmd.stderr(Stdio::inherit());
            }
            OutputMode::Stream(_) => {
                cmd.stdout(Stdio::piped());
                cmd.stderr(Stdio::piped());
            }
        }

        let mut child = cmd.spawn().map_err(|source| ExecutionError::Spawn {
            executor: executor.clone(),
            source,
        })?;

        let mut readers = Vec::new();
        if let OutputMode::Stream(on_output) = output {
            if let Some(stdout) = child.stdout.take() {
                readers.push(tokio::spawn(stream_lines(stdout, false, on_output.clone())));
            }
            if let Some(stderr) = child.stderr.take() {
                readers.push(tokio::spawn(stream_lines(stderr, true, on_output.clone())));
            }
        }

        let wait_result = if let Some(remaining) = deadline.remaining() {
            match tokio::time::timeout(remaining, child.wait()).await {
                Ok(result) => result,
                Err(_) => {
                    let _ = child.kill().await;
                    for reader in readers {
                        reader.abort();
                    }
                    return Err(ExecutionError::TimedOut(deadline.budget().unwrap_or_default()));
                }
            }
        } else {
            child.wait().await
        };

        let status = wait_result.map_err(|source| ExecutionError::Wait { executor, source })?;

        let mut stderr = String::new();
        for reader in readers {
            stderr.push_str(&reader.await.unwrap_or_default());
        }

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(ExecutionError::Exit { code, stderr }),
            None => Err(ExecutionError::Signal { stderr }),
        }
    }
}

/// Deliver every line of `pipe` until EOF, decoding lossily. Returns the stderr text when
/// `is_error` is set.
async fn stream_lines<R>(pipe: R, is_error: bool, on_output: OutputCallback) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    let mut collected = String::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        let line = String::from_utf8_lossy(&buf);
        on_output(&*line, is_error);
        if is_error {
            if !collected.is_empty() {
                collected.push('\n');
            }
            collected.push_str(&line);
        }
    }
    collected
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EXECUTOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runners::ContainerConfig;
    use std::sync::Mutex;
    use std::time::Duration;

    fn collecting() -> (OutputMode, Arc<Mutex<Vec<(String, bool)>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let mode = OutputMode::Stream(Arc::new(move |line: &str, is_err: bool| {
            sink.lock().unwrap().push((line.to_string(), is_err));
        }));
        (mode, lines)
    }

    #[tokio::test]
    async fn test_run_streams_echo_and_output() {
        let runner = ShellRunner::default();
        let invocation = Invocation::build(&["echo hello".to_string()], None, &ContainerConfig::default());
        let (mode, lines) = collecting();

        runner.run(&invocation, &mode, Deadline::none()).await.unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(
            *lines,
            vec![("$ echo hello".to_string(), false), ("hello".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_run_reports_last_command_status() {
        let runner = ShellRunner::default();
        let commands = vec![
            "false".to_string(),
            "echo still-runs".to_string(),
            "echo oops >&2; false".to_string(),
        ];
        let invocation = Invocation::build(&commands, None, &ContainerConfig::default());
        let (mode, lines) = collecting();

        let err = runner.run(&invocation, &mode, Deadline::none()).await.unwrap_err();
        match err {
            ExecutionError::Exit { code, stderr } => {
                assert_eq!(code, 1);
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(lines.lock().unwrap().iter().any(|(l, _)| l == "still-runs"));
    }

    #[tokio::test]
    async fn test_run_earlier_failure_does_not_stop_script() {
        let runner = ShellRunner::default();
        let commands = vec!["false".to_string(), "echo after".to_string()];
        let invocation = Invocation::build(&commands, None, &ContainerConfig::default());
        let (mode, lines) = collecting();

        runner.run(&invocation, &mode, Deadline::none()).await.unwrap();
        assert!(lines.lock().unwrap().contains(&("after".to_string(), false)));
    }

    #[tokio::test]
    async fn test_run_survives_invalid_utf8_output() {
        let runner = ShellRunner::default();
        let commands = vec![
            "printf 'bad\\377\\n'".to_string(),
            "echo visible-after".to_string(),
        ];
        let invocation = Invocation::build(&commands, None, &ContainerConfig::default());
        let (mode, lines) = collecting();

        runner.run(&invocation, &mode, Deadline::none()).await.unwrap();

        let lines = lines.lock().unwrap();
        assert!(lines.contains(&("bad\u{FFFD}".to_string(), false)));
        assert!(lines.contains(&("visible-after".to_string(), false)));
    }

    #[tokio::test]
    async fn test_run_missing_executor() {
        let runner = ShellRunner::new("/no/such/shell");
        let invocation = Invocation::build(&["true".to_string()], None, &ContainerConfig::default());
        let err = runner
            .run(&invocation, &OutputMode::Inherit, Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_run_deadline() {
        let runner = ShellRunner::default();
        let invocation = Invocation::build(&["sleep 5".to_string()], None, &ContainerConfig::default());
        let (mode, _) = collecting();
        let err = runner
            .run(&invocation, &mode, Deadline::after(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::TimedOut(_)));
    }
}
