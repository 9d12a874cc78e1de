// Runners Module
// Builds shell invocations for operations and runs them as subprocesses

pub mod container;
pub mod shell;

// Re-export key types
pub use container::{ContainerConfig, ContainerRunner};
pub use shell::{OutputCallback, OutputMode, ShellRunner};

use crate::config::Deadline;
use crate::parser::models::ImageSpec;

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Polling interval while waiting on a blocking subprocess
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors raised while running a subprocess
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to start '{executor}': {source}")]
    Spawn {
        executor: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting on '{executor}': {source}")]
    Wait {
        executor: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exit status {code}{}", stderr_suffix(.stderr))]
    Exit { code: i32, stderr: String },

    #[error("terminated by signal{}", stderr_suffix(.stderr))]
    Signal { stderr: String },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("aborted: {0}")]
    Aborted(String),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Quote a string for POSIX shells using single quotes
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// A fully built command line, ready to be handed to the top-level executor with `-c`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub script: String,
    pub containerized: bool,
}

impl Invocation {
    /// Build the invocation for a resolved command list, wrapping it in a container run when an
    /// image is given
    pub fn build(commands: &[String], image: Option<&ImageSpec>, container: &ContainerConfig) -> Self {
        let mut script = String::new();
        for command in commands {
            script.push_str("echo ");
            script.push_str(&shell_quote(&format!("$ {}", command)));
            script.push('\n');
            script.push_str(command);
            script.push('\n');
        }

        match image {
            Some(image) => Self {
                script: ContainerRunner::new(container.clone()).wrap(&script, image),
                containerized: true,
            },
            None => Self {
                script,
                containerized: false,
            },
        }
    }
}

/// Run `<program> -c <script>` to completion and return its stdout.
///
/// Blocking; used from template functions and macro expansion, which run synchronously
/// inside the renderer. The child is killed once the deadline passes.
pub fn capture(program: &Path, script: &str, deadline: Deadline) -> Result<String, ExecutionError> {
    let executor = program.display().to_string();

    let mut child = Command::new(program)
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecutionError::Spawn {
            executor: executor.clone(),
            source,
        })?;

    let stdout_reader = child.stdout.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    });
    let stderr_reader = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if deadline.is_expired() => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecutionError::TimedOut(deadline.budget().unwrap_or_default()));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                return Err(ExecutionError::Wait { executor, source });
            }
        }
    };

    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    match status.code() {
        Some(0) => Ok(stdout),
        Some(code) => Err(ExecutionError::Exit { code, stderr }),
        None => Err(ExecutionError::Signal { stderr }),
    }
}
