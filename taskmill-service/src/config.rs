// Engine Configuration
// Executor settings and the deadline threaded through rendering and execution

use crate::runners::container::ContainerConfig;

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Default shell used to run scripts and template `shell` calls
pub const DEFAULT_EXECUTOR: &str = "/bin/sh";

/// Optional absolute point in time after which subprocesses are killed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    limit: Option<(Instant, Duration)>,
}

impl Deadline {
    /// No deadline; subprocesses may run forever
    pub fn none() -> Self {
        Self { limit: None }
    }

    /// Deadline `timeout` from now. A timeout past the clock's range means no deadline.
    pub fn after(timeout: Duration) -> Self {
        Self {
            limit: Instant::now()
                .checked_add(timeout)
                .map(|at| (at, timeout)),
        }
    }

    /// Time left, `None` when unbounded. Saturates at zero once expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.limit
            .map(|(at, _)| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().map(|d| d.is_zero()).unwrap_or(false)
    }

    /// The timeout the deadline was created with, for error reporting
    pub fn budget(&self) -> Option<Duration> {
        self.limit.map(|(_, budget)| budget)
    }
}

/// How operations are executed
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Top-level shell, independent from an image's executer
    pub executor: PathBuf,
    pub container: ContainerConfig,
    pub deadline: Deadline,
}

impl ExecutorConfig {
    pub fn with_executor(mut self, executor: impl Into<PathBuf>) -> Self {
        self.executor = executor.into();
        self
    }

    pub fn with_container(mut self, container: ContainerConfig) -> Self {
        self.container = container;
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            executor: PathBuf::from(DEFAULT_EXECUTOR),
            container: ContainerConfig::default(),
            deadline: Deadline::none(),
        }
    }
}
