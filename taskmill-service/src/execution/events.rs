// Execution Events
// Progress reporting and event types for operation and stage execution

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted while operations run
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    /// Stage execution started
    StageStarted { stage: String, members: Vec<String> },

    /// Stage execution completed
    StageCompleted {
        stage: String,
        failed: Vec<String>,
        duration: Duration,
    },

    /// Operation script started
    OperationStarted {
        operation: String,
        stage: Option<String>,
    },

    /// One line of operation output
    OperationOutput {
        operation: String,
        line: String,
        is_error: bool,
    },

    /// Operation finished, after recovery if any
    OperationCompleted {
        operation: String,
        success: bool,
        duration: Duration,
    },

    /// The script failed and `on_failure` is running
    RecoveryStarted { operation: String, error: String },

    /// The script failed and there is no `on_failure` to run
    RecoveryMissing { operation: String, error: String },
}

impl ExecutionEvent {
    pub fn stage_started(stage: impl Into<String>, members: Vec<String>) -> Self {
        Self::StageStarted {
            stage: stage.into(),
            members,
        }
    }

    pub fn stage_completed(stage: impl Into<String>, failed: Vec<String>, duration: Duration) -> Self {
        Self::StageCompleted {
            stage: stage.into(),
            failed,
            duration,
        }
    }

    pub fn operation_started(operation: impl Into<String>, stage: Option<String>) -> Self {
        Self::OperationStarted {
            operation: operation.into(),
            stage,
        }
    }

    pub fn operation_output(
        operation: impl Into<String>,
        line: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::OperationOutput {
            operation: operation.into(),
            line: line.into(),
            is_error,
        }
    }

    pub fn operation_completed(
        operation: impl Into<String>,
        success: bool,
        duration: Duration,
    ) -> Self {
        Self::OperationCompleted {
            operation: operation.into(),
            success,
            duration,
        }
    }

    pub fn recovery_started(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self::RecoveryStarted {
            operation: operation.into(),
            error: error.into(),
        }
    }

    pub fn recovery_missing(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self::RecoveryMissing {
            operation: operation.into(),
            error: error.into(),
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}
