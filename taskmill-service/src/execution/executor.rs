// Operation Executor
// Runs a resolved operation and applies its recovery policy

use crate::config::ExecutorConfig;
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::parser::models::{ImageSpec, ResolvedOperation};
use crate::runners::{ExecutionError, Invocation, OutputMode, ShellRunner};

use std::sync::Arc;
use std::time::Instant;

/// Runs operations through the configured executor
#[derive(Debug)]
pub struct OperationExecutor {
    /// Shell runner for invocations
    runner: ShellRunner,
    /// Configuration
    config: ExecutorConfig,
    /// Progress event sender; without one output goes straight to the terminal
    event_tx: Option<ProgressSender>,
}

impl OperationExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            runner: ShellRunner::new(config.executor.clone()),
            config,
            event_tx: None,
        }
    }

    /// Set progress event sender. Output lines are then delivered as events.
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn output_mode(&self, operation: &str) -> OutputMode {
        match &self.event_tx {
            Some(tx) => {
                let tx = tx.clone();
                let operation = operation.to_string();
                OutputMode::Stream(Arc::new(move |line: &str, is_error: bool| {
                    tx.send_event(ExecutionEvent::operation_output(
                        operation.as_str(),
                        line,
                        is_error,
                    ));
                }))
            }
            None => OutputMode::Inherit,
        }
    }

    /// Run one command list as a single invocation
    pub async fn run_script(
        &self,
        operation: &str,
        commands: &[String],
        image: Option<&ImageSpec>,
    ) -> Result<(), ExecutionError> {
        let invocation = Invocation::build(commands, image, &self.config.container);
        self.runner
            .run(&invocation, &self.output_mode(operation), self.config.deadline)
            .await
    }

    /// Run the operation's `script` only
    pub async fn run_primary(
        &self,
        name: &str,
        operation: &ResolvedOperation,
    ) -> Result<(), ExecutionError> {
        tracing::info!(operation = %name, "starting operation");
        self.event_tx.send_event(ExecutionEvent::operation_started(
            name,
            operation.stage.clone(),
        ));
        self.run_script(name, &operation.script, operation.image.as_ref())
            .await
    }

    /// Handle a failed `script`: run `on_failure` when there is one and return its result,
    /// otherwise report the failure and return it unchanged
    pub async fn recover(
        &self,
        name: &str,
        operation: &ResolvedOperation,
        error: ExecutionError,
    ) -> Result<(), ExecutionError> {
        if operation.on_failure.is_empty() {
            tracing::warn!(operation = %name, error = %error, "operation failed and has no on_failure steps");
            self.event_tx
                .send_event(ExecutionEvent::recovery_missing(name, error.to_string()));
            return Err(error);
        }

        tracing::warn!(operation = %name, error = %error, "operation failed, running on_failure steps");
        self.event_tx
            .send_event(ExecutionEvent::recovery_started(name, error.to_string()));
        self.run_script(name, &operation.on_failure, operation.image.as_ref())
            .await
    }

    /// Run `script`, then recover from a failure
    pub async fn run_operation(
        &self,
        name: &str,
        operation: &ResolvedOperation,
    ) -> Result<(), ExecutionError> {
        let start = Instant::now();

        let result = match self.run_primary(name, operation).await {
            Ok(()) => Ok(()),
            Err(error) => self.recover(name, operation, error).await,
        };

        let duration = start.elapsed();
        tracing::info!(operation = %name, success = result.is_ok(), ?duration, "operation finished");
        self.event_tx.send_event(ExecutionEvent::operation_completed(
            name,
            result.is_ok(),
            duration,
        ));
        result
    }
}

impl Default for OperationExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}
