// Stage Scheduler
// Runs every operation of a stage concurrently, then recovers failures one by one

use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::executor::OperationExecutor;
use crate::macros::MacroError;
use crate::parser::models::{OperationStore, ResolvedOperation};
use crate::parser::ScriptResolver;
use crate::runners::ExecutionError;
use crate::suggest::{closest_match, did_you_mean};

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Final state of one stage member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Succeeded,
    /// The script failed and `on_failure` succeeded
    Recovered,
    /// Failed after recovery, with the final error
    Failed(String),
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, OperationOutcome::Failed(_))
    }
}

/// Outcome of every member of a stage, in member-name order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: String,
    pub outcomes: Vec<(String, OperationOutcome)>,
}

impl StageReport {
    pub fn outcome(&self, operation: &str) -> Option<&OperationOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == operation)
            .map(|(_, outcome)| outcome)
    }

    pub fn failed(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_success())
    }
}

/// A member that still failed after recovery
#[derive(Debug)]
pub struct MemberFailure {
    pub operation: String,
    pub error: ExecutionError,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage '{stage}' not found{}", did_you_mean(.suggestion))]
    UnknownStage {
        stage: String,
        suggestion: Option<String>,
    },

    #[error(transparent)]
    Resolve(#[from] MacroError),

    #[error("stage '{stage}' failed: {}", describe_failures(.failures))]
    Failed {
        stage: String,
        failures: Vec<MemberFailure>,
        report: StageReport,
    },
}

fn describe_failures(failures: &[MemberFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.operation, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collect and resolve the members of `stage`, in name order. Any resolution failure aborts
/// before anything runs.
pub fn resolve_stage(
    resolver: &ScriptResolver,
    stage: &str,
    store: &OperationStore,
) -> Result<Vec<(String, ResolvedOperation)>, StageError> {
    let members = store.stage_members(stage);
    if members.is_empty() {
        let stages = store.stages();
        return Err(StageError::UnknownStage {
            stage: stage.to_string(),
            suggestion: closest_match(stage, stages.keys().map(String::as_str)),
        });
    }

    members
        .into_iter()
        .map(|name| -> Result<_, StageError> {
            let operation = resolver.resolve(&name, store)?;
            Ok((name, operation))
        })
        .collect()
}

/// Runs stages: collect, resolve, dispatch, barrier, recover, aggregate
pub struct StageScheduler {
    executor: Arc<OperationExecutor>,
    resolver: ScriptResolver,
    event_tx: Option<ProgressSender>,
}

impl StageScheduler {
    pub fn new(executor: Arc<OperationExecutor>, resolver: ScriptResolver) -> Self {
        Self {
            executor,
            resolver,
            event_tx: None,
        }
    }

    /// Set progress event sender for stage-level events
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn resolve_stage(
        &self,
        stage: &str,
        store: &OperationStore,
    ) -> Result<Vec<(String, ResolvedOperation)>, StageError> {
        resolve_stage(&self.resolver, stage, store)
    }

    pub async fn run_stage(
        &self,
        stage: &str,
        store: &OperationStore,
    ) -> Result<StageReport, StageError> {
        let members = self.resolve_stage(stage, store)?;
        let start = Instant::now();

        let names: Vec<String> = members.iter().map(|(name, _)| name.clone()).collect();
        tracing::info!(stage = %stage, members = ?names, "starting stage");
        self.event_tx
            .send_event(ExecutionEvent::stage_started(stage, names));

        // Dispatch
        let handles: Vec<_> = members
            .into_iter()
            .map(|(name, operation)| {
                let operation = Arc::new(operation);
                let executor = self.executor.clone();
                let task_name = name.clone();
                let task_operation = operation.clone();
                let handle = tokio::spawn(async move {
                    executor.run_primary(&task_name, &task_operation).await
                });
                (name, operation, handle)
            })
            .collect();

        // Barrier
        let mut primaries = Vec::with_capacity(handles.len());
        for (name, operation, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(ExecutionError::Aborted(join_error.to_string())),
            };
            primaries.push((name, operation, result));
        }

        // Recover, sequentially in member-name order
        let mut outcomes = Vec::with_capacity(primaries.len());
        let mut failures = Vec::new();
        for (name, operation, result) in primaries {
            let outcome = match result {
                Ok(()) => OperationOutcome::Succeeded,
                Err(error) => match self.executor.recover(&name, &operation, error).await {
                    Ok(()) => OperationOutcome::Recovered,
                    Err(error) => {
                        let message = error.to_string();
                        failures.push(MemberFailure {
                            operation: name.clone(),
                            error,
                        });
                        OperationOutcome::Failed(message)
                    }
                },
            };

            self.event_tx.send_event(ExecutionEvent::operation_completed(
                name.as_str(),
                outcome.is_success(),
                start.elapsed(),
            ));
            outcomes.push((name, outcome));
        }

        let report = StageReport {
            stage: stage.to_string(),
            outcomes,
        };

        let duration = start.elapsed();
        tracing::info!(stage = %stage, failed = failures.len(), ?duration, "stage finished");
        self.event_tx.send_event(ExecutionEvent::stage_completed(
            stage,
            report.failed(),
            duration,
        ));

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(StageError::Failed {
                stage: stage.to_string(),
                failures,
                report,
            })
        }
    }
}
