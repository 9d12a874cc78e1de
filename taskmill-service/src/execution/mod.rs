// Execution Engine Module
// Single-operation execution with recovery, stage scheduling and output formatting

pub mod events;
pub mod executor;
pub mod stage;
pub mod writer;

// Re-export key types
pub use events::{progress_channel, EventSender, ExecutionEvent, ProgressReceiver, ProgressSender};
pub use executor::OperationExecutor;
pub use stage::{MemberFailure, OperationOutcome, StageError, StageReport, StageScheduler};
pub use writer::{Palette, PrefixWriter};
