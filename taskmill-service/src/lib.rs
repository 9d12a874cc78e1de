// Taskmill Service Library
// Templated YAML taskfiles: resolution, macro expansion and operation execution

pub mod config;
pub mod error;
pub mod execution;
pub mod macros;
pub mod parser;
pub mod resolver;
pub mod runners;
pub mod suggest;
pub mod taskfile;
pub mod template;

// Re-export commonly used types
pub use error::{ServiceError, ServiceResult};
pub use taskfile::Taskfile;

pub use config::{Deadline, ExecutorConfig, DEFAULT_EXECUTOR};

// Re-export parser types
pub use parser::{
    Color, CommandEntry, ImageSpec, Operation, OperationStore, ParseError, ParseErrorKind,
    ParseResult, ResolvedOperation, ScriptResolver,
};

pub use resolver::{ConfigResolver, ResolveError, ResolveOptions, ResolvedConfig};
pub use template::{EnvSnapshot, Variables};
pub use macros::{MacroCommand, MacroError, MacroRegistry};

// Re-export execution types
pub use execution::{
    progress_channel, ExecutionEvent, OperationExecutor, OperationOutcome, Palette, PrefixWriter,
    ProgressReceiver, ProgressSender, StageError, StageReport, StageScheduler,
};

// Re-export runner types
pub use runners::{ContainerConfig, ContainerRunner, ExecutionError, OutputMode, ShellRunner};
