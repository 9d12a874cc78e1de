// Service errors
// Unifies the module errors behind one type for callers of the library

use crate::execution::StageError;
use crate::macros::MacroError;
use crate::parser::ParseError;
use crate::resolver::ResolveError;
use crate::runners::ExecutionError;

use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("invalid commands document\n{0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Macro(#[from] MacroError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("operation '{0}' cannot be shown in a dry run: the name is reserved for variables")]
    ReservedName(String),

    #[error("failed to render dry run: {0}")]
    DryRun(#[from] serde_yaml::Error),
}

impl ServiceError {
    /// Stage report attached to a failed stage, if this error is one
    pub fn stage_report(&self) -> Option<&crate::execution::StageReport> {
        match self {
            ServiceError::Stage(StageError::Failed { report, .. }) => Some(report),
            _ => None,
        }
    }
}
