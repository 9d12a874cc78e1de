// Template Module
// Rendering of taskfile documents: engine, scope, builtin functions and include sources

pub mod engine;
pub mod functions;
pub mod scope;
pub mod sources;

pub use engine::{normalize_dot_references, DocumentKind, TemplateEngine};
pub use functions::FailureSlot;
pub use scope::{EnvSnapshot, VariableScope, Variables};
pub use sources::{Source, SourceError};
