// Parser module for taskfiles
// Document splitting, operation models and script resolution

pub mod document;
pub mod error;
pub mod models;
pub mod script;

pub use document::{split_documents, ConfigFormatError, TaskfileDocuments, VARS_KEY};
pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use models::*;
pub use script::ScriptResolver;
