// Include macro
// `!include <operation>` splices another operation's commands in place

use super::{ExpansionScope, MacroCommand, MacroError};
use crate::parser::models::MacroReference;
use crate::suggest::closest_match;

pub const INCLUDE: &str = "include";

#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeMacro;

impl MacroCommand for IncludeMacro {
    fn name(&self) -> &str {
        INCLUDE
    }

    /// `include(name)` renders `!include '<name>'`, meant to be used as a list item
    fn template_functions(&self) -> Vec<(String, minijinja::Value)> {
        let include = minijinja::Value::from_function(|operation: String| -> String {
            MacroReference::new(INCLUDE, operation).to_yaml()
        });
        vec![(INCLUDE.to_string(), include)]
    }

    fn expand(
        &self,
        argument: &str,
        scope: &mut ExpansionScope<'_>,
    ) -> Result<Vec<String>, MacroError> {
        let store = scope
            .store()
            .ok_or_else(|| MacroError::NoOperationStore(INCLUDE.to_string()))?;

        let operation = store.get(argument).ok_or_else(|| MacroError::UnknownOperation {
            name: argument.to_string(),
            suggestion: closest_match(argument, store.iter().map(|(name, _)| name)),
        })?;

        let entries = scope.list().select(operation);
        scope.enter(argument)?;
        let result = scope.expand_entries(entries);
        scope.leave();
        result
    }
}
