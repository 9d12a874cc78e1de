// Script resolver
// Flattens macro references in an operation's command lists into literal shell text

use crate::config::Deadline;
use crate::macros::{ExpansionScope, MacroError, MacroRegistry};
use crate::parser::models::{ListKind, Operation, OperationStore, ResolvedOperation};
use crate::suggest::closest_match;

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ScriptResolver {
    registry: Arc<MacroRegistry>,
    deadline: Deadline,
}

impl ScriptResolver {
    pub fn new(registry: Arc<MacroRegistry>) -> Self {
        Self {
            registry,
            deadline: Deadline::none(),
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Resolve `name` against `store`. `script` and `on_failure` are resolved independently,
    /// each including the same list of referenced operations.
    pub fn resolve(
        &self,
        name: &str,
        store: &OperationStore,
    ) -> Result<ResolvedOperation, MacroError> {
        let operation = store.get(name).ok_or_else(|| MacroError::UnknownOperation {
            name: name.to_string(),
            suggestion: closest_match(name, store.iter().map(|(n, _)| n)),
        })?;

        let script = self.resolve_list(name, operation, ListKind::Script, store)?;
        let on_failure = self.resolve_list(name, operation, ListKind::OnFailure, store)?;

        Ok(ResolvedOperation {
            script,
            on_failure,
            image: operation.image.clone(),
            stage: operation.stage().map(str::to_string),
            color: operation.color,
        })
    }

    fn resolve_list(
        &self,
        name: &str,
        operation: &Operation,
        list: ListKind,
        store: &OperationStore,
    ) -> Result<Vec<String>, MacroError> {
        let mut scope = ExpansionScope::for_operation(&self.registry, store, list, self.deadline);
        scope.enter(name)?;
        scope.expand_entries(list.select(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::models::Color;

    fn resolver() -> ScriptResolver {
        ScriptResolver::new(Arc::new(MacroRegistry::standard()))
    }

    #[test]
    fn test_resolve_literal_operation() {
        let store = OperationStore::from_yaml(
            "greet:\n  script: ['echo hello world']\n  color: red\n  stage: s\n",
        )
        .unwrap();
        let resolved = resolver().resolve("greet", &store).unwrap();
        assert_eq!(resolved.script, vec!["echo hello world"]);
        assert!(resolved.on_failure.is_empty());
        assert_eq!(resolved.color, Some(Color::Red));
        assert_eq!(resolved.stage.as_deref(), Some("s"));
    }

    #[test]
    fn test_resolve_nested_includes() {
        let store = OperationStore::from_yaml(
            r#"
a:
  script:
    - echo a1
    - !include b
    - echo a2
b:
  script:
    - !include c
    - echo b
c:
  script:
    - echo c
"#,
        )
        .unwrap();
        let resolved = resolver().resolve("a", &store).unwrap();
        assert_eq!(resolved.script, vec!["echo a1", "echo c", "echo b", "echo a2"]);
    }

    #[test]
    fn test_self_include_is_a_cycle() {
        let store = OperationStore::from_yaml("a:\n  script: [!include a]\n").unwrap();
        let err = resolver().resolve("a", &store).unwrap_err();
        match err {
            MacroError::IncludeCycle { chain } => assert_eq!(chain, vec!["a", "a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_operation_with_suggestion() {
        let store = OperationStore::from_yaml("build:\n  script: [make]\n").unwrap();
        let err = resolver().resolve("biuld", &store).unwrap_err();
        assert_eq!(err.to_string(), "operation 'biuld' not found, did you mean 'build'?");
    }

    #[test]
    fn test_unknown_macro_in_script_is_an_error() {
        let store = OperationStore::from_yaml("a:\n  script: [!nope x]\n").unwrap();
        let err = resolver().resolve("a", &store).unwrap_err();
        assert!(matches!(err, MacroError::UnknownMacro(name) if name == "nope"));
    }

    #[test]
    fn test_diamond_include_is_not_a_cycle() {
        let store = OperationStore::from_yaml(
            "top:\n  script: [!include l, !include r]\nl:\n  script: [!include base]\nr:\n  script: [!include base]\nbase:\n  script: [echo base]\n",
        )
        .unwrap();
        let resolved = resolver().resolve("top", &store).unwrap();
        assert_eq!(resolved.script, vec!["echo base", "echo base"]);
    }
}
