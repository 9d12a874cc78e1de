// Shell macro
// `!shell <command>` is replaced by the command's standard output

use super::{ExpansionScope, MacroCommand, MacroError};
use crate::config::DEFAULT_EXECUTOR;
use crate::parser::models::MacroReference;
use crate::runners;

use std::path::PathBuf;

pub const SHELL: &str = "shell";

#[derive(Debug, Clone)]
pub struct ShellMacro {
    program: PathBuf,
}

impl ShellMacro {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ShellMacro {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTOR)
    }
}

impl MacroCommand for ShellMacro {
    fn name(&self) -> &str {
        SHELL
    }

    /// `shell_var(cmd)` renders `!shell '<cmd>'`; the template-level `shell` function runs
    /// immediately instead
    fn template_functions(&self) -> Vec<(String, minijinja::Value)> {
        let shell_var = minijinja::Value::from_function(|command: String| -> String {
            MacroReference::new(SHELL, command).to_yaml()
        });
        vec![("shell_var".to_string(), shell_var)]
    }

    fn expand(
        &self,
        argument: &str,
        scope: &mut ExpansionScope<'_>,
    ) -> Result<Vec<String>, MacroError> {
        tracing::debug!(command = %argument, "expanding shell macro");
        let stdout = runners::capture(&self.program, argument, scope.deadline())?;
        let value = stdout.strip_suffix('\n').unwrap_or(&stdout);
        Ok(vec![value.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Deadline;
    use crate::macros::MacroRegistry;
    use crate::runners::ExecutionError;

    #[test]
    fn test_shell_expands_to_stdout() {
        let registry = MacroRegistry::standard();
        let mut scope = ExpansionScope::for_variables(&registry, Deadline::none());
        let out = ShellMacro::default().expand("echo abc123", &mut scope).unwrap();
        assert_eq!(out, vec!["abc123"]);
    }

    #[test]
    fn test_shell_keeps_inner_newlines() {
        let registry = MacroRegistry::standard();
        let mut scope = ExpansionScope::for_variables(&registry, Deadline::none());
        let out = ShellMacro::default()
            .expand("printf 'a\\nb\\n'", &mut scope)
            .unwrap();
        assert_eq!(out, vec!["a\nb"]);
    }

    #[test]
    fn test_shell_failure_carries_stderr() {
        let registry = MacroRegistry::standard();
        let mut scope = ExpansionScope::for_variables(&registry, Deadline::none());
        let err = ShellMacro::default()
            .expand("echo nope >&2; exit 2", &mut scope)
            .unwrap_err();
        match err {
            MacroError::Execution(ExecutionError::Exit { code, stderr }) => {
                assert_eq!(code, 2);
                assert!(stderr.contains("nope"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
