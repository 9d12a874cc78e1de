// Builtin template functions
// `shell(cmd)` and `now(format)`; `include_file` lives with the resolver

use crate::config::Deadline;
use crate::resolver::ResolveError;
use crate::runners;

use minijinja::{Error, ErrorKind, Value};
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Default layout for `now()`
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d";

/// Holds the first typed error raised inside a template function, so it survives the trip
/// through minijinja's error type
#[derive(Debug, Clone, Default)]
pub struct FailureSlot {
    inner: Arc<Mutex<Option<ResolveError>>>,
}

impl FailureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `error` (keeping an earlier one) and return the error that aborts the render
    pub fn fail(&self, error: ResolveError) -> Error {
        let message = error.to_string();
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(error);
        }
        Error::new(ErrorKind::InvalidOperation, message)
    }

    pub fn take(&self) -> Option<ResolveError> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// `shell(cmd)`: run `cmd` and return its standard output
pub fn shell(program: PathBuf, deadline: Deadline, failures: FailureSlot) -> Value {
    Value::from_function(move |command: String| -> Result<String, Error> {
        tracing::debug!(command = %command, "template shell");
        runners::capture(&program, &command, deadline)
            .map_err(|e| failures.fail(ResolveError::Execution(e)))
    })
}

/// `now(format)`: local time, formatted with chrono's strftime syntax
pub fn now() -> Value {
    Value::from_function(|format: Option<String>| -> Result<String, Error> {
        let format = format.as_deref().unwrap_or(DEFAULT_TIME_FORMAT);
        let mut out = String::new();
        write!(out, "{}", chrono::Local::now().format(format)).map_err(|_| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("invalid time format '{}'", format),
            )
        })?;
        Ok(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runners::ExecutionError;
    use minijinja::Environment;

    fn env_with(name: &'static str, function: Value) -> Environment<'static> {
        let mut env = Environment::new();
        env.add_global(name, function);
        env
    }

    #[test]
    fn test_shell_returns_stdout() {
        let slot = FailureSlot::new();
        let env = env_with("shell", shell(PathBuf::from("/bin/sh"), Deadline::none(), slot.clone()));
        let out = env.render_str("[{{ shell('echo hi') }}]", ()).unwrap();
        assert_eq!(out, "[hi\n]");
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_shell_failure_aborts_and_is_recorded() {
        let slot = FailureSlot::new();
        let env = env_with("shell", shell(PathBuf::from("/bin/sh"), Deadline::none(), slot.clone()));
        assert!(env.render_str("{{ shell('echo bad >&2; exit 4') }}", ()).is_err());

        match slot.take() {
            Some(ResolveError::Execution(ExecutionError::Exit { code, stderr })) => {
                assert_eq!(code, 4);
                assert!(stderr.contains("bad"));
            }
            other => panic!("unexpected slot content: {other:?}"),
        }
    }

    #[test]
    fn test_now_default_format() {
        let env = env_with("now", now());
        let out = env.render_str("{{ now() }}", ()).unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(out, chrono::Local::now().format("%Y-%m-%d").to_string());
    }

    #[test]
    fn test_now_custom_format() {
        let env = env_with("now", now());
        let out = env.render_str("{{ now('%Y') }}", ()).unwrap();
        assert_eq!(out.len(), 4);
    }
}
