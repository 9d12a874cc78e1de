// Macro Commands
// Registry of named macros that contribute template functions and expand tagged command entries

pub mod include;
pub mod shell;

pub use include::IncludeMacro;
pub use shell::ShellMacro;

use crate::config::Deadline;
use crate::parser::models::{CommandEntry, ListKind, MacroReference, OperationStore};
use crate::runners::ExecutionError;
use crate::suggest::did_you_mean;

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors raised while registering or expanding macros
#[derive(Debug, Error)]
pub enum MacroError {
    #[error("macro '{0}' is already registered")]
    DuplicateName(String),

    #[error("unknown macro '!{0}'")]
    UnknownMacro(String),

    #[error("operation '{name}' not found{}", did_you_mean(.suggestion))]
    UnknownOperation {
        name: String,
        suggestion: Option<String>,
    },

    #[error("include cycle: {}", .chain.join(" -> "))]
    IncludeCycle { chain: Vec<String> },

    #[error("macro '!{0}' references operations and cannot be used in variables")]
    NoOperationStore(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// A named macro: contributes template functions and expands its tagged references
pub trait MacroCommand: Send + Sync {
    /// Tag name, written as `!<name>` in YAML
    fn name(&self) -> &str;

    /// Functions installed into the template environment before rendering
    fn template_functions(&self) -> Vec<(String, minijinja::Value)>;

    /// Expand one reference into literal commands
    fn expand(
        &self,
        argument: &str,
        scope: &mut ExpansionScope<'_>,
    ) -> Result<Vec<String>, MacroError>;
}

/// Where an expansion happens: which store, which list, and the chain of operations entered
pub struct ExpansionScope<'a> {
    registry: &'a MacroRegistry,
    store: Option<&'a OperationStore>,
    list: ListKind,
    deadline: Deadline,
    trail: Vec<String>,
}

impl<'a> ExpansionScope<'a> {
    /// Scope for resolving one list of an operation
    pub fn for_operation(
        registry: &'a MacroRegistry,
        store: &'a OperationStore,
        list: ListKind,
        deadline: Deadline,
    ) -> Self {
        Self {
            registry,
            store: Some(store),
            list,
            deadline,
            trail: Vec::new(),
        }
    }

    /// Scope for expanding a variable value; there is no store to include from
    pub fn for_variables(registry: &'a MacroRegistry, deadline: Deadline) -> Self {
        Self {
            registry,
            store: None,
            list: ListKind::Script,
            deadline,
            trail: Vec::new(),
        }
    }

    pub fn store(&self) -> Option<&'a OperationStore> {
        self.store
    }

    pub fn list(&self) -> ListKind {
        self.list
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Operations currently being expanded, outermost first
    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    /// Push `name` onto the trail, failing if it is already being expanded
    pub fn enter(&mut self, name: &str) -> Result<(), MacroError> {
        if self.trail.iter().any(|n| n == name) {
            let mut chain = self.trail.clone();
            chain.push(name.to_string());
            return Err(MacroError::IncludeCycle { chain });
        }
        self.trail.push(name.to_string());
        Ok(())
    }

    pub fn leave(&mut self) {
        self.trail.pop();
    }

    /// Flatten a command list: literals are kept, references are expanded in place
    pub fn expand_entries(&mut self, entries: &[CommandEntry]) -> Result<Vec<String>, MacroError> {
        let registry = self.registry;
        let mut commands = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                CommandEntry::Literal(text) => commands.push(text.clone()),
                CommandEntry::Macro(reference) => {
                    commands.extend(registry.expand(reference, self)?);
                }
            }
        }
        Ok(commands)
    }
}

/// Name to macro command
#[derive(Default)]
pub struct MacroRegistry {
    commands: BTreeMap<String, Box<dyn MacroCommand>>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `include` and `shell` macros
    pub fn standard() -> Self {
        let builtins: [Box<dyn MacroCommand>; 2] =
            [Box::new(IncludeMacro), Box::new(ShellMacro::default())];
        Self {
            commands: builtins
                .into_iter()
                .map(|command| (command.name().to_string(), command))
                .collect(),
        }
    }

    pub fn register(&mut self, command: impl MacroCommand + 'static) -> Result<(), MacroError> {
        let name = command.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(MacroError::DuplicateName(name));
        }
        self.commands.insert(name, Box::new(command));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// All template functions contributed by registered macros
    pub fn template_functions(&self) -> Vec<(String, minijinja::Value)> {
        self.commands
            .values()
            .flat_map(|command| command.template_functions())
            .collect()
    }

    /// Dispatch a reference to its macro
    pub fn expand(
        &self,
        reference: &MacroReference,
        scope: &mut ExpansionScope<'_>,
    ) -> Result<Vec<String>, MacroError> {
        let command = self
            .commands
            .get(&reference.name)
            .ok_or_else(|| MacroError::UnknownMacro(reference.name.clone()))?;
        command.expand(&reference.argument, scope)
    }
}

impl fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroRegistry")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}
