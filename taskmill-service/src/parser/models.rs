// Taskfile data models
// Operations, container images, command entries and the operation store

use crate::parser::error::{ParseError, ParseResult};

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_yaml::value::{Tag, TaggedValue};
use std::collections::BTreeMap;
use std::fmt;

/// Display colors an operation may declare for its prefixed output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Purple,
    Magenta,
    Teal,
    White,
}

impl Color {
    pub const ALL: [Color; 8] = [
        Color::Black,
        Color::Red,
        Color::Green,
        Color::Yellow,
        Color::Purple,
        Color::Magenta,
        Color::Teal,
        Color::White,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Black => "black",
            Color::Red => "red",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Purple => "purple",
            Color::Magenta => "magenta",
            Color::Teal => "teal",
            Color::White => "white",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container specification; its presence switches an operation to containerized execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Image reference passed to the container runtime
    pub name: String,
    /// Shell used inside the container (default: /bin/sh)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executer: Option<String>,
    /// Volume mounts in runtime syntax (`host:container[:mode]`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Entrypoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
}

/// Which command list of an operation is being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Script,
    OnFailure,
}

impl ListKind {
    /// Pick the matching list from an operation
    pub fn select<'a>(&self, operation: &'a Operation) -> &'a [CommandEntry] {
        match self {
            ListKind::Script => &operation.script,
            ListKind::OnFailure => &operation.on_failure,
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Script => f.write_str("script"),
            ListKind::OnFailure => f.write_str("on_failure"),
        }
    }
}

/// A reference to a macro command, written in YAML as a tagged scalar (`!include build`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroReference {
    pub name: String,
    pub argument: String,
}

impl MacroReference {
    pub fn new(name: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument: argument.into(),
        }
    }

    /// Build a reference from a tagged YAML node. Only scalar arguments are accepted.
    pub fn from_tagged(tagged: &TaggedValue) -> Result<Self, String> {
        let name = tagged.tag.to_string().trim_start_matches('!').to_string();
        if name.is_empty() {
            return Err("macro references need a name".to_string());
        }
        let argument = scalar_to_string(&tagged.value).ok_or_else(|| {
            format!("argument of macro '!{}' must be a scalar", name)
        })?;
        Ok(Self { name, argument })
    }

    /// Render the reference as YAML text, suitable for splicing into a template result
    pub fn to_yaml(&self) -> String {
        format!("!{} '{}'", self.name, self.argument.replace('\'', "''"))
    }

    fn to_value(&self) -> serde_yaml::Value {
        serde_yaml::Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(self.name.clone()),
            value: serde_yaml::Value::String(self.argument.clone()),
        }))
    }
}

/// One entry of a `script` or `on_failure` list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEntry {
    /// Shell text executed as-is
    Literal(String),
    /// Reference resolved by the macro registry before execution
    Macro(MacroReference),
}

impl CommandEntry {
    pub fn literal(text: impl Into<String>) -> Self {
        CommandEntry::Literal(text.into())
    }

    fn from_value(value: serde_yaml::Value) -> Result<Self, String> {
        match value {
            serde_yaml::Value::Tagged(tagged) => {
                MacroReference::from_tagged(&tagged).map(CommandEntry::Macro)
            }
            other => scalar_to_string(&other)
                .map(CommandEntry::Literal)
                .ok_or_else(|| "command entries must be strings or macro references".to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for CommandEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        CommandEntry::from_value(value).map_err(de::Error::custom)
    }
}

impl Serialize for CommandEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CommandEntry::Literal(text) => serializer.serialize_str(text),
            CommandEntry::Macro(reference) => reference.to_value().serialize(serializer),
        }
    }
}

/// A named unit of work as declared in the commands document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub script: Vec<CommandEntry>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub on_failure: Vec<CommandEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl Operation {
    /// Stage tag, treating an empty string as no stage
    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref().filter(|s| !s.is_empty())
    }
}

/// An operation whose command lists contain only literal shell text
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedOperation {
    pub script: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub on_failure: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

/// All operations of a taskfile, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OperationStore {
    operations: BTreeMap<String, Operation>,
}

impl OperationStore {
    /// Parse a rendered commands document
    pub fn from_yaml(source: &str) -> ParseResult<Self> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }

        let operations: Option<BTreeMap<String, Operation>> = serde_yaml::from_str(source)
            .map_err(|e| ParseError::from_yaml_error(&e, source))?;

        Ok(Self {
            operations: operations.unwrap_or_default(),
        })
    }

    pub fn from_operations(operations: impl IntoIterator<Item = (String, Operation)>) -> Self {
        Self {
            operations: operations.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Operation)> {
        self.operations.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of all operations, sorted
    pub fn operation_names(&self) -> Vec<String> {
        self.operations.keys().cloned().collect()
    }

    /// Stage name to member operation names, both sorted
    pub fn stages(&self) -> BTreeMap<String, Vec<String>> {
        let mut stages: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, operation) in &self.operations {
            if let Some(stage) = operation.stage() {
                stages
                    .entry(stage.to_string())
                    .or_default()
                    .push(name.clone());
            }
        }
        stages
    }

    /// Names of the operations tagged with `stage`
    pub fn stage_members(&self, stage: &str) -> Vec<String> {
        self.operations
            .iter()
            .filter(|(_, op)| op.stage() == Some(stage))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Convert a YAML scalar into its textual form
pub(crate) fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<CommandEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<Vec<CommandEntry>> = Option::deserialize(deserializer)?;
    Ok(entries.unwrap_or_default())
}
