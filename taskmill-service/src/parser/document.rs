// Taskfile documents
// Splits a taskfile into its variables and commands documents

use thiserror::Error;

/// Top-level key of the variables document
pub const VARS_KEY: &str = "vars";

/// Separator line between the two documents
const SEPARATOR: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigFormatError {
    #[error("a taskfile holds a variables document and a commands document separated by '---', found {0} documents")]
    PartCount(usize),

    #[error("'vars' must be a mapping of variable names to values")]
    VarsNotMapping,

    #[error("the variables document must be a mapping with a top-level 'vars' key")]
    DocumentNotMapping,

    #[error("variable '{name}': {message}")]
    InvalidVariable { name: String, message: String },
}

/// The two raw documents of a taskfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskfileDocuments {
    pub variables: String,
    pub commands: String,
}

/// Split on lines that read `---` (trailing whitespace ignored).
///
/// A single document is the commands document with no variables. A blank part before a
/// leading separator is dropped, so files may start with a YAML document marker.
pub fn split_documents(source: &str) -> Result<TaskfileDocuments, ConfigFormatError> {
    let mut parts: Vec<String> = vec![String::new()];
    for line in source.split_inclusive('\n') {
        if line.trim_end() == SEPARATOR {
            parts.push(String::new());
        } else if let Some(current) = parts.last_mut() {
            current.push_str(line);
        }
    }

    if parts.len() == 3 && parts[0].trim().is_empty() {
        parts.remove(0);
    }

    match parts.len() {
        1 => Ok(TaskfileDocuments {
            variables: String::new(),
            commands: parts.remove(0),
        }),
        2 => {
            let commands = parts.remove(1);
            let variables = parts.remove(0);
            Ok(TaskfileDocuments {
                variables,
                commands,
            })
        }
        n => Err(ConfigFormatError::PartCount(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_documents() {
        let docs = split_documents("vars:\n  a: 1\n---\nx:\n  script: [echo]\n").unwrap();
        assert_eq!(docs.variables, "vars:\n  a: 1\n");
        assert_eq!(docs.commands, "x:\n  script: [echo]\n");
    }

    #[test]
    fn test_single_document_is_commands() {
        let docs = split_documents("x:\n  script: [echo]\n").unwrap();
        assert_eq!(docs.variables, "");
        assert_eq!(docs.commands, "x:\n  script: [echo]\n");
    }

    #[test]
    fn test_separator_with_trailing_whitespace() {
        let docs = split_documents("vars: {}\n---  \nx: {}\n").unwrap();
        assert_eq!(docs.commands, "x: {}\n");
    }

    #[test]
    fn test_leading_document_marker() {
        let docs = split_documents("---\nvars: {a: 1}\n---\nx: {}\n").unwrap();
        assert_eq!(docs.variables, "vars: {a: 1}\n");
        assert_eq!(docs.commands, "x: {}\n");
    }

    #[test]
    fn test_dashes_inside_lines_do_not_split() {
        let docs = split_documents("vars:\n  sep: a---b\n---\nx:\n  script: ['echo ---']\n").unwrap();
        assert_eq!(docs.variables, "vars:\n  sep: a---b\n");
    }

    #[test]
    fn test_too_many_documents() {
        let err = split_documents("a: 1\n---\nb: 2\n---\nc: 3\n").unwrap_err();
        assert_eq!(err, ConfigFormatError::PartCount(3));
    }
}
