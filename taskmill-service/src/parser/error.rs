// Parser error types with helpful error messages
// Provides context, line/column info, and suggestions for common taskfile mistakes

use std::fmt;

/// Detailed parse error with location and context
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Surrounding context (a few lines around the error)
    pub context: String,
    /// Optional suggestion for fixing the error
    pub suggestion: Option<String>,
    /// The kind of error
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// YAML syntax error
    YamlSyntax,
    /// Invalid schema (wrong types, missing fields)
    InvalidSchema,
    /// Invalid value (e.g. a color outside the palette)
    InvalidValue,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            context: String::new(),
            suggestion: None,
            kind: ParseErrorKind::InvalidSchema,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Create context from source content
    pub fn with_source_context(mut self, source: &str, context_lines: usize) -> Self {
        let lines: Vec<&str> = source.lines().collect();
        let start = self.line.saturating_sub(context_lines + 1);
        let end = (self.line + context_lines).min(lines.len());

        let mut context = String::new();
        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = i + 1;
            let prefix = if line_num == self.line { ">" } else { " " };
            context.push_str(&format!("{} {:4} | {}\n", prefix, line_num, line));

            if line_num == self.line && self.column > 0 {
                let indicator = " ".repeat(self.column + 7) + "^";
                context.push_str(&format!("       | {}\n", indicator));
            }
        }

        self.context = context;
        self
    }

    /// Create from serde_yaml error
    pub fn from_yaml_error(err: &serde_yaml::Error, source: &str) -> Self {
        let location = err.location();
        let (line, column) = location
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));

        let raw = err.to_string();
        let kind = if raw.contains("unknown variant") {
            ParseErrorKind::InvalidValue
        } else if raw.contains("invalid type") || raw.contains("missing field") {
            ParseErrorKind::InvalidSchema
        } else {
            ParseErrorKind::YamlSyntax
        };

        let message = format_yaml_error_message(&raw);
        let suggestion = suggest_yaml_fix(&raw, source, line);

        let mut error = ParseError::new(message, line, column)
            .with_kind(kind)
            .with_source_context(source, 2);
        error.suggestion = suggestion;
        error
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        writeln!(f, "  --> line {}:{}", self.line, self.column)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            write!(f, "{}", self.context)?;
        }

        if let Some(suggestion) = &self.suggestion {
            writeln!(f)?;
            writeln!(f, "help: {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Format serde_yaml error message into something more readable
fn format_yaml_error_message(msg: &str) -> String {
    if msg.contains("missing field") {
        if let Some(field) = extract_between(msg, "missing field `", "`") {
            return format!("missing required field '{}'", field);
        }
    }

    if msg.contains("unknown variant") {
        if let Some(variant) = extract_between(msg, "unknown variant `", "`") {
            return format!("unknown color '{}', expected one of: {}", variant, palette_names());
        }
    }

    if msg.contains("invalid type") {
        if let (Some(found), Some(expected)) = (
            extract_between(msg, "invalid type: ", ","),
            extract_between(msg, "expected ", " at"),
        ) {
            return format!("expected {}, but found {}", expected, found);
        }
    }

    msg.to_string()
}

fn palette_names() -> String {
    crate::parser::models::Color::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn extract_between(msg: &str, prefix: &str, suffix: &str) -> Option<String> {
    let start = msg.find(prefix)? + prefix.len();
    let end = msg[start..].find(suffix)? + start;
    Some(msg[start..end].to_string())
}

/// Suggest fixes for common taskfile mistakes
fn suggest_yaml_fix(msg: &str, source: &str, line: usize) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let error_line = lines.get(line.saturating_sub(1)).unwrap_or(&"");

    if msg.contains("missing field `name`") {
        return Some("an 'image' needs a 'name' naming the container image to run".to_string());
    }

    if msg.contains("invalid type") && msg.contains("expected a sequence") {
        return Some(
            "'script' and 'on_failure' are lists; prefix each command with '- '".to_string(),
        );
    }

    if msg.contains("expected") && error_line.starts_with('\t') {
        return Some(
            "YAML prefers spaces over tabs for indentation. Replace tabs with spaces.".to_string(),
        );
    }

    let typo_suggestions = [
        ("onfailure", "on_failure"),
        ("on_failer", "on_failure"),
        ("on-failure", "on_failure"),
        ("executor", "executer"),
        ("volume:", "volumes"),
        ("scripts:", "script"),
    ];

    let lower_line = error_line.to_lowercase();
    for (typo, correct) in typo_suggestions {
        if lower_line.contains(typo) {
            return Some(format!("did you mean '{}'?", correct));
        }
    }

    None
}

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;
