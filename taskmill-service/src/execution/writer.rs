// Output prefixing
// Formats operation output as "<name>:\t<line>", colored by the operation's palette entry

use crate::parser::models::Color;

/// ANSI escape sequences per palette color
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    /// Bold ANSI colors
    pub fn ansi() -> Self {
        Self { enabled: true }
    }

    /// No escape sequences, for pipes and files
    pub fn plain() -> Self {
        Self { enabled: false }
    }

    pub fn code(&self, color: Color) -> Option<&'static str> {
        if !self.enabled {
            return None;
        }
        Some(match color {
            Color::Black => "\x1b[1;30m",
            Color::Red => "\x1b[1;31m",
            Color::Green => "\x1b[1;32m",
            Color::Yellow => "\x1b[1;33m",
            Color::Purple => "\x1b[1;34m",
            Color::Magenta => "\x1b[1;35m",
            Color::Teal => "\x1b[1;36m",
            Color::White => "\x1b[1;37m",
        })
    }

    pub fn paint(&self, color: Option<Color>, text: &str) -> String {
        match color.and_then(|c| self.code(c)) {
            Some(code) => format!("{}{}\x1b[0m", code, text),
            None => text.to_string(),
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::ansi()
    }
}

/// Prefixes each line of a stage member's output with its name
#[derive(Debug, Clone)]
pub struct PrefixWriter {
    name: String,
    color: Option<Color>,
    palette: Palette,
}

impl PrefixWriter {
    pub fn new(name: impl Into<String>, color: Option<Color>, palette: Palette) -> Self {
        Self {
            name: name.into(),
            color,
            palette,
        }
    }

    pub fn format_line(&self, line: &str) -> String {
        self.palette
            .paint(self.color, &format!("{}:\t{}", self.name, line))
    }
}
