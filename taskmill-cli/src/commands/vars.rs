// Variable overrides
// Parses repeated `-v key=value` flags into caller-supplied variables

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use taskmill_service::Variables;

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]*=[A-Za-z0-9,]*$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VarError {
    #[error("invalid variable format '{0}', expected key=value with letters, digits and commas")]
    InvalidFormat(String),
}

/// Parse `key=value` pairs. Later duplicates win.
pub fn parse_overrides(raw: &[String]) -> Result<Variables, VarError> {
    let mut overrides = Variables::new();
    for entry in raw {
        if !VAR_RE.is_match(entry) {
            return Err(VarError::InvalidFormat(entry.clone()));
        }
        if let Some((key, value)) = entry.split_once('=') {
            overrides.insert(key.to_string(), value.into());
        }
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_overrides() {
        let vars = parse_overrides(&strings(&["name=world", "list=a,b"])).unwrap();
        assert_eq!(vars["name"].as_str(), Some("world"));
        assert_eq!(vars["list"].as_str(), Some("a,b"));
    }

    #[test]
    fn test_later_duplicate_wins() {
        let vars = parse_overrides(&strings(&["k=one", "k=two"])).unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars["k"].as_str(), Some("two"));
    }

    #[test]
    fn test_empty_value_allowed() {
        let vars = parse_overrides(&strings(&["k="])).unwrap();
        assert_eq!(vars["k"].as_str(), Some(""));
    }

    #[test]
    fn test_invalid_format() {
        for bad in ["novalue", "a=b c", "a-b=c", "a=b=c", "a=$HOME"] {
            assert_eq!(
                parse_overrides(&strings(&[bad])),
                Err(VarError::InvalidFormat(bad.to_string()))
            );
        }
    }
}
