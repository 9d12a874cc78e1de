// Include sources
// Fetches the documents named by `include_file`: URLs, glob patterns or plain paths

use crate::config::Deadline;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to fetch '{url}': {message}")]
    Http { url: String, message: String },

    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A fetched document and the identity used for cycle detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Canonical path or URL
    pub identity: String,
    pub text: String,
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

fn is_pattern(location: &str) -> bool {
    location.contains(['*', '?', '['])
}

/// Identity of a local file: its canonical path when it can be resolved
pub fn file_identity(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Fetch every document named by `location`. A pattern that matches nothing yields no sources.
pub fn fetch(location: &str, deadline: Deadline) -> Result<Vec<Source>, SourceError> {
    if is_url(location) {
        return fetch_url(location, deadline).map(|source| vec![source]);
    }

    if is_pattern(location) {
        let paths = glob::glob(location).map_err(|source| SourceError::Pattern {
            pattern: location.to_string(),
            source,
        })?;

        let mut sources = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| SourceError::Read {
                path: e.path().to_path_buf(),
                source: e.into_error(),
            })?;
            if path.is_file() {
                sources.push(read_file(&path)?);
            }
        }
        return Ok(sources);
    }

    read_file(Path::new(location)).map(|source| vec![source])
}

fn read_file(path: &Path) -> Result<Source, SourceError> {
    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Source {
        identity: file_identity(path),
        text,
    })
}

fn fetch_url(url: &str, deadline: Deadline) -> Result<Source, SourceError> {
    tracing::debug!(url = %url, "fetching include");

    let config = ureq::Agent::config_builder()
        .timeout_global(deadline.remaining())
        .build();
    let agent: ureq::Agent = config.into();

    let mut response = agent.get(url).call().map_err(|e| SourceError::Http {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| SourceError::Http {
            url: url.to_string(),
            message: format!("failed to read response: {}", e),
        })?;

    Ok(Source {
        identity: url.to_string(),
        text,
    })
}

/// Serve a document over HTTP on a local port for `requests` requests and return its URL.
/// `body` receives that URL.
#[cfg(test)]
pub(crate) fn serve_text(body: impl FnOnce(&str) -> String, requests: usize) -> String {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/taskmill.yml", listener.local_addr().unwrap());
    let body = body(&url);
    std::thread::spawn(move || {
        for stream in listener.incoming().take(requests) {
            let mut stream = stream.unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: text/yaml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .unwrap();
        }
    });
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_location_kinds() {
        assert!(is_url("https://example.com/tasks.yml"));
        assert!(!is_url("tasks.yml"));
        assert!(is_pattern("conf/*.yml"));
        assert!(is_pattern("conf/task?.yml"));
        assert!(is_pattern("conf/[ab].yml"));
        assert!(!is_pattern("conf/tasks.yml"));
    }

    #[test]
    fn test_fetch_plain_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("one.yml");
        fs::write(&path, "x: {script: [a]}\n").unwrap();

        let sources = fetch(path.to_str().unwrap(), Deadline::none()).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].text, "x: {script: [a]}\n");
        assert_eq!(sources[0].identity, file_identity(&path));
    }

    #[test]
    fn test_fetch_glob_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.yml"), "b").unwrap();
        fs::write(dir.path().join("a.yml"), "a").unwrap();
        fs::write(dir.path().join("c.txt"), "c").unwrap();

        let pattern = format!("{}/*.yml", dir.path().display());
        let sources = fetch(&pattern, Deadline::none()).unwrap();
        let texts: Vec<_> = sources.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_fetch_glob_without_matches() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/*.yml", dir.path().display());
        assert!(fetch(&pattern, Deadline::none()).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_missing_file() {
        let err = fetch("/definitely/not/here.yml", Deadline::none()).unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }

    #[test]
    fn test_fetch_url() {
        let url = serve_text(|_| "x:\n  script: [echo remote]\n".to_string(), 1);
        let sources = fetch(&url, Deadline::after(std::time::Duration::from_secs(10))).unwrap();
        assert_eq!(
            sources,
            vec![Source {
                identity: url,
                text: "x:\n  script: [echo remote]\n".to_string(),
            }]
        );
    }

    #[test]
    fn test_fetch_url_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/gone.yml", listener.local_addr().unwrap());
        drop(listener);

        let err = fetch(&url, Deadline::none()).unwrap_err();
        assert!(matches!(err, SourceError::Http { .. }));
    }
}
