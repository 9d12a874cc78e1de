// Container Runner
// Wraps an operation script in a container runtime invocation

use crate::parser::models::ImageSpec;
use crate::runners::shell_quote;

/// Configuration for containerized execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Container runtime binary (docker, podman, ...)
    pub runtime: String,
    /// Shell used inside the container when the image does not name one
    pub default_executer: String,
    /// Allocate a pseudo-terminal (`-t`)
    pub tty: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            default_executer: "/bin/sh".to_string(),
            tty: false,
        }
    }
}

/// Builds `<runtime> run` command lines
#[derive(Debug, Clone, Default)]
pub struct ContainerRunner {
    config: ContainerConfig,
}

impl ContainerRunner {
    pub fn new(config: ContainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Wrap `script` so that it runs inside `image`:
    /// `<runtime> run --rm -i [-t] [-v <mount>]... [--entrypoint <e>] <image> <executer> -c '<script>'`
    pub fn wrap(&self, script: &str, image: &ImageSpec) -> String {
        let mut args = vec![
            self.config.runtime.clone(),
            "run".to_string(),
            "--rm".to_string(),
            "-i".to_string(),
        ];

        if self.config.tty {
            args.push("-t".to_string());
        }

        for volume in &image.volumes {
            args.push("-v".to_string());
            args.push(shell_quote(volume));
        }

        if let Some(entrypoint) = &image.entrypoint {
            args.push("--entrypoint".to_string());
            args.push(shell_quote(entrypoint));
        }

        let executer = image
            .executer
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(&self.config.default_executer);

        args.push(shell_quote(&image.name));
        args.push(shell_quote(executer));
        args.push("-c".to_string());
        args.push(shell_quote(script));

        args.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str) -> ImageSpec {
        ImageSpec {
            name: name.to_string(),
            executer: None,
            volumes: Vec::new(),
            entrypoint: None,
        }
    }

    #[test]
    fn test_wrap_minimal() {
        let runner = ContainerRunner::default();
        let line = runner.wrap("echo hi\n", &image("alpine"));
        assert_eq!(line, "docker run --rm -i 'alpine' '/bin/sh' -c 'echo hi\n'");
    }

    #[test]
    fn test_wrap_with_all_options() {
        let runner = ContainerRunner::new(ContainerConfig {
            runtime: "podman".to_string(),
            default_executer: "/bin/sh".to_string(),
            tty: true,
        });
        let spec = ImageSpec {
            name: "rust:1.80".to_string(),
            executer: Some("/bin/bash".to_string()),
            volumes: vec!["./:/work".to_string(), "/tmp:/tmp:ro".to_string()],
            entrypoint: Some("".to_string()),
        };

        let line = runner.wrap("cargo test", &spec);
        assert_eq!(
            line,
            "podman run --rm -i -t -v './:/work' -v '/tmp:/tmp:ro' --entrypoint '' 'rust:1.80' '/bin/bash' -c 'cargo test'"
        );
    }

    #[test]
    fn test_wrap_quotes_script() {
        let runner = ContainerRunner::default();
        let line = runner.wrap("echo 'x'", &image("alpine"));
        assert!(line.ends_with("-c 'echo '\\''x'\\'''"));
    }
}
