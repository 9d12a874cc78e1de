// Variable Resolution
// Merges overrides, declared and inherited variables and renders both taskfile documents

use crate::config::{Deadline, DEFAULT_EXECUTOR};
use crate::macros::{ExpansionScope, MacroError, MacroRegistry};
use crate::parser::document::{split_documents, ConfigFormatError, VARS_KEY};
use crate::parser::error::ParseError;
use crate::parser::models::{scalar_to_string, MacroReference};
use crate::parser::ScriptResolver;
use crate::runners::ExecutionError;
use crate::template::sources::{self, file_identity, SourceError};
use crate::template::{functions, DocumentKind, EnvSnapshot, FailureSlot, TemplateEngine, VariableScope, Variables};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while turning a taskfile into a commands document
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    ConfigFormat(#[from] ConfigFormatError),

    #[error("failed to render the {document} document: {message}")]
    Template {
        document: DocumentKind,
        message: String,
    },

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Macro(#[from] MacroError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("failed to read taskfile '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("include cycle: {}", .chain.join(" -> "))]
    IncludeCycle { chain: Vec<String> },
}

/// Output of the resolution pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Final variables, also shown by dry runs
    pub variables: Variables,
    /// Rendered commands document, ready to be parsed into operations
    pub commands: String,
}

/// Knobs for template evaluation
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Shell behind the template `shell()` function
    pub template_shell: PathBuf,
    pub deadline: Deadline,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            template_shell: PathBuf::from(DEFAULT_EXECUTOR),
            deadline: Deadline::none(),
        }
    }
}

/// Sources (canonical paths or URLs) on the current `include_file` recursion path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeTrail {
    entries: Vec<String>,
}

impl IncludeTrail {
    pub fn starting_at(identity: impl Into<String>) -> Self {
        Self {
            entries: vec![identity.into()],
        }
    }

    /// Extend the trail with `identity`, failing if it is already on it
    pub fn enter(&self, identity: &str) -> Result<Self, ResolveError> {
        let mut entries = self.entries.clone();
        entries.push(identity.to_string());
        if self.entries.iter().any(|e| e == identity) {
            return Err(ResolveError::IncludeCycle { chain: entries });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// Resolves taskfile text into variables and a rendered commands document
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    registry: Arc<MacroRegistry>,
    environment: Arc<EnvSnapshot>,
    overrides: Variables,
    options: ResolveOptions,
}

impl ConfigResolver {
    pub fn new(registry: Arc<MacroRegistry>, environment: EnvSnapshot) -> Self {
        Self {
            registry,
            environment: Arc::new(environment),
            overrides: Variables::new(),
            options: ResolveOptions::default(),
        }
    }

    /// Caller-supplied variables; they beat everything declared in files
    pub fn with_overrides(mut self, overrides: Variables) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &Arc<MacroRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Script resolver sharing this resolver's macros and deadline
    pub fn script_resolver(&self) -> ScriptResolver {
        ScriptResolver::new(self.registry.clone()).with_deadline(self.options.deadline)
    }

    pub fn resolve(&self, source: &str) -> Result<ResolvedConfig, ResolveError> {
        self.resolve_document(source, Variables::new(), &IncludeTrail::default())
    }

    pub fn resolve_file(&self, path: impl AsRef<Path>) -> Result<ResolvedConfig, ResolveError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ResolveError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let trail = IncludeTrail::starting_at(file_identity(path));
        self.resolve_document(&source, Variables::new(), &trail)
    }

    fn resolve_document(
        &self,
        source: &str,
        inherited: Variables,
        trail: &IncludeTrail,
    ) -> Result<ResolvedConfig, ResolveError> {
        let documents = split_documents(source)?;

        let mut working = self.overrides.clone();
        merge_missing(&mut working, inherited);
        let scope = VariableScope::new(working);

        let rendered = self.render(DocumentKind::Variables, &documents.variables, &scope, trail)?;
        tracing::debug!(document = %rendered, "rendered variables document");
        let declared = parse_variables(&rendered)?;

        let mut variables = self.overrides.clone();
        merge_missing(&mut variables, declared);
        merge_missing(&mut variables, scope.snapshot());
        self.apply_variable_macros(&mut variables)?;

        let scope = VariableScope::new(variables);
        let commands = self.render(DocumentKind::Commands, &documents.commands, &scope, trail)?;
        tracing::debug!(document = %commands, "rendered commands document");

        Ok(ResolvedConfig {
            variables: scope.snapshot(),
            commands,
        })
    }

    fn render(
        &self,
        kind: DocumentKind,
        source: &str,
        scope: &VariableScope,
        trail: &IncludeTrail,
    ) -> Result<String, ResolveError> {
        let failures = FailureSlot::new();

        let mut engine = TemplateEngine::new();
        for (name, function) in self.registry.template_functions() {
            engine.add_function(name, function);
        }
        engine.add_function(
            "shell",
            functions::shell(
                self.options.template_shell.clone(),
                self.options.deadline,
                failures.clone(),
            ),
        );
        engine.add_function("now", functions::now());
        engine.add_function(
            "include_file",
            self.include_file_function(scope.clone(), trail.clone(), failures.clone()),
        );

        engine
            .render(kind, source, scope, &self.environment)
            .map_err(|e| {
                failures.take().unwrap_or_else(|| ResolveError::Template {
                    document: kind,
                    message: e.to_string(),
                })
            })
    }

    fn include_file_function(
        &self,
        scope: VariableScope,
        trail: IncludeTrail,
        failures: FailureSlot,
    ) -> minijinja::Value {
        let resolver = self.clone();
        minijinja::Value::from_function(move |location: String| -> Result<String, minijinja::Error> {
            resolver
                .include_file(&location, &scope, &trail)
                .map_err(|e| failures.fail(e))
        })
    }

    /// Resolve every source behind `location` with the current variables inherited, add the
    /// variables they declare to `scope` and return their commands documents joined by newlines
    fn include_file(
        &self,
        location: &str,
        scope: &VariableScope,
        trail: &IncludeTrail,
    ) -> Result<String, ResolveError> {
        let mut commands = String::new();
        for source in sources::fetch(location, self.options.deadline)? {
            tracing::debug!(source = %source.identity, "including file");
            let nested = trail.enter(&source.identity)?;
            let resolved = self.resolve_document(&source.text, scope.snapshot(), &nested)?;
            scope.merge_missing(resolved.variables);
            commands.push_str(&resolved.commands);
            commands.push('\n');
        }
        Ok(commands)
    }

    /// Replace top-level tagged values by the output of their macro
    fn apply_variable_macros(&self, variables: &mut Variables) -> Result<(), ResolveError> {
        for (name, value) in variables.iter_mut() {
            let serde_yaml::Value::Tagged(tagged) = value else {
                continue;
            };

            let reference = MacroReference::from_tagged(tagged).map_err(|message| {
                ConfigFormatError::InvalidVariable {
                    name: name.clone(),
                    message,
                }
            })?;

            if !self.registry.contains(&reference.name) {
                tracing::warn!(
                    variable = %name,
                    "unknown macro '!{}', keeping its argument as the value",
                    reference.name
                );
                *value = serde_yaml::Value::String(reference.argument);
                continue;
            }

            let mut expansion = ExpansionScope::for_variables(&self.registry, self.options.deadline);
            let results = self.registry.expand(&reference, &mut expansion)?;
            *value = serde_yaml::Value::String(results.join("\n"));
        }
        Ok(())
    }
}

fn merge_missing(target: &mut Variables, other: Variables) {
    for (name, value) in other {
        target.entry(name).or_insert(value);
    }
}

/// Read the `vars` mapping out of a rendered variables document
fn parse_variables(rendered: &str) -> Result<Variables, ResolveError> {
    if rendered.trim().is_empty() {
        return Ok(Variables::new());
    }

    let document: serde_yaml::Value =
        serde_yaml::from_str(rendered).map_err(|e| ParseError::from_yaml_error(&e, rendered))?;

    let mut mapping = match document {
        serde_yaml::Value::Null => return Ok(Variables::new()),
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => return Err(ConfigFormatError::DocumentNotMapping.into()),
    };

    match mapping.remove(VARS_KEY) {
        None | Some(serde_yaml::Value::Null) => Ok(Variables::new()),
        Some(serde_yaml::Value::Mapping(vars)) => vars
            .into_iter()
            .map(|(key, value)| {
                scalar_to_string(&key)
                    .map(|key| (key, value))
                    .ok_or_else(|| ResolveError::from(ConfigFormatError::VarsNotMapping))
            })
            .collect(),
        Some(_) => Err(ConfigFormatError::VarsNotMapping.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::sources::serve_text;
    use std::fs;
    use tempfile::TempDir;

    fn resolver() -> ConfigResolver {
        ConfigResolver::new(
            Arc::new(MacroRegistry::standard()),
            EnvSnapshot::from_pairs([("HOME", "/home/tester"), ("name", "from-env")]),
        )
    }

    fn overrides(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_yaml::Value::from(*v)))
            .collect()
    }

    fn string(value: &str) -> serde_yaml::Value {
        serde_yaml::Value::from(value)
    }

    #[test]
    fn test_resolve_greeting() {
        let resolved = resolver()
            .resolve("vars:\n  name: world\n---\ngreet:\n  script:\n    - echo hello {{.Vars.name}}\n")
            .unwrap();
        assert_eq!(resolved.variables["name"], string("world"));
        assert_eq!(resolved.commands, "greet:\n  script:\n    - echo hello world\n");
    }

    #[test]
    fn test_single_document_has_no_variables() {
        let resolved = resolver().resolve("x:\n  script: [echo {{ Env.HOME }}]\n").unwrap();
        assert!(resolved.variables.is_empty());
        assert_eq!(resolved.commands, "x:\n  script: [echo /home/tester]\n");
    }

    #[test]
    fn test_precedence_override_declared_environment() {
        let source = "vars:\n  name: declared\n  other: kept\n---\nx:\n  script: ['{{ Vars.name }} {{ Env.name }}']\n";

        let resolved = resolver().resolve(source).unwrap();
        assert_eq!(resolved.variables["name"], string("declared"));
        assert_eq!(resolved.commands, "x:\n  script: ['declared from-env']\n");

        let resolved = resolver()
            .with_overrides(overrides(&[("name", "override")]))
            .resolve(source)
            .unwrap();
        assert_eq!(resolved.variables["name"], string("override"));
        assert_eq!(resolved.variables["other"], string("kept"));
        assert_eq!(resolved.commands, "x:\n  script: ['override from-env']\n");
    }

    #[test]
    fn test_overrides_visible_in_variables_document() {
        let resolved = resolver()
            .with_overrides(overrides(&[("version", "1")]))
            .resolve("vars:\n  tag: v{{ Vars.version }}\n---\nx: {}\n")
            .unwrap();
        assert_eq!(resolved.variables["tag"], string("v1"));
        assert_eq!(resolved.variables["version"], string("1"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let source = "vars:\n  a: 1\n  b: [x, y]\n---\nx:\n  script:\n{% for i in Vars.b %}    - echo {{ i }}\n{% endfor %}";
        let first = resolver().resolve(source).unwrap();
        let second = resolver().resolve(source).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.commands, "x:\n  script:\n    - echo x\n    - echo y\n");
    }

    #[test]
    fn test_empty_and_null_vars() {
        assert!(resolver().resolve("vars:\n---\nx: {}\n").unwrap().variables.is_empty());
        assert!(resolver().resolve("\n---\nx: {}\n").unwrap().variables.is_empty());
        assert!(resolver().resolve("other: 1\n---\nx: {}\n").unwrap().variables.is_empty());
    }

    #[test]
    fn test_config_format_errors() {
        let err = resolver().resolve("vars: [a, b]\n---\nx: {}\n").unwrap_err();
        assert!(matches!(err, ResolveError::ConfigFormat(ConfigFormatError::VarsNotMapping)));

        let err = resolver().resolve("- a\n---\nx: {}\n").unwrap_err();
        assert!(matches!(err, ResolveError::ConfigFormat(ConfigFormatError::DocumentNotMapping)));

        let err = resolver().resolve("a: 1\n---\nb: 2\n---\nc: 3\n").unwrap_err();
        assert!(matches!(err, ResolveError::ConfigFormat(ConfigFormatError::PartCount(3))));
    }

    #[test]
    fn test_template_syntax_error_names_document() {
        let err = resolver().resolve("vars: {}\n---\nx: {{ broken\n").unwrap_err();
        match err {
            ResolveError::Template { document, .. } => assert_eq!(document, DocumentKind::Commands),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_variable_shell_macro() {
        let resolved = resolver()
            .resolve("vars:\n  rev: !shell echo abc123\n  tagged: {{ shell_var('echo v2') }}\n---\nx:\n  script: ['echo {{ Vars.rev }} {{ Vars.tagged }}']\n")
            .unwrap();
        assert_eq!(resolved.variables["rev"], string("abc123"));
        assert_eq!(resolved.variables["tagged"], string("v2"));
        assert_eq!(resolved.commands, "x:\n  script: ['echo abc123 v2']\n");
    }

    #[test]
    fn test_variable_shell_macro_failure_is_fatal() {
        let err = resolver()
            .resolve("vars:\n  rev: !shell exit 7\n---\nx: {}\n")
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Macro(MacroError::Execution(ExecutionError::Exit { code: 7, .. }))
        ));
    }

    #[test]
    fn test_unknown_variable_macro_keeps_argument() {
        let resolved = resolver()
            .resolve("vars:\n  odd: !mystery plain text\n---\nx: {}\n")
            .unwrap();
        assert_eq!(resolved.variables["odd"], string("plain text"));
    }

    #[test]
    fn test_include_macro_in_variables_needs_store() {
        let err = resolver()
            .resolve("vars:\n  a: !include build\n---\nx: {}\n")
            .unwrap_err();
        assert!(matches!(err, ResolveError::Macro(MacroError::NoOperationStore(_))));
    }

    #[test]
    fn test_template_shell_function() {
        let resolved = resolver()
            .resolve("x:\n  script: ['echo {{ shell(\"printf hi\") }}']\n")
            .unwrap();
        assert_eq!(resolved.commands, "x:\n  script: ['echo hi']\n");

        let err = resolver()
            .resolve("x:\n  script: ['{{ shell(\"echo no >&2; exit 3\") }}']\n")
            .unwrap_err();
        match err {
            ResolveError::Execution(ExecutionError::Exit { code, stderr }) => {
                assert_eq!(code, 3);
                assert!(stderr.contains("no"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_include_file_splices_commands_and_variables() {
        let dir = TempDir::new().unwrap();
        let common = dir.path().join("common.yml");
        fs::write(
            &common,
            "vars:\n  shared: from-common\n  name: common-name\n---\nlint:\n  script: ['echo lint {{ Vars.name }}']\n",
        )
        .unwrap();

        let source = format!(
            "vars:\n  name: root\n---\n{{{{ include_file('{}') }}}}build:\n  script: ['echo {{{{ Vars.shared }}}}']\n",
            common.display()
        );
        let resolved = resolver().resolve(&source).unwrap();

        // the included file's own declaration beats the inherited value
        assert!(resolved.commands.contains("lint:\n  script: ['echo lint common-name']\n"));
        assert!(resolved.commands.contains("build:\n  script: ['echo from-common']\n"));
        assert_eq!(resolved.variables["name"], string("root"));
        assert_eq!(resolved.variables["shared"], string("from-common"));
    }

    #[test]
    fn test_include_file_glob() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yml"), "a:\n  script: [echo a]\n").unwrap();
        fs::write(dir.path().join("b.yml"), "b:\n  script: [echo b]\n").unwrap();

        let source = format!("{{{{ include_file('{}/*.yml') }}}}", dir.path().display());
        let resolved = resolver().resolve(&source).unwrap();
        assert_eq!(resolved.commands, "a:\n  script: [echo a]\n\nb:\n  script: [echo b]\n\n");

        let empty = format!("{{{{ include_file('{}/*.none') }}}}", dir.path().display());
        assert_eq!(resolver().resolve(&empty).unwrap().commands, "");
    }

    #[test]
    fn test_include_file_cycle() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.yml");
        let b = dir.path().join("b.yml");
        fs::write(&a, format!("{{{{ include_file('{}') }}}}", b.display())).unwrap();
        fs::write(&b, format!("{{{{ include_file('{}') }}}}", a.display())).unwrap();

        let err = resolver().resolve_file(&a).unwrap_err();
        match err {
            ResolveError::IncludeCycle { chain } => {
                assert_eq!(chain.len(), 3);
                assert_eq!(chain[0], chain[2]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_include_file_missing() {
        let err = resolver()
            .resolve("{{ include_file('/no/such/file.yml') }}")
            .unwrap_err();
        assert!(matches!(err, ResolveError::Source(SourceError::Read { .. })));
    }

    #[test]
    fn test_resolve_file_missing() {
        let err = resolver().resolve_file("/no/such/taskmill.yml").unwrap_err();
        assert!(matches!(err, ResolveError::Read { .. }));
    }

    #[test]
    fn test_include_trail() {
        let trail = IncludeTrail::starting_at("a");
        let nested = trail.enter("b").unwrap();
        assert_eq!(nested.entries(), ["a", "b"]);
        assert!(matches!(
            nested.enter("a"),
            Err(ResolveError::IncludeCycle { chain }) if chain == vec!["a", "b", "a"]
        ));
    }

    #[test]
    fn test_include_file_from_url() {
        let url = serve_text(
            |_| "vars:\n  remote: from-url\n---\nfetch:\n  script: ['echo {{ Vars.remote }}']\n".to_string(),
            1,
        );
        let source = format!(
            "vars:\n  name: root\n---\n{{{{ include_file('{}') }}}}build:\n  script: ['echo {{{{ Vars.remote }}}}']\n",
            url
        );

        let resolved = resolver().resolve(&source).unwrap();
        assert!(resolved.commands.contains("fetch:\n  script: ['echo from-url']\n"));
        assert!(resolved.commands.contains("build:\n  script: ['echo from-url']\n"));
        assert_eq!(resolved.variables["remote"], string("from-url"));
    }

    #[test]
    fn test_include_url_cycle() {
        let url = serve_text(|url| format!("{{{{ include_file('{}') }}}}", url), 2);

        let err = resolver()
            .resolve(&format!("{{{{ include_file('{}') }}}}", url))
            .unwrap_err();
        match err {
            ResolveError::IncludeCycle { chain } => assert_eq!(chain, vec![url.clone(), url]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
