// Template engine
// minijinja environment configured for taskfile documents

use crate::parser::models::Color;
use crate::template::scope::{EnvSnapshot, VariableScope};

use minijinja::{context, AutoEscape, Environment, UndefinedBehavior, Value};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}").unwrap());

static DOT_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\{\s(,\[|!=<>+*/%~-])\.([A-Za-z_])").unwrap());

static STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#).unwrap());

/// Which of the two taskfile documents is being rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Variables,
    Commands,
}

impl DocumentKind {
    fn template_name(&self) -> &'static str {
        match self {
            DocumentKind::Variables => "variables",
            DocumentKind::Commands => "commands",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

/// Rewrite Go-style leading-dot references (`{{ .Vars.name }}`) to `{{ Vars.name }}`.
/// Only text inside `{{ }}` and `{% %}` tags is touched, string literals excluded.
pub fn normalize_dot_references(source: &str) -> Cow<'_, str> {
    TAG_RE.replace_all(source, |tag: &Captures<'_>| normalize_tag(&tag[0]))
}

fn normalize_tag(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut last = 0;
    for literal in STRING_RE.find_iter(tag) {
        out.push_str(&DOT_REF_RE.replace_all(&tag[last..literal.start()], "$1$2"));
        out.push_str(literal.as_str());
        last = literal.end();
    }
    out.push_str(&DOT_REF_RE.replace_all(&tag[last..], "$1$2"));
    out
}

/// One rendering environment: builtin filters plus the functions installed by the caller
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        Self { env }
    }

    pub fn add_function(&mut self, name: impl Into<String>, function: Value) {
        self.env.add_global(name.into(), function);
    }

    /// Render one document with `Vars`, `Env` and `Colors` in scope
    pub fn render(
        &self,
        kind: DocumentKind,
        source: &str,
        vars: &VariableScope,
        env: &EnvSnapshot,
    ) -> Result<String, minijinja::Error> {
        let source = normalize_dot_references(source);
        tracing::debug!(document = %kind, "rendering template");
        self.env.render_named_str(
            kind.template_name(),
            &source,
            context! {
                Vars => vars.as_value(),
                Env => env.as_value(),
                Colors => colors(),
            },
        )
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn colors() -> Value {
    let palette: BTreeMap<&str, &str> = Color::ALL
        .iter()
        .map(|c| (c.as_str(), c.as_str()))
        .collect();
    Value::from_serialize(&palette)
}
