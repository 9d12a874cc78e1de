// Template scope
// Variables and environment exposed to templates as `Vars` and `Env`

use minijinja::value::{Enumerator, Object, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Resolved variables, sorted by name
pub type Variables = BTreeMap<String, serde_yaml::Value>;

/// Shared, mutable variable set. Files pulled in with `include_file` add to it while the
/// document that includes them is still rendering.
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    inner: Arc<Mutex<Variables>>,
}

impl VariableScope {
    pub fn new(variables: Variables) -> Self {
        Self {
            inner: Arc::new(Mutex::new(variables)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Variables> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current variables
    pub fn snapshot(&self) -> Variables {
        self.lock().clone()
    }

    pub fn get(&self, name: &str) -> Option<serde_yaml::Value> {
        self.lock().get(name).cloned()
    }

    /// Add every variable from `other` whose name is not yet in scope
    pub fn merge_missing(&self, other: Variables) {
        let mut vars = self.lock();
        for (name, value) in other {
            vars.entry(name).or_insert(value);
        }
    }

    /// Template view that reads through to the live variables
    pub fn as_value(&self) -> Value {
        Value::from_object(LiveVars {
            inner: self.inner.clone(),
        })
    }
}

#[derive(Debug)]
struct LiveVars {
    inner: Arc<Mutex<Variables>>,
}

impl Object for LiveVars {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let key = key.as_str()?;
        let vars = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        vars.get(key).map(Value::from_serialize)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        let vars = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Enumerator::Values(vars.keys().map(|k| Value::from(k.as_str())).collect())
    }
}

/// Process environment captured once, exposed as `Env`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Entries that are not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn as_value(&self) -> Value {
        Value::from_serialize(&self.vars)
    }
}
