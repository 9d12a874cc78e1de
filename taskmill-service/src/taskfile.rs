// Taskfile
// A resolved taskfile: its variables, operations and the ways to run or show them

use crate::error::{ServiceError, ServiceResult};
use crate::execution::stage::resolve_stage;
use crate::execution::{OperationExecutor, ProgressSender, StageReport, StageScheduler};
use crate::parser::models::{OperationStore, ResolvedOperation};
use crate::parser::ScriptResolver;
use crate::resolver::{ConfigResolver, ResolvedConfig};
use crate::template::Variables;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Taskfile {
    variables: Variables,
    store: OperationStore,
    resolver: ScriptResolver,
}

impl Taskfile {
    /// Read, render and parse the taskfile at `path`
    pub fn load(path: impl AsRef<Path>, resolver: &ConfigResolver) -> ServiceResult<Self> {
        let resolved = resolver.resolve_file(path)?;
        Self::from_resolved(resolved, resolver)
    }

    pub fn from_source(source: &str, resolver: &ConfigResolver) -> ServiceResult<Self> {
        let resolved = resolver.resolve(source)?;
        Self::from_resolved(resolved, resolver)
    }

    fn from_resolved(resolved: ResolvedConfig, resolver: &ConfigResolver) -> ServiceResult<Self> {
        let store = OperationStore::from_yaml(&resolved.commands)?;
        tracing::debug!(operations = store.len(), "loaded taskfile");
        Ok(Self {
            variables: resolved.variables,
            store,
            resolver: resolver.script_resolver(),
        })
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn store(&self) -> &OperationStore {
        &self.store
    }

    pub fn operation_names(&self) -> Vec<String> {
        self.store.operation_names()
    }

    pub fn stages(&self) -> BTreeMap<String, Vec<String>> {
        self.store.stages()
    }

    pub fn resolve_operation(&self, name: &str) -> ServiceResult<ResolvedOperation> {
        Ok(self.resolver.resolve(name, &self.store)?)
    }

    /// YAML showing the variables and the named operations as they would run
    pub fn dry_run(&self, names: &[&str]) -> ServiceResult<String> {
        let operations = names
            .iter()
            .map(|name| Ok((name.to_string(), self.resolve_operation(name)?)))
            .collect::<ServiceResult<Vec<_>>>()?;
        self.render_dry_run(operations)
    }

    /// Dry run of every member of `stage`
    pub fn dry_run_stage(&self, stage: &str) -> ServiceResult<String> {
        let operations = resolve_stage(&self.resolver, stage, &self.store)?;
        self.render_dry_run(operations)
    }

    fn render_dry_run(&self, operations: Vec<(String, ResolvedOperation)>) -> ServiceResult<String> {
        let mut document = serde_yaml::Mapping::new();
        document.insert(
            serde_yaml::Value::from(crate::parser::VARS_KEY),
            serde_yaml::to_value(&self.variables)?,
        );
        for (name, operation) in operations {
            if name == crate::parser::VARS_KEY {
                return Err(ServiceError::ReservedName(name));
            }
            document.insert(serde_yaml::Value::from(name), serde_yaml::to_value(&operation)?);
        }
        Ok(serde_yaml::to_string(&document)?)
    }

    /// Run one operation, recovering with `on_failure` when the script fails
    pub async fn run(&self, name: &str, executor: &OperationExecutor) -> ServiceResult<()> {
        let operation = self.resolve_operation(name)?;
        executor.run_operation(name, &operation).await?;
        Ok(())
    }

    /// Run every member of `stage` concurrently
    pub async fn run_stage(
        &self,
        stage: &str,
        executor: Arc<OperationExecutor>,
        progress: Option<ProgressSender>,
    ) -> ServiceResult<StageReport> {
        let mut scheduler = StageScheduler::new(executor, self.resolver.clone());
        if let Some(tx) = progress {
            scheduler = scheduler.with_progress(tx);
        }
        Ok(scheduler.run_stage(stage, &self.store).await?)
    }
}
