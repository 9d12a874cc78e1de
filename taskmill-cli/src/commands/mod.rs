pub mod init;
pub mod list;
pub mod run;
pub mod vars;

pub use run::{RunArgs, Target};

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::Result;

use taskmill_service::macros::{IncludeMacro, ShellMacro};
use taskmill_service::{
    ConfigResolver, EnvSnapshot, MacroRegistry, ResolveOptions, Taskfile, Variables,
    DEFAULT_EXECUTOR,
};

pub const DEFAULT_TASKFILE: &str = "taskmill.yml";

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the taskfile
    #[arg(
        short = 'f',
        long = "makefile",
        env = "TASKMILL_MAKEFILE",
        default_value = DEFAULT_TASKFILE,
        global = true
    )]
    pub makefile: PathBuf,

    /// Shell used to run scripts and template shell calls
    #[arg(
        long = "executer",
        visible_alias = "sh",
        env = "TASKMILL_EXECUTER",
        default_value = DEFAULT_EXECUTOR,
        global = true
    )]
    pub executer: PathBuf,

    /// Container runtime for operations that declare an image
    #[arg(
        long,
        env = "TASKMILL_CONTAINER_RUNTIME",
        default_value = "docker",
        global = true
    )]
    pub container_runtime: String,
}

/// Macro registry whose shell macro uses the configured executer
pub fn macro_registry(global: &GlobalArgs) -> Result<MacroRegistry> {
    let mut registry = MacroRegistry::new();
    registry.register(IncludeMacro)?;
    registry.register(ShellMacro::new(&global.executer))?;
    Ok(registry)
}

pub fn config_resolver(
    global: &GlobalArgs,
    overrides: Variables,
    options: ResolveOptions,
) -> Result<ConfigResolver> {
    let resolver = ConfigResolver::new(Arc::new(macro_registry(global)?), EnvSnapshot::capture())
        .with_overrides(overrides)
        .with_options(options);
    Ok(resolver)
}

/// Load the taskfile named by the global options
pub fn load_taskfile(global: &GlobalArgs, resolver: &ConfigResolver) -> Result<Taskfile> {
    if !global.makefile.exists() {
        color_eyre::eyre::bail!("Taskfile not found: {}", global.makefile.display());
    }
    tracing::debug!(path = %global.makefile.display(), "loading taskfile");
    Ok(Taskfile::load(&global.makefile, resolver)?)
}
