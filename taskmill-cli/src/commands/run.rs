use crate::commands::vars::parse_overrides;
use crate::commands::{config_resolver, load_taskfile, GlobalArgs};
use crate::output;

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use color_eyre::Result;

use taskmill_service::{
    progress_channel, ContainerConfig, Deadline, ExecutionEvent, ExecutorConfig,
    OperationExecutor, Palette, PrefixWriter, ProgressReceiver, ResolveOptions, Taskfile,
};

/// Arguments of `run` and `srun`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Operation (run) or stage (srun) name
    pub target: String,

    /// Print the resolved variables and operations instead of running them
    #[arg(long, env = "TASKMILL_DRY_RUN")]
    pub dry_run: bool,

    /// Set a variable (can be repeated, format: key=value). `TASKMILL_VAR` takes
    /// space-separated pairs.
    #[arg(
        long = "var",
        short = 'v',
        value_name = "KEY=VALUE",
        env = "TASKMILL_VAR",
        value_delimiter = ' '
    )]
    pub variables: Vec<String>,

    /// Abort rendering and execution after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Operation,
    Stage,
}

pub async fn execute(global: &GlobalArgs, args: RunArgs, target: Target) -> Result<()> {
    let overrides = parse_overrides(&args.variables)?;
    let deadline = match args.timeout {
        Some(secs) => Deadline::after(Duration::from_secs(secs)),
        None => Deadline::none(),
    };

    let options = ResolveOptions {
        template_shell: global.executer.clone(),
        deadline,
    };
    let resolver = config_resolver(global, overrides, options)?;
    let taskfile = load_taskfile(global, &resolver)?;

    if args.dry_run {
        let yaml = match target {
            Target::Operation => taskfile.dry_run(&[args.target.as_str()])?,
            Target::Stage => taskfile.dry_run_stage(&args.target)?,
        };
        print!("{}", yaml);
        return Ok(());
    }

    let container = ContainerConfig {
        runtime: global.container_runtime.clone(),
        tty: std::io::stdin().is_terminal(),
        ..ContainerConfig::default()
    };
    let config = ExecutorConfig::default()
        .with_executor(&global.executer)
        .with_container(container)
        .with_deadline(deadline);

    match target {
        Target::Operation => {
            let executor = OperationExecutor::new(config);
            taskfile.run(&args.target, &executor).await?;
            Ok(())
        }
        Target::Stage => run_stage(taskfile, args.target, config).await,
    }
}

async fn run_stage(taskfile: Taskfile, stage: String, config: ExecutorConfig) -> Result<()> {
    let palette = if std::io::stdout().is_terminal() {
        Palette::ansi()
    } else {
        Palette::plain()
    };
    let writers: BTreeMap<String, PrefixWriter> = taskfile
        .store()
        .iter()
        .map(|(name, operation)| {
            (
                name.to_string(),
                PrefixWriter::new(name, operation.color, palette.clone()),
            )
        })
        .collect();

    let (tx, rx) = progress_channel();
    let executor = Arc::new(OperationExecutor::new(config).with_progress(tx.clone()));

    // Spawn execution in background
    let taskfile = Arc::new(taskfile);
    let exec_handle =
        tokio::spawn(async move { taskfile.run_stage(&stage, executor, Some(tx)).await });

    // Process events in the foreground
    render_events(rx, &writers).await;

    let report = exec_handle.await??;
    tracing::debug!(stage = %report.stage, members = report.outcomes.len(), "stage succeeded");
    Ok(())
}

async fn render_events(mut rx: ProgressReceiver, writers: &BTreeMap<String, PrefixWriter>) {
    while let Some(event) = rx.recv().await {
        match &event {
            ExecutionEvent::StageStarted { stage, members } => {
                output::stage_header(stage, members.len());
            }

            ExecutionEvent::OperationStarted { operation, .. } => {
                output::status("Running", operation);
            }

            ExecutionEvent::OperationOutput {
                operation,
                line,
                is_error,
            } => {
                let rendered = match writers.get(operation) {
                    Some(writer) => writer.format_line(line),
                    None => format!("{}:\t{}", operation, line),
                };
                if *is_error {
                    eprintln!("{}", rendered);
                } else {
                    println!("{}", rendered);
                }
            }

            ExecutionEvent::RecoveryStarted { operation, error } => {
                output::warning(&format!(
                    "'{}' failed ({}), running on_failure",
                    operation, error
                ));
            }

            ExecutionEvent::RecoveryMissing { operation, error } => {
                output::warning(&format!(
                    "'{}' failed ({}) and declares no on_failure",
                    operation, error
                ));
            }

            ExecutionEvent::OperationCompleted {
                operation,
                success,
                duration,
            } => {
                let message = format!(
                    "  '{}' {} ({:.2}s)",
                    operation,
                    if *success { "OK" } else { "FAIL" },
                    duration.as_secs_f64()
                );
                if *success {
                    output::dim_success(&message);
                } else {
                    output::dim_failure(&message);
                }
            }

            ExecutionEvent::StageCompleted {
                stage,
                failed,
                duration,
            } => {
                if failed.is_empty() {
                    output::success(&format!(
                        "Stage '{}' completed in {:.2}s",
                        stage,
                        duration.as_secs_f64()
                    ));
                } else {
                    output::failure(&format!(
                        "Stage '{}' failed after {:.2}s: {}",
                        stage,
                        duration.as_secs_f64(),
                        failed.join(", ")
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_repeated_var_flags() {
        let args = Harness::try_parse_from(["taskmill", "build", "-v", "a=1", "--var", "b=x,y"])
            .unwrap()
            .run;
        assert_eq!(args.target, "build");
        assert_eq!(args.variables, vec!["a=1", "b=x,y"]);
        assert_eq!(args.timeout, None);
    }

    #[test]
    fn test_var_env_fallback() {
        std::env::set_var("TASKMILL_VAR", "a=1 list=x,y");
        let parsed = Harness::try_parse_from(["taskmill", "build"]);
        std::env::remove_var("TASKMILL_VAR");

        assert_eq!(parsed.unwrap().run.variables, vec!["a=1", "list=x,y"]);
    }
}
