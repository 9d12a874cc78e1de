use crate::commands::{config_resolver, load_taskfile, GlobalArgs};
use crate::output;

use color_eyre::Result;

use taskmill_service::{ResolveOptions, Variables};

/// Print operation names, then stages with their members
pub fn execute(global: &GlobalArgs) -> Result<()> {
    let options = ResolveOptions {
        template_shell: global.executer.clone(),
        ..ResolveOptions::default()
    };
    let resolver = config_resolver(global, Variables::new(), options)?;
    let taskfile = load_taskfile(global, &resolver)?;

    output::header("Operations (for run)");
    let names = taskfile.operation_names();
    if names.is_empty() {
        output::dim("  No operations declared");
    }
    for name in &names {
        println!("  {}", name);
    }

    println!();
    output::header("Stages (for srun)");
    let stages = taskfile.stages();
    if stages.is_empty() {
        output::dim("  No stages declared");
    }
    for (stage, members) in &stages {
        println!("  {}: {}", stage, members.join(", "));
    }

    Ok(())
}
