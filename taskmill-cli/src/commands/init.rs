use crate::commands::GlobalArgs;
use crate::output;

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};

use color_eyre::eyre::WrapErr;
use color_eyre::Result;

const STARTER_TASKFILE: &str = include_str!("../taskmill_init.yml");

/// Write the starter taskfile, refusing to replace an existing one
pub fn execute(global: &GlobalArgs) -> Result<()> {
    let path = &global.makefile;

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            color_eyre::eyre::bail!("{} already exists", path.display());
        }
        Err(e) => {
            return Err(e).wrap_err_with(|| format!("failed to create {}", path.display()));
        }
    };

    file.write_all(STARTER_TASKFILE.as_bytes())
        .wrap_err_with(|| format!("failed to write {}", path.display()))?;

    output::success(&format!("{} was created", path.display()));
    output::info("run it with: taskmill run run");
    Ok(())
}
