use crate::{
    config::{StrategyKind, Tools},
    pipeline::OptimizeError,
};
use std::{
    path::Path,
    process::{Command, ExitStatus, Stdio},
};

mod builtin;
mod optipng;
mod oxipng;

pub use self::builtin::Builtin;
pub use self::optipng::Optipng;
pub use self::oxipng::Oxipng;

/// One way of shrinking a PNG in place.
///
/// The pipeline handles the shared contract around `optimize`: chunk
/// stripping when [`Strategy::strips_chunks`] is set, pixel verification when
/// [`Strategy::verifies_pixels`] is set, and measuring the result.
pub trait Strategy {
    fn name(&self) -> &'static str;

    fn strips_chunks(&self) -> bool {
        false
    }

    fn verifies_pixels(&self) -> bool {
        false
    }

    /// Rewrites the file. Returns the exit status of the last external
    /// command, if any ran.
    fn optimize(&self, path: &Path) -> Result<Option<ExitStatus>, OptimizeError>;
}

pub fn from_kind(kind: StrategyKind, tools: &Tools, quiet: bool) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::Optipng => Box::new(Optipng::new(tools.optipng.clone(), quiet)),
        StrategyKind::Oxipng => Box::new(Oxipng::new(tools.oxipng.clone(), quiet)),
        StrategyKind::Builtin => Box::new(Builtin::default()),
    }
}

/// Runs `program args... file` to completion. Nonzero exits are errors.
pub(crate) fn run_tool(
    program: &Path,
    args: &[&str],
    file: &Path,
    quiet: bool,
) -> Result<ExitStatus, OptimizeError> {
    let mut command = Command::new(program);
    command.args(args).arg(file).stdin(Stdio::null());

    if quiet {
        command.stdout(Stdio::null()).stderr(Stdio::piped());
    } else {
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }

    log::debug!("Running {command:?}");

    let output = command.output().map_err(|source| OptimizeError::Spawn {
        program: program.display().to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(OptimizeError::ToolFailed {
            program: program.display().to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.status)
}
