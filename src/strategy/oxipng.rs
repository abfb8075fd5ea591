use super::{Strategy, run_tool};
use crate::pipeline::OptimizeError;
use std::{
    path::{Path, PathBuf},
    process::ExitStatus,
};

/// Fast exhaustive pass with zopfli, then a regular level 2 pass. Both strip
/// safe-to-remove metadata.
const PASSES: [&[&str]; 2] = [&["-o", "max", "--fast", "-Z", "-s"], &["-o", "2", "-s"]];

/// Two oxipng passes. The result is checked pixel by pixel afterwards.
pub struct Oxipng {
    binary: PathBuf,
    quiet: bool,
}

impl Oxipng {
    pub fn new(binary: PathBuf, quiet: bool) -> Self {
        Self { binary, quiet }
    }

    fn passes(&self) -> Vec<Vec<&'static str>> {
        PASSES
            .iter()
            .map(|pass| {
                let mut args = pass.to_vec();
                if self.quiet {
                    args.push("-q");
                }
                args
            })
            .collect()
    }
}

impl Strategy for Oxipng {
    fn name(&self) -> &'static str {
        "oxipng"
    }

    fn verifies_pixels(&self) -> bool {
        true
    }

    fn optimize(&self, path: &Path) -> Result<Option<ExitStatus>, OptimizeError> {
        let mut last = None;
        for args in self.passes() {
            last = Some(run_tool(&self.binary, &args, path, self.quiet)?);
        }
        Ok(last)
    }
}
