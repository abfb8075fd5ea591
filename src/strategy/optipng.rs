use super::{Strategy, run_tool};
use crate::pipeline::OptimizeError;
use std::{
    path::{Path, PathBuf},
    process::ExitStatus,
};

/// Maximum effort: every filter/strategy combination at zlib levels 1 to 9,
/// with `-fix` so recoverable stream errors don't abort the run.
const ARGS: &[&str] = &["-o7", "-zm1-9", "-fix"];

/// Single optipng pass after ancillary chunks have been stripped.
///
/// optipng is lossless, so no pixel comparison is performed.
pub struct Optipng {
    binary: PathBuf,
    quiet: bool,
}

impl Optipng {
    pub fn new(binary: PathBuf, quiet: bool) -> Self {
        Self { binary, quiet }
    }

    fn args(&self) -> Vec<&'static str> {
        let mut args = Vec::with_capacity(ARGS.len() + 1);
        if self.quiet {
            args.push("-quiet");
        }
        args.extend_from_slice(ARGS);
        args
    }
}

impl Strategy for Optipng {
    fn name(&self) -> &'static str {
        "optipng"
    }

    fn strips_chunks(&self) -> bool {
        true
    }

    fn optimize(&self, path: &Path) -> Result<Option<ExitStatus>, OptimizeError> {
        run_tool(&self.binary, &self.args(), path, self.quiet).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let loud = Optipng::new(PathBuf::from("optipng"), false);
        assert_eq!(loud.args(), vec!["-o7", "-zm1-9", "-fix"]);

        let quiet = Optipng::new(PathBuf::from("optipng"), true);
        assert_eq!(quiet.args(), vec!["-quiet", "-o7", "-zm1-9", "-fix"]);
        assert!(quiet.strips_chunks());
        assert!(!quiet.verifies_pixels());
    }
}
