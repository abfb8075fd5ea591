use crate::detect::{ChangeDetector, UpdateCheck};
use globset::GlobSet;
use log::{info, trace, warn};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// A file that has to go through the optimizer.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub id: String,
    pub size: u64,
}

#[derive(Debug, Default)]
pub struct Collected {
    pub stale: Vec<Candidate>,
    pub up_to_date: usize,
    pub unknown: usize,
    pub excluded: usize,
}

impl Collected {
    pub fn total_bytes(&self) -> u64 {
        self.stale.iter().map(|c| c.size).sum()
    }
}

/// Exclude globs, matched against the canonical path relative to the
/// project root and against the canonical absolute path.
pub struct Exclusions {
    set: GlobSet,
    root: PathBuf,
}

impl Exclusions {
    pub fn new(set: GlobSet, root: &Path) -> Self {
        let root = fs_err::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        Self { set, root }
    }

    pub fn is_match(&self, path: &Path) -> bool {
        if self.set.is_empty() {
            return false;
        }

        let path = fs_err::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        path.strip_prefix(&self.root)
            .is_ok_and(|relative| self.set.is_match(relative))
            || self.set.is_match(&path)
    }
}

/// Walks `inputs` and keeps the PNGs whose content differs from the manifest.
pub fn collect(
    inputs: &[PathBuf],
    detector: &ChangeDetector,
    exclude: &Exclusions,
    quiet: bool,
) -> Collected {
    let mut collected = Collected::default();
    let mut seen = HashSet::new();

    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() {
                    consider(
                        entry.path(),
                        false,
                        detector,
                        exclude,
                        quiet,
                        &mut seen,
                        &mut collected,
                    );
                }
            }
        } else if input.is_file() {
            consider(input, true, detector, exclude, quiet, &mut seen, &mut collected);
        } else {
            warn!("Path does not exist: {}", input.display());
        }
    }

    collected
}

fn consider(
    path: &Path,
    explicit: bool,
    detector: &ChangeDetector,
    exclude: &Exclusions,
    quiet: bool,
    seen: &mut HashSet<PathBuf>,
    collected: &mut Collected,
) {
    if exclude.is_match(path) {
        trace!("Excluded {}", path.display());
        collected.excluded += 1;
        return;
    }

    let check = match detector.check(path) {
        Ok(check) => check,
        Err(err) => {
            warn!("Skipping {}: {err:#}", path.display());
            return;
        }
    };

    trace!("{check:?} (needs update: {})", check.needs_update());

    match check {
        UpdateCheck::Stale { path, id } => {
            if !seen.insert(path.clone()) {
                return;
            }
            let size = match fs_err::metadata(&path) {
                Ok(metadata) => metadata.len(),
                Err(err) => {
                    warn!("Skipping {}: {err}", path.display());
                    return;
                }
            };
            collected.stale.push(Candidate { path, id, size });
        }
        UpdateCheck::UpToDate { path, id } => {
            if seen.insert(path.clone()) {
                if !quiet {
                    info!("skip {} ({id} is already optimized)", path.display());
                }
                collected.up_to_date += 1;
            }
        }
        UpdateCheck::UnknownPath(path) => {
            if seen.insert(path.clone()) {
                warn!("Unknown file path {}", path.display());
                collected.unknown += 1;
            }
        }
        UpdateCheck::NotPng(path) => {
            if explicit {
                warn!("Not a PNG file: {}", path.display());
            }
        }
    }
}
