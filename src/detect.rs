use crate::{asset_id::IdMapper, manifest::Manifest};
use anyhow::Context;
use fs_err as fs;
use std::path::{Path, PathBuf};

/// Result of asking whether a file has to go through the optimizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    /// Unknown or changed content; carries the canonical path and asset id.
    Stale { path: PathBuf, id: String },
    /// The file hash matches the manifest entry.
    UpToDate { path: PathBuf, id: String },
    /// The path does not sit under the asset marker directory.
    UnknownPath(PathBuf),
    NotPng(PathBuf),
}

impl UpdateCheck {
    pub fn needs_update(&self) -> bool {
        matches!(self, UpdateCheck::Stale { .. })
    }
}

pub struct ChangeDetector<'a> {
    ids: &'a IdMapper,
    manifest: &'a Manifest,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(ids: &'a IdMapper, manifest: &'a Manifest) -> Self {
        Self { ids, manifest }
    }

    pub fn check(&self, path: &Path) -> anyhow::Result<UpdateCheck> {
        let path = fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve path: {}", path.display()))?;

        if !is_png(&path) {
            return Ok(UpdateCheck::NotPng(path));
        }

        let Some(id) = self.ids.id_for(&path) else {
            return Ok(UpdateCheck::UnknownPath(path));
        };

        if let Some(recorded) = self.manifest.get(&id) {
            let current = crate::manifest::hash_file(&path)
                .with_context(|| format!("Failed to hash {}", path.display()))?;
            if current == recorded {
                return Ok(UpdateCheck::UpToDate { path, id });
            }
        }

        Ok(UpdateCheck::Stale { path, id })
    }
}

pub fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}
