use anyhow::Context;
use fs_err as fs;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use sha2::{Digest, Sha256};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Asset id to the SHA-256 of the bytes last written by an optimizer.
pub type Digests = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    path: PathBuf,
    entries: Digests,
}

impl Manifest {
    /// Loads the manifest at `path`. A missing file is an empty manifest.
    pub fn load(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();

        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse manifest: {}", path.display()))?
        } else {
            log::debug!("No manifest at {}, starting empty", path.display());
            Digests::new()
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(&mut self, id: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(id.into(), digest.into());
    }

    /// Writes the whole manifest, replacing the previous file via rename so a
    /// crash mid-write never leaves a truncated manifest behind.
    pub fn save(&self) -> anyhow::Result<()> {
        let mut buffer = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
        self.entries
            .serialize(&mut serializer)
            .context("Failed to serialize manifest")?;
        buffer.push(b'\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &buffer)
            .with_context(|| format!("Failed to write manifest: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!(
                "Failed to move manifest into place ({} -> {})",
                tmp.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn hash_file(path: &Path) -> std::io::Result<String> {
    Ok(sha256_hex(&fs::read(path)?))
}
