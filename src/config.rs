use anyhow::Context;
use clap::ValueEnum;
use fs_err as fs;
use globset::{Glob, GlobSet, GlobSetBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, JsonSchema)]
#[serde(default)]
#[schemars(description = "pngsweep configuration file")]
pub struct Config {
    #[schemars(
        description = "Manifest recording the SHA-256 of every optimized asset (default: optimize_templates.json)"
    )]
    pub manifest: PathBuf,

    #[schemars(description = "Files or directories processed when no --path is given (default: [\"docs\"])")]
    pub paths: Vec<PathBuf>,

    #[schemars(description = "How asset identifiers are derived from file paths")]
    pub layout: Layout,

    #[schemars(description = "Optimizer pipeline to run on changed files (default: oxipng)")]
    pub strategy: StrategyKind,

    #[schemars(description = "External optimizer binaries")]
    pub tools: Tools,

    #[schemars(description = "Glob patterns of files that are never processed")]
    pub exclude: Vec<String>,

    #[serde(skip)]
    #[schemars(skip)]
    root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("optimize_templates.json"),
            paths: vec![PathBuf::from("docs")],
            layout: Layout::default(),
            strategy: StrategyKind::default(),
            tools: Tools::default(),
            exclude: Vec::new(),
            root: PathBuf::from("."),
        }
    }
}

pub const CONFIG_FILES: &[&str] = &[
    "pngsweep.json",
    "pngsweep.json5",
    "pngsweep.jsonc",
    "pngsweep.toml",
];

impl Config {
    /// Reads the first config file found in the working directory, falling
    /// back to defaults when there is none.
    pub fn read() -> anyhow::Result<Config> {
        for &file_name in CONFIG_FILES {
            if fs::metadata(file_name).is_ok() {
                return Self::load(Path::new(file_name));
            }
        }

        log::debug!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    pub fn read_from(path: Option<&Path>) -> anyhow::Result<Config> {
        match path {
            Some(path) => Self::load(path),
            None => Self::read(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(path, &content)?;
        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        config.root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn parse(path: &Path, content: &str) -> anyhow::Result<Config> {
        let display = path.display();
        let config = match path.extension().and_then(|s| s.to_str()) {
            // Lenient JSON: trailing commas and comments are allowed
            Some("json") | Some("jsonc") => {
                let clean_json = fjson::to_json(content)
                    .with_context(|| format!("Failed to parse JSON config file: {display}"))?;
                serde_json::from_str::<Config>(&clean_json)
                    .with_context(|| format!("Failed to deserialize JSON config: {display}"))?
            }
            Some("json5") => json5::from_str::<Config>(content)
                .with_context(|| format!("Failed to parse JSON5 config file: {display}"))?,
            Some("toml") => toml::from_str::<Config>(content)
                .with_context(|| format!("Failed to parse TOML config file: {display}"))?,
            _ => anyhow::bail!("Unsupported config file format: {display}"),
        };

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        crate::asset_id::IdMapper::new(&self.layout).with_context(|| {
            format!(
                "Invalid layout.marker '{}'. It must name the directory that holds the image assets.",
                self.layout.marker
            )
        })?;
        self.exclude_set()?;
        Ok(())
    }

    pub fn exclude_set(&self) -> anyhow::Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            let glob = Glob::new(pattern)
                .with_context(|| format!("Invalid exclude pattern '{pattern}'"))?;
            builder.add(glob);
        }
        builder.build().context("Failed to build exclude patterns")
    }

    /// Directory holding the config file, or the working directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a configured path against the directory holding the config file.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.resolve(&self.manifest)
    }

    pub fn default_paths(&self) -> Vec<PathBuf> {
        self.paths.iter().map(|p| self.resolve(p)).collect()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, JsonSchema)]
#[serde(default)]
#[schemars(description = "Directory layout of the documentation assets")]
pub struct Layout {
    #[schemars(
        description = "Path segment that precedes every asset (default: docs/.vuepress/public/images)"
    )]
    pub marker: String,
    #[schemars(description = "Prefix prepended to the identifier (default: docs)")]
    pub prefix: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            marker: "docs/.vuepress/public/images".to_string(),
            prefix: "docs".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, ValueEnum, JsonSchema)]
#[serde(rename_all = "snake_case")]
#[schemars(description = "Optimizer pipeline")]
pub enum StrategyKind {
    #[schemars(description = "Strip ancillary chunks, then run optipng once at maximum effort")]
    Optipng,
    #[default]
    #[schemars(description = "Run oxipng twice (fast, then thorough) and verify pixels")]
    Oxipng,
    #[schemars(description = "Run the bundled oxipng library in-process and verify pixels")]
    Builtin,
}

#[derive(Debug, Deserialize, Serialize, Clone, JsonSchema)]
#[serde(default)]
#[schemars(description = "External optimizer binaries, as names on PATH or explicit paths")]
pub struct Tools {
    #[schemars(description = "optipng binary (default: optipng)")]
    pub optipng: PathBuf,
    #[schemars(description = "oxipng binary (default: oxipng)")]
    pub oxipng: PathBuf,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            optipng: PathBuf::from("optipng"),
            oxipng: PathBuf::from("oxipng"),
        }
    }
}
