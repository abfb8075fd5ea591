use crate::{
    asset_id::IdMapper,
    cli::{InputArgs, OptimizeArgs},
    config::Config,
    detect::ChangeDetector,
    manifest::Manifest,
    pipeline::Pipeline,
    progress_bar::ProgressBar,
    strategy,
    util::size::format_size,
};
use anyhow::Context;
use indicatif::MultiProgress;
use log::{debug, info};
use owo_colors::OwoColorize;
use std::path::PathBuf;

mod collect;
mod process;

use collect::{Collected, Exclusions, collect};
use process::process;

/// Everything a run needs before touching any file.
struct Workspace {
    config: Config,
    manifest: Manifest,
    ids: IdMapper,
    exclude: Exclusions,
    inputs: Vec<PathBuf>,
}

impl Workspace {
    fn open(args: &InputArgs) -> anyhow::Result<Self> {
        let config = Config::read_from(args.config.config.as_deref())
            .context("Failed to read configuration file")?;
        let ids = IdMapper::new(&config.layout)?;
        let exclude = Exclusions::new(config.exclude_set()?, config.root());

        let manifest_path = args
            .manifest
            .clone()
            .unwrap_or_else(|| config.manifest_path());
        let manifest = Manifest::load(manifest_path)?;
        if manifest.is_empty() {
            info!(
                "Manifest {} has no entries, every asset will be optimized",
                manifest.path().display()
            );
        } else {
            debug!(
                "Loaded {} manifest entries from {}",
                manifest.len(),
                manifest.path().display()
            );
        }

        let inputs = if args.paths.is_empty() {
            let defaults = config.default_paths();
            info!(
                "No path specified, using default paths: {}",
                defaults
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            defaults
        } else {
            args.paths.clone()
        };

        Ok(Self {
            config,
            manifest,
            ids,
            exclude,
            inputs,
        })
    }

    fn collect(&self, quiet: bool) -> Collected {
        let detector = ChangeDetector::new(&self.ids, &self.manifest);
        collect(&self.inputs, &detector, &self.exclude, quiet)
    }
}

pub fn optimize(multi_progress: MultiProgress, args: OptimizeArgs) -> anyhow::Result<()> {
    let mut workspace = Workspace::open(&args.input)?;

    let mut tools = workspace.config.tools.clone();
    if let Some(optipng) = args.optipng {
        tools.optipng = optipng;
    }
    if let Some(oxipng) = args.oxipng {
        tools.oxipng = oxipng;
    }
    let kind = args.strategy.unwrap_or(workspace.config.strategy);
    let pipeline = Pipeline::new(strategy::from_kind(kind, &tools, args.quiet));

    let collected = workspace.collect(args.quiet);
    info!(
        "{} files to optimize with {} ({} already optimized, {} unrecognized)",
        collected.stale.len(),
        pipeline.strategy_name(),
        collected.up_to_date,
        collected.unknown
    );

    let pb = if args.quiet {
        ProgressBar::new(multi_progress, "Optimizing", collected.total_bytes())
    } else {
        ProgressBar::hidden()
    };

    let summary = process(
        &collected.stale,
        &pipeline,
        &mut workspace.manifest,
        &pb,
        args.quiet,
    )?;

    info!(
        "{} {} optimized, {} failed, {} saved",
        "✓".green(),
        summary.processed,
        summary.failed,
        format_size(summary.bytes_saved).bold()
    );

    Ok(())
}

pub fn list(args: InputArgs) -> anyhow::Result<()> {
    let workspace = Workspace::open(&args)?;
    let collected = workspace.collect(true);

    println!("Files that would be optimized:\n");
    for candidate in &collected.stale {
        println!("  - {} ({})", candidate.path.display(), candidate.id);
    }

    println!(
        "\n  Total: {} files, {}",
        collected.stale.len(),
        format_size(collected.total_bytes() as i64)
    );
    println!(
        "  Skipped: {} already optimized, {} unrecognized, {} excluded",
        collected.up_to_date, collected.unknown, collected.excluded
    );

    Ok(())
}
