use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use config::Config;
use dotenvy::dotenv;
use indicatif::MultiProgress;
use log::LevelFilter;
use miette::{IntoDiagnostic, WrapErr};
use schemars::generate::SchemaSettings;

mod asset_id;
mod cli;
mod config;
mod detect;
mod manifest;
mod pipeline;
mod png;
mod progress_bar;
mod run;
mod strategy;
mod util;

fn main() -> miette::Result<()> {
    let _ = dotenv();

    let args = Cli::parse();

    let mut binding = env_logger::Builder::new();
    let logger = binding
        .filter_level(LevelFilter::Info)
        .filter_module("pngsweep", args.log_level_filter())
        .filter_module("oxipng", LevelFilter::Warn)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .build();

    let level = logger.filter();

    let multi_progress = MultiProgress::new();
    indicatif_log_bridge::LogWrapper::new(multi_progress.clone(), logger)
        .try_init()
        .into_diagnostic()
        .wrap_err("Failed to initialize logging")?;

    log::set_max_level(level);

    match args.command {
        None => run::optimize(multi_progress, args.optimize).map_err(|e| miette::miette!("{e:?}")),
        Some(Commands::List(args)) => run::list(args).map_err(|e| miette::miette!("{e:?}")),
        Some(Commands::Check(args)) => {
            check_config(args).map_err(|e| miette::miette!("{e:?}"))
        }
        Some(Commands::GenerateSchema(args)) => {
            generate_schema(args).map_err(|e| miette::miette!("{e:?}"))
        }
        Some(Commands::Completions(args)) => {
            generate_completions(args);
            Ok(())
        }
    }
}

fn generate_schema(args: cli::GenerateSchemaArgs) -> anyhow::Result<()> {
    use anyhow::Context;
    use fs_err as fs;
    use std::path::Path;

    let settings = SchemaSettings::draft07();
    let generator = settings.into_generator();
    let schema = generator.into_root_schema_for::<Config>();
    let schema_json =
        serde_json::to_string_pretty(&schema).context("Failed to serialize JSON schema")?;

    let output_path = Path::new(&args.output);
    if let Some(parent_dir) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent_dir)
            .with_context(|| format!("Failed to create directory: {}", parent_dir.display()))?;
    }

    fs::write(output_path, schema_json)
        .with_context(|| format!("Failed to write schema to: {}", output_path.display()))?;

    println!("Generated JSON schema at: {}", args.output);
    Ok(())
}

fn generate_completions(args: cli::CompletionsArgs) {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "pngsweep", &mut std::io::stdout());
}

fn check_config(args: cli::ConfigArgs) -> anyhow::Result<()> {
    use anyhow::Context;

    let config =
        Config::read_from(args.config.as_deref()).context("Failed to read configuration file")?;

    println!("✓ Configuration is valid");
    println!("  Strategy: {:?}", config.strategy);
    println!("  Manifest: {}", config.manifest_path().display());
    println!(
        "  Layout: {} -> {}/<id>",
        config.layout.marker, config.layout.prefix
    );
    println!("  Default paths:");
    for path in config.default_paths() {
        println!("    - {}", path.display());
    }

    Ok(())
}
