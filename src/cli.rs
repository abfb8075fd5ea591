use crate::config::StrategyKind;
use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub optimize: OptimizeArgs,

    /// More detailed logs (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the files that would be optimized, without touching them
    List(InputArgs),

    /// Validate the configuration file
    Check(ConfigArgs),

    /// Write the JSON schema of the configuration file
    GenerateSchema(GenerateSchemaArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Clone, Default)]
pub struct ConfigArgs {
    /// Configuration file (default: pngsweep.{json,json5,jsonc,toml} in the working directory)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Clone, Default)]
pub struct InputArgs {
    /// PNG files or directories to process (default: the configured paths)
    #[arg(short = 'p', long = "path", num_args = 1..)]
    pub paths: Vec<PathBuf>,

    /// Manifest of already optimized files (overrides the configuration)
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Args, Clone, Default)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Hide per-file logs and show a progress bar instead
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Optimizer pipeline (overrides the configuration)
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyKind>,

    /// optipng binary
    #[arg(long, env = "PNGSWEEP_OPTIPNG")]
    pub optipng: Option<PathBuf>,

    /// oxipng binary
    #[arg(long, env = "PNGSWEEP_OXIPNG")]
    pub oxipng: Option<PathBuf>,
}

#[derive(Args)]
pub struct GenerateSchemaArgs {
    /// Output file path
    #[arg(long, short, default_value = "pngsweep.schema.json")]
    pub output: String,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
