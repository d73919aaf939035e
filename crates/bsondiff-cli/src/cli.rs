use std::path::PathBuf;

use bsondiff_core::IgnoreMode;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bsondiff",
    about = "Compute MongoDB $set/$unset update patches between documents",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute the update patch that turns LEFT into RIGHT
    Diff(DiffArgs),
    /// Apply an update patch to a document
    Apply(ApplyArgs),
}

#[derive(Args)]
pub struct DiffArgs {
    /// Original document (.bson or Extended JSON)
    pub left: PathBuf,
    /// Updated document (.bson or Extended JSON)
    pub right: PathBuf,
    /// Field to exclude from the comparison; repeatable
    #[arg(short, long = "ignore", value_name = "NAME")]
    pub ignore: Vec<String>,
    /// How --ignore entries are matched
    #[arg(long, value_enum)]
    pub ignore_mode: Option<IgnoreModeArg>,
    /// TOML file with `ignore` and `ignore_mode`
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Print canonical instead of relaxed Extended JSON
    #[arg(long)]
    pub canonical: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Document to update (.bson or Extended JSON)
    pub doc: PathBuf,
    /// Patch holding `$set` and `$unset` groups
    pub patch: PathBuf,
    /// Write the result here instead of stdout (.bson writes binary)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// Print canonical instead of relaxed Extended JSON
    #[arg(long)]
    pub canonical: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum IgnoreModeArg {
    /// Match field names at any depth
    Leaf,
    /// Match full dotted paths
    Path,
}

impl From<IgnoreModeArg> for IgnoreMode {
    fn from(arg: IgnoreModeArg) -> Self {
        match arg {
            IgnoreModeArg::Leaf => IgnoreMode::LeafName,
            IgnoreModeArg::Path => IgnoreMode::DottedPath,
        }
    }
}
