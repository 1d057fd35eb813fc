//! CLI argument parsing for the fixture generator.
//!
//! The CLI is intentionally thin: it resolves paths and tier names, then
//! hands a `RunOptions` to the pipeline.
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fixgen",
    version,
    about = "Generate reference coreutils command fixtures inside Docker",
    after_help = "Examples:\n  fixgen --commands ls cat --tiers tier0 tier1\n  fixgen --tiers tier0 tier2 --allowlist-tier2 --limit 50\n  fixgen --stage plan --dry-run\n  fixgen --clean --rebuild-image"
)]
pub struct Args {
    /// Commands to generate (default: all from commands.json)
    #[arg(long, num_args = 0.., value_name = "CMD")]
    pub commands: Vec<String>,

    /// Active tiers (default: tier0 tier1)
    #[arg(long, num_args = 0.., value_name = "TIER", default_values_t = [String::from("tier0"), String::from("tier1")])]
    pub tiers: Vec<String>,

    /// Force Docker image rebuild before execution
    #[arg(long)]
    pub rebuild_image: bool,

    /// Plan scenarios without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Global per-command scenario limit (0 = no limit)
    #[arg(long, default_value_t = 0, value_name = "N")]
    pub limit: usize,

    /// Stop after the named pipeline stage
    #[arg(long, value_enum, default_value_t = StageArg::Run)]
    pub stage: StageArg,

    /// Custom artifact directory (defaults to the fixture root)
    #[arg(long, value_name = "DIR")]
    pub artifact_dir: Option<PathBuf>,

    /// Safely clean fixtures (_artifacts/_logs/manifest/command dirs) before the run
    #[arg(long)]
    pub clean: bool,

    /// Generate tier2 only for commands that define allowed_options
    #[arg(long)]
    pub allowlist_tier2: bool,

    /// Project root holding config/ and the fixture tree (default: cwd)
    #[arg(long, value_name = "DIR")]
    pub project_root: Option<PathBuf>,
}

/// CLI spelling of the pipeline stage selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum StageArg {
    Parse,
    Enrich,
    Plan,
    Run,
}
