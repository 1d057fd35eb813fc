use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use coreutils_fixgen::cli::{Args, StageArg};
use coreutils_fixgen::pipeline::{Pipeline, RunOptions, Stage};
use coreutils_fixgen::schema::Tier;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let project_root = match &args.project_root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("resolve current directory")?,
    };

    let tiers = args
        .tiers
        .iter()
        .map(|name| {
            Tier::parse(name).ok_or_else(|| anyhow!("unknown tier {name:?} (expected tier0..tier4)"))
        })
        .collect::<Result<Vec<Tier>>>()?;

    let options = RunOptions {
        commands: args.commands.clone(),
        tiers,
        limit: (args.limit > 0).then_some(args.limit),
        stage: match args.stage {
            StageArg::Parse => Stage::Parse,
            StageArg::Enrich => Stage::Enrich,
            StageArg::Plan => Stage::Plan,
            StageArg::Run => Stage::Run,
        },
        dry_run: args.dry_run,
        rebuild_image: args.rebuild_image,
        clean: args.clean,
        allowlist_tier2_only: args.allowlist_tier2,
    };

    let pipeline = Pipeline::new(&project_root, args.artifact_dir.as_deref())?;
    pipeline.run(&options)
}
