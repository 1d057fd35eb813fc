//! Serde data model shared across the pipeline stages.
//!
//! Everything that lands on disk (artifacts, fixtures, manifest, report)
//! is defined here so the wire shape stays in one place. Mappings are
//! `BTreeMap` so serialized output is deterministic.
use crate::util::scenario_slug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where a discovered option token came from.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OptionSource {
    Man,
    Help,
}

impl OptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionSource::Man => "man",
            OptionSource::Help => "help",
        }
    }
}

/// One discovered command switch. Immutable once created; `default_value`
/// is attached only during enrichment.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CommandOption {
    pub token: String,
    pub description: String,
    pub requires_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub source: OptionSource,
}

/// Complexity bucket controlling how many/which option combinations are
/// generated. Also the scenario-id prefix.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Tier0,
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Tier0 => "tier0",
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
            Tier::Tier3 => "tier3",
            Tier::Tier4 => "tier4",
        }
    }

    pub fn parse(value: &str) -> Option<Tier> {
        match value {
            "tier0" => Some(Tier::Tier0),
            "tier1" => Some(Tier::Tier1),
            "tier2" => Some(Tier::Tier2),
            "tier3" => Some(Tier::Tier3),
            "tier4" => Some(Tier::Tier4),
            _ => None,
        }
    }
}

/// A single candidate switch-set, not yet bound to positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationCase {
    pub options: Vec<String>,
    pub tier: Tier,
}

/// Fully resolved invocation, ready to execute.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command: String,
    pub options: Vec<String>,
    pub args: Vec<String>,
    pub tier: Tier,
    pub scenario_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl CommandInvocation {
    /// Builds an invocation with its content-addressed scenario id.
    /// Identical (command, options, args) always yields the identical id.
    pub fn new(
        command: &str,
        options: Vec<String>,
        args: Vec<String>,
        tier: Tier,
        metadata: BTreeMap<String, String>,
    ) -> CommandInvocation {
        let slug = scenario_slug(command, &options, &args);
        CommandInvocation {
            command: command.to_string(),
            options,
            args,
            tier,
            scenario_id: format!("{}_{}", tier.as_str(), slug),
            metadata,
        }
    }
}

/// Captured outcome of one sandboxed execution. Never mutated after
/// creation.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u128,
    pub full_command: String,
    pub environment: String,
}

/// Execution-environment descriptor, loaded once per run and shared
/// read-only for the run's lifetime.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExecutionEnvironment {
    pub name: String,
    pub image_tag: String,
    pub dockerfile_path: PathBuf,
    pub run_workdir: String,
    pub locale: String,
    pub timeout_seconds: u64,
}

/// Persisted per-scenario fixture file.
#[derive(Debug, Deserialize, Serialize)]
pub struct Fixture {
    pub command: String,
    pub tier: Tier,
    pub scenario_id: String,
    pub options: Vec<String>,
    pub args: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub environment: String,
    pub full_command: String,
    pub result: FixtureResult,
    pub generated_at: String,
}

/// Result block inside a fixture file.
#[derive(Debug, Deserialize, Serialize)]
pub struct FixtureResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u128,
}

/// One manifest entry; the manifest is unique by `scenario_id`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ManifestEntry {
    pub command: String,
    pub scenario_id: String,
    pub tier: Tier,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_source: Option<String>,
}

/// Per-command section of the final pipeline report.
#[derive(Debug, Deserialize, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub option_source: String,
    pub image_tag: String,
    pub planned: TierTotals,
    pub executed: TierTotals,
    pub exit_codes: BTreeMap<i32, usize>,
    pub success_rate: f64,
    pub unique_stdout: usize,
    pub stdout_top: Vec<StdoutDigest>,
}

/// Scenario counts, total plus per tier.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct TierTotals {
    pub total: usize,
    pub by_tier: BTreeMap<Tier, usize>,
}

/// Frequency entry for one distinct stdout payload.
#[derive(Debug, Deserialize, Serialize)]
pub struct StdoutDigest {
    pub hash: String,
    pub count: usize,
    pub length: usize,
}

/// Final pipeline report (`_artifacts/report.json`).
#[derive(Debug, Deserialize, Serialize)]
pub struct PipelineReport {
    pub image_tag: String,
    pub generated_at: String,
    pub commands: Vec<CommandReport>,
}
