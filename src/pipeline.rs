//! Pipeline orchestrator: Parse -> Enrich -> Plan -> Run per command,
//! fail-soft throughout.
//!
//! Every stage writes its artifact before the next stage starts, empty
//! stage output skips the command, and only the cleanup safety check can
//! abort the whole run.
use crate::artifacts::ArtifactWriter;
use crate::config::{CommandProfile, ConfigLoader, OptionDefaults};
use crate::discover::{HelpDiscovery, ManDiscovery, OptionDiscovery};
use crate::enrich::enrich;
use crate::plan::{PlanSettings, ScenarioPlanner};
use crate::runner::DockerRunner;
use crate::schema::{
    CommandInvocation, CommandOption, CommandReport, OptionSource, PipelineReport, StdoutDigest,
    Tier, TierTotals,
};
use crate::store::OutputRepository;
use crate::util::{now_utc_rfc3339, sha256_hex};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

const RUN_PROGRESS_INTERVAL: usize = 20;
const STDOUT_TOP_COUNT: usize = 5;

/// Stage after which the per-command state machine stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Parse,
    Enrich,
    Plan,
    Run,
}

/// One run's worth of orchestration switches.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Command names to process; empty means every configured command.
    pub commands: Vec<String>,
    /// Requested tiers, later intersected with each command's enabled set.
    pub tiers: Vec<Tier>,
    /// Per-command scenario cap; None means unlimited.
    pub limit: Option<usize>,
    pub stage: Stage,
    pub dry_run: bool,
    pub rebuild_image: bool,
    pub clean: bool,
    pub allowlist_tier2_only: bool,
}

pub struct Pipeline {
    project_root: PathBuf,
    repository: OutputRepository,
    artifacts: ArtifactWriter,
    man: ManDiscovery,
    help: HelpDiscovery,
    option_defaults: OptionDefaults,
    planner: ScenarioPlanner,
    runner: DockerRunner,
    profiles: Vec<CommandProfile>,
}

impl Pipeline {
    pub fn new(project_root: &Path, artifact_dir: Option<&Path>) -> Result<Pipeline> {
        let loader = ConfigLoader::new(project_root);
        let env = loader.load_environment()?;
        let profiles = loader.load_commands()?;
        let option_defaults = loader.load_option_defaults()?;

        let fixture_root = project_root
            .join("tests")
            .join("fixtures")
            .join("coreutils_outputs");
        let repository = OutputRepository::new(&fixture_root)?;
        let artifacts =
            ArtifactWriter::new(artifact_dir.unwrap_or_else(|| repository.base_path()))?;

        Ok(Pipeline {
            project_root: project_root.to_path_buf(),
            man: ManDiscovery::new(Some(env.image_tag.clone()))?,
            help: HelpDiscovery::new()?,
            option_defaults,
            planner: ScenarioPlanner::new(crate::combine::CombinationEngine::new(
                crate::combine::CombinationSettings::default(),
            )),
            runner: DockerRunner::new(env),
            repository,
            artifacts,
            profiles,
        })
    }

    /// Drives the full run across the selected commands and writes the
    /// aggregate report.
    pub fn run(&self, options: &RunOptions) -> Result<()> {
        let selected: Vec<&CommandProfile> = self
            .profiles
            .iter()
            .filter(|profile| {
                options.commands.is_empty() || options.commands.contains(&profile.name)
            })
            .collect();
        if selected.is_empty() {
            return Err(anyhow!("no configured commands match the selection"));
        }

        if options.clean {
            self.clean_outputs(&selected)?;
        }

        let executing = options.stage == Stage::Run && !options.dry_run;
        if executing {
            self.runner.ensure_image(options.rebuild_image)?;
        }

        let mut reports = Vec::new();
        for profile in selected {
            if let Some(report) = self.run_command(profile, options, executing)? {
                reports.push(report);
            }
        }

        if !reports.is_empty() {
            let report = PipelineReport {
                image_tag: self.runner.environment().image_tag.clone(),
                generated_at: now_utc_rfc3339(),
                commands: reports,
            };
            self.artifacts.write_report(&report)?;
            print_summary(&report);
            println!(
                "Report written to {}",
                self.artifacts.report_path().display()
            );
        }
        Ok(())
    }

    /// Runs the four-stage state machine for one command. Returns None
    /// when the command is skipped.
    fn run_command(
        &self,
        profile: &CommandProfile,
        options: &RunOptions,
        executing: bool,
    ) -> Result<Option<CommandReport>> {
        let name = &profile.name;
        self.artifacts.log(name, &format!("== {name} =="));

        // Parse
        let Some((discovered, option_source)) = self.discover_with_fallback(name) else {
            self.artifacts
                .log(name, "[WARN] No options parsed; skipping command");
            tracing::warn!(command = %name, "no options parsed; skipping");
            return Ok(None);
        };
        self.artifacts.write_options(name, &discovered)?;
        if options.stage == Stage::Parse {
            return Ok(None);
        }

        // Enrich
        let enriched = enrich(name, &discovered, &self.option_defaults);
        self.artifacts.write_enriched_options(name, &enriched)?;
        self.artifacts.log(
            name,
            &format!(
                "[enrich] options={} (input={})",
                enriched.len(),
                discovered.len()
            ),
        );
        if enriched.is_empty() {
            self.artifacts
                .log(name, "[WARN] No enriched options after defaults; skipping");
            tracing::warn!(command = %name, "no enriched options; skipping");
            return Ok(None);
        }
        if options.stage == Stage::Enrich {
            return Ok(None);
        }

        // Plan
        let invocations = self.plan_command(profile, &enriched, options)?;
        if invocations.is_empty() {
            self.artifacts
                .log(name, "[WARN] No scenarios after planning; skipping command");
            tracing::warn!(command = %name, "empty plan; skipping");
            return Ok(None);
        }
        self.artifacts.write_plan(name, &invocations)?;
        let planned = tier_totals(&invocations);
        self.artifacts.log(
            name,
            &format!(
                "[plan] scenarios={} tiers={:?}",
                invocations.len(),
                planned.by_tier
            ),
        );

        let mut report = CommandReport {
            command: name.clone(),
            option_source: option_source.as_str().to_string(),
            image_tag: self.runner.environment().image_tag.clone(),
            planned,
            executed: TierTotals::default(),
            exit_codes: BTreeMap::new(),
            success_rate: 0.0,
            unique_stdout: 0,
            stdout_top: Vec::new(),
        };

        if !executing {
            return Ok(Some(report));
        }

        // Run
        self.execute_command(profile, &invocations, option_source, &mut report)?;
        Ok(Some(report))
    }

    /// Primary-then-fallback discovery controller. Both strategies failing
    /// is a skip, never fatal.
    fn discover_with_fallback(&self, command: &str) -> Option<(Vec<CommandOption>, OptionSource)> {
        match self.man.discover(command) {
            Ok(options) => {
                self.artifacts
                    .log(command, &format!("[parse] man options={}", options.len()));
                Some((options, OptionSource::Man))
            }
            Err(man_error) => {
                self.artifacts.log(
                    command,
                    &format!("[WARN] man parse failed: {man_error}; falling back to --help"),
                );
                tracing::warn!(%command, error = %man_error, "man parse failed; trying --help");
                match self.help.discover(command) {
                    Ok(options) => {
                        self.artifacts
                            .log(command, &format!("[parse] help options={}", options.len()));
                        Some((options, OptionSource::Help))
                    }
                    Err(help_error) => {
                        self.artifacts
                            .log(command, &format!("[WARN] help parse failed: {help_error}"));
                        tracing::warn!(%command, error = %help_error, "help parse failed");
                        None
                    }
                }
            }
        }
    }

    fn plan_command(
        &self,
        profile: &CommandProfile,
        enriched: &[CommandOption],
        options: &RunOptions,
    ) -> Result<Vec<CommandInvocation>> {
        if options.allowlist_tier2_only
            && options.tiers.contains(&Tier::Tier2)
            && profile.allowed_options.is_empty()
        {
            self.artifacts.log(
                &profile.name,
                "[INFO] Skipping tier2 (no allowed_options and --allowlist-tier2 enabled)",
            );
        }
        let active_tiers: Vec<Tier> = options
            .tiers
            .iter()
            .filter(|tier| profile.tiers_enabled.contains(tier))
            .copied()
            .collect();
        let settings = PlanSettings {
            include_errors: active_tiers.contains(&Tier::Tier3),
            tiers: active_tiers,
            allowlist_tier2_only: options.allowlist_tier2_only,
        };
        let mut invocations = self.planner.build_invocations(profile, enriched, &settings);
        if let Some(limit) = options.limit {
            invocations.truncate(limit);
        }
        Ok(invocations)
    }

    fn execute_command(
        &self,
        profile: &CommandProfile,
        invocations: &[CommandInvocation],
        option_source: OptionSource,
        report: &mut CommandReport,
    ) -> Result<()> {
        let name = &profile.name;
        let mut exit_codes: BTreeMap<i32, usize> = BTreeMap::new();
        let mut executed_by_tier: BTreeMap<Tier, usize> = BTreeMap::new();
        let mut stdout_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut stdout_lengths: BTreeMap<String, usize> = BTreeMap::new();
        let mut success_count = 0usize;

        for (idx, invocation) in invocations.iter().enumerate() {
            let result = self
                .runner
                .run(invocation, Some(&profile.working_dir))
                .with_context(|| format!("execute scenario {}", invocation.scenario_id))?;

            let mut tagged = invocation.clone();
            tagged
                .metadata
                .insert("option_source".to_string(), option_source.as_str().to_string());
            self.repository.save(&tagged, &result)?;

            *exit_codes.entry(result.exit_code).or_default() += 1;
            *executed_by_tier.entry(invocation.tier).or_default() += 1;
            if result.exit_code == 0 {
                success_count += 1;
            }
            let stdout_len = result.stdout.len();
            let hash = sha256_hex(result.stdout.as_bytes());
            stdout_lengths.entry(hash.clone()).or_insert(stdout_len);
            *stdout_counts.entry(hash).or_default() += 1;

            let executed = idx + 1;
            if executed % RUN_PROGRESS_INTERVAL == 0 || executed == invocations.len() {
                self.artifacts.log(
                    name,
                    &format!("[run] executed {executed}/{} scenarios", invocations.len()),
                );
            }
        }

        let executed_total: usize = executed_by_tier.values().sum();
        report.executed = TierTotals {
            total: executed_total,
            by_tier: executed_by_tier,
        };
        report.success_rate = if executed_total == 0 {
            0.0
        } else {
            success_count as f64 / executed_total as f64
        };
        report.unique_stdout = stdout_counts.len();
        report.stdout_top = top_stdout_hashes(&stdout_counts, &stdout_lengths);
        report.exit_codes = exit_codes;
        Ok(())
    }

    /// Destructive pre-step: removes each selected command's fixture
    /// directory, the artifact/log trees, and the manifest. Refuses to
    /// touch anything unless the fixture root is strictly inside the
    /// project root.
    fn clean_outputs(&self, profiles: &[&CommandProfile]) -> Result<()> {
        let base = self.repository.base_path();
        ensure_within_project(&self.project_root, base)?;

        let mut removed = Vec::new();
        for profile in profiles {
            let target = base.join(&profile.name);
            if target.exists() {
                fs::remove_dir_all(&target)
                    .with_context(|| format!("remove fixtures {}", target.display()))?;
                removed.push(target);
            }
        }
        for name in ["_artifacts", "_logs"] {
            let target = base.join(name);
            if target.exists() {
                fs::remove_dir_all(&target)
                    .with_context(|| format!("remove {}", target.display()))?;
                removed.push(target);
            }
        }
        let manifest = self.repository.manifest_path();
        if manifest.exists() {
            fs::remove_file(manifest)
                .with_context(|| format!("remove manifest {}", manifest.display()))?;
            removed.push(manifest.to_path_buf());
        }

        self.log_cleanup(base, &removed)?;
        Ok(())
    }

    fn log_cleanup(&self, base: &Path, removed: &[PathBuf]) -> Result<()> {
        let log_dir = self.artifacts.log_dir();
        fs::create_dir_all(log_dir)
            .with_context(|| format!("create log dir {}", log_dir.display()))?;
        let path = log_dir.join("cleanup.log");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open cleanup log {}", path.display()))?;
        let timestamp = now_utc_rfc3339();
        writeln!(file, "[{timestamp}] cleanup start")?;
        for target in removed {
            let shown = target.strip_prefix(base).unwrap_or(target);
            writeln!(file, "[CLEAN] {}", shown.display())?;
        }
        writeln!(file, "[{timestamp}] cleanup end")?;
        Ok(())
    }
}

/// Mandatory containment check before any deletion: the target must be a
/// strict descendant of the project root once both are canonicalized.
pub fn ensure_within_project(project_root: &Path, target: &Path) -> Result<()> {
    let root = project_root
        .canonicalize()
        .with_context(|| format!("canonicalize project root {}", project_root.display()))?;
    let target = target
        .canonicalize()
        .with_context(|| format!("canonicalize cleanup target {}", target.display()))?;
    if target == root || !target.starts_with(&root) {
        return Err(anyhow!(
            "refusing cleanup: {} is not strictly inside project root {}",
            target.display(),
            root.display()
        ));
    }
    Ok(())
}

fn tier_totals(invocations: &[CommandInvocation]) -> TierTotals {
    let mut by_tier: BTreeMap<Tier, usize> = BTreeMap::new();
    for invocation in invocations {
        *by_tier.entry(invocation.tier).or_default() += 1;
    }
    TierTotals {
        total: invocations.len(),
        by_tier,
    }
}

/// Most frequent stdout payloads; count descending, hash ascending for a
/// deterministic report.
fn top_stdout_hashes(
    counts: &BTreeMap<String, usize>,
    lengths: &BTreeMap<String, usize>,
) -> Vec<StdoutDigest> {
    let mut entries: Vec<(&String, &usize)> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(STDOUT_TOP_COUNT)
        .map(|(hash, count)| StdoutDigest {
            hash: hash.clone(),
            count: *count,
            length: lengths.get(hash).copied().unwrap_or(0),
        })
        .collect()
}

fn print_summary(report: &PipelineReport) {
    println!("== Pipeline summary ==");
    for command in &report.commands {
        println!(
            " - {}: planned={} executed={} success={:.1}% exit_codes={:?}",
            command.command,
            command.planned.total,
            command.executed.total,
            command.success_rate * 100.0,
            command.exit_codes
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_check_rejects_outside_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ensure_within_project(dir.path(), Path::new("/etc"));
        assert!(err.is_err());
    }

    #[test]
    fn containment_check_rejects_project_root_itself() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(ensure_within_project(dir.path(), dir.path()).is_err());
    }

    #[test]
    fn containment_check_accepts_descendants() {
        let dir = tempfile::tempdir().expect("tempdir");
        let child = dir.path().join("fixtures");
        fs::create_dir_all(&child).expect("create child");
        assert!(ensure_within_project(dir.path(), &child).is_ok());
    }

    #[test]
    fn containment_check_sees_through_dot_dot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let escaping = dir.path().join("fixtures").join("..").join("..");
        fs::create_dir_all(dir.path().join("fixtures")).expect("create child");
        assert!(ensure_within_project(dir.path(), &escaping).is_err());
    }

    #[test]
    fn top_stdout_hashes_order_is_deterministic() {
        let mut counts = BTreeMap::new();
        counts.insert("bbb".to_string(), 3);
        counts.insert("aaa".to_string(), 3);
        counts.insert("ccc".to_string(), 1);
        let mut lengths = BTreeMap::new();
        lengths.insert("aaa".to_string(), 10);
        lengths.insert("bbb".to_string(), 20);
        lengths.insert("ccc".to_string(), 30);

        let top = top_stdout_hashes(&counts, &lengths);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].hash, "aaa");
        assert_eq!(top[1].hash, "bbb");
        assert_eq!(top[2].count, 1);
        assert_eq!(top[2].length, 30);
    }

    #[test]
    fn tier_totals_count_by_tier() {
        let invocations = vec![
            CommandInvocation::new("ls", vec![], vec![], Tier::Tier0, BTreeMap::new()),
            CommandInvocation::new(
                "ls",
                vec!["-l".to_string()],
                vec![],
                Tier::Tier0,
                BTreeMap::new(),
            ),
            CommandInvocation::new(
                "ls",
                vec!["-l".to_string(), "-a".to_string()],
                vec![],
                Tier::Tier2,
                BTreeMap::new(),
            ),
        ];
        let totals = tier_totals(&invocations);
        assert_eq!(totals.total, 3);
        assert_eq!(totals.by_tier.get(&Tier::Tier0), Some(&2));
        assert_eq!(totals.by_tier.get(&Tier::Tier2), Some(&1));
    }
}
