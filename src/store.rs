//! Result store: one JSON fixture per scenario plus a manifest index.
use crate::schema::{CommandInvocation, ExecutionResult, Fixture, FixtureResult, ManifestEntry};
use crate::util::now_utc_rfc3339;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub struct OutputRepository {
    base_path: PathBuf,
    manifest_path: PathBuf,
}

impl OutputRepository {
    pub fn new(base_path: &Path) -> Result<OutputRepository> {
        fs::create_dir_all(base_path)
            .with_context(|| format!("create fixture root {}", base_path.display()))?;
        Ok(OutputRepository {
            base_path: base_path.to_path_buf(),
            manifest_path: base_path.join("manifest.json"),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Persists one scenario result and indexes it in the manifest.
    /// Re-saving the same scenario id replaces the prior entry.
    pub fn save(
        &self,
        invocation: &CommandInvocation,
        result: &ExecutionResult,
    ) -> Result<PathBuf> {
        let command_dir = self.base_path.join(&invocation.command);
        fs::create_dir_all(&command_dir)
            .with_context(|| format!("create fixture dir {}", command_dir.display()))?;
        let file_path = command_dir.join(format!("{}.json", invocation.scenario_id));

        let fixture = Fixture {
            command: invocation.command.clone(),
            tier: invocation.tier,
            scenario_id: invocation.scenario_id.clone(),
            options: invocation.options.clone(),
            args: invocation.args.clone(),
            metadata: invocation.metadata.clone(),
            environment: result.environment.clone(),
            full_command: result.full_command.clone(),
            result: FixtureResult {
                exit_code: result.exit_code,
                stdout: result.stdout.clone(),
                stderr: result.stderr.clone(),
                duration_ms: result.duration_ms,
            },
            generated_at: now_utc_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&fixture).context("serialize fixture")?;
        fs::write(&file_path, json)
            .with_context(|| format!("write fixture {}", file_path.display()))?;

        self.update_manifest(invocation, &file_path)?;
        Ok(file_path)
    }

    pub fn load_manifest(&self) -> Result<Vec<ManifestEntry>> {
        if !self.manifest_path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.manifest_path)
            .with_context(|| format!("read manifest {}", self.manifest_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parse manifest {}", self.manifest_path.display()))
    }

    /// Read-modify-write: drop any stale entry for the scenario id, then
    /// append the fresh one. Single-writer by design; the sequential
    /// pipeline is the only mutator.
    fn update_manifest(&self, invocation: &CommandInvocation, file_path: &Path) -> Result<()> {
        let mut manifest = self.load_manifest()?;
        let relative = file_path
            .strip_prefix(&self.base_path)
            .unwrap_or(file_path)
            .to_string_lossy()
            .to_string();
        manifest.retain(|entry| entry.scenario_id != invocation.scenario_id);
        manifest.push(ManifestEntry {
            command: invocation.command.clone(),
            scenario_id: invocation.scenario_id.clone(),
            tier: invocation.tier,
            file: relative,
            option_source: invocation.metadata.get("option_source").cloned(),
        });
        let json = serde_json::to_string_pretty(&manifest).context("serialize manifest")?;
        fs::write(&self.manifest_path, json)
            .with_context(|| format!("write manifest {}", self.manifest_path.display()))?;
        Ok(())
    }
}
