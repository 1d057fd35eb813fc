//! Per-stage artifact dumps and per-command append logs.
//!
//! Every pipeline stage writes its output under `_artifacts/` so a run
//! can be inspected after the fact, and appends one-line entries to
//! `_logs/<command>.log`.
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

pub struct ArtifactWriter {
    options_dir: PathBuf,
    enriched_dir: PathBuf,
    plan_dir: PathBuf,
    report_path: PathBuf,
    log_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(base_dir: &Path) -> Result<ArtifactWriter> {
        let artifacts = base_dir.join("_artifacts");
        let writer = ArtifactWriter {
            options_dir: artifacts.join("options"),
            enriched_dir: artifacts.join("enriched_options"),
            plan_dir: artifacts.join("scenario_plan"),
            report_path: artifacts.join("report.json"),
            log_dir: base_dir.join("_logs"),
        };
        for dir in [
            &writer.options_dir,
            &writer.enriched_dir,
            &writer.plan_dir,
            &writer.log_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("create artifact dir {}", dir.display()))?;
        }
        Ok(writer)
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn write_options<T: Serialize>(&self, command: &str, payload: &T) -> Result<PathBuf> {
        write_json(&self.options_dir.join(format!("{command}.json")), payload)
    }

    pub fn write_enriched_options<T: Serialize>(
        &self,
        command: &str,
        payload: &T,
    ) -> Result<PathBuf> {
        write_json(&self.enriched_dir.join(format!("{command}.json")), payload)
    }

    pub fn write_plan<T: Serialize>(&self, command: &str, payload: &T) -> Result<PathBuf> {
        write_json(&self.plan_dir.join(format!("{command}.json")), payload)
    }

    pub fn write_report<T: Serialize>(&self, payload: &T) -> Result<PathBuf> {
        write_json(&self.report_path, payload)
    }

    /// Appends one line to the per-command log. Log failures are not worth
    /// aborting a run over, so this is best-effort with a traced warning.
    pub fn log(&self, command: &str, message: &str) {
        if let Err(error) = self.append_line(command, message) {
            tracing::warn!(%command, %error, "failed to append command log");
        }
    }

    fn append_line(&self, command: &str, message: &str) -> Result<()> {
        fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("create log dir {}", self.log_dir.display()))?;
        let path = self.log_dir.join(format!("{command}.log"));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open log {}", path.display()))?;
        writeln!(file, "{message}").with_context(|| format!("write log {}", path.display()))?;
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, payload: &T) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create artifact dir {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(payload).context("serialize artifact")?;
    fs::write(path, json).with_context(|| format!("write artifact {}", path.display()))?;
    Ok(path.to_path_buf())
}
