//! Typed loading of the generator's JSON configuration files.
//!
//! Three files live under `config/`: command profiles (with a shared
//! defaults block), execution environments, and option default values.
use crate::schema::{ExecutionEnvironment, Tier};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_LOCALE: &str = "C.UTF-8";
const DEFAULT_RUN_TIMEOUT_SECONDS: u64 = 120;

/// Resolved per-command profile after defaults inheritance.
#[derive(Debug, Clone)]
pub struct CommandProfile {
    pub name: String,
    pub arguments: Vec<Vec<String>>,
    pub error_arguments: Vec<Vec<String>>,
    pub tiers_enabled: Vec<Tier>,
    pub popular_options: Vec<Vec<String>>,
    pub allowed_options: Vec<String>,
    pub max_full_combination_options: usize,
    pub working_dir: String,
}

/// Layered option default values: command-specific entries override the
/// global map. Assembled once at load time and passed by reference into
/// enrichment.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct OptionDefaults {
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    #[serde(default)]
    pub commands: BTreeMap<String, BTreeMap<String, String>>,
}

impl OptionDefaults {
    /// Command-specific default for a token, falling back to the global map.
    pub fn resolve(&self, command: &str, token: &str) -> Option<&str> {
        self.commands
            .get(command)
            .and_then(|map| map.get(token))
            .or_else(|| self.defaults.get(token))
            .map(String::as_str)
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawCommandDefaults {
    #[serde(default)]
    arguments: Option<Vec<Vec<String>>>,
    #[serde(default)]
    error_arguments: Option<Vec<Vec<String>>>,
    #[serde(default)]
    tiers_enabled: Option<Vec<String>>,
    #[serde(default)]
    popular_options: Option<Vec<Vec<String>>>,
    #[serde(default)]
    allowed_options: Option<Vec<String>>,
    #[serde(default)]
    max_full_combination_options: Option<usize>,
    #[serde(default)]
    working_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCommandEntry {
    name: String,
    #[serde(flatten)]
    fields: RawCommandDefaults,
}

#[derive(Debug, Deserialize)]
struct RawCommandsFile {
    #[serde(default)]
    defaults: RawCommandDefaults,
    #[serde(default)]
    commands: Vec<RawCommandEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnvironment {
    name: String,
    image_tag: String,
    dockerfile_path: String,
    run_workdir: String,
    #[serde(default)]
    locale: Option<String>,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawEnvironmentsFile {
    default: RawEnvironment,
}

/// Loads the three config files relative to the project root.
pub struct ConfigLoader {
    project_root: PathBuf,
}

impl ConfigLoader {
    pub fn new(project_root: &Path) -> ConfigLoader {
        ConfigLoader {
            project_root: project_root.to_path_buf(),
        }
    }

    fn config_path(&self, name: &str) -> PathBuf {
        self.project_root.join("config").join(name)
    }

    pub fn load_environment(&self) -> Result<ExecutionEnvironment> {
        let path = self.config_path("environments.json");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("read environment config {}", path.display()))?;
        let raw: RawEnvironmentsFile = serde_json::from_str(&content)
            .with_context(|| format!("parse environment config {}", path.display()))?;
        let env = raw.default;
        Ok(ExecutionEnvironment {
            name: env.name,
            image_tag: env.image_tag,
            dockerfile_path: self.project_root.join(env.dockerfile_path),
            run_workdir: env.run_workdir,
            locale: env.locale.unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            timeout_seconds: env.timeout_seconds.unwrap_or(DEFAULT_RUN_TIMEOUT_SECONDS),
        })
    }

    pub fn load_commands(&self) -> Result<Vec<CommandProfile>> {
        let path = self.config_path("commands.json");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("read command config {}", path.display()))?;
        let raw: RawCommandsFile = serde_json::from_str(&content)
            .with_context(|| format!("parse command config {}", path.display()))?;
        raw.commands
            .into_iter()
            .map(|entry| resolve_profile(entry, &raw.defaults))
            .collect()
    }

    pub fn load_option_defaults(&self) -> Result<OptionDefaults> {
        let path = self.config_path("option_defaults.json");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("read option defaults {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parse option defaults {}", path.display()))
    }
}

fn resolve_profile(entry: RawCommandEntry, defaults: &RawCommandDefaults) -> Result<CommandProfile> {
    let fields = entry.fields;
    let tier_names = fields
        .tiers_enabled
        .or_else(|| defaults.tiers_enabled.clone())
        .unwrap_or_default();
    let tiers_enabled = tier_names
        .iter()
        .map(|name| {
            Tier::parse(name)
                .ok_or_else(|| anyhow!("unknown tier {name:?} for command {}", entry.name))
        })
        .collect::<Result<Vec<Tier>>>()?;

    Ok(CommandProfile {
        name: entry.name,
        arguments: fields
            .arguments
            .or_else(|| defaults.arguments.clone())
            .unwrap_or_else(|| vec![Vec::new()]),
        error_arguments: fields
            .error_arguments
            .or_else(|| defaults.error_arguments.clone())
            .unwrap_or_default(),
        tiers_enabled,
        popular_options: fields
            .popular_options
            .or_else(|| defaults.popular_options.clone())
            .unwrap_or_default(),
        allowed_options: fields
            .allowed_options
            .or_else(|| defaults.allowed_options.clone())
            .unwrap_or_default(),
        max_full_combination_options: fields
            .max_full_combination_options
            .or(defaults.max_full_combination_options)
            .unwrap_or(6),
        working_dir: fields
            .working_dir
            .or_else(|| defaults.working_dir.clone())
            .unwrap_or_else(|| "/opt/coreutils-fixtures/files".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_commands(json: &str) -> Vec<CommandProfile> {
        let raw: RawCommandsFile = serde_json::from_str(json).expect("parse commands json");
        raw.commands
            .into_iter()
            .map(|entry| resolve_profile(entry, &raw.defaults).expect("resolve profile"))
            .collect()
    }

    #[test]
    fn entries_inherit_unset_fields_from_defaults() {
        let profiles = parse_commands(
            r#"{
                "defaults": {
                    "tiers_enabled": ["tier0", "tier1"],
                    "working_dir": "/work",
                    "max_full_combination_options": 4
                },
                "commands": [
                    {"name": "ls", "arguments": [["."]]},
                    {"name": "cat", "tiers_enabled": ["tier0"], "working_dir": "/tmp"}
                ]
            }"#,
        );
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].tiers_enabled, vec![Tier::Tier0, Tier::Tier1]);
        assert_eq!(profiles[0].working_dir, "/work");
        assert_eq!(profiles[0].max_full_combination_options, 4);
        assert_eq!(profiles[1].tiers_enabled, vec![Tier::Tier0]);
        assert_eq!(profiles[1].working_dir, "/tmp");
        assert_eq!(profiles[1].arguments, vec![Vec::<String>::new()]);
    }

    #[test]
    fn unknown_tier_name_is_rejected() {
        let raw: RawCommandsFile = serde_json::from_str(
            r#"{"commands": [{"name": "ls", "tiers_enabled": ["tier7"]}]}"#,
        )
        .expect("parse commands json");
        let defaults = RawCommandDefaults::default();
        let entry = raw.commands.into_iter().next().expect("entry");
        assert!(resolve_profile(entry, &defaults).is_err());
    }

    #[test]
    fn option_defaults_resolve_command_over_global() {
        let defaults: OptionDefaults = serde_json::from_str(
            r#"{
                "defaults": {"--block-size": "1K", "-c": "64"},
                "commands": {"head": {"-c": "16"}}
            }"#,
        )
        .expect("parse defaults");
        assert_eq!(defaults.resolve("head", "-c"), Some("16"));
        assert_eq!(defaults.resolve("tail", "-c"), Some("64"));
        assert_eq!(defaults.resolve("head", "--block-size"), Some("1K"));
        assert_eq!(defaults.resolve("head", "--missing"), None);
    }
}
