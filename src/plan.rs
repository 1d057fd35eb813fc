//! Scenario planner: turns enriched options, combination cases, and
//! argument profiles into concrete invocations.
//!
//! Value-taking options travel through the combination engine as one
//! combinatorial unit each: long forms as a literal `--flag=value` token,
//! short forms as an internal `-c:64` marker that is split into two
//! adjacent argv tokens only after combination.
use crate::combine::CombinationEngine;
use crate::config::CommandProfile;
use crate::schema::{CommandInvocation, CommandOption, Tier};
use std::collections::BTreeMap;

/// Separator for the internal short-option-with-value marker. Never
/// reaches an argv.
const SHORT_VALUE_MARKER: char = ':';

/// Planning toggles for one pipeline run.
#[derive(Debug, Clone)]
pub struct PlanSettings {
    /// Tiers to generate, already intersected with the command's
    /// enabled-tier set by the orchestrator.
    pub tiers: Vec<Tier>,
    /// Emit tier3 error scenarios for known-bad argument profiles.
    pub include_errors: bool,
    /// Omit tier2 entirely for commands that define no allow-list.
    pub allowlist_tier2_only: bool,
}

pub struct ScenarioPlanner {
    engine: CombinationEngine,
}

impl ScenarioPlanner {
    pub fn new(engine: CombinationEngine) -> ScenarioPlanner {
        ScenarioPlanner { engine }
    }

    /// Builds the flat invocation list for one command.
    pub fn build_invocations(
        &self,
        profile: &CommandProfile,
        options: &[CommandOption],
        settings: &PlanSettings,
    ) -> Vec<CommandInvocation> {
        let mut combo_tokens = Vec::new();
        let mut tier2_tokens = Vec::new();
        for opt in options {
            let Some(token) = combination_token(opt) else {
                continue;
            };
            if profile.allowed_options.is_empty()
                || profile.allowed_options.contains(&opt.token)
                || profile.allowed_options.contains(&token)
            {
                tier2_tokens.push(token.clone());
            }
            combo_tokens.push(token);
        }

        let mut active_tiers = settings.tiers.clone();
        if settings.allowlist_tier2_only && profile.allowed_options.is_empty() {
            active_tiers.retain(|tier| *tier != Tier::Tier2);
        }

        let cases = self.engine.generate(
            &combo_tokens,
            &profile.popular_options,
            &active_tiers,
            profile.max_full_combination_options,
            Some(&tier2_tokens),
        );

        // Bare tokens from curated sets still need their default value
        // attached at expansion time.
        let value_map: BTreeMap<&str, &str> = options
            .iter()
            .filter_map(|opt| {
                let value = opt.default_value.as_deref()?;
                Some((opt.token.as_str(), value))
            })
            .collect();

        let mut invocations = Vec::new();
        for case in cases {
            let expanded = expand_tokens(&case.options, &value_map);
            for args in &profile.arguments {
                invocations.push(CommandInvocation::new(
                    &profile.name,
                    expanded.clone(),
                    args.clone(),
                    case.tier,
                    BTreeMap::new(),
                ));
            }
        }

        if settings.include_errors && !profile.error_arguments.is_empty() {
            invocations.extend(self.error_invocations(profile, &combo_tokens, &value_map));
        }

        invocations
    }

    /// One tier3 invocation per known-bad argument profile, paired with at
    /// most the first eligible option to exercise failure paths without
    /// combinatorial explosion.
    fn error_invocations(
        &self,
        profile: &CommandProfile,
        combo_tokens: &[String],
        value_map: &BTreeMap<&str, &str>,
    ) -> Vec<CommandInvocation> {
        let representative: Vec<String> = combo_tokens
            .first()
            .map(|token| expand_tokens(std::slice::from_ref(token), value_map))
            .unwrap_or_default();
        profile
            .error_arguments
            .iter()
            .map(|args| {
                let mut metadata = BTreeMap::new();
                metadata.insert("error".to_string(), "true".to_string());
                CommandInvocation::new(
                    &profile.name,
                    representative.clone(),
                    args.clone(),
                    Tier::Tier3,
                    metadata,
                )
            })
            .collect()
    }
}

/// Runtime form of an enriched option for the combination engine, or None
/// when a value-requiring option carries no default (enrichment already
/// drops these; this is the planner-side guard).
fn combination_token(opt: &CommandOption) -> Option<String> {
    if !opt.requires_value {
        return Some(opt.token.clone());
    }
    let value = opt.default_value.as_deref()?;
    if opt.token.starts_with("--") {
        Some(format!("{}={}", opt.token, value))
    } else {
        Some(format!("{}{}{}", opt.token, SHORT_VALUE_MARKER, value))
    }
}

/// Expands combination-unit tokens to their final argv form.
fn expand_tokens(tokens: &[String], value_map: &BTreeMap<&str, &str>) -> Vec<String> {
    let mut expanded = Vec::new();
    for token in tokens {
        if !token.starts_with("--") {
            if let Some((flag, value)) = token.split_once(SHORT_VALUE_MARKER) {
                expanded.push(flag.to_string());
                expanded.push(value.to_string());
                continue;
            }
        }
        if let Some(value) = value_map.get(token.as_str()) {
            if token.starts_with("--") {
                expanded.push(format!("{token}={value}"));
            } else {
                expanded.push(token.clone());
                expanded.push((*value).to_string());
            }
            continue;
        }
        expanded.push(token.clone());
    }
    expanded
}
