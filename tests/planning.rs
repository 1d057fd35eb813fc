//! End-to-end planning properties: determinism, budgets, and the
//! content-addressing contract.
use coreutils_fixgen::combine::{CombinationEngine, CombinationSettings};
use coreutils_fixgen::config::CommandProfile;
use coreutils_fixgen::plan::{PlanSettings, ScenarioPlanner};
use coreutils_fixgen::schema::{CommandOption, OptionSource, Tier};

fn option(token: &str, default_value: Option<&str>) -> CommandOption {
    CommandOption {
        token: token.to_string(),
        description: String::new(),
        requires_value: default_value.is_some(),
        default_value: default_value.map(|v| v.to_string()),
        source: OptionSource::Man,
    }
}

fn grep_profile() -> CommandProfile {
    CommandProfile {
        name: "grep".to_string(),
        arguments: vec![vec!["file.txt".to_string()]],
        error_arguments: vec![vec!["/no/such/file".to_string()]],
        tiers_enabled: vec![Tier::Tier0, Tier::Tier1, Tier::Tier2, Tier::Tier3],
        popular_options: vec![vec!["-i".to_string(), "-n".to_string()]],
        allowed_options: vec!["-i".to_string(), "-n".to_string(), "-v".to_string()],
        max_full_combination_options: 4,
        working_dir: "/work".to_string(),
    }
}

fn planner() -> ScenarioPlanner {
    ScenarioPlanner::new(CombinationEngine::new(CombinationSettings::default()))
}

fn settings(tiers: &[Tier]) -> PlanSettings {
    PlanSettings {
        tiers: tiers.to_vec(),
        include_errors: tiers.contains(&Tier::Tier3),
        allowlist_tier2_only: false,
    }
}

#[test]
fn singleton_tier_scenario_for_grep_color_has_tier0_prefix() {
    let invocations = planner().build_invocations(
        &grep_profile(),
        &[option("--color", Some("auto"))],
        &settings(&[Tier::Tier0]),
    );
    let singleton = invocations
        .iter()
        .find(|inv| inv.options == vec!["--color=auto".to_string()])
        .expect("singleton scenario planned");
    assert!(singleton.scenario_id.starts_with("tier0_"));
    assert_eq!(singleton.args, vec!["file.txt".to_string()]);
}

#[test]
fn replanning_with_unchanged_inputs_is_byte_identical() {
    let options = [
        option("-i", None),
        option("-n", None),
        option("-v", None),
        option("--color", Some("auto")),
    ];
    let tiers = [Tier::Tier0, Tier::Tier1, Tier::Tier2, Tier::Tier3];

    let first = planner().build_invocations(&grep_profile(), &options, &settings(&tiers));
    let second = planner().build_invocations(&grep_profile(), &options, &settings(&tiers));

    let first_json = serde_json::to_string(&first).expect("serialize plan");
    let second_json = serde_json::to_string(&second).expect("serialize plan");
    assert_eq!(first_json, second_json);
}

#[test]
fn scenario_ids_are_unique_within_a_plan() {
    let options = [
        option("-i", None),
        option("-n", None),
        option("-v", None),
        option("-c", None),
    ];
    let tiers = [Tier::Tier0, Tier::Tier1, Tier::Tier2, Tier::Tier3];
    let invocations = planner().build_invocations(&grep_profile(), &options, &settings(&tiers));

    let mut ids: Vec<&str> = invocations
        .iter()
        .map(|inv| inv.scenario_id.as_str())
        .collect();
    let planned = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), planned);
}

#[test]
fn budgets_hold_for_oversized_option_surfaces() {
    let options: Vec<CommandOption> = (0..50).map(|i| option(&format!("-x{i}"), None)).collect();
    let mut profile = grep_profile();
    profile.allowed_options = Vec::new();
    profile.error_arguments = Vec::new();
    profile.max_full_combination_options = 4;
    let tiers = [Tier::Tier0, Tier::Tier2, Tier::Tier4];
    let invocations = planner().build_invocations(&profile, &options, &settings(&tiers));

    let count = |tier: Tier| {
        invocations
            .iter()
            .filter(|inv| inv.tier == tier)
            .count()
    };
    // One argument profile, so case counts equal invocation counts.
    assert_eq!(count(Tier::Tier0), 1 + 8);
    assert_eq!(count(Tier::Tier2), 120);
    assert_eq!(count(Tier::Tier4), 200);
}

#[test]
fn error_scenarios_are_emitted_independently_of_combinations() {
    let invocations = planner().build_invocations(
        &grep_profile(),
        &[option("-i", None)],
        &settings(&[Tier::Tier3]),
    );
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].tier, Tier::Tier3);
    assert_eq!(
        invocations[0].metadata.get("error").map(String::as_str),
        Some("true")
    );
    assert_eq!(invocations[0].args, vec!["/no/such/file".to_string()]);
}
