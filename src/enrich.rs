//! Option enrichment: attach synthesized default values to value-taking
//! switches, dropping those with no resolvable default.
//!
//! A value-requiring switch without a known-good argument cannot be
//! invoked safely, so omission is the recovery, never an error.
use crate::config::OptionDefaults;
use crate::schema::CommandOption;

/// Returns the subset of options usable in generated invocations, in
/// input order. Options that do not require a value pass through
/// unchanged; the rest keep their resolved default or are dropped.
pub fn enrich(
    command: &str,
    options: &[CommandOption],
    defaults: &OptionDefaults,
) -> Vec<CommandOption> {
    options
        .iter()
        .filter_map(|opt| {
            if !opt.requires_value {
                return Some(opt.clone());
            }
            let default_value = defaults.resolve(command, &opt.token)?;
            Some(CommandOption {
                default_value: Some(default_value.to_string()),
                ..opt.clone()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OptionSource;
    use std::collections::BTreeMap;

    fn option(token: &str, requires_value: bool) -> CommandOption {
        CommandOption {
            token: token.to_string(),
            description: String::new(),
            requires_value,
            default_value: None,
            source: OptionSource::Man,
        }
    }

    fn defaults() -> OptionDefaults {
        let mut global = BTreeMap::new();
        global.insert("--color".to_string(), "auto".to_string());
        global.insert("-c".to_string(), "64".to_string());
        let mut head = BTreeMap::new();
        head.insert("-c".to_string(), "16".to_string());
        let mut commands = BTreeMap::new();
        commands.insert("head".to_string(), head);
        OptionDefaults {
            defaults: global,
            commands,
        }
    }

    #[test]
    fn flag_options_pass_through_unchanged() {
        let input = vec![option("-l", false), option("-a", false)];
        let enriched = enrich("ls", &input, &defaults());
        assert_eq!(enriched, input);
    }

    #[test]
    fn value_options_without_default_are_dropped() {
        let input = vec![option("-l", false), option("--unknowable", true)];
        let enriched = enrich("ls", &input, &defaults());
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].token, "-l");
    }

    #[test]
    fn command_default_overrides_global() {
        let input = vec![option("-c", true)];
        let for_head = enrich("head", &input, &defaults());
        assert_eq!(for_head[0].default_value.as_deref(), Some("16"));
        let for_tail = enrich("tail", &input, &defaults());
        assert_eq!(for_tail[0].default_value.as_deref(), Some("64"));
    }

    #[test]
    fn never_emits_value_option_without_default() {
        let input = vec![
            option("--color", true),
            option("--unknowable", true),
            option("-a", false),
        ];
        let enriched = enrich("grep", &input, &defaults());
        for opt in &enriched {
            assert!(!opt.requires_value || opt.default_value.is_some());
        }
    }

    #[test]
    fn output_order_follows_input_order() {
        let input = vec![option("-b", false), option("--color", true), option("-a", false)];
        let tokens: Vec<String> = enrich("ls", &input, &defaults())
            .into_iter()
            .map(|o| o.token)
            .collect();
        assert_eq!(tokens, vec!["-b", "--color", "-a"]);
    }
}
