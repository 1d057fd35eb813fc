//! Option discovery: extracting the switch vocabulary of an external tool
//! from its documentation text.
//!
//! Two strategies implement the same capability: the primary one parses
//! the OPTIONS section of the man page, the fallback parses `--help`
//! output. Selection between them is the orchestrator's job; this module
//! only reports typed failures.
use crate::schema::{CommandOption, OptionSource};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::io::Write as _;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const DOC_PROBE_TIMEOUT_SECS: u64 = 5;

/// Markers that flag a value-taking option anywhere in a man option line.
const MAN_VALUE_MARKERS: [&str; 8] = [
    "=num", "=when", "=size", "=format", "=style", "=file", "=dir", "=path",
];

/// `--help` token suffixes that flag a value-taking option.
const HELP_VALUE_SUFFIXES: [&str; 6] = ["=SIZE", "=FILE", "=WHEN", "=WORD", "=STYLE", "=TIME"];

/// Typed discovery failure, caught only by the orchestrator's
/// fallback/skip logic.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("failed to launch documentation probe for `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("documentation probe for `{0}` timed out")]
    Timeout(String),
    #[error("documentation probe for `{0}` produced no text")]
    EmptyOutput(String),
    #[error("no options parsed for `{0}`")]
    NoOptions(String),
}

/// One way of discovering a command's option surface.
pub trait OptionDiscovery {
    fn source(&self) -> OptionSource;
    fn discover(&self, command: &str) -> Result<Vec<CommandOption>, DiscoveryError>;
}

/// Primary strategy: parse the OPTIONS section of `man <command>`.
pub struct ManDiscovery {
    option_line: Regex,
    section_header: Regex,
    bracket_value: Regex,
    /// When set, the man page is read inside the container image so the
    /// documented surface matches the executed tool.
    image_tag: Option<String>,
}

impl ManDiscovery {
    pub fn new(image_tag: Option<String>) -> Result<ManDiscovery> {
        Ok(ManDiscovery {
            option_line: Regex::new(
                r"^\s{0,10}(-{1,2}[A-Za-z0-9][\w-]*(?:[ =]\w+)?)(?:,\s*(-{1,2}[A-Za-z0-9][\w-]*(?:[ =]\w+)?))?",
            )
            .context("compile man option pattern")?,
            section_header: Regex::new(r"^[A-Z][A-Z0-9 _-]{3,}$")
                .context("compile section header pattern")?,
            bracket_value: Regex::new(r"=\[[^\]]*\]\w+").context("compile bracket pattern")?,
            image_tag,
        })
    }

    fn read_man_text(&self, command: &str) -> Result<String, DiscoveryError> {
        let argv: Vec<String> = match &self.image_tag {
            Some(image) => [
                "docker",
                "run",
                "--rm",
                "--entrypoint=man",
                image,
                "-P",
                "cat",
                command,
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            None => vec!["man".to_string(), command.to_string()],
        };
        let captured = run_doc_probe(command, &argv)?;
        let text = if captured.stdout.is_empty() {
            captured.stderr
        } else {
            captured.stdout
        };
        if text.trim().is_empty() {
            return Err(DiscoveryError::EmptyOutput(command.to_string()));
        }
        // col -b strips backspace overstriking from formatted pages; raw
        // text is fine when the filter is unavailable.
        Ok(strip_overstrike(&text).unwrap_or(text))
    }

    /// Lines of the OPTIONS section, or the whole document when no such
    /// section exists.
    fn options_section<'a>(&self, lines: &'a [&'a str]) -> Vec<&'a str> {
        let mut in_options = false;
        let mut collected = Vec::new();
        for line in lines {
            let stripped = line.trim();
            if !in_options && stripped.eq_ignore_ascii_case("OPTIONS") {
                in_options = true;
                continue;
            }
            if in_options {
                if self.section_header.is_match(stripped) && stripped != "OPTIONS" {
                    break;
                }
                collected.push(*line);
            }
        }
        if collected.is_empty() {
            return lines.to_vec();
        }
        collected
    }

    fn parse_lines(&self, lines: &[&str]) -> Vec<CommandOption> {
        let mut seen = BTreeSet::new();
        let mut options = Vec::new();
        for line in lines {
            let Some(captures) = self.option_line.captures(line) else {
                continue;
            };
            let line_lower = line.to_lowercase();
            let line_has_marker = MAN_VALUE_MARKERS
                .iter()
                .any(|marker| line_lower.contains(marker))
                || self.bracket_value.is_match(&line_lower);

            let raw_tokens: Vec<&str> = [captures.get(1), captures.get(2)]
                .into_iter()
                .flatten()
                .map(|m| m.as_str())
                .collect();
            let requires_any = line_has_marker
                || raw_tokens
                    .iter()
                    .any(|raw| token_embeds_value(raw));

            for raw in raw_tokens {
                let token = base_token(raw);
                if token.is_empty() || !seen.insert(token.to_string()) {
                    continue;
                }
                options.push(CommandOption {
                    token: token.to_string(),
                    description: String::new(),
                    requires_value: requires_any || token_embeds_value(raw),
                    default_value: None,
                    source: OptionSource::Man,
                });
            }
        }
        options
    }
}

impl OptionDiscovery for ManDiscovery {
    fn source(&self) -> OptionSource {
        OptionSource::Man
    }

    fn discover(&self, command: &str) -> Result<Vec<CommandOption>, DiscoveryError> {
        let text = self.read_man_text(command)?;
        let lines: Vec<&str> = text.lines().collect();
        let section = self.options_section(&lines);
        let options = self.parse_lines(&section);
        if options.is_empty() {
            return Err(DiscoveryError::NoOptions(command.to_string()));
        }
        Ok(options)
    }
}

/// Fallback strategy: parse `<command> --help` output line by line.
pub struct HelpDiscovery {
    option_line: Regex,
}

impl HelpDiscovery {
    pub fn new() -> Result<HelpDiscovery> {
        Ok(HelpDiscovery {
            // The leading token must stop before a comma, otherwise the
            // `-a, --all` form matches with the comma consumed and the
            // long alias ends up in the description group.
            option_line: Regex::new(
                r"^\s{0,6}(-[^\s,]+)(?:,\s*(--[a-zA-Z0-9][\w-]*)(?:[= ]\S+)?)?\s+(.*)$",
            )
            .context("compile help option pattern")?,
        })
    }

    fn parse_text(&self, text: &str) -> Vec<CommandOption> {
        let mut seen = BTreeSet::new();
        let mut options = Vec::new();
        for line in text.lines() {
            let Some(captures) = self.option_line.captures(line) else {
                continue;
            };
            let description = captures
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            let raw_tokens: Vec<&str> = [captures.get(1), captures.get(2)]
                .into_iter()
                .flatten()
                .map(|m| m.as_str())
                .collect();
            let requires_value = raw_tokens.iter().any(|raw| {
                HELP_VALUE_SUFFIXES
                    .iter()
                    .any(|suffix| raw.ends_with(suffix))
            });
            for raw in raw_tokens {
                let token = base_token(raw);
                if token.is_empty() || !seen.insert(token.to_string()) {
                    continue;
                }
                options.push(CommandOption {
                    token: token.to_string(),
                    description: description.clone(),
                    requires_value,
                    default_value: None,
                    source: OptionSource::Help,
                });
            }
        }
        options
    }
}

impl OptionDiscovery for HelpDiscovery {
    fn source(&self) -> OptionSource {
        OptionSource::Help
    }

    fn discover(&self, command: &str) -> Result<Vec<CommandOption>, DiscoveryError> {
        let argv = vec![command.to_string(), "--help".to_string()];
        let captured = run_doc_probe(command, &argv)?;
        let text = if captured.stdout.is_empty() {
            captured.stderr
        } else {
            captured.stdout
        };
        if text.trim().is_empty() {
            return Err(DiscoveryError::EmptyOutput(command.to_string()));
        }
        let options = self.parse_text(&text);
        if options.is_empty() {
            return Err(DiscoveryError::NoOptions(command.to_string()));
        }
        Ok(options)
    }
}

/// Reduces a matched token to its literal switch text: brackets dropped,
/// any `=VALUE` or embedded-space value placeholder stripped.
fn base_token(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.find(|c| matches!(c, '=' | ' ' | '[')) {
        Some(end) => &raw[..end],
        None => raw,
    }
}

fn token_embeds_value(raw: &str) -> bool {
    let cleaned = raw.replace(['[', ']'], "");
    cleaned.contains('=') || cleaned.trim().contains(' ')
}

struct CapturedOutput {
    stdout: String,
    stderr: String,
}

/// Runs a documentation probe with a hard timeout, capturing both streams.
fn run_doc_probe(command: &str, argv: &[String]) -> Result<CapturedOutput, DiscoveryError> {
    let (program, rest) = argv
        .split_first()
        .ok_or_else(|| DiscoveryError::EmptyOutput(command.to_string()))?;
    let mut cmd = Command::new(program);
    cmd.args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|source| DiscoveryError::Launch {
        command: command.to_string(),
        source,
    })?;
    let timeout = Duration::from_secs(DOC_PROBE_TIMEOUT_SECS);

    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {}
            Err(source) => {
                let _ = child.kill();
                return Err(DiscoveryError::Launch {
                    command: command.to_string(),
                    source,
                });
            }
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DiscoveryError::Timeout(command.to_string()));
        }
        std::thread::sleep(Duration::from_millis(25));
    }

    let output = child
        .wait_with_output()
        .map_err(|source| DiscoveryError::Launch {
            command: command.to_string(),
            source,
        })?;
    Ok(CapturedOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Pipes formatted man text through `col -b`; None when the filter is
/// missing or produces nothing.
fn strip_overstrike(text: &str) -> Option<String> {
    let mut child = Command::new("col")
        .arg("-b")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).ok()?;
    }
    let output = child.wait_with_output().ok()?;
    let filtered = String::from_utf8_lossy(&output.stdout).to_string();
    if filtered.trim().is_empty() {
        return None;
    }
    Some(filtered)
}
