//! Structural pre-check for cloud and infrastructure CLIs.
//!
//! Cloud CLIs ship their own filtering and formatting, so shell pipes,
//! redirects and chaining after them are rejected outright, before any tier
//! classification, with a tool-specific correction.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use super::catalog::normalize_unit;
use super::scanner::strip_quoted;
use crate::config::ClassifierConfig;

/// Structural rule a cloud command broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipeRule {
    /// `|` into another program.
    Pipe,
    /// `>` or `>>` into a file.
    Redirect,
    /// `;`, `&&` or `||` to run more commands.
    Chaining,
}

impl PipeRule {
    /// Evaluation order: the first rule that matches is reported.
    pub const PRIORITY: [PipeRule; 3] = [PipeRule::Pipe, PipeRule::Redirect, PipeRule::Chaining];

    /// Lowercase rule name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pipe => "pipe",
            Self::Redirect => "redirect",
            Self::Chaining => "chaining",
        }
    }
}

/// A pipe, redirect or chaining operator found after a cloud CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipeViolation {
    /// Which rule fired.
    pub rule: PipeRule,
    /// The literal operator that matched (`|`, `>>`, `&&`, ...).
    pub matched: String,
    /// The CLI the command starts with, lowercased.
    pub tool: String,
    /// What to do instead.
    pub correction: String,
}

impl fmt::Display for PipeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{rule} operator `{matched}` is not allowed after {tool}. {correction}",
            rule = self.rule.as_str(),
            matched = self.matched,
            tool = self.tool,
            correction = self.correction,
        )
    }
}

/// Rejects piping, redirection and chaining on configured cloud CLIs.
#[derive(Debug, Clone)]
pub struct CloudPolicyFilter {
    clis: HashSet<String>,
}

impl CloudPolicyFilter {
    /// Create a filter for the given CLI names (matched case-insensitively).
    pub fn new<I, S>(clis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            clis: clis
                .into_iter()
                .map(|c| c.as_ref().trim().to_ascii_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    /// Build the filter from classifier configuration.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(&config.cloud_clis)
    }

    /// The lowercased CLI name if `command` starts with a configured CLI.
    pub fn cloud_tool(&self, command: &str) -> Option<String> {
        let first = normalize_unit(command).split_whitespace().next()?;
        let lowered = first.to_ascii_lowercase();
        self.clis.contains(&lowered).then_some(lowered)
    }

    /// Check `command`, returning the first violation in rule priority order.
    ///
    /// Non-cloud commands always pass; operators inside quotes are ignored.
    pub fn check(&self, command: &str) -> Option<PipeViolation> {
        let tool = self.cloud_tool(command)?;
        let stripped = strip_quoted(command);

        let (rule, matched) = PipeRule::PRIORITY
            .iter()
            .find_map(|rule| find_operator(*rule, &stripped).map(|m| (*rule, m)))?;

        let violation = PipeViolation {
            rule,
            correction: correction_for(rule, &tool),
            matched: matched.to_owned(),
            tool,
        };
        tracing::warn!(
            tool = %violation.tool,
            rule = violation.rule.as_str(),
            matched = %violation.matched,
            "cloud command rejected by structural policy"
        );
        Some(violation)
    }
}

/// Find the literal for `rule` in quote-stripped text.
fn find_operator(rule: PipeRule, stripped: &str) -> Option<&'static str> {
    let bytes = stripped.as_bytes();
    match rule {
        PipeRule::Pipe => {
            let single_pipe = bytes.iter().enumerate().any(|(i, b)| {
                let prev = i.checked_sub(1).and_then(|p| bytes.get(p));
                *b == b'|' && prev != Some(&b'|') && bytes.get(i.saturating_add(1)) != Some(&b'|')
            });
            single_pipe.then_some("|")
        }
        PipeRule::Redirect => {
            if stripped.contains(">>") {
                Some(">>")
            } else if stripped.contains('>') {
                Some(">")
            } else {
                None
            }
        }
        PipeRule::Chaining => ["&&", "||", ";"]
            .into_iter()
            .find(|op| stripped.contains(op)),
    }
}

fn native_alternative(tool: &str) -> &'static str {
    match tool {
        "kubectl" => {
            "Use -o jsonpath='{...}', -o custom-columns=..., --field-selector or -l label selectors."
        }
        "gcloud" | "gsutil" | "bq" => {
            "Use --filter=... and --format=... (for example --format='value(name)')."
        }
        "aws" => "Use --query (JMESPath) and --output json|text|table.",
        "az" => "Use --query (JMESPath) and -o/--output.",
        "helm" => "Use -o json|yaml and --filter.",
        "terraform" | "terragrunt" => "Use -json and -no-color output modes (e.g. terraform output -json).",
        _ => "Use the CLI's own -o/--output and filter flags.",
    }
}

fn correction_for(rule: PipeRule, tool: &str) -> String {
    match rule {
        PipeRule::Pipe => format!(
            "Do not pipe {tool} output. {hint}",
            hint = native_alternative(tool)
        ),
        PipeRule::Redirect => format!(
            "Do not redirect {tool} output to a file; the tool result is already captured. {hint}",
            hint = native_alternative(tool)
        ),
        PipeRule::Chaining => format!(
            "Do not chain commands after {tool}; run each command as a separate tool call."
        ),
    }
}
