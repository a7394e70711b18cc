//! Command pattern catalog.
//!
//! The catalog is built once at start-up from the built-in rule tables plus
//! any operator-supplied extras, then shared read-only by every classifier.
//! Categories are evaluated in a fixed precedence by
//! [`TierClassifier`](super::classifier::TierClassifier):
//! blocked, conditionally-safe, always-safe, tier-1, tier-2, default.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;

use super::tier::SecurityTier;
use crate::config::ClassifierConfig;

// ---------------------------------------------------------------------------
// Built-in rule tables
// ---------------------------------------------------------------------------

/// Exact commands that skip classification entirely.
const FAST_PATH: &[&str] = &[
    "ls",
    "ls -l",
    "ls -la",
    "ls -al",
    "pwd",
    "whoami",
    "date",
    "git status",
    "git diff",
    "git log",
    "git branch",
    "kubectl get pods",
    "kubectl get nodes",
    "kubectl get ns",
    "kubectl get namespaces",
    "helm list",
    "terraform version",
    "gcloud config list",
];

/// Destructive patterns. Matched against the raw unit as well as the
/// normalized one, so they also fire inside substitutions.
const BLOCKED: &[(&str, &str)] = &[
    (
        "rm-recursive-or-force",
        r"\brm\s+(?:\S+\s+)*?(?:-[a-zA-Z]*[rRf][a-zA-Z]*|--recursive|--force)\b",
    ),
    ("sudo", r"(?:^|\s)sudo\s"),
    ("mkfs", r"\bmkfs(?:\.\w+)?\b"),
    ("dd-raw-copy", r"\bdd\s+if="),
    ("fork-bomb", r":\(\)\s*\{"),
    ("raw-device-write", r">\s*/dev/sd[a-z]"),
    ("chmod-world-writable-root", r"\bchmod\s+(?:-R\s+)?0?777\s+/"),
    ("eval", r"(?:^|\s)eval\s"),
    ("system-power", r"^(?:shutdown|reboot|halt|poweroff|init\s+[06])(?:\s|$)"),
    ("terraform-destroy", r"^(?:terraform|terragrunt)\s+(?:run-all\s+)?destroy(?:\s|$)"),
    ("terraform-auto-approve", r"^(?:terraform|terragrunt)\s.*-auto-approve\b"),
    (
        "terraform-state-surgery",
        r"^terraform\s+(?:state\s+(?:rm|mv|push|replace-provider)|force-unlock|taint|untaint)(?:\s|$)",
    ),
    (
        "kubectl-delete-cluster-scope",
        r"^kubectl\s+delete\s+(?:namespaces?|ns|nodes?|pv|persistentvolumes?|crds?|customresourcedefinitions?|clusterroles?)(?:\s|$)",
    ),
    ("kubectl-delete-all", r"^kubectl\s+delete\s.*\s--all(?:\s|$)"),
    ("kubectl-drain", r"^kubectl\s+drain(?:\s|$)"),
    ("helm-uninstall", r"^helm\s+(?:uninstall|delete)(?:\s|$)"),
    ("git-force-push", r"^git\s+push\s.*(?:--force(?:-with-lease)?|\s-f)(?:\s|$)"),
    ("git-hard-reset", r"^git\s+reset\s+--hard(?:\s|$)"),
    ("git-clean-force", r"^git\s+clean\s+(?:\S+\s+)*-[a-zA-Z]*f"),
    ("gcloud-delete", r"^gcloud\s.*\s(?:delete|reset)(?:\s|$)"),
    (
        "aws-delete",
        r"^aws\s.*\s(?:[\w-]*delete[\w-]*|terminate-instances|rb|rm)(?:\s|$)",
    ),
    ("az-delete", r"^az\s.*\sdelete(?:\s|$)"),
    ("sql-drop", r"(?i)\b(?:drop\s+(?:database|table|schema)|truncate\s+table)\b"),
];

/// Read-only commands regardless of arguments.
const ALWAYS_SAFE: &[(&str, &str)] = &[
    (
        "read-only-utility",
        r"^(?:ls|pwd|cat|head|tail|less|more|grep|egrep|fgrep|rg|wc|echo|printf|which|whoami|date|uname|hostname|id|df|du|free|uptime|ps|file|stat|diff|cut|tr|jq|basename|dirname|realpath|readlink|true|type|column|nl|md5sum|sha256sum)(?:\s|$)",
    ),
    (
        "git-read",
        r"^git\s+(?:status|log|diff|show|blame|rev-parse|ls-files|describe|shortlog|remote\s+-v|stash\s+list|tag\s+-l)(?:\s|$)",
    ),
    (
        "kubectl-read",
        r"^kubectl\s+(?:get|describe|logs|explain|version|top|api-resources|api-versions|cluster-info|auth\s+can-i|config\s+(?:view|get-contexts|current-context))(?:\s|$)",
    ),
    (
        "helm-read",
        r"^helm\s+(?:list|ls|status|get|history|show|search|version|env|repo\s+list)(?:\s|$)",
    ),
    (
        "terraform-read",
        r"^(?:terraform|terragrunt)\s+(?:show|output|version|providers|graph|state\s+(?:list|show))(?:\s|$)",
    ),
    ("gcloud-read", r"^gcloud\s+(?:[a-z][\w-]*\s+){0,3}(?:list|describe)(?:\s|$)"),
    (
        "gcloud-info",
        r"^gcloud\s+(?:config\s+(?:list|get-value)|auth\s+list|version|info)(?:\s|$)",
    ),
    ("aws-read", r"^aws\s+[\w-]+\s+(?:describe|list|get)-[\w-]+(?:\s|$)"),
    ("aws-identity", r"^aws\s+(?:sts\s+get-caller-identity|s3\s+ls|--version)(?:\s|$)"),
    ("az-read", r"^az\s+(?:[a-z][\w-]*\s+){0,3}(?:list|show)(?:\s|$)"),
    (
        "docker-read",
        r"^docker\s+(?:ps|images|logs|inspect|version|info)(?:\s|$)",
    ),
    ("flux-read", r"^flux\s+(?:get|logs|version|tree|stats|export)(?:\s|$)"),
];

/// Safe only while their flag condition holds.
const CONDITIONALLY_SAFE: &[(&str, &str, ConditionKind, &str)] = &[
    // In-place edits, script files, and the `w`/`W`/`e` script commands or
    // `s///w` and `s///e` flags, which write files or run commands.
    (
        "sed-without-in-place",
        r"^sed(?:\s|$)",
        ConditionKind::Forbids,
        r#"\s(?:--in-place\S*|-[a-zA-Z]*[if]\S*|--file\S*)(?:\s|$)|[/|#,:@!][gpiImM0-9]*[we](?:\s|$|[;'"}])|(?:^|[\s'";{}])(?:(?:\d+|\$)(?:,(?:\d+|\$))?!?)?[wWe](?:\s|$|[;'"}])"#,
    ),
    (
        "sort-to-stdout",
        r"^sort(?:\s|$)",
        ConditionKind::Forbids,
        r"\s(?:-[a-zA-Z]*o\S*|--output\S*|--compress-program\S*)(?:\s|$)",
    ),
    // A second operand is the output file.
    (
        "uniq-to-stdout",
        r"^uniq(?:\s|$)",
        ConditionKind::Forbids,
        r"^uniq(?:\s+-\S+)*\s+[^-\s]\S*\s+\S",
    ),
    (
        "yq-without-in-place",
        r"^yq(?:\s|$)",
        ConditionKind::Forbids,
        r"\s(?:-[a-zA-Z]*[is]\S*|--inplace\S*|--split-exp\S*)(?:\s|$)",
    ),
    (
        "tree-to-stdout",
        r"^tree(?:\s|$)",
        ConditionKind::Forbids,
        r"\s(?:-[a-zA-Z]*o\S*|--output\S*)(?:\s|$)",
    ),
    (
        "find-without-actions",
        r"^find(?:\s|$)",
        ConditionKind::Forbids,
        r"\s-(?:delete|exec|execdir|ok|okdir|fprint\w*|fls)(?:\s|$)",
    ),
    (
        "git-branch-listing",
        r"^git\s+branch(?:\s|$)",
        ConditionKind::Forbids,
        r"\s(?:-[a-zA-Z]*[dDmMcCf][a-zA-Z]*|--delete|--move|--copy|--force)(?:\s|$)",
    ),
    (
        "curl-read-only",
        r"^curl(?:\s|$)",
        ConditionKind::Forbids,
        r#"\s(?:-[a-zA-Z]*X\s*["']?(?i:POST|PUT|PATCH|DELETE)|--request[\s=]*["']?(?i:POST|PUT|PATCH|DELETE)|-[a-zA-Z]*[dFToOKcD]|--data[\w-]*|--json|--form[\w-]*|--upload[\w-]*|--url-query|--output[\w-]*|--remote-name[\w-]*|--config|--cookie-jar|--dump-header|--trace[\w-]*|--libcurl|--stderr)"#,
    ),
    (
        "git-clean-preview",
        r"^git\s+clean(?:\s|$)",
        ConditionKind::Requires,
        r"\s(?:--dry-run|-[a-zA-Z]*n[a-zA-Z]*)(?:\s|$)",
    ),
];

/// Local validation and idempotent checks.
const TIER1: &[(&str, &str)] = &[
    (
        "terraform-validate",
        r"^(?:terraform|terragrunt)\s+(?:validate|init|get|providers\s+lock|run-all\s+validate)(?:\s|$)",
    ),
    ("terraform-fmt-check", r"^(?:terraform|terragrunt)\s+(?:hcl)?fmt\s.*-check\b"),
    (
        "linters",
        r"^(?:tflint|tfsec|checkov|kubeconform|kubeval|shellcheck|yamllint|hadolint|actionlint|markdownlint)(?:\s|$)",
    ),
    (
        "helm-render",
        r"^helm\s+(?:lint|template|dependency\s+(?:list|build|update)|repo\s+update)(?:\s|$)",
    ),
    ("kustomize-build", r"^(?:kustomize\s+build|kubectl\s+kustomize)(?:\s|$)"),
    ("flux-check", r"^flux\s+check(?:\s|$)"),
    ("git-fetch", r"^git\s+fetch(?:\s|$)"),
    (
        "build-and-test",
        r"^(?:cargo\s+(?:check|clippy|test|build|doc|fmt\s+--check)|npm\s+(?:test|run\s+(?:lint|test|build|typecheck))|npx\s+tsc\s+--noEmit|pytest|python3?\s+-m\s+(?:pytest|mypy|ruff)|ruff\s+check|mypy|go\s+(?:vet|test|build)|make\s+(?:test|lint|check|validate)|pre-commit\s+run)(?:\s|$)",
    ),
];

/// Explicit plan, diff or dry-run semantics.
const TIER2: &[(&str, &str)] = &[
    ("terraform-plan", r"^(?:terraform|terragrunt)\s+(?:run-all\s+)?plan(?:\s|$)"),
    (
        "kubectl-dry-run",
        r"^kubectl\s+(?:apply|create|delete|patch|replace|scale|set|label|annotate)\s.*--dry-run(?:=(?:client|server))?(?:\s|$)",
    ),
    ("kubectl-diff", r"^kubectl\s+diff(?:\s|$)"),
    ("helm-dry-run", r"^helm\s+(?:install|upgrade)\s.*--dry-run(?:\s|$)"),
    ("helm-diff", r"^helm\s+diff(?:\s|$)"),
    ("flux-diff", r"^flux\s+diff(?:\s|$)"),
    ("ansible-check", r"^ansible-playbook\s.*--check(?:\s|$)"),
    ("git-push-dry-run", r"^git\s+push\s.*(?:--dry-run|\s-n)(?:\s|$)"),
    ("cloud-dry-run", r"^(?:gcloud|aws|rsync)\s.*--dry-run(?:\s|$)"),
];

// ---------------------------------------------------------------------------
// Rule types
// ---------------------------------------------------------------------------

/// Category a rule belongs to; decides both precedence and implied tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// Forbidden; always T3.
    Blocked,
    /// Safe only while its condition holds.
    ConditionallySafe,
    /// Read-only regardless of arguments.
    AlwaysSafe,
    /// Validating or idempotent.
    Tier1,
    /// Dry-run, plan or diff.
    Tier2,
}

impl RuleCategory {
    /// Tier implied by a match in this category.
    pub fn implied_tier(self) -> SecurityTier {
        match self {
            Self::Blocked => SecurityTier::T3Blocked,
            Self::ConditionallySafe | Self::AlwaysSafe => SecurityTier::T0ReadOnly,
            Self::Tier1 => SecurityTier::T1Validation,
            Self::Tier2 => SecurityTier::T2DryRun,
        }
    }
}

/// A named regex pattern and the category it belongs to.
#[derive(Debug, Clone)]
pub struct PatternRule {
    name: String,
    regex: Regex,
    category: RuleCategory,
}

impl PatternRule {
    fn compile(name: &str, pattern: &str, category: RuleCategory) -> Result<Self, CatalogError> {
        let regex = Regex::new(pattern).map_err(|source| CatalogError::InvalidPattern {
            name: name.to_owned(),
            source,
        })?;
        Ok(Self {
            name: name.to_owned(),
            regex,
            category,
        })
    }

    /// Rule name, used in decision reasons.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category of the rule.
    pub fn category(&self) -> RuleCategory {
        self.category
    }

    /// Whether the rule matches `text`.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Whether a conditional rule's flag pattern must be absent or present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    /// Safe only if the flag pattern does not occur.
    Forbids,
    /// Safe only if the flag pattern occurs.
    Requires,
}

/// A conditionally-safe rule: the base pattern plus a flag condition.
#[derive(Debug, Clone)]
pub struct ConditionalRule {
    rule: PatternRule,
    kind: ConditionKind,
    flag: Regex,
}

impl ConditionalRule {
    /// The base pattern rule.
    pub fn rule(&self) -> &PatternRule {
        &self.rule
    }

    /// Whether the safety condition holds for a unit.
    ///
    /// Forbidden flags are searched in the raw text, so quoting a flag never
    /// hides it. Required flags must appear outside quotes.
    pub fn condition_met(&self, raw: &str, stripped: &str) -> bool {
        match self.kind {
            ConditionKind::Forbids => !self.flag.is_match(raw),
            ConditionKind::Requires => self.flag.is_match(stripped),
        }
    }
}

/// Failure to build the catalog from configured patterns.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A pattern did not compile.
    #[error("invalid pattern {name:?}: {source}")]
    InvalidPattern {
        /// Rule name.
        name: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable set of classification rules, built once and shared by reference.
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    fast_path: HashSet<String>,
    blocked: Vec<PatternRule>,
    conditional: Vec<ConditionalRule>,
    always_safe: Vec<PatternRule>,
    tier1: Vec<PatternRule>,
    tier2: Vec<PatternRule>,
}

impl PatternCatalog {
    /// Build the catalog from the built-in rule tables only.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidPattern`] if a built-in pattern fails
    /// to compile.
    pub fn builtin() -> Result<Self, CatalogError> {
        Ok(Self {
            fast_path: FAST_PATH.iter().map(|s| (*s).to_owned()).collect(),
            blocked: compile_table(BLOCKED, RuleCategory::Blocked)?,
            conditional: CONDITIONALLY_SAFE
                .iter()
                .map(|(name, pattern, kind, flag)| {
                    let rule = PatternRule::compile(name, pattern, RuleCategory::ConditionallySafe)?;
                    let flag = Regex::new(flag).map_err(|source| CatalogError::InvalidPattern {
                        name: format!("{name}/condition"),
                        source,
                    })?;
                    Ok(ConditionalRule {
                        rule,
                        kind: *kind,
                        flag,
                    })
                })
                .collect::<Result<_, CatalogError>>()?,
            always_safe: compile_table(ALWAYS_SAFE, RuleCategory::AlwaysSafe)?,
            tier1: compile_table(TIER1, RuleCategory::Tier1)?,
            tier2: compile_table(TIER2, RuleCategory::Tier2)?,
        })
    }

    /// Build the built-in catalog and append configured extra patterns.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidPattern`] naming the offending entry.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, CatalogError> {
        let mut catalog = Self::builtin()?;
        for (idx, pattern) in config.extra_blocked.iter().enumerate() {
            let name = format!("custom-blocked-{idx}");
            catalog
                .blocked
                .push(PatternRule::compile(&name, pattern, RuleCategory::Blocked)?);
        }
        for (idx, pattern) in config.extra_safe.iter().enumerate() {
            let name = format!("custom-safe-{idx}");
            catalog
                .always_safe
                .push(PatternRule::compile(&name, pattern, RuleCategory::AlwaysSafe)?);
        }
        tracing::debug!(
            blocked = catalog.blocked.len(),
            always_safe = catalog.always_safe.len(),
            "pattern catalog built"
        );
        Ok(catalog)
    }

    /// Whether `command` is an exact ultra-common safe command.
    pub fn is_fast_path(&self, command: &str) -> bool {
        self.fast_path.contains(command)
    }

    /// First blocked rule matching `text`.
    pub fn blocked_match(&self, text: &str) -> Option<&PatternRule> {
        self.blocked.iter().find(|r| r.matches(text))
    }

    /// First conditional rule whose base pattern matches `text`.
    pub fn conditional_match(&self, text: &str) -> Option<&ConditionalRule> {
        self.conditional.iter().find(|r| r.rule.matches(text))
    }

    /// First rule of a non-conditional `category` matching `text`.
    pub fn first_match(&self, category: RuleCategory, text: &str) -> Option<&PatternRule> {
        self.rules(category).iter().find(|r| r.matches(text))
    }

    /// Rules of a category. Conditional rules are exposed through
    /// [`conditional_match`](Self::conditional_match) and yield an empty slice.
    pub fn rules(&self, category: RuleCategory) -> &[PatternRule] {
        match category {
            RuleCategory::Blocked => &self.blocked,
            RuleCategory::AlwaysSafe => &self.always_safe,
            RuleCategory::Tier1 => &self.tier1,
            RuleCategory::Tier2 => &self.tier2,
            RuleCategory::ConditionallySafe => &[],
        }
    }
}

fn compile_table(
    table: &[(&str, &str)],
    category: RuleCategory,
) -> Result<Vec<PatternRule>, CatalogError> {
    table
        .iter()
        .map(|(name, pattern)| PatternRule::compile(name, pattern, category))
        .collect()
}

/// Strip leading `VAR=value` assignments and any path prefix on the command
/// word, so `FOO=1 /usr/bin/kubectl get pods` matches like `kubectl get pods`.
pub fn normalize_unit(unit: &str) -> &str {
    let mut rest = unit.trim_start();
    loop {
        let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..word_end];
        if is_env_assignment(word) && word_end < rest.len() {
            rest = rest[word_end..].trim_start();
            continue;
        }
        if let Some(slash) = word.rfind('/') {
            // Keep the basename of a path-qualified command word.
            return &rest[slash.saturating_add(1)..];
        }
        return rest;
    }
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            let mut chars = name.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}
