//! Risk-tier classification of shell commands.
//!
//! Classification is total and deterministic: every input maps to exactly
//! one [`SecurityTier`], unmatched input maps to T3, and no live system
//! state is ever inspected.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use super::cache::RecencyCache;
use super::catalog::{normalize_unit, PatternCatalog, RuleCategory};
use super::scanner::{
    has_command_substitution, has_file_redirect, has_unit_separator, split_units, strip_quoted,
};
use super::tier::SecurityTier;

/// Rule name reported for an empty command.
pub const RULE_EMPTY: &str = "empty-command";
/// Rule name reported for a fast-path or cached hit.
pub const RULE_FAST_PATH: &str = "fast-path";
/// Rule name reported for a command substitution.
pub const RULE_SUBSTITUTION: &str = "command-substitution";
/// Rule name reported for an output redirection into a file.
pub const RULE_FILE_REDIRECT: &str = "file-redirect";
/// Rule name reported when nothing matched.
pub const RULE_UNMATCHED: &str = "unmatched-default";

/// Tier of a command together with what decided it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Resulting tier.
    pub tier: SecurityTier,
    /// Name of the rule that decided the tier of the riskiest unit.
    pub rule: String,
    /// Category of that rule, if it came from the catalog.
    pub category: Option<RuleCategory>,
    /// The unit (sub-command) that decided the tier.
    pub unit: String,
}

impl Classification {
    fn new(tier: SecurityTier, rule: &str, category: Option<RuleCategory>, unit: &str) -> Self {
        Self {
            tier,
            rule: rule.to_owned(),
            category,
            unit: unit.to_owned(),
        }
    }

    /// One-line explanation suitable for an operator.
    pub fn reason(&self) -> String {
        format!(
            "{tier} ({desc}): `{unit}` matched {rule}",
            tier = self.tier,
            desc = self.tier.description(),
            unit = self.unit,
            rule = self.rule,
        )
    }
}

/// Maps command strings to tiers using a shared [`PatternCatalog`].
///
/// The only mutable state is the T0 recency cache, guarded by a sync
/// [`Mutex`] since the critical section is a map lookup.
#[derive(Debug)]
pub struct TierClassifier {
    catalog: Arc<PatternCatalog>,
    cache: Mutex<RecencyCache>,
}

impl TierClassifier {
    /// Create a classifier over `catalog` with a T0 cache of `cache_capacity`.
    pub fn new(catalog: Arc<PatternCatalog>, cache_capacity: usize) -> Self {
        Self {
            catalog,
            cache: Mutex::new(RecencyCache::new(cache_capacity)),
        }
    }

    /// Classify `command` into a tier.
    pub fn classify(&self, command: &str) -> SecurityTier {
        self.classify_with_reason(command).tier
    }

    /// Classify `command` and report which unit and rule decided the tier.
    ///
    /// A compound command takes the highest tier of its units.
    pub fn classify_with_reason(&self, command: &str) -> Classification {
        let command = command.trim();
        if command.is_empty() {
            return Classification::new(SecurityTier::T0ReadOnly, RULE_EMPTY, None, command);
        }

        if self.fast_path_hit(command) {
            return Classification::new(SecurityTier::T0ReadOnly, RULE_FAST_PATH, None, command);
        }

        let units = if has_unit_separator(command) {
            split_units(command)
        } else {
            vec![command]
        };

        let mut worst: Option<Classification> = None;
        for unit in units {
            let current = self.classify_unit(unit);
            let is_worse = worst.as_ref().map_or(true, |w| current.tier > w.tier);
            if is_worse {
                worst = Some(current);
            }
            if worst
                .as_ref()
                .is_some_and(|w| w.tier == SecurityTier::T3Blocked)
            {
                break;
            }
        }

        // Only separators, e.g. ";;": nothing to run.
        let result = worst.unwrap_or_else(|| {
            Classification::new(SecurityTier::T0ReadOnly, RULE_EMPTY, None, command)
        });

        if result.tier == SecurityTier::T0ReadOnly {
            self.remember(command);
        }
        debug!(command, tier = %result.tier, rule = %result.rule, "command classified");
        result
    }

    /// Classify a single unit, first match wins.
    fn classify_unit(&self, unit: &str) -> Classification {
        let normalized = normalize_unit(unit);

        if let Some(rule) = self
            .catalog
            .blocked_match(unit)
            .or_else(|| self.catalog.blocked_match(normalized))
        {
            return Classification::new(
                SecurityTier::T3Blocked,
                rule.name(),
                Some(RuleCategory::Blocked),
                unit,
            );
        }
        if has_command_substitution(unit) {
            return Classification::new(SecurityTier::T3Blocked, RULE_SUBSTITUTION, None, unit);
        }
        if has_file_redirect(unit) {
            return Classification::new(SecurityTier::T3Blocked, RULE_FILE_REDIRECT, None, unit);
        }

        // A conditional rule whose condition fails never reaches the
        // always-safe category; it can still be T1/T2 or default to T3.
        let mut safe_allowed = true;
        if let Some(conditional) = self.catalog.conditional_match(normalized) {
            let stripped = strip_quoted(normalized);
            if conditional.condition_met(normalized, &stripped) {
                return Classification::new(
                    SecurityTier::T0ReadOnly,
                    conditional.rule().name(),
                    Some(RuleCategory::ConditionallySafe),
                    unit,
                );
            }
            safe_allowed = false;
        }

        let categories: &[RuleCategory] = if safe_allowed {
            &[RuleCategory::AlwaysSafe, RuleCategory::Tier1, RuleCategory::Tier2]
        } else {
            &[RuleCategory::Tier1, RuleCategory::Tier2]
        };
        for category in categories {
            if let Some(rule) = self.catalog.first_match(*category, normalized) {
                return Classification::new(
                    category.implied_tier(),
                    rule.name(),
                    Some(*category),
                    unit,
                );
            }
        }

        Classification::new(SecurityTier::T3Blocked, RULE_UNMATCHED, None, unit)
    }

    /// Check the recency cache, then the fixed fast-path set.
    fn fast_path_hit(&self, command: &str) -> bool {
        let Ok(mut cache) = self.cache.lock() else {
            return self.catalog.is_fast_path(command);
        };
        if cache.get(command).is_some() {
            return true;
        }
        if self.catalog.is_fast_path(command) {
            cache.insert(command, SecurityTier::T0ReadOnly);
            return true;
        }
        false
    }

    fn remember(&self, command: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(command, SecurityTier::T0ReadOnly);
        }
    }

    /// Number of commands currently held by the fast-path cache.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}
