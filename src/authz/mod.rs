//! Command authorization pipeline.
//!
//! Every intercepted shell command flows through
//! [`CloudPolicyFilter`] → [`TierClassifier`] → [`CommandDecision`].
//! Delegations to sub-agents go through [`DelegationValidator`] instead.

pub mod cache;
pub mod catalog;
pub mod classifier;
pub mod cloud;
pub mod delegation;
pub mod scanner;
pub mod tier;

use std::sync::Arc;

use serde::Serialize;

pub use catalog::{CatalogError, PatternCatalog, RuleCategory};
pub use classifier::{Classification, TierClassifier};
pub use cloud::{CloudPolicyFilter, PipeRule, PipeViolation};
pub use delegation::{DelegationBlock, DelegationRequest, DelegationValidator, DelegationVerdict};
pub use tier::SecurityTier;

use crate::config::ClassifierConfig;

/// Decision for a single shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum CommandDecision {
    /// Run the command.
    Allow {
        /// Classified tier (T0–T2).
        tier: SecurityTier,
        /// What decided the tier.
        reason: String,
    },
    /// Refuse and explain how to rephrase; recoverable, never fatal.
    Block {
        /// The structural violation.
        violation: PipeViolation,
    },
    /// T3: the command needs an explicit human approval phase.
    RequireApproval {
        /// Always T3.
        tier: SecurityTier,
        /// What decided the tier.
        reason: String,
    },
}

impl CommandDecision {
    /// Human-readable reason for the decision.
    pub fn reason(&self) -> String {
        match self {
            Self::Allow { reason, .. } | Self::RequireApproval { reason, .. } => reason.clone(),
            Self::Block { violation } => violation.to_string(),
        }
    }

    /// Tier, if classification ran.
    pub fn tier(&self) -> Option<SecurityTier> {
        match self {
            Self::Allow { tier, .. } | Self::RequireApproval { tier, .. } => Some(*tier),
            Self::Block { .. } => None,
        }
    }
}

/// Runs the cloud filter, then the classifier, for each command.
#[derive(Debug)]
pub struct CommandAuthorizer {
    filter: CloudPolicyFilter,
    classifier: TierClassifier,
}

impl CommandAuthorizer {
    /// Assemble an authorizer from its parts.
    pub fn new(filter: CloudPolicyFilter, classifier: TierClassifier) -> Self {
        Self { filter, classifier }
    }

    /// Build catalog, filter and classifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if a configured pattern does not compile.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, CatalogError> {
        let catalog = Arc::new(PatternCatalog::from_config(config)?);
        Ok(Self::new(
            CloudPolicyFilter::from_config(config),
            TierClassifier::new(catalog, config.cache_capacity),
        ))
    }

    /// The classifier used after the cloud filter.
    pub fn classifier(&self) -> &TierClassifier {
        &self.classifier
    }

    /// The cloud filter run before classification.
    pub fn filter(&self) -> &CloudPolicyFilter {
        &self.filter
    }

    /// Decide what happens to `command`.
    pub fn authorize(&self, command: &str) -> CommandDecision {
        if let Some(violation) = self.filter.check(command) {
            return CommandDecision::Block { violation };
        }

        let classification = self.classifier.classify_with_reason(command);
        let reason = classification.reason();
        if classification.tier.requires_approval() {
            tracing::info!(command, rule = %classification.rule, "command requires approval");
            CommandDecision::RequireApproval {
                tier: classification.tier,
                reason,
            }
        } else {
            CommandDecision::Allow {
                tier: classification.tier,
                reason,
            }
        }
    }
}
