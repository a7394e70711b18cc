//! Policy for delegating work to sub-agents.
//!
//! A text-level safety net above [`TierClassifier`](super::TierClassifier):
//! the orchestrator may only delegate to known agents, and a prompt asking a
//! sub-agent to run a destructive infrastructure operation must carry
//! evidence that the approval gate has already been passed.

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::catalog::CatalogError;
use crate::config::DelegationConfig;

/// Phrases tying a prompt to a destructive infrastructure operation.
const RISK_KEYWORDS: &[(&str, &str)] = &[
    (
        "terraform apply/destroy",
        r"(?i)\b(?:terraform|terragrunt)\s+(?:run-all\s+)?(?:apply|destroy)\b",
    ),
    (
        "kubectl mutation",
        r"(?i)\bkubectl\s+(?:apply|delete|patch|scale|drain|replace|rollout\s+restart)\b",
    ),
    (
        "helm release change",
        r"(?i)\bhelm\s+(?:install|upgrade|uninstall|rollback|delete)\b",
    ),
    ("flux mutation", r"(?i)\bflux\s+(?:reconcile|suspend|resume|delete)\b"),
    ("git push", r"(?i)\bgit\s+push\b"),
    (
        "cloud resource deletion",
        r"(?i)\b(?:gcloud|aws|az)\b.*\b(?:delete|terminate|destroy)\b",
    ),
];

/// Phrases showing the approval gate has been passed.
const APPROVAL_EVIDENCE: &str = r"(?i)\b(?:user\s+approval\s+received|approval\s+(?:received|confirmed|granted)|approved\s+by\s+(?:the\s+)?user|user\s+approved|phase\s*5|realization\s+phase)\b";

/// A request from the orchestrator to hand a task to a sub-agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRequest {
    /// Identifier of the agent that should run the task.
    pub target_agent: String,
    /// Free-text task description.
    pub prompt: String,
}

impl DelegationRequest {
    /// Convenience constructor.
    pub fn new(target_agent: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            target_agent: target_agent.into(),
            prompt: prompt.into(),
        }
    }
}

/// Why a delegation was blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelegationBlock {
    /// The target agent is not a known agent.
    #[error("agent {agent:?} does not exist; known agents: {}", .known.join(", "))]
    UnknownAgent {
        /// Requested agent.
        agent: String,
        /// Agents that do exist.
        known: Vec<String>,
    },
    /// A high-risk operation was requested without approval evidence.
    #[error(
        "delegation to {agent:?} requests a high-risk operation ({keyword}) without approval \
         evidence; run the approval gate workflow and record the user's approval first"
    )]
    ApprovalRequired {
        /// Requested agent.
        agent: String,
        /// The risk keyword that matched.
        keyword: String,
    },
}

/// Outcome of validating a delegation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegationVerdict {
    /// The delegation may proceed.
    Allow,
    /// The delegation is blocked.
    Block(DelegationBlock),
}

impl DelegationVerdict {
    /// Whether the delegation may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Validates delegation requests against known agents and risk keywords.
#[derive(Debug, Clone)]
pub struct DelegationValidator {
    known_agents: BTreeSet<String>,
    risk_keywords: Vec<(String, Regex)>,
    evidence: Regex,
}

impl DelegationValidator {
    /// Create a validator for `known_agents` plus extra risk keyword regexes.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidPattern`] if an extra keyword pattern
    /// does not compile.
    pub fn new<I, S>(known_agents: I, extra_risk_keywords: &[String]) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let builtin = RISK_KEYWORDS
            .iter()
            .map(|(name, pattern)| ((*name).to_owned(), (*pattern).to_owned()));
        let extra = extra_risk_keywords
            .iter()
            .map(|pattern| (pattern.clone(), format!("(?i){pattern}")));

        let risk_keywords = builtin
            .chain(extra)
            .map(|(name, pattern)| match Regex::new(&pattern) {
                Ok(re) => Ok((name, re)),
                Err(source) => Err(CatalogError::InvalidPattern { name, source }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let evidence =
            Regex::new(APPROVAL_EVIDENCE).map_err(|source| CatalogError::InvalidPattern {
                name: "approval-evidence".to_owned(),
                source,
            })?;

        Ok(Self {
            known_agents: known_agents.into_iter().map(Into::into).collect(),
            risk_keywords,
            evidence,
        })
    }

    /// Build the validator from delegation configuration.
    ///
    /// # Errors
    ///
    /// See [`DelegationValidator::new`].
    pub fn from_config(config: &DelegationConfig) -> Result<Self, CatalogError> {
        Self::new(config.known_agents.iter().cloned(), &config.extra_risk_keywords)
    }

    /// Whether `agent` is a known agent identifier.
    pub fn agent_exists(&self, agent: &str) -> bool {
        self.known_agents.contains(agent)
    }

    /// Known agent identifiers, sorted.
    pub fn known_agents(&self) -> impl Iterator<Item = &str> {
        self.known_agents.iter().map(String::as_str)
    }

    /// Name of the first risk keyword found in `prompt`.
    pub fn risk_keyword(&self, prompt: &str) -> Option<&str> {
        self.risk_keywords
            .iter()
            .find(|(_, re)| re.is_match(prompt))
            .map(|(name, _)| name.as_str())
    }

    /// Whether `prompt` carries approval evidence.
    pub fn has_approval_evidence(&self, prompt: &str) -> bool {
        self.evidence.is_match(prompt)
    }

    /// Validate a delegation request.
    pub fn validate(&self, request: &DelegationRequest) -> DelegationVerdict {
        let agent = request.target_agent.trim();
        if !self.agent_exists(agent) {
            let block = DelegationBlock::UnknownAgent {
                agent: agent.to_owned(),
                known: self.known_agents.iter().cloned().collect(),
            };
            tracing::warn!(agent, "delegation to unknown agent blocked");
            return DelegationVerdict::Block(block);
        }

        if let Some(keyword) = self.risk_keyword(&request.prompt) {
            if !self.has_approval_evidence(&request.prompt) {
                tracing::warn!(agent, keyword, "high-risk delegation without approval evidence");
                return DelegationVerdict::Block(DelegationBlock::ApprovalRequired {
                    agent: agent.to_owned(),
                    keyword: keyword.to_owned(),
                });
            }
            tracing::info!(agent, keyword, "high-risk delegation carries approval evidence");
        }

        DelegationVerdict::Allow
    }
}
