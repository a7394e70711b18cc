//! The seven ordered phases of the orchestration workflow.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::guards::GuardName;

/// Workflow phase. Phases run strictly in declaration order; none is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Resolve ambiguity in the request.
    Clarification,
    /// Pick the agent that will do the work.
    Routing,
    /// Assemble the context the agent's contract requires.
    ContextProvisioning,
    /// Produce a reviewable realization package.
    Planning,
    /// Human approval of the plan.
    ApprovalGate,
    /// Execute against live systems.
    Realization,
    /// Record the new state in the source of truth.
    SsotUpdate,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 7] = [
        Phase::Clarification,
        Phase::Routing,
        Phase::ContextProvisioning,
        Phase::Planning,
        Phase::ApprovalGate,
        Phase::Realization,
        Phase::SsotUpdate,
    ];

    /// 1-based phase number as shown to operators.
    pub fn number(self) -> u8 {
        match self {
            Self::Clarification => 1,
            Self::Routing => 2,
            Self::ContextProvisioning => 3,
            Self::Planning => 4,
            Self::ApprovalGate => 5,
            Self::Realization => 6,
            Self::SsotUpdate => 7,
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Clarification => "Clarification",
            Self::Routing => "Routing",
            Self::ContextProvisioning => "Context Provisioning",
            Self::Planning => "Planning",
            Self::ApprovalGate => "Approval Gate",
            Self::Realization => "Realization",
            Self::SsotUpdate => "SSOT Update",
        }
    }

    /// The phase after this one, `None` after SSOT Update.
    pub fn next(self) -> Option<Phase> {
        match self {
            Self::Clarification => Some(Self::Routing),
            Self::Routing => Some(Self::ContextProvisioning),
            Self::ContextProvisioning => Some(Self::Planning),
            Self::Planning => Some(Self::ApprovalGate),
            Self::ApprovalGate => Some(Self::Realization),
            Self::Realization => Some(Self::SsotUpdate),
            Self::SsotUpdate => None,
        }
    }

    /// Guards that must pass before leaving this phase.
    pub fn exit_guards(self) -> &'static [GuardName] {
        match self {
            Self::Clarification => &[GuardName::AmbiguityThreshold],
            Self::Routing => &[GuardName::RoutingConfidence, GuardName::AgentExists],
            Self::ContextProvisioning => &[GuardName::ContextCompleteness],
            Self::Planning | Self::ApprovalGate | Self::Realization | Self::SsotUpdate => &[],
        }
    }

    /// Guards that must pass before entering this phase.
    pub fn entry_guards(self) -> &'static [GuardName] {
        match self {
            Self::ApprovalGate => &[GuardName::PlanningComplete],
            Self::Realization => &[GuardName::ApprovalMandatory, GuardName::ApprovalValidation],
            Self::SsotUpdate => &[GuardName::SsotUpdateAfterT3],
            Self::Clarification | Self::Routing | Self::ContextProvisioning | Self::Planning => &[],
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Phase {}: {}", self.number(), self.name())
    }
}
