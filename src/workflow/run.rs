//! A single workflow run moving through the phases.
//!
//! The run owns no policy; it asks the [`Enforcer`] at every transition and
//! records what happened.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::approval::{ApprovalAction, ApprovalValidation};
use super::enforcer::Enforcer;
use super::guards::{GuardContext, GuardViolation};
use super::phase::Phase;

/// Where a run currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Working in `phase`.
    Active {
        /// Current phase.
        phase: Phase,
    },
    /// A guard failed while leaving `phase`; new input is needed.
    Blocked {
        /// Phase the run is stuck in.
        phase: Phase,
        /// The unresolved violation.
        violation: GuardViolation,
    },
    /// Explicitly stopped, e.g. the plan was rejected.
    Halted {
        /// Phase at which the run stopped.
        phase: Phase,
        /// Why.
        reason: String,
    },
    /// All phases finished.
    Completed,
}

impl WorkflowStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Halted { .. } | Self::Completed)
    }
}

/// Errors from driving a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    /// A guard blocked the transition.
    #[error(transparent)]
    Guard(#[from] GuardViolation),
    /// The run already ended.
    #[error("workflow run has already ended ({0})")]
    Terminal(String),
}

/// One recorded phase change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// Phase left.
    pub from: Phase,
    /// Phase entered, `None` on completion.
    pub to: Option<Phase>,
    /// When it happened.
    pub at: DateTime<Utc>,
}

/// A workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun {
    id: Uuid,
    status: WorkflowStatus,
    history: Vec<Transition>,
}

impl WorkflowRun {
    /// Start a run at Clarification.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: WorkflowStatus::Active {
                phase: Phase::Clarification,
            },
            history: Vec::new(),
        }
    }

    /// Run identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current status.
    pub fn status(&self) -> &WorkflowStatus {
        &self.status
    }

    /// Current phase, `None` once completed.
    pub fn phase(&self) -> Option<Phase> {
        match &self.status {
            WorkflowStatus::Active { phase }
            | WorkflowStatus::Blocked { phase, .. }
            | WorkflowStatus::Halted { phase, .. } => Some(*phase),
            WorkflowStatus::Completed => None,
        }
    }

    /// Recorded transitions, oldest first.
    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// Move to the next phase if the current phase's exit guards and the
    /// next phase's entry guards all pass.
    ///
    /// A blocked run may be advanced again once the caller has new input.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::Guard`] when a guard fails (the run becomes
    /// Blocked), [`WorkflowError::Terminal`] when the run already ended.
    pub fn advance(
        &mut self,
        enforcer: &Enforcer,
        ctx: &GuardContext,
    ) -> Result<&WorkflowStatus, WorkflowError> {
        let phase = self.current_open_phase()?;
        let next = phase.next();

        let checked = enforcer.enforce_exit(phase, ctx).and_then(|_| match next {
            Some(next) => enforcer.enforce_entry(next, ctx),
            None => Ok(Vec::new()),
        });
        if let Err(violation) = checked {
            self.status = WorkflowStatus::Blocked {
                phase,
                violation: violation.clone(),
            };
            return Err(WorkflowError::Guard(violation));
        }

        self.history.push(Transition {
            from: phase,
            to: next,
            at: Utc::now(),
        });
        self.status = match next {
            Some(phase) => WorkflowStatus::Active { phase },
            None => WorkflowStatus::Completed,
        };
        tracing::info!(run = %self.id, from = %phase, ?next, "workflow advanced");
        Ok(&self.status)
    }

    /// Stop the run.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::Terminal`] when the run already ended.
    pub fn halt(&mut self, reason: impl Into<String>) -> Result<(), WorkflowError> {
        let phase = self.current_open_phase()?;
        let reason = reason.into();
        tracing::info!(run = %self.id, phase = %phase, %reason, "workflow halted");
        self.status = WorkflowStatus::Halted { phase, reason };
        Ok(())
    }

    /// Apply an approval reply: a rejection halts the run, anything else
    /// leaves it as is. Returns the validation for the caller to record.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::Terminal`] when the run already ended.
    pub fn apply_approval_response(
        &mut self,
        response: &str,
    ) -> Result<ApprovalValidation, WorkflowError> {
        self.current_open_phase()?;
        let validation = ApprovalValidation::from_response(response);
        if validation.action == ApprovalAction::HaltWorkflow {
            self.halt("plan rejected by user")?;
        }
        Ok(validation)
    }

    fn current_open_phase(&self) -> Result<Phase, WorkflowError> {
        match &self.status {
            WorkflowStatus::Active { phase } | WorkflowStatus::Blocked { phase, .. } => Ok(*phase),
            WorkflowStatus::Halted { .. } => Err(WorkflowError::Terminal("halted".to_owned())),
            WorkflowStatus::Completed => Err(WorkflowError::Terminal("completed".to_owned())),
        }
    }
}

impl Default for WorkflowRun {
    fn default() -> Self {
        Self::new()
    }
}
