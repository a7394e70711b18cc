//! Workflow guard engine.
//!
//! The orchestration workflow runs seven phases in a fixed order. Named
//! guards gate every transition that matters; `approval-mandatory` is the
//! one guard that can never be bypassed for T3 work.

pub mod approval;
pub mod enforcer;
pub mod guards;
pub mod phase;
pub mod run;

pub use approval::{ApprovalAction, ApprovalValidation};
pub use enforcer::Enforcer;
pub use guards::{
    Boundary, GuardContext, GuardName, GuardPass, GuardReport, GuardSettings, GuardViolation,
};
pub use phase::Phase;
pub use run::{Transition, WorkflowError, WorkflowRun, WorkflowStatus};
