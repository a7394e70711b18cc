//! Named phase-transition guards.
//!
//! Each guard is a pure predicate over a [`GuardContext`] and the engine's
//! [`GuardSettings`]. The set is closed: [`GuardName`] is an enum and
//! [`GuardName::evaluate`] dispatches with an exhaustive `match`, so a
//! misspelt guard cannot silently no-op.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::approval::ApprovalValidation;
use super::phase::Phase;
use crate::authz::SecurityTier;

/// Identifier of a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuardName {
    /// Ambiguity must be at or below the threshold, or resolved.
    AmbiguityThreshold,
    /// Routing confidence must reach the minimum.
    RoutingConfidence,
    /// The routed agent must exist.
    AgentExists,
    /// The context payload must contain every contract section.
    ContextCompleteness,
    /// The realization package must be reviewable.
    PlanningComplete,
    /// T3 work needs a recorded approval. Never bypassed.
    ApprovalMandatory,
    /// A T3 approval must be a well-formed "approved" outcome.
    ApprovalValidation,
    /// T3 work must be followed by an SSOT update.
    SsotUpdateAfterT3,
}

/// Whether a guard runs when entering or leaving its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Checked before the phase body runs.
    Entry,
    /// Checked before moving to the next phase.
    Exit,
}

impl GuardName {
    /// Every guard, in workflow order.
    pub const ALL: [GuardName; 8] = [
        GuardName::AmbiguityThreshold,
        GuardName::RoutingConfidence,
        GuardName::AgentExists,
        GuardName::ContextCompleteness,
        GuardName::PlanningComplete,
        GuardName::ApprovalMandatory,
        GuardName::ApprovalValidation,
        GuardName::SsotUpdateAfterT3,
    ];

    /// Kebab-case name, e.g. `approval-mandatory`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AmbiguityThreshold => "ambiguity-threshold",
            Self::RoutingConfidence => "routing-confidence",
            Self::AgentExists => "agent-exists",
            Self::ContextCompleteness => "context-completeness",
            Self::PlanningComplete => "planning-complete",
            Self::ApprovalMandatory => "approval-mandatory",
            Self::ApprovalValidation => "approval-validation",
            Self::SsotUpdateAfterT3 => "ssot-update-after-t3",
        }
    }

    /// The phase and boundary at which the guard runs.
    pub fn placement(self) -> (Phase, Boundary) {
        match self {
            Self::AmbiguityThreshold => (Phase::Clarification, Boundary::Exit),
            Self::RoutingConfidence | Self::AgentExists => (Phase::Routing, Boundary::Exit),
            Self::ContextCompleteness => (Phase::ContextProvisioning, Boundary::Exit),
            Self::PlanningComplete => (Phase::ApprovalGate, Boundary::Entry),
            Self::ApprovalMandatory | Self::ApprovalValidation => {
                (Phase::Realization, Boundary::Entry)
            }
            Self::SsotUpdateAfterT3 => (Phase::SsotUpdate, Boundary::Entry),
        }
    }

    /// Evaluate the guard. `Ok` carries the pass reason, `Err` the failure reason.
    pub fn evaluate(self, ctx: &GuardContext, settings: &GuardSettings) -> Result<String, String> {
        match self {
            Self::AmbiguityThreshold => ambiguity_threshold(ctx, settings),
            Self::RoutingConfidence => routing_confidence(ctx, settings),
            Self::AgentExists => agent_exists(ctx, settings),
            Self::ContextCompleteness => context_completeness(ctx),
            Self::PlanningComplete => planning_complete(ctx, settings),
            Self::ApprovalMandatory => approval_mandatory(ctx),
            Self::ApprovalValidation => approval_validation(ctx),
            Self::SsotUpdateAfterT3 => ssot_update_after_t3(ctx),
        }
    }
}

impl fmt::Display for GuardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised guard name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown guard: {0:?}")]
pub struct UnknownGuard(pub String);

impl FromStr for GuardName {
    type Err = UnknownGuard;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == wanted)
            .ok_or_else(|| UnknownGuard(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Inputs, settings and results
// ---------------------------------------------------------------------------

/// Phase facts supplied by the caller. Every field is optional; a guard
/// whose input is absent fails and names the missing field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardContext {
    /// Ambiguity score of the request, 0.0–1.0.
    pub ambiguity_score: Option<f64>,
    /// Whether ambiguity was resolved through clarification.
    pub ambiguity_resolved: bool,
    /// Confidence of the routing decision, 0.0–1.0.
    pub routing_confidence: Option<f64>,
    /// Agent chosen by routing.
    pub agent_name: Option<String>,
    /// Agents available for routing; falls back to the configured set.
    pub available_agents: Option<Vec<String>>,
    /// Assembled context payload; sections live under `"contract"`.
    pub context_payload: Option<Value>,
    /// Contract sections the target agent requires.
    pub required_sections: Option<Vec<String>>,
    /// Realization package produced by planning.
    pub realization_package: Option<Value>,
    /// Tier of the planned operation.
    pub tier: Option<SecurityTier>,
    /// Whether user approval has been recorded.
    pub approval_received: bool,
    /// Validated approval decision.
    pub approval_validation: Option<ApprovalValidation>,
    /// Whether the source of truth was updated after realization.
    pub ssot_updated: bool,
}

impl GuardContext {
    /// Set the ambiguity score.
    pub fn with_ambiguity(mut self, score: f64, resolved: bool) -> Self {
        self.ambiguity_score = Some(score);
        self.ambiguity_resolved = resolved;
        self
    }

    /// Set the routing confidence.
    pub fn with_routing_confidence(mut self, confidence: f64) -> Self {
        self.routing_confidence = Some(confidence);
        self
    }

    /// Set the routed agent and, optionally, the available agent set.
    pub fn with_agent<S: Into<String>>(mut self, agent: S, available: Option<Vec<String>>) -> Self {
        self.agent_name = Some(agent.into());
        self.available_agents = available;
        self
    }

    /// Set the context payload and the sections it must contain.
    pub fn with_context(mut self, payload: Value, required_sections: Vec<String>) -> Self {
        self.context_payload = Some(payload);
        self.required_sections = Some(required_sections);
        self
    }

    /// Set the realization package.
    pub fn with_realization_package(mut self, package: Value) -> Self {
        self.realization_package = Some(package);
        self
    }

    /// Set the operation tier.
    pub fn with_tier(mut self, tier: SecurityTier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Record whether approval was received.
    pub fn with_approval_received(mut self, received: bool) -> Self {
        self.approval_received = received;
        self
    }

    /// Record the validated approval decision.
    pub fn with_approval_validation(mut self, validation: ApprovalValidation) -> Self {
        self.approval_validation = Some(validation);
        self
    }

    /// Record whether the SSOT was updated.
    pub fn with_ssot_updated(mut self, updated: bool) -> Self {
        self.ssot_updated = updated;
        self
    }
}

/// Engine-wide thresholds and reference sets used by the guards.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardSettings {
    /// Maximum unresolved ambiguity score.
    pub ambiguity_threshold: f64,
    /// Minimum routing confidence.
    pub min_routing_confidence: f64,
    /// Fields a realization package needs for a reviewable summary.
    pub required_plan_fields: Vec<String>,
    /// Agents known when the context does not list any.
    pub known_agents: BTreeSet<String>,
}

/// A guard passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardPass {
    /// Guard that passed.
    pub guard: GuardName,
    /// Why it passed.
    pub reason: String,
}

/// A guard failed. Recoverable only by supplying the missing input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("guard {guard} failed: {reason}")]
pub struct GuardViolation {
    /// Guard that failed.
    pub guard: GuardName,
    /// Why it failed.
    pub reason: String,
}

/// Operator-facing `{ allowed, guard, reason }` view of a guard result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardReport {
    /// Whether the transition may proceed.
    pub allowed: bool,
    /// Guard evaluated.
    pub guard: GuardName,
    /// Pass or failure reason.
    pub reason: String,
}

impl From<&Result<GuardPass, GuardViolation>> for GuardReport {
    fn from(result: &Result<GuardPass, GuardViolation>) -> Self {
        match result {
            Ok(pass) => Self {
                allowed: true,
                guard: pass.guard,
                reason: pass.reason.clone(),
            },
            Err(violation) => Self {
                allowed: false,
                guard: violation.guard,
                reason: violation.reason.clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

fn missing(field: &str) -> String {
    format!("missing required input `{field}`")
}

fn ambiguity_threshold(ctx: &GuardContext, settings: &GuardSettings) -> Result<String, String> {
    let score = ctx.ambiguity_score.ok_or_else(|| missing("ambiguity_score"))?;
    if score.is_nan() {
        return Err("ambiguity score is not a number".to_owned());
    }
    let threshold = settings.ambiguity_threshold;
    if score <= threshold {
        return Ok(format!("ambiguity {score:.2} within threshold {threshold:.2}"));
    }
    if ctx.ambiguity_resolved {
        return Ok(format!("ambiguity {score:.2} resolved through clarification"));
    }
    Err(format!(
        "ambiguity {score:.2} exceeds threshold {threshold:.2}; ask the user to clarify the request"
    ))
}

fn routing_confidence(ctx: &GuardContext, settings: &GuardSettings) -> Result<String, String> {
    let confidence = ctx
        .routing_confidence
        .ok_or_else(|| missing("routing_confidence"))?;
    let minimum = settings.min_routing_confidence;
    // Written so NaN fails.
    if confidence >= minimum {
        Ok(format!("routing confidence {confidence:.2} meets minimum {minimum:.2}"))
    } else {
        Err(format!(
            "routing confidence {confidence:.2} is below minimum {minimum:.2}; confirm the target agent with the user"
        ))
    }
}

fn agent_exists(ctx: &GuardContext, settings: &GuardSettings) -> Result<String, String> {
    let agent = ctx.agent_name.as_deref().ok_or_else(|| missing("agent_name"))?;
    let exists = match &ctx.available_agents {
        Some(available) => available.iter().any(|a| a == agent),
        None => settings.known_agents.contains(agent),
    };
    if exists {
        return Ok(format!("agent {agent:?} exists"));
    }
    let known: Vec<&str> = match &ctx.available_agents {
        Some(available) => available.iter().map(String::as_str).collect(),
        None => settings.known_agents.iter().map(String::as_str).collect(),
    };
    Err(format!(
        "agent {agent:?} does not exist; available agents: {}",
        known.join(", ")
    ))
}

fn context_completeness(ctx: &GuardContext) -> Result<String, String> {
    let required = ctx
        .required_sections
        .as_ref()
        .ok_or_else(|| missing("required_sections"))?;
    let payload = ctx
        .context_payload
        .as_ref()
        .ok_or_else(|| missing("context_payload"))?;
    let contract = payload.get("contract").and_then(Value::as_object);

    let absent: Vec<&str> = required
        .iter()
        .filter(|section| !contract.is_some_and(|c| c.contains_key(section.as_str())))
        .map(String::as_str)
        .collect();

    if absent.is_empty() {
        Ok(format!("all {} required contract sections present", required.len()))
    } else {
        Err(format!(
            "context payload is missing required contract sections: {}",
            absent.join(", ")
        ))
    }
}

/// Whether a JSON value carries content (not null, not an empty container).
fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn planning_complete(ctx: &GuardContext, settings: &GuardSettings) -> Result<String, String> {
    let package = ctx
        .realization_package
        .as_ref()
        .ok_or_else(|| missing("realization_package"))?;
    let fields = package
        .as_object()
        .ok_or_else(|| "realization package must be a JSON object".to_owned())?;

    let absent: Vec<&str> = settings
        .required_plan_fields
        .iter()
        .filter(|field| !fields.get(field.as_str()).is_some_and(has_content))
        .map(String::as_str)
        .collect();

    if absent.is_empty() {
        Ok("realization package is complete".to_owned())
    } else {
        Err(format!(
            "realization package cannot be reviewed; missing: {}",
            absent.join(", ")
        ))
    }
}

fn approval_mandatory(ctx: &GuardContext) -> Result<String, String> {
    let tier = ctx.tier.ok_or_else(|| missing("tier"))?;
    if !tier.requires_approval() {
        return Ok(format!("{tier} operation does not require approval"));
    }
    if ctx.approval_received {
        Ok("approval recorded for T3 operation".to_owned())
    } else {
        Err("T3 operation requires explicit user approval before realization; run the approval gate".to_owned())
    }
}

fn approval_validation(ctx: &GuardContext) -> Result<String, String> {
    let tier = ctx.tier.ok_or_else(|| missing("tier"))?;
    if !tier.requires_approval() {
        return Ok(format!("approval validation not required for {tier}"));
    }
    let validation = ctx
        .approval_validation
        .as_ref()
        .ok_or_else(|| "no approval decision recorded for T3 operation".to_owned())?;
    if validation.is_approved() {
        Ok("approval decision is a valid approval".to_owned())
    } else {
        Err(format!(
            "recorded decision is not an approval (approved: {}, action: {})",
            validation.approved,
            validation.action.as_str()
        ))
    }
}

fn ssot_update_after_t3(ctx: &GuardContext) -> Result<String, String> {
    let tier = ctx.tier.ok_or_else(|| missing("tier"))?;
    if !tier.requires_approval() {
        return Ok(format!("SSOT update not required for {tier}"));
    }
    if ctx.ssot_updated {
        Ok("SSOT updated after T3 realization".to_owned())
    } else {
        Err("T3 realization finished but the SSOT was not updated; record the new state first".to_owned())
    }
}
