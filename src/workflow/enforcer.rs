//! Guard enforcement for workflow phase transitions.

use tracing::{debug, warn};

use super::guards::{GuardContext, GuardName, GuardPass, GuardReport, GuardSettings, GuardViolation};
use super::phase::Phase;
use crate::config::{DelegationConfig, GuardsConfig};

/// Evaluates named guards against caller-supplied phase facts.
///
/// Holds only read-only settings; every call is a pure function of its
/// arguments. Failures are returned, never retried or swallowed.
#[derive(Debug, Clone)]
pub struct Enforcer {
    settings: GuardSettings,
}

impl Enforcer {
    /// Create an enforcer with explicit settings.
    pub fn new(settings: GuardSettings) -> Self {
        Self { settings }
    }

    /// Build the enforcer from guard and delegation configuration.
    pub fn from_config(guards: &GuardsConfig, delegation: &DelegationConfig) -> Self {
        Self::new(GuardSettings {
            ambiguity_threshold: guards.ambiguity_threshold,
            min_routing_confidence: guards.min_routing_confidence,
            required_plan_fields: guards.required_plan_fields.clone(),
            known_agents: delegation.known_agents.iter().cloned().collect(),
        })
    }

    /// Settings in effect.
    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    /// Evaluate one guard.
    ///
    /// # Errors
    ///
    /// Returns [`GuardViolation`] carrying the guard name and reason when the
    /// guard fails. Callers must handle it before re-attempting the
    /// transition with new input.
    pub fn enforce(&self, guard: GuardName, ctx: &GuardContext) -> Result<GuardPass, GuardViolation> {
        match guard.evaluate(ctx, &self.settings) {
            Ok(reason) => {
                debug!(guard = %guard, %reason, "guard passed");
                Ok(GuardPass { guard, reason })
            }
            Err(reason) => {
                warn!(guard = %guard, %reason, "guard violation");
                Err(GuardViolation { guard, reason })
            }
        }
    }

    /// Evaluate guards in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`GuardViolation`].
    pub fn enforce_all(
        &self,
        guards: &[GuardName],
        ctx: &GuardContext,
    ) -> Result<Vec<GuardPass>, GuardViolation> {
        guards.iter().map(|g| self.enforce(*g, ctx)).collect()
    }

    /// Evaluate the guards for leaving `phase`.
    ///
    /// # Errors
    ///
    /// Returns the first [`GuardViolation`].
    pub fn enforce_exit(&self, phase: Phase, ctx: &GuardContext) -> Result<Vec<GuardPass>, GuardViolation> {
        self.enforce_all(phase.exit_guards(), ctx)
    }

    /// Evaluate the guards for entering `phase`.
    ///
    /// # Errors
    ///
    /// Returns the first [`GuardViolation`].
    pub fn enforce_entry(&self, phase: Phase, ctx: &GuardContext) -> Result<Vec<GuardPass>, GuardViolation> {
        self.enforce_all(phase.entry_guards(), ctx)
    }

    /// Evaluate one guard and convert the result to an operator report.
    pub fn report(&self, guard: GuardName, ctx: &GuardContext) -> GuardReport {
        GuardReport::from(&self.enforce(guard, ctx))
    }
}

impl Default for Enforcer {
    fn default() -> Self {
        Self::from_config(&GuardsConfig::default(), &DelegationConfig::default())
    }
}
