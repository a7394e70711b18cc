//! Warden: risk-control plane for an LLM agent operations platform.
//!
//! Two engines, both synchronous and side-effect free:
//! - [`authz`]: classifies shell commands into risk tiers, rejects piping on
//!   cloud CLIs, and validates sub-agent delegations.
//! - [`workflow`]: named guards gating the seven workflow phases, with a
//!   mandatory human approval for T3 work.
//!
//! See `DESIGN.md` for the design ledger.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod authz;
pub mod workflow;
