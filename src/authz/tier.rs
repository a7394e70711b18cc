//! Four-level risk classification for commands and delegation requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Risk tier of a command, ordered from harmless to destructive.
///
/// The derived [`Ord`] follows declaration order, so `T0 < T1 < T2 < T3`
/// and the tier of a compound command is simply the `max` of its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SecurityTier {
    /// Reads state without changing anything.
    #[serde(rename = "T0", alias = "T0_READ_ONLY")]
    T0ReadOnly,
    /// Validates or checks; idempotent and local.
    #[serde(rename = "T1", alias = "T1_VALIDATION")]
    T1Validation,
    /// Simulates a change (plan, diff, dry-run) without applying it.
    #[serde(rename = "T2", alias = "T2_DRY_RUN")]
    T2DryRun,
    /// Mutates live systems or is unknown; gated behind human approval.
    #[serde(rename = "T3", alias = "T3_BLOCKED")]
    T3Blocked,
}

impl SecurityTier {
    /// All tiers in ascending order of risk.
    pub const ALL: [SecurityTier; 4] = [
        SecurityTier::T0ReadOnly,
        SecurityTier::T1Validation,
        SecurityTier::T2DryRun,
        SecurityTier::T3Blocked,
    ];

    /// Short code used on the wire (`"T0"` .. `"T3"`).
    pub fn code(self) -> &'static str {
        match self {
            Self::T0ReadOnly => "T0",
            Self::T1Validation => "T1",
            Self::T2DryRun => "T2",
            Self::T3Blocked => "T3",
        }
    }

    /// Human-readable description of what the tier permits.
    pub fn description(self) -> &'static str {
        match self {
            Self::T0ReadOnly => "read-only operation",
            Self::T1Validation => "local validation, idempotent",
            Self::T2DryRun => "simulated change (plan, diff or dry-run)",
            Self::T3Blocked => "state-changing or unknown operation",
        }
    }

    /// Only T3 requires an explicit human approval phase.
    pub fn requires_approval(self) -> bool {
        matches!(self, Self::T3Blocked)
    }
}

impl fmt::Display for SecurityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when a string is not a recognised tier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown security tier: {0:?} (expected T0, T1, T2 or T3)")]
pub struct ParseTierError(pub String);

impl FromStr for SecurityTier {
    type Err = ParseTierError;

    /// Accepts the short code (`T3`) or the long name (`T3_BLOCKED`),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "T0" | "T0_READ_ONLY" => Ok(Self::T0ReadOnly),
            "T1" | "T1_VALIDATION" => Ok(Self::T1Validation),
            "T2" | "T2_DRY_RUN" => Ok(Self::T2DryRun),
            "T3" | "T3_BLOCKED" => Ok(Self::T3Blocked),
            _ => Err(ParseTierError(s.to_owned())),
        }
    }
}
