//! Validation of the operator's reply to an approval request.
//!
//! The reply is matched word by word against fixed keyword sets; nothing
//! here tries to understand free text beyond that. A negation shortly before
//! an approval word ("do not proceed") turns it into a rejection, and a
//! negated rejection ("don't stop") is unclear. A reply that both approves
//! and rejects, or does neither, asks for clarification.

use serde::{Deserialize, Serialize};

/// Words that approve the plan.
const APPROVE_WORDS: &[&str] = &[
    "approve", "approved", "yes", "y", "proceed", "lgtm", "confirm", "confirmed", "ok", "okay",
];

/// Multi-word approvals, matched as whole-word sequences.
const APPROVE_PHRASES: &[&[&str]] = &[&["go", "ahead"], &["ship", "it"], &["do", "it"]];

/// Words that reject the plan.
const REJECT_WORDS: &[&str] = &[
    "reject", "rejected", "no", "n", "cancel", "abort", "stop", "deny", "denied", "halt",
];

/// Words that negate a following approve or reject word.
const NEGATIONS: &[&str] = &[
    "not", "don't", "dont", "never", "cannot", "can't", "won't", "shouldn't", "mustn't", "nor",
];

/// How many preceding words a negation reaches.
const NEGATION_WINDOW: usize = 3;

/// What the workflow does next after an approval reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    /// Enter realization.
    ProceedToRealization,
    /// Stop the workflow; the run ends Halted.
    HaltWorkflow,
    /// The reply was unclear; ask again.
    Clarify,
}

impl ApprovalAction {
    /// Snake-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProceedToRealization => "proceed_to_realization",
            Self::HaltWorkflow => "halt_workflow",
            Self::Clarify => "clarify",
        }
    }
}

/// Structured result of validating an approval reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalValidation {
    /// Whether the reply approved the plan.
    pub approved: bool,
    /// Next workflow action.
    pub action: ApprovalAction,
}

impl ApprovalValidation {
    /// An approval that proceeds to realization.
    pub fn approved() -> Self {
        Self {
            approved: true,
            action: ApprovalAction::ProceedToRealization,
        }
    }

    /// A rejection that halts the workflow.
    pub fn rejected() -> Self {
        Self {
            approved: false,
            action: ApprovalAction::HaltWorkflow,
        }
    }

    /// A reply that needs clarification.
    pub fn unclear() -> Self {
        Self {
            approved: false,
            action: ApprovalAction::Clarify,
        }
    }

    /// Well-formed approval: approved and proceeding to realization.
    pub fn is_approved(&self) -> bool {
        self.approved && self.action == ApprovalAction::ProceedToRealization
    }

    /// Map an operator reply to a validation result.
    pub fn from_response(response: &str) -> Self {
        let lowered = response.to_lowercase().replace('\u{2019}', "'");
        let words: Vec<&str> = lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .map(|w| w.trim_matches('\''))
            .filter(|w| !w.is_empty())
            .collect();

        let mut approves = false;
        let mut rejects = false;
        let mut hedged = false;
        for idx in 0..words.len() {
            let approval = is_approval_at(&words, idx);
            let rejection = words.get(idx).is_some_and(|w| REJECT_WORDS.contains(w));
            if !(approval || rejection) {
                continue;
            }
            match (negated(&words, idx), approval) {
                (false, true) => approves = true,
                (false, false) => rejects = true,
                // "do not proceed" rejects; "don't stop" is not an approval.
                (true, true) => rejects = true,
                (true, false) => hedged = true,
            }
        }

        match (approves, rejects, hedged) {
            (true, false, false) => Self::approved(),
            (false, true, _) => Self::rejected(),
            _ => Self::unclear(),
        }
    }
}

/// Whether an approve word or phrase starts at `idx`.
fn is_approval_at(words: &[&str], idx: usize) -> bool {
    let Some(word) = words.get(idx) else {
        return false;
    };
    APPROVE_WORDS.contains(word)
        || APPROVE_PHRASES.iter().any(|phrase| {
            words
                .get(idx..idx.saturating_add(phrase.len()))
                .is_some_and(|window| window == *phrase)
        })
}

/// Whether a negation appears within the few words before `idx`.
fn negated(words: &[&str], idx: usize) -> bool {
    words
        .get(idx.saturating_sub(NEGATION_WINDOW)..idx)
        .is_some_and(|before| before.iter().any(|w| NEGATIONS.contains(w)))
}
