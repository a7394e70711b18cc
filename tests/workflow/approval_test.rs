//! Approval reply validation.

use proptest::prelude::*;
use warden::workflow::{ApprovalAction, ApprovalValidation};

#[test]
fn approvals() {
    for reply in ["LGTM, ship it", "Approved.", "ok go ahead", "Y"] {
        let v = ApprovalValidation::from_response(reply);
        assert!(v.is_approved(), "{reply}: {v:?}");
    }
}

#[test]
fn rejections_halt() {
    for reply in ["Cancel this", "no", "Reject - the plan touches prod", "STOP"] {
        let v = ApprovalValidation::from_response(reply);
        assert!(!v.approved, "{reply}");
        assert_eq!(v.action, ApprovalAction::HaltWorkflow, "{reply}");
    }
}

#[test]
fn negated_approvals_reject() {
    for reply in [
        "do not proceed",
        "don't do it",
        "Don\u{2019}t do it",
        "I do not approve",
        "not ok",
        "never approve this",
        "We can't go ahead with this",
    ] {
        let v = ApprovalValidation::from_response(reply);
        assert!(!v.approved, "{reply}: {v:?}");
        assert_eq!(v.action, ApprovalAction::HaltWorkflow, "{reply}");
    }
}

#[test]
fn negated_rejection_is_not_approval() {
    for reply in ["don't stop", "yes, don't cancel"] {
        let v = ApprovalValidation::from_response(reply);
        assert!(!v.approved, "{reply}");
        assert_eq!(v.action, ApprovalAction::Clarify, "{reply}");
    }
}

#[test]
fn approve_phrases_need_whole_words() {
    // "redo it" and "undo it" do not contain the phrase "do it".
    for reply in ["redo it later", "undo it"] {
        assert_eq!(
            ApprovalValidation::from_response(reply).action,
            ApprovalAction::Clarify,
            "{reply}"
        );
    }
}

#[test]
fn unclear_replies_ask_again() {
    for reply in ["maybe later", "   ", "yes but no", "what does this change?"] {
        assert_eq!(
            ApprovalValidation::from_response(reply).action,
            ApprovalAction::Clarify,
            "{reply}"
        );
    }
}

#[test]
fn approved_flag_alone_is_not_a_valid_approval() {
    let malformed = ApprovalValidation {
        approved: true,
        action: ApprovalAction::Clarify,
    };
    assert!(!malformed.is_approved());
}

#[test]
fn wire_format() {
    let value = match serde_json::to_value(ApprovalValidation::approved()) {
        Ok(v) => v,
        Err(err) => panic!("validation should serialize: {err}"),
    };
    assert_eq!(value["approved"], true);
    assert_eq!(value["action"], "proceed_to_realization");

    let parsed: ApprovalValidation =
        match serde_json::from_str(r#"{"approved":false,"action":"halt_workflow"}"#) {
            Ok(v) => v,
            Err(err) => panic!("validation should parse: {err}"),
        };
    assert_eq!(parsed, ApprovalValidation::rejected());
}

proptest! {
    #[test]
    fn negation_before_approval_never_approves(
        lead in prop::sample::select(vec!["", "I ", "please ", "we "]),
        negation in prop::sample::select(vec!["not", "don't", "do not", "never", "cannot"]),
        approval in prop::sample::select(vec![
            "proceed", "approve", "ok", "go ahead", "do it", "yes", "lgtm", "ship it",
        ]),
    ) {
        let reply = format!("{lead}{negation} {approval}");
        let v = ApprovalValidation::from_response(&reply);
        prop_assert!(!v.is_approved(), "{} read as {:?}", reply, v);
        prop_assert!(!v.approved, "{}", reply);
    }
}
