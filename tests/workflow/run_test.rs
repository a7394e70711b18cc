//! Driving a workflow run through all seven phases.

use serde_json::json;
use warden::authz::SecurityTier;
use warden::workflow::{
    ApprovalAction, ApprovalValidation, Enforcer, GuardContext, GuardName, Phase, WorkflowError,
    WorkflowRun, WorkflowStatus,
};

/// Every input a T3 run needs to reach completion.
fn complete_t3_context() -> GuardContext {
    GuardContext::default()
        .with_ambiguity(0.1, false)
        .with_routing_confidence(0.92)
        .with_agent("terraform-architect", None)
        .with_context(
            json!({ "contract": { "project_details": {}, "infrastructure_topology": {} } }),
            vec!["project_details".to_owned(), "infrastructure_topology".to_owned()],
        )
        .with_realization_package(json!({
            "summary": "Create the staging VPC",
            "changes": ["google_compute_network.staging"],
            "validation": "terraform plan: 1 to add",
        }))
        .with_tier(SecurityTier::T3Blocked)
        .with_approval_received(true)
        .with_approval_validation(ApprovalValidation::approved())
        .with_ssot_updated(true)
}

fn advance_ok(run: &mut WorkflowRun, enforcer: &Enforcer, ctx: &GuardContext) {
    let result = run.advance(enforcer, ctx).map(|_| ());
    if let Err(err) = result {
        panic!("advance from {:?} should succeed: {err}", run.phase());
    }
}

#[test]
fn t3_run_completes_with_all_inputs() {
    let enforcer = Enforcer::default();
    let ctx = complete_t3_context();
    let mut run = WorkflowRun::new();
    assert_eq!(run.phase(), Some(Phase::Clarification));

    for expected in Phase::ALL.iter().skip(1) {
        advance_ok(&mut run, &enforcer, &ctx);
        assert_eq!(run.phase(), Some(*expected));
    }
    advance_ok(&mut run, &enforcer, &ctx);

    assert_eq!(run.status(), &WorkflowStatus::Completed);
    assert!(run.status().is_terminal());
    assert_eq!(run.history().len(), 7);
    assert_eq!(run.history()[0].from, Phase::Clarification);
    assert_eq!(run.history()[6].to, None);
}

#[test]
fn t3_cannot_enter_realization_without_approval() {
    let enforcer = Enforcer::default();
    let ctx = complete_t3_context().with_approval_received(false);
    let mut run = WorkflowRun::new();

    for _ in 0..4 {
        advance_ok(&mut run, &enforcer, &ctx);
    }
    assert_eq!(run.phase(), Some(Phase::ApprovalGate));

    match run.advance(&enforcer, &ctx) {
        Err(WorkflowError::Guard(v)) => assert_eq!(v.guard, GuardName::ApprovalMandatory),
        other => panic!("expected approval-mandatory violation, got {other:?}"),
    }
    match run.status() {
        WorkflowStatus::Blocked { phase, violation } => {
            assert_eq!(*phase, Phase::ApprovalGate);
            assert_eq!(violation.guard, GuardName::ApprovalMandatory);
        }
        other => panic!("run should be blocked, is {other:?}"),
    }
    assert!(!run.status().is_terminal());

    // Recording the approval unblocks the same transition.
    let approved = ctx.with_approval_received(true);
    advance_ok(&mut run, &enforcer, &approved);
    assert_eq!(run.phase(), Some(Phase::Realization));
}

#[test]
fn blocked_clarification_retries_with_new_input() {
    let enforcer = Enforcer::default();
    let mut run = WorkflowRun::new();

    let vague = GuardContext::default().with_ambiguity(0.7, false);
    assert!(matches!(
        run.advance(&enforcer, &vague),
        Err(WorkflowError::Guard(_))
    ));
    assert_eq!(run.phase(), Some(Phase::Clarification));
    assert!(run.history().is_empty());

    let clarified = vague.with_ambiguity(0.7, true);
    advance_ok(&mut run, &enforcer, &clarified);
    assert_eq!(run.phase(), Some(Phase::Routing));
}

#[test]
fn low_tier_run_skips_approval_requirements() {
    let enforcer = Enforcer::default();
    let ctx = complete_t3_context()
        .with_tier(SecurityTier::T2DryRun)
        .with_approval_received(false)
        .with_ssot_updated(false);
    let mut run = WorkflowRun::new();
    for _ in 0..7 {
        advance_ok(&mut run, &enforcer, &ctx);
    }
    assert_eq!(run.status(), &WorkflowStatus::Completed);
}

#[test]
fn rejection_halts_the_run() {
    let enforcer = Enforcer::default();
    let mut run = WorkflowRun::new();

    let validation = match run.apply_approval_response("No, abort") {
        Ok(v) => v,
        Err(err) => panic!("open run should accept a reply: {err}"),
    };
    assert_eq!(validation.action, ApprovalAction::HaltWorkflow);
    assert!(matches!(run.status(), WorkflowStatus::Halted { .. }));

    match run.advance(&enforcer, &complete_t3_context()) {
        Err(WorkflowError::Terminal(state)) => assert_eq!(state, "halted"),
        other => panic!("halted run must not advance, got {other:?}"),
    }
    assert!(run.halt("again").is_err());
}

#[test]
fn approval_reply_leaves_run_open() {
    let mut run = WorkflowRun::new();
    let validation = match run.apply_approval_response("yes") {
        Ok(v) => v,
        Err(err) => panic!("open run should accept a reply: {err}"),
    };
    assert!(validation.is_approved());
    assert_eq!(run.phase(), Some(Phase::Clarification));
    assert!(!run.status().is_terminal());
}

#[test]
fn run_serializes_status_and_history() {
    let enforcer = Enforcer::default();
    let mut run = WorkflowRun::new();
    advance_ok(&mut run, &enforcer, &complete_t3_context());

    let value = match serde_json::to_value(&run) {
        Ok(v) => v,
        Err(err) => panic!("run should serialize: {err}"),
    };
    assert_eq!(value["id"], run.id().to_string());
    assert_eq!(value["status"]["status"], "active");
    assert_eq!(value["status"]["phase"], "routing");
    assert_eq!(value["history"][0]["from"], "clarification");
}

#[test]
fn runs_have_distinct_ids() {
    assert_ne!(WorkflowRun::new().id(), WorkflowRun::default().id());
}
