//! End-to-end command authorization: cloud filter, then classifier.

use warden::authz::{CommandAuthorizer, CommandDecision, PipeRule, SecurityTier};
use warden::config::ClassifierConfig;

fn authorizer() -> CommandAuthorizer {
    match CommandAuthorizer::from_config(&ClassifierConfig::default()) {
        Ok(a) => a,
        Err(err) => panic!("default authorizer should build: {err}"),
    }
}

#[test]
fn cloud_pipe_is_blocked_before_classification() {
    let a = authorizer();
    let decision = a.authorize("kubectl get pods | grep Running");
    match &decision {
        CommandDecision::Block { violation } => {
            assert_eq!(violation.rule, PipeRule::Pipe);
            assert_eq!(violation.tool, "kubectl");
        }
        other => panic!("expected block, got {other:?}"),
    }
    assert_eq!(decision.tier(), None);
    assert!(decision.reason().contains("pipe operator"));
    // Blocked commands never reach the classifier cache.
    assert_eq!(a.classifier().cached_len(), 0);
}

#[test]
fn t3_requires_approval() {
    let decision = authorizer().authorize("terraform apply -auto-approve");
    assert!(matches!(decision, CommandDecision::RequireApproval { .. }));
    assert_eq!(decision.tier(), Some(SecurityTier::T3Blocked));
    assert!(decision.reason().contains("terraform-auto-approve"));
}

#[test]
fn lower_tiers_are_allowed() {
    let a = authorizer();
    for (command, tier) in [
        ("terraform plan", SecurityTier::T2DryRun),
        ("helm lint ./chart", SecurityTier::T1Validation),
        ("ls | grep foo", SecurityTier::T0ReadOnly),
        (
            "gcloud compute instances list --filter='name~web|api'",
            SecurityTier::T0ReadOnly,
        ),
    ] {
        let decision = a.authorize(command);
        assert!(matches!(decision, CommandDecision::Allow { .. }), "{command}: {decision:?}");
        assert_eq!(decision.tier(), Some(tier), "{command}");
    }
}

#[test]
fn decision_serializes_with_tag() {
    let decision = authorizer().authorize("terraform plan");
    let value = match serde_json::to_value(&decision) {
        Ok(v) => v,
        Err(err) => panic!("decision should serialize: {err}"),
    };
    assert_eq!(value["decision"], "allow");
    assert_eq!(value["tier"], "T2");

    let blocked = authorizer().authorize("aws s3 ls > out.txt");
    let value = match serde_json::to_value(&blocked) {
        Ok(v) => v,
        Err(err) => panic!("decision should serialize: {err}"),
    };
    assert_eq!(value["decision"], "block");
    assert_eq!(value["violation"]["rule"], "redirect");
}

#[test]
fn filter_only_applies_to_configured_clis() {
    let config = ClassifierConfig {
        cloud_clis: vec!["gcloud".to_owned()],
        ..ClassifierConfig::default()
    };
    let a = match CommandAuthorizer::from_config(&config) {
        Ok(a) => a,
        Err(err) => panic!("authorizer should build: {err}"),
    };
    assert!(a.filter().cloud_tool("kubectl get pods").is_none());
    let decision = a.authorize("kubectl get pods | grep Running");
    assert_eq!(decision.tier(), Some(SecurityTier::T0ReadOnly));
}
