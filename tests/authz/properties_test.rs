//! Property-based checks for the classifier.

use std::sync::Arc;

use proptest::prelude::*;
use warden::authz::{PatternCatalog, SecurityTier, TierClassifier};

fn classifier() -> TierClassifier {
    let catalog = match PatternCatalog::builtin() {
        Ok(catalog) => catalog,
        Err(err) => panic!("builtin catalog should compile: {err}"),
    };
    TierClassifier::new(Arc::new(catalog), 32)
}

// Single-unit commands spanning every tier.
fn arb_unit() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "ls -la /tmp",
        "cat README.md",
        "kubectl get pods -n prod",
        "git log --oneline",
        "gcloud compute instances list",
        "find . -name x",
        "terraform validate",
        "helm lint ./chart",
        "tflint",
        "terraform plan",
        "kubectl diff -f app.yaml",
        "helm upgrade web ./chart --dry-run",
        "kubectl delete pod web-1 --dry-run=client",
        "terraform apply",
        "rm -rf build",
        "sudo systemctl restart nginx",
        "sed -i s/a/b/ f.txt",
    ])
}

fn arb_safe() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["ls", "cat notes.txt", "git status", "kubectl get pods", "echo ok"])
}

fn arb_destructive() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "rm -rf /",
        "sudo reboot",
        "terraform destroy",
        "kubectl delete namespace prod",
        "git push --force origin main",
        "mkfs.ext4 /dev/sdb",
    ])
}

// Safe command words given arguments that write files or run commands.
fn arb_disguised_writer() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "sort -o out.txt in.txt",
        "uniq in.txt out.txt",
        "yq -i '.a = 1' deploy.yaml",
        "tree -o listing.txt",
        "sed 's/a/b/w out.txt' in.txt",
        "sed '1e id' in.txt",
        "curl --json '{}' https://api.example.com",
        "curl -T dump.sql https://files.example.com",
        "echo hi > /dev/nullfile",
        "cat <(id)",
    ])
}

// Ways of hiding a destructive command behind a safe first word.
fn arb_wrapped_destructive() -> impl Strategy<Value = String> {
    (arb_safe(), arb_destructive(), 0..4usize).prop_map(|(safe, bad, form)| match form {
        0 => format!("{safe} <({bad})"),
        1 => format!("{safe} >({bad})"),
        2 => format!("{safe} \\' ; {bad} #'"),
        _ => format!("{safe} \"$({bad})\""),
    })
}

fn arb_separator() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![" && ", " || ", "; ", " | ", "\n"])
}

proptest! {
    #[test]
    fn classification_is_deterministic(command in "[ -~]{0,80}") {
        let c = classifier();
        let first = c.classify(&command);
        prop_assert_eq!(c.classify(&command), first);
        prop_assert_eq!(classifier().classify(&command), first);
    }

    #[test]
    fn compound_tier_is_max_of_units(
        a in arb_unit(),
        b in arb_unit(),
        sep in arb_separator()
    ) {
        let c = classifier();
        let expected = c.classify(a).max(c.classify(b));
        prop_assert_eq!(c.classify(&format!("{a}{sep}{b}")), expected);
    }

    #[test]
    fn destructive_unit_beats_safe_units(
        safe in arb_safe(),
        bad in arb_destructive(),
        sep in arb_separator()
    ) {
        let c = classifier();
        prop_assert_eq!(c.classify(&format!("{safe}{sep}{bad}")), SecurityTier::T3Blocked);
        prop_assert_eq!(c.classify(&format!("{bad}{sep}{safe}")), SecurityTier::T3Blocked);
        prop_assert_eq!(c.classify(&format!("{safe} $({bad})")), SecurityTier::T3Blocked);
    }

    #[test]
    fn wrapped_destructive_is_t3(command in arb_wrapped_destructive()) {
        let c = classifier();
        prop_assert_eq!(c.classify(&command), SecurityTier::T3Blocked, "{}", command);
    }

    #[test]
    fn disguised_writers_never_reach_t0(
        safe in arb_safe(),
        writer in arb_disguised_writer(),
        sep in arb_separator()
    ) {
        let c = classifier();
        prop_assert_ne!(c.classify(writer), SecurityTier::T0ReadOnly);
        prop_assert_ne!(c.classify(&format!("{safe}{sep}{writer}")), SecurityTier::T0ReadOnly);
    }

    #[test]
    fn tier_never_exceeds_t3_or_panics(command in "\\PC{0,60}") {
        let c = classifier();
        let result = c.classify_with_reason(&command);
        prop_assert!(result.tier <= SecurityTier::T3Blocked);
        prop_assert_eq!(result.tier, c.classify(&command));
    }
}
