//! Pattern catalog construction and lookups.

use warden::authz::catalog::normalize_unit;
use warden::authz::{CatalogError, PatternCatalog, RuleCategory, SecurityTier};
use warden::config::ClassifierConfig;

fn builtin() -> PatternCatalog {
    match PatternCatalog::builtin() {
        Ok(catalog) => catalog,
        Err(err) => panic!("builtin catalog should compile: {err}"),
    }
}

#[test]
fn every_plain_category_has_rules() {
    let catalog = builtin();
    for category in [
        RuleCategory::Blocked,
        RuleCategory::AlwaysSafe,
        RuleCategory::Tier1,
        RuleCategory::Tier2,
    ] {
        let rules = catalog.rules(category);
        assert!(!rules.is_empty(), "{category:?} should have rules");
        assert!(rules.iter().all(|r| r.category() == category));
    }
    assert!(catalog.rules(RuleCategory::ConditionallySafe).is_empty());
}

#[test]
fn rule_names_are_unique() {
    let catalog = builtin();
    let mut names: Vec<&str> = [
        RuleCategory::Blocked,
        RuleCategory::AlwaysSafe,
        RuleCategory::Tier1,
        RuleCategory::Tier2,
    ]
    .into_iter()
    .flat_map(|c| catalog.rules(c).iter().map(|r| r.name()))
    .collect();
    let total = names.len();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), total);
}

#[test]
fn fast_path_is_exact_match() {
    let catalog = builtin();
    assert!(catalog.is_fast_path("git status"));
    assert!(catalog.is_fast_path("kubectl get pods"));
    assert!(!catalog.is_fast_path("git status --short"));
    assert!(!catalog.is_fast_path("rm"));
}

#[test]
fn lookups_return_named_rules() {
    let catalog = builtin();

    let blocked = catalog.blocked_match("sudo apt-get install jq");
    assert_eq!(blocked.map(|r| r.name()), Some("sudo"));
    assert!(catalog.blocked_match("apt list --installed").is_none());

    let plan = catalog.first_match(RuleCategory::Tier2, "terraform plan -out=tfplan");
    assert_eq!(plan.map(|r| r.name()), Some("terraform-plan"));
    assert!(catalog.first_match(RuleCategory::Tier1, "terraform plan").is_none());
}

#[test]
fn conditional_rules_check_their_flags() {
    let catalog = builtin();
    let sed = match catalog.conditional_match("sed -n 5p notes.txt") {
        Some(rule) => rule,
        None => panic!("sed should have a conditional rule"),
    };
    assert_eq!(sed.rule().name(), "sed-without-in-place");
    assert!(sed.condition_met("sed -n 5p notes.txt", "sed -n 5p notes.txt"));
    assert!(!sed.condition_met("sed -i.bak s/a/b/ notes.txt", "sed -i.bak s/a/b/ notes.txt"));
    assert!(!sed.condition_met("sed --in-place s/a/b/ f", "sed --in-place s/a/b/ f"));

    let clean = match catalog.conditional_match("git clean -n") {
        Some(rule) => rule,
        None => panic!("git clean should have a conditional rule"),
    };
    // A required flag only counts outside quotes.
    assert!(clean.condition_met("git clean -n", "git clean -n"));
    assert!(!clean.condition_met("git clean '-n'", "git clean '  '"));
}

#[test]
fn rule_categories_imply_tiers() {
    assert_eq!(RuleCategory::Blocked.implied_tier(), SecurityTier::T3Blocked);
    assert_eq!(RuleCategory::ConditionallySafe.implied_tier(), SecurityTier::T0ReadOnly);
    assert_eq!(RuleCategory::AlwaysSafe.implied_tier(), SecurityTier::T0ReadOnly);
    assert_eq!(RuleCategory::Tier1.implied_tier(), SecurityTier::T1Validation);
    assert_eq!(RuleCategory::Tier2.implied_tier(), SecurityTier::T2DryRun);
}

#[test]
fn invalid_configured_pattern_names_the_entry() {
    let config = ClassifierConfig {
        extra_safe: vec!["ok".to_owned(), "(unclosed".to_owned()],
        ..ClassifierConfig::default()
    };
    match PatternCatalog::from_config(&config) {
        Err(CatalogError::InvalidPattern { name, .. }) => assert_eq!(name, "custom-safe-1"),
        Ok(_) => panic!("unclosed group should not compile"),
    }
}

#[test]
fn normalize_unit_keeps_arguments() {
    assert_eq!(normalize_unit("A=1 B=2 terraform plan"), "terraform plan");
    assert_eq!(normalize_unit("/bin/ls -la /etc"), "ls -la /etc");
    // A lone assignment is the whole command.
    assert_eq!(normalize_unit("FOO=bar"), "FOO=bar");
    assert_eq!(normalize_unit("  cat x"), "cat x");
}
