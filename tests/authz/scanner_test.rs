//! Quote-aware scanning of command text.

use warden::authz::scanner::{
    has_command_substitution, has_file_redirect, has_unit_separator, split_units, strip_quoted,
};

#[test]
fn splits_on_every_separator() {
    assert_eq!(
        split_units("terraform fmt -check; terraform validate"),
        vec!["terraform fmt -check", "terraform validate"]
    );
    assert_eq!(
        split_units("ls | wc -l\necho done & sleep 1"),
        vec!["ls", "wc -l", "echo done", "sleep 1"]
    );
    assert_eq!(split_units("ls;"), vec!["ls"]);
    assert!(split_units(" ; && ").is_empty());
}

#[test]
fn quoted_separators_are_inert() {
    assert_eq!(
        split_units(r#"gcloud list --filter="a;b|c" && ls"#),
        vec![r#"gcloud list --filter="a;b|c""#, "ls"]
    );
    assert!(!has_unit_separator("echo 'a | b && c'"));
    assert!(has_unit_separator("echo 'a' | cat"));
}

#[test]
fn strip_blanks_quoted_content_only() {
    assert_eq!(strip_quoted("kubectl get pods"), "kubectl get pods");
    assert_eq!(strip_quoted("echo 'hi' there"), "echo '  ' there");
    // An unterminated quote runs to the end of the text.
    assert_eq!(strip_quoted("echo 'oops"), "echo '    ");
}

#[test]
fn detects_substitution_outside_single_quotes() {
    assert!(has_command_substitution("echo $(id)"));
    assert!(has_command_substitution("echo \"user: `id -un`\""));
    assert!(!has_command_substitution("echo '`id`'"));
    assert!(!has_command_substitution("echo $HOME (literal)"));
}

#[test]
fn detects_file_redirects() {
    assert!(has_file_redirect("terraform show > plan.txt"));
    assert!(has_file_redirect("echo x>>log"));
    assert!(!has_file_redirect("make 2>&1"));
    assert!(!has_file_redirect("echo 'a > b'"));
    assert!(!has_file_redirect("kubectl get pods"));
}
