//! End-to-end tests driving the full pipeline (`run_checker`) over the
//! concrete seed scenarios and a handful of the universal invariants.

use php_type_checker::{run_checker, CheckerConfig, Severity};
use std::io::Write;
use tempfile::NamedTempFile;

fn analyze(source: &str) -> php_type_checker::CheckerOutcome {
    let mut file = NamedTempFile::with_suffix(".php").expect("create temp file");
    file.write_all(source.as_bytes()).expect("write source");
    let path = camino::Utf8PathBuf::from_path_buf(file.path().to_path_buf()).expect("utf8 path");
    run_checker(&[path], &CheckerConfig::default()).expect("run checker")
}

fn single_message(outcome: &php_type_checker::CheckerOutcome) -> &str {
    assert_eq!(outcome.diagnostics.len(), 1, "expected exactly one diagnostic, got {:?}", outcome.diagnostics);
    &outcome.diagnostics[0].message
}

#[test]
fn s1_undefined_variable() {
    let outcome = analyze("<?php print($x);");
    assert!(outcome.has_error);
    assert!(single_message(&outcome).contains("Undefined variable `$x`"));
}

#[test]
fn s2_return_type_mismatch() {
    let outcome = analyze(r#"<?php function f(): int { return "a"; }"#);
    assert!(outcome.has_error);
    let message = single_message(&outcome);
    assert!(message.contains("int"));
    assert!(message.contains("string"));
}

#[test]
fn s3_too_few_arguments() {
    let outcome = analyze("<?php function f(int $a, int $b) {} f(1);");
    assert!(outcome.has_error);
    let message = single_message(&outcome);
    assert!(message.contains("Too few arguments"));
    assert!(message.contains("$b"));
}

#[test]
fn s4_identity_comparison_tautology() {
    let outcome = analyze(r#"<?php $x = 1; if ($x === "a") {}"#);
    assert!(outcome.has_error, "a tautology is an error");
    assert!(outcome.diagnostics.iter().any(|d| d.severity == Severity::Error && d.message.contains("never")));
}

#[test]
fn s5_interface_conformance() {
    let outcome = analyze(
        "<?php interface I { function m(int $x): void; } \
         class C implements I { function m(string $x): void {} }",
    );
    assert!(outcome.has_error);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message.to_ascii_lowercase().contains("parameter") && d.message.contains('m')));
}

#[test]
fn s6_abstract_instantiation() {
    let outcome = analyze("<?php abstract class A {} new A();");
    assert!(outcome.has_error);
    assert!(single_message(&outcome).contains("Cannot instantiate abstract class `A`"));
}

#[test]
fn well_typed_program_has_no_diagnostics() {
    let outcome = analyze(
        "<?php function add(int $a, int $b): int { return $a + $b; } \
         $result = add(1, 2);",
    );
    assert!(!outcome.has_error);
}

#[test]
fn invariant_redeclaration_is_exactly_one_diagnostic() {
    let outcome = analyze("<?php class Dup {} class Dup {}");
    assert_eq!(
        outcome.diagnostics.iter().filter(|d| d.message.contains("already in use")).count(),
        1
    );
}

#[test]
fn invariant_self_check_mode_tolerates_redeclaration() {
    let mut file = NamedTempFile::with_suffix(".php").expect("create temp file");
    file.write_all(b"<?php class Dup {} class Dup {}").expect("write source");
    let path = camino::Utf8PathBuf::from_path_buf(file.path().to_path_buf()).expect("utf8 path");
    let config = CheckerConfig { self_check: true, ignored_prefixes: Vec::new() };
    let outcome = run_checker(&[path], &config).expect("run checker");
    assert!(outcome.diagnostics.iter().all(|d| !d.message.contains("already in use")));
}

#[test]
fn spread_argument_disables_arity_checking() {
    let outcome = analyze("<?php function f(int $a, int $b) {} $args = []; f(...$args);");
    assert!(outcome.diagnostics.iter().all(|d| !d.message.contains("Too few") && !d.message.contains("Too many")));
}

#[test]
fn nullable_default_parameter_accepts_null() {
    let outcome = analyze("<?php function f(string $x = null) { } f(null);");
    assert!(!outcome.has_error);
}

#[test]
fn int_argument_widens_to_float_parameter() {
    let outcome = analyze("<?php function f(float $x) {} f(1);");
    assert!(!outcome.has_error);
}

#[test]
fn float_argument_does_not_narrow_to_int_parameter() {
    let outcome = analyze("<?php function f(int $x) {} f(1.5);");
    assert!(outcome.has_error);
    assert!(outcome.diagnostics.iter().any(|d| d.message.contains("int") && d.message.contains("float")));
}
