//! Integration tests that run every bundled model through the CLI library.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use verifpal_cli::json::{respond, Request};
use verifpal_cli::report::render_outcome;
use verifpal_cli::{check_model, load_model, load_source, CliError};
use verifpal_engine::{verify, VerifyConfig};

fn find_model_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if dir.is_dir() {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                files.extend(find_model_files(&path));
            } else if path.extension().is_some_and(|e| e == "vp") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// The results code a model declares in its `// Expect:` comment.
fn parse_expect_comment(source: &str) -> Option<String> {
    source
        .lines()
        .find_map(|line| line.strip_prefix("// Expect:"))
        .map(|rest| rest.trim().to_string())
}

fn models_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("models")
}

#[test]
fn all_models_pass_sanity() {
    let models = models_dir();
    let files = find_model_files(&models);
    assert!(!files.is_empty(), "no .vp files found in {models:?}");

    let mut failures = Vec::new();
    for file in &files {
        let result = load_model(file)
            .and_then(|(model, source)| check_model(&model, source, &file.display().to_string()).map(|_| ()));
        if let Err(e) = result {
            failures.push(format!("{}: {e}", file.display()));
        }
    }

    if !failures.is_empty() {
        panic!("sanity failures:\n{}", failures.join("\n"));
    }
}

#[test]
fn all_models_match_expected_codes() {
    let files = find_model_files(&models_dir());
    let mut failures = Vec::new();
    for file in &files {
        let source = fs::read_to_string(file).unwrap();
        let Some(expected) = parse_expect_comment(&source) else {
            continue;
        };
        let (model, _) = load_model(file).unwrap();
        match verify(&model, &VerifyConfig::default()) {
            Ok(outcome) if outcome.code == expected => {}
            Ok(outcome) => failures.push(format!(
                "{}: expected {expected}, got {}",
                file.display(),
                outcome.code
            )),
            Err(e) => failures.push(format!("{}: {e}", file.display())),
        }
    }

    if !failures.is_empty() {
        panic!("unexpected results:\n{}", failures.join("\n"));
    }
}

fn verify_bundled(name: &str) -> String {
    let (model, _) = load_model(&models_dir().join(name)).unwrap();
    verify(&model, &VerifyConfig::default()).unwrap().code
}

#[test]
fn signed_ephemerals_keep_the_session_secret() {
    assert_eq!(verify_bundled("dh_signed.vp"), "c0");
    assert_eq!(verify_bundled("dh_unsigned.vp"), "c1");
}

#[test]
fn ring_signature_holds_until_a_member_key_leaks() {
    assert_eq!(verify_bundled("ringsign.vp"), "a0");
    assert_eq!(verify_bundled("ringsign_leaked.vp"), "a1");
}

#[test]
fn unblinded_signature_verifies() {
    assert_eq!(verify_bundled("blind.vp"), "c0c1");
}

#[test]
fn later_phase_leak_exposes_earlier_traffic() {
    assert_eq!(verify_bundled("phases.vp"), "c1c0");
}

#[test]
fn equivalence_compares_resolved_values() {
    let (model, _) = load_model(&models_dir().join("equivalence.vp")).unwrap();
    let outcome = verify(&model, &VerifyConfig::default()).unwrap();
    assert_eq!(outcome.code, "e0e1");
    assert_eq!(outcome.results[1].summary, "HASH(k), HASH(j) are not equivalent.");
}

#[test]
fn pretty_output_reparses_to_the_same_text() {
    for file in find_model_files(&models_dir()) {
        let source = fs::read_to_string(&file).unwrap();
        let once = verifpal_syntax::pretty_print(&verifpal_syntax::parse(&source).unwrap());
        let twice = verifpal_syntax::pretty_print(&verifpal_syntax::parse(&once).unwrap());
        assert_eq!(once, twice, "{}", file.display());
    }
}

#[test]
fn failed_queries_are_reported_with_their_trail() {
    let (model, _) = load_model(&models_dir().join("dh_unsigned.vp")).unwrap();
    let outcome = verify(&model, &VerifyConfig::default()).unwrap();
    let text = render_outcome(&outcome);
    assert!(text.starts_with("Summary of failed queries will follow.\n"));
    assert!(text.contains("Result • confidentiality? "));
    assert!(text.contains(" → "));
    assert!(text.ends_with("c1\n"));
}

#[test]
fn passing_model_reports_all_pass() {
    let (model, _) = load_model(&models_dir().join("mac.vp")).unwrap();
    let outcome = verify(&model, &VerifyConfig::default()).unwrap();
    assert_eq!(render_outcome(&outcome), "All queries pass.\na0\n");
}

#[test]
fn sanity_errors_keep_their_message() {
    let source = Arc::new(
        "attacker[passive]
principal Alice[
    knows private a
]
Alice -> Bob: b
principal Bob[]
queries[confidentiality? a]"
            .to_string(),
    );
    let model = load_source(source.clone(), "send.vp").unwrap();
    let err = check_model(&model, source, "send.vp").unwrap_err();
    assert!(matches!(err, CliError::ModelError { .. }));
    assert_eq!(err.to_string(), "Alice sends unknown constant to Bob (b)");
}

#[test]
fn json_bridge_verifies_bundled_model() {
    let source = fs::read_to_string(models_dir().join("freshness.vp")).unwrap();
    let answer: serde_json::Value = serde_json::from_str(&respond(Request::Verify, &source).unwrap()).unwrap();
    assert_eq!(answer["resultsCode"], "f1f0");
    assert_eq!(answer["results"].as_array().unwrap().len(), 2);
}
