//! Human-readable rendering of a verification outcome.

use std::fmt::Write;
use verifpal_engine::{VerifyOutcome, VerifyResult};
use verifpal_model::{pretty_message, pretty_query};

/// The closing summary printed after a verification run.
pub fn render_outcome(outcome: &VerifyOutcome) -> String {
    let mut out = String::new();
    if outcome.all_pass() {
        out.push_str("All queries pass.\n");
    } else {
        out.push_str("Summary of failed queries will follow.\n");
        for result in outcome.results.iter().filter(|r| r.resolved) {
            render_result(&mut out, result);
        }
    }
    out.push_str(&outcome.code);
    out.push('\n');
    out
}

fn render_result(out: &mut String, result: &VerifyResult) {
    let _ = writeln!(out, "Result • {} — {}", pretty_query(&result.query), result.summary);
    if !result.mutations.is_empty() {
        let _ = writeln!(out, "    Attacker mutations:");
        for m in &result.mutations {
            let _ = writeln!(out, "        {} → {} (originally {})", m.constant, m.value, m.original);
        }
    }
    for option in &result.options {
        let message = pretty_message(&option.option.message);
        if option.resolved {
            let _ = writeln!(out, "    Option • precondition[{message}] triggered: {}", option.summary);
        } else {
            let _ = writeln!(out, "    Option • precondition[{message}] not triggered.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verifpal_engine::MutationRecord;
    use verifpal_model::{Query, QueryKind};

    fn query() -> Query {
        Query {
            kind: QueryKind::Freshness,
            constants: Vec::new(),
            message: None,
            options: Vec::new(),
            span: Default::default(),
        }
    }

    #[test]
    fn test_all_pass() {
        let outcome = VerifyOutcome {
            file_name: "m.vp".into(),
            results: vec![VerifyResult::unresolved(query())],
            code: "f0".into(),
            analyses: 3,
        };
        assert_eq!(render_outcome(&outcome), "All queries pass.\nf0\n");
    }

    #[test]
    fn test_failed_query_lists_mutations() {
        let outcome = VerifyOutcome {
            file_name: "m.vp".into(),
            results: vec![VerifyResult {
                resolved: true,
                summary: "h (HASH(s)) is not a fresh value.".into(),
                mutations: vec![MutationRecord {
                    constant: "s".into(),
                    value: "nil".into(),
                    original: "s".into(),
                }],
                ..VerifyResult::unresolved(query())
            }],
            code: "f1".into(),
            analyses: 3,
        };
        let text = render_outcome(&outcome);
        assert!(text.starts_with("Summary of failed queries will follow.\n"));
        assert!(text.contains("Result • freshness?  — h (HASH(s)) is not a fresh value.\n"));
        assert!(text.contains("        s → nil (originally s)\n"));
        assert!(text.ends_with("f1\n"));
    }
}
