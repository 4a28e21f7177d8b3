//! Query outcomes shared across analyses. Each query is resolved at most once.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use verifpal_model::{Query, QueryKind, QueryOption};

/// A slot the attacker replaced in the state that witnessed a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationRecord {
    pub constant: String,
    pub value: String,
    pub original: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOptionResult {
    pub option: QueryOption,
    pub resolved: bool,
    pub summary: String,
}

/// Outcome of one query. `resolved` means the property was found to fail.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub query: Query,
    pub resolved: bool,
    pub summary: String,
    pub mutations: Vec<MutationRecord>,
    pub options: Vec<QueryOptionResult>,
}

impl VerifyResult {
    pub fn unresolved(query: Query) -> Self {
        Self {
            query,
            resolved: false,
            summary: String::new(),
            mutations: Vec::new(),
            options: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct ResultsTable {
    results: RwLock<Vec<VerifyResult>>,
    unresolved: AtomicUsize,
}

impl ResultsTable {
    pub fn new(queries: &[Query]) -> Self {
        Self {
            results: RwLock::new(queries.iter().cloned().map(VerifyResult::unresolved).collect()),
            unresolved: AtomicUsize::new(queries.len()),
        }
    }

    /// Record a resolved result for query `index`. Returns false when the
    /// query had already been resolved.
    pub fn put(&self, index: usize, result: VerifyResult) -> bool {
        if !result.resolved {
            return false;
        }
        let mut results = self.results.write();
        let Some(slot) = results.get_mut(index) else {
            return false;
        };
        if slot.resolved {
            return false;
        }
        *slot = result;
        self.unresolved.fetch_sub(1, Ordering::AcqRel);
        true
    }

    pub fn is_resolved(&self, index: usize) -> bool {
        self.results.read().get(index).is_some_and(|r| r.resolved)
    }

    pub fn all_resolved(&self) -> bool {
        self.unresolved.load(Ordering::Acquire) == 0
    }

    /// Indices of the queries still open.
    pub fn pending(&self) -> Vec<usize> {
        self.results
            .read()
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.resolved)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn snapshot(&self) -> Vec<VerifyResult> {
        self.results.read().clone()
    }
}

/// One letter per query kind followed by `1` when resolved, `0` otherwise.
pub fn results_code(results: &[VerifyResult]) -> String {
    results
        .iter()
        .map(|r| {
            let kind = match r.query.kind {
                QueryKind::Confidentiality => 'c',
                QueryKind::Authentication => 'a',
                QueryKind::Freshness => 'f',
                QueryKind::Unlinkability => 'u',
                QueryKind::Equivalence => 'e',
            };
            format!("{kind}{}", u8::from(r.resolved))
        })
        .collect()
}
