use crate::rewrite::MAX_DEPTH;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

/// Lock-free progress counters shared between the engine and the CLI.
pub struct ProgressCounters {
    pub stage: AtomicUsize,
    /// Completed analyses across all stages.
    pub analyses: AtomicUsize,
    /// Size of the attacker's knowledge.
    pub known: AtomicUsize,
}

impl Default for ProgressCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self {
            stage: AtomicUsize::new(0),
            analyses: AtomicUsize::new(0),
            known: AtomicUsize::new(0),
        }
    }
}

/// Configuration for a verification run.
#[derive(Clone)]
pub struct VerifyConfig {
    /// Number of worker threads (0 = rayon default).
    pub threads: usize,
    /// Largest mutation product scanned exhaustively per principal and stage.
    /// Larger products are truncated to the integer n-th root per slot.
    pub mutation_cap: usize,
    /// Largest number of slots mutated together when the full product
    /// exceeds the cap.
    pub max_weight: usize,
    /// Mutations tried per principal per stage.
    pub scan_budget: usize,
    /// Fabricated applications kept per injected primitive.
    pub max_injections: usize,
    /// Last stage run before giving up on unresolved queries.
    pub max_stage: usize,
    /// Recursion bound for rewriting, deduction and injection.
    pub max_depth: usize,
    /// Shared progress counters, read by the CLI on its own schedule.
    pub progress: Option<Arc<ProgressCounters>>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            mutation_cap: 1 << 16,
            max_weight: 3,
            scan_budget: 50_000,
            max_injections: 500,
            max_stage: 12,
            max_depth: MAX_DEPTH,
            progress: None,
        }
    }
}

impl std::fmt::Debug for VerifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyConfig")
            .field("threads", &self.threads)
            .field("mutation_cap", &self.mutation_cap)
            .field("max_weight", &self.max_weight)
            .field("scan_budget", &self.scan_budget)
            .field("max_injections", &self.max_injections)
            .field("max_stage", &self.max_stage)
            .field("max_depth", &self.max_depth)
            .field("progress", &self.progress.as_ref().map(|_| "..."))
            .finish()
    }
}
