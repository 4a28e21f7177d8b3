//! Verification entry point.

use crate::attacker::Attacker;
use crate::config::{ProgressCounters, VerifyConfig};
use crate::error::{EngineError, EngineResult};
use crate::results::{results_code, ResultsTable, VerifyResult};
use crate::rewrite::perform_all_rewrites;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};
use verifpal_model::{check_equation_generators, sanity, AttackerKind, KnowledgeMap, Model, PrincipalState, Query};

/// Outcome of verifying one model.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub file_name: String,
    pub results: Vec<VerifyResult>,
    /// One letter and digit per query, e.g. `c1a0`.
    pub code: String,
    pub analyses: usize,
}

impl VerifyOutcome {
    pub fn all_pass(&self) -> bool {
        self.results.iter().all(|r| !r.resolved)
    }
}

/// State shared by every analysis of one model.
pub struct Verifier<'m> {
    pub(crate) queries: &'m [Query],
    pub(crate) km: KnowledgeMap,
    pub(crate) states: Vec<Arc<PrincipalState>>,
    pub(crate) attacker: Attacker,
    pub(crate) results: ResultsTable,
    pub(crate) config: VerifyConfig,
    pub(crate) progress: Arc<ProgressCounters>,
}

/// Check `model` and run the attacker against it.
pub fn verify(model: &Model, config: &VerifyConfig) -> EngineResult<VerifyOutcome> {
    let (km, states) = sanity(model)?;
    if config.threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
        {
            debug!(error = %e, "thread pool already initialized, using existing pool");
        }
    }
    let verifier = Verifier::new(model, km, states, config.clone());
    info!("Verification initiated for '{}'.", model.file_name);
    match model.attacker {
        AttackerKind::Passive => {
            info!("Attacker is configured as passive.");
            verifier.run_passive()?;
        }
        AttackerKind::Active => {
            info!("Attacker is configured as active.");
            verifier.run_active()?;
        }
    }
    let results = verifier.results.snapshot();
    let outcome = VerifyOutcome {
        file_name: model.file_name.clone(),
        code: results_code(&results),
        analyses: verifier.progress.analyses.load(Ordering::Relaxed),
        results,
    };
    info!(
        analyses = outcome.analyses,
        code = %outcome.code,
        "Verification completed for '{}'.",
        model.file_name
    );
    Ok(outcome)
}

impl<'m> Verifier<'m> {
    pub fn new(model: &'m Model, km: KnowledgeMap, states: Vec<PrincipalState>, config: VerifyConfig) -> Self {
        let progress = config.progress.clone().unwrap_or_default();
        Self {
            queries: &model.queries,
            km,
            states: states.into_iter().map(Arc::new).collect(),
            attacker: Attacker::new(model.attacker == AttackerKind::Active),
            results: ResultsTable::new(&model.queries),
            config,
            progress,
        }
    }

    fn run_passive(&self) -> EngineResult<()> {
        for phase in 0..=self.km.max_phase {
            info!("Running at phase {phase}.");
            self.start_phase(false, phase)?;
            self.standard_run()?;
        }
        Ok(())
    }

    pub(crate) fn start_phase(&self, active: bool, phase: u32) -> EngineResult<()> {
        self.attacker.reset(active, phase);
        if let Some(first) = self.states.first() {
            self.attacker.absorb_phase_values(first)?;
        }
        Ok(())
    }

    /// Honest execution: every principal runs the protocol as written and the
    /// attacker only observes.
    pub(crate) fn standard_run(&self) -> EngineResult<()> {
        for state in &self.states {
            let mut ps = state.resolve_all_values()?;
            let view = self.attacker.snapshot();
            for a in &ps.assigned {
                if let Some(p) = a.as_primitive() {
                    for skeleton in crate::inject::missing_skeletons(p, &view) {
                        self.attacker.put(&skeleton, state);
                    }
                }
            }
            let failures = perform_all_rewrites(&mut ps, self.config.max_depth);
            if let Some((p, _)) = failures.iter().find(|(p, _)| p.check) {
                return Err(EngineError::CheckedPrimitiveFails {
                    primitive: p.to_string(),
                });
            }
            for a in &ps.assigned {
                check_equation_generators(a)?;
            }
            self.analyze(&Arc::new(ps), 0)?;
        }
        Ok(())
    }
}
