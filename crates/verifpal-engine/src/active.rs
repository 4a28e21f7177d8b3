//! The staged active attacker.
//!
//! Each stage builds a mutation map per principal and analyzes every state
//! obtained by applying one combination of substitutions. Later stages widen
//! the substitutions the attacker may fabricate.

use crate::error::EngineResult;
use crate::mutation::{Combination, MutationMap};
use crate::rewrite::perform_all_rewrites;
use crate::verify::Verifier;
use rayon::prelude::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};
use verifpal_model::{PrincipalState, Value};

impl Verifier<'_> {
    pub(crate) fn run_active(&self) -> EngineResult<()> {
        for phase in 0..=self.km.max_phase {
            info!("Running at phase {phase}.");
            self.start_phase(true, phase)?;
            self.standard_run()?;
            self.run_stages()?;
        }
        Ok(())
    }

    fn run_stages(&self) -> EngineResult<()> {
        self.run_stage(1)?;
        if self.results.all_resolved() {
            return Ok(());
        }
        let (a, b) = rayon::join(|| self.run_stage(2), || self.run_stage(3));
        a?;
        b?;
        if self.results.all_resolved() {
            return Ok(());
        }
        let (a, b) = rayon::join(|| self.run_stage(4), || self.run_stage(5));
        a?;
        b?;
        let mut stage = 6;
        while !self.results.all_resolved() && stage <= self.config.max_stage {
            let before = self.attacker.len();
            self.run_stage(stage)?;
            if self.attacker.len() == before {
                debug!(stage, known = before, "attacker exhausted");
                break;
            }
            stage += 1;
        }
        Ok(())
    }

    fn run_stage(&self, stage: usize) -> EngineResult<()> {
        if stage > self.config.max_stage {
            return Ok(());
        }
        self.progress.stage.fetch_max(stage, Ordering::Relaxed);
        info!("Stage {stage}, Analysis {}...", self.progress.analyses.load(Ordering::Relaxed));
        self.states
            .par_iter()
            .try_for_each(|ps| self.scan_principal(ps, stage))
    }

    fn scan_principal(&self, ps: &Arc<PrincipalState>, stage: usize) -> EngineResult<()> {
        if self.results.all_resolved() {
            return Ok(());
        }
        let view = self.attacker.snapshot();
        let map = MutationMap::build(&self.km, ps, &view, stage, &self.config)?;
        for skeleton in &map.skeletons {
            self.attacker.put(skeleton, ps);
        }
        let mut scanned = 0usize;
        for combination in map.combinations(&self.config) {
            if self.results.all_resolved() {
                break;
            }
            scanned += 1;
            if let Some(mutated) = self.mutate(ps, &map, &combination)? {
                self.analyze(&Arc::new(mutated), stage)?;
            }
        }
        debug!(principal = %ps.name, stage, scanned, "mutation scan complete");
        Ok(())
    }

    /// Apply `combination` to a clone of `ps`, rewrite it, and cut it short
    /// where the principal would halt. Returns `None` when nothing changed.
    pub(crate) fn mutate(
        &self,
        ps: &PrincipalState,
        map: &MutationMap,
        combination: &Combination,
    ) -> EngineResult<Option<PrincipalState>> {
        let mut mutated = ps.clone();
        let mut worthwhile = false;
        for (dim, value) in combination {
            let (ai, Some(ii)) = mutated.resolve_constant(&map.constants[*dim]) else {
                continue;
            };
            let ar = mutated.resolve_value(&ai, ii, true)?;
            if value.equivalent(&ar, true) {
                continue;
            }
            let value = match (value, &ar) {
                (Value::Primitive(p), Value::Primitive(rp)) => {
                    let mut p = (**p).clone();
                    p.output = rp.output;
                    p.check = rp.check;
                    Value::primitive(p)
                }
                _ => value.clone(),
            };
            mutated.mutate(ii, value);
            worthwhile = true;
        }
        if !worthwhile {
            return Ok(None);
        }
        let mut mutated = mutated.resolve_all_values()?;
        let failures = perform_all_rewrites(&mut mutated, self.config.max_depth);
        let halted = failures
            .iter()
            .find(|(p, slot)| p.check && mutated.creator[*slot] == mutated.id)
            .map(|(_, slot)| *slot);
        if let Some(slot) = halted {
            let declared_at = mutated.meta[slot].declared_at;
            let in_last_block = mutated.meta.last().map_or(true, |m| m.declared_at == declared_at);
            let cut = if in_last_block {
                slot + 1
            } else {
                (0..mutated.len())
                    .find(|&j| mutated.meta[j].declared_at == declared_at)
                    .map_or(slot + 1, |j| j + 1)
            };
            mutated.truncate(cut);
        }
        Ok(Some(mutated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerifyConfig;
    use crate::verify::verify;
    use verifpal_model::{lower, sanity, Model};

    const MAC_CHECKED: &str = "attacker[active]
principal A[
    knows private k
    generates m
    t = MAC(k, m)
]
A -> B: m, t
principal B[
    knows private k
    _ = ASSERT(MAC(k, m), t)?
    h = HASH(m)
]
queries[authentication? A -> B: m]";

    fn model(src: &str) -> Model {
        lower(&verifpal_syntax::parse(src).expect("parse"), "test.vp").unwrap()
    }

    #[test]
    fn test_failed_check_halts_principal() {
        let model = model(MAC_CHECKED);
        let (km, states) = sanity(&model).unwrap();
        let bob = states[1].clone();
        let full = bob.len();
        let verifier = Verifier::new(&model, km, states, VerifyConfig::default());
        let m = bob.index_of(&model.queries[0].message.as_ref().unwrap().constants[0]).unwrap();
        let map = MutationMap {
            constants: vec![bob.constant(m).clone()],
            mutations: vec![vec![Value::nil()]],
            skeletons: Vec::new(),
        };
        let mutated = verifier
            .mutate(&bob, &map, &vec![(0, Value::nil())])
            .unwrap()
            .unwrap();
        assert!(mutated.len() < full);
        assert!(mutated.mutated[m]);
        assert!(verifier.mutate(&bob, &map, &vec![(0, bob.assigned[m].clone())]).unwrap().is_none());
    }

    #[test]
    fn test_failed_final_check_keeps_state() {
        let model = model(
            "attacker[active]
principal A[
    knows private k
    generates m
    t = MAC(k, m)
]
A -> B: m, t
principal B[
    knows private k
    _ = ASSERT(MAC(k, m), t)?
]
queries[authentication? A -> B: m]",
        );
        let (km, states) = sanity(&model).unwrap();
        let bob = states[1].clone();
        let verifier = Verifier::new(&model, km, states, VerifyConfig::default());
        let m = bob.index_of(&model.queries[0].message.as_ref().unwrap().constants[0]).unwrap();
        let map = MutationMap {
            constants: vec![bob.constant(m).clone()],
            mutations: vec![vec![Value::nil()]],
            skeletons: Vec::new(),
        };
        let mutated = verifier
            .mutate(&bob, &map, &vec![(0, Value::nil())])
            .unwrap()
            .unwrap();
        assert_eq!(mutated.len(), bob.len());
        assert!(mutated.mutated[m]);
    }

    #[test]
    fn test_mac_guards_authentication() {
        let outcome = verify(&model(MAC_CHECKED), &VerifyConfig::default()).unwrap();
        assert_eq!(outcome.code, "a0");
    }

    #[test]
    fn test_unchecked_message_is_forged() {
        let outcome = verify(
            &model(
                "attacker[active]
principal A[
    generates m
]
A -> B: m
principal B[
    h = HASH(m)
]
queries[authentication? A -> B: m]",
            ),
            &VerifyConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome.code, "a1");
        assert!(outcome.results[0]
            .summary
            .contains("sent by Attacker and not by A, is successfully used in HASH("));
        assert!(!outcome.results[0].mutations.is_empty());
    }
}
