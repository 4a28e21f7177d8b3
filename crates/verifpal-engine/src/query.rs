//! Query evaluation against one principal state and one attacker snapshot.
//!
//! A query resolves when the property it states is found to fail.

use crate::attacker::AttackerView;
use crate::error::EngineResult;
use crate::possible::Deduction;
use crate::results::{MutationRecord, QueryOptionResult, VerifyResult};
use crate::rewrite::possible_to_rewrite_within;
use verifpal_model::{Constant, KnowledgeMap, PrincipalState, Query, QueryKind, Value};

/// Inputs shared by every query evaluated after one analysis.
pub struct QueryContext<'a> {
    pub km: &'a KnowledgeMap,
    pub ps: &'a PrincipalState,
    pub view: &'a AttackerView,
    pub max_depth: usize,
}

impl QueryContext<'_> {
    /// Evaluate `query`. Returns a resolved result, or `None` while the
    /// property holds in this state.
    pub fn evaluate(&self, query: &Query) -> EngineResult<Option<VerifyResult>> {
        let result = match query.kind {
            QueryKind::Confidentiality => self.confidentiality(query),
            QueryKind::Authentication => self.authentication(query),
            QueryKind::Freshness => self.freshness(query)?,
            QueryKind::Unlinkability => self.unlinkability(query)?,
            QueryKind::Equivalence => self.equivalence(query),
        };
        Ok(result.map(|r| self.preconditions(r)))
    }

    fn confidentiality(&self, query: &Query) -> Option<VerifyResult> {
        let c = query.constants.first()?;
        let (v, _) = self.km.resolve_internal_values(&Value::Constant(c.clone()));
        let ii = self.view.position(&v)?;
        let known = self.view.value(ii)?;
        let mutations = self.view.witness(ii).map(|w| mutation_trail(w)).unwrap_or_default();
        Some(VerifyResult {
            resolved: true,
            summary: format!("{c} ({known}) is obtained by Attacker."),
            mutations,
            ..VerifyResult::unresolved(query.clone())
        })
    }

    fn authentication(&self, query: &Query) -> Option<VerifyResult> {
        let message = query.message.as_ref()?;
        if message.recipient.id != self.ps.id {
            return None;
        }
        let c = message.constants.first()?;
        let i = self.ps.index_of(c)?;
        let sender = self.ps.sender[i];
        if sender == message.sender.id {
            return None;
        }
        if sender.is_attacker() && self.ps.before_mutate[i].equivalent(&self.ps.assigned[i], true) {
            return None;
        }
        let used = self.passing_uses(c)?;
        let (cc, _) = self.ps.resolve_constant(c);
        Some(VerifyResult {
            resolved: true,
            summary: format!(
                "{c} ({cc}), sent by {} and not by {}, is successfully used in {used} within {}'s state.",
                self.km.principal_name(sender),
                message.sender.name,
                message.recipient.name,
            ),
            mutations: mutation_trail(self.ps),
            ..VerifyResult::unresolved(query.clone())
        })
    }

    /// First primitive created by this principal that consumes `c` and
    /// still rewrites.
    fn passing_uses(&self, c: &Constant) -> Option<Value> {
        for (j, a) in self.km.assigned.iter().enumerate() {
            if self.km.creator[j] != self.ps.id || !matches!(a, Value::Primitive(_)) {
                continue;
            }
            if !self.km.constant_in_value(c, a) {
                continue;
            }
            // the principal halted before reaching this slot
            let slot = self.ps.index_of(&self.km.constants[j])?;
            let b = &self.ps.before_rewrite[slot];
            let Value::Primitive(bp) = b else { continue };
            let spec = bp.id.spec();
            let has_rule = if bp.id.is_core() {
                spec.core_rule.is_some()
            } else {
                spec.rewrite.is_some()
            };
            if !has_rule || possible_to_rewrite_within(bp, self.max_depth).0 {
                return Some(b.clone());
            }
        }
        None
    }

    fn is_fresh(&self, c: &Constant) -> EngineResult<bool> {
        match self.ps.index_of(c) {
            Some(i) => Ok(self.ps.contains_fresh_values(&Value::Constant(c.clone()), i)?),
            None => Ok(true),
        }
    }

    fn freshness(&self, query: &Query) -> EngineResult<Option<VerifyResult>> {
        let Some(c) = query.constants.first() else {
            return Ok(None);
        };
        if self.is_fresh(c)? {
            return Ok(None);
        }
        let (resolved, _) = self.ps.resolve_constant(c);
        Ok(Some(VerifyResult {
            resolved: true,
            summary: format!(
                "{c} ({resolved}) is not a fresh value. If used as a message, it could be replayed, leading to potential replay attacks."
            ),
            mutations: mutation_trail(self.ps),
            ..VerifyResult::unresolved(query.clone())
        }))
    }

    fn unlinkability(&self, query: &Query) -> EngineResult<Option<VerifyResult>> {
        for c in &query.constants {
            if self.is_fresh(c)? {
                continue;
            }
            let (resolved, _) = self.ps.resolve_constant(c);
            return Ok(Some(VerifyResult {
                resolved: true,
                summary: format!(
                    "{c} ({resolved}) cannot be a suitable unlinkability candidate since it does not satisfy freshness."
                ),
                mutations: mutation_trail(self.ps),
                ..VerifyResult::unresolved(query.clone())
            }));
        }
        let assigned: Vec<Value> = query
            .constants
            .iter()
            .map(|c| self.ps.resolve_constant(c).0)
            .collect();
        let d = Deduction::new(self.ps, self.view, self.max_depth);
        for (i, a) in assigned.iter().enumerate() {
            for (ii, aa) in assigned.iter().enumerate() {
                if i == ii || !a.equivalent(aa, false) {
                    continue;
                }
                let Value::Primitive(p) = a else { continue };
                if d.reconstruct(p).is_none() && d.recompose(p).is_none() {
                    continue;
                }
                return Ok(Some(VerifyResult {
                    resolved: true,
                    summary: format!(
                        "{} and {} are not unlinkable since they are the output of the same primitive ({a}), which can be obtained by Attacker.",
                        query.constants[i], query.constants[ii],
                    ),
                    mutations: mutation_trail(self.ps),
                    ..VerifyResult::unresolved(query.clone())
                }));
            }
        }
        Ok(None)
    }

    /// Resolves when any two named constants hold different values.
    fn equivalence(&self, query: &Query) -> Option<VerifyResult> {
        let values: Vec<Value> = query
            .constants
            .iter()
            .map(|c| self.ps.resolve_constant(c).0)
            .collect();
        if values.windows(2).all(|w| w[0].equivalent(&w[1], true)) {
            return None;
        }
        let listed = values.iter().map(Value::to_string).collect::<Vec<_>>().join(", ");
        Some(VerifyResult {
            resolved: true,
            summary: format!("{listed} are not equivalent."),
            mutations: mutation_trail(self.ps),
            ..VerifyResult::unresolved(query.clone())
        })
    }

    fn preconditions(&self, mut result: VerifyResult) -> VerifyResult {
        result.options = result
            .query
            .options
            .iter()
            .map(|option| {
                let m = &option.message;
                let triggered = m.constants.first().and_then(|c| self.ps.index_of(c)).is_some_and(|i| {
                    self.ps.meta[i]
                        .known_by
                        .iter()
                        .find(|k| k.recipient == m.recipient.id)
                        .is_some_and(|k| k.sender == m.sender.id)
                });
                let summary = match (triggered, m.constants.first()) {
                    (true, Some(c)) => format!(
                        "{} sends {c} to {} despite the query being contradicted.",
                        m.sender.name, m.recipient.name
                    ),
                    _ => String::new(),
                };
                QueryOptionResult {
                    option: option.clone(),
                    resolved: triggered,
                    summary,
                }
            })
            .collect();
        result
    }
}

/// Slots the attacker replaced in `ps`.
pub fn mutation_trail(ps: &PrincipalState) -> Vec<MutationRecord> {
    (0..ps.len())
        .filter(|&i| ps.mutated[i])
        .map(|i| MutationRecord {
            constant: ps.constant(i).to_string(),
            value: ps.before_rewrite[i].to_string(),
            original: ps.before_mutate[i].to_string(),
        })
        .collect()
}
