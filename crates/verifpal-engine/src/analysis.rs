//! The deduction loop run on every principal state the engine produces.

use crate::attacker::AttackerView;
use crate::error::EngineResult;
use crate::inject::missing_skeletons;
use crate::possible::Deduction;
use crate::query::QueryContext;
use crate::verify::Verifier;
use rayon::prelude::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, trace};
use verifpal_model::{PrimitiveId, PrincipalState, Value};

/// Emit a progress line every this many analyses.
const PROGRESS_EVERY: usize = 64;

/// A value the attacker can add to its knowledge, with how it got there.
struct Found {
    value: Value,
    how: String,
}

impl Verifier<'_> {
    /// Apply deduction rules until the attacker learns nothing more from
    /// `ps`, then re-evaluate the open queries against it.
    pub(crate) fn analyze(&self, ps: &Arc<PrincipalState>, stage: usize) -> EngineResult<()> {
        loop {
            let view = self.attacker.snapshot();
            let Some(found) = self.deduce(ps, &view) else { break };
            if self.attacker.put(&found.value, ps) {
                debug!("{}", found.how);
            }
        }
        let n = self.progress.analyses.fetch_add(1, Ordering::Relaxed) + 1;
        self.progress.known.store(self.attacker.len(), Ordering::Relaxed);
        if n % PROGRESS_EVERY == 0 {
            info!("Stage {stage}, Analysis {n}...");
        } else {
            trace!(stage, analysis = n, principal = %ps.name, "analysis complete");
        }
        self.resolve_queries(ps)
    }

    pub(crate) fn resolve_queries(&self, ps: &PrincipalState) -> EngineResult<()> {
        let view = self.attacker.snapshot();
        let ctx = QueryContext {
            km: &self.km,
            ps,
            view: &view,
            max_depth: self.config.max_depth,
        };
        for index in self.results.pending() {
            let query = &self.queries[index];
            let Some(result) = ctx.evaluate(query)? else { continue };
            let summary = result.summary.clone();
            if self.results.put(index, result) {
                info!(query = %verifpal_model::pretty_query(query), "{summary}");
            }
        }
        Ok(())
    }

    /// The first new value any rule yields, in rule order.
    fn deduce(&self, ps: &Arc<PrincipalState>, view: &AttackerView) -> Option<Found> {
        let d = Deduction::new(ps, view, self.config.max_depth);
        let new = |v: &Value| !view.knows(v);

        ps.assigned
            .iter()
            .filter_map(Value::as_primitive)
            .flat_map(|p| missing_skeletons(p, view))
            .find(|v| new(v))
            .map(|v| Found {
                how: format!("Constructed skeleton {v}."),
                value: v,
            })
            .or_else(|| {
                view.par_values().find_map_first(|a| {
                    let p = a.as_primitive()?;
                    let (revealed, ar) = d.decompose(p)?;
                    new(&revealed).then(|| Found {
                        how: format!(
                            "{} obtained by decomposing {a} with {}.",
                            output_text(&revealed),
                            pretty_list(&ar)
                        ),
                        value: revealed,
                    })
                })
            })
            .or_else(|| {
                ps.assigned.par_iter().find_map_first(|a| {
                    reconstruct(&d, a, &new).or_else(|| {
                        let p = a.as_primitive()?;
                        let (revealed, ar) = d.recompose(p)?;
                        new(&revealed).then(|| Found {
                            how: format!(
                                "{} obtained by recomposing {a} with {}.",
                                output_text(&revealed),
                                pretty_list(&ar)
                            ),
                            value: revealed,
                        })
                    })
                })
            })
            .or_else(|| {
                view.par_values().find_map_first(|a| {
                    equivalize(ps, a, &new)
                        .or_else(|| {
                            d.passwords(a).into_iter().find(|v| new(v)).map(|v| Found {
                                how: format!(
                                    "{} obtained as a password unsafely used within {a}.",
                                    output_text(&v)
                                ),
                                value: v,
                            })
                        })
                        .or_else(|| concat_fragment(a, &new))
                })
            })
    }
}

/// Reconstruct `a` or, first, any of its nested arguments.
fn reconstruct(d: &Deduction<'_>, a: &Value, new: &(dyn Fn(&Value) -> bool + Sync)) -> Option<Found> {
    match a {
        Value::Constant(_) => None,
        Value::Primitive(p) => {
            if let Some(found) = p.arguments.iter().find_map(|arg| reconstruct(d, arg, new)) {
                return Some(found);
            }
            if p.id.is_core() || !new(a) {
                return None;
            }
            let ar = d.reconstruct(p)?;
            Some(Found {
                how: format!("{} obtained by reconstructing with {}.", output_text(a), pretty_list(&ar)),
                value: a.clone(),
            })
        }
        Value::Equation(e) => {
            if !new(a) {
                return None;
            }
            let ar = d.reconstruct_equation(e)?;
            Some(Found {
                how: format!("{} obtained by reconstructing with {}.", output_text(a), pretty_list(&ar)),
                value: a.clone(),
            })
        }
    }
}

/// Slots whose current value equals a known value, read through the
/// principal's resolution of known constants.
fn equivalize(ps: &PrincipalState, a: &Value, new: &(dyn Fn(&Value) -> bool + Sync)) -> Option<Found> {
    let ar = match a {
        Value::Constant(c) => ps.resolve_constant(c).0,
        other => other.clone(),
    };
    ps.assigned
        .iter()
        .find(|aa| ar.equivalent(aa, true) && new(aa))
        .map(|aa| Found {
            how: format!(
                "{} obtained by equivalizing with the current resolution of {a}.",
                output_text(aa)
            ),
            value: aa.clone(),
        })
}

fn concat_fragment(a: &Value, new: &(dyn Fn(&Value) -> bool + Sync)) -> Option<Found> {
    let p = a.as_primitive().filter(|p| p.id == PrimitiveId::Concat)?;
    p.arguments.iter().find(|v| new(v)).map(|v| Found {
        how: format!("{} obtained as a concatenated fragment of {a}.", output_text(v)),
        value: v.clone(),
    })
}

fn ordinal(n: usize) -> String {
    match n {
        0 => "First".into(),
        1 => "Second".into(),
        2 => "Third".into(),
        3 => "Fourth".into(),
        4 => "Fifth".into(),
        _ => format!("{n}th"),
    }
}

fn output_text(v: &Value) -> String {
    match v {
        Value::Primitive(p) if p.id.spec().output == [1] => format!("Output of {v}"),
        Value::Primitive(p) => format!("{} output of {v}", ordinal(p.output)),
        _ => v.to_string(),
    }
}

fn pretty_list(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use verifpal_model::{Constant, Primitive};

    #[test]
    fn test_output_text() {
        let x = Value::Constant(Constant::reference(Arc::from("x"), 5));
        let hash = Value::primitive(Primitive::new(PrimitiveId::Hash, vec![x.clone()], 0, false));
        assert_eq!(output_text(&hash), "Output of HASH(x)");
        let hkdf = Value::primitive(Primitive::new(PrimitiveId::Hkdf, vec![x.clone(), x.clone(), x.clone()], 1, false));
        assert_eq!(output_text(&hkdf), "Second output of HKDF(x, x, x)");
        assert_eq!(output_text(&x), "x");
    }

    #[test]
    fn test_concat_fragment() {
        let a = Value::Constant(Constant::reference(Arc::from("a"), 5));
        let b = Value::Constant(Constant::reference(Arc::from("b"), 6));
        let concat = Value::primitive(Primitive::new(PrimitiveId::Concat, vec![a.clone(), b.clone()], 0, false));
        let known = [a.clone()];
        let new = |v: &Value| !known.iter().any(|k| k.equivalent(v, true));
        let found = concat_fragment(&concat, &new).unwrap();
        assert!(found.value.equivalent(&b, true));
        assert_eq!(found.how, "b obtained as a concatenated fragment of CONCAT(a, b).");
    }
}
