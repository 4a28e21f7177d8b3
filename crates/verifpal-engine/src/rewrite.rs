//! Rewriting of primitive applications to their canonical values.
//!
//! [`possible_to_rewrite_within`] is a pure check used by deduction and
//! queries. [`perform_all_rewrites`] applies rewriting to a principal's state
//! and reports the primitives that failed to rewrite together with their slot.
//! Both stop descending into nested primitives past the given depth.

use std::sync::Arc;
use verifpal_model::primitive::RewriteRule;
use verifpal_model::{Equation, Primitive, PrincipalState, Value};

/// Default recursion bound for rewriting and deduction.
pub const MAX_DEPTH: usize = 16;

/// [`possible_to_rewrite_within`] bounded by [`MAX_DEPTH`].
pub fn possible_to_rewrite(p: &Primitive) -> (bool, Vec<Value>) {
    possible_to_rewrite_within(p, MAX_DEPTH)
}

/// Whether `p` rewrites, and what it rewrites to. Arguments are rewritten
/// first. On failure the primitive is returned with its rewritten arguments,
/// and the flag is true only for primitives that cannot be checked.
/// Primitives nested deeper than `max_depth` are treated as failing.
pub fn possible_to_rewrite_within(p: &Primitive, max_depth: usize) -> (bool, Vec<Value>) {
    rewrite_at(p, 0, max_depth)
}

fn rewrite_at(p: &Primitive, depth: usize, max_depth: usize) -> (bool, Vec<Value>) {
    let spec = p.id.spec();
    let fail = |p: Primitive| (!spec.check, vec![Value::primitive(p)]);
    if depth > max_depth {
        return fail(p.clone());
    }
    let arguments = p
        .arguments
        .iter()
        .map(|a| match a {
            Value::Primitive(inner) => {
                let (ok, values) = rewrite_at(inner, depth + 1, max_depth);
                select(inner, ok, values).unwrap_or_else(Value::nil)
            }
            other => other.clone(),
        })
        .collect();
    let p = Primitive {
        id: p.id,
        arguments,
        output: p.output,
        check: p.check,
    };
    if p.id.is_core() {
        return match spec.core_rule {
            Some(rule) => rule(&p),
            None => fail(p),
        };
    }
    let Some(rule) = &spec.rewrite else {
        return (true, vec![Value::primitive(p)]);
    };
    let from = match p.arguments.get(rule.from) {
        Some(Value::Primitive(from)) if from.id == rule.id => Arc::clone(from),
        _ => return fail(p),
    };
    if !matching_holds(&p, &from, rule, depth, max_depth) {
        return fail(p);
    }
    match (rule.to)(&from) {
        Some(v) => (true, vec![v]),
        None => fail(p),
    }
}

/// The value a rewrite stands for: the `output`-th result of a successful
/// core rule, the first result otherwise.
fn select(p: &Primitive, ok: bool, values: Vec<Value>) -> Option<Value> {
    let index = if ok && p.id.is_core() { p.output } else { 0 };
    values.into_iter().nth(index)
}

fn matching_holds(
    p: &Primitive,
    from: &Primitive,
    rule: &RewriteRule,
    depth: usize,
    max_depth: usize,
) -> bool {
    rule.matching.iter().all(|&(a, candidates)| {
        let Some(x) = p.arguments.get(a) else {
            return false;
        };
        candidates.iter().any(|&m| {
            let Some(y) = from.arguments.get(m) else {
                return false;
            };
            let Some(x) = (rule.filter)(p, x, m) else {
                return false;
            };
            canonical(&x, depth, max_depth).equivalent(&canonical(y, depth, max_depth), true)
        })
    })
}

fn canonical(v: &Value, depth: usize, max_depth: usize) -> Value {
    match v {
        Value::Primitive(p) => {
            let (ok, values) = rewrite_at(p, depth + 1, max_depth);
            if !ok {
                return v.clone();
            }
            select(p, ok, values).unwrap_or_else(|| v.clone())
        }
        other => other.clone(),
    }
}

/// A primitive whose arguments at one `given` group are distinct outputs
/// of the same primitive collapses to that primitive's revealed argument.
pub fn possible_to_rebuild(p: &Primitive) -> Option<Value> {
    if p.id.is_core() {
        return None;
    }
    let rule = p.id.spec().rebuild.as_ref()?;
    rule.given.iter().find_map(|group| {
        let has: Vec<&Arc<Primitive>> = group
            .iter()
            .filter_map(|&g| match p.arguments.get(g) {
                Some(Value::Primitive(x)) if x.id == rule.id => Some(x),
                _ => None,
            })
            .collect();
        if has.len() != group.len() {
            return None;
        }
        let (first, rest) = has.split_first()?;
        rest.iter()
            .all(|h| first.equivalent(h, false) && first.output != h.output)
            .then(|| first.arguments.get(rule.reveal).cloned())
            .flatten()
    })
}

/// Outcome of rewriting one value held by a principal.
#[derive(Debug, Clone)]
pub struct Rewrite {
    /// Primitives that failed to rewrite, innermost first.
    pub failed: Vec<Arc<Primitive>>,
    pub rewritten: bool,
    pub value: Value,
}

/// Slot the result of a top-level rewrite is written back to.
struct Slot<'a> {
    ps: &'a mut PrincipalState,
    index: usize,
}

impl Slot<'_> {
    fn assign(&mut self, v: &Value) {
        self.ps.assigned[self.index] = v.clone();
        if !self.ps.mutated[self.index] {
            self.ps.before_mutate[self.index] = v.clone();
        }
    }
}

fn rewrite_primitive(p: &Primitive, mut slot: Option<Slot<'_>>, max_depth: usize) -> Rewrite {
    let (mut rewrite, mut failed, rewritten) = rewrite_arguments(p, max_depth);
    if let Some(rebuilt) = possible_to_rebuild(&rewrite) {
        if let Some(s) = slot.as_mut() {
            s.assign(&rebuilt);
        }
        match &rebuilt {
            Value::Primitive(q) => rewrite = (**q).clone(),
            _ => {
                return Rewrite {
                    failed,
                    rewritten,
                    value: rebuilt,
                }
            }
        }
    }
    let (ok, values) = possible_to_rewrite_within(&rewrite, max_depth);
    let mut index = 0;
    if !ok {
        if let Some(Value::Primitive(f)) = values.first() {
            failed.push(Arc::clone(f));
        }
    } else if p.id.is_core() {
        index = p.output;
    }
    let changed = rewritten || ok;
    let Some(value) = values.into_iter().nth(index) else {
        if let Some(s) = slot.as_mut() {
            s.assign(&Value::nil());
        }
        return Rewrite {
            failed,
            rewritten: changed,
            value: Value::nil(),
        };
    };
    if changed {
        if let Some(s) = slot.as_mut() {
            s.ps.rewritten[s.index] = true;
            s.assign(&value);
        }
    }
    Rewrite {
        failed,
        rewritten: changed,
        value,
    }
}

fn rewrite_arguments(p: &Primitive, max_depth: usize) -> (Primitive, Vec<Arc<Primitive>>, bool) {
    let mut failed = Vec::new();
    let mut rewritten = false;
    let mut arguments = Vec::with_capacity(p.arguments.len());
    for a in &p.arguments {
        let r = match a {
            Value::Constant(_) => {
                arguments.push(a.clone());
                continue;
            }
            Value::Primitive(q) => rewrite_primitive(q, None, max_depth),
            Value::Equation(e) => rewrite_equation(e, None, max_depth),
        };
        if r.rewritten {
            rewritten = true;
            arguments.push(r.value);
        } else {
            arguments.push(a.clone());
            failed.extend(r.failed);
        }
    }
    let rewrite = Primitive {
        id: p.id,
        arguments,
        output: p.output,
        check: p.check,
    };
    (rewrite, failed, rewritten)
}

fn rewrite_equation(e: &Equation, mut slot: Option<Slot<'_>>, max_depth: usize) -> Rewrite {
    let mut failed = Vec::new();
    let mut rewritten = false;
    let mut values: Vec<Value> = Vec::with_capacity(e.values.len());
    for (i, a) in e.values.iter().enumerate() {
        match a {
            Value::Constant(_) => values.push(a.clone()),
            Value::Primitive(q) => {
                let spec = q.id.spec();
                let has_rule = if q.id.is_core() {
                    spec.core_rule.is_some()
                } else {
                    spec.rewrite.is_some()
                };
                if !has_rule {
                    values.push(a.clone());
                    continue;
                }
                let r = rewrite_primitive(q, None, max_depth);
                if !r.rewritten {
                    values.push(a.clone());
                    failed.extend(r.failed);
                    continue;
                }
                rewritten = true;
                match r.value {
                    Value::Equation(inner) if i == 0 => values = inner.values.clone(),
                    Value::Equation(inner) => values.extend(inner.values.iter().skip(1).cloned()),
                    other => values.push(other),
                }
            }
            Value::Equation(inner) => {
                let r = rewrite_equation(inner, None, max_depth);
                if !r.rewritten {
                    values.push(a.clone());
                    failed.extend(r.failed);
                    continue;
                }
                rewritten = true;
                values.push(r.value);
            }
        }
    }
    let value = Value::equation(values);
    if rewritten {
        if let Some(s) = slot.as_mut() {
            s.ps.rewritten[s.index] = true;
            s.assign(&value);
        }
    }
    Rewrite {
        failed,
        rewritten,
        value,
    }
}

/// Rewrite every slot of `ps` in place. Returns each failed primitive with
/// the slot it was found in.
pub fn perform_all_rewrites(ps: &mut PrincipalState, max_depth: usize) -> Vec<(Arc<Primitive>, usize)> {
    let mut failures = Vec::new();
    for i in 0..ps.len() {
        let r = match ps.assigned[i].clone() {
            Value::Primitive(p) => {
                rewrite_primitive(&p, Some(Slot { ps: &mut *ps, index: i }), max_depth)
            }
            Value::Equation(e) => {
                rewrite_equation(&e, Some(Slot { ps: &mut *ps, index: i }), max_depth)
            }
            Value::Constant(_) => continue,
        };
        failures.extend(r.failed.into_iter().map(|p| (p, i)));
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use verifpal_model::{Constant, PrimitiveId};

    fn c(name: &str, id: u32) -> Value {
        Value::Constant(Constant::reference(Arc::from(name), id))
    }

    fn prim(id: PrimitiveId, args: Vec<Value>) -> Primitive {
        Primitive::new(id, args, 0, false)
    }

    fn v(p: Primitive) -> Value {
        Value::primitive(p)
    }

    #[test]
    fn test_decryption_round_trip() {
        let (k, m) = (c("k", 2), c("m", 3));
        let enc = v(prim(PrimitiveId::Enc, vec![k.clone(), m.clone()]));
        let (ok, values) = possible_to_rewrite(&prim(PrimitiveId::Dec, vec![k, enc.clone()]));
        assert!(ok);
        assert!(values[0].equivalent(&m, true));

        let (ok, values) = possible_to_rewrite(&prim(PrimitiveId::Dec, vec![c("x", 4), enc]));
        assert!(ok, "DEC is not checked");
        assert_eq!(values[0].as_primitive().map(|p| p.id), Some(PrimitiveId::Dec));
    }

    #[test]
    fn test_checked_failures() {
        let (k, m, ad) = (c("k", 2), c("m", 3), c("ad", 4));
        let enc = v(prim(PrimitiveId::AeadEnc, vec![k.clone(), m.clone(), ad.clone()]));
        let good = prim(PrimitiveId::AeadDec, vec![k.clone(), enc.clone(), ad]);
        let (ok, values) = possible_to_rewrite(&good);
        assert!(ok);
        assert!(values[0].equivalent(&m, true));

        let bad = prim(PrimitiveId::AeadDec, vec![k, enc, c("other", 5)]);
        assert!(!possible_to_rewrite(&bad).0);
    }

    #[test]
    fn test_signatures() {
        let (sk, m) = (c("sk", 2), c("m", 3));
        let pk = Value::equation(vec![Value::g(), sk.clone()]);
        let sig = v(prim(PrimitiveId::Sign, vec![sk, m.clone()]));
        let verif = prim(PrimitiveId::SignVerif, vec![pk.clone(), m, sig.clone()]);
        let (ok, values) = possible_to_rewrite(&verif);
        assert!(ok);
        assert!(values[0].is_nil());

        let forged = prim(PrimitiveId::SignVerif, vec![pk, c("m2", 4), sig]);
        assert!(!possible_to_rewrite(&forged).0);
    }

    #[test]
    fn test_public_key_decryption() {
        let (sk, m) = (c("sk", 2), c("m", 3));
        let pk = Value::equation(vec![Value::g(), sk.clone()]);
        let ct = v(prim(PrimitiveId::PkeEnc, vec![pk, m.clone()]));
        let (ok, values) = possible_to_rewrite(&prim(PrimitiveId::PkeDec, vec![sk, ct]));
        assert!(ok);
        assert!(values[0].equivalent(&m, true));
    }

    #[test]
    fn test_unblind() {
        let (k, m, a) = (c("k", 2), c("m", 3), c("a", 4));
        let blinded = v(prim(PrimitiveId::Blind, vec![k.clone(), m.clone()]));
        let sig = v(prim(PrimitiveId::Sign, vec![a.clone(), blinded]));
        let (ok, values) = possible_to_rewrite(&prim(PrimitiveId::Unblind, vec![k, m.clone(), sig]));
        assert!(ok);
        let expected = v(prim(PrimitiveId::Sign, vec![a, m]));
        assert!(values[0].equivalent(&expected, true));
    }

    #[test]
    fn test_nested_split_selects_output() {
        let (a, b) = (c("a", 2), c("b", 3));
        let concat = v(prim(PrimitiveId::Concat, vec![a, b.clone()]));
        let second = v(Primitive::new(PrimitiveId::Split, vec![concat], 1, false));
        let hash = prim(PrimitiveId::Hash, vec![second]);
        let (ok, values) = possible_to_rewrite(&hash);
        assert!(ok);
        let inner = values[0].as_primitive().unwrap();
        assert!(inner.arguments[0].equivalent(&b, true));
    }

    #[test]
    fn test_shamir_rebuild() {
        let k = c("k", 2);
        let share = |output| v(Primitive::new(PrimitiveId::ShamirSplit, vec![k.clone()], output, false));
        let join = prim(PrimitiveId::ShamirJoin, vec![share(0), share(2)]);
        assert!(possible_to_rebuild(&join).is_some_and(|r| r.equivalent(&k, true)));
        let same = prim(PrimitiveId::ShamirJoin, vec![share(1), share(1)]);
        assert!(possible_to_rebuild(&same).is_none());
    }

    #[test]
    fn test_depth_bound_stops_nested_rewrites() {
        let (k, m) = (c("k", 2), c("m", 3));
        let enc = v(prim(PrimitiveId::Enc, vec![k.clone(), m.clone()]));
        let dec = v(prim(PrimitiveId::Dec, vec![k, enc]));
        let hash = prim(PrimitiveId::Hash, vec![dec]);

        let (ok, values) = possible_to_rewrite_within(&hash, MAX_DEPTH);
        assert!(ok);
        let inner = values[0].as_primitive().unwrap();
        assert!(inner.arguments[0].equivalent(&m, true));

        // DEC sits one level below HASH and is left as written
        let (ok, values) = possible_to_rewrite_within(&hash, 0);
        assert!(ok);
        let inner = values[0].as_primitive().unwrap();
        assert_eq!(inner.arguments[0].as_primitive().map(|p| p.id), Some(PrimitiveId::Dec));
    }

    #[test]
    fn test_assert_fails_on_mismatch() {
        let check = Primitive::new(PrimitiveId::Assert, vec![c("a", 2), c("b", 3)], 0, true);
        assert!(!possible_to_rewrite(&check).0);
        let same = Primitive::new(PrimitiveId::Assert, vec![c("a", 2), c("a", 2)], 0, true);
        assert!(possible_to_rewrite(&same).0);
    }
}
