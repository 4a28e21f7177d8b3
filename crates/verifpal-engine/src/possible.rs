//! What the attacker can derive from what it already knows.

use crate::attacker::AttackerView;
use crate::rewrite::possible_to_rewrite_within;
use verifpal_model::{Equation, Primitive, PrincipalState, Qualifier, Value};

/// Deduction predicates evaluated against one principal state and one
/// snapshot of attacker knowledge.
#[derive(Clone, Copy)]
pub struct Deduction<'a> {
    pub ps: &'a PrincipalState,
    pub view: &'a AttackerView,
    pub max_depth: usize,
}

impl<'a> Deduction<'a> {
    pub fn new(ps: &'a PrincipalState, view: &'a AttackerView, max_depth: usize) -> Self {
        Self { ps, view, max_depth }
    }

    /// Knowing every `given` argument of `p` reveals its `reveal` argument.
    /// Returns the revealed value and the arguments used.
    pub fn decompose(&self, p: &Primitive) -> Option<(Value, Vec<Value>)> {
        self.decompose_at(p, 0)
    }

    fn decompose_at(&self, p: &Primitive, depth: usize) -> Option<(Value, Vec<Value>)> {
        if p.id.is_core() || depth > self.max_depth {
            return None;
        }
        let rule = p.id.spec().decompose.as_ref()?;
        let mut has = Vec::with_capacity(rule.given.len());
        for (i, &g) in rule.given.iter().enumerate() {
            let Some(a) = p.arguments.get(g).and_then(|arg| (rule.filter)(p, arg, i)) else {
                continue;
            };
            if self.obtainable(&a, depth) {
                has.push(a);
            }
        }
        if has.len() < rule.given.len() {
            return None;
        }
        p.arguments.get(rule.reveal).map(|r| (r.clone(), has))
    }

    /// Holding outputs of `p` at every index of some `given` group reveals
    /// its `reveal` argument.
    pub fn recompose(&self, p: &Primitive) -> Option<(Value, Vec<Value>)> {
        if p.id.is_core() {
            return None;
        }
        let rule = p.id.spec().recompose.as_ref()?;
        for group in rule.given {
            let mut ar = Vec::new();
            for &output in group.iter() {
                for v in self.view.values() {
                    let Value::Primitive(vp) = v else { continue };
                    if vp.output != output || !vp.equivalent(p, false) {
                        continue;
                    }
                    ar.push(v.clone());
                    if ar.len() >= group.len() {
                        let revealed = p.arguments.get(rule.reveal)?.clone();
                        return Some((revealed, ar));
                    }
                }
            }
        }
        None
    }

    /// The attacker can build `p` itself: it rewrites, and every argument is
    /// known or derivable.
    pub fn reconstruct(&self, p: &Primitive) -> Option<Vec<Value>> {
        self.reconstruct_at(p, 0)
    }

    fn reconstruct_at(&self, p: &Primitive, depth: usize) -> Option<Vec<Value>> {
        if depth > self.max_depth || !possible_to_rewrite_within(p, self.max_depth).0 {
            return None;
        }
        p.arguments
            .iter()
            .map(|a| self.obtainable(a, depth).then(|| a.clone()))
            .collect()
    }

    /// `G^x` needs `x`; `G^x^y` needs both exponents, or one exponent and
    /// the public value raised to the other.
    pub fn reconstruct_equation(&self, e: &Equation) -> Option<Vec<Value>> {
        let values = e.flatten();
        let known = |v: &Value| self.view.knows(v);
        match values.as_slice() {
            [_, s] => known(s).then(|| vec![s.clone()]),
            [base, s0, s1, ..] => {
                let (hs0, hs1) = (known(s0), known(s1));
                if hs0 && hs1 {
                    return Some(vec![s0.clone(), s1.clone()]);
                }
                let p1 = Value::equation(vec![base.clone(), s1.clone()]);
                if hs0 && known(&p1) {
                    return Some(vec![s0.clone(), p1]);
                }
                let p0 = Value::equation(vec![base.clone(), s0.clone()]);
                if hs1 && known(&p0) {
                    return Some(vec![p0, s1.clone()]);
                }
                None
            }
            _ => None,
        }
    }

    fn obtainable(&self, a: &Value, depth: usize) -> bool {
        if self.view.knows(a) {
            return true;
        }
        match a {
            Value::Constant(_) => false,
            Value::Primitive(p) => {
                self.reconstruct_at(p, depth + 1).is_some() || self.decompose_at(p, depth + 1).is_some()
            }
            Value::Equation(e) => self.reconstruct_equation(e).is_some(),
        }
    }

    /// Password constants exposed inside `a`: those not sitting beneath an
    /// argument position that protects passwords, such as a `PW_HASH` input or
    /// an `ENC` plaintext.
    pub fn passwords(&self, a: &Value) -> Vec<Value> {
        let mut out = Vec::new();
        self.collect_passwords(a, false, &mut out, 0);
        out
    }

    fn collect_passwords(&self, a: &Value, hashed: bool, out: &mut Vec<Value>, depth: usize) {
        if depth > self.max_depth {
            return;
        }
        match a {
            Value::Constant(c) => {
                if hashed {
                    return;
                }
                let (resolved, slot) = self.ps.resolve_constant(c);
                let Value::Constant(rc) = &resolved else { return };
                let qualifier = rc
                    .qualifier
                    .or_else(|| slot.and_then(|i| self.ps.constant(i).qualifier));
                if qualifier == Some(Qualifier::Password) {
                    out.push(resolved);
                }
            }
            Value::Primitive(p) => {
                let hashing = if p.id.is_core() { &[][..] } else { p.id.spec().password_hashing };
                for (i, arg) in p.arguments.iter().enumerate() {
                    self.collect_passwords(arg, hashed || hashing.contains(&i), out, depth + 1);
                }
            }
            Value::Equation(e) => {
                for v in &e.values {
                    self.collect_passwords(v, hashed, out, depth + 1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attacker::Attacker;
    use std::sync::Arc;
    use verifpal_model::{lower, sanity, Constant, PrimitiveId};

    fn c(name: &str, id: u32) -> Value {
        Value::Constant(Constant::reference(Arc::from(name), id))
    }

    fn prim(id: PrimitiveId, args: Vec<Value>, output: usize) -> Primitive {
        Primitive::new(id, args, output, false)
    }

    fn state() -> Arc<PrincipalState> {
        let model = lower(
            &verifpal_syntax::parse(
                "attacker[active]\nprincipal A[knows password pw\nknows private k]\nqueries[confidentiality? pw]",
            )
            .expect("parse"),
            "test.vp",
        )
        .unwrap();
        let (_, mut states) = sanity(&model).unwrap();
        Arc::new(states.remove(0))
    }

    fn view_with(known: &[Value]) -> (Arc<PrincipalState>, Arc<AttackerView>) {
        let ps = state();
        let attacker = Attacker::new(true);
        for v in known {
            attacker.put(v, &ps);
        }
        (ps, attacker.snapshot())
    }

    #[test]
    fn test_decompose_needs_key() {
        let (k, m) = (c("k", 10), c("m", 11));
        let enc = prim(PrimitiveId::Enc, vec![k.clone(), m.clone()], 0);
        let (ps, view) = view_with(&[]);
        assert!(Deduction::new(&ps, &view, 16).decompose(&enc).is_none());

        let (ps, view) = view_with(&[k.clone()]);
        let (revealed, used) = Deduction::new(&ps, &view, 16).decompose(&enc).unwrap();
        assert!(revealed.equivalent(&m, true));
        assert!(used[0].equivalent(&k, true));
    }

    #[test]
    fn test_decompose_through_reconstruction() {
        let (a, b, m) = (c("a", 10), c("b", 11), c("m", 12));
        let key = Value::primitive(prim(PrimitiveId::Hash, vec![a.clone(), b.clone()], 0));
        let enc = prim(PrimitiveId::Enc, vec![key, m.clone()], 0);
        let (ps, view) = view_with(&[a, b]);
        let (revealed, _) = Deduction::new(&ps, &view, 16).decompose(&enc).unwrap();
        assert!(revealed.equivalent(&m, true));
    }

    #[test]
    fn test_recompose_shares() {
        let k = c("k", 10);
        let share = |o| Value::primitive(prim(PrimitiveId::ShamirSplit, vec![k.clone()], o));
        let target = prim(PrimitiveId::ShamirSplit, vec![k.clone()], 0);
        let (ps, view) = view_with(&[share(0)]);
        assert!(Deduction::new(&ps, &view, 16).recompose(&target).is_none());
        let (ps, view) = view_with(&[share(0), share(2)]);
        let (revealed, used) = Deduction::new(&ps, &view, 16).recompose(&target).unwrap();
        assert!(revealed.equivalent(&k, true));
        assert_eq!(used.len(), 2);
    }

    #[test]
    fn test_reconstruct_equation() {
        let (a, b) = (c("a", 10), c("b", 11));
        let gab = Equation::new(vec![Value::g(), a.clone(), b.clone()]);
        let ga = Value::equation(vec![Value::g(), a.clone()]);
        let (ps, view) = view_with(&[ga.clone()]);
        assert!(Deduction::new(&ps, &view, 16).reconstruct_equation(&gab).is_none());
        let (ps, view) = view_with(&[ga, b]);
        assert!(Deduction::new(&ps, &view, 16).reconstruct_equation(&gab).is_some());
    }

    #[test]
    fn test_reconstruct_requires_rewrite() {
        let (k, x, m) = (c("k", 10), c("x", 11), c("m", 12));
        let enc = Value::primitive(prim(PrimitiveId::AeadEnc, vec![k.clone(), m, x.clone()], 0));
        let dec = Primitive::new(PrimitiveId::AeadDec, vec![k.clone(), enc.clone(), c("y", 13)], 0, true);
        let (ps, view) = view_with(&[k, x, enc, c("y", 13)]);
        assert!(Deduction::new(&ps, &view, 16).reconstruct(&dec).is_none());
    }

    #[test]
    fn test_passwords_hidden_by_hashing() {
        let ps = state();
        let pw = Value::Constant(ps.constant(2).clone());
        let k = Value::Constant(ps.constant(3).clone());
        let attacker = Attacker::new(true);
        let view = attacker.snapshot();
        let d = Deduction::new(&ps, &view, 16);

        let as_key = Value::primitive(prim(PrimitiveId::Enc, vec![pw.clone(), k.clone()], 0));
        let found = d.passwords(&as_key);
        assert_eq!(found.len(), 1);
        assert!(found[0].equivalent(&pw, true));

        let hashed = Value::primitive(prim(PrimitiveId::PwHash, vec![pw.clone()], 0));
        assert!(d.passwords(&hashed).is_empty());

        let as_plaintext = Value::primitive(prim(PrimitiveId::Enc, vec![k, pw], 0));
        assert!(d.passwords(&as_plaintext).is_empty());
    }
}
