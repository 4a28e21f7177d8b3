//! Fabrication of attacker-built primitive applications.
//!
//! A skeleton replaces every constant and equation argument of a primitive
//! with `nil`, keeping the shape of nested primitives. An injection fills
//! each argument of a target primitive with a known value admissible at that
//! position, and the candidates are the product over positions.

use crate::attacker::AttackerView;
use verifpal_model::{push_unique, Primitive, PrincipalState, Value};

pub fn skeleton(p: &Primitive) -> Primitive {
    let arguments = p
        .arguments
        .iter()
        .map(|a| match a {
            Value::Primitive(inner) => Value::primitive(skeleton(inner)),
            Value::Constant(_) | Value::Equation(_) => Value::nil(),
        })
        .collect();
    Primitive::new(p.id, arguments, p.output, false)
}

/// Whether `p` has the shape described by `skel`.
pub fn match_skeletons(p: &Primitive, skel: &Primitive) -> bool {
    p.id == skel.id && skeleton(p).equivalent(skel, true)
}

/// Stages 0 and 1 fabricate nothing; stage 2 leaves out explosive primitives.
pub fn stage_restricted(p: &Primitive, stage: usize) -> bool {
    match stage {
        0 | 1 => true,
        2 => p.id.spec().explosive,
        _ => false,
    }
}

/// Skeletons of `p` and its nested primitives that the attacker does not
/// yet hold a match for.
pub fn missing_skeletons(p: &Primitive, view: &AttackerView) -> Vec<Value> {
    let mut out = Vec::new();
    collect_missing(p, view, &mut out);
    out
}

fn collect_missing(p: &Primitive, view: &AttackerView, out: &mut Vec<Value>) {
    let skel = skeleton(p);
    let matched = view
        .values()
        .any(|a| a.as_primitive().is_some_and(|k| match_skeletons(k, &skel)));
    if !matched {
        push_unique(out, Value::primitive(skel));
    }
    for a in &p.arguments {
        if let Value::Primitive(inner) = a {
            collect_missing(inner, view, out);
        }
    }
}

/// Everything needed to fabricate values for one principal at one stage.
pub struct Injector<'a> {
    pub ps: &'a PrincipalState,
    pub view: &'a AttackerView,
    pub stage: usize,
    /// Upper bound on the applications returned for one primitive.
    pub limit: usize,
    pub max_depth: usize,
}

impl Injector<'_> {
    /// Applications of `p`'s primitive built from attacker knowledge.
    pub fn inject(&self, p: &Primitive) -> Vec<Value> {
        self.inject_within(p, p, 0)
    }

    fn inject_within(&self, p: &Primitive, root: &Primitive, depth: usize) -> Vec<Value> {
        if depth > self.max_depth || !p.id.spec().injectable || stage_restricted(p, self.stage) {
            return Vec::new();
        }
        let mut candidates: Vec<Vec<Value>> = vec![Vec::new(); p.arguments.len()];
        for (arg, slot) in candidates.iter_mut().enumerate() {
            for known in self.view.values() {
                let k = match known {
                    Value::Constant(c) => match self.ps.index_of(c) {
                        Some(i) => self.ps.assigned[i].clone(),
                        None => known.clone(),
                    },
                    other => other.clone(),
                };
                if !self.admissible(&k, arg, p, root) {
                    continue;
                }
                if let Value::Primitive(kp) = &k {
                    if self.stage > 3 {
                        let nested = self.inject_within(kp, root, depth + 1);
                        slot.push(k.clone());
                        slot.extend(nested);
                        continue;
                    }
                }
                slot.push(k);
            }
        }
        product(p, &candidates, self.limit)
    }

    fn admissible(&self, k: &Value, arg: usize, p: &Primitive, root: &Primitive) -> bool {
        let Some(position) = p.arguments.get(arg) else {
            return false;
        };
        let as_value = |q: &Primitive| Value::primitive(q.clone());
        if k.equivalent(&as_value(p), true) || k.equivalent(&as_value(root), true) {
            return false;
        }
        match (k, position) {
            (Value::Constant(c), Value::Constant(_)) => !c.is_g(),
            (Value::Primitive(kp), Value::Primitive(target)) => {
                !stage_restricted(kp, self.stage) && match_skeletons(kp, &skeleton(target))
            }
            (Value::Equation(ke), Value::Equation(target)) => {
                ke.values.len() == target.values.len()
                    && ke
                        .values
                        .iter()
                        .zip(&target.values)
                        .all(|(a, b)| a.kind_name() == b.kind_name())
            }
            _ => false,
        }
    }
}

/// Every application of `p` taking one candidate per position, in
/// lexicographic order, deduplicated and capped at `limit`.
fn product(p: &Primitive, candidates: &[Vec<Value>], limit: usize) -> Vec<Value> {
    if candidates.is_empty() || candidates.iter().any(Vec::is_empty) {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut counter = vec![0usize; candidates.len()];
    loop {
        let arguments = counter
            .iter()
            .zip(candidates)
            .map(|(&i, c)| c[i].clone())
            .collect();
        push_unique(
            &mut out,
            Value::primitive(Primitive::new(p.id, arguments, p.output, p.check)),
        );
        if out.len() >= limit {
            return out;
        }
        let mut dim = candidates.len();
        loop {
            if dim == 0 {
                return out;
            }
            dim -= 1;
            counter[dim] += 1;
            if counter[dim] < candidates[dim].len() {
                break;
            }
            counter[dim] = 0;
        }
    }
}
