//! Attacker substitutions to try for one principal at one stage.

use crate::attacker::AttackerView;
use crate::config::VerifyConfig;
use crate::error::EngineResult;
use crate::inject::{match_skeletons, missing_skeletons, skeleton, Injector};
use tracing::debug;
use verifpal_model::{push_unique, Constant, KnowledgeMap, Primitive, PrincipalState, Value};

/// Candidate replacements for every slot the attacker may tamper with.
#[derive(Debug, Clone, Default)]
pub struct MutationMap {
    pub constants: Vec<Constant>,
    pub mutations: Vec<Vec<Value>>,
    /// Skeletons of mutated primitives the attacker did not hold yet.
    pub skeletons: Vec<Value>,
}

/// One mutation: slot dimension of the map and its replacement.
pub type Combination = Vec<(usize, Value)>;

impl MutationMap {
    pub fn build(
        km: &KnowledgeMap,
        ps: &PrincipalState,
        view: &AttackerView,
        stage: usize,
        config: &VerifyConfig,
    ) -> EngineResult<Self> {
        let mut map = MutationMap::default();
        for v in view.values() {
            let Value::Constant(c) = v else { continue };
            let (a, i) = ps.resolve_constant(c);
            let Some(i) = i else { continue };
            if skip_slot(km, ps, view, c, i) {
                continue;
            }
            let replacements = match &a {
                Value::Constant(ac) => replace_constant(ac, i, ps, view, stage),
                Value::Primitive(_) => {
                    let resolved = ps.resolve_value(&a, i, false)?;
                    let Value::Primitive(p) = &resolved else { continue };
                    for s in missing_skeletons(p, view) {
                        push_unique(&mut map.skeletons, s);
                    }
                    replace_primitive(p, ps, view, stage, config)
                }
                Value::Equation(e) => replace_equation(e.values.len(), view, stage),
            };
            if replacements.is_empty() {
                continue;
            }
            map.constants.push(c.clone());
            map.mutations.push(replacements);
        }
        debug!(
            principal = %ps.name,
            stage,
            slots = map.constants.len(),
            product = map.product(),
            "initialized mutation map"
        );
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Size of the full Cartesian product, saturating.
    pub fn product(&self) -> usize {
        self.mutations
            .iter()
            .fold(1usize, |acc, m| acc.saturating_mul(m.len()))
    }

    /// Combinations to scan under the limits in `config`.
    pub fn combinations(&self, config: &VerifyConfig) -> Combinations<'_> {
        let plan = if self.is_empty() {
            Plan::Done
        } else if self.product() <= config.mutation_cap {
            Plan::Full
        } else {
            Plan::Subsets {
                weight: 1,
                subset: None,
            }
        };
        Combinations {
            map: self,
            plan,
            sweep: None,
            yielded: 0,
            budget: config.scan_budget,
            max_weight: config.max_weight.min(self.len()),
            cap: config.mutation_cap,
        }
    }
}

fn skip_slot(km: &KnowledgeMap, ps: &PrincipalState, view: &AttackerView, c: &Constant, i: usize) -> bool {
    let meta = &ps.meta[i];
    if !meta.wire.contains(&ps.id) {
        return true;
    }
    if meta.guard {
        return !meta.mutatable_to.contains(&ps.sender[i]);
    }
    ps.creator[i] == ps.id
        || !meta.known
        || !km.constant_used_by(ps.id, c)
        || !meta.phase.contains(&view.phase)
}

fn replace_constant(
    a: &Constant,
    root: usize,
    ps: &PrincipalState,
    view: &AttackerView,
    stage: usize,
) -> Vec<Value> {
    if a.is_g() || a.is_nil() {
        return Vec::new();
    }
    let mut mutations = vec![Value::nil()];
    if stage <= 3 {
        return mutations;
    }
    for v in view.values() {
        let Value::Constant(vc) = v else { continue };
        if vc.is_g() || vc.is_nil() {
            continue;
        }
        let (resolved, i) = ps.resolve_constant(vc);
        let (Value::Constant(_), Some(i)) = (&resolved, i) else {
            continue;
        };
        if ps.meta[root].declared_at > ps.meta[i].declared_at {
            continue;
        }
        push_unique(&mut mutations, resolved);
    }
    mutations
}

fn replace_primitive(
    p: &Primitive,
    ps: &PrincipalState,
    view: &AttackerView,
    stage: usize,
    config: &VerifyConfig,
) -> Vec<Value> {
    let skel = skeleton(p);
    let mut mutations = Vec::new();
    for v in view.values() {
        if v.as_primitive().is_some_and(|k| match_skeletons(k, &skel)) {
            push_unique(&mut mutations, v.clone());
        }
    }
    let injector = Injector {
        ps,
        view,
        stage,
        limit: config.max_injections,
        max_depth: config.max_depth,
    };
    for injected in injector.inject(p) {
        push_unique(&mut mutations, injected);
    }
    mutations
}

fn replace_equation(len: usize, view: &AttackerView, stage: usize) -> Vec<Value> {
    let mut mutations = match len {
        1 => vec![Value::g()],
        2 => vec![Value::g_nil()],
        3 => vec![Value::g_nil_nil()],
        _ => Vec::new(),
    };
    if stage <= 3 {
        return mutations;
    }
    for v in view.values() {
        if v.as_equation().is_some_and(|e| e.values.len() == len) {
            push_unique(&mut mutations, v.clone());
        }
    }
    mutations
}

enum Plan {
    Full,
    Subsets { weight: usize, subset: Option<Vec<usize>> },
    Capped,
    Done,
}

/// Odometer over a fixed set of map dimensions.
struct Sweep {
    dims: Vec<usize>,
    limits: Vec<usize>,
    counter: Vec<usize>,
    exhausted: bool,
}

impl Sweep {
    fn new(dims: Vec<usize>, limits: Vec<usize>) -> Self {
        let exhausted = limits.iter().any(|&l| l == 0);
        let counter = vec![0; dims.len()];
        Self {
            dims,
            limits,
            counter,
            exhausted,
        }
    }

    fn next(&mut self, map: &MutationMap) -> Option<Combination> {
        if self.exhausted {
            return None;
        }
        let combination = self
            .dims
            .iter()
            .zip(&self.counter)
            .map(|(&d, &i)| (d, map.mutations[d][i].clone()))
            .collect();
        let mut k = self.dims.len();
        loop {
            if k == 0 {
                self.exhausted = true;
                break;
            }
            k -= 1;
            self.counter[k] += 1;
            if self.counter[k] < self.limits[k] {
                break;
            }
            self.counter[k] = 0;
        }
        Some(combination)
    }
}

/// Mutations in scan order: the full product when it fits the cap,
/// otherwise subsets of slots by increasing weight followed by a truncated
/// product, all within the scan budget.
pub struct Combinations<'a> {
    map: &'a MutationMap,
    plan: Plan,
    sweep: Option<Sweep>,
    yielded: usize,
    budget: usize,
    max_weight: usize,
    cap: usize,
}

impl Combinations<'_> {
    fn next_sweep(&mut self) -> Option<Sweep> {
        let n = self.map.len();
        loop {
            match &mut self.plan {
                Plan::Done => return None,
                Plan::Full => {
                    self.plan = Plan::Done;
                    let limits = self.map.mutations.iter().map(Vec::len).collect();
                    return Some(Sweep::new((0..n).collect(), limits));
                }
                Plan::Subsets { weight, subset } => {
                    if *weight > self.max_weight {
                        self.plan = if self.max_weight < n { Plan::Capped } else { Plan::Done };
                        continue;
                    }
                    let next = match subset.take() {
                        None => Some((0..*weight).collect::<Vec<_>>()),
                        Some(mut s) => next_subset(&mut s, n).then_some(s),
                    };
                    match next {
                        Some(s) => {
                            *subset = Some(s.clone());
                            let limits = s.iter().map(|&d| self.map.mutations[d].len()).collect();
                            return Some(Sweep::new(s, limits));
                        }
                        None => *weight += 1,
                    }
                }
                Plan::Capped => {
                    self.plan = Plan::Done;
                    let per_dim = integer_root(self.cap, n).max(1);
                    let limits = self
                        .map
                        .mutations
                        .iter()
                        .map(|m| m.len().min(per_dim))
                        .collect();
                    return Some(Sweep::new((0..n).collect(), limits));
                }
            }
        }
    }
}

impl Iterator for Combinations<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        if self.yielded >= self.budget {
            return None;
        }
        loop {
            if let Some(sweep) = self.sweep.as_mut() {
                if let Some(c) = sweep.next(self.map) {
                    self.yielded += 1;
                    return Some(c);
                }
            }
            self.sweep = Some(self.next_sweep()?);
        }
    }
}

/// Advance `s` to the next `s.len()`-subset of `0..n` in lexicographic order.
fn next_subset(s: &mut [usize], n: usize) -> bool {
    let k = s.len();
    let Some(i) = (0..k).rev().find(|&i| s[i] < n - k + i) else {
        return false;
    };
    s[i] += 1;
    for j in i + 1..k {
        s[j] = s[j - 1] + 1;
    }
    true
}

/// Largest `r` with `r^n <= x`.
fn integer_root(x: usize, n: usize) -> usize {
    if n <= 1 {
        return x;
    }
    let fits = |r: usize| r.checked_pow(n as u32).is_some_and(|p| p <= x);
    let mut r = (x as f64).powf(1.0 / n as f64).floor() as usize;
    while r > 0 && !fits(r) {
        r -= 1;
    }
    while fits(r + 1) {
        r += 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attacker::Attacker;
    use std::sync::Arc;
    use verifpal_model::{lower, sanity};

    fn map_of(sizes: &[usize]) -> MutationMap {
        MutationMap {
            constants: sizes
                .iter()
                .enumerate()
                .map(|(i, _)| Constant::reference(Arc::from(format!("c{i}")), i as u32 + 10))
                .collect(),
            mutations: sizes.iter().map(|&n| vec![Value::nil(); n]).collect(),
            skeletons: Vec::new(),
        }
    }

    #[test]
    fn test_integer_root() {
        assert_eq!(integer_root(65536, 2), 256);
        assert_eq!(integer_root(100, 3), 4);
        assert_eq!(integer_root(7, 1), 7);
        assert_eq!(integer_root(1, 5), 1);
    }

    #[test]
    fn test_next_subset() {
        let mut s = vec![0, 1];
        let mut seen = vec![s.clone()];
        while next_subset(&mut s, 4) {
            seen.push(s.clone());
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.last(), Some(&vec![2, 3]));
    }

    #[test]
    fn test_full_product_when_under_cap() {
        let map = map_of(&[2, 3]);
        let combos: Vec<Combination> = map.combinations(&VerifyConfig::default()).collect();
        assert_eq!(combos.len(), 6);
        assert!(combos.iter().all(|c| c.len() == 2));
    }

    #[test]
    fn test_weighted_scan_over_cap() {
        let map = map_of(&[4, 4, 4]);
        let config = VerifyConfig {
            mutation_cap: 10,
            max_weight: 1,
            ..VerifyConfig::default()
        };
        let combos: Vec<Combination> = map.combinations(&config).collect();
        let singles = combos.iter().filter(|c| c.len() == 1).count();
        assert_eq!(singles, 12);
        // integer cube root of 10 is 2
        assert_eq!(combos.len(), 12 + 8);
    }

    #[test]
    fn test_budget_bounds_scan() {
        let map = map_of(&[10, 10, 10]);
        let config = VerifyConfig {
            scan_budget: 7,
            ..VerifyConfig::default()
        };
        assert_eq!(map.combinations(&config).count(), 7);
        assert_eq!(MutationMap::default().combinations(&config).count(), 0);
    }

    #[test]
    fn test_build_skips_unsent_and_guarded_slots() {
        let model = lower(
            &verifpal_syntax::parse(
                "attacker[active]
principal Alice[
    knows private k
    generates m, e
    pk = G^e
    c = ENC(k, m)
]
Alice -> Bob: c, [pk]
principal Bob[
    knows private k
    x = DEC(k, c)
    y = HASH(pk)
]
queries[confidentiality? m]",
            )
            .expect("parse"),
            "test.vp",
        )
        .unwrap();
        let (km, states) = sanity(&model).unwrap();
        let attacker = Attacker::new(true);
        let bob = Arc::new(states[1].clone());
        attacker.absorb_phase_values(&states[0]).unwrap();
        let view = attacker.snapshot();
        let map = MutationMap::build(&km, &bob, &view, 1, &VerifyConfig::default()).unwrap();
        let names: Vec<&str> = map.constants.iter().map(|c| &*c.name).collect();
        assert_eq!(names, vec!["c"]);
        assert!(map.mutations[0].iter().all(|v| v.as_primitive().is_some()));

        let alice = MutationMap::build(&km, &states[0], &view, 1, &VerifyConfig::default()).unwrap();
        assert!(alice.is_empty());
    }
}
