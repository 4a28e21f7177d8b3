//! Structural hashing consistent with output-sensitive equivalence, and a
//! hash-bucketed index for membership checks over value lists.

use crate::value::Value;
use ahash::AHashMap;
use smallvec::SmallVec;

const PRIMITIVE_MULTIPLIER: u64 = 2_654_435_761;

/// Hash such that `a.equivalent(b, true)` implies equal hashes.
pub fn value_hash(v: &Value) -> u64 {
    match v {
        Value::Constant(c) => c.id as u64,
        Value::Primitive(p) => {
            let seed = (p.id as u64).wrapping_mul(PRIMITIVE_MULTIPLIER) ^ (p.output as u64).wrapping_mul(97);
            p.arguments
                .iter()
                .fold(seed, |h, a| h.wrapping_mul(31).wrapping_add(value_hash(a)))
        }
        Value::Equation(e) => equation_hash(&e.flatten()),
    }
}

fn equation_hash(values: &[Value]) -> u64 {
    match values {
        [] => 0,
        [only] => value_hash(only),
        [base, exp] => value_hash(base).wrapping_mul(31).wrapping_add(value_hash(exp)),
        [base, a, b] => {
            let (ha, hb) = (value_hash(a), value_hash(b));
            let (lo, hi) = if ha <= hb { (ha, hb) } else { (hb, ha) };
            value_hash(base)
                .wrapping_mul(31)
                .wrapping_add(lo.wrapping_mul(17))
                .wrapping_add(hi)
        }
        [base, exps @ ..] => {
            let mut hashes: SmallVec<[u64; 8]> = exps.iter().map(value_hash).collect();
            hashes.sort_unstable();
            hashes
                .into_iter()
                .fold(value_hash(base), |h, x| h.wrapping_mul(31).wrapping_add(x))
        }
    }
}

/// Maps structural hashes to positions in an external value list.
/// Collisions are resolved by walking the bucket with full equivalence.
#[derive(Debug, Clone, Default)]
pub struct ValueIndex {
    buckets: AHashMap<u64, SmallVec<[usize; 2]>>,
}

impl ValueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over every element of `values`.
    pub fn from_values(values: &[Value]) -> Self {
        let mut index = Self::new();
        for (i, v) in values.iter().enumerate() {
            index.insert(v, i);
        }
        index
    }

    pub fn insert(&mut self, v: &Value, position: usize) {
        self.buckets.entry(value_hash(v)).or_default().push(position);
    }

    /// Positions sharing `v`'s hash. Callers confirm with equivalence.
    pub fn candidates(&self, v: &Value) -> impl Iterator<Item = usize> + '_ {
        self.buckets
            .get(&value_hash(v))
            .into_iter()
            .flat_map(|bucket| bucket.iter().copied())
    }

    /// Position in `values` of an element equivalent to `v`.
    pub fn find(&self, v: &Value, values: &[Value]) -> Option<usize> {
        self.candidates(v).find(|&i| {
            values
                .get(i)
                .is_some_and(|candidate| candidate.equivalent(v, true))
        })
    }

    pub fn contains(&self, v: &Value, values: &[Value]) -> bool {
        self.find(v, values).is_some()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}
