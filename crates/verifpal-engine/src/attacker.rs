//! The attacker's knowledge, shared by every analysis running in a phase.
//!
//! Readers take an [`AttackerView`] snapshot and work without holding the
//! lock. Writers re-check membership under the write lock, so a value is
//! recorded once no matter how many analyses deduce it concurrently.
//!
//! Known values are stored in fixed-size chunks. Full chunks are sealed and
//! shared between snapshots, so a write made while a snapshot is alive
//! copies only the unsealed tail and the list of chunk handles.

use crate::error::{EngineError, EngineResult};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::trace;
use verifpal_model::{PrincipalState, Qualifier, Value, ValueIndex};

/// Values per sealed chunk.
const CHUNK: usize = 128;

#[derive(Debug)]
struct Chunk {
    values: Vec<Value>,
    /// Principal state in which each value was obtained.
    witnesses: Vec<Arc<PrincipalState>>,
}

/// Immutable snapshot of what the attacker knows.
#[derive(Debug, Clone, Default)]
pub struct AttackerView {
    pub active: bool,
    pub phase: u32,
    sealed: Vec<Arc<Chunk>>,
    /// Positions of every sealed value.
    sealed_index: Arc<ValueIndex>,
    tail: Vec<Value>,
    tail_witnesses: Vec<Arc<PrincipalState>>,
    tail_index: ValueIndex,
}

impl AttackerView {
    pub fn knows(&self, v: &Value) -> bool {
        self.position(v).is_some()
    }

    pub fn position(&self, v: &Value) -> Option<usize> {
        self.sealed_index
            .candidates(v)
            .chain(self.tail_index.candidates(v))
            .find(|&i| self.value(i).is_some_and(|k| k.equivalent(v, true)))
    }

    pub fn value(&self, i: usize) -> Option<&Value> {
        match i.checked_sub(self.sealed_len()) {
            Some(t) => self.tail.get(t),
            None => self.sealed.get(i / CHUNK)?.values.get(i % CHUNK),
        }
    }

    pub fn witness(&self, i: usize) -> Option<&Arc<PrincipalState>> {
        match i.checked_sub(self.sealed_len()) {
            Some(t) => self.tail_witnesses.get(t),
            None => self.sealed.get(i / CHUNK)?.witnesses.get(i % CHUNK),
        }
    }

    /// Known values in the order they were learned.
    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.sealed
            .iter()
            .flat_map(|c| c.values.iter())
            .chain(self.tail.iter())
    }

    pub fn par_values(&self) -> impl ParallelIterator<Item = &Value> + '_ {
        let slices: Vec<&[Value]> = self
            .sealed
            .iter()
            .map(|c| c.values.as_slice())
            .chain(std::iter::once(self.tail.as_slice()))
            .collect();
        slices.into_par_iter().flat_map_iter(|s| s.iter())
    }

    pub fn len(&self) -> usize {
        self.sealed_len() + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sealed_len(&self) -> usize {
        self.sealed.len() * CHUNK
    }

    fn insert(&mut self, v: Value, witness: Arc<PrincipalState>) -> bool {
        if self.knows(&v) {
            return false;
        }
        self.tail_index.insert(&v, self.len());
        self.tail.push(v);
        self.tail_witnesses.push(witness);
        if self.tail.len() == CHUNK {
            self.seal();
        }
        true
    }

    /// Move the full tail into a shared chunk.
    fn seal(&mut self) {
        let base = self.sealed_len();
        let values = std::mem::take(&mut self.tail);
        let witnesses = std::mem::take(&mut self.tail_witnesses);
        let index = Arc::make_mut(&mut self.sealed_index);
        for (k, v) in values.iter().enumerate() {
            index.insert(v, base + k);
        }
        self.tail_index.clear();
        self.sealed.push(Arc::new(Chunk { values, witnesses }));
    }
}

#[derive(Debug, Default)]
pub struct Attacker {
    view: RwLock<Arc<AttackerView>>,
}

impl Attacker {
    pub fn new(active: bool) -> Self {
        Self {
            view: RwLock::new(Arc::new(AttackerView {
                active,
                ..AttackerView::default()
            })),
        }
    }

    /// Forget everything and start over at `phase`.
    pub fn reset(&self, active: bool, phase: u32) {
        *self.view.write() = Arc::new(AttackerView {
            active,
            phase,
            ..AttackerView::default()
        });
    }

    pub fn snapshot(&self) -> Arc<AttackerView> {
        Arc::clone(&self.view.read())
    }

    pub fn len(&self) -> usize {
        self.view.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record `v` as known, with `witness` as the state it was obtained in.
    /// Returns whether the value was new.
    pub fn put(&self, v: &Value, witness: &Arc<PrincipalState>) -> bool {
        if self.view.read().knows(v) {
            return false;
        }
        let mut guard = self.view.write();
        let written = Arc::make_mut(&mut guard).insert(v.clone(), Arc::clone(witness));
        if written {
            trace!(value = %v, known = guard.len(), "attacker learned value");
        }
        written
    }

    /// Learn what is public at the current phase: every public constant, and
    /// every private constant sent on a wire or leaked by now together with
    /// its resolved value.
    pub fn absorb_phase_values(&self, ps: &PrincipalState) -> EngineResult<()> {
        let witness = Arc::new(ps.clone());
        let mut guard = self.view.write();
        let view = Arc::make_mut(&mut guard);
        let phase = view.phase;
        for i in 0..ps.len() {
            let c = ps.constant(i);
            if c.qualifier != Some(Qualifier::Public) {
                continue;
            }
            if ps.meta[i].phase.iter().min().is_some_and(|&earliest| earliest > phase) {
                continue;
            }
            view.insert(Value::Constant(c.clone()), Arc::clone(&witness));
        }
        for i in 0..ps.len() {
            let c = ps.constant(i);
            if ps.meta[i].wire.is_empty() && !c.leaked {
                continue;
            }
            if c.qualifier != Some(Qualifier::Private) {
                continue;
            }
            let earliest = ps.meta[i]
                .phase
                .iter()
                .min()
                .copied()
                .ok_or_else(|| EngineError::MissingPhase {
                    phase,
                    constant: c.name.to_string(),
                })?;
            if earliest > phase {
                continue;
            }
            view.insert(Value::Constant(c.clone()), Arc::clone(&witness));
            let resolved = ps.resolve_value(&ps.assigned[i], i, true)?;
            view.insert(resolved, Arc::clone(&witness));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verifpal_model::{lower, sanity, Constant};

    fn first_state(src: &str) -> PrincipalState {
        let model = lower(&verifpal_syntax::parse(src).expect("parse"), "test.vp").unwrap();
        let (_, mut states) = sanity(&model).unwrap();
        states.remove(0)
    }

    #[test]
    fn test_put_is_idempotent() {
        let attacker = Attacker::new(true);
        let witness = Arc::new(first_state(
            "attacker[active]\nprincipal A[knows public x]\nqueries[confidentiality? x]",
        ));
        let x = Value::Constant(Constant::reference(Arc::from("x"), 2));
        assert!(attacker.put(&x, &witness));
        assert!(!attacker.put(&x, &witness));
        let view = attacker.snapshot();
        assert_eq!(view.len(), 1);
        assert_eq!(view.position(&x), Some(0));
        assert!(view.witness(0).is_some());
    }

    #[test]
    fn test_snapshot_is_stable() {
        let attacker = Attacker::new(false);
        let witness = Arc::new(first_state(
            "attacker[passive]\nprincipal A[knows public x]\nqueries[confidentiality? x]",
        ));
        let before = attacker.snapshot();
        attacker.put(&Value::nil(), &witness);
        assert!(before.is_empty());
        assert_eq!(attacker.len(), 1);
    }

    #[test]
    fn test_absorbs_wire_and_public_values() {
        let ps = first_state(
            "attacker[active]
principal A[
    knows public k
    knows private s
    generates m
    c = ENC(k, m)
]
A -> B: c
principal B[]
queries[confidentiality? m]",
        );
        let attacker = Attacker::new(true);
        attacker.absorb_phase_values(&ps).unwrap();
        let view = attacker.snapshot();
        let name_known = |name: &str| view.values().any(|v| v.as_constant().is_some_and(|c| &*c.name == name));
        assert!(name_known("g"));
        assert!(name_known("nil"));
        assert!(name_known("k"));
        assert!(name_known("c"));
        assert!(!name_known("s"));
        assert!(!name_known("m"));
        assert!(view.values().any(|v| v.as_primitive().is_some()));
    }

    #[test]
    fn test_snapshots_share_sealed_chunks() {
        let attacker = Attacker::new(true);
        let witness = Arc::new(first_state(
            "attacker[active]\nprincipal A[knows public x]\nqueries[confidentiality? x]",
        ));
        let value = |i: usize| Value::Constant(Constant::reference(Arc::from(format!("v{i}")), 1000 + i as u32));
        for i in 0..CHUNK + 5 {
            assert!(attacker.put(&value(i), &witness));
        }
        let early = attacker.snapshot();
        for i in CHUNK + 5..3 * CHUNK + 1 {
            assert!(attacker.put(&value(i), &witness));
        }
        let late = attacker.snapshot();

        assert_eq!(early.len(), CHUNK + 5);
        assert_eq!(late.len(), 3 * CHUNK + 1);
        assert_eq!(late.sealed.len(), 3);
        assert!(Arc::ptr_eq(&early.sealed[0], &late.sealed[0]));
        assert!(early.position(&value(2 * CHUNK)).is_none());

        for i in [0, CHUNK - 1, CHUNK, CHUNK + 4, 2 * CHUNK + 7, 3 * CHUNK] {
            assert_eq!(late.position(&value(i)), Some(i));
            assert!(late.value(i).is_some_and(|v| v.equivalent(&value(i), true)));
            assert!(late.witness(i).is_some());
        }
        assert!(late.value(3 * CHUNK + 1).is_none());
        assert_eq!(late.values().count(), late.len());
        assert_eq!(late.par_values().count(), late.len());
        assert!(!attacker.put(&value(CHUNK + 4), &witness));
    }
}
