//! Per-principal views of the knowledge map.
//!
//! A principal state holds one slot per knowledge-map constant. Attributes
//! that never change during analysis live in a shared [`SlotMeta`] table;
//! the value columns are owned so that clones can be mutated and rewritten
//! independently.

use crate::ir::{Block, Model};
use crate::knowledge::{KnowledgeMap, KnownBy};
use crate::value::{Constant, ConstantId, PrincipalId, Value};
use ahash::AHashMap;
use serde::Serialize;
use smallvec::SmallVec;
use std::sync::Arc;

/// Fixed attributes of one slot.
#[derive(Debug, Clone, Serialize)]
pub struct SlotMeta {
    pub constant: Constant,
    /// The principal receives this constant only in guarded form.
    pub guard: bool,
    pub known: bool,
    /// Recipients of messages carrying the constant.
    pub wire: SmallVec<[PrincipalId; 4]>,
    pub known_by: Vec<KnownBy>,
    pub declared_at: usize,
    /// Recipients that may receive an attacker-substituted value.
    pub mutatable_to: SmallVec<[PrincipalId; 4]>,
    pub phase: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub name: Arc<str>,
    pub id: PrincipalId,
    pub max_declared_at: usize,
    pub meta: Arc<Vec<SlotMeta>>,
    #[serde(skip)]
    index: Arc<AHashMap<ConstantId, usize>>,
    pub assigned: Vec<Value>,
    pub before_rewrite: Vec<Value>,
    pub before_mutate: Vec<Value>,
    pub creator: Vec<PrincipalId>,
    pub sender: Vec<PrincipalId>,
    pub rewritten: Vec<bool>,
    pub mutated: Vec<bool>,
}

impl PrincipalState {
    /// One state per declared principal, in id order.
    pub fn construct_all(model: &Model, km: &KnowledgeMap) -> Vec<PrincipalState> {
        let index: Arc<AHashMap<ConstantId, usize>> = Arc::new(
            km.constants
                .iter()
                .enumerate()
                .map(|(i, c)| (c.id, i))
                .collect(),
        );
        km.principal_ids()
            .map(|p| Self::construct(model, km, p, Arc::clone(&index)))
            .collect()
    }

    fn construct(
        model: &Model,
        km: &KnowledgeMap,
        p: PrincipalId,
        index: Arc<AHashMap<ConstantId, usize>>,
    ) -> PrincipalState {
        let mut meta = Vec::with_capacity(km.len());
        let mut sender = Vec::with_capacity(km.len());
        for (i, c) in km.constants.iter().enumerate() {
            let creator = km.creator[i];
            let learned = km.known_by[i].iter().find(|k| k.recipient == p);
            let known = creator == p || learned.is_some();
            sender.push(learned.map_or(creator, |k| k.sender));

            let mut wire: SmallVec<[PrincipalId; 4]> = SmallVec::new();
            let mut mutatable_to: SmallVec<[PrincipalId; 4]> = SmallVec::new();
            let mut guard = false;
            for block in &model.blocks {
                let Block::Message(m) = block else { continue };
                for cc in m.constants.iter().filter(|cc| cc.id == c.id) {
                    if !wire.contains(&m.recipient.id) {
                        wire.push(m.recipient.id);
                    }
                    if !guard {
                        guard = cc.guard && (m.recipient.id == p || creator == p);
                    }
                    if !cc.guard && !mutatable_to.contains(&m.recipient.id) {
                        mutatable_to.push(m.recipient.id);
                    }
                }
            }
            meta.push(SlotMeta {
                constant: c.clone(),
                guard,
                known,
                wire,
                known_by: km.known_by[i].clone(),
                declared_at: km.declared_at[i],
                mutatable_to,
                phase: km.phase[i].clone(),
            });
        }
        PrincipalState {
            name: Arc::from(km.principal_name(p)),
            id: p,
            max_declared_at: km.max_declared_at,
            meta: Arc::new(meta),
            index,
            assigned: km.assigned.clone(),
            before_rewrite: km.assigned.clone(),
            before_mutate: km.assigned.clone(),
            creator: km.creator.clone(),
            sender,
            rewritten: vec![false; km.len()],
            mutated: vec![false; km.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Slot of `c`, if it is still present after truncation.
    pub fn index_of(&self, c: &Constant) -> Option<usize> {
        self.index_of_id(c.id)
    }

    pub fn index_of_id(&self, id: ConstantId) -> Option<usize> {
        self.index.get(&id).copied().filter(|&i| i < self.len())
    }

    pub fn constant(&self, i: usize) -> &Constant {
        &self.meta[i].constant
    }

    pub fn known(&self, i: usize) -> bool {
        self.meta[i].known
    }

    pub fn guard(&self, i: usize) -> bool {
        self.meta[i].guard
    }

    /// Whether a value the principal holds was placed there by the attacker.
    pub fn attacker_controlled(&self, i: usize) -> bool {
        self.creator[i].is_attacker() || self.sender[i].is_attacker()
    }

    /// Copy whose current values are reset to their pre-mutation form.
    pub fn clone_pure(&self) -> PrincipalState {
        PrincipalState {
            assigned: self.before_mutate.clone(),
            before_rewrite: self.before_mutate.clone(),
            ..self.clone()
        }
    }

    /// Keep only the first `n` slots.
    pub fn truncate(&mut self, n: usize) {
        self.assigned.truncate(n);
        self.before_rewrite.truncate(n);
        self.before_mutate.truncate(n);
        self.creator.truncate(n);
        self.sender.truncate(n);
        self.rewritten.truncate(n);
        self.mutated.truncate(n);
    }

    /// Replace slot `i` with an attacker-supplied value.
    pub fn mutate(&mut self, i: usize, value: Value) {
        self.creator[i] = PrincipalId::ATTACKER;
        self.sender[i] = PrincipalId::ATTACKER;
        self.mutated[i] = true;
        self.before_rewrite[i] = value.clone();
        self.assigned[i] = value;
    }

    /// Slot `i` resolves to its pre-mutation value unless the principal
    /// received an attacker mutation over the wire.
    pub fn should_resolve_to_before_mutate(&self, i: usize) -> bool {
        let meta = &self.meta[i];
        self.creator[i] == self.id
            || !meta.known
            || !meta.wire.contains(&self.id)
            || !self.mutated[i]
    }

    /// One-step resolution of a constant to the value the principal holds.
    /// Constants absent from the state resolve to themselves.
    pub fn resolve_constant(&self, c: &Constant) -> (Value, Option<usize>) {
        match self.index_of(c) {
            Some(i) if self.should_resolve_to_before_mutate(i) => (self.before_mutate[i].clone(), Some(i)),
            Some(i) => (self.assigned[i].clone(), Some(i)),
            None => (Value::Constant(c.clone()), None),
        }
    }
}
