//! The knowledge map: the global, immutable table of every constant in a
//! model with its declared value, its creator and who learns it from whom.

use crate::error::{ModelError, ModelResult};
use crate::ir::{Block, Expression, ExpressionKind, Message, Model, Principal};
use crate::primitive::pretty_arity;
use crate::value::{
    find_equivalent, push_unique, Constant, ConstantId, Declaration, PrincipalId, Primitive,
    Qualifier, Value,
};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::trace;
use verifpal_syntax::Span;

/// `recipient` learned the constant from `sender`. A principal that knows a
/// constant from the outset is recorded as its own sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownBy {
    pub recipient: PrincipalId,
    pub sender: PrincipalId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeMap {
    /// Principal names indexed by id; slot 0 is the attacker.
    pub principals: Vec<Arc<str>>,
    pub constants: Vec<Constant>,
    pub assigned: Vec<Value>,
    pub creator: Vec<PrincipalId>,
    pub known_by: Vec<Vec<KnownBy>>,
    pub declared_at: Vec<usize>,
    pub phase: Vec<Vec<u32>>,
    pub max_declared_at: usize,
    pub max_phase: u32,
    #[serde(skip)]
    index: AHashMap<ConstantId, usize>,
    #[serde(skip)]
    used_by: AHashMap<ConstantId, SmallVec<[PrincipalId; 4]>>,
}

impl KnowledgeMap {
    /// Build the map by walking the model's blocks in order.
    pub fn build(model: &Model) -> ModelResult<Self> {
        let first = model.principal_ids().next().unwrap_or(PrincipalId::ATTACKER);
        let everyone: Vec<KnownBy> = model
            .principal_ids()
            .map(|p| KnownBy {
                recipient: p,
                sender: p,
            })
            .collect();

        let mut km = KnowledgeMap {
            principals: model.principals.clone(),
            constants: Vec::new(),
            assigned: Vec::new(),
            creator: Vec::new(),
            known_by: Vec::new(),
            declared_at: Vec::new(),
            phase: Vec::new(),
            max_declared_at: 0,
            max_phase: 0,
            index: AHashMap::new(),
            used_by: AHashMap::new(),
        };
        for sentinel in [Value::g(), Value::nil()] {
            if let Value::Constant(c) = &sentinel {
                km.push(c.clone(), sentinel.clone(), first, everyone.clone(), 0, vec![0]);
            }
        }

        let mut declared_at = 0;
        let mut current_phase = 0;
        for block in &model.blocks {
            match block {
                Block::Principal(b) => {
                    for expr in &b.expressions {
                        match expr.kind {
                            ExpressionKind::Knows => km.render_knows(&b.principal, expr, declared_at)?,
                            ExpressionKind::Generates => {
                                km.render_generates(&b.principal, expr, declared_at)?
                            }
                            ExpressionKind::Assignment => {
                                km.render_assignment(&b.principal, expr, declared_at)?
                            }
                            ExpressionKind::Leaks => {
                                declared_at += 1;
                                km.render_leaks(&b.principal, expr, current_phase)?;
                            }
                        }
                    }
                }
                Block::Message(m) => {
                    declared_at += 1;
                    km.max_declared_at = declared_at;
                    km.render_message(m, current_phase)?;
                }
                Block::Phase(p) => current_phase = p.number,
            }
        }
        km.max_phase = current_phase;
        km.cache_usage();
        trace!(constants = km.constants.len(), max_phase = km.max_phase, "built knowledge map");
        Ok(km)
    }

    fn push(
        &mut self,
        constant: Constant,
        assigned: Value,
        creator: PrincipalId,
        known_by: Vec<KnownBy>,
        declared_at: usize,
        phase: Vec<u32>,
    ) {
        self.index.insert(constant.id, self.constants.len());
        self.constants.push(constant);
        self.assigned.push(assigned);
        self.creator.push(creator);
        self.known_by.push(known_by);
        self.declared_at.push(declared_at);
        self.phase.push(phase);
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn index_of(&self, id: ConstantId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn principal_name(&self, id: PrincipalId) -> &str {
        self.principals.get(id.index()).map_or("Attacker", |n| n)
    }

    /// Ids of the declared principals.
    pub fn principal_ids(&self) -> impl Iterator<Item = PrincipalId> + '_ {
        (1..self.principals.len()).map(|i| PrincipalId(i as u8))
    }

    /// Whether principal `p` created or learns the constant at slot `i`.
    pub fn knows(&self, i: usize, p: PrincipalId) -> bool {
        self.creator[i] == p || self.known_by[i].iter().any(|k| k.recipient == p)
    }

    fn require(&self, c: &Constant, err: impl FnOnce() -> ModelError) -> ModelResult<usize> {
        self.index_of(c.id).ok_or_else(err)
    }

    fn render_knows(&mut self, p: &Principal, expr: &Expression, declared_at: usize) -> ModelResult<()> {
        let qualifier = expr.qualifier.unwrap_or(Qualifier::Public);
        for c in &expr.constants {
            if let Some(i) = self.index_of(c.id) {
                let existing = &self.constants[i];
                if existing.declaration != Some(Declaration::Knows)
                    || existing.qualifier != Some(qualifier)
                    || existing.fresh
                {
                    return Err(ModelError::KnownInDifferentWays {
                        constant: c.name.to_string(),
                        span: expr.span,
                    });
                }
                self.known_by[i].push(KnownBy {
                    recipient: p.id,
                    sender: p.id,
                });
                continue;
            }
            let known_by = if qualifier == Qualifier::Public {
                self.principal_ids()
                    .filter(|&q| q != p.id)
                    .map(|q| KnownBy {
                        recipient: q,
                        sender: q,
                    })
                    .collect()
            } else {
                Vec::new()
            };
            let constant = Constant {
                guard: false,
                fresh: false,
                leaked: false,
                declaration: Some(Declaration::Knows),
                qualifier: Some(qualifier),
                ..c.clone()
            };
            self.push(constant.clone(), Value::Constant(constant), p.id, known_by, declared_at, Vec::new());
        }
        Ok(())
    }

    fn render_generates(&mut self, p: &Principal, expr: &Expression, declared_at: usize) -> ModelResult<()> {
        for c in &expr.constants {
            if self.index_of(c.id).is_some() {
                return Err(ModelError::GeneratedTwice {
                    constant: c.name.to_string(),
                    span: expr.span,
                });
            }
            let constant = Constant {
                guard: false,
                fresh: true,
                leaked: false,
                declaration: Some(Declaration::Generates),
                qualifier: Some(Qualifier::Private),
                ..c.clone()
            };
            self.push(constant.clone(), Value::Constant(constant), p.id, Vec::new(), declared_at, Vec::new());
        }
        Ok(())
    }

    fn render_assignment(&mut self, p: &Principal, expr: &Expression, declared_at: usize) -> ModelResult<()> {
        let Some(assigned) = &expr.assigned else {
            return Ok(());
        };
        let mut used = Vec::new();
        assignment_constants(assigned, &mut used, expr.span)?;
        if let Value::Primitive(prim) = assigned {
            check_primitive_outputs(prim, expr.constants.len(), expr.span)?;
        }
        for c in &used {
            let i = self.require(c, || ModelError::UnknownConstant {
                constant: c.name.to_string(),
                span: expr.span,
            })?;
            if !self.knows(i, p.id) {
                return Err(ModelError::UsingUnknown {
                    principal: p.name.to_string(),
                    constant: c.name.to_string(),
                    span: expr.span,
                });
            }
        }
        for (position, c) in expr.constants.iter().enumerate() {
            if self.index_of(c.id).is_some() {
                return Err(ModelError::AssignedTwice {
                    constant: c.name.to_string(),
                    span: expr.span,
                });
            }
            let constant = Constant {
                guard: false,
                fresh: false,
                leaked: false,
                declaration: Some(Declaration::Assignment),
                qualifier: Some(Qualifier::Private),
                ..c.clone()
            };
            let value = match assigned {
                Value::Primitive(prim) => Value::primitive(Primitive {
                    output: position,
                    ..(**prim).clone()
                }),
                other => other.clone(),
            };
            self.push(constant, value, p.id, Vec::new(), declared_at, Vec::new());
        }
        Ok(())
    }

    fn render_leaks(&mut self, p: &Principal, expr: &Expression, phase: u32) -> ModelResult<()> {
        for c in &expr.constants {
            let i = self.require(c, || ModelError::LeakUnknown {
                constant: c.name.to_string(),
                span: expr.span,
            })?;
            if !self.knows(i, p.id) {
                return Err(ModelError::LeakNotKnown {
                    principal: p.name.to_string(),
                    constant: c.name.to_string(),
                    span: expr.span,
                });
            }
            self.constants[i].leaked = true;
            if !self.phase[i].contains(&phase) {
                self.phase[i].push(phase);
            }
        }
        Ok(())
    }

    fn render_message(&mut self, m: &Message, phase: u32) -> ModelResult<()> {
        for c in &m.constants {
            let i = self.require(c, || ModelError::SendUnknown {
                sender: m.sender.name.to_string(),
                recipient: m.recipient.name.to_string(),
                constant: c.name.to_string(),
                span: m.span,
            })?;
            if !self.knows(i, m.sender.id) {
                return Err(ModelError::SendNotKnown {
                    sender: m.sender.name.to_string(),
                    constant: c.name.to_string(),
                    span: m.span,
                });
            }
            if self.knows(i, m.recipient.id) {
                return Err(ModelError::ReceiveKnown {
                    recipient: m.recipient.name.to_string(),
                    constant: c.name.to_string(),
                    span: m.span,
                });
            }
            self.known_by[i].push(KnownBy {
                recipient: m.recipient.id,
                sender: m.sender.id,
            });
            if !self.phase[i].contains(&phase) {
                self.phase[i].push(phase);
            }
        }
        Ok(())
    }

    /// Resolve `a` against the map, returning the fully expanded value and
    /// every constant and intermediate term met along the way.
    pub fn resolve_internal_values(&self, a: &Value) -> (Value, Vec<Value>) {
        let mut internals = Vec::new();
        let resolved = self.resolve_into(a, &mut internals, 0);
        (resolved, internals)
    }

    fn resolve_into(&self, a: &Value, internals: &mut Vec<Value>, depth: usize) -> Value {
        if depth > MAX_MAP_DEPTH {
            return a.clone();
        }
        let a = match a {
            Value::Constant(c) => {
                push_unique(internals, a.clone());
                match self.index_of(c.id) {
                    Some(i) => self.assigned[i].clone(),
                    None => return a.clone(),
                }
            }
            other => other.clone(),
        };
        match &a {
            Value::Constant(_) => a,
            Value::Primitive(p) => {
                let arguments = p
                    .arguments
                    .iter()
                    .map(|arg| self.resolve_into(arg, internals, depth + 1))
                    .collect();
                Value::primitive(Primitive {
                    arguments,
                    ..(**p).clone()
                })
            }
            Value::Equation(e) => {
                let mut values: Vec<Value> = Vec::with_capacity(e.values.len());
                for (i, element) in e.values.iter().enumerate() {
                    match self.resolve_into(element, internals, depth + 1) {
                        Value::Equation(inner) => {
                            if i == 0 {
                                values = inner.values.clone();
                            } else {
                                values.extend(inner.values.iter().skip(1).cloned());
                            }
                        }
                        other => values.push(other),
                    }
                }
                let resolved = Value::equation(values);
                push_unique(internals, resolved.clone());
                resolved
            }
        }
    }

    /// Whether principal `p` uses `c` inside a primitive or equation it
    /// creates.
    pub fn constant_used_by(&self, p: PrincipalId, c: &Constant) -> bool {
        self.used_by.get(&c.id).is_some_and(|users| users.contains(&p))
    }

    fn cache_usage(&mut self) {
        let mut used_by: AHashMap<ConstantId, SmallVec<[PrincipalId; 4]>> = AHashMap::new();
        for (i, a) in self.assigned.iter().enumerate() {
            if matches!(a, Value::Constant(_)) {
                continue;
            }
            let creator = self.creator[i];
            let (_, internals) = self.resolve_internal_values(a);
            for (j, c) in self.constants.iter().enumerate() {
                let hit = find_equivalent(&internals, &self.assigned[j]).is_some()
                    || find_equivalent(&internals, &Value::Constant(c.clone())).is_some();
                if hit {
                    let users = used_by.entry(c.id).or_default();
                    if !users.contains(&creator) {
                        users.push(creator);
                    }
                }
            }
        }
        self.used_by = used_by;
    }

    /// Whether `c` occurs in `a` once constants are expanded through the map.
    pub fn constant_in_value(&self, c: &Constant, a: &Value) -> bool {
        let (resolved, internals) = self.resolve_internal_values(a);
        resolved.mentions(c) || internals.iter().any(|v| v.mentions(c))
    }

    /// Rebuild lookup tables after deserialization.
    pub fn reindex(&mut self) {
        self.index = self
            .constants
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();
        self.cache_usage();
    }
}

const MAX_MAP_DEPTH: usize = 256;

/// Constants referenced by an assignment's right-hand side, with arity checks
/// on every primitive met.
fn assignment_constants(v: &Value, out: &mut Vec<Constant>, span: Span) -> ModelResult<()> {
    match v {
        Value::Constant(c) => {
            if !out.contains(c) {
                out.push(c.clone());
            }
        }
        Value::Primitive(p) => {
            let spec = p.id.spec();
            if p.arguments.is_empty() {
                return Err(ModelError::NoInputs {
                    primitive: spec.name.to_string(),
                    span,
                });
            }
            if !spec.accepts_arity(p.arguments.len()) {
                return Err(ModelError::InputCount {
                    primitive: spec.name.to_string(),
                    found: p.arguments.len(),
                    expected: pretty_arity(spec.arity),
                    span,
                });
            }
            for a in &p.arguments {
                if let Value::Primitive(inner) = a {
                    check_primitive_outputs(inner, 1, span)?;
                }
                assignment_constants(a, out, span)?;
            }
        }
        Value::Equation(e) => {
            for a in &e.values {
                assignment_constants(a, out, span)?;
            }
        }
    }
    Ok(())
}

fn check_primitive_outputs(p: &Primitive, outputs: usize, span: Span) -> ModelResult<()> {
    let spec = p.id.spec();
    if !spec.accepts_output(outputs) {
        return Err(ModelError::OutputCount {
            primitive: spec.name.to_string(),
            found: outputs,
            expected: pretty_arity(spec.output),
            span,
        });
    }
    if p.check && !spec.check {
        return Err(ModelError::CheckUnsupported {
            primitive: spec.name.to_string(),
            span,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;

    fn build(src: &str) -> ModelResult<KnowledgeMap> {
        let model = lower(&verifpal_syntax::parse(src).expect("parse"), "test.vp")?;
        KnowledgeMap::build(&model)
    }

    const BASIC: &str = "attacker[active]
principal Alice[
    knows private k
    generates m
    c = ENC(k, m)
]
principal Bob[
    knows private k
]
Alice -> Bob: c
principal Bob[
    d = DEC(k, c)
]
queries[
    confidentiality? m
]";

    #[test]
    fn test_sentinels_and_order() {
        let km = build(BASIC).unwrap();
        assert!(km.constants[0].is_g());
        assert!(km.constants[1].is_nil());
        let names: Vec<&str> = km.constants.iter().map(|c| &*c.name).collect();
        assert_eq!(names, ["g", "nil", "k", "m", "c", "d"]);
        assert_eq!(km.max_declared_at, 1);
    }

    #[test]
    fn test_known_by_and_creator() {
        let km = build(BASIC).unwrap();
        let alice = PrincipalId(1);
        let bob = PrincipalId(2);
        let k = km.index_of(km.constants[2].id).unwrap();
        assert_eq!(km.creator[k], alice);
        assert!(km.knows(k, bob));
        let c = 4;
        assert_eq!(
            km.known_by[c],
            vec![KnownBy {
                recipient: bob,
                sender: alice
            }]
        );
        assert_eq!(km.phase[c], vec![0]);
        assert!(km.constant_used_by(bob, &km.constants[c]));
        assert!(km.constant_used_by(bob, &km.constants[3]));
        assert!(!km.constant_used_by(alice, &km.constants[5]));
    }

    #[test]
    fn test_assignment_outputs_are_positional() {
        let km = build(
            "attacker[active]\nprincipal A[knows private x\na, b = HKDF(x, x, x)]\nqueries[confidentiality? a]",
        )
        .unwrap();
        let outputs: Vec<usize> = km.assigned[3..]
            .iter()
            .map(|v| v.as_primitive().unwrap().output)
            .collect();
        assert_eq!(outputs, [0, 1]);
    }

    #[test]
    fn test_errors() {
        let err = build("attacker[active]\nprincipal A[knows public x]\nprincipal B[knows private x]\nqueries[confidentiality? x]")
            .unwrap_err();
        assert!(matches!(err, ModelError::KnownInDifferentWays { .. }));

        let err = build("attacker[active]\nprincipal A[generates x\ngenerates x]\nqueries[confidentiality? x]")
            .unwrap_err();
        assert!(matches!(err, ModelError::GeneratedTwice { .. }));

        let err = build("attacker[active]\nprincipal A[knows private x]\nprincipal B[y = HASH(x)]\nqueries[confidentiality? x]")
            .unwrap_err();
        assert_eq!(err.to_string(), "B is using constant (x) despite not knowing it");

        let err = build("attacker[active]\nprincipal A[knows private x\ny = ENC(x)]\nqueries[confidentiality? x]")
            .unwrap_err();
        assert_eq!(err.to_string(), "primitive ENC has 1 inputs, expecting 2");

        let err = build("attacker[active]\nprincipal A[knows private x\ny, z = HASH(x)]\nqueries[confidentiality? x]")
            .unwrap_err();
        assert_eq!(err.to_string(), "primitive HASH has 2 outputs, expecting 1");

        let err = build("attacker[active]\nprincipal A[knows private x\ny = HASH(x)?]\nqueries[confidentiality? x]")
            .unwrap_err();
        assert!(matches!(err, ModelError::CheckUnsupported { .. }));

        let err = build("attacker[active]\nprincipal A[knows private x]\nprincipal B[knows private y]\nA -> B: y\nqueries[confidentiality? x]")
            .unwrap_err();
        assert_eq!(err.to_string(), "A is sending constant (y) despite not knowing it");

        let err = build("attacker[active]\nprincipal A[knows private x]\nprincipal B[knows private x]\nA -> B: x\nqueries[confidentiality? x]")
            .unwrap_err();
        assert_eq!(err.to_string(), "B is receiving constant (x) despite already knowing it");
    }

    #[test]
    fn test_leaks_mark_phase() {
        let km = build(
            "attacker[active]\nprincipal A[knows private x]\nphase[1]\nprincipal A[leaks x]\nqueries[confidentiality? x]",
        )
        .unwrap();
        let x = km.index_of(km.constants[2].id).unwrap();
        assert!(km.constants[x].leaked);
        assert_eq!(km.phase[x], vec![1]);
        assert_eq!(km.max_phase, 1);
    }
}
