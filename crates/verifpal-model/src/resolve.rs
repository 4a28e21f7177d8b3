//! Resolution of constants to the values a principal actually holds.
//!
//! Resolution expands every constant reference inside a value, choosing per
//! slot between the pre-mutation value and the attacker-mutated one. A value
//! created by the principal itself always sees its own view; a value created
//! elsewhere only sees a mutation when the creator could have received it.

use crate::error::{ModelError, ModelResult};
use crate::principal::PrincipalState;
use crate::value::{Constant, Equation, Primitive, Value};
use std::sync::Arc;

/// Nesting bound for resolution; exceeding it means the state is cyclic.
pub const MAX_RESOLUTION_DEPTH: usize = 512;

impl PrincipalState {
    /// Fully resolve `a`, which sits in slot `root_index`.
    pub fn resolve_value(&self, a: &Value, root_index: usize, force_before_mutate: bool) -> ModelResult<Value> {
        self.resolve_at(a, a, root_index, force_before_mutate, 0)
    }

    fn resolve_at(
        &self,
        a: &Value,
        root: &Value,
        root_index: usize,
        mut force: bool,
        depth: usize,
    ) -> ModelResult<Value> {
        if depth > MAX_RESOLUTION_DEPTH {
            return Err(ModelError::DepthExceeded);
        }
        let mut root = root;
        let mut root_index = root_index;
        let next;
        let a = match a {
            Value::Constant(c) => {
                let next_index = self.index_of(c).ok_or_else(|| invalid_index(c))?;
                if next_index == root_index {
                    if !force {
                        force = self.should_resolve_to_before_mutate(next_index);
                    }
                    if force {
                        self.before_mutate[next_index].clone()
                    } else {
                        self.resolve_constant(c).0
                    }
                } else {
                    if matches!(root, Value::Primitive(_)) && self.creator[root_index] != self.id {
                        force = true;
                    }
                    force = if force {
                        !self.meta[next_index]
                            .mutatable_to
                            .contains(&self.creator[root_index])
                    } else {
                        self.should_resolve_to_before_mutate(next_index)
                    };
                    next = if force {
                        self.before_mutate[next_index].clone()
                    } else {
                        self.assigned[next_index].clone()
                    };
                    root_index = next_index;
                    root = &next;
                    next.clone()
                }
            }
            other => other.clone(),
        };
        match &a {
            Value::Constant(_) => Ok(a),
            Value::Primitive(p) => {
                if self.creator[root_index] == self.id {
                    force = false;
                }
                let arguments = p
                    .arguments
                    .iter()
                    .map(|arg| self.resolve_at(arg, root, root_index, force, depth + 1))
                    .collect::<ModelResult<Vec<_>>>()?;
                Ok(Value::primitive(Primitive {
                    arguments,
                    ..(**p).clone()
                }))
            }
            Value::Equation(e) => self.resolve_equation(e, root, root_index, force, depth + 1),
        }
    }

    fn resolve_equation(
        &self,
        e: &Arc<Equation>,
        root: &Value,
        root_index: usize,
        mut force: bool,
        depth: usize,
    ) -> ModelResult<Value> {
        if depth > MAX_RESOLUTION_DEPTH {
            return Err(ModelError::DepthExceeded);
        }
        if self.creator[root_index] == self.id {
            force = false;
        }
        let mut values: Vec<Value> = Vec::with_capacity(e.values.len());
        for (i, element) in e.values.iter().enumerate() {
            let element = match element {
                Value::Constant(c) => match self.resolve_constant(c) {
                    (_, Some(slot)) if force => self.before_mutate[slot].clone(),
                    (v, _) => v,
                },
                other => other.clone(),
            };
            match &element {
                Value::Constant(_) => values.push(element),
                Value::Primitive(_) => {
                    values.push(self.resolve_at(&element, root, root_index, force, depth + 1)?)
                }
                Value::Equation(inner) => {
                    let resolved = self.resolve_equation(inner, root, root_index, force, depth + 1)?;
                    let spliced = resolved.as_equation().map(|r| r.values.clone()).unwrap_or_default();
                    if i == 0 {
                        values = spliced;
                    } else {
                        values.extend(spliced.into_iter().skip(1));
                    }
                }
            }
        }
        Ok(Value::equation(values))
    }

    /// Copy with every `assigned` and `before_rewrite` slot fully resolved.
    pub fn resolve_all_values(&self) -> ModelResult<PrincipalState> {
        let mut resolved = self.clone();
        for i in 0..self.len() {
            let force = self.should_resolve_to_before_mutate(i);
            resolved.assigned[i] = self.resolve_at(&self.assigned[i], &self.assigned[i], i, force, 0)?;
            resolved.before_rewrite[i] =
                self.resolve_at(&self.before_rewrite[i], &self.before_rewrite[i], i, force, 0)?;
        }
        Ok(resolved)
    }

    /// Whether `v`, resolved from slot `i`, contains a freshly generated
    /// constant.
    pub fn contains_fresh_values(&self, v: &Value, i: usize) -> ModelResult<bool> {
        let resolved = self.resolve_value(v, i, false)?;
        Ok(resolved.constants().iter().any(|c| {
            self.index_of(c)
                .map_or(c.fresh, |slot| self.constant(slot).fresh)
        }))
    }
}

fn invalid_index(c: &Constant) -> ModelError {
    ModelError::InvalidIndex {
        constant: c.name.to_string(),
    }
}
