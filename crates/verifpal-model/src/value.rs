//! Symbolic values: constants, primitive applications and Diffie-Hellman
//! style equations, together with the equivalence relation the analysis
//! runs on.

use crate::primitive::PrimitiveId;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

/// Interned constant name.
pub type ConstantId = u32;

/// Id of the generator constant `g`.
pub const G_ID: ConstantId = 0;
/// Id of the `nil` constant.
pub const NIL_ID: ConstantId = 1;

/// Index into the principal name table. `0` is always the attacker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(pub u8);

impl PrincipalId {
    pub const ATTACKER: PrincipalId = PrincipalId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_attacker(self) -> bool {
        self == Self::ATTACKER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Declaration {
    Knows,
    Generates,
    Assignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Qualifier {
    Public,
    Private,
    Password,
}

impl Qualifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Qualifier::Public => "public",
            Qualifier::Private => "private",
            Qualifier::Password => "password",
        }
    }
}

impl From<verifpal_syntax::Qualifier> for Qualifier {
    fn from(q: verifpal_syntax::Qualifier) -> Self {
        match q {
            verifpal_syntax::Qualifier::Public => Qualifier::Public,
            verifpal_syntax::Qualifier::Private => Qualifier::Private,
            verifpal_syntax::Qualifier::Password => Qualifier::Password,
        }
    }
}

/// A named atom. Identity is the interned id; the remaining fields are
/// attributes recorded where the constant is declared or referenced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constant {
    pub name: Arc<str>,
    pub id: ConstantId,
    /// Guarded (`[c]`) in a message, so the attacker cannot tamper with it.
    #[serde(default)]
    pub guard: bool,
    #[serde(default)]
    pub fresh: bool,
    #[serde(default)]
    pub leaked: bool,
    #[serde(default)]
    pub declaration: Option<Declaration>,
    #[serde(default)]
    pub qualifier: Option<Qualifier>,
}

impl Constant {
    /// A bare reference to an interned name with no attributes.
    pub fn reference(name: Arc<str>, id: ConstantId) -> Self {
        Self {
            name,
            id,
            guard: false,
            fresh: false,
            leaked: false,
            declaration: None,
            qualifier: None,
        }
    }

    fn sentinel(name: &str, id: ConstantId) -> Self {
        Self {
            declaration: Some(Declaration::Knows),
            qualifier: Some(Qualifier::Public),
            ..Self::reference(Arc::from(name), id)
        }
    }

    pub fn is_g(&self) -> bool {
        self.id == G_ID
    }

    pub fn is_nil(&self) -> bool {
        self.id == NIL_ID
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Application of a registered primitive. `output` selects which of its
/// outputs this value stands for; `check` marks `PRIM(...)?`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primitive {
    pub id: PrimitiveId,
    pub arguments: Vec<Value>,
    #[serde(default)]
    pub output: usize,
    #[serde(default)]
    pub check: bool,
}

impl Primitive {
    pub fn new(id: PrimitiveId, arguments: Vec<Value>, output: usize, check: bool) -> Self {
        Self {
            id,
            arguments,
            output,
            check,
        }
    }

    /// Structural equivalence. Arguments are always compared with outputs
    /// considered; `consider_output` only governs this primitive's own slot.
    pub fn equivalent(&self, other: &Primitive, consider_output: bool) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.id != other.id {
            return false;
        }
        if consider_output && self.output != other.output {
            return false;
        }
        self.arguments.len() == other.arguments.len()
            && self
                .arguments
                .iter()
                .zip(&other.arguments)
                .all(|(a, b)| a.equivalent(b, true))
    }
}

/// Exponentiation chain `values[0]^values[1]^...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equation {
    pub values: Vec<Value>,
}

impl Equation {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Splice nested equations into a single chain. A nested equation at the
    /// base replaces it; elsewhere its exponents are appended.
    pub fn flatten(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.values.len());
        for (i, v) in self.values.iter().enumerate() {
            match v {
                Value::Equation(inner) => {
                    let inner = inner.flatten();
                    if i == 0 {
                        out.extend(inner);
                    } else {
                        out.extend(inner.into_iter().skip(1));
                    }
                }
                other => out.push(other.clone()),
            }
        }
        out
    }
}

/// A symbolic term.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Value {
    Constant(Constant),
    Primitive(Arc<Primitive>),
    Equation(Arc<Equation>),
}

static G: LazyLock<Value> = LazyLock::new(|| Value::Constant(Constant::sentinel("g", G_ID)));
static NIL: LazyLock<Value> = LazyLock::new(|| Value::Constant(Constant::sentinel("nil", NIL_ID)));
static G_NIL: LazyLock<Value> =
    LazyLock::new(|| Value::equation(vec![Value::g(), Value::nil()]));
static G_NIL_NIL: LazyLock<Value> =
    LazyLock::new(|| Value::equation(vec![Value::g(), Value::nil(), Value::nil()]));

impl Value {
    /// The generator `g`.
    pub fn g() -> Value {
        G.clone()
    }

    pub fn nil() -> Value {
        NIL.clone()
    }

    /// `G^nil`
    pub fn g_nil() -> Value {
        G_NIL.clone()
    }

    /// `G^nil^nil`
    pub fn g_nil_nil() -> Value {
        G_NIL_NIL.clone()
    }

    pub fn primitive(p: Primitive) -> Value {
        Value::Primitive(Arc::new(p))
    }

    pub fn equation(values: Vec<Value>) -> Value {
        Value::Equation(Arc::new(Equation::new(values)))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Constant(_) => "constant",
            Value::Primitive(_) => "primitive",
            Value::Equation(_) => "equation",
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Value::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_primitive(&self) -> Option<&Arc<Primitive>> {
        match self {
            Value::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_equation(&self) -> Option<&Arc<Equation>> {
        match self {
            Value::Equation(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_g(&self) -> bool {
        matches!(self, Value::Constant(c) if c.is_g())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Constant(c) if c.is_nil())
    }

    /// Number of elements once nested equations are spliced; `0` for
    /// non-equations.
    pub fn equation_len(&self) -> usize {
        match self {
            Value::Equation(e) => e.flatten().len(),
            _ => 0,
        }
    }

    /// Symbolic equivalence. Constants match by identity, primitives
    /// structurally and equations modulo commutativity of exponents.
    pub fn equivalent(&self, other: &Value, consider_output: bool) -> bool {
        match (self, other) {
            (Value::Constant(a), Value::Constant(b)) => a.id == b.id,
            (Value::Primitive(a), Value::Primitive(b)) => {
                Arc::ptr_eq(a, b) || a.equivalent(b, consider_output)
            }
            (Value::Equation(a), Value::Equation(b)) => {
                Arc::ptr_eq(a, b) || equations_equivalent(&a.flatten(), &b.flatten())
            }
            _ => false,
        }
    }

    /// Every constant occurring in the value, depth first.
    pub fn constants(&self) -> Vec<Constant> {
        let mut out = Vec::new();
        self.collect_constants(&mut out);
        out
    }

    fn collect_constants(&self, out: &mut Vec<Constant>) {
        match self {
            Value::Constant(c) => out.push(c.clone()),
            Value::Primitive(p) => p.arguments.iter().for_each(|a| a.collect_constants(out)),
            Value::Equation(e) => e.values.iter().for_each(|a| a.collect_constants(out)),
        }
    }

    /// Whether `c` occurs anywhere inside the value.
    pub fn mentions(&self, c: &Constant) -> bool {
        match self {
            Value::Constant(x) => x.id == c.id,
            Value::Primitive(p) => p.arguments.iter().any(|a| a.mentions(c)),
            Value::Equation(e) => e.values.iter().any(|a| a.mentions(c)),
        }
    }
}

fn equations_equivalent(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    match a.len() {
        0 => true,
        1 | 2 => a.iter().zip(b).all(|(x, y)| x.equivalent(y, true)),
        3 => {
            a[0].equivalent(&b[0], true)
                && ((a[1].equivalent(&b[1], true) && a[2].equivalent(&b[2], true))
                    || (a[1].equivalent(&b[2], true) && a[2].equivalent(&b[1], true)))
        }
        _ => a[0].equivalent(&b[0], true) && is_permutation(&a[1..], &b[1..]),
    }
}

fn is_permutation(a: &[Value], b: &[Value]) -> bool {
    let mut used = vec![false; b.len()];
    a.iter().all(|x| {
        let hit = b
            .iter()
            .enumerate()
            .find(|(j, y)| !used[*j] && x.equivalent(y, true))
            .map(|(j, _)| j);
        match hit {
            Some(j) => {
                used[j] = true;
                true
            }
            None => false,
        }
    })
}

/// Position of the first value in `values` equivalent to `v`.
pub fn find_equivalent(values: &[Value], v: &Value) -> Option<usize> {
    values.iter().position(|x| x.equivalent(v, true))
}

/// Push `v` unless an equivalent value is already present.
pub fn push_unique(values: &mut Vec<Value>, v: Value) -> bool {
    if find_equivalent(values, &v).is_some() {
        return false;
    }
    values.push(v);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(name: &str, id: ConstantId) -> Value {
        Value::Constant(Constant::reference(Arc::from(name), id))
    }

    #[test]
    fn test_constant_identity() {
        assert!(c("a", 5).equivalent(&c("a", 5), true));
        assert!(!c("a", 5).equivalent(&c("b", 6), true));
        assert!(Value::g().is_g());
        assert!(Value::nil().is_nil());
    }

    #[test]
    fn test_primitive_output() {
        let p = |output| {
            Value::primitive(Primitive::new(
                PrimitiveId::Hkdf,
                vec![c("a", 2), c("b", 3), c("c", 4)],
                output,
                false,
            ))
        };
        assert!(p(0).equivalent(&p(0), true));
        assert!(!p(0).equivalent(&p(1), true));
        assert!(p(0).equivalent(&p(1), false));
    }

    #[test]
    fn test_equation_commutes() {
        let ab = Value::equation(vec![Value::g(), c("a", 2), c("b", 3)]);
        let ba = Value::equation(vec![Value::g(), c("b", 3), c("a", 2)]);
        assert!(ab.equivalent(&ba, true));

        let nested = Value::equation(vec![
            Value::equation(vec![Value::g(), c("b", 3)]),
            c("a", 2),
        ]);
        assert!(nested.equivalent(&ab, true));
        assert_eq!(nested.equation_len(), 3);

        let other_base = Value::equation(vec![c("x", 9), c("a", 2), c("b", 3)]);
        assert!(!other_base.equivalent(&ab, true));
    }

    #[test]
    fn test_long_equation_permutation() {
        let abc = Value::equation(vec![Value::g(), c("a", 2), c("b", 3), c("c", 4)]);
        let cab = Value::equation(vec![Value::g(), c("c", 4), c("a", 2), c("b", 3)]);
        let aab = Value::equation(vec![Value::g(), c("a", 2), c("a", 2), c("b", 3)]);
        assert!(abc.equivalent(&cab, true));
        assert!(!abc.equivalent(&aab, true));
    }

    #[test]
    fn test_push_unique() {
        let mut values = vec![c("a", 2)];
        assert!(!push_unique(&mut values, c("a", 2)));
        assert!(push_unique(&mut values, c("b", 3)));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_value_json_shape() {
        let v = Value::primitive(Primitive::new(PrimitiveId::Hash, vec![c("a", 2)], 0, false));
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "primitive");
        assert_eq!(json["data"]["id"], "HASH");
        let back: Value = serde_json::from_value(json).unwrap();
        assert!(back.equivalent(&v, true));
    }
}
