//! The primitive registry.
//!
//! Each primitive is described by a static [`PrimitiveSpec`]: accepted input
//! and output counts, and the rules the attacker and the rewriting engine use
//! to reason about it. Core primitives (`ASSERT`, `CONCAT`, `SPLIT`) carry an
//! optional built-in rule instead of the decompose/recompose/rewrite/rebuild
//! rule set of cryptographic primitives.

use crate::value::{Primitive, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum PrimitiveId {
    #[serde(rename = "ASSERT")]
    Assert,
    #[serde(rename = "CONCAT")]
    Concat,
    #[serde(rename = "SPLIT")]
    Split,
    #[serde(rename = "PW_HASH")]
    PwHash,
    #[serde(rename = "HASH")]
    Hash,
    #[serde(rename = "HKDF")]
    Hkdf,
    #[serde(rename = "AEAD_ENC")]
    AeadEnc,
    #[serde(rename = "AEAD_DEC")]
    AeadDec,
    #[serde(rename = "ENC")]
    Enc,
    #[serde(rename = "DEC")]
    Dec,
    #[serde(rename = "MAC")]
    Mac,
    #[serde(rename = "SIGN")]
    Sign,
    #[serde(rename = "SIGNVERIF")]
    SignVerif,
    #[serde(rename = "PKE_ENC")]
    PkeEnc,
    #[serde(rename = "PKE_DEC")]
    PkeDec,
    #[serde(rename = "SHAMIR_SPLIT")]
    ShamirSplit,
    #[serde(rename = "SHAMIR_JOIN")]
    ShamirJoin,
    #[serde(rename = "RINGSIGN")]
    RingSign,
    #[serde(rename = "RINGSIGNVERIF")]
    RingSignVerif,
    #[serde(rename = "BLIND")]
    Blind,
    #[serde(rename = "UNBLIND")]
    Unblind,
}

impl PrimitiveId {
    pub const ALL: [PrimitiveId; 21] = [
        PrimitiveId::Assert,
        PrimitiveId::Concat,
        PrimitiveId::Split,
        PrimitiveId::PwHash,
        PrimitiveId::Hash,
        PrimitiveId::Hkdf,
        PrimitiveId::AeadEnc,
        PrimitiveId::AeadDec,
        PrimitiveId::Enc,
        PrimitiveId::Dec,
        PrimitiveId::Mac,
        PrimitiveId::Sign,
        PrimitiveId::SignVerif,
        PrimitiveId::PkeEnc,
        PrimitiveId::PkeDec,
        PrimitiveId::ShamirSplit,
        PrimitiveId::ShamirJoin,
        PrimitiveId::RingSign,
        PrimitiveId::RingSignVerif,
        PrimitiveId::Blind,
        PrimitiveId::Unblind,
    ];

    pub fn spec(self) -> &'static PrimitiveSpec {
        &REGISTRY[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Look up a primitive by its upper-case name.
    pub fn from_name(name: &str) -> Option<PrimitiveId> {
        REGISTRY.iter().find(|s| s.name == name).map(|s| s.id)
    }

    pub fn is_core(self) -> bool {
        matches!(self, PrimitiveId::Assert | PrimitiveId::Concat | PrimitiveId::Split)
    }
}

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Built-in rule of a core primitive: whether it rewrites, and the values it
/// rewrites to (the primitive itself when it does not).
pub type CoreRuleFn = fn(&Primitive) -> (bool, Vec<Value>);

/// Transform (or reject) argument `x` of `p` before it is compared at
/// position `i`.
pub type FilterFn = fn(&Primitive, &Value, usize) -> Option<Value>;

/// Knowing the arguments in `given` reveals argument `reveal`.
pub struct DecomposeRule {
    pub given: &'static [usize],
    pub reveal: usize,
    pub filter: FilterFn,
}

/// Holding outputs of the primitive at every index of one `given` group
/// reveals argument `reveal`.
pub struct RecomposeRule {
    pub given: &'static [&'static [usize]],
    pub reveal: usize,
}

/// When argument `from` is a primitive of kind `id` whose arguments line up
/// with ours as described by `matching`, the primitive reduces to `to(from)`.
/// Each `(a, candidates)` entry requires our argument `a`, after `filter`, to
/// equal one of `from`'s arguments at `candidates`.
pub struct RewriteRule {
    pub id: PrimitiveId,
    pub from: usize,
    pub to: fn(&Primitive) -> Option<Value>,
    pub matching: &'static [(usize, &'static [usize])],
    pub filter: FilterFn,
}

/// When the arguments at one `given` group are distinct outputs of the same
/// `id` primitive, the primitive reduces to that primitive's `reveal`
/// argument.
pub struct RebuildRule {
    pub id: PrimitiveId,
    pub given: &'static [&'static [usize]],
    pub reveal: usize,
}

pub struct PrimitiveSpec {
    pub id: PrimitiveId,
    pub name: &'static str,
    pub arity: &'static [usize],
    pub output: &'static [usize],
    pub core_rule: Option<CoreRuleFn>,
    pub decompose: Option<DecomposeRule>,
    pub recompose: Option<RecomposeRule>,
    pub rewrite: Option<RewriteRule>,
    pub rebuild: Option<RebuildRule>,
    /// Whether `PRIM(...)?` is meaningful.
    pub check: bool,
    /// Whether skeletons of this primitive may be injected.
    pub injectable: bool,
    /// Injection is deferred to later stages.
    pub explosive: bool,
    /// Argument positions that hide a password from the attacker.
    pub password_hashing: &'static [usize],
}

impl fmt::Debug for PrimitiveSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("output", &self.output)
            .field("check", &self.check)
            .finish_non_exhaustive()
    }
}

impl PrimitiveSpec {
    pub fn accepts_arity(&self, n: usize) -> bool {
        self.arity.contains(&n)
    }

    pub fn accepts_output(&self, n: usize) -> bool {
        self.output.contains(&n)
    }
}

/// Render a count set the way error messages expect: `2`, `1 or 2`,
/// `1, 2, or 3`.
pub fn pretty_arity(counts: &[usize]) -> String {
    match counts {
        [] => String::new(),
        [one] => one.to_string(),
        [a, b] => format!("{a} or {b}"),
        [init @ .., last] => {
            let head: Vec<String> = init.iter().map(|n| n.to_string()).collect();
            format!("{}, or {last}", head.join(", "))
        }
    }
}

fn pass(_: &Primitive, x: &Value, _: usize) -> Option<Value> {
    Some(x.clone())
}

/// `G^x` to `x`; anything else is rejected.
fn public_key_exponent(x: &Value) -> Option<Value> {
    let e = x.as_equation()?;
    match e.values.as_slice() {
        [base, exp] if base.is_g() => Some(exp.clone()),
        _ => None,
    }
}

fn assert_rule(p: &Primitive) -> (bool, Vec<Value>) {
    let ok = match p.arguments.as_slice() {
        [a, b] => a.equivalent(b, true),
        _ => false,
    };
    (ok, vec![Value::primitive(p.clone())])
}

fn split_rule(p: &Primitive) -> (bool, Vec<Value>) {
    match p.arguments.first().and_then(Value::as_primitive) {
        Some(inner) if inner.id == PrimitiveId::Concat => (true, inner.arguments.clone()),
        _ => (false, vec![Value::primitive(p.clone())]),
    }
}

fn second_argument(from: &Primitive) -> Option<Value> {
    from.arguments.get(1).cloned()
}

fn to_nil(_: &Primitive) -> Option<Value> {
    Some(Value::nil())
}

fn aead_dec_filter(_: &Primitive, x: &Value, i: usize) -> Option<Value> {
    matches!(i, 0 | 2).then(|| x.clone())
}

fn dec_filter(_: &Primitive, x: &Value, i: usize) -> Option<Value> {
    (i == 0).then(|| x.clone())
}

fn sign_verif_filter(_: &Primitive, x: &Value, i: usize) -> Option<Value> {
    match i {
        0 => public_key_exponent(x),
        1 => Some(x.clone()),
        _ => None,
    }
}

fn pke_enc_decompose_filter(_: &Primitive, x: &Value, i: usize) -> Option<Value> {
    match i {
        0 => public_key_exponent(x),
        1 => Some(x.clone()),
        _ => None,
    }
}

fn pke_dec_filter(_: &Primitive, x: &Value, i: usize) -> Option<Value> {
    match (i, x) {
        (0, Value::Constant(_) | Value::Primitive(_)) => {
            Some(Value::equation(vec![Value::g(), x.clone()]))
        }
        _ => None,
    }
}

fn ring_sign_verif_filter(_: &Primitive, x: &Value, i: usize) -> Option<Value> {
    match i {
        0 => match x.as_equation()?.values.as_slice() {
            [_, exp] => Some(exp.clone()),
            _ => None,
        },
        1..=4 => Some(x.clone()),
        _ => None,
    }
}

fn unblind_to(from: &Primitive) -> Option<Value> {
    let key = from.arguments.first()?.clone();
    let blinded = from.arguments.get(1)?.as_primitive()?;
    let message = blinded.arguments.get(1)?.clone();
    Some(Value::primitive(Primitive::new(
        PrimitiveId::Sign,
        vec![key, message],
        0,
        false,
    )))
}

fn unblind_filter(p: &Primitive, _: &Value, i: usize) -> Option<Value> {
    if i != 1 {
        return None;
    }
    let args = p.arguments.get(0..2)?.to_vec();
    Some(Value::primitive(Primitive::new(PrimitiveId::Blind, args, 0, false)))
}

const ONE: &[usize] = &[1];
const ONE_TO_FIVE: &[usize] = &[1, 2, 3, 4, 5];
const NONE: &[usize] = &[];

const fn plain(id: PrimitiveId, name: &'static str, arity: &'static [usize]) -> PrimitiveSpec {
    PrimitiveSpec {
        id,
        name,
        arity,
        output: ONE,
        core_rule: None,
        decompose: None,
        recompose: None,
        rewrite: None,
        rebuild: None,
        check: false,
        injectable: true,
        explosive: false,
        password_hashing: NONE,
    }
}

static REGISTRY: [PrimitiveSpec; 21] = [
    PrimitiveSpec {
        core_rule: Some(assert_rule),
        check: true,
        injectable: false,
        ..plain(PrimitiveId::Assert, "ASSERT", &[2])
    },
    PrimitiveSpec {
        explosive: true,
        ..plain(PrimitiveId::Concat, "CONCAT", &[2, 3, 4, 5])
    },
    PrimitiveSpec {
        output: ONE_TO_FIVE,
        core_rule: Some(split_rule),
        check: true,
        injectable: false,
        ..plain(PrimitiveId::Split, "SPLIT", ONE)
    },
    PrimitiveSpec {
        password_hashing: &[0, 1, 2, 3, 4],
        ..plain(PrimitiveId::PwHash, "PW_HASH", ONE_TO_FIVE)
    },
    PrimitiveSpec {
        explosive: true,
        ..plain(PrimitiveId::Hash, "HASH", ONE_TO_FIVE)
    },
    PrimitiveSpec {
        output: ONE_TO_FIVE,
        explosive: true,
        ..plain(PrimitiveId::Hkdf, "HKDF", &[3])
    },
    PrimitiveSpec {
        decompose: Some(DecomposeRule {
            given: &[0],
            reveal: 1,
            filter: pass,
        }),
        password_hashing: ONE,
        ..plain(PrimitiveId::AeadEnc, "AEAD_ENC", &[3])
    },
    PrimitiveSpec {
        decompose: Some(DecomposeRule {
            given: &[0],
            reveal: 1,
            filter: pass,
        }),
        rewrite: Some(RewriteRule {
            id: PrimitiveId::AeadEnc,
            from: 1,
            to: second_argument,
            matching: &[(0, &[0]), (2, &[2])],
            filter: aead_dec_filter,
        }),
        check: true,
        injectable: false,
        ..plain(PrimitiveId::AeadDec, "AEAD_DEC", &[3])
    },
    PrimitiveSpec {
        decompose: Some(DecomposeRule {
            given: &[0],
            reveal: 1,
            filter: pass,
        }),
        password_hashing: ONE,
        ..plain(PrimitiveId::Enc, "ENC", &[2])
    },
    PrimitiveSpec {
        decompose: Some(DecomposeRule {
            given: &[0],
            reveal: 1,
            filter: pass,
        }),
        rewrite: Some(RewriteRule {
            id: PrimitiveId::Enc,
            from: 1,
            to: second_argument,
            matching: &[(0, &[0])],
            filter: dec_filter,
        }),
        injectable: false,
        ..plain(PrimitiveId::Dec, "DEC", &[2])
    },
    PrimitiveSpec {
        password_hashing: ONE,
        ..plain(PrimitiveId::Mac, "MAC", &[2])
    },
    PrimitiveSpec {
        password_hashing: ONE,
        ..plain(PrimitiveId::Sign, "SIGN", &[2])
    },
    PrimitiveSpec {
        rewrite: Some(RewriteRule {
            id: PrimitiveId::Sign,
            from: 2,
            to: to_nil,
            matching: &[(0, &[0]), (1, &[1])],
            filter: sign_verif_filter,
        }),
        check: true,
        injectable: false,
        ..plain(PrimitiveId::SignVerif, "SIGNVERIF", &[3])
    },
    PrimitiveSpec {
        decompose: Some(DecomposeRule {
            given: &[0],
            reveal: 1,
            filter: pke_enc_decompose_filter,
        }),
        password_hashing: ONE,
        ..plain(PrimitiveId::PkeEnc, "PKE_ENC", &[2])
    },
    PrimitiveSpec {
        decompose: Some(DecomposeRule {
            given: &[0],
            reveal: 1,
            filter: pass,
        }),
        rewrite: Some(RewriteRule {
            id: PrimitiveId::PkeEnc,
            from: 1,
            to: second_argument,
            matching: &[(0, &[0])],
            filter: pke_dec_filter,
        }),
        injectable: false,
        ..plain(PrimitiveId::PkeDec, "PKE_DEC", &[2])
    },
    PrimitiveSpec {
        output: &[3],
        recompose: Some(RecomposeRule {
            given: &[&[0, 1], &[0, 2], &[1, 2]],
            reveal: 0,
        }),
        injectable: false,
        ..plain(PrimitiveId::ShamirSplit, "SHAMIR_SPLIT", ONE)
    },
    PrimitiveSpec {
        rebuild: Some(RebuildRule {
            id: PrimitiveId::ShamirSplit,
            given: &[&[0, 1], &[1, 0], &[0, 2], &[2, 0], &[1, 2], &[2, 1]],
            reveal: 0,
        }),
        injectable: false,
        ..plain(PrimitiveId::ShamirJoin, "SHAMIR_JOIN", &[2])
    },
    PrimitiveSpec {
        password_hashing: &[3],
        ..plain(PrimitiveId::RingSign, "RINGSIGN", &[4])
    },
    PrimitiveSpec {
        rewrite: Some(RewriteRule {
            id: PrimitiveId::RingSign,
            from: 4,
            to: to_nil,
            matching: &[(0, &[0, 1, 2]), (1, &[0, 1, 2]), (2, &[0, 1, 2]), (3, &[3])],
            filter: ring_sign_verif_filter,
        }),
        check: true,
        injectable: false,
        ..plain(PrimitiveId::RingSignVerif, "RINGSIGNVERIF", &[5])
    },
    PrimitiveSpec {
        decompose: Some(DecomposeRule {
            given: &[0],
            reveal: 1,
            filter: pass,
        }),
        password_hashing: ONE,
        ..plain(PrimitiveId::Blind, "BLIND", &[2])
    },
    PrimitiveSpec {
        rewrite: Some(RewriteRule {
            id: PrimitiveId::Sign,
            from: 2,
            to: unblind_to,
            matching: &[(0, &[1])],
            filter: unblind_filter,
        }),
        ..plain(PrimitiveId::Unblind, "UNBLIND", &[3])
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Constant;
    use std::sync::Arc;

    fn c(id: u32) -> Value {
        Value::Constant(Constant::reference(Arc::from(format!("c{id}")), id))
    }

    #[test]
    fn test_registry_order() {
        for (i, id) in PrimitiveId::ALL.iter().enumerate() {
            assert_eq!(*id as usize, i);
            assert_eq!(id.spec().id, *id);
            assert_eq!(PrimitiveId::from_name(id.name()), Some(*id));
        }
        assert_eq!(PrimitiveId::from_name("NOPE"), None);
    }

    #[test]
    fn test_core_flags() {
        assert!(PrimitiveId::Split.is_core());
        assert!(!PrimitiveId::Hash.is_core());
        assert!(PrimitiveId::Concat.spec().core_rule.is_none());
        assert!(PrimitiveId::Assert.spec().check);
        assert!(!PrimitiveId::Dec.spec().check);
        assert!(PrimitiveId::AeadDec.spec().check);
    }

    #[test]
    fn test_pretty_arity() {
        assert_eq!(pretty_arity(&[2]), "2");
        assert_eq!(pretty_arity(&[1, 2]), "1 or 2");
        assert_eq!(pretty_arity(&[1, 2, 3]), "1, 2, or 3");
    }

    #[test]
    fn test_split_rule() {
        let concat = Value::primitive(Primitive::new(PrimitiveId::Concat, vec![c(2), c(3)], 0, false));
        let split = Primitive::new(PrimitiveId::Split, vec![concat], 1, false);
        let (ok, values) = split_rule(&split);
        assert!(ok);
        assert_eq!(values.len(), 2);
        assert!(values[1].equivalent(&c(3), true));

        let bad = Primitive::new(PrimitiveId::Split, vec![c(2)], 0, false);
        assert!(!split_rule(&bad).0);
    }

    #[test]
    fn test_public_key_filters() {
        let pk = Value::equation(vec![Value::g(), c(5)]);
        let p = Primitive::new(PrimitiveId::SignVerif, vec![], 0, false);
        assert!(sign_verif_filter(&p, &pk, 0).is_some_and(|v| v.equivalent(&c(5), true)));
        assert!(sign_verif_filter(&p, &c(5), 0).is_none());
        assert!(pke_dec_filter(&p, &c(5), 0).is_some_and(|v| v.equivalent(&pk, true)));
        assert!(pke_dec_filter(&p, &pk, 0).is_none());
    }
}
