use proptest::prelude::*;
use std::sync::Arc;
use verifpal_engine::{verify, VerifyConfig, VerifyOutcome};
use verifpal_model::{lower, sanity, Constant, Model, Primitive, PrimitiveId, Value};
use verifpal_syntax::{parse, pretty_print};

/// Names of the constants the strategies draw from. Ids start after the
/// `g` and `nil` sentinels.
pub const CONSTANT_NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

pub fn load(source: &str) -> Result<Model, String> {
    let ast = parse(source).map_err(|e| e.to_string())?;
    let model = lower(&ast, "soundness.vp").map_err(|e| e.to_string())?;
    sanity(&model).map_err(|e| e.to_string())?;
    Ok(model)
}

pub fn verify_source(source: &str) -> Result<VerifyOutcome, String> {
    let model = load(source)?;
    verify(&model, &VerifyConfig::default()).map_err(|e| e.to_string())
}

pub fn roundtrip_pretty(source: &str) -> Result<(String, String), String> {
    let m1 = parse(source).map_err(|e| e.to_string())?;
    let p1 = pretty_print(&m1);
    let m2 = parse(&p1).map_err(|e| e.to_string())?;
    let p2 = pretty_print(&m2);
    Ok((p1, p2))
}

pub fn constant(i: usize) -> Constant {
    let name = CONSTANT_NAMES[i % CONSTANT_NAMES.len()];
    Constant::reference(Arc::from(name), (i % CONSTANT_NAMES.len()) as u32 + 2)
}

pub fn arb_constant() -> impl Strategy<Value = Value> {
    (0..CONSTANT_NAMES.len()).prop_map(|i| Value::Constant(constant(i)))
}

/// Primitives without a rewrite rule, so values built from them are
/// already in canonical form.
pub fn arb_inert_primitive_id() -> impl Strategy<Value = PrimitiveId> {
    prop_oneof![
        Just(PrimitiveId::Hash),
        Just(PrimitiveId::Mac),
        Just(PrimitiveId::PwHash),
        Just(PrimitiveId::Hkdf),
    ]
}

pub fn arb_primitive_id() -> impl Strategy<Value = PrimitiveId> {
    (0..PrimitiveId::ALL.len()).prop_map(|i| PrimitiveId::ALL[i])
}

/// `G^x` or `G^x^y` over constants.
pub fn arb_public_key() -> impl Strategy<Value = Value> {
    prop::collection::vec(arb_constant(), 1..=2).prop_map(|exps| {
        let mut values = vec![Value::g()];
        values.extend(exps);
        Value::equation(values)
    })
}

/// Arbitrary terms: constants, primitive applications of any registered
/// primitive and equations over the generator.
pub fn arb_value() -> impl Strategy<Value = Value> {
    arb_constant().prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            (arb_primitive_id(), prop::collection::vec(inner.clone(), 1..=3), 0usize..2).prop_map(
                |(id, arguments, output)| Value::primitive(Primitive::new(id, arguments, output, false))
            ),
            prop::collection::vec(inner, 1..=2).prop_map(|exps| {
                let mut values = vec![Value::g()];
                values.extend(exps);
                Value::equation(values)
            }),
        ]
    })
}

/// Terms that rewriting leaves unchanged.
pub fn arb_inert_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        arb_constant(),
        arb_public_key(),
        (arb_inert_primitive_id(), prop::collection::vec(arb_constant(), 1..=3))
            .prop_map(|(id, arguments)| Value::primitive(Primitive::new(id, arguments, 0, false))),
    ]
}

/// A passive-attacker model where Alice sends `clear` secrets in the
/// clear and `sealed` secrets encrypted under a key she shares with Bob.
pub fn synth_model(clear: usize, sealed: usize) -> String {
    let clear_names: Vec<String> = (0..clear).map(|i| format!("m{i}")).collect();
    let sealed_names: Vec<String> = (0..sealed).map(|i| format!("s{i}")).collect();
    let mut alice = Vec::new();
    let mut sent: Vec<String> = clear_names.clone();
    if !clear_names.is_empty() {
        alice.push(format!("\tgenerates {}", clear_names.join(", ")));
    }
    if !sealed_names.is_empty() {
        alice.push(format!("\tgenerates {}", sealed_names.join(", ")));
        for (i, s) in sealed_names.iter().enumerate() {
            alice.push(format!("\te{i} = ENC(k, {s})"));
            sent.push(format!("e{i}"));
        }
    }
    let queries: Vec<String> = clear_names
        .iter()
        .chain(&sealed_names)
        .map(|c| format!("\tconfidentiality? {c}"))
        .collect();
    format!(
        "attacker[passive]\n\nprincipal Alice[\n\tknows private k\n{}\n]\n\nprincipal Bob[\n\tknows private k\n]\n\nAlice -> Bob: {}\n\nqueries[\n{}\n]\n",
        alice.join("\n"),
        sent.join(", "),
        queries.join("\n")
    )
}
