use proptest::prelude::*;
use verifpal_engine::inject::{match_skeletons, skeleton};
use verifpal_model::{value_hash, Primitive, PrimitiveId, Value, ValueIndex};
use verifpal_soundness::{arb_constant, arb_primitive_id, arb_value};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        .. ProptestConfig::default()
    })]

    #[test]
    fn equivalence_is_reflexive(v in arb_value()) {
        prop_assert!(v.equivalent(&v, true));
        prop_assert!(v.equivalent(&v.clone(), false));
    }

    #[test]
    fn equivalence_is_symmetric(a in arb_value(), b in arb_value()) {
        prop_assert_eq!(a.equivalent(&b, true), b.equivalent(&a, true));
    }

    #[test]
    fn equivalent_values_hash_alike(a in arb_value(), b in arb_value()) {
        if a.equivalent(&b, true) {
            prop_assert_eq!(value_hash(&a), value_hash(&b));
        }
    }

    #[test]
    fn dh_exponents_commute(x in arb_constant(), y in arb_constant()) {
        let xy = Value::equation(vec![Value::g(), x.clone(), y.clone()]);
        let yx = Value::equation(vec![Value::g(), y, x]);
        prop_assert!(xy.equivalent(&yx, true));
        prop_assert_eq!(value_hash(&xy), value_hash(&yx));
    }

    #[test]
    fn nested_equations_splice(x in arb_constant(), y in arb_constant()) {
        let nested = Value::equation(vec![Value::equation(vec![Value::g(), x.clone()]), y.clone()]);
        let flat = Value::equation(vec![Value::g(), x, y]);
        prop_assert!(nested.equivalent(&flat, true));
        prop_assert_eq!(nested.equation_len(), 3);
    }

    #[test]
    fn output_only_matters_when_considered(
        id in arb_primitive_id(),
        arguments in prop::collection::vec(arb_constant(), 1..=3),
    ) {
        let first = Primitive::new(id, arguments.clone(), 0, false);
        let second = Primitive::new(id, arguments, 1, false);
        prop_assert!(first.equivalent(&second, false));
        prop_assert!(!first.equivalent(&second, true));
    }

    #[test]
    fn skeleton_is_idempotent(id in arb_primitive_id(), arguments in prop::collection::vec(arb_value(), 1..=3)) {
        let p = Primitive::new(id, arguments, 0, true);
        let once = skeleton(&p);
        let twice = skeleton(&once);
        prop_assert!(once.equivalent(&twice, true));
        prop_assert!(match_skeletons(&p, &once));
        prop_assert!(!once.check);
    }

    #[test]
    fn value_index_finds_every_member(values in prop::collection::vec(arb_value(), 1..16)) {
        let index = ValueIndex::from_values(&values);
        for v in &values {
            let found = index.find(v, &values);
            prop_assert!(found.is_some());
            prop_assert!(values[found.unwrap()].equivalent(v, true));
        }
    }
}

#[test]
fn generator_and_nil_are_distinct() {
    assert!(!Value::g().equivalent(&Value::nil(), true));
    assert!(Value::g_nil().equivalent(&Value::equation(vec![Value::g(), Value::nil()]), true));
    let hash = Value::primitive(Primitive::new(PrimitiveId::Hash, vec![Value::nil()], 0, false));
    assert!(!hash.equivalent(&Value::nil(), true));
}
