//! Property-based tests for parsing and binding.

mod common;

use common::Fixture;
use odata_bind::binder::select_expand::{normalize_expand_tree, unify_select_expand};
use odata_bind::binder::QueryNode;
use odata_bind::parser::{parse_expand, parse_filter};
use odata_bind::types::Value;
use odata_bind::{BindError, BinderSettings, PrimitiveKind};
use proptest::prelude::*;

fn expand_term_strategy() -> impl Strategy<Value = String> {
    let navigation = prop_oneof![Just("Orders"), Just("BestFriend"), Just("Customer")];
    let select = proptest::option::of(prop_oneof![Just("Code"), Just("Name"), Just("Id")]);
    (navigation, select).prop_map(|(navigation, select)| match select {
        Some(select) => format!("{navigation}($select={select})"),
        None => navigation.to_string(),
    })
}

fn numeric_property() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("Quantity"), Just("Total"), Just("Price")]
}

fn is_convert(node: &QueryNode) -> bool {
    matches!(node, QueryNode::Convert(_))
}

fn nested_not(depth: usize) -> String {
    format!("{}true{}", "not (".repeat(depth), ")".repeat(depth))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: normalizing an expand tree twice changes nothing the second time
    #[test]
    fn test_normalization_is_idempotent(terms in proptest::collection::vec(expand_term_strategy(), 1..6)) {
        let expand = parse_expand(&terms.join(",")).expect("generated expand parses");
        let tree = unify_select_expand(None, Some(expand));
        let once = normalize_expand_tree(&tree);
        prop_assert_eq!(normalize_expand_tree(&once), once);
    }

    /// Property: merged expansions never repeat a path
    #[test]
    fn test_normalized_expansions_are_unique(terms in proptest::collection::vec(expand_term_strategy(), 1..6)) {
        let expand = parse_expand(&terms.join(",")).expect("generated expand parses");
        let normalized = normalize_expand_tree(&unify_select_expand(None, Some(expand)));
        let paths: Vec<String> = normalized
            .options
            .expand
            .iter()
            .flat_map(|e| e.terms.iter().map(|t| t.path.to_path_string()))
            .collect();
        let mut unique = paths.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(paths.len(), unique.len());
    }

    /// Property: mixed numeric operands get exactly one conversion, equal ones none
    #[test]
    fn test_promotion_is_deterministic(
        left in numeric_property(),
        right in numeric_property(),
        operator in prop_oneof![Just("eq"), Just("ne"), Just("lt"), Just("ge")],
    ) {
        let fixture = Fixture::new();
        let clause = fixture
            .filter("Orders", &format!("{left} {operator} {right}"))
            .unwrap();
        let QueryNode::BinaryOperator(op) = clause.expression else {
            panic!("expected a comparison");
        };
        let converts = usize::from(is_convert(&op.left)) + usize::from(is_convert(&op.right));
        prop_assert_eq!(converts, usize::from(left != right));
    }

    /// Property: any 32-bit integer compares with an Int32 property
    #[test]
    fn test_int32_literals_bind(n in any::<i32>()) {
        let fixture = Fixture::new();
        let clause = fixture.filter("Orders", &format!("Quantity eq {n}"));
        prop_assert!(clause.is_ok(), "{:?}", clause);
    }

    /// Property: any 64-bit integer compares with an Int64 property
    #[test]
    fn test_int64_literals_bind(n in any::<i64>()) {
        let fixture = Fixture::new();
        let clause = fixture.filter("Orders", &format!("Total lt {n}"));
        prop_assert!(clause.is_ok(), "{:?}", clause);
    }

    /// Property: a quoted string keeps its text and needs no conversion
    #[test]
    fn test_string_literals_keep_text(text in "[A-Za-z0-9 ]{0,24}") {
        let fixture = Fixture::new();
        let clause = fixture.filter("Customers", &format!("Name eq '{text}'")).unwrap();
        let QueryNode::BinaryOperator(op) = clause.expression else {
            panic!("expected a comparison");
        };
        match *op.right {
            QueryNode::Constant(constant) => {
                prop_assert_eq!(constant.value, Value::String(text));
                prop_assert!(constant
                    .type_ref
                    .unwrap()
                    .is_primitive_kind(PrimitiveKind::String));
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    /// Property: shallow nesting binds under the default limit
    #[test]
    fn test_shallow_nesting_binds(depth in 0usize..12) {
        let fixture = Fixture::new();
        prop_assert!(fixture.filter("Customers", &nested_not(depth)).is_ok());
    }

    /// Property: deep nesting trips a small recursion limit
    #[test]
    fn test_deep_nesting_is_rejected(depth in 10usize..40) {
        let fixture = Fixture::with_settings(BinderSettings::new().with_filter_limit(5));
        let result = fixture.filter("Customers", &nested_not(depth));
        prop_assert_eq!(result, Err(BindError::TooDeepRecursion { limit: 5 }));
    }

    /// Property: the parser returns an error instead of panicking on noise
    #[test]
    fn test_parser_never_panics(text in "[ -~]{0,40}") {
        let _ = parse_filter(&text);
    }

    /// Property: unknown property names are reported, never bound
    #[test]
    fn test_undeclared_properties_are_rejected(name in "Zz[a-z]{1,10}") {
        let fixture = Fixture::new();
        let result = fixture.filter("Customers", &format!("{name} eq 1"));
        let is_not_declared = matches!(result, Err(BindError::PropertyNotDeclared { .. }));
        prop_assert!(is_not_declared);
    }
}
