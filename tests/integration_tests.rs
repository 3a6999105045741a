//! End-to-end tests: raw query options in, bound clauses out.

mod common;

use common::Fixture;
use odata_bind::binder::{QueryNode, SelectItem, SelectSegment, TransformationNode};
use odata_bind::parser::OrderDirection;
use odata_bind::{BindError, BinderSettings, PrimitiveKind, QueryBinder};

// =============================================================================
// Option handling
// =============================================================================

mod option_tests {
    use super::*;

    #[test]
    fn test_unknown_entity_set() {
        let fixture = Fixture::new();
        let result = QueryBinder::new(fixture.context(), "Suppliers", [("$top", "1")]);
        assert!(matches!(result, Err(BindError::EntitySetNotFound { ref name }) if name == "Suppliers"));
    }

    #[test]
    fn test_default_recursion_limit_stops_deep_filters() {
        let fixture = Fixture::new();
        let nested = |depth: usize| format!("{}true", "not ".repeat(depth));
        assert!(fixture.filter("Customers", &nested(700)).is_ok());
        assert_eq!(
            fixture.filter("Customers", &nested(800)),
            Err(BindError::TooDeepRecursion { limit: 800 })
        );
        assert_eq!(
            fixture.filter("Customers", &nested(3000)),
            Err(BindError::TooDeepRecursion { limit: 800 })
        );
    }

    #[test]
    fn test_absent_options_bind_to_none() {
        let fixture = Fixture::new();
        let binder = fixture.binder("Customers", &[]);
        assert!(binder.parse_filter().unwrap().is_none());
        assert!(binder.parse_order_by().unwrap().is_none());
        assert!(binder.parse_select_and_expand().unwrap().is_none());
        assert!(binder.parse_apply().unwrap().is_none());
        assert!(binder.parse_compute().unwrap().is_none());
        assert!(binder.parse_search().unwrap().is_none());
        assert!(binder.parse_top().unwrap().is_none());
    }

    #[test]
    fn test_paging_and_count_options() {
        let fixture = Fixture::new();
        let binder = fixture.binder(
            "Customers",
            &[("$top", "10"), ("$skip", "20"), ("$count", "true")],
        );
        assert_eq!(binder.parse_top().unwrap(), Some(10));
        assert_eq!(binder.parse_skip().unwrap(), Some(20));
        assert_eq!(binder.parse_count().unwrap(), Some(true));

        let binder = fixture.binder("Customers", &[("$top", "-1"), ("$count", "yes")]);
        assert!(matches!(binder.parse_top(), Err(BindError::InvalidLiteral { .. })));
        assert!(matches!(binder.parse_count(), Err(BindError::InvalidLiteral { .. })));
    }

    #[test]
    fn test_options_without_dollar_prefix() {
        let fixture = Fixture::new();
        let binder = fixture.binder("Customers", &[("filter", "Name eq 'a'")]);
        assert!(binder.parse_filter().unwrap().is_none());

        let fixture =
            Fixture::with_settings(BinderSettings::new().with_no_dollar_query_options(true));
        let binder = fixture.binder("Customers", &[("filter", "Name eq 'a'")]);
        assert!(binder.parse_filter().unwrap().is_some());
    }

    #[test]
    fn test_case_insensitive_names() {
        let fixture = Fixture::new();
        assert!(matches!(
            fixture.filter("Customers", "name eq 'a'"),
            Err(BindError::PropertyNotDeclared { .. })
        ));

        let fixture = Fixture::with_settings(BinderSettings::new().with_case_insensitive(true));
        let clause = fixture.filter("Customers", "name eq 'a'").unwrap();
        let QueryNode::BinaryOperator(op) = &clause.expression else {
            panic!("expected a comparison");
        };
        assert!(matches!(
            op.left.as_ref(),
            QueryNode::SingleValuePropertyAccess(p) if p.property == "Name"
        ));
    }

    #[test]
    fn test_parse_errors_surface() {
        let fixture = Fixture::new();
        assert!(matches!(
            fixture.filter("Customers", "Name eq"),
            Err(BindError::ParseError { .. })
        ));
    }
}

// =============================================================================
// Parameter aliases
// =============================================================================

mod alias_tests {
    use super::*;

    #[test]
    fn test_alias_takes_type_of_value() {
        let fixture = Fixture::new();
        let binder = fixture.binder(
            "Customers",
            &[("$filter", "Name eq @n or Name ne @n"), ("@n", "'Bob'")],
        );
        let clause = binder.parse_filter().unwrap().unwrap();
        let QueryNode::BinaryOperator(or) = &clause.expression else {
            panic!("expected or");
        };
        let QueryNode::BinaryOperator(eq) = or.left.as_ref() else {
            panic!("expected eq");
        };
        let QueryNode::ParameterAlias(alias) = eq.right.as_ref() else {
            panic!("expected a parameter alias");
        };
        assert_eq!(alias.alias, "@n");
        assert!(alias
            .type_ref
            .as_ref()
            .unwrap()
            .is_primitive_kind(PrimitiveKind::String));

        let query = binder.bind().unwrap();
        assert!(query.aliases.contains_key("@n"));
    }

    #[test]
    fn test_alias_collection_on_right_of_in() {
        let fixture = Fixture::new();
        let binder = fixture.binder(
            "Orders",
            &[("$filter", "Quantity in @q"), ("@q", "[1,2,3]")],
        );
        let clause = binder.parse_filter().unwrap().unwrap();
        let QueryNode::In(node) = &clause.expression else {
            panic!("expected in");
        };
        let QueryNode::CollectionConstant(list) = node.right.as_ref() else {
            panic!("expected a literal collection");
        };
        assert_eq!(list.items.len(), 3);
    }

    #[test]
    fn test_missing_alias() {
        let fixture = Fixture::new();
        let binder = fixture.binder("Customers", &[("$filter", "Name eq @missing")]);
        assert!(matches!(
            binder.parse_filter(),
            Err(BindError::ParameterAliasNotFound { ref alias }) if alias == "@missing"
        ));
    }
}

// =============================================================================
// $orderby and $search
// =============================================================================

mod order_by_tests {
    use super::*;

    #[test]
    fn test_order_by_chain() {
        let fixture = Fixture::new();
        let binder = fixture.binder("Customers", &[("$orderby", "Name desc, Age")]);
        let clause = binder.parse_order_by().unwrap().unwrap();
        assert_eq!(clause.direction, OrderDirection::Descending);
        let then_by = clause.then_by.as_deref().unwrap();
        assert_eq!(then_by.direction, OrderDirection::Ascending);
        assert!(then_by.then_by.is_none());
        assert_eq!(clause.iter().count(), 2);
    }

    #[test]
    fn test_order_by_rejects_collections() {
        let fixture = Fixture::new();
        let binder = fixture.binder("Customers", &[("$orderby", "Orders")]);
        assert!(matches!(
            binder.parse_order_by(),
            Err(BindError::OrderByExpressionNotSingleValue)
        ));
    }

    #[test]
    fn test_order_by_reports_last_failing_key() {
        let fixture = Fixture::new();
        let binder = fixture.binder("Customers", &[("$orderby", "Rank desc, Name, Score")]);
        assert!(matches!(
            binder.parse_order_by(),
            Err(BindError::PropertyNotDeclared { ref property, .. }) if property == "Score"
        ));
    }

    #[test]
    fn test_search() {
        let fixture = Fixture::new();
        let binder = fixture.binder("Customers", &[("$search", "blue OR NOT green")]);
        let clause = binder.parse_search().unwrap().unwrap();
        assert!(matches!(clause.expression, QueryNode::BinaryOperator(_)));
    }
}

// =============================================================================
// $apply and $compute
// =============================================================================

mod aggregation_tests {
    use super::*;

    #[test]
    fn test_group_by_reshapes_later_options() {
        let fixture = Fixture::new();
        let binder = fixture.binder(
            "Orders",
            &[
                ("$apply", "groupby((Status),aggregate(Price with sum as Revenue))"),
                ("$filter", "Revenue gt 100"),
                ("$orderby", "Revenue desc"),
            ],
        );
        let apply = binder.parse_apply().unwrap().unwrap();
        assert!(apply.collapsed);
        assert!(matches!(apply.transformations[0], TransformationNode::GroupBy { .. }));
        assert_eq!(apply.aggregated_property_names, vec!["Status", "Revenue"]);

        let filter = binder.parse_filter().unwrap().unwrap();
        let QueryNode::BinaryOperator(op) = &filter.expression else {
            panic!("expected a comparison");
        };
        assert!(op
            .left
            .type_ref()
            .unwrap()
            .is_primitive_kind(PrimitiveKind::Decimal));
        assert!(filter.range_variable.navigation_source.is_none());
        assert!(binder.parse_order_by().unwrap().is_some());
    }

    #[test]
    fn test_group_by_hides_other_properties() {
        let fixture = Fixture::new();
        let binder = fixture.binder(
            "Orders",
            &[
                ("$apply", "groupby((Status))"),
                ("$filter", "Quantity gt 1"),
            ],
        );
        assert!(matches!(
            binder.parse_filter(),
            Err(BindError::GroupByPropertyNotPropertyAccessValue { ref property }) if property == "Quantity"
        ));
    }

    #[test]
    fn test_count_aggregate() {
        let fixture = Fixture::new();
        let binder = fixture.binder("Orders", &[("$apply", "aggregate($count as Orders)")]);
        let apply = binder.parse_apply().unwrap().unwrap();
        let orders = apply
            .result_type
            .as_synthetic()
            .and_then(|t| t.property("Orders"))
            .unwrap();
        assert!(orders.is_primitive_kind(PrimitiveKind::Int64));
        assert!(!orders.nullable);
    }

    #[test]
    fn test_compute_aliases_are_visible() {
        let fixture = Fixture::new();
        let binder = fixture.binder(
            "Orders",
            &[
                ("$compute", "Price mul Quantity as Amount"),
                ("$filter", "Amount gt 100"),
                ("$orderby", "Amount desc"),
                ("$select", "Code,Amount"),
            ],
        );
        let compute = binder.parse_compute().unwrap().unwrap();
        assert_eq!(compute.items[0].alias, "Amount");
        assert!(compute.items[0]
            .type_ref
            .as_ref()
            .unwrap()
            .is_primitive_kind(PrimitiveKind::Decimal));

        let filter = binder.parse_filter().unwrap().unwrap();
        let QueryNode::BinaryOperator(op) = &filter.expression else {
            panic!("expected a comparison");
        };
        assert!(matches!(
            op.left.as_ref(),
            QueryNode::SingleValueOpenPropertyAccess(o) if o.name == "Amount"
        ));

        let select = binder.parse_select_and_expand().unwrap().unwrap();
        assert!(select.selected_paths().any(|p| matches!(
            p.segments.as_slice(),
            [SelectSegment::Dynamic(name)] if name == "Amount"
        )));
    }

    #[test]
    fn test_compute_requires_single_values() {
        let fixture = Fixture::new();
        let binder = fixture.binder("Customers", &[("$compute", "Orders as Mine")]);
        assert!(matches!(
            binder.parse_compute(),
            Err(BindError::ComputeExpressionNotSingleValue { ref alias }) if alias == "Mine"
        ));
    }

    #[test]
    fn test_bind_all_options() {
        let fixture = Fixture::new();
        let binder = fixture.binder(
            "Orders",
            &[
                ("$filter", "Quantity gt 1"),
                ("$orderby", "Placed desc"),
                ("$expand", "Customer($select=Name)"),
                ("$search", "rush"),
            ],
        );
        let query = binder.bind().unwrap();
        assert!(query.filter.is_some());
        assert!(query.order_by.is_some());
        assert!(query.select_expand.is_some());
        assert!(query.search.is_some());
        assert!(query.apply.is_none());
        assert!(query.compute.is_none());
    }
}

// =============================================================================
// $select and $expand
// =============================================================================

mod select_expand_tests {
    use super::*;
    use odata_bind::binder::SelectExpandClause;

    fn bind(fixture: &Fixture, options: &[(&str, &str)]) -> odata_bind::Result<SelectExpandClause> {
        fixture
            .binder("Customers", options)
            .parse_select_and_expand()
            .map(|clause| clause.expect("$select or $expand is present"))
    }

    #[test]
    fn test_select_properties() {
        let fixture = Fixture::new();
        let clause = bind(&fixture, &[("$select", "Name,Age")]).unwrap();
        assert!(!clause.all_selected);
        let paths: Vec<String> = clause.selected_paths().map(|p| p.path_string()).collect();
        assert_eq!(paths, vec!["Name", "Age"]);
    }

    #[test]
    fn test_wildcards() {
        let fixture = Fixture::new();
        let clause = bind(&fixture, &[("$select", "*")]).unwrap();
        assert!(clause.all_selected);
        assert!(matches!(clause.items[0], SelectItem::Wildcard));

        let clause = bind(&fixture, &[("$select", "Shop.*")]).unwrap();
        assert!(matches!(
            &clause.items[0],
            SelectItem::NamespaceQualifiedWildcard(ns) if ns == "Shop"
        ));

        assert!(matches!(
            bind(&fixture, &[("$select", "Other.*")]),
            Err(BindError::NamespaceNotFound { .. })
        ));
        assert!(matches!(
            bind(&fixture, &[("$select", "Address/*")]),
            Err(BindError::InvalidWildcard { .. })
        ));
    }

    #[test]
    fn test_select_operation_and_complex_nesting() {
        let fixture = Fixture::new();
        let clause = bind(&fixture, &[("$select", "Shop.IsVip")]).unwrap();
        assert!(clause.selected_paths().any(|p| matches!(
            p.segments.as_slice(),
            [SelectSegment::Operation(name)] if name == "Shop.IsVip"
        )));

        let clause = bind(&fixture, &[("$select", "Address($select=City)")]).unwrap();
        let address = clause.selected_paths().next().unwrap();
        let nested = address.select.as_deref().unwrap();
        assert_eq!(nested.selected_paths().count(), 1);
    }

    #[test]
    fn test_select_errors() {
        let fixture = Fixture::new();
        assert!(matches!(
            bind(&fixture, &[("$select", "$ref")]),
            Err(BindError::SystemTokenInSelect { .. })
        ));
        assert!(matches!(
            bind(&fixture, &[("$select", "Orders/Code")]),
            Err(BindError::NavigationNotLastInSelect { .. })
        ));
        assert!(matches!(
            bind(&fixture, &[("$select", "Orders($top=1)")]),
            Err(BindError::QueryOptionNestedUnderNavigation { .. })
        ));
        assert!(matches!(
            bind(&fixture, &[("$select", "Nickname")]),
            Err(BindError::PropertyNotDeclared { .. })
        ));
    }

    #[test]
    fn test_expanded_navigation_is_selected() {
        let fixture = Fixture::new();
        let clause = bind(&fixture, &[("$select", "Name"), ("$expand", "Orders")]).unwrap();
        let expanded = clause.expanded().next().unwrap();
        assert_eq!(expanded.path_string(), "Orders");
        assert_eq!(expanded.navigation_source.as_deref(), Some("Orders"));

        let paths: Vec<String> = clause.selected_paths().map(|p| p.path_string()).collect();
        assert!(paths.contains(&"Name".to_string()));
        assert!(paths.contains(&"Orders".to_string()));
    }

    #[test]
    fn test_expand_options_bind_against_target() {
        let fixture = Fixture::new();
        let clause = bind(
            &fixture,
            &[(
                "$expand",
                "Orders($filter=Quantity gt 1;$orderby=Price desc;$top=5;$count=true;$select=Code)",
            )],
        )
        .unwrap();
        let expanded = clause.expanded().next().unwrap();
        let options = &expanded.options;
        assert!(options.filter.is_some());
        assert_eq!(
            options.order_by.as_ref().map(|o| o.direction),
            Some(OrderDirection::Descending)
        );
        assert_eq!(options.top, Some(5));
        assert_eq!(options.count, Some(true));

        let nested = expanded.select_expand.as_deref().unwrap();
        let paths: Vec<String> = nested.selected_paths().map(|p| p.path_string()).collect();
        assert_eq!(paths, vec!["Code"]);

        assert!(matches!(
            bind(&fixture, &[("$expand", "Orders($filter=Name eq 'x')")]),
            Err(BindError::PropertyNotDeclared { .. })
        ));
    }

    #[test]
    fn test_reference_and_count_expansions() {
        let fixture = Fixture::new();
        let clause = bind(&fixture, &[("$expand", "Orders/$ref")]).unwrap();
        assert!(matches!(
            &clause.items[0],
            SelectItem::ExpandedReference(item) if item.select_expand.is_none()
        ));

        let clause = bind(&fixture, &[("$expand", "Orders/$count($filter=Quantity gt 1)")]).unwrap();
        assert!(matches!(
            &clause.items[0],
            SelectItem::ExpandedCount(item) if item.options.filter.is_some()
        ));

        assert!(matches!(
            bind(&fixture, &[("$expand", "Orders/$count($top=1)")]),
            Err(BindError::InvalidNestedOption { .. })
        ));
        assert!(matches!(
            bind(&fixture, &[("$expand", "Orders/$ref($select=Code)")]),
            Err(BindError::InvalidNestedOption { .. })
        ));
    }

    #[test]
    fn test_expand_star_and_casts() {
        let fixture = Fixture::new();
        let clause = bind(&fixture, &[("$expand", "*")]).unwrap();
        let mut names: Vec<String> = clause.expanded().map(|e| e.path_string()).collect();
        names.sort();
        assert_eq!(names, vec!["BestFriend", "Orders"]);

        let clause = bind(&fixture, &[("$expand", "Shop.VipCustomer/Orders")]).unwrap();
        let expanded = clause.expanded().next().unwrap();
        assert!(matches!(expanded.segments[0], SelectSegment::TypeCast(_)));
        assert_eq!(expanded.navigation_source.as_deref(), Some("Orders"));

        assert!(matches!(
            bind(&fixture, &[("$expand", "Name")]),
            Err(BindError::ExpandPathNotNavigation { .. })
        ));
    }

    #[test]
    fn test_contained_expansion_follows_root_binding() {
        let fixture = Fixture::new();
        let clause = fixture
            .binder("Events", &[("$expand", "Attendees($expand=BestFriend)")])
            .parse_select_and_expand()
            .unwrap()
            .unwrap();
        let attendees = clause.expanded().next().unwrap();
        assert!(attendees.navigation_source.is_none());
        let best_friend = attendees
            .select_expand
            .as_deref()
            .and_then(|nested| nested.expanded().next())
            .unwrap();
        assert_eq!(best_friend.navigation_source.as_deref(), Some("Customers"));

        let clause = fixture
            .binder("Events", &[("$expand", "Attendees($filter=BestFriend/Name eq 'Ann')")])
            .parse_select_and_expand()
            .unwrap()
            .unwrap();
        let filter = clause.expanded().next().unwrap().options.filter.as_ref().unwrap();
        let QueryNode::BinaryOperator(op) = &filter.expression else {
            panic!("expected a comparison");
        };
        let QueryNode::SingleValuePropertyAccess(name) = op.left.as_ref() else {
            panic!("expected a property access");
        };
        assert_eq!(name.source.navigation_source(), Some("Customers"));
    }

    #[test]
    fn test_duplicate_expansions_are_merged() {
        let fixture = Fixture::new();
        let clause = bind(
            &fixture,
            &[("$expand", "Orders($select=Code),Orders($select=Price)")],
        )
        .unwrap();
        assert_eq!(clause.expanded().count(), 1);
        let nested = clause
            .expanded()
            .next()
            .and_then(|e| e.select_expand.as_deref())
            .unwrap();
        assert_eq!(nested.selected_paths().count(), 2);
    }

    #[test]
    fn test_expansion_limits() {
        let fixture = Fixture::with_settings(BinderSettings::new().with_maximum_expansion_depth(1));
        assert!(bind(&fixture, &[("$expand", "Orders")]).is_ok());
        assert!(matches!(
            bind(&fixture, &[("$expand", "Orders($expand=Customer)")]),
            Err(BindError::ExpansionDepthExceeded { depth: 2, limit: 1 })
        ));

        let fixture =
            Fixture::with_settings(BinderSettings::new().with_maximum_expansion_count(1));
        assert!(matches!(
            bind(&fixture, &[("$expand", "Orders,BestFriend")]),
            Err(BindError::ExpansionCountExceeded { count: 2, limit: 1 })
        ));

        let fixture = Fixture::with_settings(BinderSettings::new().with_maximum_expansion_depth(3));
        assert!(bind(&fixture, &[("$expand", "BestFriend($levels=max)")]).is_ok());
        assert!(matches!(
            bind(&fixture, &[("$expand", "BestFriend($levels=5)")]),
            Err(BindError::ExpansionDepthExceeded { depth: 5, limit: 3 })
        ));
    }
}
