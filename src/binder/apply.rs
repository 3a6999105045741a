//! `$apply` pipeline binding.
//!
//! Transformations run in order. Each one is bound against the shape left by
//! its predecessor: `aggregate` and `groupby` replace the shape with a
//! synthetic type and collapse the scope to the names they produce, `filter`
//! keeps it, and `compute` adds properties to it.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::binder::clause::{
    AggregateExpression, AggregationMethod, ApplyClause, GroupByPropertyNode, TransformationNode,
};
use crate::binder::compute::bind_compute;
use crate::binder::filter::bind_filter;
use crate::binder::metadata::{MetadataBinder, TokenBinder};
use crate::binder::node::QueryNode;
use crate::binder::state::{BindingState, RangeVariable};
use crate::error::{BindError, Result};
use crate::parser::{
    AggregateExpressionToken, AggregateToken, ApplyToken, GroupByToken, QueryToken,
    TransformationToken,
};
use crate::types::{PrimitiveKind, SyntheticType, SyntheticTypeBuilder, TypeRef};

/// Shape of the data flowing between two transformations.
#[derive(Debug, Clone)]
struct PipelineScope {
    type_ref: TypeRef,
    navigation_source: Option<String>,
    collapsed: bool,
    names: Vec<String>,
    computed: IndexMap<String, Option<TypeRef>>,
}

impl PipelineScope {
    fn binder<'m>(&self, parent: &BindingState<'m>) -> MetadataBinder<'m> {
        let variable = RangeVariable::implicit(self.type_ref.clone(), self.navigation_source.clone());
        let mut state = parent.child(variable, parent.limit());
        if self.collapsed {
            state.collapse(self.names.clone());
        }
        for (alias, type_ref) in &self.computed {
            state.add_computed_property(alias.clone(), type_ref.clone());
        }
        MetadataBinder::new(state)
    }

    fn collapse(&mut self, type_ref: TypeRef, names: Vec<String>) {
        self.type_ref = type_ref;
        self.navigation_source = None;
        self.collapsed = true;
        self.names = names;
        self.computed.clear();
    }
}

/// Binds an `$apply` pipeline over the implicit `$it` of the binder's state.
///
/// # Errors
///
/// Returns the first error raised by a transformation, e.g.
/// `UnsupportedAggregateVerb` or `GroupByPropertyNotPropertyAccessValue`.
pub fn bind_apply<'m>(binder: &mut dyn TokenBinder<'m>, token: &ApplyToken) -> Result<ApplyClause> {
    let parent = binder.state().clone();
    let type_ref = parent
        .implicit_range_variable()
        .and_then(|v| v.type_ref.clone())
        .ok_or_else(|| BindError::ImplicitRangeVariableMissing {
            identifier: "$apply".into(),
        })?;
    let mut scope = PipelineScope {
        type_ref,
        navigation_source: parent
            .implicit_range_variable()
            .and_then(|v| v.navigation_source.clone()),
        collapsed: parent.is_collapsed(),
        names: parent.aggregated_property_names().to_vec(),
        computed: parent.computed_properties().clone(),
    };
    debug!(
        transformations = token.transformations.len(),
        "binding $apply"
    );

    let mut transformations = Vec::with_capacity(token.transformations.len());
    for transformation in &token.transformations {
        let mut stage = scope.binder(&parent);
        let node = match transformation {
            TransformationToken::Aggregate(aggregate) => {
                let expressions = bind_aggregate(&mut stage, aggregate)?;
                let result_type = aggregate_type("Aggregation", &expressions);
                let names = expressions.iter().map(|e| e.alias.clone()).collect();
                scope.collapse(result_type.clone(), names);
                TransformationNode::Aggregate {
                    expressions,
                    result_type,
                }
            }
            TransformationToken::GroupBy(group_by) => {
                let (properties, child) = bind_group_by(&mut stage, group_by)?;
                let mut builder = group_type("GroupBy", &properties);
                for expression in child.iter().flatten() {
                    builder.insert(expression.alias.clone(), expression.type_ref.clone());
                }
                let result_type = TypeRef::synthetic(Arc::new(builder.build()));
                let names = properties
                    .iter()
                    .map(|p| p.name.clone())
                    .chain(child.iter().flatten().map(|e| e.alias.clone()))
                    .collect();
                scope.collapse(result_type.clone(), names);
                TransformationNode::GroupBy {
                    properties,
                    child,
                    result_type,
                }
            }
            TransformationToken::Filter(predicate) => {
                TransformationNode::Filter(bind_filter(&mut stage, predicate)?)
            }
            TransformationToken::Compute(compute) => {
                let clause = bind_compute(&mut stage, compute)?;
                if let Some(current) = scope.type_ref.as_synthetic().cloned() {
                    let mut builder = SyntheticType::builder(current.name()).extend_from(&current);
                    for item in &clause.items {
                        if let Some(type_ref) = &item.type_ref {
                            builder.insert(item.alias.clone(), type_ref.clone());
                        }
                        scope.names.push(item.alias.clone());
                    }
                    scope.type_ref = TypeRef::synthetic(Arc::new(builder.build()));
                } else {
                    for item in &clause.items {
                        scope
                            .computed
                            .insert(item.alias.clone(), item.type_ref.clone());
                    }
                }
                TransformationNode::Compute {
                    clause,
                    result_type: scope.type_ref.clone(),
                }
            }
        };
        transformations.push(node);
    }

    Ok(ApplyClause {
        transformations,
        result_type: scope.type_ref,
        collapsed: scope.collapsed,
        aggregated_property_names: scope.names,
        computed: scope.computed,
    })
}

/// Returns a state over the shape `clause` produces, for the options bound
/// after `$apply`.
pub(crate) fn state_after_apply<'m>(state: &BindingState<'m>, clause: &ApplyClause) -> BindingState<'m> {
    let navigation_source = if clause.collapsed {
        None
    } else {
        state
            .implicit_range_variable()
            .and_then(|v| v.navigation_source.clone())
    };
    let variable = RangeVariable::implicit(clause.result_type.clone(), navigation_source);
    let mut next = state.child(variable, state.limit());
    if clause.collapsed {
        next.collapse(clause.aggregated_property_names.clone());
    }
    for (alias, type_ref) in &clause.computed {
        next.add_computed_property(alias.clone(), type_ref.clone());
    }
    next
}

fn aggregate_type(name: &str, expressions: &[AggregateExpression]) -> TypeRef {
    let builder = expressions
        .iter()
        .fold(SyntheticType::builder(name), |builder, e| {
            builder.property(e.alias.clone(), e.type_ref.clone())
        });
    TypeRef::synthetic(Arc::new(builder.build()))
}

fn bind_aggregate<'m>(
    binder: &mut dyn TokenBinder<'m>,
    token: &AggregateToken,
) -> Result<Vec<AggregateExpression>> {
    token
        .expressions
        .iter()
        .map(|expression| bind_aggregate_expression(binder, expression))
        .collect()
}

fn bind_aggregate_expression<'m>(
    binder: &mut dyn TokenBinder<'m>,
    token: &AggregateExpressionToken,
) -> Result<AggregateExpression> {
    let (expression, verb, alias) = match token {
        AggregateExpressionToken::Count { alias } => {
            return Ok(AggregateExpression {
                expression: None,
                method: AggregationMethod::VirtualPropertyCount,
                alias: alias.clone(),
                type_ref: TypeRef::int64(false),
            });
        }
        AggregateExpressionToken::Value {
            expression,
            method,
            alias,
        } => (expression, method, alias),
    };

    let node = binder.bind(expression)?;
    let scalar = node.type_ref().map_or(true, TypeRef::is_scalar);
    if !node.is_single() || !scalar {
        return Err(BindError::AggregateExpressionNotSingleValue {
            expression: alias.clone(),
        });
    }
    let (method, type_ref) = aggregate_result(verb, alias, node.type_ref())?;
    debug!(alias = %alias, method = verb.as_str(), result = %type_ref, "bound aggregate");
    Ok(AggregateExpression {
        expression: Some(node),
        method,
        alias: alias.clone(),
        type_ref,
    })
}

/// Resolves the method and result type of `expression with verb as alias`.
fn aggregate_result(
    verb: &str,
    alias: &str,
    source: Option<&TypeRef>,
) -> Result<(AggregationMethod, TypeRef)> {
    let untyped = || TypeRef::double(true);
    let incompatible = |t: &TypeRef| BindError::AggregateExpressionIncompatibleType {
        expression: alias.to_string(),
        type_name: t.full_name(),
        method: verb.to_string(),
    };
    let is_numeric = |t: &TypeRef| t.as_primitive().is_some_and(|k| k.is_numeric());

    Ok(match verb {
        "sum" => {
            let type_ref = match source {
                Some(t) if is_numeric(t) => t.clone(),
                Some(t) => return Err(incompatible(t)),
                None => untyped(),
            };
            (AggregationMethod::Sum, type_ref)
        }
        "min" | "max" => {
            let method = if verb == "min" {
                AggregationMethod::Min
            } else {
                AggregationMethod::Max
            };
            (method, source.cloned().unwrap_or_else(untyped))
        }
        "average" => {
            let type_ref = match source {
                Some(t) if t.is_primitive_kind(PrimitiveKind::Decimal) => t.clone(),
                Some(t) if is_numeric(t) => TypeRef::double(t.nullable),
                Some(t) => return Err(incompatible(t)),
                None => untyped(),
            };
            (AggregationMethod::Average, type_ref)
        }
        "countdistinct" => (AggregationMethod::CountDistinct, TypeRef::int64(false)),
        custom if custom.contains('.') => (
            AggregationMethod::Custom(custom.to_string()),
            source.cloned().unwrap_or_else(untyped),
        ),
        other => {
            return Err(BindError::UnsupportedAggregateVerb {
                verb: other.to_string(),
            })
        }
    })
}

type GroupByResult = (Vec<GroupByPropertyNode>, Option<Vec<AggregateExpression>>);

fn bind_group_by<'m>(binder: &mut dyn TokenBinder<'m>, token: &GroupByToken) -> Result<GroupByResult> {
    let mut properties: Vec<GroupByPropertyNode> = Vec::new();
    for property in &token.properties {
        let path = property_path(property).ok_or_else(|| {
            BindError::GroupByPropertyNotPropertyAccessValue {
                property: property.kind_name().to_string(),
            }
        })?;
        let node = binder.bind(property)?;
        if !is_group_key(&node) {
            return Err(BindError::GroupByPropertyNotPropertyAccessValue {
                property: path.join("/"),
            });
        }
        insert_group_path(&mut properties, &path, node);
    }
    let child = token
        .child
        .as_ref()
        .map(|aggregate| bind_aggregate(binder, aggregate))
        .transpose()?;
    Ok((properties, child))
}

fn is_group_key(node: &QueryNode) -> bool {
    matches!(
        node,
        QueryNode::SingleValuePropertyAccess(_)
            | QueryNode::SingleComplexProperty(_)
            | QueryNode::SingleValueOpenPropertyAccess(_)
            | QueryNode::SingleNavigation(_)
    )
}

/// Returns the segments of a plain member path in declaration order.
fn property_path(token: &QueryToken) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = Some(token);
    while let Some(token) = current {
        current = match token {
            QueryToken::EndPath(p) => {
                segments.push(p.identifier.clone());
                p.next.as_deref()
            }
            QueryToken::InnerPath(p) if p.named_values.is_empty() => {
                segments.push(p.identifier.clone());
                p.next.as_deref()
            }
            _ => return None,
        };
    }
    segments.reverse();
    Some(segments)
}

fn insert_group_path(nodes: &mut Vec<GroupByPropertyNode>, path: &[String], expression: QueryNode) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    let index = match nodes.iter().position(|n| &n.name == head) {
        Some(index) => index,
        None => {
            nodes.push(GroupByPropertyNode {
                name: head.clone(),
                expression: None,
                type_ref: None,
                children: Vec::new(),
            });
            nodes.len() - 1
        }
    };
    let node = &mut nodes[index];
    if rest.is_empty() {
        node.type_ref = expression.type_ref().cloned();
        node.expression = Some(expression);
    } else {
        insert_group_path(&mut node.children, rest, expression);
    }
}

/// Builds one synthetic level per path segment.
fn group_type(name: &str, nodes: &[GroupByPropertyNode]) -> SyntheticTypeBuilder {
    let mut builder = SyntheticType::builder(name);
    for node in nodes {
        if node.children.is_empty() {
            if let Some(type_ref) = &node.type_ref {
                builder.insert(node.name.clone(), type_ref.clone());
            }
        } else {
            let nested = group_type(&node.name, &node.children).build();
            builder.insert(node.name.clone(), TypeRef::synthetic(Arc::new(nested)));
        }
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::DefaultUriResolver;
    use crate::config::{BinderContext, BinderSettings};
    use crate::model::{FunctionRegistry, Model, StructuredType};
    use crate::parser::parse_apply;

    fn model() -> Model {
        Model::builder()
            .structured_type(
                StructuredType::complex("Shop.Address")
                    .property("City", TypeRef::string())
                    .property("Country", TypeRef::string()),
            )
            .structured_type(
                StructuredType::entity("Shop.Order")
                    .key(["Id"])
                    .property("Id", TypeRef::int32(false))
                    .property("Amount", TypeRef::decimal(true))
                    .property("Quantity", TypeRef::int32(true))
                    .property("Status", TypeRef::string())
                    .property("ShipTo", TypeRef::complex("Shop.Address", true)),
            )
            .build()
            .unwrap()
    }

    fn bind(model: &Model, text: &str) -> Result<ApplyClause> {
        let resolver = DefaultUriResolver::new();
        let settings = BinderSettings::default();
        let functions = FunctionRegistry::new();
        let context = BinderContext::new(model, &resolver, &settings, &functions);
        let state = BindingState::new(context, 100).with_implicit_range_variable(
            RangeVariable::implicit(TypeRef::entity("Shop.Order", false), Some("Orders".into())),
        );
        let mut binder = MetadataBinder::new(state);
        bind_apply(&mut binder, &parse_apply(text)?)
    }

    fn property<'a>(clause: &'a ApplyClause, name: &str) -> Option<&'a TypeRef> {
        clause.result_type.as_synthetic()?.property(name)
    }

    #[test]
    fn test_aggregate_verb_typing() {
        let model = model();
        let clause = bind(
            &model,
            "aggregate(Amount with sum as Total,Amount with average as AvgAmount,Amount with countdistinct as Cnt,Quantity with average as AvgQty)",
        )
        .unwrap();
        assert!(property(&clause, "Total").unwrap().is_primitive_kind(PrimitiveKind::Decimal));
        assert!(property(&clause, "AvgAmount").unwrap().is_primitive_kind(PrimitiveKind::Decimal));
        let count = property(&clause, "Cnt").unwrap();
        assert!(count.is_primitive_kind(PrimitiveKind::Int64));
        assert!(!count.nullable);
        assert!(property(&clause, "AvgQty").unwrap().is_primitive_kind(PrimitiveKind::Double));
        assert!(clause.collapsed);
        assert_eq!(clause.aggregated_property_names, vec!["Total", "AvgAmount", "Cnt", "AvgQty"]);
    }

    #[test]
    fn test_unsupported_and_incompatible_verbs() {
        let model = model();
        assert!(matches!(
            bind(&model, "aggregate(Amount with median as M)"),
            Err(BindError::UnsupportedAggregateVerb { .. })
        ));
        assert!(matches!(
            bind(&model, "aggregate(Status with average as A)"),
            Err(BindError::AggregateExpressionIncompatibleType { .. })
        ));
        let custom = bind(&model, "aggregate(Amount with Shop.median as M)").unwrap();
        assert!(property(&custom, "M").unwrap().is_primitive_kind(PrimitiveKind::Decimal));
    }

    #[test]
    fn test_group_by_nests_paths_and_merges_aggregates() {
        let model = model();
        let clause = bind(
            &model,
            "groupby((Status,ShipTo/City),aggregate($count as Count))",
        )
        .unwrap();
        let TransformationNode::GroupBy { properties, .. } = &clause.transformations[0] else {
            panic!("expected groupby");
        };
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[1].name, "ShipTo");
        assert_eq!(properties[1].children[0].name, "City");

        let ship_to = property(&clause, "ShipTo").unwrap().as_synthetic().unwrap();
        assert!(ship_to.property("City").is_some());
        assert!(property(&clause, "Count").unwrap().is_primitive_kind(PrimitiveKind::Int64));
        assert_eq!(clause.aggregated_property_names, vec!["Status", "ShipTo", "Count"]);
    }

    #[test]
    fn test_collapsed_scope_rejects_other_properties() {
        let model = model();
        assert!(bind(&model, "groupby((Status))/filter(Status eq 'Open')").is_ok());
        assert!(matches!(
            bind(&model, "groupby((Status))/filter(Amount gt 1)"),
            Err(BindError::GroupByPropertyNotPropertyAccessValue { .. })
        ));
    }

    #[test]
    fn test_compute_then_filter_sees_alias() {
        let model = model();
        let clause = bind(&model, "compute(Amount mul 2 as Doubled)/filter(Doubled gt 10)").unwrap();
        assert!(!clause.collapsed);
        assert!(clause.computed.contains_key("Doubled"));
        assert_eq!(clause.transformations.len(), 2);
    }
}
