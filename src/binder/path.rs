//! Member access paths: properties, navigations, casts, `$count` segments
//! and range variable references.
//!
//! Each segment is resolved against the declared type of the node bound
//! for its predecessor, or against `$it` when it has none.

use crate::binder::clause::{FilterClause, SearchClause};
use crate::binder::filter::bind_filter;
use crate::binder::function;
use crate::binder::key::bind_key_lookup;
use crate::binder::literal::bind_enum_literal;
use crate::binder::metadata::{MetadataBinder, TokenBinder};
use crate::binder::node::{
    ConvertNode, CountNode, NavigationNode, OpenPropertyAccessNode, PropertyAccessNode, QueryNode,
    ResourceCastNode,
};
use crate::binder::resolver::ResolvedProperty;
use crate::binder::search::bind_search;
use crate::binder::state::{BindingState, RangeVariable, IMPLICIT_RANGE_VARIABLE};
use crate::error::{BindError, Result};
use crate::model::{Model, NavigationProperty};
use crate::parser::{
    CountSegmentToken, DottedIdentifierToken, EndPathToken, FunctionParameterToken,
    InnerPathToken, QueryToken,
};
use crate::types::TypeRef;

/// Returns a reference to `$it`.
pub(crate) fn implicit_parent(state: &BindingState<'_>, identifier: &str) -> Result<QueryNode> {
    state
        .implicit_range_variable()
        .map(QueryNode::range_variable)
        .ok_or_else(|| BindError::ImplicitRangeVariableMissing {
            identifier: identifier.to_string(),
        })
}

fn bind_parent<'m>(
    binder: &mut dyn TokenBinder<'m>,
    next: Option<&QueryToken>,
    identifier: &str,
) -> Result<QueryNode> {
    match next {
        Some(token) => binder.bind(token),
        None => implicit_parent(binder.state(), identifier),
    }
}

/// Binds the last segment of a member path.
pub(crate) fn bind_end_path<'m>(
    binder: &mut dyn TokenBinder<'m>,
    token: &EndPathToken,
) -> Result<QueryNode> {
    if token.next.is_none() {
        if let Some(node) = bind_scoped_identifier(binder.state(), &token.identifier)? {
            return Ok(node);
        }
    }
    let parent = bind_parent(binder, token.next.as_deref(), &token.identifier)?;
    bind_segment(binder, parent, &token.identifier)
}

/// Binds an intermediate segment of a member path, including key predicates
/// and parenthesized bound function calls.
pub(crate) fn bind_inner_path<'m>(
    binder: &mut dyn TokenBinder<'m>,
    token: &InnerPathToken,
) -> Result<QueryNode> {
    if token.next.is_none() && token.named_values.is_empty() {
        if let Some(node) = bind_scoped_identifier(binder.state(), &token.identifier)? {
            return Ok(node);
        }
    }
    let parent = bind_parent(binder, token.next.as_deref(), &token.identifier)?;
    if token.named_values.is_empty() {
        return bind_segment(binder, parent, &token.identifier);
    }

    let context = binder.state().context();
    let property = match parent.type_ref() {
        Some(parent_type) if parent.is_single() => {
            context
                .resolver
                .resolve_property(context.model, parent_type, &token.identifier)?
        }
        _ => None,
    };
    match property {
        Some(ResolvedProperty::Navigation(nav)) if nav.is_collection => {
            let collection = navigation_node(binder.state(), parent, &nav);
            bind_key_lookup(binder, collection, &token.identifier, &token.named_values)
        }
        Some(_) => Err(BindError::KeyLookupOnlyOnEntityCollection {
            segment: token.identifier.clone(),
        }),
        None => {
            let arguments: Vec<FunctionParameterToken> = token
                .named_values
                .iter()
                .map(|v| FunctionParameterToken {
                    name: v.name.clone(),
                    value: Box::new(v.value.clone()),
                })
                .collect();
            function::bind_bound_operation(binder, parent, &token.identifier, &arguments)?
                .ok_or_else(|| BindError::KeyLookupOnlyOnEntityCollection {
                    segment: token.identifier.clone(),
                })
        }
    }
}

/// Resolves identifiers that name something in scope rather than a property
/// of `$it`: lambda variables and `$compute` aliases.
fn bind_scoped_identifier(state: &BindingState<'_>, identifier: &str) -> Result<Option<QueryNode>> {
    if state.has_lambda_variable(identifier) {
        return bind_range_variable(state, identifier).map(Some);
    }
    if let Some(type_ref) = state.computed_property(identifier) {
        let source = implicit_parent(state, identifier)?;
        return Ok(Some(QueryNode::SingleValueOpenPropertyAccess(
            OpenPropertyAccessNode {
                source: Box::new(source),
                name: identifier.to_string(),
                type_ref: type_ref.clone(),
            },
        )));
    }
    Ok(None)
}

/// Resolves one property segment on `parent`.
fn bind_segment<'m>(
    binder: &mut dyn TokenBinder<'m>,
    parent: QueryNode,
    identifier: &str,
) -> Result<QueryNode> {
    if !parent.is_single() {
        return Err(BindError::PropertyAccessSourceNotSingleValue {
            property: identifier.to_string(),
        });
    }
    let Some(parent_type) = parent.type_ref().cloned() else {
        return Ok(open_property(parent, identifier));
    };

    let context = binder.state().context();
    match context
        .resolver
        .resolve_property(context.model, &parent_type, identifier)?
    {
        Some(ResolvedProperty::Structural { name, type_ref }) => {
            Ok(property_node(parent, name, type_ref))
        }
        Some(ResolvedProperty::Navigation(nav)) => Ok(navigation_node(binder.state(), parent, &nav)),
        None => {
            if parent_type.as_synthetic().is_some() {
                let state = binder.state();
                let visible = state
                    .aggregated_property_names()
                    .iter()
                    .any(|name| name == identifier);
                if state.is_collapsed() && !visible {
                    return Err(BindError::GroupByPropertyNotPropertyAccessValue {
                        property: identifier.to_string(),
                    });
                }
                return Ok(open_property(parent, identifier));
            }
            let is_open = parent_type
                .structured_name()
                .is_some_and(|name| context.model.is_open(name));
            // Open types read a same-named function that needs arguments as a dynamic property.
            match function::bind_bound_operation(binder, parent.clone(), identifier, &[]) {
                Ok(Some(node)) => return Ok(node),
                Ok(None) | Err(BindError::CannotFindASuitableOverload { .. }) if is_open => {
                    return Ok(open_property(parent, identifier));
                }
                Ok(None) => {}
                Err(err) => return Err(err),
            }
            Err(BindError::PropertyNotDeclared {
                type_name: parent_type.full_name(),
                property: identifier.to_string(),
            })
        }
    }
}

fn open_property(parent: QueryNode, identifier: &str) -> QueryNode {
    QueryNode::SingleValueOpenPropertyAccess(OpenPropertyAccessNode {
        source: Box::new(parent),
        name: identifier.to_string(),
        type_ref: None,
    })
}

/// Classifies a structural property access by cardinality and type.
pub(crate) fn property_node(parent: QueryNode, property: String, type_ref: TypeRef) -> QueryNode {
    let collection = type_ref.is_collection();
    let structured = type_ref.item_type().is_structured();
    let node = PropertyAccessNode {
        source: Box::new(parent),
        property,
        type_ref,
    };
    match (collection, structured) {
        (false, false) => QueryNode::SingleValuePropertyAccess(node),
        (false, true) => QueryNode::SingleComplexProperty(node),
        (true, false) => QueryNode::CollectionPropertyAccess(node),
        (true, true) => QueryNode::CollectionComplexProperty(node),
    }
}

fn navigation_node(state: &BindingState<'_>, parent: QueryNode, nav: &NavigationProperty) -> QueryNode {
    let navigation_source = navigation_target(state, &parent, &nav.name);
    let node = NavigationNode {
        source: Box::new(parent),
        property: nav.name.clone(),
        type_ref: nav.type_ref(),
        navigation_source,
    };
    if nav.is_collection {
        QueryNode::CollectionNavigation(node)
    } else {
        QueryNode::SingleNavigation(node)
    }
}

/// Follows the entity set binding for navigating `property` from `parent`.
/// Complex properties and type casts between the entity and the navigation
/// property are part of the binding path; a binding declared without the
/// casts is accepted too. When `$it` has no entity set of its own, the path
/// continues from the segments walked to reach the current level.
fn navigation_target(
    state: &BindingState<'_>,
    parent: &QueryNode,
    property: &str,
) -> Option<String> {
    let mut segments = vec![property.to_string()];
    let mut current = parent;
    let set = loop {
        match current {
            QueryNode::SingleComplexProperty(p) | QueryNode::CollectionComplexProperty(p) => {
                segments.push(p.property.clone());
                current = &p.source;
            }
            QueryNode::SingleResourceCast(c) | QueryNode::CollectionResourceCast(c) => {
                segments.push(c.type_ref.item_type().full_name());
                current = &c.source;
            }
            QueryNode::RangeVariableReference(r)
                if r.navigation_source.is_none() && r.name == IMPLICIT_RANGE_VARIABLE =>
            {
                segments.extend(state.parsed_segments().iter().rev().cloned());
                break state.segment_source()?;
            }
            other => break other.navigation_source()?,
        }
    };
    segments.reverse();
    find_binding_target(state.context().model, set, &segments)
}

/// Looks up the binding of `segments` under `set`, then again without the
/// type cast segments.
pub(crate) fn find_binding_target(model: &Model, set: &str, segments: &[String]) -> Option<String> {
    let without_casts: Vec<&str> = segments
        .iter()
        .map(String::as_str)
        .filter(|s| !s.contains('.'))
        .collect();
    model
        .find_navigation_target(set, &segments.join("/"))
        .or_else(|| model.find_navigation_target(set, &without_casts.join("/")))
        .map(str::to_string)
}

/// Binds a qualified segment: a type cast, an enum literal or a bound
/// function called without parentheses.
pub(crate) fn bind_dotted_identifier<'m>(
    binder: &mut dyn TokenBinder<'m>,
    token: &DottedIdentifierToken,
) -> Result<QueryNode> {
    if token.identifier.ends_with('\'') {
        return bind_enum_literal(binder.state(), &token.identifier);
    }
    let parent = bind_parent(binder, token.next.as_deref(), &token.identifier)?;
    let context = binder.state().context();

    match context.resolver.resolve_type(context.model, &token.identifier)? {
        Some(target) if target.is_structured() => {
            if let Some(parent_name) = parent.type_ref().and_then(|t| t.item_type().structured_name()) {
                let related = target
                    .structured_name()
                    .is_some_and(|child| context.model.is_related_to(parent_name, child));
                if !related {
                    return Err(BindError::TypeNotRelated {
                        parent: parent_name.to_string(),
                        child: target.full_name(),
                    });
                }
            }
            let navigation_source = parent.navigation_source().map(str::to_string);
            let collection = parent.is_collection();
            let nullable = parent.type_ref().map_or(true, |t| t.nullable);
            let node = ResourceCastNode {
                type_ref: if collection {
                    TypeRef::collection(target.with_nullable(false))
                } else {
                    target.with_nullable(nullable)
                },
                source: Box::new(parent),
                navigation_source,
            };
            Ok(if collection {
                QueryNode::CollectionResourceCast(node)
            } else {
                QueryNode::SingleResourceCast(node)
            })
        }
        Some(target) => {
            if !parent.is_single() {
                return Err(BindError::PropertyAccessSourceNotSingleValue {
                    property: token.identifier.clone(),
                });
            }
            let nullable = parent.type_ref().map_or(true, |t| t.nullable);
            Ok(QueryNode::Convert(ConvertNode {
                source: Box::new(parent),
                type_ref: target.with_nullable(nullable),
            }))
        }
        None => function::bind_bound_operation(binder, parent, &token.identifier, &[])?
            .ok_or_else(|| BindError::TypeNotFound {
                name: token.identifier.clone(),
            }),
    }
}

/// Binds `$it`, `$this` or a lambda variable.
pub(crate) fn bind_range_variable(state: &BindingState<'_>, name: &str) -> Result<QueryNode> {
    state
        .find_range_variable(name)
        .map(QueryNode::range_variable)
        .ok_or_else(|| BindError::RangeVariableNotInScope {
            name: name.to_string(),
        })
}

/// Binds `Collection/$count`, with optional nested `$filter`/`$search` over
/// the collection items.
pub(crate) fn bind_count_segment<'m>(
    binder: &mut dyn TokenBinder<'m>,
    token: &CountSegmentToken,
) -> Result<QueryNode> {
    let source = binder.bind(&token.next)?;
    if !source.is_collection() {
        return Err(BindError::CountSegmentParentNotCollection {
            segment: source.kind_name().to_string(),
        });
    }
    if token.filter.is_none() && token.search.is_none() {
        return Ok(QueryNode::Count(CountNode {
            source: Box::new(source),
            filter: None,
            search: None,
        }));
    }

    let variable = RangeVariable::new(
        IMPLICIT_RANGE_VARIABLE,
        source.type_ref().map(|t| t.item_type().clone()),
        source.navigation_source().map(str::to_string),
    );
    let mut nested = MetadataBinder::new(binder.state().nested(variable));
    let filter: Option<FilterClause> = token
        .filter
        .as_deref()
        .map(|f| bind_filter(&mut nested, f))
        .transpose()?;
    let search: Option<SearchClause> = token
        .search
        .as_deref()
        .map(|s| bind_search(&mut nested, s))
        .transpose()?;
    Ok(QueryNode::Count(CountNode {
        source: Box::new(source),
        filter: filter.map(Box::new),
        search: search.map(Box::new),
    }))
}
