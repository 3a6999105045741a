//! Binds one level of a normalized expand tree, recursing into nested levels.

use std::iter;

use tracing::debug;

use crate::binder::apply::{bind_apply, state_after_apply};
use crate::binder::clause::{
    ExpandOptions, ExpandedItem, PathSelectItem, SelectExpandClause, SelectItem, SelectSegment,
};
use crate::binder::compute::bind_compute;
use crate::binder::filter::bind_filter;
use crate::binder::metadata::MetadataBinder;
use crate::binder::order_by::bind_order_by;
use crate::binder::path::find_binding_target;
use crate::binder::resolver::ResolvedProperty;
use crate::binder::search::bind_search;
use crate::binder::state::{BindingState, RangeVariable};
use crate::error::{BindError, Result};
use crate::stack::ensure_stack;
use crate::parser::{
    ExpandTermToken, LevelsToken, PathSegmentToken, SelectTermToken, TermOptions,
};
use crate::types::TypeRef;

const REFERENCE_OPTIONS: &[&str] = &["$filter", "$orderby", "$top", "$skip", "$count", "$search"];
const COUNT_OPTIONS: &[&str] = &["$filter", "$search"];
const SELECT_OPTIONS: &[&str] = &[
    "$filter", "$orderby", "$top", "$skip", "$count", "$search", "$compute", "$select", "$expand",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpansionKind {
    Entity,
    Reference,
    Count,
}

/// Binds the `$select` and `$expand` of one level over `level_type`.
pub(crate) fn bind_level(
    state: &BindingState<'_>,
    level_type: &TypeRef,
    navigation_source: Option<&str>,
    options: &TermOptions,
) -> Result<SelectExpandClause> {
    let all_selected = options.select.as_ref().map_or(true, |select| {
        select
            .terms
            .iter()
            .any(|t| t.path.iter().next().is_some_and(PathSegmentToken::is_wildcard))
    });

    let mut items = Vec::new();
    if let Some(select) = &options.select {
        for term in &select.terms {
            items.push(bind_select_term(state, level_type, navigation_source, term)?);
        }
    }
    if let Some(expand) = &options.expand {
        for term in &expand.terms {
            items.extend(bind_expand_term(state, level_type, navigation_source, term)?);
        }
    }
    Ok(SelectExpandClause {
        items,
        all_selected,
    })
}

fn check_options(options: &TermOptions, allowed: &[&str], path: &str) -> Result<()> {
    match options.present().into_iter().find(|o| !allowed.contains(o)) {
        Some(option) => Err(BindError::InvalidNestedOption {
            path: path.to_string(),
            option: option.to_string(),
        }),
        None => Ok(()),
    }
}

/// Resolves one path segment on `current`. `$compute` aliases in scope
/// resolve as dynamic properties.
fn resolve_segment(state: &BindingState<'_>, current: &TypeRef, identifier: &str) -> Result<SelectSegment> {
    let context = state.context();
    if identifier.starts_with('@') {
        return Ok(SelectSegment::Annotation(identifier.to_string()));
    }
    if identifier.contains('.') {
        if let Some(cast) = context.resolver.resolve_type(context.model, identifier)? {
            if cast.is_structured() {
                let related = match (current.structured_name(), cast.structured_name()) {
                    (Some(parent), Some(child)) => context.model.is_related_to(parent, child),
                    _ => false,
                };
                if !related {
                    return Err(BindError::TypeNotRelated {
                        parent: current.full_name(),
                        child: cast.full_name(),
                    });
                }
                return Ok(SelectSegment::TypeCast(cast));
            }
        }
    }
    match context
        .resolver
        .resolve_property(context.model, current, identifier)?
    {
        Some(ResolvedProperty::Structural { name, type_ref }) => {
            Ok(SelectSegment::Property { name, type_ref })
        }
        Some(ResolvedProperty::Navigation(nav)) => Ok(SelectSegment::Navigation {
            type_ref: nav.type_ref(),
            name: nav.name,
            navigation_source: None,
        }),
        None => {
            let operations = context
                .resolver
                .resolve_bound_operations(context.model, identifier, current);
            if let Some(operation) = operations.first() {
                return Ok(SelectSegment::Operation(operation.name.clone()));
            }
            let is_open = state.computed_property(identifier).is_some()
                || current.as_synthetic().is_some()
                || current
                    .structured_name()
                    .is_some_and(|name| context.model.is_open(name));
            if is_open {
                return Ok(SelectSegment::Dynamic(identifier.to_string()));
            }
            Err(BindError::PropertyNotDeclared {
                type_name: current.full_name(),
                property: identifier.to_string(),
            })
        }
    }
}

/// Follows the entity set binding of a navigation reached through `prefix`.
/// Levels without an entity set continue from the segments that led to them.
fn expansion_source(
    state: &BindingState<'_>,
    source: Option<&str>,
    prefix: &[SelectSegment],
    navigation: &str,
) -> Option<String> {
    let (set, walked) = match source {
        Some(set) => (set, &[][..]),
        None => (state.segment_source()?, state.parsed_segments()),
    };
    let segments: Vec<String> = walked
        .iter()
        .cloned()
        .chain(prefix.iter().map(SelectSegment::identifier))
        .chain(iter::once(navigation.to_string()))
        .collect();
    find_binding_target(state.context().model, set, &segments)
}

/// Binds the expression options of an item over `target` and returns them
/// with the state later nested levels are bound in.
fn bind_options<'m>(
    state: &BindingState<'m>,
    segments: &[SelectSegment],
    target: &TypeRef,
    navigation_source: Option<String>,
    options: &TermOptions,
) -> Result<(ExpandOptions, BindingState<'m>)> {
    let limit = state.context().settings.select_expand_limit;
    let contained = navigation_source.is_none();
    let mut scoped = state.child(RangeVariable::implicit(target.clone(), navigation_source), limit);
    if contained {
        scoped.extend_segments(segments.iter().map(SelectSegment::identifier));
    }

    let apply = match &options.apply {
        Some(token) => {
            let clause = bind_apply(&mut MetadataBinder::new(scoped.clone()), token)?;
            scoped = state_after_apply(&scoped, &clause);
            Some(clause)
        }
        None => None,
    };
    let compute = match &options.compute {
        Some(token) => {
            let clause = bind_compute(&mut MetadataBinder::new(scoped.clone()), token)?;
            for item in &clause.items {
                scoped.add_computed_property(item.alias.clone(), item.type_ref.clone());
            }
            Some(clause)
        }
        None => None,
    };
    let filter = options
        .filter
        .as_ref()
        .map(|token| bind_filter(&mut MetadataBinder::new(scoped.clone()), token))
        .transpose()?;
    let order_by = if options.order_by.is_empty() {
        None
    } else {
        bind_order_by(&mut MetadataBinder::new(scoped.clone()), &options.order_by)?
    };
    let search = options
        .search
        .as_ref()
        .map(|token| bind_search(&mut MetadataBinder::new(scoped.clone()), token))
        .transpose()?;

    let bound = ExpandOptions {
        filter,
        order_by,
        top: options.top,
        skip: options.skip,
        count: options.count,
        search,
        compute,
        apply,
        levels: options.levels.map(|levels| match levels {
            LevelsToken::Max => None,
            LevelsToken::Value(n) => Some(n),
        }),
    };
    Ok((bound, scoped))
}

fn bind_select_term(
    state: &BindingState<'_>,
    level_type: &TypeRef,
    navigation_source: Option<&str>,
    term: &SelectTermToken,
) -> Result<SelectItem> {
    let context = state.context();
    let path = term.path.to_path_string();
    let tokens: Vec<&PathSegmentToken> = term.path.iter().collect();

    if let Some(system) = tokens.iter().find(|s| s.is_system()) {
        return Err(BindError::SystemTokenInSelect {
            token: system.identifier.clone(),
        });
    }
    if tokens.iter().any(|s| s.is_wildcard()) {
        if tokens.len() != 1 {
            return Err(BindError::InvalidWildcard { path });
        }
        check_options(&term.options, &[], &path)?;
        return Ok(SelectItem::Wildcard);
    }
    if tokens.iter().any(|s| s.is_namespace_wildcard()) {
        if tokens.len() != 1 {
            return Err(BindError::InvalidWildcard { path });
        }
        check_options(&term.options, &[], &path)?;
        let namespace = path.trim_end_matches(".*");
        if !context.model.has_namespace(namespace) {
            return Err(BindError::NamespaceNotFound {
                namespace: namespace.to_string(),
            });
        }
        return Ok(SelectItem::NamespaceQualifiedWildcard(namespace.to_string()));
    }

    let mut segments = Vec::with_capacity(tokens.len());
    let mut current = level_type.item_type().clone();
    for (index, token) in tokens.iter().enumerate() {
        let is_last = index + 1 == tokens.len();
        let segment = resolve_segment(state, &current, &token.identifier)?;
        match segment {
            SelectSegment::TypeCast(ref cast) => current = cast.clone(),
            SelectSegment::Property { ref type_ref, .. } => current = type_ref.item_type().clone(),
            SelectSegment::Navigation {
                name,
                type_ref,
                ..
            } => {
                if !is_last {
                    return Err(BindError::NavigationNotLastInSelect { path });
                }
                if !term.options.is_empty() {
                    return Err(BindError::QueryOptionNestedUnderNavigation { path });
                }
                let target = expansion_source(state, navigation_source, &segments, &name);
                segments.push(SelectSegment::Navigation {
                    name,
                    type_ref,
                    navigation_source: target,
                });
                continue;
            }
            SelectSegment::Operation(_) | SelectSegment::Dynamic(_) | SelectSegment::Annotation(_)
                if !is_last =>
            {
                return Err(BindError::MultiLevelPathInSelect { path });
            }
            _ => {}
        }
        segments.push(segment);
    }

    let mut item = PathSelectItem {
        segments,
        options: ExpandOptions::default(),
        select: None,
    };
    if term.options.is_empty() {
        return Ok(SelectItem::Path(item));
    }

    let property_segments = item
        .segments
        .iter()
        .filter(|s| !matches!(s, SelectSegment::TypeCast(_)))
        .count();
    if property_segments > 1 {
        return Err(BindError::MultiLevelPathInSelect { path });
    }
    check_options(&term.options, SELECT_OPTIONS, &path)?;
    if !matches!(item.segments.last(), Some(SelectSegment::Property { .. })) {
        let option = term.options.present().first().copied().unwrap_or_default();
        return Err(BindError::InvalidNestedOption {
            path,
            option: option.to_string(),
        });
    }

    let (options, scoped) = bind_options(state, &item.segments, &current, None, &term.options)?;
    item.options = options;
    if current.is_structured() && (term.options.select.is_some() || term.options.expand.is_some()) {
        item.select = Some(Box::new(bind_level(&scoped, &current, None, &term.options)?));
    }
    Ok(SelectItem::Path(item))
}

fn bind_expand_term(
    state: &BindingState<'_>,
    level_type: &TypeRef,
    navigation_source: Option<&str>,
    term: &ExpandTermToken,
) -> Result<Vec<SelectItem>> {
    let context = state.context();
    let path = term.path.to_path_string();
    let mut tokens: Vec<&PathSegmentToken> = term.path.iter().collect();
    let kind = match tokens.last().map(|s| s.identifier.as_str()) {
        Some("$ref") => ExpansionKind::Reference,
        Some("$count") => ExpansionKind::Count,
        _ => ExpansionKind::Entity,
    };
    if kind != ExpansionKind::Entity {
        tokens.pop();
    }
    match kind {
        ExpansionKind::Reference => check_options(&term.options, REFERENCE_OPTIONS, &path)?,
        ExpansionKind::Count => check_options(&term.options, COUNT_OPTIONS, &path)?,
        ExpansionKind::Entity => {}
    }
    if tokens.is_empty() || tokens.iter().any(|s| s.is_system()) {
        return Err(BindError::ExpandPathNotNavigation { path });
    }

    if tokens.len() == 1 && tokens[0].is_wildcard() {
        let Some(type_name) = level_type.item_type().structured_name() else {
            return Ok(Vec::new());
        };
        debug!(type_name, "expanding every navigation property");
        return context
            .model
            .navigation_properties(type_name)
            .into_iter()
            .map(|nav| {
                let target = expansion_source(state, navigation_source, &[], &nav.name);
                let segment = SelectSegment::Navigation {
                    name: nav.name.clone(),
                    type_ref: nav.type_ref(),
                    navigation_source: target.clone(),
                };
                let entity = TypeRef::entity(nav.target_type.clone(), false);
                expanded_item(state, vec![segment], entity, target, &term.options, kind)
            })
            .collect();
    }
    if tokens
        .iter()
        .any(|s| s.is_wildcard() || s.is_namespace_wildcard())
    {
        return Err(BindError::InvalidWildcard { path });
    }

    let mut segments: Vec<SelectSegment> = Vec::with_capacity(tokens.len());
    let mut current = level_type.item_type().clone();
    let mut target: Option<Option<String>> = None;
    for token in tokens {
        match resolve_segment(state, &current, &token.identifier)? {
            SelectSegment::TypeCast(cast) => {
                current = cast.clone();
                segments.push(SelectSegment::TypeCast(cast));
            }
            SelectSegment::Property { name, type_ref }
                if target.is_none() && type_ref.item_type().is_structured() =>
            {
                current = type_ref.item_type().clone();
                segments.push(SelectSegment::Property { name, type_ref });
            }
            SelectSegment::Navigation { name, type_ref, .. } if target.is_none() => {
                let source = expansion_source(state, navigation_source, &segments, &name);
                current = type_ref.item_type().with_nullable(false);
                target = Some(source.clone());
                segments.push(SelectSegment::Navigation {
                    name,
                    type_ref,
                    navigation_source: source,
                });
            }
            _ => return Err(BindError::ExpandPathNotNavigation { path }),
        }
    }
    let Some(target) = target else {
        return Err(BindError::ExpandPathNotNavigation { path });
    };
    debug!(path = %path, navigation_source = ?target, "binding expansion");
    Ok(vec![expanded_item(
        state,
        segments,
        current,
        target,
        &term.options,
        kind,
    )?])
}

fn expanded_item(
    state: &BindingState<'_>,
    segments: Vec<SelectSegment>,
    target: TypeRef,
    navigation_source: Option<String>,
    options: &TermOptions,
    kind: ExpansionKind,
) -> Result<SelectItem> {
    let (bound, scoped) =
        bind_options(state, &segments, &target, navigation_source.clone(), options)?;
    let select_expand = match kind {
        ExpansionKind::Entity => Some(Box::new(ensure_stack(|| {
            bind_level(&scoped, &target, navigation_source.as_deref(), options)
        })?)),
        ExpansionKind::Reference | ExpansionKind::Count => None,
    };
    let item = ExpandedItem {
        segments,
        navigation_source,
        options: bound,
        select_expand,
    };
    Ok(match kind {
        ExpansionKind::Entity => SelectItem::Expanded(item),
        ExpansionKind::Reference => SelectItem::ExpandedReference(item),
        ExpansionKind::Count => SelectItem::ExpandedCount(item),
    })
}
