//! Key predicate binding: `Orders(1)`, `Orders(Id=1)`, `Customers(Code='X')`.

use std::collections::HashSet;

use tracing::debug;

use crate::binder::metadata::TokenBinder;
use crate::binder::node::{KeyLookupNode, KeyPropertyValue, NodeCategory, QueryNode};
use crate::binder::promotion::{conversion_cost, convert_to_type_if_needed};
use crate::error::{BindError, Result};
use crate::model::Model;
use crate::parser::NamedValue;
use crate::types::TypeRef;

/// Finds the type of a key property, following `/`-separated paths through
/// complex properties.
fn key_property_type(model: &Model, entity: &str, property: &str) -> Option<TypeRef> {
    let mut owner = entity.to_string();
    let mut found = None;
    for segment in property.split('/') {
        let p = model.find_property(&owner, segment)?;
        if let Some(name) = p.type_ref.structured_name() {
            owner = name.to_string();
        }
        found = Some(p.type_ref.clone());
    }
    found
}

/// Pairs each named value with a key property, trying the declared key first
/// and then every alternate key.
fn match_key<'v>(
    binder: &dyn TokenBinder<'_>,
    entity: &str,
    segment: &str,
    values: &'v [NamedValue],
) -> Result<Vec<(String, &'v NamedValue)>> {
    let context = binder.state().context();
    let resolver = context.resolver;
    let declared = context.model.declared_key(entity);

    if let [single] = values {
        if single.name.is_none() {
            return match declared {
                [key] => Ok(vec![(key.clone(), single)]),
                _ => Err(BindError::MultipleUntaggedKeyValues {
                    segment: segment.to_string(),
                }),
            };
        }
    }

    let mut names = Vec::with_capacity(values.len());
    let mut seen = HashSet::new();
    for value in values {
        let Some(name) = value.name.as_deref() else {
            return Err(BindError::MultipleUntaggedKeyValues {
                segment: segment.to_string(),
            });
        };
        let normalized = if resolver.enable_case_insensitive() {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        };
        if !seen.insert(normalized) {
            return Err(BindError::DuplicateKeyProperty {
                property: name.to_string(),
            });
        }
        names.push(name);
    }

    let covers = |candidates: &[&str]| {
        candidates.len() == names.len()
            && names
                .iter()
                .all(|n| candidates.iter().any(|c| resolver.names_match(c, n)))
    };

    let declared_names: Vec<&str> = declared.iter().map(String::as_str).collect();
    if covers(&declared_names) {
        return Ok(pair_up(&declared_names, &declared_names, values, binder));
    }
    for alternate in context.model.alternate_keys(entity) {
        let aliases: Vec<&str> = alternate.parts.iter().map(|p| p.alias.as_str()).collect();
        if covers(&aliases) {
            debug!(entity, key = ?aliases, "matched alternate key");
            let properties: Vec<&str> =
                alternate.parts.iter().map(|p| p.property.as_str()).collect();
            return Ok(pair_up(&aliases, &properties, values, binder));
        }
    }
    Err(BindError::NotAllKeyPropertiesSpecified {
        segment: segment.to_string(),
    })
}

/// Orders the values by key declaration order, mapping aliases to properties.
fn pair_up<'v>(
    aliases: &[&str],
    properties: &[&str],
    values: &'v [NamedValue],
    binder: &dyn TokenBinder<'_>,
) -> Vec<(String, &'v NamedValue)> {
    let resolver = binder.state().context().resolver;
    aliases
        .iter()
        .zip(properties)
        .filter_map(|(alias, property)| {
            values
                .iter()
                .find(|v| v.name.as_deref().is_some_and(|n| resolver.names_match(alias, n)))
                .map(|v| ((*property).to_string(), v))
        })
        .collect()
}

/// Binds a key predicate on a collection of entities.
pub(crate) fn bind_key_lookup<'m>(
    binder: &mut dyn TokenBinder<'m>,
    source: QueryNode,
    segment: &str,
    values: &[NamedValue],
) -> Result<QueryNode> {
    let entity_type = match (source.category(), source.type_ref()) {
        (NodeCategory::CollectionResource, Some(t)) if t.item_type().is_entity() => {
            t.item_type().clone()
        }
        _ => {
            return Err(BindError::KeyLookupOnlyOnEntityCollection {
                segment: segment.to_string(),
            })
        }
    };
    let entity = entity_type
        .structured_name()
        .map(str::to_string)
        .unwrap_or_default();

    let pairs = match_key(&*binder, &entity, segment, values)?;
    let model = binder.state().context().model;
    let mut keys = Vec::with_capacity(pairs.len());
    for (property, named) in pairs {
        let value = binder.bind(&named.value)?;
        let value = match key_property_type(model, &entity, &property) {
            Some(target) => {
                if conversion_cost(&value, &target).is_none() && !value.is_null_constant() {
                    return Err(BindError::CannotConvertToType {
                        value: property_value_text(&value),
                        target: target.full_name(),
                    });
                }
                convert_to_type_if_needed(value, Some(&target))
            }
            None => value,
        };
        keys.push(KeyPropertyValue { property, value });
    }

    let navigation_source = source.navigation_source().map(str::to_string);
    Ok(QueryNode::KeyLookup(KeyLookupNode {
        source: Box::new(source),
        keys,
        type_ref: entity_type.with_nullable(false),
        navigation_source,
    }))
}

fn property_value_text(node: &QueryNode) -> String {
    match node {
        QueryNode::Constant(c) => c
            .literal_text
            .clone()
            .unwrap_or_else(|| c.value.to_string()),
        other => other.kind_name().to_string(),
    }
}
