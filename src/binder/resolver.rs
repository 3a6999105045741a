//! Name resolution strategy consulted by every binder.

use tracing::debug;

use crate::binder::node::QueryNode;
use crate::binder::promotion::{self, BinaryPromotion};
use crate::config::BinderSettings;
use crate::error::{BindError, Result};
use crate::model::{Model, NavigationProperty, Operation, OperationParameter};
use crate::parser::BinaryOperatorKind;
use crate::types::{PrimitiveKind, TypeRef};

/// A property found on a structured type.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedProperty {
    /// Primitive, enum, complex or collection property.
    Structural {
        /// Declared name.
        name: String,
        /// Declared type.
        type_ref: TypeRef,
    },
    /// Navigation property.
    Navigation(NavigationProperty),
}

impl ResolvedProperty {
    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ResolvedProperty::Structural { name, .. } => name,
            ResolvedProperty::Navigation(nav) => &nav.name,
        }
    }
}

fn pick_unique<T>(name: &str, mut candidates: Vec<T>) -> Result<Option<T>> {
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop()),
        _ => Err(BindError::AmbiguousName {
            name: name.to_string(),
        }),
    }
}

/// Resolves names against the model and decides operand promotion.
///
/// Implement this to plug in custom naming conventions without touching the
/// binders. Every method except [`enable_case_insensitive`] has a default
/// that honours that flag.
///
/// [`enable_case_insensitive`]: UriResolver::enable_case_insensitive
pub trait UriResolver {
    /// Whether names match ignoring case.
    fn enable_case_insensitive(&self) -> bool;

    /// Compares a name from the URI with a declared name.
    fn names_match(&self, declared: &str, requested: &str) -> bool {
        if self.enable_case_insensitive() {
            declared.eq_ignore_ascii_case(requested)
        } else {
            declared == requested
        }
    }

    /// Finds a property of a structured type. An exact match always wins;
    /// otherwise a case-insensitive match must be unique.
    ///
    /// # Errors
    ///
    /// Returns `AmbiguousName` when several properties match ignoring case.
    fn resolve_property(
        &self,
        model: &Model,
        parent: &TypeRef,
        name: &str,
    ) -> Result<Option<ResolvedProperty>> {
        if let Some(synthetic) = parent.as_synthetic() {
            if let Some(type_ref) = synthetic.property(name) {
                return Ok(Some(ResolvedProperty::Structural {
                    name: name.to_string(),
                    type_ref: type_ref.clone(),
                }));
            }
            if !self.enable_case_insensitive() {
                return Ok(None);
            }
            let candidates = synthetic
                .properties()
                .filter(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(n, t)| ResolvedProperty::Structural {
                    name: n.to_string(),
                    type_ref: t.clone(),
                })
                .collect();
            return pick_unique(name, candidates);
        }

        let Some(type_name) = parent.structured_name() else {
            return Ok(None);
        };
        if let Some(p) = model.find_property(type_name, name) {
            return Ok(Some(ResolvedProperty::Structural {
                name: p.name.clone(),
                type_ref: p.type_ref.clone(),
            }));
        }
        if let Some(nav) = model.find_navigation_property(type_name, name) {
            return Ok(Some(ResolvedProperty::Navigation(nav.clone())));
        }
        if !self.enable_case_insensitive() {
            return Ok(None);
        }
        let mut candidates: Vec<ResolvedProperty> = model
            .properties(type_name)
            .into_iter()
            .filter(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| ResolvedProperty::Structural {
                name: p.name.clone(),
                type_ref: p.type_ref.clone(),
            })
            .collect();
        candidates.extend(
            model
                .navigation_properties(type_name)
                .into_iter()
                .filter(|n| n.name.eq_ignore_ascii_case(name))
                .map(|n| ResolvedProperty::Navigation(n.clone())),
        );
        pick_unique(name, candidates)
    }

    /// Resolves a qualified type name, including `Edm` primitives.
    ///
    /// # Errors
    ///
    /// Returns `AmbiguousName` when several types match ignoring case.
    fn resolve_type(&self, model: &Model, name: &str) -> Result<Option<TypeRef>> {
        if let Some(found) = model.find_type(name) {
            return Ok(Some(found));
        }
        if !self.enable_case_insensitive() {
            return Ok(None);
        }
        if let Some(kind) = PrimitiveKind::from_name_ignore_case(name) {
            return Ok(Some(TypeRef::primitive(kind, true)));
        }
        let candidates: Vec<&str> = model
            .type_names()
            .filter(|n| n.eq_ignore_ascii_case(name))
            .collect();
        Ok(pick_unique(name, candidates)?.and_then(|n| model.find_type(n)))
    }

    /// Finds bound operations named `name` that accept `binding_type`.
    fn resolve_bound_operations<'a>(
        &self,
        model: &'a Model,
        name: &str,
        binding_type: &TypeRef,
    ) -> Vec<&'a Operation> {
        if !self.enable_case_insensitive() {
            return model.find_bound_operations(name, binding_type);
        }
        model
            .operations()
            .iter()
            .filter(|op| op.name.eq_ignore_ascii_case(name))
            .filter(|op| {
                op.binding_parameter()
                    .is_some_and(|p| model.accepts_binding(&p.type_ref, binding_type))
            })
            .collect()
    }

    /// Maps argument names onto the explicit parameters of an operation.
    /// Returns `None` if any name matches no parameter.
    fn resolve_operation_parameters<'a>(
        &self,
        operation: &'a Operation,
        names: &[&str],
    ) -> Option<Vec<&'a OperationParameter>> {
        names
            .iter()
            .map(|requested| {
                operation
                    .explicit_parameters()
                    .iter()
                    .find(|p| self.names_match(&p.name, requested))
            })
            .collect()
    }

    /// Chooses conversions for the operands of a binary operator. Returns
    /// `None` if the operand types are incompatible.
    fn promote_binary_operand_types(
        &self,
        kind: BinaryOperatorKind,
        left: &QueryNode,
        right: &QueryNode,
    ) -> Option<BinaryPromotion> {
        let promotion = promotion::promote_binary_operand_types(kind, left, right);
        if let Some(p) = &promotion {
            debug!(
                operator = %kind,
                left = ?p.left.as_ref().map(TypeRef::full_name),
                right = ?p.right.as_ref().map(TypeRef::full_name),
                "promoted binary operands"
            );
        }
        promotion
    }
}

/// The stock resolver: exact names, or case-insensitive names when enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultUriResolver {
    case_insensitive: bool,
}

impl DefaultUriResolver {
    /// Creates a case-sensitive resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver with the given case sensitivity.
    #[must_use]
    pub fn case_insensitive(enabled: bool) -> Self {
        DefaultUriResolver {
            case_insensitive: enabled,
        }
    }

    /// Creates a resolver following `settings.enable_case_insensitive`.
    #[must_use]
    pub fn from_settings(settings: &BinderSettings) -> Self {
        Self::case_insensitive(settings.enable_case_insensitive)
    }
}

impl UriResolver for DefaultUriResolver {
    fn enable_case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StructuredType;

    fn model() -> Model {
        Model::builder()
            .structured_type(
                StructuredType::entity("Shop.Customer")
                    .key(["Id"])
                    .property("Id", TypeRef::int32(false))
                    .property("Name", TypeRef::string())
                    .property("NAME", TypeRef::string())
                    .property("City", TypeRef::string())
                    .navigation("Orders", "Shop.Order", true),
            )
            .structured_type(
                StructuredType::entity("Shop.Order")
                    .key(["Id"])
                    .property("Id", TypeRef::int32(false)),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_exact_match_wins() {
        let model = model();
        let resolver = DefaultUriResolver::case_insensitive(true);
        let customer = TypeRef::entity("Shop.Customer", false);
        let found = resolver.resolve_property(&model, &customer, "Name").unwrap();
        assert_eq!(found.unwrap().name(), "Name");
    }

    #[test]
    fn test_case_insensitive_ambiguity() {
        let model = model();
        let resolver = DefaultUriResolver::case_insensitive(true);
        let customer = TypeRef::entity("Shop.Customer", false);
        assert!(matches!(
            resolver.resolve_property(&model, &customer, "name"),
            Err(BindError::AmbiguousName { .. })
        ));
        let found = resolver.resolve_property(&model, &customer, "city").unwrap();
        assert_eq!(found.unwrap().name(), "City");
        let nav = resolver.resolve_property(&model, &customer, "orders").unwrap();
        assert!(matches!(nav, Some(ResolvedProperty::Navigation(_))));
    }

    #[test]
    fn test_case_sensitive_misses() {
        let model = model();
        let resolver = DefaultUriResolver::new();
        let customer = TypeRef::entity("Shop.Customer", false);
        assert!(resolver
            .resolve_property(&model, &customer, "city")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_resolve_type_ignoring_case() {
        let model = model();
        let resolver = DefaultUriResolver::case_insensitive(true);
        assert_eq!(
            resolver.resolve_type(&model, "shop.order").unwrap(),
            Some(TypeRef::entity("Shop.Order", true))
        );
        assert_eq!(
            resolver.resolve_type(&model, "edm.int32").unwrap(),
            Some(TypeRef::int32(true))
        );
    }
}
