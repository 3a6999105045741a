//! Resolved type references carried by bound nodes.

use std::fmt;
use std::sync::Arc;

use super::synthetic::SyntheticType;
use super::value::PrimitiveKind;

/// The shape of a resolved type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// A built-in primitive type.
    Primitive(PrimitiveKind),
    /// A schema enumeration type, by qualified name.
    Enum(String),
    /// A schema type definition over a primitive type.
    TypeDefinition {
        /// Qualified name.
        name: String,
        /// Underlying primitive type.
        underlying: PrimitiveKind,
    },
    /// A schema complex type, by qualified name.
    Complex(String),
    /// A schema entity type, by qualified name.
    Entity(String),
    /// A structured type synthesized while binding `$apply`.
    Synthetic(Arc<SyntheticType>),
    /// A collection of items.
    Collection(Box<TypeRef>),
}

/// A type reference with nullability.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// The referenced type.
    pub kind: TypeKind,
    /// Whether null is a legal value.
    pub nullable: bool,
}

impl TypeRef {
    /// Creates a primitive type reference.
    #[must_use]
    pub fn primitive(kind: PrimitiveKind, nullable: bool) -> Self {
        TypeRef {
            kind: TypeKind::Primitive(kind),
            nullable,
        }
    }

    /// Shorthand for a nullable `Edm.String`.
    #[must_use]
    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::String, true)
    }

    /// Shorthand for `Edm.Boolean`.
    #[must_use]
    pub fn boolean(nullable: bool) -> Self {
        Self::primitive(PrimitiveKind::Boolean, nullable)
    }

    /// Shorthand for `Edm.Int32`.
    #[must_use]
    pub fn int32(nullable: bool) -> Self {
        Self::primitive(PrimitiveKind::Int32, nullable)
    }

    /// Shorthand for `Edm.Int64`.
    #[must_use]
    pub fn int64(nullable: bool) -> Self {
        Self::primitive(PrimitiveKind::Int64, nullable)
    }

    /// Shorthand for `Edm.Double`.
    #[must_use]
    pub fn double(nullable: bool) -> Self {
        Self::primitive(PrimitiveKind::Double, nullable)
    }

    /// Shorthand for `Edm.Decimal`.
    #[must_use]
    pub fn decimal(nullable: bool) -> Self {
        Self::primitive(PrimitiveKind::Decimal, nullable)
    }

    /// Creates an enumeration type reference.
    #[must_use]
    pub fn enumeration(name: impl Into<String>, nullable: bool) -> Self {
        TypeRef {
            kind: TypeKind::Enum(name.into()),
            nullable,
        }
    }

    /// Creates an entity type reference.
    #[must_use]
    pub fn entity(name: impl Into<String>, nullable: bool) -> Self {
        TypeRef {
            kind: TypeKind::Entity(name.into()),
            nullable,
        }
    }

    /// Creates a complex type reference.
    #[must_use]
    pub fn complex(name: impl Into<String>, nullable: bool) -> Self {
        TypeRef {
            kind: TypeKind::Complex(name.into()),
            nullable,
        }
    }

    /// Creates a reference to a synthetic type.
    #[must_use]
    pub fn synthetic(ty: Arc<SyntheticType>) -> Self {
        TypeRef {
            kind: TypeKind::Synthetic(ty),
            nullable: false,
        }
    }

    /// Creates a collection of `item`. Collections themselves are never null.
    #[must_use]
    pub fn collection(item: TypeRef) -> Self {
        TypeRef {
            kind: TypeKind::Collection(Box::new(item)),
            nullable: false,
        }
    }

    /// Returns a copy with the given nullability.
    #[must_use]
    pub fn with_nullable(&self, nullable: bool) -> Self {
        TypeRef {
            kind: self.kind.clone(),
            nullable,
        }
    }

    /// Returns true for collection types.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, TypeKind::Collection(_))
    }

    /// Returns the item type of a collection, or `self` for single types.
    #[must_use]
    pub fn item_type(&self) -> &TypeRef {
        match &self.kind {
            TypeKind::Collection(item) => item,
            _ => self,
        }
    }

    /// Returns the primitive kind, looking through type definitions.
    #[must_use]
    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match &self.kind {
            TypeKind::Primitive(kind) => Some(*kind),
            TypeKind::TypeDefinition { underlying, .. } => Some(*underlying),
            _ => None,
        }
    }

    /// Returns true if this is the given primitive kind.
    #[must_use]
    pub fn is_primitive_kind(&self, kind: PrimitiveKind) -> bool {
        self.as_primitive() == Some(kind)
    }

    /// Returns true for enumeration types.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum(_))
    }

    /// Returns true for entity, complex and synthetic types.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Entity(_) | TypeKind::Complex(_) | TypeKind::Synthetic(_)
        )
    }

    /// Returns true for entity types.
    #[must_use]
    pub fn is_entity(&self) -> bool {
        matches!(self.kind, TypeKind::Entity(_))
    }

    /// Returns true for primitive, enum and type definition types.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Primitive(_) | TypeKind::Enum(_) | TypeKind::TypeDefinition { .. }
        )
    }

    /// Returns the qualified name of a schema-declared structured type.
    #[must_use]
    pub fn structured_name(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::Entity(name) | TypeKind::Complex(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the synthetic type behind this reference, if any.
    #[must_use]
    pub fn as_synthetic(&self) -> Option<&Arc<SyntheticType>> {
        match &self.kind {
            TypeKind::Synthetic(ty) => Some(ty),
            _ => None,
        }
    }

    /// Compares two references ignoring nullability.
    #[must_use]
    pub fn same_type(&self, other: &TypeRef) -> bool {
        match (&self.kind, &other.kind) {
            (TypeKind::Collection(a), TypeKind::Collection(b)) => a.same_type(b),
            (a, b) => a == b,
        }
    }

    /// Returns the qualified name, e.g. `Collection(Edm.Int32)`.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.kind {
            TypeKind::Primitive(kind) => kind.name().to_string(),
            TypeKind::Enum(name)
            | TypeKind::TypeDefinition { name, .. }
            | TypeKind::Complex(name)
            | TypeKind::Entity(name) => name.clone(),
            TypeKind::Synthetic(ty) => ty.name().to_string(),
            TypeKind::Collection(item) => format!("Collection({})", item.full_name()),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Formats an optional type, using `null` for unknown types.
#[must_use]
pub fn display_type(type_ref: Option<&TypeRef>) -> String {
    type_ref.map_or_else(|| "<null>".to_string(), TypeRef::full_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_type_ignores_nullability() {
        assert!(TypeRef::int32(true).same_type(&TypeRef::int32(false)));
        assert!(!TypeRef::int32(true).same_type(&TypeRef::int64(true)));
        assert!(TypeRef::collection(TypeRef::string())
            .same_type(&TypeRef::collection(TypeRef::string().with_nullable(false))));
    }

    #[test]
    fn test_type_definition_looks_through_to_primitive() {
        let ty = TypeRef {
            kind: TypeKind::TypeDefinition {
                name: "Shop.Weight".into(),
                underlying: PrimitiveKind::Double,
            },
            nullable: true,
        };
        assert_eq!(ty.as_primitive(), Some(PrimitiveKind::Double));
        assert!(ty.is_scalar());
        assert_eq!(ty.full_name(), "Shop.Weight");
    }

    #[test]
    fn test_collection_names_and_items() {
        let ty = TypeRef::collection(TypeRef::entity("Shop.Order", false));
        assert_eq!(ty.full_name(), "Collection(Shop.Order)");
        assert!(ty.item_type().is_entity());
        assert_eq!(display_type(None), "<null>");
    }
}
