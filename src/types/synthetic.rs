//! Structured types synthesized while binding `$apply`.
//!
//! Aggregation and grouping change the shape of the result. Instead of
//! registering throwaway types in the schema, the binder builds these small
//! open types that only carry an ordered list of property names and types.

use indexmap::IndexMap;

use super::type_ref::TypeRef;

/// An open structured type created at bind time.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticType {
    name: String,
    properties: IndexMap<String, TypeRef>,
}

impl SyntheticType {
    /// Starts building a synthetic type with the given display name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SyntheticTypeBuilder {
        SyntheticTypeBuilder {
            name: name.into(),
            properties: IndexMap::new(),
        }
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a property by exact name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&TypeRef> {
        self.properties.get(name)
    }

    /// Returns all properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &TypeRef)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the property names in declaration order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Synthetic types always accept dynamic properties.
    #[must_use]
    pub fn is_open(&self) -> bool {
        true
    }
}

/// Builder for [`SyntheticType`].
#[derive(Debug, Clone)]
pub struct SyntheticTypeBuilder {
    name: String,
    properties: IndexMap<String, TypeRef>,
}

impl SyntheticTypeBuilder {
    /// Adds or replaces a property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, type_ref: TypeRef) -> Self {
        self.properties.insert(name.into(), type_ref);
        self
    }

    /// Adds or replaces a property in place.
    pub fn insert(&mut self, name: impl Into<String>, type_ref: TypeRef) {
        self.properties.insert(name.into(), type_ref);
    }

    /// Returns the type of an already added property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeRef> {
        self.properties.get(name)
    }

    /// Copies every property of `other` that is not already present.
    #[must_use]
    pub fn extend_from(mut self, other: &SyntheticType) -> Self {
        for (name, ty) in other.properties() {
            if !self.properties.contains_key(name) {
                self.properties.insert(name.to_string(), ty.clone());
            }
        }
        self
    }

    /// Returns true if no property has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Finishes the type.
    #[must_use]
    pub fn build(self) -> SyntheticType {
        SyntheticType {
            name: self.name,
            properties: self.properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;

    #[test]
    fn test_builder_keeps_declaration_order() {
        let ty = SyntheticType::builder("Aggregation")
            .property("Total", TypeRef::decimal(true))
            .property("Count", TypeRef::int64(false))
            .build();
        let names: Vec<&str> = ty.property_names().collect();
        assert_eq!(names, vec!["Total", "Count"]);
        assert!(ty
            .property("Count")
            .is_some_and(|t| t.is_primitive_kind(PrimitiveKind::Int64)));
        assert!(ty.is_open());
    }

    #[test]
    fn test_extend_from_does_not_override() {
        let base = SyntheticType::builder("A")
            .property("X", TypeRef::int32(true))
            .property("Y", TypeRef::string())
            .build();
        let merged = SyntheticType::builder("B")
            .property("X", TypeRef::int64(true))
            .extend_from(&base)
            .build();
        assert_eq!(merged.property("X"), Some(&TypeRef::int64(true)));
        assert_eq!(merged.property("Y"), Some(&TypeRef::string()));
    }
}
