//! Schema definitions for structured types, enums, operations and entity sets.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::error::{BindError, Result};
use crate::types::{PrimitiveKind, TypeKind, TypeRef};

/// Whether a structured type is an entity or a complex type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredKind {
    /// Keyed, addressable type.
    Entity,
    /// Keyless value type.
    Complex,
}

/// A structural (non-navigation) property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// Declared type.
    pub type_ref: TypeRef,
}

/// A navigation property to another entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationProperty {
    /// Property name.
    pub name: String,
    /// Qualified name of the target entity type.
    pub target_type: String,
    /// True for to-many navigations.
    pub is_collection: bool,
    /// True if a to-one navigation may be null.
    pub nullable: bool,
    /// True for containment navigations.
    pub contains_target: bool,
}

impl NavigationProperty {
    /// Returns the declared type of the navigation property.
    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        let item = TypeRef::entity(self.target_type.clone(), self.nullable);
        if self.is_collection {
            TypeRef::collection(item.with_nullable(false))
        } else {
            item
        }
    }
}

/// One property of an alternate key, exposed under an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateKeyPart {
    /// Name used in key predicates.
    pub alias: String,
    /// Property path, segments separated by `/`.
    pub property: String,
}

/// An alternate key declared on an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateKey {
    /// Key parts.
    pub parts: Vec<AlternateKeyPart>,
}

impl AlternateKey {
    /// Creates an alternate key where each alias equals the property name.
    #[must_use]
    pub fn of<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AlternateKey {
            parts: properties
                .into_iter()
                .map(|p| {
                    let property = p.into();
                    AlternateKeyPart {
                        alias: property.clone(),
                        property,
                    }
                })
                .collect(),
        }
    }
}

/// An entity or complex type declared in the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredType {
    /// Qualified name, e.g. `Shop.Customer`.
    pub name: String,
    /// Entity or complex.
    pub kind: StructuredKind,
    /// Qualified name of the base type.
    pub base_type: Option<String>,
    /// Open types accept undeclared dynamic properties.
    pub is_open: bool,
    /// Abstract types need no key of their own.
    pub is_abstract: bool,
    /// Declared structural properties.
    pub properties: Vec<Property>,
    /// Declared navigation properties.
    pub navigation_properties: Vec<NavigationProperty>,
    /// Declared key property names.
    pub key: Vec<String>,
    /// Declared alternate keys.
    pub alternate_keys: Vec<AlternateKey>,
}

impl StructuredType {
    fn new(name: impl Into<String>, kind: StructuredKind) -> Self {
        StructuredType {
            name: name.into(),
            kind,
            base_type: None,
            is_open: false,
            is_abstract: false,
            properties: Vec::new(),
            navigation_properties: Vec::new(),
            key: Vec::new(),
            alternate_keys: Vec::new(),
        }
    }

    /// Creates an empty entity type.
    #[must_use]
    pub fn entity(name: impl Into<String>) -> Self {
        Self::new(name, StructuredKind::Entity)
    }

    /// Creates an empty complex type.
    #[must_use]
    pub fn complex(name: impl Into<String>) -> Self {
        Self::new(name, StructuredKind::Complex)
    }

    /// Sets the base type.
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base_type = Some(base.into());
        self
    }

    /// Marks the type as open.
    #[must_use]
    pub fn open(mut self) -> Self {
        self.is_open = true;
        self
    }

    /// Marks the type as abstract.
    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Adds a structural property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, type_ref: TypeRef) -> Self {
        self.properties.push(Property {
            name: name.into(),
            type_ref,
        });
        self
    }

    /// Adds a navigation property.
    #[must_use]
    pub fn navigation(
        mut self,
        name: impl Into<String>,
        target_type: impl Into<String>,
        is_collection: bool,
    ) -> Self {
        self.navigation_properties.push(NavigationProperty {
            name: name.into(),
            target_type: target_type.into(),
            is_collection,
            nullable: !is_collection,
            contains_target: false,
        });
        self
    }

    /// Adds a containment navigation property.
    #[must_use]
    pub fn contained_navigation(
        mut self,
        name: impl Into<String>,
        target_type: impl Into<String>,
        is_collection: bool,
    ) -> Self {
        self.navigation_properties.push(NavigationProperty {
            name: name.into(),
            target_type: target_type.into(),
            is_collection,
            nullable: !is_collection,
            contains_target: true,
        });
        self
    }

    /// Declares the key.
    #[must_use]
    pub fn key<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an alternate key.
    #[must_use]
    pub fn alternate_key(mut self, key: AlternateKey) -> Self {
        self.alternate_keys.push(key);
        self
    }

    /// Returns a reference to this type.
    #[must_use]
    pub fn type_ref(&self, nullable: bool) -> TypeRef {
        match self.kind {
            StructuredKind::Entity => TypeRef::entity(self.name.clone(), nullable),
            StructuredKind::Complex => TypeRef::complex(self.name.clone(), nullable),
        }
    }
}

/// A member of an enumeration type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    /// Member name.
    pub name: String,
    /// Underlying integral value.
    pub value: i64,
}

/// An enumeration type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    /// Qualified name.
    pub name: String,
    /// Flags enums accept comma separated member lists.
    pub is_flags: bool,
    /// Members in declaration order.
    pub members: Vec<EnumMember>,
}

impl EnumType {
    /// Creates an enum type without members.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        EnumType {
            name: name.into(),
            is_flags: false,
            members: Vec::new(),
        }
    }

    /// Marks the enum as a flags enum.
    #[must_use]
    pub fn flags(mut self) -> Self {
        self.is_flags = true;
        self
    }

    /// Adds a member.
    #[must_use]
    pub fn member(mut self, name: impl Into<String>, value: i64) -> Self {
        self.members.push(EnumMember {
            name: name.into(),
            value,
        });
        self
    }

    /// Finds a member by name or by its numeric value.
    #[must_use]
    pub fn find_member(&self, text: &str, ignore_case: bool) -> Option<&EnumMember> {
        if let Ok(number) = text.parse::<i64>() {
            return self.members.iter().find(|m| m.value == number);
        }
        self.members.iter().find(|m| {
            if ignore_case {
                m.name.eq_ignore_ascii_case(text)
            } else {
                m.name == text
            }
        })
    }
}

/// A named alias over a primitive type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    /// Qualified name.
    pub name: String,
    /// Underlying primitive.
    pub underlying: PrimitiveKind,
}

/// Function or action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Side-effect free, usable in expressions.
    Function,
    /// May have side effects, only usable in `$select`.
    Action,
}

/// A declared operation parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationParameter {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    pub type_ref: TypeRef,
    /// Optional parameters may be omitted.
    pub optional: bool,
}

/// A function or action declared in the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Qualified name, e.g. `Shop.MostExpensive`.
    pub name: String,
    /// Function or action.
    pub kind: OperationKind,
    /// Bound operations take their binding value as the first parameter.
    pub is_bound: bool,
    /// All parameters including the binding parameter.
    pub parameters: Vec<OperationParameter>,
    /// Declared return type.
    pub return_type: Option<TypeRef>,
    /// Composable functions may be followed by further path segments.
    pub is_composable: bool,
}

impl Operation {
    fn new(name: impl Into<String>, kind: OperationKind) -> Self {
        Operation {
            name: name.into(),
            kind,
            is_bound: false,
            parameters: Vec::new(),
            return_type: None,
            is_composable: false,
        }
    }

    /// Creates an unbound function.
    #[must_use]
    pub fn function(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Function)
    }

    /// Creates an unbound action.
    #[must_use]
    pub fn action(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Action)
    }

    /// Binds the operation to `binding_type` through the first parameter.
    #[must_use]
    pub fn bound_to(mut self, parameter: impl Into<String>, binding_type: TypeRef) -> Self {
        self.is_bound = true;
        self.parameters.insert(
            0,
            OperationParameter {
                name: parameter.into(),
                type_ref: binding_type,
                optional: false,
            },
        );
        self
    }

    /// Adds a required parameter.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, type_ref: TypeRef) -> Self {
        self.parameters.push(OperationParameter {
            name: name.into(),
            type_ref,
            optional: false,
        });
        self
    }

    /// Adds an optional parameter.
    #[must_use]
    pub fn optional_parameter(mut self, name: impl Into<String>, type_ref: TypeRef) -> Self {
        self.parameters.push(OperationParameter {
            name: name.into(),
            type_ref,
            optional: true,
        });
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, type_ref: TypeRef) -> Self {
        self.return_type = Some(type_ref);
        self
    }

    /// Marks the function as composable.
    #[must_use]
    pub fn composable(mut self) -> Self {
        self.is_composable = true;
        self
    }

    /// Returns the binding parameter of a bound operation.
    #[must_use]
    pub fn binding_parameter(&self) -> Option<&OperationParameter> {
        if self.is_bound {
            self.parameters.first()
        } else {
            None
        }
    }

    /// Returns the parameters a caller supplies explicitly.
    #[must_use]
    pub fn explicit_parameters(&self) -> &[OperationParameter] {
        if self.is_bound {
            self.parameters.get(1..).unwrap_or(&[])
        } else {
            &self.parameters
        }
    }

    /// Returns the name without its namespace.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit_once('.').map_or(&self.name, |(_, n)| n)
    }
}

/// A navigation property binding of an entity set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationBinding {
    /// Binding path from the set's entity type, e.g. `Orders` or `Address/Country`.
    pub path: String,
    /// Name of the target entity set.
    pub target: String,
}

/// An entity set in the entity container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySet {
    /// Set name.
    pub name: String,
    /// Qualified entity type name.
    pub entity_type: String,
    /// Navigation property bindings.
    pub navigation_bindings: Vec<NavigationBinding>,
}

impl EntitySet {
    /// Creates an entity set without bindings.
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        EntitySet {
            name: name.into(),
            entity_type: entity_type.into(),
            navigation_bindings: Vec::new(),
        }
    }

    /// Adds a navigation binding.
    #[must_use]
    pub fn binding(mut self, path: impl Into<String>, target: impl Into<String>) -> Self {
        self.navigation_bindings.push(NavigationBinding {
            path: path.into(),
            target: target.into(),
        });
        self
    }
}

/// Read-only schema consulted by the binder.
#[derive(Debug, Clone, Default)]
pub struct Model {
    structured: IndexMap<String, StructuredType>,
    enums: IndexMap<String, EnumType>,
    type_definitions: IndexMap<String, TypeDefinition>,
    operations: Vec<Operation>,
    entity_sets: IndexMap<String, EntitySet>,
    namespaces: BTreeSet<String>,
}

impl Model {
    /// Starts building a model.
    #[must_use]
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// Retrieves a structured type by qualified name.
    #[must_use]
    pub fn find_structured_type(&self, name: &str) -> Option<&StructuredType> {
        self.structured.get(name)
    }

    /// Retrieves an enum type by qualified name.
    #[must_use]
    pub fn find_enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }

    /// Retrieves a type definition by qualified name.
    #[must_use]
    pub fn find_type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.type_definitions.get(name)
    }

    /// Resolves a qualified type name, including `Edm` primitives, to a
    /// nullable type reference.
    #[must_use]
    pub fn find_type(&self, name: &str) -> Option<TypeRef> {
        if let Some(kind) = PrimitiveKind::from_name(name) {
            return Some(TypeRef::primitive(kind, true));
        }
        if let Some(ty) = self.structured.get(name) {
            return Some(ty.type_ref(true));
        }
        if self.enums.contains_key(name) {
            return Some(TypeRef::enumeration(name, true));
        }
        self.type_definitions.get(name).map(|def| TypeRef {
            kind: TypeKind::TypeDefinition {
                name: def.name.clone(),
                underlying: def.underlying,
            },
            nullable: true,
        })
    }

    /// Returns every schema type name.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.structured
            .keys()
            .chain(self.enums.keys())
            .chain(self.type_definitions.keys())
            .map(String::as_str)
    }

    /// Returns the type followed by its base types, nearest first.
    #[must_use]
    pub fn ancestors(&self, name: &str) -> Vec<&StructuredType> {
        let mut chain = Vec::new();
        let mut current = self.structured.get(name);
        while let Some(ty) = current {
            // The builder rejects cycles; the length check keeps lookups finite anyway.
            if chain.len() > self.structured.len() {
                break;
            }
            chain.push(ty);
            current = ty.base_type.as_deref().and_then(|b| self.structured.get(b));
        }
        chain
    }

    /// Finds a structural property, including inherited ones.
    #[must_use]
    pub fn find_property(&self, type_name: &str, property: &str) -> Option<&Property> {
        self.ancestors(type_name)
            .into_iter()
            .find_map(|ty| ty.properties.iter().find(|p| p.name == property))
    }

    /// Finds a navigation property, including inherited ones.
    #[must_use]
    pub fn find_navigation_property(
        &self,
        type_name: &str,
        property: &str,
    ) -> Option<&NavigationProperty> {
        self.ancestors(type_name)
            .into_iter()
            .find_map(|ty| ty.navigation_properties.iter().find(|p| p.name == property))
    }

    /// Returns all structural properties, base type properties first.
    #[must_use]
    pub fn properties(&self, type_name: &str) -> Vec<&Property> {
        let mut chain = self.ancestors(type_name);
        chain.reverse();
        chain.into_iter().flat_map(|t| t.properties.iter()).collect()
    }

    /// Returns all navigation properties, base type properties first.
    #[must_use]
    pub fn navigation_properties(&self, type_name: &str) -> Vec<&NavigationProperty> {
        let mut chain = self.ancestors(type_name);
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|t| t.navigation_properties.iter())
            .collect()
    }

    /// Returns true if the type or any base type is open.
    #[must_use]
    pub fn is_open(&self, type_name: &str) -> bool {
        self.ancestors(type_name).iter().any(|t| t.is_open)
    }

    /// Returns the number of inheritance steps from `derived` up to `base`.
    #[must_use]
    pub fn inheritance_distance(&self, derived: &str, base: &str) -> Option<usize> {
        self.ancestors(derived).iter().position(|t| t.name == base)
    }

    /// Returns true if `derived` is `base` or inherits from it.
    #[must_use]
    pub fn is_or_inherits_from(&self, derived: &str, base: &str) -> bool {
        self.inheritance_distance(derived, base).is_some()
    }

    /// Returns true if either type inherits from the other.
    #[must_use]
    pub fn is_related_to(&self, a: &str, b: &str) -> bool {
        self.is_or_inherits_from(a, b) || self.is_or_inherits_from(b, a)
    }

    /// Returns the declared key, inherited from the nearest base type that has one.
    #[must_use]
    pub fn declared_key(&self, type_name: &str) -> &[String] {
        self.ancestors(type_name)
            .into_iter()
            .find(|t| !t.key.is_empty())
            .map_or(&[], |t| t.key.as_slice())
    }

    /// Returns the alternate keys of the type and its base types.
    #[must_use]
    pub fn alternate_keys(&self, type_name: &str) -> Vec<&AlternateKey> {
        self.ancestors(type_name)
            .into_iter()
            .flat_map(|t| t.alternate_keys.iter())
            .collect()
    }

    /// Returns every declared operation.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Finds bound operations named `name` whose binding parameter accepts `binding_type`.
    #[must_use]
    pub fn find_bound_operations(&self, name: &str, binding_type: &TypeRef) -> Vec<&Operation> {
        self.operations
            .iter()
            .filter(|op| op.name == name)
            .filter(|op| {
                op.binding_parameter()
                    .is_some_and(|p| self.accepts_binding(&p.type_ref, binding_type))
            })
            .collect()
    }

    /// Returns true if a value of type `actual` can be passed as a binding
    /// parameter declared as `declared`.
    #[must_use]
    pub fn accepts_binding(&self, declared: &TypeRef, actual: &TypeRef) -> bool {
        if declared.is_collection() != actual.is_collection() {
            return false;
        }
        let (declared, actual) = (declared.item_type(), actual.item_type());
        match (declared.structured_name(), actual.structured_name()) {
            (Some(d), Some(a)) => self.is_or_inherits_from(a, d),
            _ => declared.same_type(actual),
        }
    }

    /// Returns true if any schema element lives in `namespace`.
    #[must_use]
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    /// Retrieves an entity set by name.
    #[must_use]
    pub fn find_entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.get(name)
    }

    /// Follows a navigation binding of `entity_set`.
    #[must_use]
    pub fn find_navigation_target(&self, entity_set: &str, binding_path: &str) -> Option<&str> {
        self.entity_sets
            .get(entity_set)?
            .navigation_bindings
            .iter()
            .find(|b| b.path == binding_path)
            .map(|b| b.target.as_str())
    }
}

/// Returns the namespace part of a qualified name.
#[must_use]
pub fn namespace_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(ns, _)| ns)
}

/// Collects schema elements and validates them into a [`Model`].
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    structured: Vec<StructuredType>,
    enums: Vec<EnumType>,
    type_definitions: Vec<TypeDefinition>,
    operations: Vec<Operation>,
    entity_sets: Vec<EntitySet>,
}

impl ModelBuilder {
    /// Adds an entity or complex type.
    #[must_use]
    pub fn structured_type(mut self, ty: StructuredType) -> Self {
        self.structured.push(ty);
        self
    }

    /// Adds an enum type.
    #[must_use]
    pub fn enum_type(mut self, ty: EnumType) -> Self {
        self.enums.push(ty);
        self
    }

    /// Adds a type definition.
    #[must_use]
    pub fn type_definition(mut self, name: impl Into<String>, underlying: PrimitiveKind) -> Self {
        self.type_definitions.push(TypeDefinition {
            name: name.into(),
            underlying,
        });
        self
    }

    /// Adds an operation.
    #[must_use]
    pub fn operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    /// Adds an entity set.
    #[must_use]
    pub fn entity_set(mut self, set: EntitySet) -> Self {
        self.entity_sets.push(set);
        self
    }

    /// Validates all elements and produces the model.
    ///
    /// # Errors
    ///
    /// Returns a `SchemaError` if:
    /// - A type name is declared twice or is not namespace-qualified
    /// - A base type, property type or navigation target does not exist
    /// - The inheritance graph has a cycle
    /// - A concrete entity type has no key, or a key names a missing property
    /// - A bound operation has no binding parameter
    /// - An entity set or navigation binding references something undeclared
    pub fn build(self) -> Result<Model> {
        let mut model = Model::default();

        for ty in self.structured {
            let name = ty.name.clone();
            Self::register_name(&mut model, &name)?;
            model.structured.insert(name, ty);
        }
        for ty in self.enums {
            let name = ty.name.clone();
            Self::register_name(&mut model, &name)?;
            model.enums.insert(name, ty);
        }
        for def in self.type_definitions {
            let name = def.name.clone();
            Self::register_name(&mut model, &name)?;
            model.type_definitions.insert(name, def);
        }

        for ty in model.structured.values() {
            Self::validate_structured(&model, ty)?;
        }

        for op in &self.operations {
            if let Some(ns) = namespace_of(&op.name) {
                model.namespaces.insert(ns.to_string());
            } else {
                return Err(schema_error(format!(
                    "Operation '{}' must be namespace-qualified",
                    op.name
                )));
            }
            if op.is_bound && op.parameters.is_empty() {
                return Err(schema_error(format!(
                    "Bound operation '{}' has no binding parameter",
                    op.name
                )));
            }
            for param in &op.parameters {
                Self::validate_type_ref(&model, &param.type_ref, &op.name)?;
            }
            if let Some(ret) = &op.return_type {
                Self::validate_type_ref(&model, ret, &op.name)?;
            }
        }
        model.operations = self.operations;

        for set in self.entity_sets {
            if model.entity_sets.contains_key(&set.name) {
                return Err(schema_error(format!(
                    "Entity set '{}' already exists",
                    set.name
                )));
            }
            match model.structured.get(&set.entity_type) {
                Some(ty) if ty.kind == StructuredKind::Entity => {}
                _ => {
                    return Err(schema_error(format!(
                        "Entity set '{}' references unknown entity type '{}'",
                        set.name, set.entity_type
                    )))
                }
            }
            model.entity_sets.insert(set.name.clone(), set);
        }
        for set in model.entity_sets.values() {
            for binding in &set.navigation_bindings {
                if !model.entity_sets.contains_key(&binding.target) {
                    return Err(schema_error(format!(
                        "Navigation binding '{}' of '{}' targets unknown entity set '{}'",
                        binding.path, set.name, binding.target
                    )));
                }
            }
        }

        Ok(model)
    }

    fn register_name(model: &mut Model, name: &str) -> Result<()> {
        let Some(ns) = namespace_of(name) else {
            return Err(schema_error(format!(
                "Type '{name}' must be namespace-qualified"
            )));
        };
        if ns == "Edm" {
            return Err(schema_error(format!(
                "Type '{name}' uses the reserved Edm namespace"
            )));
        }
        if model.structured.contains_key(name)
            || model.enums.contains_key(name)
            || model.type_definitions.contains_key(name)
        {
            return Err(schema_error(format!("Type '{name}' already exists")));
        }
        model.namespaces.insert(ns.to_string());
        Ok(())
    }

    fn validate_structured(model: &Model, ty: &StructuredType) -> Result<()> {
        if let Some(base) = &ty.base_type {
            match model.structured.get(base) {
                Some(b) if b.kind == ty.kind => {}
                Some(_) => {
                    return Err(schema_error(format!(
                        "Type '{}' and its base type '{base}' must both be entity or complex types",
                        ty.name
                    )))
                }
                None => {
                    return Err(schema_error(format!(
                        "Base type '{base}' of '{}' does not exist",
                        ty.name
                    )))
                }
            }
            let mut seen = BTreeSet::new();
            let mut current = Some(ty);
            while let Some(t) = current {
                if !seen.insert(t.name.as_str()) {
                    return Err(schema_error(format!(
                        "Type '{}' has a cyclic inheritance chain",
                        ty.name
                    )));
                }
                current = t.base_type.as_deref().and_then(|b| model.structured.get(b));
            }
        }

        for prop in &ty.properties {
            Self::validate_type_ref(model, &prop.type_ref, &ty.name)?;
        }
        for nav in &ty.navigation_properties {
            match model.structured.get(&nav.target_type) {
                Some(t) if t.kind == StructuredKind::Entity => {}
                _ => {
                    return Err(schema_error(format!(
                        "Navigation property '{}.{}' targets unknown entity type '{}'",
                        ty.name, nav.name, nav.target_type
                    )))
                }
            }
        }

        if ty.kind == StructuredKind::Entity {
            let key = model.declared_key(&ty.name);
            if key.is_empty() && !ty.is_abstract {
                return Err(schema_error(format!(
                    "Entity type '{}' has no key",
                    ty.name
                )));
            }
            for part in key {
                if model.find_property(&ty.name, part).is_none() {
                    return Err(schema_error(format!(
                        "Key property '{part}' is not declared on '{}'",
                        ty.name
                    )));
                }
            }
            for alt in &ty.alternate_keys {
                for part in &alt.parts {
                    let head = part.property.split('/').next().unwrap_or_default();
                    if model.find_property(&ty.name, head).is_none() {
                        return Err(schema_error(format!(
                            "Alternate key property '{}' is not declared on '{}'",
                            part.property, ty.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_type_ref(model: &Model, type_ref: &TypeRef, owner: &str) -> Result<()> {
        let exists = match &type_ref.kind {
            TypeKind::Primitive(_) | TypeKind::Synthetic(_) => true,
            TypeKind::Enum(name) => model.enums.contains_key(name),
            TypeKind::TypeDefinition { name, .. } => model.type_definitions.contains_key(name),
            TypeKind::Complex(name) | TypeKind::Entity(name) => {
                model.structured.contains_key(name)
            }
            TypeKind::Collection(item) => return Self::validate_type_ref(model, item, owner),
        };
        if exists {
            Ok(())
        } else {
            Err(schema_error(format!(
                "Type '{}' used by '{owner}' does not exist",
                type_ref.full_name()
            )))
        }
    }
}

fn schema_error(message: String) -> BindError {
    BindError::SchemaError(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Model {
        Model::builder()
            .structured_type(
                StructuredType::entity("Shop.Person")
                    .key(["Id"])
                    .property("Id", TypeRef::int32(false))
                    .property("Name", TypeRef::string()),
            )
            .structured_type(
                StructuredType::entity("Shop.Employee")
                    .with_base("Shop.Person")
                    .property("Salary", TypeRef::decimal(true))
                    .alternate_key(AlternateKey::of(["Badge"]))
                    .property("Badge", TypeRef::string()),
            )
            .entity_set(EntitySet::new("People", "Shop.Person"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_inheritance_queries() {
        let model = sample();
        assert!(model.is_or_inherits_from("Shop.Employee", "Shop.Person"));
        assert!(!model.is_or_inherits_from("Shop.Person", "Shop.Employee"));
        assert!(model.is_related_to("Shop.Person", "Shop.Employee"));
        assert_eq!(model.declared_key("Shop.Employee"), ["Id".to_string()]);
        assert!(model.find_property("Shop.Employee", "Name").is_some());
        assert_eq!(model.alternate_keys("Shop.Employee").len(), 1);
        assert!(model.has_namespace("Shop"));
    }

    #[test]
    fn test_find_type_covers_primitives() {
        let model = sample();
        assert_eq!(
            model.find_type("Edm.Int64"),
            Some(TypeRef::int64(true))
        );
        assert!(model.find_type("Shop.Person").is_some_and(|t| t.is_entity()));
        assert!(model.find_type("Shop.Missing").is_none());
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let result = Model::builder()
            .structured_type(StructuredType::complex("Shop.Address"))
            .structured_type(StructuredType::complex("Shop.Address"))
            .build();
        assert!(matches!(result, Err(BindError::SchemaError(_))));
    }

    #[test]
    fn test_missing_key_property_rejected() {
        let result = Model::builder()
            .structured_type(StructuredType::entity("Shop.Thing").key(["Id"]))
            .build();
        assert!(matches!(result, Err(BindError::SchemaError(msg)) if msg.contains("Id")));
    }

    #[test]
    fn test_inheritance_cycle_rejected() {
        let result = Model::builder()
            .structured_type(StructuredType::complex("Shop.A").with_base("Shop.B"))
            .structured_type(StructuredType::complex("Shop.B").with_base("Shop.A"))
            .build();
        assert!(matches!(result, Err(BindError::SchemaError(msg)) if msg.contains("cyclic")));
    }

    #[test]
    fn test_unknown_binding_target_rejected() {
        let result = Model::builder()
            .structured_type(
                StructuredType::entity("Shop.Person")
                    .key(["Id"])
                    .property("Id", TypeRef::int32(false)),
            )
            .entity_set(EntitySet::new("People", "Shop.Person").binding("Friends", "Nowhere"))
            .build();
        assert!(result.is_err());
    }
}
