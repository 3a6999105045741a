//! Bound (semantic) node tree.

use crate::binder::clause::{FilterClause, SearchClause};
use crate::binder::state::RangeVariable;
use crate::parser::{BinaryOperatorKind, UnaryOperatorKind};
use crate::types::{TypeRef, Value};

/// Shape of a bound node: single or collection, value or structured resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    /// A single primitive, enum or unknown value.
    SingleValue,
    /// A single entity or complex value.
    SingleResource,
    /// A collection of primitive, enum or unknown values.
    CollectionValue,
    /// A collection of entity or complex values.
    CollectionResource,
}

impl NodeCategory {
    /// Single values and single resources.
    #[must_use]
    pub fn is_single(self) -> bool {
        matches!(self, NodeCategory::SingleValue | NodeCategory::SingleResource)
    }

    /// Collections of values or resources.
    #[must_use]
    pub fn is_collection(self) -> bool {
        !self.is_single()
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantNode {
    /// The value.
    pub value: Value,
    /// Source text, when the value came from the URI.
    pub literal_text: Option<String>,
    /// Value type, `None` for an untyped `null`.
    pub type_ref: Option<TypeRef>,
}

impl ConstantNode {
    /// Creates a constant typed after its value.
    #[must_use]
    pub fn new(value: Value, literal_text: Option<String>) -> Self {
        let type_ref = match &value {
            Value::Enum(e) => Some(TypeRef::enumeration(e.type_name.clone(), false)),
            other => other
                .primitive_kind()
                .map(|kind| TypeRef::primitive(kind, false)),
        };
        ConstantNode {
            value,
            literal_text,
            type_ref,
        }
    }
}

/// A collection literal such as the right side of `in`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionConstantNode {
    /// Items.
    pub items: Vec<ConstantNode>,
    /// Source text.
    pub literal_text: String,
    /// Collection type.
    pub type_ref: TypeRef,
}

/// An implicit conversion inserted by type promotion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertNode {
    /// Converted value.
    pub source: Box<QueryNode>,
    /// Target type.
    pub type_ref: TypeRef,
}

/// A binary operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOperatorNode {
    /// Operator.
    pub kind: BinaryOperatorKind,
    /// Left operand, after promotion.
    pub left: Box<QueryNode>,
    /// Right operand, after promotion.
    pub right: Box<QueryNode>,
    /// Result type, `None` when both operands are untyped.
    pub type_ref: Option<TypeRef>,
}

/// A unary operation.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOperatorNode {
    /// Operator.
    pub kind: UnaryOperatorKind,
    /// Operand.
    pub operand: Box<QueryNode>,
    /// Result type.
    pub type_ref: Option<TypeRef>,
}

/// `left in right`.
#[derive(Debug, Clone, PartialEq)]
pub struct InNode {
    /// Tested value.
    pub left: Box<QueryNode>,
    /// Collection.
    pub right: Box<QueryNode>,
}

/// A reference to `$it` or a lambda variable.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeVariableReferenceNode {
    /// Variable name.
    pub name: String,
    /// Variable type, `None` when ranging over an untyped collection.
    pub type_ref: Option<TypeRef>,
    /// Entity set of the variable.
    pub navigation_source: Option<String>,
}

impl From<&RangeVariable> for RangeVariableReferenceNode {
    fn from(variable: &RangeVariable) -> Self {
        RangeVariableReferenceNode {
            name: variable.name.clone(),
            type_ref: variable.type_ref.clone(),
            navigation_source: variable.navigation_source.clone(),
        }
    }
}

/// Access to a declared structural property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAccessNode {
    /// Structured value owning the property.
    pub source: Box<QueryNode>,
    /// Property name as declared.
    pub property: String,
    /// Declared type.
    pub type_ref: TypeRef,
}

/// Access to a dynamic property of an open type, or to a computed alias.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPropertyAccessNode {
    /// Structured value owning the property.
    pub source: Box<QueryNode>,
    /// Property name.
    pub name: String,
    /// Known type of a computed alias, `None` for dynamic properties.
    pub type_ref: Option<TypeRef>,
}

/// Traversal of a navigation property.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationNode {
    /// Entity owning the navigation property.
    pub source: Box<QueryNode>,
    /// Navigation property name.
    pub property: String,
    /// Declared type, a collection for to-many navigations.
    pub type_ref: TypeRef,
    /// Target entity set when the binding is known.
    pub navigation_source: Option<String>,
}

/// One key property value of a key lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPropertyValue {
    /// Key property name.
    pub property: String,
    /// Bound value converted to the property type.
    pub value: QueryNode,
}

/// Selection of one entity out of a collection by key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyLookupNode {
    /// Collection of entities.
    pub source: Box<QueryNode>,
    /// Key values in key declaration order.
    pub keys: Vec<KeyPropertyValue>,
    /// Entity type.
    pub type_ref: TypeRef,
    /// Entity set.
    pub navigation_source: Option<String>,
}

/// A cast to a derived structured type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCastNode {
    /// Casted value.
    pub source: Box<QueryNode>,
    /// Target type, a collection for collection casts.
    pub type_ref: TypeRef,
    /// Entity set of the source.
    pub navigation_source: Option<String>,
}

/// A call to a URI function or a bound schema function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallNode {
    /// Function name.
    pub name: String,
    /// Bound operation names considered, empty for URI functions.
    pub operations: Vec<String>,
    /// Arguments after conversion to the parameter types.
    pub arguments: Vec<QueryNode>,
    /// Binding value of a bound function.
    pub source: Option<Box<QueryNode>>,
    /// Return type, `None` when it cannot be determined.
    pub type_ref: Option<TypeRef>,
    /// Entity set of an entity-returning function.
    pub navigation_source: Option<String>,
}

/// A named argument of a bound function.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedFunctionParameterNode {
    /// Parameter name.
    pub name: String,
    /// Argument value.
    pub value: Box<QueryNode>,
}

/// `any` or `all`.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaNode {
    /// Collection being tested.
    pub source: Box<QueryNode>,
    /// Lambda variable, `None` for `any()`.
    pub range_variable: Option<RangeVariable>,
    /// Predicate, `None` for `any()`.
    pub body: Option<Box<QueryNode>>,
}

/// `$count` over a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CountNode {
    /// Counted collection.
    pub source: Box<QueryNode>,
    /// Nested `$filter`.
    pub filter: Option<Box<FilterClause>>,
    /// Nested `$search`.
    pub search: Option<Box<SearchClause>>,
}

/// A reference to a parameter alias such as `@p`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterAliasNode {
    /// Alias including the `@`.
    pub alias: String,
    /// Type of the alias value, `None` if it is untyped.
    pub type_ref: Option<TypeRef>,
    /// True when the alias value is a collection.
    pub is_collection: bool,
}

/// A free-text `$search` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTermNode {
    /// Search text.
    pub text: String,
}

/// Bound expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// Literal value.
    Constant(ConstantNode),
    /// Literal collection.
    CollectionConstant(CollectionConstantNode),
    /// Implicit conversion.
    Convert(ConvertNode),
    /// Binary operation.
    BinaryOperator(BinaryOperatorNode),
    /// Unary operation.
    UnaryOperator(UnaryOperatorNode),
    /// `in` test.
    In(InNode),
    /// `$it` or lambda variable.
    RangeVariableReference(RangeVariableReferenceNode),
    /// Primitive, enum or type definition property.
    SingleValuePropertyAccess(PropertyAccessNode),
    /// Complex property.
    SingleComplexProperty(PropertyAccessNode),
    /// Collection of primitive or enum values.
    CollectionPropertyAccess(PropertyAccessNode),
    /// Collection of complex values.
    CollectionComplexProperty(PropertyAccessNode),
    /// Dynamic single-valued property.
    SingleValueOpenPropertyAccess(OpenPropertyAccessNode),
    /// Dynamic collection-valued property.
    CollectionOpenPropertyAccess(OpenPropertyAccessNode),
    /// To-one navigation.
    SingleNavigation(NavigationNode),
    /// To-many navigation.
    CollectionNavigation(NavigationNode),
    /// Key lookup on an entity collection.
    KeyLookup(KeyLookupNode),
    /// Cast of a single resource.
    SingleResourceCast(ResourceCastNode),
    /// Cast of a resource collection.
    CollectionResourceCast(ResourceCastNode),
    /// Function returning a single primitive or enum value.
    SingleValueFunctionCall(FunctionCallNode),
    /// Function returning a single entity or complex value.
    SingleResourceFunctionCall(FunctionCallNode),
    /// Function returning a collection of primitive or enum values.
    CollectionFunctionCall(FunctionCallNode),
    /// Function returning a collection of entities or complex values.
    CollectionResourceFunctionCall(FunctionCallNode),
    /// Named argument of a bound function.
    NamedFunctionParameter(NamedFunctionParameterNode),
    /// `any` lambda.
    Any(LambdaNode),
    /// `all` lambda.
    All(LambdaNode),
    /// `$count` segment.
    Count(CountNode),
    /// Parameter alias reference.
    ParameterAlias(ParameterAliasNode),
    /// `$search` term.
    SearchTerm(SearchTermNode),
}

static BOOLEAN: once_cell::sync::Lazy<TypeRef> =
    once_cell::sync::Lazy::new(|| TypeRef::boolean(false));
static NULLABLE_BOOLEAN: once_cell::sync::Lazy<TypeRef> =
    once_cell::sync::Lazy::new(|| TypeRef::boolean(true));
static COUNT: once_cell::sync::Lazy<TypeRef> =
    once_cell::sync::Lazy::new(|| TypeRef::int64(false));

fn structured_or_value(type_ref: Option<&TypeRef>) -> NodeCategory {
    match type_ref {
        Some(t) if t.is_collection() && t.item_type().is_structured() => {
            NodeCategory::CollectionResource
        }
        Some(t) if t.is_collection() => NodeCategory::CollectionValue,
        Some(t) if t.is_structured() => NodeCategory::SingleResource,
        _ => NodeCategory::SingleValue,
    }
}

impl QueryNode {
    /// Classifies the node.
    #[must_use]
    pub fn category(&self) -> NodeCategory {
        match self {
            QueryNode::Constant(_)
            | QueryNode::Convert(_)
            | QueryNode::BinaryOperator(_)
            | QueryNode::UnaryOperator(_)
            | QueryNode::In(_)
            | QueryNode::SingleValuePropertyAccess(_)
            | QueryNode::SingleValueOpenPropertyAccess(_)
            | QueryNode::SingleValueFunctionCall(_)
            | QueryNode::Any(_)
            | QueryNode::All(_)
            | QueryNode::Count(_)
            | QueryNode::SearchTerm(_) => NodeCategory::SingleValue,
            QueryNode::SingleComplexProperty(_)
            | QueryNode::SingleNavigation(_)
            | QueryNode::KeyLookup(_)
            | QueryNode::SingleResourceCast(_)
            | QueryNode::SingleResourceFunctionCall(_) => NodeCategory::SingleResource,
            QueryNode::CollectionConstant(_)
            | QueryNode::CollectionPropertyAccess(_)
            | QueryNode::CollectionOpenPropertyAccess(_)
            | QueryNode::CollectionFunctionCall(_) => NodeCategory::CollectionValue,
            QueryNode::CollectionComplexProperty(_)
            | QueryNode::CollectionNavigation(_)
            | QueryNode::CollectionResourceCast(_)
            | QueryNode::CollectionResourceFunctionCall(_) => NodeCategory::CollectionResource,
            QueryNode::RangeVariableReference(r) => structured_or_value(r.type_ref.as_ref()),
            QueryNode::NamedFunctionParameter(p) => p.value.category(),
            QueryNode::ParameterAlias(a) if a.is_collection => match &a.type_ref {
                Some(t) if t.item_type().is_structured() => NodeCategory::CollectionResource,
                _ => NodeCategory::CollectionValue,
            },
            QueryNode::ParameterAlias(a) => structured_or_value(a.type_ref.as_ref()),
        }
    }

    /// Returns true for single values and single resources.
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.category().is_single()
    }

    /// Returns true for collections.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.category().is_collection()
    }

    /// Returns the resolved type, `None` for untyped values.
    #[must_use]
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match self {
            QueryNode::Constant(c) => c.type_ref.as_ref(),
            QueryNode::CollectionConstant(c) => Some(&c.type_ref),
            QueryNode::Convert(c) => Some(&c.type_ref),
            QueryNode::BinaryOperator(b) => b.type_ref.as_ref(),
            QueryNode::UnaryOperator(u) => u.type_ref.as_ref(),
            QueryNode::In(_) => Some(&BOOLEAN),
            QueryNode::RangeVariableReference(r) => r.type_ref.as_ref(),
            QueryNode::SingleValuePropertyAccess(p)
            | QueryNode::SingleComplexProperty(p)
            | QueryNode::CollectionPropertyAccess(p)
            | QueryNode::CollectionComplexProperty(p) => Some(&p.type_ref),
            QueryNode::SingleValueOpenPropertyAccess(o)
            | QueryNode::CollectionOpenPropertyAccess(o) => o.type_ref.as_ref(),
            QueryNode::SingleNavigation(n) | QueryNode::CollectionNavigation(n) => {
                Some(&n.type_ref)
            }
            QueryNode::KeyLookup(k) => Some(&k.type_ref),
            QueryNode::SingleResourceCast(c) | QueryNode::CollectionResourceCast(c) => {
                Some(&c.type_ref)
            }
            QueryNode::SingleValueFunctionCall(f)
            | QueryNode::SingleResourceFunctionCall(f)
            | QueryNode::CollectionFunctionCall(f)
            | QueryNode::CollectionResourceFunctionCall(f) => f.type_ref.as_ref(),
            QueryNode::NamedFunctionParameter(p) => p.value.type_ref(),
            QueryNode::Any(_) | QueryNode::All(_) => Some(&NULLABLE_BOOLEAN),
            QueryNode::Count(_) => Some(&COUNT),
            QueryNode::ParameterAlias(a) => a.type_ref.as_ref(),
            QueryNode::SearchTerm(_) => Some(&BOOLEAN),
        }
    }

    /// Returns the entity set this node's entities belong to, if known.
    #[must_use]
    pub fn navigation_source(&self) -> Option<&str> {
        match self {
            QueryNode::RangeVariableReference(r) => r.navigation_source.as_deref(),
            QueryNode::SingleNavigation(n) | QueryNode::CollectionNavigation(n) => {
                n.navigation_source.as_deref()
            }
            QueryNode::KeyLookup(k) => k.navigation_source.as_deref(),
            QueryNode::SingleResourceCast(c) | QueryNode::CollectionResourceCast(c) => {
                c.navigation_source.as_deref()
            }
            QueryNode::SingleResourceFunctionCall(f)
            | QueryNode::CollectionResourceFunctionCall(f) => f.navigation_source.as_deref(),
            _ => None,
        }
    }

    /// Returns the variant name, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            QueryNode::Constant(_) => "Constant",
            QueryNode::CollectionConstant(_) => "CollectionConstant",
            QueryNode::Convert(_) => "Convert",
            QueryNode::BinaryOperator(_) => "BinaryOperator",
            QueryNode::UnaryOperator(_) => "UnaryOperator",
            QueryNode::In(_) => "In",
            QueryNode::RangeVariableReference(_) => "RangeVariableReference",
            QueryNode::SingleValuePropertyAccess(_) => "SingleValuePropertyAccess",
            QueryNode::SingleComplexProperty(_) => "SingleComplexProperty",
            QueryNode::CollectionPropertyAccess(_) => "CollectionPropertyAccess",
            QueryNode::CollectionComplexProperty(_) => "CollectionComplexProperty",
            QueryNode::SingleValueOpenPropertyAccess(_) => "SingleValueOpenPropertyAccess",
            QueryNode::CollectionOpenPropertyAccess(_) => "CollectionOpenPropertyAccess",
            QueryNode::SingleNavigation(_) => "SingleNavigation",
            QueryNode::CollectionNavigation(_) => "CollectionNavigation",
            QueryNode::KeyLookup(_) => "KeyLookup",
            QueryNode::SingleResourceCast(_) => "SingleResourceCast",
            QueryNode::CollectionResourceCast(_) => "CollectionResourceCast",
            QueryNode::SingleValueFunctionCall(_) => "SingleValueFunctionCall",
            QueryNode::SingleResourceFunctionCall(_) => "SingleResourceFunctionCall",
            QueryNode::CollectionFunctionCall(_) => "CollectionFunctionCall",
            QueryNode::CollectionResourceFunctionCall(_) => "CollectionResourceFunctionCall",
            QueryNode::NamedFunctionParameter(_) => "NamedFunctionParameter",
            QueryNode::Any(_) => "Any",
            QueryNode::All(_) => "All",
            QueryNode::Count(_) => "Count",
            QueryNode::ParameterAlias(_) => "ParameterAlias",
            QueryNode::SearchTerm(_) => "SearchTerm",
        }
    }

    /// Returns true for a `null` literal.
    #[must_use]
    pub fn is_null_constant(&self) -> bool {
        matches!(self, QueryNode::Constant(c) if c.value.is_null())
    }

    /// Creates a constant node.
    #[must_use]
    pub fn constant(value: Value) -> Self {
        QueryNode::Constant(ConstantNode::new(value, None))
    }

    /// Creates a `$it` or lambda variable reference.
    #[must_use]
    pub fn range_variable(variable: &RangeVariable) -> Self {
        QueryNode::RangeVariableReference(variable.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;

    #[test]
    fn test_constant_types_follow_value() {
        let node = ConstantNode::new(Value::Int32(5), Some("5".into()));
        assert_eq!(node.type_ref, Some(TypeRef::int32(false)));
        let null = ConstantNode::new(Value::Null, None);
        assert_eq!(null.type_ref, None);
    }

    #[test]
    fn test_range_variable_category() {
        let entity = RangeVariable::new("$it", Some(TypeRef::entity("Shop.Customer", false)), None);
        assert_eq!(
            QueryNode::range_variable(&entity).category(),
            NodeCategory::SingleResource
        );
        let value = RangeVariable::new("x", Some(TypeRef::string()), None);
        assert_eq!(
            QueryNode::range_variable(&value).category(),
            NodeCategory::SingleValue
        );
    }

    #[test]
    fn test_count_is_non_nullable_int64() {
        let source = QueryNode::CollectionOpenPropertyAccess(OpenPropertyAccessNode {
            source: Box::new(QueryNode::constant(Value::Null)),
            name: "Tags".into(),
            type_ref: None,
        });
        let count = QueryNode::Count(CountNode {
            source: Box::new(source),
            filter: None,
            search: None,
        });
        let ty = count.type_ref().unwrap();
        assert!(ty.is_primitive_kind(PrimitiveKind::Int64));
        assert!(!ty.nullable);
    }
}
