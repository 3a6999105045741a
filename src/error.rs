//! Error types for query option binding.

use thiserror::Error;

/// Result type alias using [`BindError`].
pub type Result<T> = std::result::Result<T, BindError>;

/// Coarse classification of a [`BindError`], used by callers to map errors to
/// protocol responses without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The query text could not be tokenized or parsed.
    Syntax,
    /// The schema model itself is invalid.
    Schema,
    /// An operand or expression has the wrong shape or type.
    TypeMismatch,
    /// A name did not resolve against the model or the current scope.
    UnresolvedReference,
    /// Wrong number of operands, keys or values.
    Cardinality,
    /// A reference is not permitted in the current scope.
    Scope,
    /// A configured limit was exceeded.
    ResourceLimit,
}

/// Error types for query option binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    // ==================== Syntax ====================
    /// Parse error with location information.
    #[error("Parse error at line {line}, column {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },

    /// A literal could not be interpreted.
    #[error("Unrecognized literal '{text}': {reason}")]
    InvalidLiteral { text: String, reason: String },

    /// The dispatcher received a token kind it cannot bind in this position.
    #[error("Unsupported token kind: {kind}")]
    UnsupportedTokenKind { kind: String },

    // ==================== Schema ====================
    /// Schema model construction errors (unknown base type, duplicate property, ...).
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// A custom function signature collides with an existing one.
    #[error("A function named '{name}' with the same signature already exists")]
    FunctionSignatureExists { name: String },

    // ==================== Type mismatch ====================
    /// A binary or unary operand is not a single value.
    #[error("The operand for the '{operator}' operator is not a single value")]
    OperandNotSingleValue { operator: String },

    /// Binary operand types have no common promotion.
    #[error("A binary operator with incompatible types was detected. Found operand types '{left}' and '{right}' for operator kind '{operator}'")]
    IncompatibleOperands {
        operator: String,
        left: String,
        right: String,
    },

    /// A unary operand type is not valid for the operator.
    #[error("A unary operator with an incompatible type was detected. Found operand type '{operand}' for operator kind '{operator}'")]
    IncompatibleOperand { operator: String, operand: String },

    /// The right operand of `in` did not bind to a collection.
    #[error("The right operand for the IN operation must be a collection value")]
    RightOperandNotCollection,

    /// A value cannot be converted to the required type.
    #[error("Cannot convert '{value}' to type '{target}'")]
    CannotConvertToType { value: String, target: String },

    /// The `$filter` expression is not a single value.
    #[error("The $filter expression must evaluate to a single value")]
    FilterExpressionNotSingleValue,

    /// The `$filter` expression is not boolean.
    #[error("The $filter expression must evaluate to a boolean value, found '{found}'")]
    FilterExpressionNotBoolean { found: String },

    /// An `$orderby` expression is not a single primitive value.
    #[error("The $orderby expression must evaluate to a single value of primitive type")]
    OrderByExpressionNotSingleValue,

    /// The `$search` expression is not a single value.
    #[error("The $search expression must evaluate to a single value")]
    SearchExpressionNotSingleValue,

    /// A `$compute` expression is not a single value.
    #[error("The $compute expression for alias '{alias}' must evaluate to a single value")]
    ComputeExpressionNotSingleValue { alias: String },

    /// `$count` was applied to something other than a collection.
    #[error("The $count segment must follow a collection, found '{segment}'")]
    CountSegmentParentNotCollection { segment: String },

    /// The source of `any`/`all` is not a collection.
    #[error("The parent value for a lambda expression must be a collection")]
    LambdaParentMustBeCollection,

    /// The body of `any`/`all` is not a single value.
    #[error("The expression of an any/all lambda must evaluate to a single value")]
    AnyAllExpressionNotSingleValue,

    /// The body of `any`/`all` is not boolean.
    #[error("The expression of an any/all lambda must evaluate to a boolean value, found '{found}'")]
    AnyAllExpressionNotBoolean { found: String },

    /// A property access was attempted on something that is not a single structured value.
    #[error("The parent of property '{property}' must be a single structured value")]
    PropertyAccessSourceNotSingleValue { property: String },

    /// A key predicate was applied to something other than a collection of entities.
    #[error("Key lookup on '{segment}' requires a collection of entities")]
    KeyLookupOnlyOnEntityCollection { segment: String },

    /// A type cast names a type unrelated to the source type.
    #[error("Type '{child}' is not related to type '{parent}'")]
    TypeNotRelated { parent: String, child: String },

    /// Enum values can only be cast to or from string.
    #[error("Enumeration type value can only be cast to or from string")]
    CastEnumRestriction,

    /// An aggregate expression is not a single primitive value.
    #[error("The aggregate expression '{expression}' must evaluate to a single primitive value")]
    AggregateExpressionNotSingleValue { expression: String },

    /// The aggregation method does not accept the expression type.
    #[error("Aggregation method '{method}' does not support the expression type '{type_name}' of '{expression}'")]
    AggregateExpressionIncompatibleType {
        expression: String,
        type_name: String,
        method: String,
    },

    // ==================== Unresolved reference ====================
    /// No function with this name exists.
    #[error("An unknown function with name '{name}' was found")]
    UnknownFunction { name: String },

    /// No signature of a function accepts the argument types.
    #[error("No function signature for the function with name '{name}' matches the specified arguments. The function signatures considered are: {signatures}")]
    NoApplicableFunctionFound { name: String, signatures: String },

    /// No signature of a function accepts the number of arguments.
    #[error("Cannot find a suitable overload for function '{name}' that takes '{argument_count}' arguments")]
    CannotFindASuitableOverload { name: String, argument_count: usize },

    /// A case-insensitive lookup matched more than one candidate.
    #[error("More than one item named '{name}' was found (case-insensitive)")]
    AmbiguousName { name: String },

    /// Several bound operations match equally well.
    #[error("Multiple bound operations named '{name}' match the binding type '{binding_type}'")]
    AmbiguousOperation { name: String, binding_type: String },

    /// The property is not declared on a closed type.
    #[error("Could not find a property named '{property}' on type '{type_name}'")]
    PropertyNotDeclared { type_name: String, property: String },

    /// A range variable is not in scope.
    #[error("The range variable '{name}' is not in scope")]
    RangeVariableNotInScope { name: String },

    /// A parameter alias has no value.
    #[error("No value was supplied for parameter alias '{alias}'")]
    ParameterAliasNotFound { alias: String },

    /// A type name did not resolve.
    #[error("The type '{name}' was not found in the model")]
    TypeNotFound { name: String },

    /// The target entity set of a query did not resolve.
    #[error("The entity set '{name}' was not found in the model")]
    EntitySetNotFound { name: String },

    /// An enum literal names a member that does not exist.
    #[error("The value '{member}' is not a member of enumeration type '{type_name}'")]
    EnumMemberNotFound { type_name: String, member: String },

    /// The aggregation verb is not one of the supported methods.
    #[error("Unsupported aggregation verb '{verb}'")]
    UnsupportedAggregateVerb { verb: String },

    /// A namespace in a `Namespace.*` selection is unknown.
    #[error("The namespace '{namespace}' does not exist in the model")]
    NamespaceNotFound { namespace: String },

    // ==================== Cardinality ====================
    /// `cast` / `isof` were called with the wrong number of arguments.
    #[error("The '{function}' function requires one or two arguments, found {count}")]
    CastOrIsOfWrongNumberOfOperands { function: String, count: usize },

    /// The key values match neither the declared key nor an alternate key.
    #[error("The key values specified for '{segment}' do not match the declared key or any alternate key")]
    NotAllKeyPropertiesSpecified { segment: String },

    /// A key property was specified twice.
    #[error("The key property '{property}' was specified more than once")]
    DuplicateKeyProperty { property: String },

    /// More than one unnamed key value on a type with a composite key.
    #[error("Unnamed key values can only be used for a type with a single key property, segment '{segment}'")]
    MultipleUntaggedKeyValues { segment: String },

    // ==================== Scope ====================
    /// Access to a property that does not exist after aggregation.
    #[error("'{property}' is not accessible after an aggregation or grouping transformation")]
    GroupByPropertyNotPropertyAccessValue { property: String },

    /// Query options were nested beneath a navigation property in `$select`.
    #[error("Query options are not allowed below the navigation property in select path '{path}'")]
    QueryOptionNestedUnderNavigation { path: String },

    /// Query options were applied to a multi-segment non-navigation select path.
    #[error("Query options are not allowed on the multi-level select path '{path}'")]
    MultiLevelPathInSelect { path: String },

    /// A system segment such as `$ref` or `$count` appeared in `$select`.
    #[error("The system token '{token}' is not allowed in $select")]
    SystemTokenInSelect { token: String },

    /// A navigation property in `$select` was followed by further segments.
    #[error("A navigation property must be the last segment of select path '{path}'")]
    NavigationNotLastInSelect { path: String },

    /// An expand path does not end in a navigation property.
    #[error("The expand path '{path}' must end in a navigation property")]
    ExpandPathNotNavigation { path: String },

    /// A wildcard appears where it is not permitted.
    #[error("Invalid wildcard usage in path '{path}'")]
    InvalidWildcard { path: String },

    /// An option that is not valid on this kind of select or expand term.
    #[error("The query option '{option}' is not supported on path '{path}'")]
    InvalidNestedOption { path: String, option: String },

    /// No implicit range variable is available for a path without a parent.
    #[error("The identifier '{identifier}' requires an implicit range variable")]
    ImplicitRangeVariableMissing { identifier: String },

    // ==================== Resource limits ====================
    /// Token nesting exceeded the configured recursion limit.
    #[error("The recursion limit of {limit} was exceeded while binding")]
    TooDeepRecursion { limit: usize },

    /// Expand nesting exceeded the configured depth.
    #[error("The expansion depth {depth} exceeds the maximum of {limit}")]
    ExpansionDepthExceeded { depth: usize, limit: usize },

    /// Too many expanded items.
    #[error("The number of expanded items {count} exceeds the maximum of {limit}")]
    ExpansionCountExceeded { count: usize, limit: usize },
}

impl BindError {
    /// Returns the coarse category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            BindError::ParseError { .. }
            | BindError::InvalidLiteral { .. }
            | BindError::UnsupportedTokenKind { .. } => ErrorCategory::Syntax,

            BindError::SchemaError(_) | BindError::FunctionSignatureExists { .. } => {
                ErrorCategory::Schema
            }

            BindError::OperandNotSingleValue { .. }
            | BindError::IncompatibleOperands { .. }
            | BindError::IncompatibleOperand { .. }
            | BindError::RightOperandNotCollection
            | BindError::CannotConvertToType { .. }
            | BindError::FilterExpressionNotSingleValue
            | BindError::FilterExpressionNotBoolean { .. }
            | BindError::OrderByExpressionNotSingleValue
            | BindError::SearchExpressionNotSingleValue
            | BindError::ComputeExpressionNotSingleValue { .. }
            | BindError::CountSegmentParentNotCollection { .. }
            | BindError::LambdaParentMustBeCollection
            | BindError::AnyAllExpressionNotSingleValue
            | BindError::AnyAllExpressionNotBoolean { .. }
            | BindError::PropertyAccessSourceNotSingleValue { .. }
            | BindError::KeyLookupOnlyOnEntityCollection { .. }
            | BindError::TypeNotRelated { .. }
            | BindError::CastEnumRestriction
            | BindError::AggregateExpressionNotSingleValue { .. }
            | BindError::AggregateExpressionIncompatibleType { .. } => ErrorCategory::TypeMismatch,

            BindError::UnknownFunction { .. }
            | BindError::NoApplicableFunctionFound { .. }
            | BindError::CannotFindASuitableOverload { .. }
            | BindError::AmbiguousName { .. }
            | BindError::AmbiguousOperation { .. }
            | BindError::PropertyNotDeclared { .. }
            | BindError::RangeVariableNotInScope { .. }
            | BindError::ParameterAliasNotFound { .. }
            | BindError::TypeNotFound { .. }
            | BindError::EntitySetNotFound { .. }
            | BindError::EnumMemberNotFound { .. }
            | BindError::UnsupportedAggregateVerb { .. }
            | BindError::NamespaceNotFound { .. } => ErrorCategory::UnresolvedReference,

            BindError::CastOrIsOfWrongNumberOfOperands { .. }
            | BindError::NotAllKeyPropertiesSpecified { .. }
            | BindError::DuplicateKeyProperty { .. }
            | BindError::MultipleUntaggedKeyValues { .. } => ErrorCategory::Cardinality,

            BindError::GroupByPropertyNotPropertyAccessValue { .. }
            | BindError::QueryOptionNestedUnderNavigation { .. }
            | BindError::MultiLevelPathInSelect { .. }
            | BindError::SystemTokenInSelect { .. }
            | BindError::NavigationNotLastInSelect { .. }
            | BindError::ExpandPathNotNavigation { .. }
            | BindError::InvalidWildcard { .. }
            | BindError::InvalidNestedOption { .. }
            | BindError::ImplicitRangeVariableMissing { .. } => ErrorCategory::Scope,

            BindError::TooDeepRecursion { .. }
            | BindError::ExpansionDepthExceeded { .. }
            | BindError::ExpansionCountExceeded { .. } => ErrorCategory::ResourceLimit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = BindError::PropertyNotDeclared {
            type_name: "Shop.Customer".into(),
            property: "Nickname".into(),
        };
        assert_eq!(
            err.to_string(),
            "Could not find a property named 'Nickname' on type 'Shop.Customer'"
        );

        let err = BindError::TooDeepRecursion { limit: 10 };
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            BindError::TooDeepRecursion { limit: 1 }.category(),
            ErrorCategory::ResourceLimit
        );
        assert_eq!(
            BindError::DuplicateKeyProperty {
                property: "Id".into()
            }
            .category(),
            ErrorCategory::Cardinality
        );
        assert_eq!(
            BindError::GroupByPropertyNotPropertyAccessValue {
                property: "Name".into()
            }
            .category(),
            ErrorCategory::Scope
        );
        assert_eq!(
            BindError::RightOperandNotCollection.category(),
            ErrorCategory::TypeMismatch
        );
    }
}
