//! Syntactic token tree for OData query options.
//!
//! Tokens are unbound: identifiers are plain strings and nothing has been
//! checked against the schema. Path-like tokens point to their syntactic
//! predecessor through `next`/`source`, so `Orders/Amount` is an `EndPath`
//! for `Amount` whose `next` is an `InnerPath` for `Orders`.

use std::fmt;

use crate::types::Value;

/// Binary operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperatorKind {
    /// `or`
    Or,
    /// `and`
    And,
    /// `eq`
    Equal,
    /// `ne`
    NotEqual,
    /// `gt`
    GreaterThan,
    /// `ge`
    GreaterThanOrEqual,
    /// `lt`
    LessThan,
    /// `le`
    LessThanOrEqual,
    /// `has`
    Has,
    /// `add`
    Add,
    /// `sub`
    Subtract,
    /// `mul`
    Multiply,
    /// `div`
    Divide,
    /// `divby`
    DivideBy,
    /// `mod`
    Modulo,
}

impl BinaryOperatorKind {
    /// Parses the URI keyword of an operator.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "or" => BinaryOperatorKind::Or,
            "and" => BinaryOperatorKind::And,
            "eq" => BinaryOperatorKind::Equal,
            "ne" => BinaryOperatorKind::NotEqual,
            "gt" => BinaryOperatorKind::GreaterThan,
            "ge" => BinaryOperatorKind::GreaterThanOrEqual,
            "lt" => BinaryOperatorKind::LessThan,
            "le" => BinaryOperatorKind::LessThanOrEqual,
            "has" => BinaryOperatorKind::Has,
            "add" => BinaryOperatorKind::Add,
            "sub" => BinaryOperatorKind::Subtract,
            "mul" => BinaryOperatorKind::Multiply,
            "div" => BinaryOperatorKind::Divide,
            "divby" => BinaryOperatorKind::DivideBy,
            "mod" => BinaryOperatorKind::Modulo,
            _ => return None,
        })
    }

    /// Returns the URI keyword.
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self {
            BinaryOperatorKind::Or => "or",
            BinaryOperatorKind::And => "and",
            BinaryOperatorKind::Equal => "eq",
            BinaryOperatorKind::NotEqual => "ne",
            BinaryOperatorKind::GreaterThan => "gt",
            BinaryOperatorKind::GreaterThanOrEqual => "ge",
            BinaryOperatorKind::LessThan => "lt",
            BinaryOperatorKind::LessThanOrEqual => "le",
            BinaryOperatorKind::Has => "has",
            BinaryOperatorKind::Add => "add",
            BinaryOperatorKind::Subtract => "sub",
            BinaryOperatorKind::Multiply => "mul",
            BinaryOperatorKind::Divide => "div",
            BinaryOperatorKind::DivideBy => "divby",
            BinaryOperatorKind::Modulo => "mod",
        }
    }

    /// `and` / `or`.
    #[must_use]
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperatorKind::Or | BinaryOperatorKind::And)
    }

    /// `eq` / `ne`.
    #[must_use]
    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOperatorKind::Equal | BinaryOperatorKind::NotEqual)
    }

    /// `gt` / `ge` / `lt` / `le`.
    #[must_use]
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOperatorKind::GreaterThan
                | BinaryOperatorKind::GreaterThanOrEqual
                | BinaryOperatorKind::LessThan
                | BinaryOperatorKind::LessThanOrEqual
        )
    }

    /// Operators producing a boolean result.
    #[must_use]
    pub fn is_boolean_result(&self) -> bool {
        self.is_logical()
            || self.is_equality()
            || self.is_relational()
            || matches!(self, BinaryOperatorKind::Has)
    }
}

impl fmt::Display for BinaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperatorKind {
    /// Arithmetic negation `-`.
    Negate,
    /// Logical `not`.
    Not,
}

impl fmt::Display for UnaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperatorKind::Negate => f.write_str("-"),
            UnaryOperatorKind::Not => f.write_str("not"),
        }
    }
}

/// A literal as written in the URI.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralToken {
    /// Parsed value. `None` for collection or JSON text that can only be
    /// interpreted once the expected type is known.
    pub value: Option<Value>,
    /// Source text.
    pub original_text: String,
}

impl LiteralToken {
    /// Creates a literal with a known value.
    #[must_use]
    pub fn new(value: Value, original_text: impl Into<String>) -> Self {
        LiteralToken {
            value: Some(value),
            original_text: original_text.into(),
        }
    }

    /// Creates a literal whose text is interpreted during binding.
    #[must_use]
    pub fn raw(original_text: impl Into<String>) -> Self {
        LiteralToken {
            value: None,
            original_text: original_text.into(),
        }
    }
}

/// A `name=value` pair in a key predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    /// Key property name or alternate-key alias, `None` for `(1)`.
    pub name: Option<String>,
    /// Value token.
    pub value: QueryToken,
}

/// Last segment of a member access path.
#[derive(Debug, Clone, PartialEq)]
pub struct EndPathToken {
    /// Property name.
    pub identifier: String,
    /// Preceding segment, `None` when relative to `$it`.
    pub next: Option<Box<QueryToken>>,
}

/// Intermediate segment of a member access path, possibly with a key predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct InnerPathToken {
    /// Property name.
    pub identifier: String,
    /// Preceding segment.
    pub next: Option<Box<QueryToken>>,
    /// Key predicate values.
    pub named_values: Vec<NamedValue>,
}

/// A namespace-qualified segment: a type cast, an enum literal or a bound
/// operation without parentheses.
#[derive(Debug, Clone, PartialEq)]
pub struct DottedIdentifierToken {
    /// Qualified identifier, including a trailing `'member'` for enum literals.
    pub identifier: String,
    /// Preceding segment.
    pub next: Option<Box<QueryToken>>,
}

/// A function argument, optionally named.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParameterToken {
    /// Parameter name for `Fn(p=1)` style calls.
    pub name: Option<String>,
    /// Argument value.
    pub value: Box<QueryToken>,
}

impl FunctionParameterToken {
    /// Creates a positional argument.
    #[must_use]
    pub fn positional(value: QueryToken) -> Self {
        FunctionParameterToken {
            name: None,
            value: Box::new(value),
        }
    }

    /// Creates a named argument.
    #[must_use]
    pub fn named(name: impl Into<String>, value: QueryToken) -> Self {
        FunctionParameterToken {
            name: Some(name.into()),
            value: Box::new(value),
        }
    }
}

/// A function or operation call.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallToken {
    /// Function name, possibly namespace-qualified.
    pub name: String,
    /// Arguments in call order.
    pub arguments: Vec<FunctionParameterToken>,
    /// Binding source for bound operations.
    pub source: Option<Box<QueryToken>>,
}

/// `any` / `all` lambda.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaToken {
    /// Collection the lambda ranges over.
    pub parent: Box<QueryToken>,
    /// Lambda variable name, `None` for `any()`.
    pub parameter: Option<String>,
    /// Predicate, `None` for `any()`.
    pub expression: Option<Box<QueryToken>>,
}

/// `$count` segment with optional nested `$filter`/`$search`.
#[derive(Debug, Clone, PartialEq)]
pub struct CountSegmentToken {
    /// Collection being counted.
    pub next: Box<QueryToken>,
    /// Nested `$filter`.
    pub filter: Option<Box<QueryToken>>,
    /// Nested `$search`.
    pub search: Option<Box<QueryToken>>,
}

/// A query option the binder does not understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomQueryOptionToken {
    /// Option name.
    pub name: String,
    /// Option value.
    pub value: Option<String>,
}

/// Expression token.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryToken {
    /// Typed literal.
    Literal(LiteralToken),
    /// Free-text `$search` term.
    StringLiteral(String),
    /// Binary operation.
    BinaryOperator {
        /// Operator.
        kind: BinaryOperatorKind,
        /// Left operand.
        left: Box<QueryToken>,
        /// Right operand.
        right: Box<QueryToken>,
    },
    /// Unary operation.
    UnaryOperator {
        /// Operator.
        kind: UnaryOperatorKind,
        /// Operand.
        operand: Box<QueryToken>,
    },
    /// `left in right`.
    In {
        /// Tested value.
        left: Box<QueryToken>,
        /// Collection.
        right: Box<QueryToken>,
    },
    /// Trailing member access.
    EndPath(EndPathToken),
    /// Intermediate member access.
    InnerPath(InnerPathToken),
    /// Qualified identifier.
    DottedIdentifier(DottedIdentifierToken),
    /// Function call.
    FunctionCall(FunctionCallToken),
    /// Standalone function parameter.
    FunctionParameter(FunctionParameterToken),
    /// `@alias` reference.
    FunctionParameterAlias(String),
    /// `any` lambda.
    Any(LambdaToken),
    /// `all` lambda.
    All(LambdaToken),
    /// Reference to `$it` or a lambda variable.
    RangeVariable(String),
    /// `$count` segment.
    CountSegment(CountSegmentToken),
    /// Unrecognized query option.
    CustomQueryOption(CustomQueryOptionToken),
}

impl QueryToken {
    /// Short name of the token kind, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            QueryToken::Literal(_) => "Literal",
            QueryToken::StringLiteral(_) => "StringLiteral",
            QueryToken::BinaryOperator { .. } => "BinaryOperator",
            QueryToken::UnaryOperator { .. } => "UnaryOperator",
            QueryToken::In { .. } => "In",
            QueryToken::EndPath(_) => "EndPath",
            QueryToken::InnerPath(_) => "InnerPath",
            QueryToken::DottedIdentifier(_) => "DottedIdentifier",
            QueryToken::FunctionCall(_) => "FunctionCall",
            QueryToken::FunctionParameter(_) => "FunctionParameter",
            QueryToken::FunctionParameterAlias(_) => "FunctionParameterAlias",
            QueryToken::Any(_) => "Any",
            QueryToken::All(_) => "All",
            QueryToken::RangeVariable(_) => "RangeVariable",
            QueryToken::CountSegment(_) => "CountSegment",
            QueryToken::CustomQueryOption(_) => "CustomQueryOption",
        }
    }

    /// Creates a literal token.
    #[must_use]
    pub fn literal(value: Value) -> Self {
        let text = value.to_string();
        QueryToken::Literal(LiteralToken::new(value, text))
    }

    /// Creates an `EndPath` relative to `$it`.
    #[must_use]
    pub fn property(identifier: impl Into<String>) -> Self {
        QueryToken::EndPath(EndPathToken {
            identifier: identifier.into(),
            next: None,
        })
    }

    /// Creates a binary operator token.
    #[must_use]
    pub fn binary(kind: BinaryOperatorKind, left: QueryToken, right: QueryToken) -> Self {
        QueryToken::BinaryOperator {
            kind,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates a `not` token.
    #[must_use]
    pub fn not(operand: QueryToken) -> Self {
        QueryToken::UnaryOperator {
            kind: UnaryOperatorKind::Not,
            operand: Box::new(operand),
        }
    }
}

/// Where the path segments are stored in declaration order or reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOrder {
    /// Last segment first, as produced by the parser.
    Reversed,
    /// First segment first.
    Declaration,
}

/// One segment of a `$select`/`$expand` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegmentToken {
    /// Segment text: a property, `Namespace.Type`, `*`, `Namespace.*`,
    /// `@Term`, or a system segment like `$ref`.
    pub identifier: String,
}

impl PathSegmentToken {
    /// Creates a segment.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        PathSegmentToken {
            identifier: identifier.into(),
        }
    }

    /// `$ref`, `$count`, `$value` and the like.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.identifier.starts_with('$')
    }

    /// `*`.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.identifier == "*"
    }

    /// `Namespace.*`.
    #[must_use]
    pub fn is_namespace_wildcard(&self) -> bool {
        self.identifier.len() > 2 && self.identifier.ends_with(".*")
    }

    /// `@Namespace.Term`.
    #[must_use]
    pub fn is_annotation(&self) -> bool {
        self.identifier.starts_with('@')
    }
}

/// A `/`-separated `$select` or `$expand` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathToken {
    /// Segments in `order`.
    pub segments: Vec<PathSegmentToken>,
    /// Storage order of `segments`.
    pub order: PathOrder,
}

impl PathToken {
    /// Parses `A/B/C` the way the query-string parser stores it, last
    /// segment first.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut segments: Vec<PathSegmentToken> = text
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathSegmentToken::new)
            .collect();
        segments.reverse();
        PathToken {
            segments,
            order: PathOrder::Reversed,
        }
    }

    /// Creates a path from segments in declaration order.
    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PathToken {
            segments: segments.into_iter().map(PathSegmentToken::new).collect(),
            order: PathOrder::Declaration,
        }
    }

    /// Returns the path in declaration order. Already ordered paths are
    /// returned unchanged.
    #[must_use]
    pub fn normalized(&self) -> PathToken {
        match self.order {
            PathOrder::Declaration => self.clone(),
            PathOrder::Reversed => {
                let mut segments = self.segments.clone();
                segments.reverse();
                PathToken {
                    segments,
                    order: PathOrder::Declaration,
                }
            }
        }
    }

    /// Iterates the segments in declaration order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &PathSegmentToken> + '_> {
        match self.order {
            PathOrder::Declaration => Box::new(self.segments.iter()),
            PathOrder::Reversed => Box::new(self.segments.iter().rev()),
        }
    }

    /// Returns the path as `A/B/C`.
    #[must_use]
    pub fn to_path_string(&self) -> String {
        self.iter()
            .map(|s| s.identifier.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// `$levels` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelsToken {
    /// `$levels=max`.
    Max,
    /// `$levels=n`.
    Value(u32),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// `asc`.
    #[default]
    Ascending,
    /// `desc`.
    Descending,
}

/// One `$orderby` item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByToken {
    /// Sort key.
    pub expression: QueryToken,
    /// Direction.
    pub direction: OrderDirection,
}

/// One `expression as Alias` item of `$compute`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeExpressionToken {
    /// Computed expression.
    pub expression: QueryToken,
    /// Alias.
    pub alias: String,
}

/// `$compute` option.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputeToken {
    /// Items in declaration order.
    pub expressions: Vec<ComputeExpressionToken>,
}

/// One statement of an `aggregate` transformation.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateExpressionToken {
    /// `expression with method as Alias`.
    Value {
        /// Aggregated expression.
        expression: QueryToken,
        /// Method: `sum`, `min`, `max`, `average`, `countdistinct` or a
        /// namespace-qualified custom method.
        method: String,
        /// Result alias.
        alias: String,
    },
    /// `$count as Alias`.
    Count {
        /// Result alias.
        alias: String,
    },
}

impl AggregateExpressionToken {
    /// Returns the result alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        match self {
            AggregateExpressionToken::Value { alias, .. }
            | AggregateExpressionToken::Count { alias } => alias,
        }
    }
}

/// `aggregate(...)` transformation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateToken {
    /// Statements in declaration order.
    pub expressions: Vec<AggregateExpressionToken>,
}

/// `groupby((...), aggregate(...))` transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupByToken {
    /// Grouping property paths, as `EndPath` chains.
    pub properties: Vec<QueryToken>,
    /// Aggregation applied to each group.
    pub child: Option<AggregateToken>,
}

/// One `$apply` transformation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformationToken {
    /// `aggregate(...)`.
    Aggregate(AggregateToken),
    /// `groupby(...)`.
    GroupBy(GroupByToken),
    /// `filter(...)`.
    Filter(QueryToken),
    /// `compute(...)`.
    Compute(ComputeToken),
}

/// `$apply` option.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplyToken {
    /// Transformations in pipeline order.
    pub transformations: Vec<TransformationToken>,
}

/// Query options nested inside a `$select` or `$expand` item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TermOptions {
    /// `$filter`.
    pub filter: Option<QueryToken>,
    /// `$orderby`.
    pub order_by: Vec<OrderByToken>,
    /// `$top`.
    pub top: Option<i64>,
    /// `$skip`.
    pub skip: Option<i64>,
    /// `$count`.
    pub count: Option<bool>,
    /// `$search`.
    pub search: Option<QueryToken>,
    /// `$compute`.
    pub compute: Option<ComputeToken>,
    /// `$select`.
    pub select: Option<SelectToken>,
    /// `$expand`.
    pub expand: Option<ExpandToken>,
    /// `$levels`.
    pub levels: Option<LevelsToken>,
    /// `$apply`.
    pub apply: Option<ApplyToken>,
}

impl TermOptions {
    /// Returns the names of the options that are set.
    #[must_use]
    pub fn present(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.filter.is_some() {
            names.push("$filter");
        }
        if !self.order_by.is_empty() {
            names.push("$orderby");
        }
        if self.top.is_some() {
            names.push("$top");
        }
        if self.skip.is_some() {
            names.push("$skip");
        }
        if self.count.is_some() {
            names.push("$count");
        }
        if self.search.is_some() {
            names.push("$search");
        }
        if self.compute.is_some() {
            names.push("$compute");
        }
        if self.select.is_some() {
            names.push("$select");
        }
        if self.expand.is_some() {
            names.push("$expand");
        }
        if self.levels.is_some() {
            names.push("$levels");
        }
        if self.apply.is_some() {
            names.push("$apply");
        }
        names
    }

    /// Returns true if no option is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.present().is_empty()
    }
}

/// One `$select` item.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectTermToken {
    /// Selected path.
    pub path: PathToken,
    /// Nested options.
    pub options: TermOptions,
}

impl SelectTermToken {
    /// Creates a select term without options.
    #[must_use]
    pub fn new(path: &str) -> Self {
        SelectTermToken {
            path: PathToken::parse(path),
            options: TermOptions::default(),
        }
    }

    /// Attaches nested options.
    #[must_use]
    pub fn with_options(mut self, options: TermOptions) -> Self {
        self.options = options;
        self
    }
}

/// `$select` option.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectToken {
    /// Select items.
    pub terms: Vec<SelectTermToken>,
}

impl SelectToken {
    /// Creates a `$select` from comma-free paths.
    #[must_use]
    pub fn of(paths: &[&str]) -> Self {
        SelectToken {
            terms: paths.iter().map(|p| SelectTermToken::new(p)).collect(),
        }
    }
}

/// One `$expand` item.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandTermToken {
    /// Expanded path.
    pub path: PathToken,
    /// Nested options.
    pub options: TermOptions,
}

impl ExpandTermToken {
    /// Creates an expand term without options.
    #[must_use]
    pub fn new(path: &str) -> Self {
        ExpandTermToken {
            path: PathToken::parse(path),
            options: TermOptions::default(),
        }
    }

    /// Attaches nested options.
    #[must_use]
    pub fn with_options(mut self, options: TermOptions) -> Self {
        self.options = options;
        self
    }
}

/// `$expand` option.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpandToken {
    /// Expand items.
    pub terms: Vec<ExpandTermToken>,
}

impl ExpandToken {
    /// Creates an `$expand` from paths without options.
    #[must_use]
    pub fn of(paths: &[&str]) -> Self {
        ExpandToken {
            terms: paths.iter().map(|p| ExpandTermToken::new(p)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parse_is_reversed() {
        let path = PathToken::parse("Orders/Items");
        assert_eq!(path.order, PathOrder::Reversed);
        assert_eq!(path.segments[0].identifier, "Items");
        assert_eq!(path.to_path_string(), "Orders/Items");
    }

    #[test]
    fn test_normalized_is_idempotent() {
        let path = PathToken::parse("A/B/C");
        let once = path.normalized();
        assert_eq!(once.order, PathOrder::Declaration);
        assert_eq!(once.segments[0].identifier, "A");
        assert_eq!(once.normalized(), once);
    }

    #[test]
    fn test_segment_classification() {
        assert!(PathSegmentToken::new("$ref").is_system());
        assert!(PathSegmentToken::new("*").is_wildcard());
        assert!(PathSegmentToken::new("Shop.*").is_namespace_wildcard());
        assert!(!PathSegmentToken::new("*").is_namespace_wildcard());
        assert!(PathSegmentToken::new("@Core.Description").is_annotation());
    }

    #[test]
    fn test_operator_keywords() {
        assert_eq!(
            BinaryOperatorKind::from_keyword("divby"),
            Some(BinaryOperatorKind::DivideBy)
        );
        assert!(BinaryOperatorKind::Has.is_boolean_result());
        assert!(!BinaryOperatorKind::Add.is_boolean_result());
        assert_eq!(BinaryOperatorKind::from_keyword("xor"), None);
    }

    #[test]
    fn test_term_options_present() {
        let options = TermOptions {
            top: Some(2),
            levels: Some(LevelsToken::Max),
            ..TermOptions::default()
        };
        assert_eq!(options.present(), vec!["$top", "$levels"]);
        assert!(TermOptions::default().is_empty());
    }
}
