//! Top-level clause wrappers returned to callers.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::binder::node::QueryNode;
use crate::binder::state::RangeVariable;
use crate::parser::OrderDirection;
use crate::types::TypeRef;

/// Bound `$filter`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    /// Boolean predicate.
    pub expression: QueryNode,
    /// The `$it` variable the predicate ranges over.
    pub range_variable: RangeVariable,
}

/// Bound `$orderby`, one link per sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    /// Sort key.
    pub expression: QueryNode,
    /// Sort direction.
    pub direction: OrderDirection,
    /// The `$it` variable the key ranges over.
    pub range_variable: RangeVariable,
    /// Next sort key.
    pub then_by: Option<Box<OrderByClause>>,
}

impl OrderByClause {
    /// Iterates the sort keys in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &OrderByClause> {
        std::iter::successors(Some(self), |c| c.then_by.as_deref())
    }
}

/// Bound `$search`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchClause {
    /// Boolean composition of search terms.
    pub expression: QueryNode,
}

/// One `expression as Alias` item of `$compute`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeExpression {
    /// Computed value.
    pub expression: QueryNode,
    /// Alias.
    pub alias: String,
    /// Type of the computed value, `None` if untyped.
    pub type_ref: Option<TypeRef>,
}

/// Bound `$compute`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputeClause {
    /// Items in declaration order.
    pub items: Vec<ComputeExpression>,
}

/// Aggregation method of an `aggregate` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationMethod {
    /// `sum`
    Sum,
    /// `min`
    Min,
    /// `max`
    Max,
    /// `average`
    Average,
    /// `countdistinct`
    CountDistinct,
    /// `$count as Alias`
    VirtualPropertyCount,
    /// Namespace-qualified custom method.
    Custom(String),
}

/// One bound `aggregate` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpression {
    /// Aggregated value, `None` for `$count`.
    pub expression: Option<QueryNode>,
    /// Method.
    pub method: AggregationMethod,
    /// Result alias.
    pub alias: String,
    /// Result type.
    pub type_ref: TypeRef,
}

/// One grouping property, possibly a path through complex or navigation
/// properties.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupByPropertyNode {
    /// Segment name.
    pub name: String,
    /// Bound access for the last segment of a path.
    pub expression: Option<QueryNode>,
    /// Type of the last segment.
    pub type_ref: Option<TypeRef>,
    /// Nested segments.
    pub children: Vec<GroupByPropertyNode>,
}

/// One bound `$apply` transformation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformationNode {
    /// `aggregate(...)`.
    Aggregate {
        /// Statements.
        expressions: Vec<AggregateExpression>,
        /// Result shape.
        result_type: TypeRef,
    },
    /// `groupby(...)`.
    GroupBy {
        /// Grouping properties as a tree of path segments.
        properties: Vec<GroupByPropertyNode>,
        /// Aggregation within each group.
        child: Option<Vec<AggregateExpression>>,
        /// Result shape.
        result_type: TypeRef,
    },
    /// `filter(...)`.
    Filter(FilterClause),
    /// `compute(...)`.
    Compute {
        /// Computed items.
        clause: ComputeClause,
        /// Result shape.
        result_type: TypeRef,
    },
}

impl TransformationNode {
    /// Returns the shape produced by this transformation.
    #[must_use]
    pub fn result_type(&self) -> Option<&TypeRef> {
        match self {
            TransformationNode::Aggregate { result_type, .. }
            | TransformationNode::GroupBy { result_type, .. }
            | TransformationNode::Compute { result_type, .. } => Some(result_type),
            TransformationNode::Filter(filter) => filter.range_variable.type_ref.as_ref(),
        }
    }
}

/// Bound `$apply`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyClause {
    /// Transformations in pipeline order.
    pub transformations: Vec<TransformationNode>,
    /// Shape after the last transformation.
    pub result_type: TypeRef,
    /// True once an aggregation or grouping has collapsed the shape.
    pub collapsed: bool,
    /// Properties visible after the collapse.
    pub aggregated_property_names: Vec<String>,
    /// Computed aliases added by `compute` transformations before any collapse.
    pub computed: IndexMap<String, Option<TypeRef>>,
}

/// Bound `$select` and `$expand` of one level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectExpandClause {
    /// Selected and expanded items.
    pub items: Vec<SelectItem>,
    /// True when no explicit path selection restricts the level.
    pub all_selected: bool,
}

impl SelectExpandClause {
    /// Returns the expanded navigation items of this level.
    pub fn expanded(&self) -> impl Iterator<Item = &ExpandedItem> {
        self.items.iter().filter_map(|item| match item {
            SelectItem::Expanded(e) | SelectItem::ExpandedReference(e) => Some(e),
            _ => None,
        })
    }

    /// Returns the explicit path selections of this level.
    pub fn selected_paths(&self) -> impl Iterator<Item = &PathSelectItem> {
        self.items.iter().filter_map(|item| match item {
            SelectItem::Path(p) => Some(p),
            _ => None,
        })
    }
}

/// One resolved segment of a `$select`/`$expand` path.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectSegment {
    /// Structural property.
    Property {
        /// Declared name.
        name: String,
        /// Declared type.
        type_ref: TypeRef,
    },
    /// Navigation property.
    Navigation {
        /// Declared name.
        name: String,
        /// Declared type.
        type_ref: TypeRef,
        /// Target entity set when the binding is known.
        navigation_source: Option<String>,
    },
    /// Type cast segment.
    TypeCast(TypeRef),
    /// Bound operation.
    Operation(String),
    /// Dynamic property of an open type.
    Dynamic(String),
    /// Instance annotation `@Namespace.Term`.
    Annotation(String),
}

impl SelectSegment {
    /// Returns the segment text as written in a path.
    #[must_use]
    pub fn identifier(&self) -> String {
        match self {
            SelectSegment::Property { name, .. }
            | SelectSegment::Navigation { name, .. }
            | SelectSegment::Operation(name)
            | SelectSegment::Dynamic(name)
            | SelectSegment::Annotation(name) => name.clone(),
            SelectSegment::TypeCast(t) => t.full_name(),
        }
    }
}

/// Query options bound for a selected or expanded item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpandOptions {
    /// `$filter`.
    pub filter: Option<FilterClause>,
    /// `$orderby`.
    pub order_by: Option<OrderByClause>,
    /// `$top`.
    pub top: Option<i64>,
    /// `$skip`.
    pub skip: Option<i64>,
    /// `$count`.
    pub count: Option<bool>,
    /// `$search`.
    pub search: Option<SearchClause>,
    /// `$compute`.
    pub compute: Option<ComputeClause>,
    /// `$apply`.
    pub apply: Option<ApplyClause>,
    /// `$levels`, `None` when absent. `Some(None)` stands for `max`.
    pub levels: Option<Option<u32>>,
}

/// A `$select` path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSelectItem {
    /// Resolved segments.
    pub segments: Vec<SelectSegment>,
    /// Options nested under a collection property.
    pub options: ExpandOptions,
    /// Nested select of a complex property.
    pub select: Option<Box<SelectExpandClause>>,
}

impl PathSelectItem {
    /// Returns the path as `A/B`.
    #[must_use]
    pub fn path_string(&self) -> String {
        self.segments
            .iter()
            .map(SelectSegment::identifier)
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// An expanded navigation property.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedItem {
    /// Segments leading to and including the navigation property.
    pub segments: Vec<SelectSegment>,
    /// Target entity set when the binding is known.
    pub navigation_source: Option<String>,
    /// Options.
    pub options: ExpandOptions,
    /// Nested select and expand, `None` for `$ref` and `$count`.
    pub select_expand: Option<Box<SelectExpandClause>>,
}

impl ExpandedItem {
    /// Returns the path as `A/B`.
    #[must_use]
    pub fn path_string(&self) -> String {
        self.segments
            .iter()
            .map(SelectSegment::identifier)
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// One item of a [`SelectExpandClause`].
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`.
    Wildcard,
    /// `Namespace.*`: all operations in the namespace.
    NamespaceQualifiedWildcard(String),
    /// Explicit path.
    Path(PathSelectItem),
    /// `$expand=Nav`.
    Expanded(ExpandedItem),
    /// `$expand=Nav/$ref`.
    ExpandedReference(ExpandedItem),
    /// `$expand=Nav/$count`.
    ExpandedCount(ExpandedItem),
}

/// Every clause bound by a [`QueryBinder`](crate::binder::QueryBinder), with
/// the alias values bound along the way.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundQuery {
    /// `$filter`.
    pub filter: Option<FilterClause>,
    /// `$orderby`.
    pub order_by: Option<OrderByClause>,
    /// `$select` and `$expand`.
    pub select_expand: Option<SelectExpandClause>,
    /// `$apply`.
    pub apply: Option<ApplyClause>,
    /// `$compute`.
    pub compute: Option<ComputeClause>,
    /// `$search`.
    pub search: Option<SearchClause>,
    /// Parameter aliases referenced by the bound clauses.
    pub aliases: HashMap<String, QueryNode>,
}
