//! Semantic binding of query option token trees.
//!
//! The binder resolves a syntactic token tree against the schema:
//! - Property, navigation, type and function names through a [`UriResolver`]
//! - Lambda and `$it` range variables in scope
//! - Operand type promotion and implicit conversions
//! - The result shapes of `$apply` and `$compute`
//!
//! The output is a typed node tree wrapped in one clause per query option.

mod alias;
mod apply;
mod clause;
mod compute;
mod filter;
mod function;
mod key;
mod lambda;
mod literal;
mod metadata;
mod node;
mod operator;
mod order_by;
mod path;
mod promotion;
mod query;
mod resolver;
mod search;
pub mod select_expand;
mod state;

pub use apply::bind_apply;
pub use clause::{
    AggregateExpression, AggregationMethod, ApplyClause, BoundQuery, ComputeClause,
    ComputeExpression, ExpandOptions, ExpandedItem, FilterClause, GroupByPropertyNode,
    OrderByClause, PathSelectItem, SearchClause, SelectExpandClause, SelectItem, SelectSegment,
    TransformationNode,
};
pub use compute::bind_compute;
pub use filter::bind_filter;
pub use metadata::{MetadataBinder, TokenBinder};
pub use node::{
    BinaryOperatorNode, CollectionConstantNode, ConstantNode, ConvertNode, CountNode,
    FunctionCallNode, InNode, KeyLookupNode, KeyPropertyValue, LambdaNode,
    NamedFunctionParameterNode, NavigationNode, NodeCategory, OpenPropertyAccessNode,
    ParameterAliasNode, PropertyAccessNode, QueryNode, RangeVariableReferenceNode,
    ResourceCastNode, SearchTermNode, UnaryOperatorNode,
};
pub use order_by::bind_order_by;
pub use promotion::{
    conversion_cost, conversion_distance, convert_to_type_if_needed, promote_binary_operand_types,
    promote_unary_operand_type, BinaryPromotion,
};
pub use query::QueryBinder;
pub use resolver::{DefaultUriResolver, ResolvedProperty, UriResolver};
pub use search::bind_search;
pub use select_expand::bind_select_expand;
pub use state::{AliasTable, BindingState, DepthGuard, RangeVariable, IMPLICIT_RANGE_VARIABLE};
