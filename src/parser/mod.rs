//! Query option token tree and the expression parser that produces it.

pub mod ast;
mod grammar;
pub mod literal;
mod select_expand;

pub use ast::{
    AggregateExpressionToken, AggregateToken, ApplyToken, BinaryOperatorKind,
    ComputeExpressionToken, ComputeToken, CountSegmentToken, CustomQueryOptionToken,
    DottedIdentifierToken, EndPathToken, ExpandTermToken, ExpandToken, FunctionCallToken,
    FunctionParameterToken, GroupByToken, InnerPathToken, LambdaToken, LevelsToken,
    LiteralToken, NamedValue, OrderByToken, OrderDirection, PathOrder, PathSegmentToken,
    PathToken, QueryToken, SelectTermToken, SelectToken, TermOptions, TransformationToken,
    UnaryOperatorKind,
};
pub use grammar::{parse_apply, parse_compute, parse_filter, parse_order_by, parse_search};
pub use select_expand::{parse_expand, parse_select};
