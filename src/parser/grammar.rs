//! Pest parser integration for the query option grammar.

use pest::Parser;
use pest_derive::Parser;
use tracing::warn;

use crate::config::DEFAULT_RECURSION_LIMIT;
use crate::error::{BindError, Result};
use crate::model::is_built_in;
use crate::parser::ast::{
    AggregateExpressionToken, AggregateToken, ApplyToken, BinaryOperatorKind,
    ComputeExpressionToken, ComputeToken, CountSegmentToken, DottedIdentifierToken,
    EndPathToken, FunctionCallToken, FunctionParameterToken, GroupByToken, InnerPathToken,
    LambdaToken, LiteralToken, NamedValue, OrderByToken, OrderDirection, QueryToken,
    TransformationToken, UnaryOperatorKind,
};
use crate::parser::literal;
use crate::stack::{ensure_stack, with_parse_stack};
use crate::types::Value;

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
struct ODataParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Deepest expression nesting the parser accepts.
const MAX_NESTING: usize = DEFAULT_RECURSION_LIMIT;

/// Parses a `$filter` expression, or the value of a parameter alias.
///
/// # Errors
///
/// Returns a `ParseError` if the text is syntactically invalid.
pub fn parse_filter(text: &str) -> Result<QueryToken> {
    let root = parse_root(Rule::filter_option, text)?;
    let expression = first_of(root, Rule::expression)?;
    TokenBuilder::default().build(expression)
}

/// Parses a `$orderby` list.
///
/// # Errors
///
/// Returns a `ParseError` if the text is syntactically invalid.
pub fn parse_order_by(text: &str) -> Result<Vec<OrderByToken>> {
    let root = parse_root(Rule::orderby_option, text)?;
    let mut builder = TokenBuilder::default();
    let mut items = Vec::new();
    for item in root.into_inner() {
        if item.as_rule() != Rule::orderby_item {
            continue;
        }
        let mut expression = None;
        let mut direction = OrderDirection::Ascending;
        for part in item.into_inner() {
            match part.as_rule() {
                Rule::expression => expression = Some(builder.build(part)?),
                Rule::order_direction if part.as_str() == "desc" => {
                    direction = OrderDirection::Descending;
                }
                _ => {}
            }
        }
        let expression = expression.ok_or_else(|| parse_error(text, "missing sort key"))?;
        items.push(OrderByToken {
            expression,
            direction,
        });
    }
    Ok(items)
}

/// Parses a `$compute` list.
///
/// # Errors
///
/// Returns a `ParseError` if the text is syntactically invalid.
pub fn parse_compute(text: &str) -> Result<ComputeToken> {
    let root = parse_root(Rule::compute_option, text)?;
    let mut builder = TokenBuilder::default();
    let mut expressions = Vec::new();
    for item in root.into_inner() {
        if item.as_rule() == Rule::compute_item {
            expressions.push(builder.build_compute_item(item)?);
        }
    }
    Ok(ComputeToken { expressions })
}

/// Parses a `$search` expression.
///
/// # Errors
///
/// Returns a `ParseError` if the text is syntactically invalid.
pub fn parse_search(text: &str) -> Result<QueryToken> {
    let root = parse_root(Rule::search_option, text)?;
    let search = first_of(root, Rule::search_or)?;
    build_search(search)
}

/// Parses an `$apply` pipeline.
///
/// # Errors
///
/// Returns a `ParseError` if the text is syntactically invalid.
pub fn parse_apply(text: &str) -> Result<ApplyToken> {
    let root = parse_root(Rule::apply_option, text)?;
    let mut builder = TokenBuilder::default();
    let mut transformations = Vec::new();
    for pair in root.into_inner() {
        if pair.as_rule() == Rule::transformation {
            transformations.push(builder.build_transformation(pair)?);
        }
    }
    Ok(ApplyToken { transformations })
}

fn parse_root(rule: Rule, text: &str) -> Result<Pair<'_>> {
    let depth = nesting_depth(text);
    if depth > MAX_NESTING {
        warn!(depth, limit = MAX_NESTING, "expression nests too deeply to parse");
        return Err(BindError::TooDeepRecursion { limit: MAX_NESTING });
    }
    let mut pairs = with_parse_stack(depth, || ODataParser::parse(rule, text)).map_err(|e| {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c))
            | pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        BindError::ParseError {
            line,
            col,
            message: e.variant.message().to_string(),
        }
    })?;
    pairs
        .next()
        .ok_or_else(|| parse_error(text, "empty input"))
}

/// Estimates how deeply `text` nests: open parentheses plus the prefix
/// operators still waiting for an operand. Quoted literals are skipped.
fn nesting_depth(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut open: Vec<usize> = Vec::new();
    let mut pending = 0;
    let mut deepest = 0;
    let mut i = 0;
    while i < bytes.len() {
        let base = open.last().copied().unwrap_or(0);
        match bytes[i] {
            b'\'' => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        if bytes.get(i + 1) != Some(&b'\'') {
                            break;
                        }
                        i += 1;
                    }
                    i += 1;
                }
                pending = 0;
            }
            b'(' => {
                open.push(base + pending + 1);
                pending = 0;
            }
            b')' => {
                open.pop();
                pending = 0;
            }
            b'-' if i == 0 || !bytes[i - 1].is_ascii_alphanumeric() => pending += 1,
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while bytes
                    .get(i + 1)
                    .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
                {
                    i += 1;
                }
                if text[start..=i].eq_ignore_ascii_case("not") {
                    pending += 1;
                } else {
                    pending = 0;
                }
            }
            c if c.is_ascii_whitespace() => {}
            _ => pending = 0,
        }
        deepest = deepest.max(open.last().copied().unwrap_or(0) + pending);
        i += 1;
    }
    deepest
}

fn first_of(pair: Pair<'_>, rule: Rule) -> Result<Pair<'_>> {
    let (line, col) = pair.line_col();
    pair.into_inner()
        .find(|p| p.as_rule() == rule)
        .ok_or_else(|| BindError::ParseError {
            line,
            col,
            message: format!("expected {rule:?}"),
        })
}

fn parse_error(text: &str, message: &str) -> BindError {
    BindError::ParseError {
        line: 1,
        col: 1,
        message: format!("{message} in '{text}'"),
    }
}

fn unexpected(pair: &Pair<'_>) -> BindError {
    let (line, col) = pair.line_col();
    BindError::ParseError {
        line,
        col,
        message: format!("unexpected {:?} '{}'", pair.as_rule(), pair.as_str()),
    }
}

fn missing(pair: &Pair<'_>, what: &str) -> BindError {
    let (line, col) = pair.line_col();
    BindError::ParseError {
        line,
        col,
        message: format!("missing {what} in '{}'", pair.as_str()),
    }
}

/// Turns a trailing `EndPath` into an intermediate `InnerPath` once another
/// segment follows it.
fn into_parent(token: QueryToken) -> QueryToken {
    match token {
        QueryToken::EndPath(end) => QueryToken::InnerPath(InnerPathToken {
            identifier: end.identifier,
            next: end.next,
            named_values: Vec::new(),
        }),
        other => other,
    }
}

fn is_key_like(token: &QueryToken) -> bool {
    matches!(
        token,
        QueryToken::Literal(_) | QueryToken::FunctionParameterAlias(_)
    )
}

/// Builds tokens from parse pairs, tracking lambda variables so that
/// `x/Price` inside `any(x: ...)` becomes a range variable reference.
#[derive(Default)]
struct TokenBuilder {
    lambda_scope: Vec<String>,
}

impl TokenBuilder {
    fn build(&mut self, pair: Pair<'_>) -> Result<QueryToken> {
        ensure_stack(|| self.build_pair(pair))
    }

    #[inline(never)]
    fn build_pair(&mut self, pair: Pair<'_>) -> Result<QueryToken> {
        match pair.as_rule() {
            Rule::expression | Rule::paren_expr => {
                let inner = pair
                    .clone()
                    .into_inner()
                    .next()
                    .ok_or_else(|| missing(&pair, "expression"))?;
                self.build(inner)
            }
            Rule::or_expr
            | Rule::and_expr
            | Rule::comparison
            | Rule::additive
            | Rule::multiplicative => self.build_operator_chain(pair),
            Rule::unary => self.build_unary(pair),
            Rule::postfix => self.build_postfix(pair),
            _ => Err(unexpected(&pair)),
        }
    }

    fn build_operator_chain(&mut self, pair: Pair<'_>) -> Result<QueryToken> {
        let outer = pair.clone();
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| missing(&outer, "operand"))?;
        let mut left = self.build(first)?;
        while let Some(op) = inner.next() {
            let operand = inner.next().ok_or_else(|| missing(&op, "right operand"))?;
            left = if op.as_rule() == Rule::in_op {
                QueryToken::In {
                    left: Box::new(left),
                    right: Box::new(self.build_in_operand(operand)?),
                }
            } else {
                let kind = BinaryOperatorKind::from_keyword(op.as_str())
                    .ok_or_else(|| unexpected(&op))?;
                QueryToken::binary(kind, left, self.build(operand)?)
            };
        }
        Ok(left)
    }

    fn build_in_operand(&mut self, pair: Pair<'_>) -> Result<QueryToken> {
        let inner = pair
            .clone()
            .into_inner()
            .next()
            .ok_or_else(|| missing(&pair, "collection"))?;
        match inner.as_rule() {
            Rule::paren_list => Ok(QueryToken::Literal(LiteralToken::raw(inner.as_str()))),
            _ => self.build(inner),
        }
    }

    fn build_unary(&mut self, pair: Pair<'_>) -> Result<QueryToken> {
        let outer = pair.clone();
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| missing(&outer, "operand"))?;
        let kind = match first.as_rule() {
            Rule::not_op => UnaryOperatorKind::Not,
            Rule::neg_op => UnaryOperatorKind::Negate,
            _ => return self.build(first),
        };
        let operand = inner.next().ok_or_else(|| missing(&outer, "operand"))?;
        Ok(QueryToken::UnaryOperator {
            kind,
            operand: Box::new(self.build(operand)?),
        })
    }

    fn build_postfix(&mut self, pair: Pair<'_>) -> Result<QueryToken> {
        let outer = pair.clone();
        let mut inner = pair.into_inner();
        let primary = inner.next().ok_or_else(|| missing(&outer, "operand"))?;
        let mut current = self.build_primary(primary)?;
        for segment in inner {
            let member = segment
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| missing(&segment, "segment"))?;
            current = self.build_member(member, Some(into_parent(current)))?;
        }
        Ok(current)
    }

    fn build_primary(&mut self, pair: Pair<'_>) -> Result<QueryToken> {
        let inner = pair
            .clone()
            .into_inner()
            .next()
            .ok_or_else(|| missing(&pair, "operand"))?;
        match inner.as_rule() {
            Rule::literal => build_literal(inner),
            Rule::paren_expr => self.build(inner),
            Rule::parameter_alias => Ok(QueryToken::FunctionParameterAlias(
                inner.as_str().to_string(),
            )),
            Rule::range_variable => Ok(QueryToken::RangeVariable(inner.as_str().to_string())),
            Rule::member => {
                let member = inner
                    .clone()
                    .into_inner()
                    .next()
                    .ok_or_else(|| missing(&inner, "member"))?;
                self.build_member(member, None)
            }
            _ => Err(unexpected(&inner)),
        }
    }

    fn build_member(&mut self, pair: Pair<'_>, parent: Option<QueryToken>) -> Result<QueryToken> {
        let next = parent.map(Box::new);
        match pair.as_rule() {
            Rule::identifier => {
                let identifier = pair.as_str().to_string();
                if next.is_none() && self.lambda_scope.contains(&identifier) {
                    return Ok(QueryToken::RangeVariable(identifier));
                }
                Ok(QueryToken::EndPath(EndPathToken { identifier, next }))
            }
            Rule::dotted_segment => Ok(QueryToken::DottedIdentifier(DottedIdentifierToken {
                identifier: pair.as_str().to_string(),
                next,
            })),
            Rule::call_or_key => self.build_call_or_key(pair, next),
            Rule::lambda => {
                let parent = next.ok_or_else(|| missing(&pair, "lambda source"))?;
                self.build_lambda(pair, parent)
            }
            Rule::count_segment => {
                let parent = next.ok_or_else(|| missing(&pair, "$count source"))?;
                self.build_count(pair, parent)
            }
            _ => Err(unexpected(&pair)),
        }
    }

    fn build_call_or_key(
        &mut self,
        pair: Pair<'_>,
        next: Option<Box<QueryToken>>,
    ) -> Result<QueryToken> {
        let mut name = String::new();
        let mut arguments = Vec::new();
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::qualified_name => name = part.as_str().to_string(),
                Rule::argument => arguments.push(self.build_argument(part)?),
                _ => {}
            }
        }

        let is_function = arguments.is_empty()
            || name.contains('.')
            || is_built_in(&name)
            || matches!(name.as_str(), "cast" | "isof")
            || !arguments.iter().all(|a| is_key_like(&a.value));
        if is_function {
            return Ok(QueryToken::FunctionCall(FunctionCallToken {
                name,
                arguments,
                source: next,
            }));
        }
        Ok(QueryToken::InnerPath(InnerPathToken {
            identifier: name,
            next,
            named_values: arguments
                .into_iter()
                .map(|a| NamedValue {
                    name: a.name,
                    value: *a.value,
                })
                .collect(),
        }))
    }

    fn build_argument(&mut self, pair: Pair<'_>) -> Result<FunctionParameterToken> {
        let inner = pair
            .clone()
            .into_inner()
            .next()
            .ok_or_else(|| missing(&pair, "argument"))?;
        if inner.as_rule() != Rule::named_argument {
            return Ok(FunctionParameterToken::positional(self.build(inner)?));
        }
        let mut name = None;
        let mut value = None;
        for part in inner.clone().into_inner() {
            match part.as_rule() {
                Rule::identifier => name = Some(part.as_str().to_string()),
                Rule::expression => value = Some(self.build(part)?),
                _ => {}
            }
        }
        match (name, value) {
            (Some(name), Some(value)) => Ok(FunctionParameterToken::named(name, value)),
            _ => Err(missing(&inner, "named argument")),
        }
    }

    fn build_lambda(&mut self, pair: Pair<'_>, parent: Box<QueryToken>) -> Result<QueryToken> {
        let mut is_all = false;
        let mut parameter = None;
        let mut expression = None;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::lambda_kw => is_all = part.as_str() == "all",
                Rule::identifier => parameter = Some(part.as_str().to_string()),
                Rule::expression => {
                    if let Some(name) = &parameter {
                        self.lambda_scope.push(name.clone());
                    }
                    let body = self.build(part);
                    if parameter.is_some() {
                        self.lambda_scope.pop();
                    }
                    expression = Some(Box::new(body?));
                }
                _ => {}
            }
        }
        let lambda = LambdaToken {
            parent,
            parameter,
            expression,
        };
        Ok(if is_all {
            QueryToken::All(lambda)
        } else {
            QueryToken::Any(lambda)
        })
    }

    fn build_count(&mut self, pair: Pair<'_>, parent: Box<QueryToken>) -> Result<QueryToken> {
        let mut token = CountSegmentToken {
            next: parent,
            filter: None,
            search: None,
        };
        for option in pair.into_inner() {
            let Some(inner) = option.into_inner().next() else {
                continue;
            };
            match inner.as_rule() {
                Rule::count_filter => {
                    let expression = first_of(inner, Rule::expression)?;
                    token.filter = Some(Box::new(self.build(expression)?));
                }
                Rule::count_search => {
                    let search = first_of(inner, Rule::search_or)?;
                    token.search = Some(Box::new(build_search(search)?));
                }
                _ => return Err(unexpected(&inner)),
            }
        }
        Ok(QueryToken::CountSegment(token))
    }

    fn build_compute_item(&mut self, pair: Pair<'_>) -> Result<ComputeExpressionToken> {
        let outer = pair.clone();
        let mut expression = None;
        let mut alias = None;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::expression => expression = Some(self.build(part)?),
                Rule::identifier => alias = Some(part.as_str().to_string()),
                _ => {}
            }
        }
        match (expression, alias) {
            (Some(expression), Some(alias)) => Ok(ComputeExpressionToken { expression, alias }),
            _ => Err(missing(&outer, "compute expression")),
        }
    }

    fn build_transformation(&mut self, pair: Pair<'_>) -> Result<TransformationToken> {
        let inner = pair
            .clone()
            .into_inner()
            .next()
            .ok_or_else(|| missing(&pair, "transformation"))?;
        match inner.as_rule() {
            Rule::aggregate_t => Ok(TransformationToken::Aggregate(self.build_aggregate(inner)?)),
            Rule::groupby_t => {
                let mut properties = Vec::new();
                let mut child = None;
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::groupby_path => properties.push(path_to_token(part.as_str())),
                        Rule::aggregate_t => child = Some(self.build_aggregate(part)?),
                        _ => {}
                    }
                }
                Ok(TransformationToken::GroupBy(GroupByToken { properties, child }))
            }
            Rule::filter_t => {
                let expression = first_of(inner, Rule::expression)?;
                Ok(TransformationToken::Filter(self.build(expression)?))
            }
            Rule::compute_t => {
                let mut expressions = Vec::new();
                for part in inner.into_inner() {
                    if part.as_rule() == Rule::compute_item {
                        expressions.push(self.build_compute_item(part)?);
                    }
                }
                Ok(TransformationToken::Compute(ComputeToken { expressions }))
            }
            _ => Err(unexpected(&inner)),
        }
    }

    fn build_aggregate(&mut self, pair: Pair<'_>) -> Result<AggregateToken> {
        let mut expressions = Vec::new();
        for item in pair.into_inner() {
            if item.as_rule() != Rule::aggregate_item {
                continue;
            }
            let statement = item
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| missing(&item, "aggregate expression"))?;
            let outer = statement.clone();
            let mut expression = None;
            let mut method = None;
            let mut alias = None;
            for part in statement.into_inner() {
                match part.as_rule() {
                    Rule::expression => expression = Some(self.build(part)?),
                    Rule::qualified_name => method = Some(part.as_str().to_string()),
                    Rule::identifier => alias = Some(part.as_str().to_string()),
                    _ => {}
                }
            }
            let alias = alias.ok_or_else(|| missing(&outer, "alias"))?;
            expressions.push(match (outer.as_rule(), expression, method) {
                (Rule::count_aggregate, _, _) => AggregateExpressionToken::Count { alias },
                (_, Some(expression), Some(method)) => AggregateExpressionToken::Value {
                    expression,
                    method,
                    alias,
                },
                _ => return Err(missing(&outer, "aggregation method")),
            });
        }
        Ok(AggregateToken { expressions })
    }
}

/// Builds the `EndPath` chain for a slash separated property path.
fn path_to_token(path: &str) -> QueryToken {
    let mut current: Option<QueryToken> = None;
    for identifier in path.split('/') {
        current = Some(QueryToken::EndPath(EndPathToken {
            identifier: identifier.to_string(),
            next: current.map(|t| Box::new(into_parent(t))),
        }));
    }
    current.unwrap_or_else(|| QueryToken::property(path))
}

fn build_literal(pair: Pair<'_>) -> Result<QueryToken> {
    let inner = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| missing(&pair, "literal"))?;
    let text = inner.as_str();
    let value = match inner.as_rule() {
        Rule::null_literal => Value::Null,
        Rule::bool_literal => Value::Boolean(text == "true"),
        Rule::datetimeoffset_literal => literal::parse_date_time_offset(text)?,
        Rule::guid_literal | Rule::date_literal | Rule::timeofday_literal => {
            literal::parse_literal(text)?
        }
        Rule::duration_literal => literal::parse_duration(text)?,
        Rule::number_literal => literal::parse_number(text)?,
        Rule::string_literal => Value::String(literal::parse_string(text)?),
        Rule::json_array | Rule::json_object => {
            return Ok(QueryToken::Literal(LiteralToken::raw(text)))
        }
        _ => return Err(unexpected(&inner)),
    };
    Ok(QueryToken::Literal(LiteralToken::new(value, text)))
}

fn build_search(pair: Pair<'_>) -> Result<QueryToken> {
    let outer = pair.clone();
    match pair.as_rule() {
        Rule::search_or | Rule::search_and => {
            let kind = if pair.as_rule() == Rule::search_or {
                BinaryOperatorKind::Or
            } else {
                BinaryOperatorKind::And
            };
            let mut operands = pair
                .into_inner()
                .filter(|p| !matches!(p.as_rule(), Rule::search_or_kw | Rule::search_and_kw));
            let first = operands.next().ok_or_else(|| missing(&outer, "search term"))?;
            let mut left = build_search(first)?;
            for operand in operands {
                left = QueryToken::binary(kind, left, build_search(operand)?);
            }
            Ok(left)
        }
        Rule::search_not => {
            let mut inner = pair.into_inner();
            let first = inner.next().ok_or_else(|| missing(&outer, "search term"))?;
            if first.as_rule() == Rule::search_not_kw {
                let operand = inner.next().ok_or_else(|| missing(&outer, "search term"))?;
                return Ok(QueryToken::not(build_search(operand)?));
            }
            build_search(first)
        }
        Rule::search_primary => {
            let inner = pair
                .into_inner()
                .next()
                .ok_or_else(|| missing(&outer, "search term"))?;
            build_search(inner)
        }
        Rule::search_phrase => {
            let text = pair.as_str();
            let unquoted = &text[1..text.len() - 1];
            Ok(QueryToken::StringLiteral(unquoted.replace("\\\"", "\"")))
        }
        Rule::search_word => Ok(QueryToken::StringLiteral(pair.as_str().to_string())),
        _ => Err(unexpected(&pair)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end_path(token: &QueryToken) -> &EndPathToken {
        match token {
            QueryToken::EndPath(e) => e,
            other => panic!("expected EndPath, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_simple_comparison() {
        let token = parse_filter("Name eq 'Bob'").unwrap();
        let QueryToken::BinaryOperator { kind, left, right } = token else {
            panic!("expected binary operator");
        };
        assert_eq!(kind, BinaryOperatorKind::Equal);
        assert_eq!(end_path(&left).identifier, "Name");
        assert_eq!(
            *right,
            QueryToken::Literal(LiteralToken::new(Value::String("Bob".into()), "'Bob'"))
        );
    }

    #[test]
    fn test_precedence() {
        let token = parse_filter("A eq 1 or B eq 2 and C eq 3").unwrap();
        let QueryToken::BinaryOperator { kind, right, .. } = token else {
            panic!("expected binary operator");
        };
        assert_eq!(kind, BinaryOperatorKind::Or);
        assert!(matches!(
            *right,
            QueryToken::BinaryOperator {
                kind: BinaryOperatorKind::And,
                ..
            }
        ));

        let token = parse_filter("Price add 1 mul 2 gt 3").unwrap();
        let QueryToken::BinaryOperator { kind, left, .. } = token else {
            panic!("expected binary operator");
        };
        assert_eq!(kind, BinaryOperatorKind::GreaterThan);
        assert!(matches!(
            *left,
            QueryToken::BinaryOperator {
                kind: BinaryOperatorKind::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_navigation_path_uses_inner_path() {
        let token = parse_filter("Category/Name eq 'x'").unwrap();
        let QueryToken::BinaryOperator { left, .. } = token else {
            panic!("expected binary operator");
        };
        let end = end_path(&left);
        assert_eq!(end.identifier, "Name");
        assert!(matches!(
            end.next.as_deref(),
            Some(QueryToken::InnerPath(InnerPathToken { identifier, .. })) if identifier == "Category"
        ));
    }

    #[test]
    fn test_lambda_variable_becomes_range_variable() {
        let token = parse_filter("Orders/any(o: o/Amount gt 10)").unwrap();
        let QueryToken::Any(lambda) = token else {
            panic!("expected any");
        };
        assert_eq!(lambda.parameter.as_deref(), Some("o"));
        let Some(body) = lambda.expression.as_deref() else {
            panic!("expected a body");
        };
        let QueryToken::BinaryOperator { left, .. } = body else {
            panic!("expected comparison");
        };
        let end = end_path(left);
        assert_eq!(
            end.next.as_deref(),
            Some(&QueryToken::RangeVariable("o".into()))
        );
    }

    #[test]
    fn test_key_versus_function_call() {
        let token = parse_filter("Orders(1)/Amount gt 2").unwrap();
        let QueryToken::BinaryOperator { left, .. } = token else {
            panic!("expected comparison");
        };
        assert!(matches!(
            end_path(&left).next.as_deref(),
            Some(QueryToken::InnerPath(InnerPathToken { named_values, .. })) if named_values.len() == 1
        ));

        let token = parse_filter("contains(Name, 'a')").unwrap();
        assert!(matches!(token, QueryToken::FunctionCall(FunctionCallToken { ref name, .. }) if name == "contains"));

        let token = parse_filter("Shop.IsVip()").unwrap();
        assert!(matches!(token, QueryToken::FunctionCall(_)));
    }

    #[test]
    fn test_in_with_parenthesized_list() {
        let token = parse_filter("Name in ('a', 'b')").unwrap();
        let QueryToken::In { right, .. } = token else {
            panic!("expected in");
        };
        assert_eq!(*right, QueryToken::Literal(LiteralToken::raw("('a', 'b')")));
    }

    #[test]
    fn test_enum_literal_is_dotted_identifier() {
        let token = parse_filter("Color has Shop.Color'Red'").unwrap();
        let QueryToken::BinaryOperator { right, .. } = token else {
            panic!("expected has");
        };
        assert!(matches!(
            *right,
            QueryToken::DottedIdentifier(DottedIdentifierToken { ref identifier, .. }) if identifier == "Shop.Color'Red'"
        ));
    }

    #[test]
    fn test_count_segment_with_filter() {
        let token = parse_filter("Orders/$count($filter=Amount gt 5) gt 1").unwrap();
        let QueryToken::BinaryOperator { left, .. } = token else {
            panic!("expected comparison");
        };
        let QueryToken::CountSegment(count) = *left else {
            panic!("expected $count");
        };
        assert!(count.filter.is_some());
        assert!(count.search.is_none());
    }

    #[test]
    fn test_not_and_negate() {
        assert!(matches!(
            parse_filter("not Active").unwrap(),
            QueryToken::UnaryOperator {
                kind: UnaryOperatorKind::Not,
                ..
            }
        ));
        assert!(matches!(
            parse_filter("-Price lt 0").unwrap(),
            QueryToken::BinaryOperator { left, .. } if matches!(*left, QueryToken::UnaryOperator { kind: UnaryOperatorKind::Negate, .. })
        ));
        assert!(matches!(
            parse_filter("Price gt -5").unwrap(),
            QueryToken::BinaryOperator { right, .. } if matches!(*right, QueryToken::Literal(_))
        ));
    }

    #[test]
    fn test_order_by() {
        let items = parse_order_by("Name desc, Price").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].direction, OrderDirection::Descending);
        assert_eq!(items[1].direction, OrderDirection::Ascending);
    }

    #[test]
    fn test_compute() {
        let compute = parse_compute("Price mul 2 as DoublePrice").unwrap();
        assert_eq!(compute.expressions.len(), 1);
        assert_eq!(compute.expressions[0].alias, "DoublePrice");
    }

    #[test]
    fn test_search() {
        let token = parse_search("blue OR \"dark green\" NOT red").unwrap();
        let QueryToken::BinaryOperator { kind, left, right } = token else {
            panic!("expected or");
        };
        assert_eq!(kind, BinaryOperatorKind::Or);
        assert_eq!(*left, QueryToken::StringLiteral("blue".into()));
        let QueryToken::BinaryOperator { kind, left, right } = *right else {
            panic!("expected implicit and");
        };
        assert_eq!(kind, BinaryOperatorKind::And);
        assert_eq!(*left, QueryToken::StringLiteral("dark green".into()));
        assert!(matches!(*right, QueryToken::UnaryOperator { kind: UnaryOperatorKind::Not, .. }));
    }

    #[test]
    fn test_apply_pipeline() {
        let apply = parse_apply(
            "groupby((Category/Name), aggregate(Amount with sum as Total, $count as Cnt))/filter(Total gt 5)",
        )
        .unwrap();
        assert_eq!(apply.transformations.len(), 2);
        let TransformationToken::GroupBy(group) = &apply.transformations[0] else {
            panic!("expected groupby");
        };
        assert_eq!(group.properties.len(), 1);
        let child = group.child.as_ref().unwrap();
        assert_eq!(child.expressions.len(), 2);
        assert_eq!(child.expressions[1], AggregateExpressionToken::Count { alias: "Cnt".into() });
        assert!(matches!(apply.transformations[1], TransformationToken::Filter(_)));
    }

    #[test]
    fn test_syntax_error_has_position() {
        let err = parse_filter("Name eq").unwrap_err();
        assert!(matches!(err, BindError::ParseError { line: 1, .. }));
    }

    #[test]
    fn test_nesting_depth_counts_parentheses_and_prefix_operators() {
        assert_eq!(nesting_depth("Name eq 'x'"), 0);
        assert_eq!(nesting_depth("not (not (A)) and B"), 4);
        assert_eq!(nesting_depth("not not A or not B"), 2);
        assert_eq!(nesting_depth("-(-Price) gt 0"), 3);
        assert_eq!(nesting_depth("Placed gt 2020-01-01 and Id eq -1"), 1);
        assert_eq!(nesting_depth("Name eq '((not not'')'"), 0);
    }

    #[test]
    fn test_deeply_nested_input_is_rejected() {
        let deep = format!("{}true", "not ".repeat(3000));
        assert!(matches!(
            parse_filter(&deep),
            Err(BindError::TooDeepRecursion { limit: MAX_NESTING })
        ));

        let parens = format!("{}true{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert!(matches!(
            parse_filter(&parens),
            Err(BindError::TooDeepRecursion { limit: MAX_NESTING })
        ));
    }

    #[test]
    fn test_nesting_up_to_the_limit_parses() {
        let text = format!("{}true", "not ".repeat(MAX_NESTING));
        let mut token = parse_filter(&text).unwrap();
        let mut depth = 0;
        while let QueryToken::UnaryOperator { operand, .. } = token {
            depth += 1;
            token = *operand;
        }
        assert_eq!(depth, MAX_NESTING);
    }
}
