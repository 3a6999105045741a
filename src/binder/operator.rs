//! Binary, unary and `in` operator binding.

use crate::binder::literal::{bind_collection_text, is_collection_text};
use crate::binder::metadata::TokenBinder;
use crate::binder::node::{BinaryOperatorNode, ConstantNode, InNode, QueryNode, UnaryOperatorNode};
use crate::binder::promotion::{convert_to_type_if_needed, promote_unary_operand_type};
use crate::binder::state::BindingState;
use crate::error::{BindError, Result};
use crate::parser::literal::convert_value;
use crate::parser::{BinaryOperatorKind, QueryToken, UnaryOperatorKind};
use crate::types::{display_type, Value};

fn bind_operand<'m>(
    binder: &mut dyn TokenBinder<'m>,
    operator: &str,
    token: &QueryToken,
) -> Result<QueryNode> {
    let node = binder.bind(token)?;
    if !node.is_single() {
        return Err(BindError::OperandNotSingleValue {
            operator: operator.to_string(),
        });
    }
    Ok(node)
}

/// A string literal compared with an enum value names an enum member.
fn coerce_enum_string(state: &BindingState<'_>, node: QueryNode, other: &QueryNode) -> Result<QueryNode> {
    let Some(enum_type) = other.type_ref().filter(|t| t.is_enum()) else {
        return Ok(node);
    };
    match node {
        QueryNode::Constant(c) if matches!(c.value, Value::String(_)) => {
            let context = state.context();
            let value = convert_value(
                &c.value,
                enum_type,
                context.model,
                context.resolver.enable_case_insensitive(),
            )?;
            Ok(QueryNode::Constant(ConstantNode {
                value,
                literal_text: c.literal_text,
                type_ref: Some(enum_type.with_nullable(false)),
            }))
        }
        other => Ok(other),
    }
}

/// Binds `left op right`, promoting both operands to a common signature.
pub(crate) fn bind_binary<'m>(
    binder: &mut dyn TokenBinder<'m>,
    kind: BinaryOperatorKind,
    left: &QueryToken,
    right: &QueryToken,
) -> Result<QueryNode> {
    let operator = kind.keyword();
    let left = bind_operand(binder, operator, left)?;
    let right = bind_operand(binder, operator, right)?;
    let state = binder.state();
    let left = coerce_enum_string(state, left, &right)?;
    let right = coerce_enum_string(state, right, &left)?;

    let promotion = state
        .context()
        .resolver
        .promote_binary_operand_types(kind, &left, &right)
        .ok_or_else(|| BindError::IncompatibleOperands {
            operator: operator.to_string(),
            left: display_type(left.type_ref()),
            right: display_type(right.type_ref()),
        })?;
    let left = convert_to_type_if_needed(left, promotion.left.as_ref());
    let right = convert_to_type_if_needed(right, promotion.right.as_ref());
    Ok(QueryNode::BinaryOperator(BinaryOperatorNode {
        kind,
        left: Box::new(left),
        right: Box::new(right),
        type_ref: promotion.result,
    }))
}

/// Binds `not x` and `-x`.
pub(crate) fn bind_unary<'m>(
    binder: &mut dyn TokenBinder<'m>,
    kind: UnaryOperatorKind,
    operand: &QueryToken,
) -> Result<QueryNode> {
    let operator = kind.to_string();
    let operand = bind_operand(binder, &operator, operand)?;
    let type_ref = promote_unary_operand_type(kind, operand.type_ref()).ok_or_else(|| {
        BindError::IncompatibleOperand {
            operator: operator.clone(),
            operand: display_type(operand.type_ref()),
        }
    })?;
    Ok(QueryNode::UnaryOperator(UnaryOperatorNode {
        kind,
        operand: Box::new(operand),
        type_ref,
    }))
}

/// Binds `left in right`. Literal lists on the right are converted to the
/// type of the left operand.
pub(crate) fn bind_in<'m>(
    binder: &mut dyn TokenBinder<'m>,
    left: &QueryToken,
    right: &QueryToken,
) -> Result<QueryNode> {
    let left = bind_operand(binder, "in", left)?;
    let item_type = left.type_ref().cloned();

    let literal_text = match right {
        QueryToken::Literal(l) if l.value.is_none() && is_collection_text(&l.original_text) => {
            Some(l.original_text.clone())
        }
        QueryToken::FunctionParameterAlias(alias) => binder
            .state()
            .aliases()
            .value(alias)
            .filter(|text| is_collection_text(text))
            .map(str::to_string),
        _ => None,
    };

    let right = match literal_text {
        Some(text) => {
            let node = QueryNode::CollectionConstant(bind_collection_text(
                &text,
                item_type.as_ref(),
                Some(binder.state()),
            )?);
            if let QueryToken::FunctionParameterAlias(alias) = right {
                binder.state().aliases().cache(alias, node.clone());
            }
            node
        }
        None => binder.bind(right)?,
    };
    if !right.is_collection() {
        return Err(BindError::RightOperandNotCollection);
    }
    Ok(QueryNode::In(InNode {
        left: Box::new(left),
        right: Box::new(right),
    }))
}
