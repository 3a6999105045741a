//! `any` / `all` lambda binding.

use crate::binder::metadata::TokenBinder;
use crate::binder::node::{LambdaNode, QueryNode};
use crate::binder::state::RangeVariable;
use crate::error::{BindError, Result};
use crate::parser::LambdaToken;
use crate::types::{display_type, PrimitiveKind};

/// Binds `source/any(x: body)` or `source/all(x: body)`. The lambda variable
/// is in scope only while the body is bound.
pub(crate) fn bind_lambda<'m>(
    binder: &mut dyn TokenBinder<'m>,
    token: &LambdaToken,
    is_all: bool,
) -> Result<QueryNode> {
    let source = match binder.bind(&token.parent)? {
        QueryNode::SingleValueOpenPropertyAccess(open) => {
            QueryNode::CollectionOpenPropertyAccess(open)
        }
        other => other,
    };
    if !source.is_collection() {
        return Err(BindError::LambdaParentMustBeCollection);
    }

    let range_variable = token.parameter.as_ref().map(|name| {
        RangeVariable::new(
            name.clone(),
            source.type_ref().map(|t| t.item_type().clone()),
            source.navigation_source().map(str::to_string),
        )
    });

    let body = match &token.expression {
        Some(expression) => {
            if let Some(variable) = &range_variable {
                binder.state_mut().push_range_variable(variable.clone());
            }
            let bound = binder.bind(expression);
            if range_variable.is_some() {
                binder.state_mut().pop_range_variable();
            }
            let body = bound?;
            if !body.is_single() {
                return Err(BindError::AnyAllExpressionNotSingleValue);
            }
            if let Some(t) = body.type_ref() {
                if !t.is_primitive_kind(PrimitiveKind::Boolean) {
                    return Err(BindError::AnyAllExpressionNotBoolean {
                        found: display_type(Some(t)),
                    });
                }
            }
            Some(Box::new(body))
        }
        None => None,
    };

    let node = LambdaNode {
        source: Box::new(source),
        range_variable,
        body,
    };
    Ok(if is_all {
        QueryNode::All(node)
    } else {
        QueryNode::Any(node)
    })
}
