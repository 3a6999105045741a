//! `$compute` clause binding.

use tracing::debug;

use crate::binder::clause::{ComputeClause, ComputeExpression};
use crate::binder::metadata::TokenBinder;
use crate::error::{BindError, Result};
use crate::parser::ComputeToken;

/// Binds each `expression as Alias` item.
///
/// # Errors
///
/// Returns `ComputeExpressionNotSingleValue` if an item is not a single
/// value, or any error from binding it.
pub fn bind_compute<'m>(binder: &mut dyn TokenBinder<'m>, token: &ComputeToken) -> Result<ComputeClause> {
    debug!(items = token.expressions.len(), "binding $compute");
    let mut items = Vec::with_capacity(token.expressions.len());
    for item in &token.expressions {
        let expression = binder.bind(&item.expression)?;
        if !expression.is_single() {
            return Err(BindError::ComputeExpressionNotSingleValue {
                alias: item.alias.clone(),
            });
        }
        items.push(ComputeExpression {
            type_ref: expression.type_ref().cloned(),
            expression,
            alias: item.alias.clone(),
        });
    }
    Ok(ComputeClause { items })
}
