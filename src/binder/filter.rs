//! `$filter` clause binding.

use tracing::debug;

use crate::binder::clause::FilterClause;
use crate::binder::metadata::TokenBinder;
use crate::error::{BindError, Result};
use crate::parser::QueryToken;
use crate::types::{display_type, PrimitiveKind};

/// Binds a filter predicate over the implicit `$it` of the binder's state.
///
/// # Errors
///
/// Returns `FilterExpressionNotSingleValue` or `FilterExpressionNotBoolean`
/// if the predicate is not a single boolean, or any error from binding it.
pub fn bind_filter<'m>(binder: &mut dyn TokenBinder<'m>, token: &QueryToken) -> Result<FilterClause> {
    let range_variable = binder
        .state()
        .implicit_range_variable()
        .cloned()
        .ok_or_else(|| BindError::ImplicitRangeVariableMissing {
            identifier: "$filter".into(),
        })?;
    debug!(
        target_type = %display_type(range_variable.type_ref.as_ref()),
        "binding $filter"
    );

    let expression = binder.bind(token)?;
    if !expression.is_single() {
        return Err(BindError::FilterExpressionNotSingleValue);
    }
    if let Some(t) = expression.type_ref() {
        if !t.is_primitive_kind(PrimitiveKind::Boolean) {
            return Err(BindError::FilterExpressionNotBoolean {
                found: t.full_name(),
            });
        }
    }
    Ok(FilterClause {
        expression,
        range_variable,
    })
}
