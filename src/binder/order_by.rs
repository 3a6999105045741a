//! `$orderby` clause binding.

use tracing::debug;

use crate::binder::clause::OrderByClause;
use crate::binder::metadata::TokenBinder;
use crate::error::{BindError, Result};
use crate::parser::OrderByToken;
use crate::types::display_type;

/// Binds the sort keys into a `then_by` chain in declaration order.
/// Keys are bound from last to first, so the last failing key is the one
/// reported. Returns `None` for an empty list.
///
/// # Errors
///
/// Returns `OrderByExpressionNotSingleValue` if a key is a collection or a
/// structured value, or any error from binding it.
pub fn bind_order_by<'m>(
    binder: &mut dyn TokenBinder<'m>,
    tokens: &[OrderByToken],
) -> Result<Option<OrderByClause>> {
    let range_variable = binder
        .state()
        .implicit_range_variable()
        .cloned()
        .ok_or_else(|| BindError::ImplicitRangeVariableMissing {
            identifier: "$orderby".into(),
        })?;
    debug!(
        target_type = %display_type(range_variable.type_ref.as_ref()),
        keys = tokens.len(),
        "binding $orderby"
    );

    let mut clause: Option<OrderByClause> = None;
    for token in tokens.iter().rev() {
        let expression = binder.bind(&token.expression)?;
        let scalar = expression.type_ref().map_or(true, |t| t.is_scalar());
        if !expression.is_single() || !scalar {
            return Err(BindError::OrderByExpressionNotSingleValue);
        }
        clause = Some(OrderByClause {
            expression,
            direction: token.direction,
            range_variable: range_variable.clone(),
            then_by: clause.map(Box::new),
        });
    }
    Ok(clause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::metadata::MetadataBinder;
    use crate::binder::state::{BindingState, RangeVariable};
    use crate::binder::DefaultUriResolver;
    use crate::config::{BinderContext, BinderSettings};
    use crate::model::{FunctionRegistry, Model};
    use crate::parser::{parse_order_by, OrderDirection};
    use crate::types::TypeRef;

    #[test]
    fn test_chain_follows_declaration_order() {
        let model = Model::default();
        let resolver = DefaultUriResolver::new();
        let settings = BinderSettings::default();
        let functions = FunctionRegistry::new();
        let context = BinderContext::new(&model, &resolver, &settings, &functions);
        let state = BindingState::new(context, 100)
            .with_implicit_range_variable(RangeVariable::implicit(TypeRef::int32(false), None));
        let mut binder = MetadataBinder::new(state);

        let tokens = parse_order_by("1 desc, 'b', 2.5 asc").unwrap();
        let clause = bind_order_by(&mut binder, &tokens).unwrap().unwrap();
        let directions: Vec<OrderDirection> = clause.iter().map(|c| c.direction).collect();
        assert_eq!(
            directions,
            vec![
                OrderDirection::Descending,
                OrderDirection::Ascending,
                OrderDirection::Ascending
            ]
        );
        assert!(clause.iter().all(|c| c.range_variable.name == "$it"));

        assert!(bind_order_by(&mut binder, &[]).unwrap().is_none());
    }

    #[test]
    fn test_requires_implicit_range_variable() {
        let model = Model::default();
        let resolver = DefaultUriResolver::new();
        let settings = BinderSettings::default();
        let functions = FunctionRegistry::new();
        let context = BinderContext::new(&model, &resolver, &settings, &functions);
        let mut binder = MetadataBinder::new(BindingState::new(context, 100));

        let tokens = parse_order_by("1").unwrap();
        assert!(matches!(
            bind_order_by(&mut binder, &tokens),
            Err(BindError::ImplicitRangeVariableMissing { .. })
        ));
    }
}
