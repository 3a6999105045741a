//! `$search` clause binding.

use tracing::debug;

use crate::binder::clause::SearchClause;
use crate::binder::metadata::TokenBinder;
use crate::error::{BindError, Result};
use crate::parser::QueryToken;

/// Binds a search expression: search terms composed with `AND`, `OR` and
/// `NOT`.
///
/// # Errors
///
/// Returns `SearchExpressionNotSingleValue` if the expression is a collection.
pub fn bind_search<'m>(binder: &mut dyn TokenBinder<'m>, token: &QueryToken) -> Result<SearchClause> {
    debug!("binding $search");
    let expression = binder.bind(token)?;
    if !expression.is_single() {
        return Err(BindError::SearchExpressionNotSingleValue);
    }
    Ok(SearchClause { expression })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::metadata::MetadataBinder;
    use crate::binder::node::QueryNode;
    use crate::binder::state::BindingState;
    use crate::binder::DefaultUriResolver;
    use crate::config::{BinderContext, BinderSettings};
    use crate::model::{FunctionRegistry, Model};
    use crate::parser::{parse_search, BinaryOperatorKind};

    #[test]
    fn test_search_terms_compose() {
        let model = Model::default();
        let resolver = DefaultUriResolver::new();
        let settings = BinderSettings::default();
        let functions = FunctionRegistry::new();
        let context = BinderContext::new(&model, &resolver, &settings, &functions);
        let mut binder = MetadataBinder::new(BindingState::new(context, 100));

        let token = parse_search("blue OR green").unwrap();
        let clause = bind_search(&mut binder, &token).unwrap();
        match clause.expression {
            QueryNode::BinaryOperator(b) => {
                assert_eq!(b.kind, BinaryOperatorKind::Or);
                assert!(matches!(*b.left, QueryNode::SearchTerm(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
