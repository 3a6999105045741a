//! Parameter alias binding.

use std::rc::Rc;

use tracing::debug;

use crate::binder::literal::{bind_collection_text, is_collection_text};
use crate::binder::metadata::TokenBinder;
use crate::binder::node::{ParameterAliasNode, QueryNode};
use crate::error::{BindError, Result};
use crate::parser::parse_filter;

fn alias_node(alias: &str, value: &QueryNode) -> QueryNode {
    QueryNode::ParameterAlias(ParameterAliasNode {
        alias: alias.to_string(),
        type_ref: value.type_ref().cloned(),
        is_collection: value.is_collection(),
    })
}

/// Binds `@alias` to the type of its value. Each alias value is parsed and
/// bound at most once per query.
pub(crate) fn bind_parameter_alias<'m>(
    binder: &mut dyn TokenBinder<'m>,
    alias: &str,
) -> Result<QueryNode> {
    let aliases = Rc::clone(binder.state().aliases());
    if let Some(bound) = aliases.cached(alias) {
        debug!(alias, "parameter alias cache hit");
        return Ok(alias_node(alias, &bound));
    }
    let text = aliases
        .value(alias)
        .ok_or_else(|| BindError::ParameterAliasNotFound {
            alias: alias.to_string(),
        })?;
    debug!(alias, value = text, "parameter alias cache miss");

    let bound = if is_collection_text(text) {
        QueryNode::CollectionConstant(bind_collection_text(text, None, None)?)
    } else {
        let token = parse_filter(text)?;
        binder.bind(&token)?
    };
    aliases.cache(alias, bound.clone());
    Ok(alias_node(alias, &bound))
}
