//! Literal, collection literal and enum literal binding.

use crate::binder::node::{CollectionConstantNode, ConstantNode, QueryNode};
use crate::binder::state::BindingState;
use crate::error::{BindError, Result};
use crate::parser::literal::{convert_value, parse_collection, parse_enum_value, parse_json};
use crate::parser::LiteralToken;
use crate::types::{TypeRef, Value};

/// Binds a literal token. Collection and JSON text is interpreted here;
/// everything else was parsed already.
pub(crate) fn bind_literal(token: &LiteralToken) -> Result<QueryNode> {
    match &token.value {
        Some(value) => Ok(QueryNode::Constant(ConstantNode::new(
            value.clone(),
            Some(token.original_text.clone()),
        ))),
        None if is_collection_text(&token.original_text) => {
            bind_collection_text(&token.original_text, None, None)
                .map(QueryNode::CollectionConstant)
        }
        None => {
            let value = parse_json(&token.original_text)?;
            Ok(QueryNode::Constant(ConstantNode {
                value,
                literal_text: Some(token.original_text.clone()),
                type_ref: None,
            }))
        }
    }
}

/// Returns true for `(..)` and `[..]` text.
pub(crate) fn is_collection_text(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with('(') || text.starts_with('[')
}

/// Parses collection text into a constant collection. With an `item_type`,
/// every item is converted to it; otherwise the first non-null item decides.
pub(crate) fn bind_collection_text(
    text: &str,
    item_type: Option<&TypeRef>,
    state: Option<&BindingState<'_>>,
) -> Result<CollectionConstantNode> {
    let values = parse_collection(text)?;
    let items: Vec<ConstantNode> = match (item_type, state) {
        (Some(target), Some(state)) => {
            let context = state.context();
            let ignore_case = context.resolver.enable_case_insensitive();
            values
                .iter()
                .map(|v| {
                    let converted = convert_value(v, target, context.model, ignore_case)?;
                    Ok(ConstantNode {
                        value: converted,
                        literal_text: None,
                        type_ref: Some(target.clone()),
                    })
                })
                .collect::<Result<_>>()?
        }
        _ => values
            .into_iter()
            .map(|v| ConstantNode::new(v, None))
            .collect(),
    };
    let item_type = item_type
        .cloned()
        .or_else(|| {
            items
                .iter()
                .find_map(|i| i.type_ref.as_ref())
                .map(|t| t.with_nullable(true))
        })
        .unwrap_or_else(TypeRef::string);
    Ok(CollectionConstantNode {
        items,
        literal_text: text.to_string(),
        type_ref: TypeRef::collection(item_type),
    })
}

/// Binds `Namespace.EnumType'Member'`.
pub(crate) fn bind_enum_literal(state: &BindingState<'_>, text: &str) -> Result<QueryNode> {
    let context = state.context();
    let invalid = || BindError::InvalidLiteral {
        text: text.to_string(),
        reason: "expected Namespace.EnumType'Member'".into(),
    };
    let (type_name, quoted) = text.split_once('\'').ok_or_else(invalid)?;
    let member = quoted.strip_suffix('\'').ok_or_else(invalid)?;
    let enum_type = context
        .resolver
        .resolve_type(context.model, type_name)?
        .filter(TypeRef::is_enum)
        .ok_or_else(|| BindError::TypeNotFound {
            name: type_name.to_string(),
        })?;
    let declared = enum_type.full_name();
    let value = parse_enum_value(
        context.model,
        &declared,
        &member.replace("''", "'"),
        context.resolver.enable_case_insensitive(),
    )?;
    Ok(QueryNode::Constant(ConstantNode {
        value: Value::Enum(value),
        literal_text: Some(text.to_string()),
        type_ref: Some(enum_type.with_nullable(false)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;

    #[test]
    fn test_known_literal_is_constant() {
        let node = bind_literal(&LiteralToken::new(Value::Int32(4), "4")).unwrap();
        match node {
            QueryNode::Constant(c) => {
                assert_eq!(c.value, Value::Int32(4));
                assert_eq!(c.literal_text.as_deref(), Some("4"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_raw_collection_infers_item_type() {
        let node = bind_literal(&LiteralToken::raw("(null,'a','b')")).unwrap();
        let QueryNode::CollectionConstant(c) = node else {
            panic!("expected a collection constant");
        };
        assert_eq!(c.items.len(), 3);
        assert!(c.type_ref.item_type().is_primitive_kind(PrimitiveKind::String));
    }

    #[test]
    fn test_raw_object_is_untyped_constant() {
        let node = bind_literal(&LiteralToken::raw(r#"{"Street":"Main"}"#)).unwrap();
        assert!(node.type_ref().is_none());
        assert!(node.is_single());
    }
}
