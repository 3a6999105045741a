//! Function call binding: `cast`/`isof`, bound schema functions, and
//! built-in or custom URI functions.

use tracing::debug;

use crate::binder::literal::{bind_collection_text, is_collection_text};
use crate::binder::metadata::TokenBinder;
use crate::binder::node::{
    ConstantNode, FunctionCallNode, NamedFunctionParameterNode, QueryNode,
};
use crate::binder::path::implicit_parent;
use crate::binder::promotion::{conversion_cost, convert_to_type_if_needed};
use crate::error::{BindError, Result};
use crate::model::{FunctionSignature, Operation, OperationKind, OperationParameter};
use crate::parser::literal::{convert_value, parse_json};
use crate::parser::{FunctionCallToken, FunctionParameterToken, QueryToken};
use crate::types::{PrimitiveKind, TypeRef, Value};

/// Wraps a call in the node variant matching its return type.
fn call_node(call: FunctionCallNode) -> QueryNode {
    match call.type_ref.as_ref() {
        Some(t) if t.is_collection() && t.item_type().is_structured() => {
            QueryNode::CollectionResourceFunctionCall(call)
        }
        Some(t) if t.is_collection() => QueryNode::CollectionFunctionCall(call),
        Some(t) if t.is_structured() => QueryNode::SingleResourceFunctionCall(call),
        _ => QueryNode::SingleValueFunctionCall(call),
    }
}

/// Binds any function call token.
pub(crate) fn bind_function_call<'m>(
    binder: &mut dyn TokenBinder<'m>,
    call: &FunctionCallToken,
) -> Result<QueryNode> {
    let resolver = binder.state().context().resolver;
    if resolver.names_match("cast", &call.name) || resolver.names_match("isof", &call.name) {
        return bind_cast_or_isof(binder, call);
    }

    if call.source.is_some() || call.name.contains('.') {
        let source = match &call.source {
            Some(token) => Some(binder.bind(token)?),
            None => binder
                .state()
                .implicit_range_variable()
                .map(QueryNode::range_variable),
        };
        if let Some(source) = source {
            if let Some(node) = bind_bound_operation(binder, source, &call.name, &call.arguments)? {
                return Ok(node);
            }
        }
        if call.source.is_some() {
            return Err(BindError::UnknownFunction {
                name: call.name.clone(),
            });
        }
    }
    bind_uri_function(binder, call)
}

/// Binds `cast(T)`, `cast(x, T)`, `isof(T)` and `isof(x, T)`.
fn bind_cast_or_isof<'m>(
    binder: &mut dyn TokenBinder<'m>,
    call: &FunctionCallToken,
) -> Result<QueryNode> {
    let is_cast = call.name.eq_ignore_ascii_case("cast");
    let function = if is_cast { "cast" } else { "isof" };
    let count = call.arguments.len();
    if !(1..=2).contains(&count) {
        return Err(BindError::CastOrIsOfWrongNumberOfOperands {
            function: function.to_string(),
            count,
        });
    }

    let type_argument = &call.arguments[count - 1].value;
    let type_name = match type_argument.as_ref() {
        QueryToken::DottedIdentifier(d) if d.next.is_none() => d.identifier.clone(),
        QueryToken::EndPath(e) if e.next.is_none() => e.identifier.clone(),
        QueryToken::Literal(l) => match &l.value {
            Some(Value::String(s)) => s.clone(),
            _ => l.original_text.clone(),
        },
        other => other.kind_name().to_string(),
    };
    let context = binder.state().context();
    let target = context
        .resolver
        .resolve_type(context.model, &type_name)?
        .ok_or_else(|| BindError::TypeNotFound {
            name: type_name.clone(),
        })?;

    let source = if count == 2 {
        binder.bind(&call.arguments[0].value)?
    } else {
        implicit_parent(binder.state(), function)?
    };

    let is_string = |t: &TypeRef| t.is_primitive_kind(PrimitiveKind::String);
    if let Some(source_type) = source.type_ref() {
        let from_enum = source_type.is_enum() && !(is_string(&target) || target.same_type(source_type));
        let to_enum = target.is_enum() && !(is_string(source_type) || target.same_type(source_type));
        if from_enum || to_enum {
            return Err(BindError::CastEnumRestriction);
        }
    }

    let type_ref = if is_cast {
        if source.is_collection() && !target.is_collection() {
            TypeRef::collection(target.with_nullable(false))
        } else {
            target.clone()
        }
    } else {
        TypeRef::boolean(false)
    };
    debug!(function, target = %target, "bound type function");
    Ok(call_node(FunctionCallNode {
        name: function.to_string(),
        operations: Vec::new(),
        arguments: vec![
            source,
            QueryNode::Constant(ConstantNode::new(Value::String(target.full_name()), None)),
        ],
        source: None,
        type_ref: Some(type_ref),
        navigation_source: None,
    }))
}

/// Parameter names of the arguments as they apply to `operation`; positional
/// arguments take the name of the parameter at their position.
fn argument_names<'a>(
    operation: &'a Operation,
    arguments: &'a [FunctionParameterToken],
) -> Option<Vec<&'a str>> {
    let explicit = operation.explicit_parameters();
    arguments
        .iter()
        .enumerate()
        .map(|(i, a)| match &a.name {
            Some(name) => Some(name.as_str()),
            None => explicit.get(i).map(|p| p.name.as_str()),
        })
        .collect()
}

/// Tries to bind `name` as a function bound to the type of `source`.
/// Returns `Ok(None)` when no bound function by that name accepts the
/// binding type.
pub(crate) fn bind_bound_operation<'m>(
    binder: &mut dyn TokenBinder<'m>,
    source: QueryNode,
    name: &str,
    arguments: &[FunctionParameterToken],
) -> Result<Option<QueryNode>> {
    let Some(binding_type) = source.type_ref().cloned() else {
        return Ok(None);
    };
    let context = binder.state().context();
    let resolver = context.resolver;
    let model = context.model;
    let candidates: Vec<&Operation> = resolver
        .resolve_bound_operations(model, name, &binding_type)
        .into_iter()
        .filter(|op| op.kind == OperationKind::Function)
        .collect();
    if candidates.is_empty() {
        return Ok(None);
    }
    let operation_names: Vec<String> = candidates.iter().map(|op| op.name.clone()).collect();

    let mut applicable: Vec<(&Operation, Vec<&OperationParameter>)> = Vec::new();
    for op in candidates {
        if arguments.len() > op.explicit_parameters().len() {
            continue;
        }
        let Some(names) = argument_names(op, arguments) else {
            continue;
        };
        let Some(parameters) = resolver.resolve_operation_parameters(op, &names) else {
            continue;
        };
        let all_required = op
            .explicit_parameters()
            .iter()
            .filter(|p| !p.optional)
            .all(|p| parameters.iter().any(|q| q.name == p.name));
        if all_required {
            applicable.push((op, parameters));
        }
    }

    let binding_item = binding_type.item_type().structured_name().unwrap_or_default();
    let distance = |op: &Operation| {
        op.binding_parameter()
            .and_then(|p| p.type_ref.item_type().structured_name())
            .and_then(|declared| model.inheritance_distance(binding_item, declared))
            .unwrap_or(0)
    };
    applicable.sort_by_key(|(op, _)| (distance(*op), op.explicit_parameters().len()));
    let (operation, parameters) = match applicable.as_slice() {
        [] => {
            return Err(BindError::CannotFindASuitableOverload {
                name: name.to_string(),
                argument_count: arguments.len(),
            })
        }
        [(op, params)] => (*op, params.clone()),
        [(first, params), (second, _), ..] => {
            let key = |op: &Operation| (distance(op), op.explicit_parameters().len());
            if key(*first) == key(*second) {
                return Err(BindError::AmbiguousOperation {
                    name: name.to_string(),
                    binding_type: binding_type.full_name(),
                });
            }
            (*first, params.clone())
        }
    };
    debug!(
        operation = %operation.name,
        binding_type = %binding_type,
        "bound operation chosen"
    );

    let mut bound_arguments = Vec::with_capacity(arguments.len());
    for (argument, parameter) in arguments.iter().zip(&parameters) {
        let value = bind_argument(binder, &argument.value, &parameter.type_ref)?;
        bound_arguments.push(QueryNode::NamedFunctionParameter(NamedFunctionParameterNode {
            name: parameter.name.clone(),
            value: Box::new(value),
        }));
    }

    let type_ref = operation.return_type.clone();
    let navigation_source = match (&type_ref, source.navigation_source()) {
        (Some(t), Some(set)) => t
            .item_type()
            .structured_name()
            .filter(|returned| model.is_related_to(binding_item, returned))
            .map(|_| set.to_string()),
        _ => None,
    };
    Ok(Some(call_node(FunctionCallNode {
        name: operation.name.clone(),
        operations: operation_names,
        arguments: bound_arguments,
        source: Some(Box::new(source)),
        type_ref,
        navigation_source,
    })))
}

/// Binds an argument of a bound function. Inline collection and JSON text
/// is interpreted with the parameter type; other values convert to it.
fn bind_argument<'m>(
    binder: &mut dyn TokenBinder<'m>,
    token: &QueryToken,
    target: &TypeRef,
) -> Result<QueryNode> {
    if let QueryToken::Literal(l) = token {
        if l.value.is_none() {
            if is_collection_text(&l.original_text) {
                let item = target.item_type().clone();
                return bind_collection_text(&l.original_text, Some(&item), Some(binder.state()))
                    .map(QueryNode::CollectionConstant);
            }
            let context = binder.state().context();
            let value = parse_json(&l.original_text)?;
            let value = if target.is_scalar() {
                convert_value(
                    &value,
                    target,
                    context.model,
                    context.resolver.enable_case_insensitive(),
                )?
            } else {
                value
            };
            return Ok(QueryNode::Constant(ConstantNode {
                value,
                literal_text: Some(l.original_text.clone()),
                type_ref: Some(target.clone()),
            }));
        }
    }

    let value = binder.bind(token)?;
    if !target.is_scalar() || value.type_ref().is_none() {
        return Ok(value);
    }
    if conversion_cost(&value, target).is_none() && !value.is_null_constant() {
        return Err(BindError::CannotConvertToType {
            value: value.kind_name().to_string(),
            target: target.full_name(),
        });
    }
    Ok(convert_to_type_if_needed(value, Some(target)))
}

/// Binds a built-in or custom URI function by positional signature.
fn bind_uri_function<'m>(
    binder: &mut dyn TokenBinder<'m>,
    call: &FunctionCallToken,
) -> Result<QueryNode> {
    let context = binder.state().context();
    let signatures = context
        .functions
        .lookup(&call.name, context.resolver.enable_case_insensitive());
    if signatures.is_empty() {
        return Err(BindError::UnknownFunction {
            name: call.name.clone(),
        });
    }

    let mut arguments = Vec::with_capacity(call.arguments.len());
    for argument in &call.arguments {
        let node = binder.bind(&argument.value)?;
        if !node.is_single() {
            return Err(BindError::OperandNotSingleValue {
                operator: call.name.clone(),
            });
        }
        arguments.push(node);
    }

    let same_arity = || {
        signatures
            .iter()
            .filter(|s| s.parameters.len() == arguments.len())
    };

    if !arguments.is_empty() && arguments.iter().all(|a| a.type_ref().is_none()) {
        if same_arity().next().is_none() {
            return Err(BindError::CannotFindASuitableOverload {
                name: call.name.clone(),
                argument_count: arguments.len(),
            });
        }
        debug!(function = %call.name, "untyped arguments, return type unknown");
        return Ok(call_node(FunctionCallNode {
            name: call.name.clone(),
            operations: Vec::new(),
            arguments,
            source: None,
            type_ref: None,
            navigation_source: None,
        }));
    }

    let mut best: Option<(u32, &FunctionSignature)> = None;
    for signature in same_arity() {
        let cost: Option<u32> = arguments
            .iter()
            .zip(&signature.parameters)
            .map(|(a, p)| conversion_cost(a, p))
            .sum();
        if let Some(cost) = cost {
            if best.map_or(true, |(b, _)| cost < b) {
                best = Some((cost, signature));
            }
        }
    }
    let Some((_, signature)) = best else {
        return Err(BindError::NoApplicableFunctionFound {
            name: call.name.clone(),
            signatures: signatures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        });
    };
    debug!(function = %call.name, signature = %signature, "function overload chosen");

    let arguments = arguments
        .into_iter()
        .zip(&signature.parameters)
        .map(|(a, p)| {
            if a.type_ref().is_none() && !a.is_null_constant() {
                a
            } else {
                convert_to_type_if_needed(a, Some(p))
            }
        })
        .collect();
    Ok(call_node(FunctionCallNode {
        name: call.name.clone(),
        operations: Vec::new(),
        arguments,
        source: None,
        type_ref: Some(signature.return_type.clone()),
        navigation_source: None,
    }))
}
