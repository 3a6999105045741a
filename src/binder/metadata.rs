//! Central token dispatcher.

use tracing::trace;

use crate::binder::node::{NamedFunctionParameterNode, QueryNode, SearchTermNode};
use crate::binder::state::BindingState;
use crate::binder::{alias, function, lambda, literal, operator, path};
use crate::error::{BindError, Result};
use crate::parser::{FunctionParameterToken, QueryToken};
use crate::stack::ensure_stack;

/// Binds one token. Every sub-binder recurses into child tokens through
/// this trait.
pub trait TokenBinder<'m> {
    /// Binds `token` to a semantic node.
    ///
    /// # Errors
    ///
    /// Returns the first binding error found in the token tree.
    fn bind(&mut self, token: &QueryToken) -> Result<QueryNode>;

    /// Returns the binding state.
    fn state(&self) -> &BindingState<'m>;

    /// Returns the binding state for scope changes.
    fn state_mut(&mut self) -> &mut BindingState<'m>;
}

/// Dispatches each token kind to its binder and guards the recursion depth.
#[derive(Debug)]
pub struct MetadataBinder<'m> {
    state: BindingState<'m>,
}

impl<'m> MetadataBinder<'m> {
    /// Creates a binder over `state`.
    #[must_use]
    pub fn new(state: BindingState<'m>) -> Self {
        MetadataBinder { state }
    }

    /// Returns the state, e.g. to inspect scope after binding.
    #[must_use]
    pub fn into_state(self) -> BindingState<'m> {
        self.state
    }
}

impl<'m> MetadataBinder<'m> {
    #[inline(never)]
    fn dispatch(&mut self, token: &QueryToken) -> Result<QueryNode> {
        match token {
            QueryToken::Literal(l) => literal::bind_literal(l),
            QueryToken::StringLiteral(text) => {
                Ok(QueryNode::SearchTerm(SearchTermNode { text: text.clone() }))
            }
            QueryToken::BinaryOperator { kind, left, right } => {
                operator::bind_binary(self, *kind, left, right)
            }
            QueryToken::UnaryOperator { kind, operand } => {
                operator::bind_unary(self, *kind, operand)
            }
            QueryToken::In { left, right } => operator::bind_in(self, left, right),
            QueryToken::EndPath(end) => path::bind_end_path(self, end),
            QueryToken::InnerPath(inner) => path::bind_inner_path(self, inner),
            QueryToken::DottedIdentifier(dotted) => path::bind_dotted_identifier(self, dotted),
            QueryToken::FunctionCall(call) => function::bind_function_call(self, call),
            QueryToken::FunctionParameter(parameter) => self.bind_function_parameter(parameter),
            QueryToken::FunctionParameterAlias(name) => alias::bind_parameter_alias(self, name),
            QueryToken::Any(l) => lambda::bind_lambda(self, l, false),
            QueryToken::All(l) => lambda::bind_lambda(self, l, true),
            QueryToken::RangeVariable(name) => path::bind_range_variable(&self.state, name),
            QueryToken::CountSegment(count) => path::bind_count_segment(self, count),
            QueryToken::CustomQueryOption(_) => Err(BindError::UnsupportedTokenKind {
                kind: token.kind_name().to_string(),
            }),
        }
    }

    #[inline(never)]
    fn bind_function_parameter(&mut self, parameter: &FunctionParameterToken) -> Result<QueryNode> {
        let value = self.bind(&parameter.value)?;
        Ok(match &parameter.name {
            Some(name) => QueryNode::NamedFunctionParameter(NamedFunctionParameterNode {
                name: name.clone(),
                value: Box::new(value),
            }),
            None => value,
        })
    }
}

impl<'m> TokenBinder<'m> for MetadataBinder<'m> {
    fn bind(&mut self, token: &QueryToken) -> Result<QueryNode> {
        let _guard = self.state.enter_recursion()?;
        trace!(
            token = token.kind_name(),
            depth = self.state.depth(),
            "binding token"
        );
        ensure_stack(|| self.dispatch(token))
    }

    fn state(&self) -> &BindingState<'m> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut BindingState<'m> {
        &mut self.state
    }
}
