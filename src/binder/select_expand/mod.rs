//! `$select` and `$expand` binding.
//!
//! The two options are bound as one tree: the top-level select is folded
//! into an expand term over `$it`, paths are put in declaration order and
//! duplicate expansions merged, then each level is bound against its target
//! type. A finishing pass selects expanded navigations on levels with
//! explicit selections, and the expansion limits are checked last.

mod binder;
mod finisher;
mod normalizer;
mod unifier;
mod validator;

use tracing::debug;

use crate::binder::clause::SelectExpandClause;
use crate::binder::state::BindingState;
use crate::error::{BindError, Result};
use crate::parser::{ExpandToken, SelectToken};

pub use finisher::finish_select_expand;
pub use normalizer::normalize_expand_tree;
pub use unifier::unify_select_expand;
pub use validator::validate_select_expand;

/// Binds `$select` and `$expand` over the implicit `$it` of `state`.
///
/// # Errors
///
/// Returns the first path or option error, or a limit error from
/// [`validate_select_expand`].
pub fn bind_select_expand(
    state: &BindingState<'_>,
    select: Option<&SelectToken>,
    expand: Option<&ExpandToken>,
) -> Result<SelectExpandClause> {
    let variable = state
        .implicit_range_variable()
        .ok_or_else(|| BindError::ImplicitRangeVariableMissing {
            identifier: "$select".into(),
        })?;
    let level_type = variable
        .type_ref
        .clone()
        .ok_or_else(|| BindError::ImplicitRangeVariableMissing {
            identifier: "$select".into(),
        })?;
    debug!(target_type = %level_type, "binding $select and $expand");

    let tree = normalize_expand_tree(&unify_select_expand(select.cloned(), expand.cloned()));
    let mut clause = binder::bind_level(
        state,
        &level_type,
        variable.navigation_source.as_deref(),
        &tree.options,
    )?;
    finish_select_expand(&mut clause);
    validate_select_expand(&clause, state.context().settings)?;
    Ok(clause)
}
