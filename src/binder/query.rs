//! Binds the query options of one request against a target entity set.

use std::collections::HashMap;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use tracing::{debug, info};

use crate::binder::apply::{bind_apply, state_after_apply};
use crate::binder::clause::{
    ApplyClause, BoundQuery, ComputeClause, FilterClause, OrderByClause, SearchClause,
    SelectExpandClause,
};
use crate::binder::compute::bind_compute;
use crate::binder::filter::bind_filter;
use crate::binder::metadata::MetadataBinder;
use crate::binder::order_by::bind_order_by;
use crate::binder::search::bind_search;
use crate::binder::select_expand::bind_select_expand;
use crate::binder::state::{AliasTable, BindingState, RangeVariable};
use crate::config::BinderContext;
use crate::error::{BindError, Result};
use crate::parser;
use crate::types::TypeRef;

/// System query options recognized by [`QueryBinder`].
const SYSTEM_OPTIONS: &[&str] = &[
    "$filter", "$orderby", "$select", "$expand", "$apply", "$compute", "$search", "$top", "$skip",
    "$count",
];

/// Binds the query options of a request one at a time or all together.
///
/// Parameter aliases (`@name=value`) are shared by every option: an alias
/// value is parsed and bound at most once. Options bound after `$apply` and
/// `$compute` see the shape and aliases they produce.
///
/// # Example
///
/// ```ignore
/// let binder = QueryBinder::new(context, "Customers", [("$filter", "Name eq @n"), ("@n", "'Bob'")])?;
/// let filter = binder.parse_filter()?.unwrap();
/// ```
pub struct QueryBinder<'m> {
    context: BinderContext<'m>,
    target: RangeVariable,
    options: HashMap<String, String>,
    aliases: Rc<AliasTable>,
    apply: OnceCell<Option<ApplyClause>>,
    compute: OnceCell<Option<ComputeClause>>,
}

impl<'m> QueryBinder<'m> {
    /// Creates a binder over the entity set `entity_set`. Option names
    /// without `$` are accepted when the settings allow it; unknown options
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns `EntitySetNotFound` if the entity set is not in the model.
    pub fn new<I, K, V>(context: BinderContext<'m>, entity_set: &str, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let set = context
            .model
            .find_entity_set(entity_set)
            .ok_or_else(|| BindError::EntitySetNotFound {
                name: entity_set.to_string(),
            })?;
        let target = RangeVariable::implicit(
            TypeRef::entity(set.entity_type.clone(), false),
            Some(set.name.clone()),
        );

        let no_dollar = context.settings.enable_no_dollar_query_options;
        let mut system = HashMap::new();
        let mut aliases = HashMap::new();
        for (name, value) in options {
            let name = name.as_ref().trim();
            if name.starts_with('@') {
                aliases.insert(name.to_string(), value.into());
                continue;
            }
            let normalized = if no_dollar && !name.starts_with('$') {
                format!("${name}")
            } else {
                name.to_string()
            };
            if SYSTEM_OPTIONS.contains(&normalized.as_str()) {
                system.insert(normalized, value.into());
            } else {
                debug!(option = name, "ignoring custom query option");
            }
        }
        info!(
            entity_set,
            options = system.len(),
            aliases = aliases.len(),
            "query binder created"
        );

        Ok(QueryBinder {
            context,
            target,
            options: system,
            aliases: Rc::new(AliasTable::new(aliases)),
            apply: OnceCell::new(),
            compute: OnceCell::new(),
        })
    }

    /// Returns the raw text of a system query option.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    fn base_state(&self, limit: usize) -> BindingState<'m> {
        BindingState::new(self.context, limit)
            .with_aliases(Rc::clone(&self.aliases))
            .with_implicit_range_variable(self.target.clone())
    }

    /// State after `$apply`, before `$compute`.
    fn applied_state(&self, limit: usize) -> Result<BindingState<'m>> {
        let state = self.base_state(limit);
        Ok(match self.parse_apply()? {
            Some(apply) => state_after_apply(&state, apply),
            None => state,
        })
    }

    /// State after `$apply` and `$compute`.
    fn scoped_state(&self, limit: usize) -> Result<BindingState<'m>> {
        let mut state = self.applied_state(limit)?;
        if let Some(compute) = self.parse_compute()? {
            for item in &compute.items {
                state.add_computed_property(item.alias.clone(), item.type_ref.clone());
            }
        }
        Ok(state)
    }

    /// Binds `$filter`.
    ///
    /// # Errors
    ///
    /// Returns a parse or binding error for `$filter`, `$apply` or `$compute`.
    pub fn parse_filter(&self) -> Result<Option<FilterClause>> {
        let Some(text) = self.option("$filter") else {
            return Ok(None);
        };
        let token = parser::parse_filter(text)?;
        let state = self.scoped_state(self.context.settings.filter_limit)?;
        bind_filter(&mut MetadataBinder::new(state), &token).map(Some)
    }

    /// Binds `$orderby`.
    ///
    /// # Errors
    ///
    /// Returns a parse or binding error for `$orderby`, `$apply` or `$compute`.
    pub fn parse_order_by(&self) -> Result<Option<OrderByClause>> {
        let Some(text) = self.option("$orderby") else {
            return Ok(None);
        };
        let tokens = parser::parse_order_by(text)?;
        let state = self.scoped_state(self.context.settings.order_by_limit)?;
        bind_order_by(&mut MetadataBinder::new(state), &tokens)
    }

    /// Binds `$select` and `$expand` together.
    ///
    /// # Errors
    ///
    /// Returns a parse, binding or expansion limit error.
    pub fn parse_select_and_expand(&self) -> Result<Option<SelectExpandClause>> {
        let select = self.option("$select").map(parser::parse_select).transpose()?;
        let expand = self.option("$expand").map(parser::parse_expand).transpose()?;
        if select.is_none() && expand.is_none() {
            return Ok(None);
        }
        let state = self.scoped_state(self.context.settings.select_expand_limit)?;
        bind_select_expand(&state, select.as_ref(), expand.as_ref()).map(Some)
    }

    /// Binds `$apply`. The result is computed once and reused by the
    /// options that depend on it.
    ///
    /// # Errors
    ///
    /// Returns a parse or binding error for `$apply`.
    pub fn parse_apply(&self) -> Result<Option<&ApplyClause>> {
        let clause = self.apply.get_or_try_init(|| {
            let Some(text) = self.option("$apply") else {
                return Ok(None);
            };
            let token = parser::parse_apply(text)?;
            let state = self.base_state(self.context.settings.filter_limit);
            bind_apply(&mut MetadataBinder::new(state), &token).map(Some)
        })?;
        Ok(clause.as_ref())
    }

    /// Binds `$compute` over the shape left by `$apply`.
    ///
    /// # Errors
    ///
    /// Returns a parse or binding error for `$compute` or `$apply`.
    pub fn parse_compute(&self) -> Result<Option<&ComputeClause>> {
        let clause = self.compute.get_or_try_init(|| {
            let Some(text) = self.option("$compute") else {
                return Ok(None);
            };
            let token = parser::parse_compute(text)?;
            let state = self.applied_state(self.context.settings.filter_limit)?;
            bind_compute(&mut MetadataBinder::new(state), &token).map(Some)
        })?;
        Ok(clause.as_ref())
    }

    /// Binds `$search`.
    ///
    /// # Errors
    ///
    /// Returns a parse or binding error for `$search`.
    pub fn parse_search(&self) -> Result<Option<SearchClause>> {
        let Some(text) = self.option("$search") else {
            return Ok(None);
        };
        let token = parser::parse_search(text)?;
        let state = self.base_state(self.context.settings.search_limit);
        bind_search(&mut MetadataBinder::new(state), &token).map(Some)
    }

    /// Parses `$top`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLiteral` unless the value is a non-negative integer.
    pub fn parse_top(&self) -> Result<Option<i64>> {
        self.parse_non_negative("$top")
    }

    /// Parses `$skip`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLiteral` unless the value is a non-negative integer.
    pub fn parse_skip(&self) -> Result<Option<i64>> {
        self.parse_non_negative("$skip")
    }

    /// Parses `$count`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLiteral` unless the value is `true` or `false`.
    pub fn parse_count(&self) -> Result<Option<bool>> {
        self.option("$count")
            .map(|text| match text {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(BindError::InvalidLiteral {
                    text: other.to_string(),
                    reason: "$count must be true or false".into(),
                }),
            })
            .transpose()
    }

    fn parse_non_negative(&self, name: &str) -> Result<Option<i64>> {
        self.option(name)
            .map(|text| match text.parse::<i64>() {
                Ok(n) if n >= 0 => Ok(n),
                _ => Err(BindError::InvalidLiteral {
                    text: text.to_string(),
                    reason: format!("{name} must be a non-negative integer"),
                }),
            })
            .transpose()
    }

    /// Binds every expression-bearing option. `$apply` and `$compute` are
    /// bound first.
    ///
    /// # Errors
    ///
    /// Returns the first error of any option.
    pub fn bind(&self) -> Result<BoundQuery> {
        let apply = self.parse_apply()?.cloned();
        let compute = self.parse_compute()?.cloned();
        let query = BoundQuery {
            filter: self.parse_filter()?,
            order_by: self.parse_order_by()?,
            select_expand: self.parse_select_and_expand()?,
            search: self.parse_search()?,
            apply,
            compute,
            aliases: self.aliases.bound_nodes(),
        };
        debug!(aliases = query.aliases.len(), "query bound");
        Ok(query)
    }
}

impl std::fmt::Debug for QueryBinder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBinder")
            .field("target", &self.target)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
