//! Mutable context threaded through one binding pass.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::binder::node::QueryNode;
use crate::config::BinderContext;
use crate::error::{BindError, Result};
use crate::types::TypeRef;

/// Name of the implicit range variable.
pub const IMPLICIT_RANGE_VARIABLE: &str = "$it";

/// A named variable in scope while binding: `$it` or a lambda parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeVariable {
    /// Variable name.
    pub name: String,
    /// Item type, `None` when ranging over an untyped collection.
    pub type_ref: Option<TypeRef>,
    /// Entity set the items belong to.
    pub navigation_source: Option<String>,
}

impl RangeVariable {
    /// Creates a range variable.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        type_ref: Option<TypeRef>,
        navigation_source: Option<String>,
    ) -> Self {
        RangeVariable {
            name: name.into(),
            type_ref,
            navigation_source,
        }
    }

    /// Creates the implicit `$it` variable.
    #[must_use]
    pub fn implicit(type_ref: TypeRef, navigation_source: Option<String>) -> Self {
        Self::new(IMPLICIT_RANGE_VARIABLE, Some(type_ref), navigation_source)
    }
}

/// Parameter alias values and their bound nodes, shared by every clause of
/// one query.
#[derive(Debug, Default)]
pub struct AliasTable {
    values: HashMap<String, String>,
    bound: RefCell<HashMap<String, QueryNode>>,
}

impl AliasTable {
    /// Creates a table from `@alias -> value text` pairs.
    #[must_use]
    pub fn new(values: HashMap<String, String>) -> Self {
        AliasTable {
            values,
            bound: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the raw value text of an alias.
    #[must_use]
    pub fn value(&self, alias: &str) -> Option<&str> {
        self.values.get(alias).map(String::as_str)
    }

    /// Returns a previously bound alias value.
    #[must_use]
    pub fn cached(&self, alias: &str) -> Option<QueryNode> {
        self.bound.borrow().get(alias).cloned()
    }

    /// Remembers the bound value of an alias.
    pub fn cache(&self, alias: &str, node: QueryNode) {
        self.bound.borrow_mut().insert(alias.to_string(), node);
    }

    /// Returns every alias bound so far.
    #[must_use]
    pub fn bound_nodes(&self) -> HashMap<String, QueryNode> {
        self.bound.borrow().clone()
    }
}

/// Leaves one recursion level when dropped.
#[must_use = "the recursion level is left as soon as the guard is dropped"]
#[derive(Debug)]
pub struct DepthGuard {
    depth: Rc<Cell<usize>>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// State of one binding pass: scope, recursion depth and the shape
/// restrictions left by `$apply`.
#[derive(Debug, Clone)]
pub struct BindingState<'m> {
    context: BinderContext<'m>,
    limit: usize,
    depth: Rc<Cell<usize>>,
    implicit_range_variable: Option<RangeVariable>,
    range_variables: Vec<RangeVariable>,
    segment_source: Option<String>,
    parsed_segments: Vec<String>,
    collapsed: bool,
    aggregated_property_names: Vec<String>,
    computed_properties: IndexMap<String, Option<TypeRef>>,
    aliases: Rc<AliasTable>,
}

impl<'m> BindingState<'m> {
    /// Creates a state with the given recursion limit and no implicit range variable.
    #[must_use]
    pub fn new(context: BinderContext<'m>, limit: usize) -> Self {
        BindingState {
            context,
            limit,
            depth: Rc::new(Cell::new(0)),
            implicit_range_variable: None,
            range_variables: Vec::new(),
            segment_source: None,
            parsed_segments: Vec::new(),
            collapsed: false,
            aggregated_property_names: Vec::new(),
            computed_properties: IndexMap::new(),
            aliases: Rc::new(AliasTable::default()),
        }
    }

    /// Sets the implicit `$it` variable.
    #[must_use]
    pub fn with_implicit_range_variable(mut self, variable: RangeVariable) -> Self {
        self.set_implicit_range_variable(variable);
        self
    }

    /// Shares an alias table with this state.
    #[must_use]
    pub fn with_aliases(mut self, aliases: Rc<AliasTable>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Creates a fresh state for a nested scope, such as an expanded
    /// navigation property or a `$count` segment. The alias table carries
    /// over, and so does the segment prefix unless `variable` names its own
    /// entity set. Range variables and `$apply` restrictions don't.
    #[must_use]
    pub fn child(&self, variable: RangeVariable, limit: usize) -> BindingState<'m> {
        let mut child = BindingState::new(self.context, limit)
            .with_aliases(Rc::clone(&self.aliases))
            .with_implicit_range_variable(variable);
        if child.segment_source.is_none() {
            child.segment_source = self.segment_source.clone();
            child.parsed_segments = self.parsed_segments.clone();
        }
        child
    }

    /// Creates a state for an expression nested inside the current one, such
    /// as the `$filter` of a `$count` segment. Unlike [`child`](Self::child)
    /// it keeps counting recursion against the current depth and limit.
    #[must_use]
    pub fn nested(&self, variable: RangeVariable) -> BindingState<'m> {
        let mut nested = self.child(variable, self.limit);
        nested.depth = Rc::clone(&self.depth);
        nested
    }

    /// Returns the shared binder inputs.
    #[must_use]
    pub fn context(&self) -> BinderContext<'m> {
        self.context
    }

    /// Returns the recursion limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the current recursion depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Enters one recursion level.
    ///
    /// # Errors
    ///
    /// Returns `TooDeepRecursion` if the limit would be exceeded.
    pub fn enter_recursion(&self) -> Result<DepthGuard> {
        let next = self.depth.get() + 1;
        if next > self.limit {
            warn!(limit = self.limit, "recursion limit exceeded while binding");
            return Err(BindError::TooDeepRecursion { limit: self.limit });
        }
        self.depth.set(next);
        Ok(DepthGuard {
            depth: Rc::clone(&self.depth),
        })
    }

    /// Returns the implicit `$it` variable.
    #[must_use]
    pub fn implicit_range_variable(&self) -> Option<&RangeVariable> {
        self.implicit_range_variable.as_ref()
    }

    /// Sets the implicit `$it` variable. It can only be set once.
    pub fn set_implicit_range_variable(&mut self, variable: RangeVariable) {
        debug_assert!(
            self.implicit_range_variable.is_none(),
            "implicit range variable already set"
        );
        if let Some(set) = &variable.navigation_source {
            self.segment_source = Some(set.clone());
            self.parsed_segments.clear();
        }
        self.implicit_range_variable = Some(variable);
    }

    /// Returns the entity set the parsed segments start from.
    #[must_use]
    pub fn segment_source(&self) -> Option<&str> {
        self.segment_source.as_deref()
    }

    /// Returns the path walked from [`segment_source`](Self::segment_source)
    /// to the current level. Entity set bindings are matched against it.
    #[must_use]
    pub fn parsed_segments(&self) -> &[String] {
        &self.parsed_segments
    }

    /// Appends the segments of a nested level whose entities have no entity
    /// set of their own.
    pub fn extend_segments(&mut self, segments: impl IntoIterator<Item = String>) {
        self.parsed_segments.extend(segments);
    }

    /// Brings a lambda variable into scope.
    pub fn push_range_variable(&mut self, variable: RangeVariable) {
        self.range_variables.push(variable);
    }

    /// Removes the innermost lambda variable from scope.
    pub fn pop_range_variable(&mut self) -> Option<RangeVariable> {
        self.range_variables.pop()
    }

    /// Returns the lambda variables in scope, outermost first.
    #[must_use]
    pub fn range_variables(&self) -> &[RangeVariable] {
        &self.range_variables
    }

    /// Looks a range variable up by name. `$it` is the implicit variable and
    /// `$this` the innermost lambda variable.
    #[must_use]
    pub fn find_range_variable(&self, name: &str) -> Option<&RangeVariable> {
        match name {
            IMPLICIT_RANGE_VARIABLE => self.implicit_range_variable.as_ref(),
            "$this" => self
                .range_variables
                .last()
                .or(self.implicit_range_variable.as_ref()),
            _ => self.range_variables.iter().rev().find(|v| v.name == name),
        }
    }

    /// Returns true if a lambda variable with this name is in scope.
    #[must_use]
    pub fn has_lambda_variable(&self, name: &str) -> bool {
        self.range_variables.iter().any(|v| v.name == name)
    }

    /// Restricts property access to the given names, as after an aggregation.
    pub fn collapse(&mut self, names: Vec<String>) {
        debug!(properties = ?names, "scope collapsed");
        self.collapsed = true;
        self.aggregated_property_names = names;
    }

    /// Returns true after an aggregation or grouping.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Returns the names visible in a collapsed scope.
    #[must_use]
    pub fn aggregated_property_names(&self) -> &[String] {
        &self.aggregated_property_names
    }

    /// Makes a `$compute` alias resolvable as a property.
    pub fn add_computed_property(&mut self, alias: impl Into<String>, type_ref: Option<TypeRef>) {
        self.computed_properties.insert(alias.into(), type_ref);
    }

    /// Looks up a `$compute` alias.
    #[must_use]
    pub fn computed_property(&self, alias: &str) -> Option<&Option<TypeRef>> {
        self.computed_properties.get(alias)
    }

    /// Returns every `$compute` alias in scope.
    #[must_use]
    pub fn computed_properties(&self) -> &IndexMap<String, Option<TypeRef>> {
        &self.computed_properties
    }

    /// Returns the shared alias table.
    #[must_use]
    pub fn aliases(&self) -> &Rc<AliasTable> {
        &self.aliases
    }
}
