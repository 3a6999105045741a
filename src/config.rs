//! Binder configuration.

use serde::Deserialize;

use crate::binder::UriResolver;
use crate::model::{FunctionRegistry, Model};

/// Default recursion ceiling for every expression-bearing query option.
pub const DEFAULT_RECURSION_LIMIT: usize = 800;

/// Limits and switches applied while binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BinderSettings {
    /// Recursion limit for `$filter`, `$apply` and `$compute` (default: 800).
    pub filter_limit: usize,
    /// Recursion limit for `$orderby` (default: 800).
    pub order_by_limit: usize,
    /// Recursion limit for `$search` (default: 800).
    pub search_limit: usize,
    /// Recursion limit for expressions nested in `$select`/`$expand` (default: 800).
    pub select_expand_limit: usize,
    /// Maximum `$expand` nesting depth (default: unlimited).
    pub maximum_expansion_depth: usize,
    /// Maximum number of expanded items in one `$expand` tree (default: unlimited).
    pub maximum_expansion_count: usize,
    /// Match property, type and function names ignoring case (default: false).
    pub enable_case_insensitive: bool,
    /// Accept system query options without the `$` prefix (default: false).
    pub enable_no_dollar_query_options: bool,
}

impl Default for BinderSettings {
    fn default() -> Self {
        Self {
            filter_limit: DEFAULT_RECURSION_LIMIT,
            order_by_limit: DEFAULT_RECURSION_LIMIT,
            search_limit: DEFAULT_RECURSION_LIMIT,
            select_expand_limit: DEFAULT_RECURSION_LIMIT,
            maximum_expansion_depth: usize::MAX,
            maximum_expansion_count: usize::MAX,
            enable_case_insensitive: false,
            enable_no_dollar_query_options: false,
        }
    }
}

impl BinderSettings {
    /// Creates settings with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `$filter` recursion limit.
    #[must_use]
    pub fn with_filter_limit(mut self, limit: usize) -> Self {
        self.filter_limit = limit;
        self
    }

    /// Sets the `$orderby` recursion limit.
    #[must_use]
    pub fn with_order_by_limit(mut self, limit: usize) -> Self {
        self.order_by_limit = limit;
        self
    }

    /// Sets the `$search` recursion limit.
    #[must_use]
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// Sets the `$select`/`$expand` recursion limit.
    #[must_use]
    pub fn with_select_expand_limit(mut self, limit: usize) -> Self {
        self.select_expand_limit = limit;
        self
    }

    /// Sets the maximum expansion depth.
    #[must_use]
    pub fn with_maximum_expansion_depth(mut self, depth: usize) -> Self {
        self.maximum_expansion_depth = depth;
        self
    }

    /// Sets the maximum expansion count.
    #[must_use]
    pub fn with_maximum_expansion_count(mut self, count: usize) -> Self {
        self.maximum_expansion_count = count;
        self
    }

    /// Enables or disables case-insensitive name resolution.
    #[must_use]
    pub fn with_case_insensitive(mut self, enabled: bool) -> Self {
        self.enable_case_insensitive = enabled;
        self
    }

    /// Enables or disables system query options without `$`.
    #[must_use]
    pub fn with_no_dollar_query_options(mut self, enabled: bool) -> Self {
        self.enable_no_dollar_query_options = enabled;
        self
    }
}

/// Read-only handles shared by every binding pass.
#[derive(Clone, Copy)]
pub struct BinderContext<'m> {
    /// Schema.
    pub model: &'m Model,
    /// Name resolution and promotion strategy.
    pub resolver: &'m dyn UriResolver,
    /// Limits and switches.
    pub settings: &'m BinderSettings,
    /// Custom URI functions.
    pub functions: &'m FunctionRegistry,
}

impl<'m> BinderContext<'m> {
    /// Bundles the binder inputs.
    #[must_use]
    pub fn new(
        model: &'m Model,
        resolver: &'m dyn UriResolver,
        settings: &'m BinderSettings,
        functions: &'m FunctionRegistry,
    ) -> Self {
        BinderContext {
            model,
            resolver,
            settings,
            functions,
        }
    }
}

impl std::fmt::Debug for BinderContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinderContext")
            .field("settings", self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = BinderSettings::default();
        assert_eq!(settings.filter_limit, 800);
        assert_eq!(settings.maximum_expansion_depth, usize::MAX);
        assert!(!settings.enable_case_insensitive);
    }

    #[test]
    fn test_builder_methods() {
        let settings = BinderSettings::new()
            .with_filter_limit(10)
            .with_maximum_expansion_count(3)
            .with_case_insensitive(true);
        assert_eq!(settings.filter_limit, 10);
        assert_eq!(settings.maximum_expansion_count, 3);
        assert!(settings.enable_case_insensitive);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let settings: BinderSettings =
            serde_json::from_str(r#"{"order_by_limit": 5, "enable_no_dollar_query_options": true}"#)
                .unwrap();
        assert_eq!(settings.order_by_limit, 5);
        assert_eq!(settings.filter_limit, 800);
        assert!(settings.enable_no_dollar_query_options);
    }
}
