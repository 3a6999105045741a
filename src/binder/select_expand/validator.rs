//! Expansion depth and count limits.

use tracing::warn;

use crate::binder::clause::{ExpandedItem, SelectExpandClause, SelectItem};
use crate::config::BinderSettings;
use crate::error::{BindError, Result};

/// Checks a bound tree against the configured expansion limits. `$levels=n`
/// counts as `n` levels and `$levels=max` as the maximum depth.
///
/// # Errors
///
/// Returns `ExpansionDepthExceeded` or `ExpansionCountExceeded`.
pub fn validate_select_expand(clause: &SelectExpandClause, settings: &BinderSettings) -> Result<()> {
    let limit = settings.maximum_expansion_depth;
    let depth = expansion_depth(clause, limit);
    if depth > limit {
        warn!(depth, limit, "expansion depth exceeded");
        return Err(BindError::ExpansionDepthExceeded { depth, limit });
    }
    let limit = settings.maximum_expansion_count;
    let count = expansion_count(clause);
    if count > limit {
        warn!(count, limit, "expansion count exceeded");
        return Err(BindError::ExpansionCountExceeded { count, limit });
    }
    Ok(())
}

fn expansions(clause: &SelectExpandClause) -> impl Iterator<Item = &ExpandedItem> {
    clause.items.iter().filter_map(|item| match item {
        SelectItem::Expanded(e) | SelectItem::ExpandedReference(e) | SelectItem::ExpandedCount(e) => {
            Some(e)
        }
        _ => None,
    })
}

fn nested_selects(clause: &SelectExpandClause) -> impl Iterator<Item = &SelectExpandClause> {
    clause.selected_paths().filter_map(|p| p.select.as_deref())
}

fn expansion_depth(clause: &SelectExpandClause, max: usize) -> usize {
    let through_expansions = expansions(clause).map(|item| {
        let nested = item
            .select_expand
            .as_deref()
            .map_or(0, |c| expansion_depth(c, max));
        match item.options.levels {
            Some(None) => max,
            Some(Some(levels)) => (levels as usize).max(1).saturating_add(nested),
            None => nested.saturating_add(1),
        }
    });
    let through_selects = nested_selects(clause).map(|c| expansion_depth(c, max));
    through_expansions.chain(through_selects).max().unwrap_or(0)
}

fn expansion_count(clause: &SelectExpandClause) -> usize {
    let own: usize = expansions(clause)
        .map(|item| {
            1 + item
                .select_expand
                .as_deref()
                .map_or(0, expansion_count)
        })
        .sum();
    own + nested_selects(clause).map(expansion_count).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::clause::{ExpandOptions, SelectSegment};
    use crate::types::TypeRef;

    fn expansion(levels: Option<Option<u32>>, nested: Vec<SelectItem>) -> SelectItem {
        SelectItem::Expanded(ExpandedItem {
            segments: vec![SelectSegment::Navigation {
                name: "Friends".into(),
                type_ref: TypeRef::collection(TypeRef::entity("Shop.Person", false)),
                navigation_source: None,
            }],
            navigation_source: None,
            options: ExpandOptions {
                levels,
                ..ExpandOptions::default()
            },
            select_expand: Some(Box::new(SelectExpandClause {
                items: nested,
                all_selected: true,
            })),
        })
    }

    fn tree(items: Vec<SelectItem>) -> SelectExpandClause {
        SelectExpandClause {
            items,
            all_selected: true,
        }
    }

    #[test]
    fn test_depth_and_count() {
        let clause = tree(vec![
            expansion(None, vec![expansion(None, Vec::new())]),
            expansion(None, Vec::new()),
        ]);
        assert_eq!(expansion_depth(&clause, 10), 2);
        assert_eq!(expansion_count(&clause), 3);

        let settings = BinderSettings::new().with_maximum_expansion_count(2);
        assert_eq!(
            validate_select_expand(&clause, &settings),
            Err(BindError::ExpansionCountExceeded { count: 3, limit: 2 })
        );
        let settings = BinderSettings::new().with_maximum_expansion_depth(1);
        assert_eq!(
            validate_select_expand(&clause, &settings),
            Err(BindError::ExpansionDepthExceeded { depth: 2, limit: 1 })
        );
    }

    #[test]
    fn test_levels_count_toward_depth() {
        let clause = tree(vec![expansion(Some(Some(3)), Vec::new())]);
        assert_eq!(expansion_depth(&clause, 10), 3);

        let clause = tree(vec![expansion(Some(None), Vec::new())]);
        assert_eq!(expansion_depth(&clause, 4), 4);
        let settings = BinderSettings::new().with_maximum_expansion_depth(4);
        assert!(validate_select_expand(&clause, &settings).is_ok());
    }
}
