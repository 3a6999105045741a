//! Post-binding fixups of a select/expand tree.

use tracing::debug;

use crate::binder::clause::{ExpandOptions, PathSelectItem, SelectExpandClause, SelectItem};

/// Gives every expanded navigation an explicit path selection on levels
/// that select explicit paths, so the navigation link stays selected.
pub fn finish_select_expand(clause: &mut SelectExpandClause) {
    for item in &mut clause.items {
        match item {
            SelectItem::Path(path) => {
                if let Some(nested) = path.select.as_deref_mut() {
                    finish_select_expand(nested);
                }
            }
            SelectItem::Expanded(expanded) => {
                if let Some(nested) = expanded.select_expand.as_deref_mut() {
                    finish_select_expand(nested);
                }
            }
            _ => {}
        }
    }

    if clause.selected_paths().next().is_none() {
        return;
    }
    let missing: Vec<PathSelectItem> = clause
        .expanded()
        .filter(|expanded| {
            let path = expanded.path_string();
            !clause.selected_paths().any(|p| p.path_string() == path)
        })
        .map(|expanded| PathSelectItem {
            segments: expanded.segments.clone(),
            options: ExpandOptions::default(),
            select: None,
        })
        .collect();
    for item in missing {
        debug!(path = %item.path_string(), "selecting expanded navigation");
        clause.items.push(SelectItem::Path(item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::clause::{ExpandedItem, SelectSegment};
    use crate::types::TypeRef;

    fn segment(name: &str) -> SelectSegment {
        SelectSegment::Property {
            name: name.into(),
            type_ref: TypeRef::string(),
        }
    }

    fn expanded(name: &str) -> SelectItem {
        SelectItem::Expanded(ExpandedItem {
            segments: vec![SelectSegment::Navigation {
                name: name.into(),
                type_ref: TypeRef::entity("Shop.Order", true),
                navigation_source: None,
            }],
            navigation_source: None,
            options: ExpandOptions::default(),
            select_expand: None,
        })
    }

    #[test]
    fn test_adds_navigation_selection_when_paths_selected() {
        let mut clause = SelectExpandClause {
            items: vec![
                SelectItem::Path(PathSelectItem {
                    segments: vec![segment("Name")],
                    options: ExpandOptions::default(),
                    select: None,
                }),
                expanded("Orders"),
            ],
            all_selected: false,
        };
        finish_select_expand(&mut clause);
        let paths: Vec<String> = clause.selected_paths().map(PathSelectItem::path_string).collect();
        assert_eq!(paths, vec!["Name", "Orders"]);

        finish_select_expand(&mut clause);
        assert_eq!(clause.selected_paths().count(), 2);
    }

    #[test]
    fn test_leaves_all_selected_levels_alone() {
        let mut clause = SelectExpandClause {
            items: vec![expanded("Orders")],
            all_selected: true,
        };
        finish_select_expand(&mut clause);
        assert_eq!(clause.items.len(), 1);
    }
}
