//! Puts an expand tree in declaration order and merges duplicate terms.

use indexmap::IndexMap;

use crate::parser::{ExpandTermToken, ExpandToken, SelectTermToken, SelectToken, TermOptions};

/// Normalizes a unified expand tree at every level:
///
/// - paths are turned into declaration order,
/// - expand terms with the same path are merged, keeping the options of the
///   first one and the union of their nested `$select` and `$expand`,
/// - select terms with the same path are kept once.
///
/// Normalizing an already normalized tree returns an identical tree.
#[must_use]
pub fn normalize_expand_tree(term: &ExpandTermToken) -> ExpandTermToken {
    ExpandTermToken {
        path: term.path.normalized(),
        options: normalize_options(&term.options),
    }
}

fn normalize_options(options: &TermOptions) -> TermOptions {
    let mut normalized = options.clone();
    normalized.select = options.select.as_ref().map(normalize_select);
    normalized.expand = options.expand.as_ref().map(|expand| ExpandToken {
        terms: combine(expand.terms.iter().map(normalize_expand_tree).collect()),
    });
    normalized
}

fn normalize_select(select: &SelectToken) -> SelectToken {
    let terms = select
        .terms
        .iter()
        .map(|term| SelectTermToken {
            path: term.path.normalized(),
            options: normalize_options(&term.options),
        })
        .collect();
    SelectToken {
        terms: dedup_select(terms),
    }
}

fn dedup_select(terms: Vec<SelectTermToken>) -> Vec<SelectTermToken> {
    let mut seen: IndexMap<String, SelectTermToken> = IndexMap::new();
    for term in terms {
        seen.entry(term.path.to_path_string()).or_insert(term);
    }
    seen.into_values().collect()
}

/// Merges normalized terms that expand the same path.
fn combine(terms: Vec<ExpandTermToken>) -> Vec<ExpandTermToken> {
    let mut combined: IndexMap<String, ExpandTermToken> = IndexMap::new();
    for term in terms {
        match combined.get_mut(&term.path.to_path_string()) {
            Some(existing) => merge_into(existing, term),
            None => {
                combined.insert(term.path.to_path_string(), term);
            }
        }
    }
    combined.into_values().collect()
}

fn merge_into(existing: &mut ExpandTermToken, other: ExpandTermToken) {
    if let Some(select) = other.options.select {
        let mut terms = existing
            .options
            .select
            .take()
            .map(|s| s.terms)
            .unwrap_or_default();
        terms.extend(select.terms);
        existing.options.select = Some(SelectToken {
            terms: dedup_select(terms),
        });
    }
    if let Some(expand) = other.options.expand {
        let mut terms = existing
            .options
            .expand
            .take()
            .map(|e| e.terms)
            .unwrap_or_default();
        terms.extend(expand.terms);
        existing.options.expand = Some(ExpandToken {
            terms: combine(terms),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::select_expand::unify_select_expand;
    use crate::parser::{parse_expand, parse_select, PathOrder};

    #[test]
    fn test_paths_are_put_in_declaration_order() {
        let tree = unify_select_expand(None, Some(ExpandToken::of(&["Customer/Orders"])));
        let normalized = normalize_expand_tree(&tree);
        let term = &normalized.options.expand.as_ref().unwrap().terms[0];
        assert_eq!(term.path.order, PathOrder::Declaration);
        assert_eq!(term.path.segments[0].identifier, "Customer");
    }

    #[test]
    fn test_duplicate_expands_are_merged() {
        let expand = parse_expand("Orders($select=Amount;$top=1),Orders($select=Status,Amount;$top=9)")
            .unwrap();
        let normalized = normalize_expand_tree(&unify_select_expand(None, Some(expand)));
        let terms = &normalized.options.expand.as_ref().unwrap().terms;
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].options.top, Some(1));
        let selected: Vec<String> = terms[0]
            .options
            .select
            .as_ref()
            .unwrap()
            .terms
            .iter()
            .map(|t| t.path.to_path_string())
            .collect();
        assert_eq!(selected, vec!["Amount", "Status"]);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let tree = unify_select_expand(
            Some(parse_select("Name,Name,Address/City").unwrap()),
            Some(parse_expand("Orders($expand=Items),Orders($expand=Items/Product)").unwrap()),
        );
        let once = normalize_expand_tree(&tree);
        assert_eq!(normalize_expand_tree(&once), once);
    }
}
