//! Folds the top-level `$select` and `$expand` into one expand term.

use crate::binder::state::IMPLICIT_RANGE_VARIABLE;
use crate::parser::{ExpandTermToken, ExpandToken, PathToken, SelectToken, TermOptions};

/// Wraps the top-level options in an expand term over `$it`, so every level
/// of the tree has the same shape.
#[must_use]
pub fn unify_select_expand(select: Option<SelectToken>, expand: Option<ExpandToken>) -> ExpandTermToken {
    ExpandTermToken {
        path: PathToken::from_segments([IMPLICIT_RANGE_VARIABLE]),
        options: TermOptions {
            select,
            expand,
            ..TermOptions::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_options_move_under_it() {
        let term = unify_select_expand(Some(SelectToken::of(&["Name"])), None);
        assert_eq!(term.path.to_path_string(), "$it");
        assert_eq!(term.options.select.unwrap().terms.len(), 1);
        assert!(term.options.expand.is_none());
    }
}
