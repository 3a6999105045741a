//! `$select` and `$expand` option text.
//!
//! Items are split on top-level commas. An item is a `/`-separated path,
//! optionally followed by `(...)` holding `;`-separated nested options whose
//! values go through the expression parser.

use crate::error::{BindError, Result};
use crate::parser::ast::{
    ExpandTermToken, ExpandToken, LevelsToken, PathToken, SelectTermToken, SelectToken,
    TermOptions,
};
use crate::parser::grammar::{parse_apply, parse_compute, parse_filter, parse_order_by, parse_search};
use crate::stack::ensure_stack;

/// Parses a `$select` value.
///
/// # Errors
///
/// Returns a `ParseError` for unbalanced parentheses, unknown nested options
/// or an invalid nested expression.
pub fn parse_select(text: &str) -> Result<SelectToken> {
    let mut terms = Vec::new();
    for item in split_top_level(text, ',')? {
        let (path, options) = split_term(item)?;
        terms.push(SelectTermToken {
            path: PathToken::parse(path),
            options: parse_options(options)?,
        });
    }
    Ok(SelectToken { terms })
}

/// Parses an `$expand` value.
///
/// # Errors
///
/// Returns a `ParseError` for unbalanced parentheses, unknown nested options
/// or an invalid nested expression.
pub fn parse_expand(text: &str) -> Result<ExpandToken> {
    let mut terms = Vec::new();
    for item in split_top_level(text, ',')? {
        let (path, options) = split_term(item)?;
        terms.push(ExpandTermToken {
            path: PathToken::parse(path),
            options: parse_options(options)?,
        });
    }
    Ok(ExpandToken { terms })
}

fn error(text: &str, message: impl Into<String>) -> BindError {
    BindError::ParseError {
        line: 1,
        col: 1,
        message: format!("{} in '{text}'", message.into()),
    }
}

/// Splits `text` on `separator` outside quotes and brackets. Empty items are
/// dropped.
fn split_top_level(text: &str, separator: char) -> Result<Vec<&str>> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                // '' escapes a quote inside a string literal
                if q == '\'' && chars.peek().is_some_and(|&(_, next)| next == '\'') {
                    chars.next();
                } else {
                    quote = None;
                }
            } else if c == '\\' && q == '"' {
                chars.next();
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| error(text, "unbalanced closing bracket"))?;
            }
            c if c == separator && depth == 0 => {
                items.push(text[start..index].trim());
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(error(text, "unterminated bracket or quote"));
    }
    items.push(text[start..].trim());
    items.retain(|item| !item.is_empty());
    Ok(items)
}

/// Separates `Path(options)` into the path and the option text.
fn split_term(item: &str) -> Result<(&str, &str)> {
    let Some(open) = item.find('(') else {
        return Ok((item, ""));
    };
    let Some(inner) = item[open + 1..].strip_suffix(')') else {
        return Err(error(item, "expected ')' after nested options"));
    };
    Ok((item[..open].trim(), inner))
}

fn parse_options(text: &str) -> Result<TermOptions> {
    let mut options = TermOptions::default();
    for option in split_top_level(text, ';')? {
        let (name, value) = option
            .split_once('=')
            .ok_or_else(|| error(option, "expected name=value"))?;
        let value = value.trim();
        match name.trim().trim_start_matches('$') {
            "filter" => options.filter = Some(parse_filter(value)?),
            "orderby" => options.order_by = parse_order_by(value)?,
            "top" => options.top = Some(parse_integer(value)?),
            "skip" => options.skip = Some(parse_integer(value)?),
            "count" => {
                options.count = Some(match value {
                    "true" => true,
                    "false" => false,
                    _ => return Err(error(value, "expected true or false for $count")),
                });
            }
            "search" => options.search = Some(parse_search(value)?),
            "compute" => options.compute = Some(parse_compute(value)?),
            "select" => options.select = Some(ensure_stack(|| parse_select(value))?),
            "expand" => options.expand = Some(ensure_stack(|| parse_expand(value))?),
            "levels" => {
                options.levels = Some(if value.eq_ignore_ascii_case("max") {
                    LevelsToken::Max
                } else {
                    let levels = value
                        .parse()
                        .map_err(|_| error(value, "expected a non-negative integer or max"))?;
                    LevelsToken::Value(levels)
                });
            }
            "apply" => options.apply = Some(parse_apply(value)?),
            other => return Err(error(option, format!("unknown nested option '{other}'"))),
        }
    }
    Ok(options)
}

fn parse_integer(value: &str) -> Result<i64> {
    match value.parse::<i64>() {
        Ok(n) if n >= 0 => Ok(n),
        _ => Err(error(value, "expected a non-negative integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_paths() {
        let select = parse_select("Name, Address/City,Shop.*").unwrap();
        assert_eq!(select.terms.len(), 3);
        assert_eq!(select.terms[1].path.to_path_string(), "Address/City");
        assert!(select.terms[2].path.segments[0].is_namespace_wildcard());
    }

    #[test]
    fn test_expand_nested_options() {
        let expand = parse_expand(
            "Orders($filter=Amount gt 10 and Status eq 'a;b';$orderby=Amount desc;$top=5;$expand=Items($levels=max)),Manager",
        )
        .unwrap();
        assert_eq!(expand.terms.len(), 2);
        let orders = &expand.terms[0].options;
        assert!(orders.filter.is_some());
        assert_eq!(orders.order_by.len(), 1);
        assert_eq!(orders.top, Some(5));
        let items = &orders.expand.as_ref().unwrap().terms[0];
        assert_eq!(items.options.levels, Some(LevelsToken::Max));
        assert!(expand.terms[1].options.is_empty());
    }

    #[test]
    fn test_rejects_malformed_text() {
        assert!(parse_expand("Orders($top=5").is_err());
        assert!(parse_expand("Orders($unknown=1)").is_err());
        assert!(parse_expand("Orders($top=-1)").is_err());
    }
}
