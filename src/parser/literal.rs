//! URI literal parsing and value conversion.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{BindError, Result};
use crate::model::Model;
use crate::types::{EnumValue, TypeKind, TypeRef, Value};

fn invalid(text: &str, reason: impl Into<String>) -> BindError {
    BindError::InvalidLiteral {
        text: text.to_string(),
        reason: reason.into(),
    }
}

/// Parses a single URI literal such as `42`, `'text'`, `2024-01-31` or
/// `duration'PT1H'`.
///
/// # Errors
///
/// Returns `InvalidLiteral` if the text is not a recognized literal.
pub fn parse_literal(text: &str) -> Result<Value> {
    let text = text.trim();
    match text {
        "null" => return Ok(Value::Null),
        "true" => return Ok(Value::Boolean(true)),
        "false" => return Ok(Value::Boolean(false)),
        _ => {}
    }
    if text.starts_with('\'') {
        return parse_string(text).map(Value::String);
    }
    if text
        .get(..8)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("duration"))
    {
        return parse_duration(text);
    }
    if let Ok(guid) = Uuid::parse_str(text) {
        if text.len() == 36 {
            return Ok(Value::Guid(guid));
        }
    }
    if text.contains('T') && text.as_bytes().get(4) == Some(&b'-') {
        return parse_date_time_offset(text);
    }
    if text.len() == 10 && text.as_bytes().get(4) == Some(&b'-') {
        return parse_date(text);
    }
    if text.as_bytes().get(2) == Some(&b':') {
        return parse_time_of_day(text);
    }
    parse_number(text)
}

/// Unquotes a string literal, collapsing doubled single quotes.
///
/// # Errors
///
/// Returns `InvalidLiteral` if the text is not quoted.
pub fn parse_string(text: &str) -> Result<String> {
    let inner = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .ok_or_else(|| invalid(text, "string literals must be enclosed in single quotes"))?;
    Ok(inner.replace("''", "'"))
}

/// Parses a numeric literal, honouring the `L`, `m`, `d` and `f` suffixes.
///
/// Unsuffixed integers become `Int32`, widening to `Int64` and then
/// `Decimal` when they don't fit. Unsuffixed fractions become `Decimal`
/// and exponent notation becomes `Double`.
///
/// # Errors
///
/// Returns `InvalidLiteral` for malformed or out-of-range numbers.
pub fn parse_number(text: &str) -> Result<Value> {
    match text {
        "INF" => return Ok(Value::Double(f64::INFINITY)),
        "-INF" => return Ok(Value::Double(f64::NEG_INFINITY)),
        "NaN" => return Ok(Value::Double(f64::NAN)),
        _ => {}
    }
    let Some(last) = text.chars().last() else {
        return Err(invalid(text, "empty numeric literal"));
    };
    let body = &text[..text.len() - last.len_utf8()];
    match last {
        'L' | 'l' => body
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| invalid(text, e.to_string())),
        'm' | 'M' => parse_decimal(body)
            .map(Value::Decimal)
            .ok_or_else(|| invalid(text, "not a valid decimal")),
        'd' | 'D' => body
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|e| invalid(text, e.to_string())),
        'f' | 'F' => body
            .parse::<f32>()
            .map(Value::Single)
            .map_err(|e| invalid(text, e.to_string())),
        _ if text.contains(['e', 'E']) => text
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|e| invalid(text, e.to_string())),
        _ if text.contains('.') => parse_decimal(text)
            .map(Value::Decimal)
            .ok_or_else(|| invalid(text, "not a valid decimal")),
        _ => {
            if let Ok(v) = text.parse::<i32>() {
                Ok(Value::Int32(v))
            } else if let Ok(v) = text.parse::<i64>() {
                Ok(Value::Int64(v))
            } else {
                parse_decimal(text)
                    .map(Value::Decimal)
                    .ok_or_else(|| invalid(text, "not a valid number"))
            }
        }
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

/// Parses `yyyy-mm-dd`.
///
/// # Errors
///
/// Returns `InvalidLiteral` if the text is not a calendar date.
pub fn parse_date(text: &str) -> Result<Value> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(Value::Date)
        .map_err(|e| invalid(text, e.to_string()))
}

/// Parses an RFC 3339 timestamp. Seconds may be omitted.
///
/// # Errors
///
/// Returns `InvalidLiteral` if the text is not a timestamp with offset.
pub fn parse_date_time_offset(text: &str) -> Result<Value> {
    let normalized = match text.split_once('T') {
        Some((date, rest)) => {
            let offset_at = rest
                .char_indices()
                .skip(1)
                .find(|(_, c)| matches!(c, 'Z' | 'z' | '+' | '-'))
                .map_or(rest.len(), |(i, _)| i);
            let (time, offset) = rest.split_at(offset_at);
            if time.matches(':').count() == 1 {
                format!("{date}T{time}:00{offset}")
            } else {
                text.to_string()
            }
        }
        None => text.to_string(),
    };
    DateTime::parse_from_rfc3339(&normalized)
        .map(Value::DateTimeOffset)
        .map_err(|e| invalid(text, e.to_string()))
}

/// Parses `hh:mm[:ss[.fffffff]]`.
///
/// # Errors
///
/// Returns `InvalidLiteral` if the text is not a time of day.
pub fn parse_time_of_day(text: &str) -> Result<Value> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map(Value::TimeOfDay)
        .map_err(|e| invalid(text, e.to_string()))
}

/// Parses `duration'[-]PnDTnHnMn.nS'`.
///
/// # Errors
///
/// Returns `InvalidLiteral` if the text is not an ISO 8601 day-time duration.
pub fn parse_duration(text: &str) -> Result<Value> {
    let body = text
        .get(8..)
        .and_then(|t| t.strip_prefix('\''))
        .and_then(|t| t.strip_suffix('\''))
        .ok_or_else(|| invalid(text, "expected duration'...'"))?;
    parse_iso_duration(body)
        .map(Value::Duration)
        .ok_or_else(|| invalid(text, "not an ISO 8601 day-time duration"))
}

fn parse_iso_duration(text: &str) -> Option<chrono::Duration> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, text),
    };
    let rest = rest.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut total = chrono::Duration::zero();
    if !date_part.is_empty() {
        let days: i64 = date_part.strip_suffix('D')?.parse().ok()?;
        total += chrono::Duration::try_days(days)?;
    }
    if let Some(mut time) = time_part {
        if time.is_empty() {
            return None;
        }
        for (unit, to_duration) in [
            ('H', chrono::Duration::try_hours as fn(i64) -> Option<chrono::Duration>),
            ('M', chrono::Duration::try_minutes),
        ] {
            if let Some((n, r)) = time.split_once(unit) {
                total += to_duration(n.parse().ok()?)?;
                time = r;
            }
        }
        if let Some(seconds) = time.strip_suffix('S') {
            let (whole, frac) = seconds.split_once('.').unwrap_or((seconds, ""));
            total += chrono::Duration::try_seconds(whole.parse().ok()?)?;
            if !frac.is_empty() {
                let digits: String = frac.chars().chain("000000000".chars()).take(9).collect();
                total += chrono::Duration::nanoseconds(digits.parse().ok()?);
            }
        } else if !time.is_empty() {
            return None;
        }
    }
    Some(if negative { -total } else { total })
}

/// Parses a collection literal. Parenthesized lists such as `(1,2,3)` are
/// rewritten to bracket syntax first; bracketed text is read as JSON when
/// possible, and as a list of URI literals otherwise.
///
/// # Errors
///
/// Returns `InvalidLiteral` if the text is not a collection.
pub fn parse_collection(text: &str) -> Result<Vec<Value>> {
    let trimmed = text.trim();
    let bracketed = match trimmed
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
    {
        Some(inner) => format!("[{inner}]"),
        None => trimmed.to_string(),
    };
    let inner = bracketed
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| invalid(text, "expected a parenthesized or bracketed collection"))?;

    if let Ok(Value::Collection(items)) = parse_json(&bracketed) {
        return Ok(items);
    }
    split_top_level(inner)
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .map(|item| parse_collection_item(item.trim()))
        .collect()
}

fn parse_collection_item(item: &str) -> Result<Value> {
    if item.starts_with('"') || item.starts_with('[') || item.starts_with('{') {
        parse_json(item)
    } else {
        parse_literal(item)
    }
}

/// Splits on commas that are not nested in quotes, brackets or braces.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_single = false;
    let mut in_double = false;
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'\\' if in_double => i += 1,
            b'[' | b'{' | b'(' if !in_single && !in_double => depth += 1,
            b']' | b'}' | b')' if !in_single && !in_double => depth = depth.saturating_sub(1),
            b',' if depth == 0 && !in_single && !in_double => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}

/// Parses JSON text into a value. Objects become [`Value::Resource`] and
/// arrays become [`Value::Collection`].
///
/// # Errors
///
/// Returns `InvalidLiteral` if the text is not valid JSON.
pub fn parse_json(text: &str) -> Result<Value> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| invalid(text, e.to_string()))?;
    Ok(from_json(json))
}

fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).map_or(Value::Int64(i), Value::Int32)
            } else if let Some(u) = n.as_u64() {
                Value::Decimal(Decimal::from(u))
            } else {
                Value::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Collection(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(map) => Value::Resource(
            map.into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect::<IndexMap<_, _>>(),
        ),
    }
}

/// Converts a literal value to `target`.
///
/// Numeric values convert when no information is lost, strings convert to
/// enum members, and dates widen to timestamps. Collections convert item by
/// item.
///
/// # Errors
///
/// Returns `CannotConvertToType` when no conversion applies, or
/// `EnumMemberNotFound` for a string naming no member of the target enum.
pub fn convert_value(
    value: &Value,
    target: &TypeRef,
    model: &Model,
    ignore_case: bool,
) -> Result<Value> {
    let fail = || BindError::CannotConvertToType {
        value: value.to_string(),
        target: target.full_name(),
    };
    match (&target.kind, value) {
        (_, Value::Null) => Ok(Value::Null),
        (TypeKind::Collection(item), Value::Collection(items)) => items
            .iter()
            .map(|v| convert_value(v, item, model, ignore_case))
            .collect::<Result<Vec<_>>>()
            .map(Value::Collection),
        (TypeKind::Enum(name), Value::Enum(e)) if &e.type_name == name => Ok(value.clone()),
        (TypeKind::Enum(name), Value::String(text)) => {
            parse_enum_value(model, name, text, ignore_case).map(Value::Enum)
        }
        (TypeKind::Enum(name), _) => match value.as_i64() {
            Some(n) => parse_enum_value(model, name, &n.to_string(), ignore_case).map(Value::Enum),
            None => Err(fail()),
        },
        _ => match target.as_primitive() {
            Some(kind) => value.convert_to(kind).ok_or_else(fail),
            None => Err(fail()),
        },
    }
}

/// Validates `text` (one member, a comma separated member list for flags
/// enums, or a number) against the enum `type_name`.
///
/// # Errors
///
/// Returns `TypeNotFound` for an unknown enum and `EnumMemberNotFound` for an
/// unknown member.
pub fn parse_enum_value(
    model: &Model,
    type_name: &str,
    text: &str,
    ignore_case: bool,
) -> Result<EnumValue> {
    let enum_type = model
        .find_enum_type(type_name)
        .ok_or_else(|| BindError::TypeNotFound {
            name: type_name.to_string(),
        })?;
    let parts: Vec<&str> = if enum_type.is_flags {
        text.split(',').map(str::trim).collect()
    } else {
        vec![text.trim()]
    };
    let mut names = Vec::with_capacity(parts.len());
    for part in parts {
        let member = enum_type.find_member(part, ignore_case).ok_or_else(|| {
            BindError::EnumMemberNotFound {
                type_name: type_name.to_string(),
                member: part.to_string(),
            }
        })?;
        names.push(member.name.clone());
    }
    Ok(EnumValue {
        type_name: enum_type.name.clone(),
        value: names.join(","),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_pick_narrowest_type() {
        assert_eq!(parse_number("42").unwrap(), Value::Int32(42));
        assert_eq!(parse_number("3000000000").unwrap(), Value::Int64(3_000_000_000));
        assert_eq!(parse_number("7L").unwrap(), Value::Int64(7));
        assert_eq!(
            parse_number("2.5").unwrap(),
            Value::Decimal(Decimal::new(25, 1))
        );
        assert_eq!(parse_number("2.5d").unwrap(), Value::Double(2.5));
        assert_eq!(parse_number("1e3").unwrap(), Value::Double(1000.0));
        assert_eq!(parse_number("1.5f").unwrap(), Value::Single(1.5));
        assert!(parse_number("12x").is_err());
    }

    #[test]
    fn test_string_unescapes_quotes() {
        assert_eq!(parse_string("'O''Neil'").unwrap(), "O'Neil");
        assert!(parse_string("unquoted").is_err());
    }

    #[test]
    fn test_temporal_literals() {
        assert!(matches!(parse_literal("2024-02-29").unwrap(), Value::Date(_)));
        assert!(matches!(
            parse_literal("2024-02-29T10:30Z").unwrap(),
            Value::DateTimeOffset(_)
        ));
        assert!(matches!(
            parse_literal("2024-02-29T10:30:15.25+02:00").unwrap(),
            Value::DateTimeOffset(_)
        ));
        assert!(matches!(parse_literal("13:45:00").unwrap(), Value::TimeOfDay(_)));
        assert!(parse_literal("2023-02-30").is_err());
    }

    #[test]
    fn test_duration_literal() {
        assert_eq!(
            parse_literal("duration'P1DT2H30M'").unwrap(),
            Value::Duration(chrono::Duration::minutes(24 * 60 + 150))
        );
        assert_eq!(
            parse_literal("duration'-PT1.5S'").unwrap(),
            Value::Duration(-chrono::Duration::milliseconds(1500))
        );
        assert!(parse_literal("duration'P1Y'").is_err());
    }

    #[test]
    fn test_guid_literal() {
        let value = parse_literal("01234567-89ab-cdef-0123-456789abcdef").unwrap();
        assert!(matches!(value, Value::Guid(_)));
    }

    #[test]
    fn test_parenthesized_collection_is_rewritten() {
        assert_eq!(
            parse_collection("(1, 2, 3)").unwrap(),
            vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]
        );
        assert_eq!(
            parse_collection("('a,b', 'c')").unwrap(),
            vec![Value::String("a,b".into()), Value::String("c".into())]
        );
        assert_eq!(
            parse_collection(r#"["x", "y"]"#).unwrap(),
            vec![Value::String("x".into()), Value::String("y".into())]
        );
        assert!(parse_collection("()").unwrap().is_empty());
        assert!(parse_collection("1,2").is_err());
    }

    #[test]
    fn test_json_object() {
        let value = parse_json(r#"{"City":"Oslo","Zip":1234}"#).unwrap();
        let Value::Resource(props) = value else {
            panic!("expected a resource");
        };
        assert_eq!(props.get("Zip"), Some(&Value::Int32(1234)));
    }
}
