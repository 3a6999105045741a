//! Value and `PrimitiveKind` definitions.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// Boolean.
    Boolean,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 8-bit integer.
    SByte,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit floating point.
    Single,
    /// 64-bit floating point.
    Double,
    /// Fixed precision decimal.
    Decimal,
    /// UTF-8 string.
    String,
    /// 128-bit GUID.
    Guid,
    /// Calendar date without time zone.
    Date,
    /// Timestamp with UTC offset.
    DateTimeOffset,
    /// Clock time without date.
    TimeOfDay,
    /// Signed duration.
    Duration,
    /// Binary data.
    Binary,
}

impl PrimitiveKind {
    /// All primitive kinds, in declaration order.
    pub const ALL: [PrimitiveKind; 16] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::SByte,
        PrimitiveKind::Int16,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::Single,
        PrimitiveKind::Double,
        PrimitiveKind::Decimal,
        PrimitiveKind::String,
        PrimitiveKind::Guid,
        PrimitiveKind::Date,
        PrimitiveKind::DateTimeOffset,
        PrimitiveKind::TimeOfDay,
        PrimitiveKind::Duration,
        PrimitiveKind::Binary,
    ];

    /// Returns the qualified type name, e.g. `Edm.Int32`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Edm.Boolean",
            PrimitiveKind::Byte => "Edm.Byte",
            PrimitiveKind::SByte => "Edm.SByte",
            PrimitiveKind::Int16 => "Edm.Int16",
            PrimitiveKind::Int32 => "Edm.Int32",
            PrimitiveKind::Int64 => "Edm.Int64",
            PrimitiveKind::Single => "Edm.Single",
            PrimitiveKind::Double => "Edm.Double",
            PrimitiveKind::Decimal => "Edm.Decimal",
            PrimitiveKind::String => "Edm.String",
            PrimitiveKind::Guid => "Edm.Guid",
            PrimitiveKind::Date => "Edm.Date",
            PrimitiveKind::DateTimeOffset => "Edm.DateTimeOffset",
            PrimitiveKind::TimeOfDay => "Edm.TimeOfDay",
            PrimitiveKind::Duration => "Edm.Duration",
            PrimitiveKind::Binary => "Edm.Binary",
        }
    }

    /// Looks up a primitive kind by its qualified name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Looks up a primitive kind by name, ignoring ASCII case.
    #[must_use]
    pub fn from_name_ignore_case(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Returns whether this type is numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.is_integral()
            || matches!(
                self,
                PrimitiveKind::Single | PrimitiveKind::Double | PrimitiveKind::Decimal
            )
    }

    /// Returns whether this type is an integer type.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::SByte
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
        )
    }

    /// Returns whether values of this type have a total order usable in `$orderby`.
    #[must_use]
    pub fn is_orderable(&self) -> bool {
        !matches!(self, PrimitiveKind::Binary)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An enumeration member value, kept symbolic until execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// Qualified enum type name.
    pub type_name: String,
    /// Member name(s); flags values are comma separated.
    pub value: String,
}

/// Literal value carried by constant nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Unsigned byte value.
    Byte(u8),
    /// Signed byte value.
    SByte(i8),
    /// 16-bit integer value.
    Int16(i16),
    /// 32-bit integer value.
    Int32(i32),
    /// 64-bit integer value.
    Int64(i64),
    /// 32-bit floating point value.
    Single(f32),
    /// 64-bit floating point value.
    Double(f64),
    /// Decimal value.
    Decimal(Decimal),
    /// String value.
    String(String),
    /// GUID value.
    Guid(Uuid),
    /// Date value.
    Date(NaiveDate),
    /// Timestamp with offset.
    DateTimeOffset(DateTime<FixedOffset>),
    /// Time of day.
    TimeOfDay(NaiveTime),
    /// Duration.
    Duration(chrono::Duration),
    /// Enumeration member.
    Enum(EnumValue),
    /// Collection of values.
    Collection(Vec<Value>),
    /// Untyped structured value (JSON object literal).
    Resource(IndexMap<String, Value>),
}

impl Value {
    /// Returns true if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Attempts to extract a bool value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to widen an integral value to i64.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::SByte(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the primitive kind of this value, or None for null, enum and
    /// structured values.
    #[must_use]
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Value::Boolean(_) => Some(PrimitiveKind::Boolean),
            Value::Byte(_) => Some(PrimitiveKind::Byte),
            Value::SByte(_) => Some(PrimitiveKind::SByte),
            Value::Int16(_) => Some(PrimitiveKind::Int16),
            Value::Int32(_) => Some(PrimitiveKind::Int32),
            Value::Int64(_) => Some(PrimitiveKind::Int64),
            Value::Single(_) => Some(PrimitiveKind::Single),
            Value::Double(_) => Some(PrimitiveKind::Double),
            Value::Decimal(_) => Some(PrimitiveKind::Decimal),
            Value::String(_) => Some(PrimitiveKind::String),
            Value::Guid(_) => Some(PrimitiveKind::Guid),
            Value::Date(_) => Some(PrimitiveKind::Date),
            Value::DateTimeOffset(_) => Some(PrimitiveKind::DateTimeOffset),
            Value::TimeOfDay(_) => Some(PrimitiveKind::TimeOfDay),
            Value::Duration(_) => Some(PrimitiveKind::Duration),
            Value::Null | Value::Enum(_) | Value::Collection(_) | Value::Resource(_) => None,
        }
    }

    /// Converts this value to the given primitive kind when the conversion
    /// loses no information.
    ///
    /// Returns None if the conversion is not supported or would overflow.
    #[must_use]
    pub fn convert_to(&self, target: PrimitiveKind) -> Option<Value> {
        if self.primitive_kind() == Some(target) {
            return Some(self.clone());
        }
        if let Some(i) = self.as_i64() {
            return match target {
                PrimitiveKind::Byte => u8::try_from(i).ok().map(Value::Byte),
                PrimitiveKind::SByte => i8::try_from(i).ok().map(Value::SByte),
                PrimitiveKind::Int16 => i16::try_from(i).ok().map(Value::Int16),
                PrimitiveKind::Int32 => i32::try_from(i).ok().map(Value::Int32),
                PrimitiveKind::Int64 => Some(Value::Int64(i)),
                PrimitiveKind::Single => {
                    let f = i as f32;
                    (f as i64 == i).then_some(Value::Single(f))
                }
                PrimitiveKind::Double => {
                    let f = i as f64;
                    (f as i64 == i).then_some(Value::Double(f))
                }
                PrimitiveKind::Decimal => Some(Value::Decimal(Decimal::from(i))),
                _ => None,
            };
        }
        match (self, target) {
            (Value::Single(f), PrimitiveKind::Double) => Some(Value::Double(f64::from(*f))),
            (Value::Decimal(d), PrimitiveKind::Double) => d.to_f64().map(Value::Double),
            (Value::Decimal(d), PrimitiveKind::Single) => d.to_f32().map(Value::Single),
            (Value::Double(f), PrimitiveKind::Decimal) => {
                Decimal::from_f64(*f).map(Value::Decimal)
            }
            (Value::Single(f), PrimitiveKind::Decimal) => {
                Decimal::from_f32(*f).map(Value::Decimal)
            }
            (Value::Date(d), PrimitiveKind::DateTimeOffset) => {
                let utc = FixedOffset::east_opt(0)?;
                d.and_hms_opt(0, 0, 0)
                    .and_then(|naive| naive.and_local_timezone(utc).single())
                    .map(Value::DateTimeOffset)
            }
            _ => None,
        }
    }

    /// Compares two values of the same kind.
    ///
    /// Returns None if either value is null or the kinds don't match.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Single(a), Value::Single(b)) => a.partial_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Guid(a), Value::Guid(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => Some(a.cmp(b)),
            (Value::TimeOfDay(a), Value::TimeOfDay(b)) => Some(a.cmp(b)),
            (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::SByte(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}L"),
            Value::Single(v) => write!(f, "{v}f"),
            Value::Double(v) => write!(f, "{v}d"),
            Value::Decimal(v) => write!(f, "{v}m"),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Guid(g) => write!(f, "{g}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTimeOffset(d) => write!(f, "{}", d.to_rfc3339()),
            Value::TimeOfDay(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::Duration(d) => write!(f, "duration'{d}'"),
            Value::Enum(e) => write!(f, "{}'{}'", e.type_name, e.value),
            Value::Collection(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Resource(props) => {
                f.write_str("{")?;
                for (i, (name, value)) in props.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "\"{name}\":{value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_names_round_trip() {
        for kind in PrimitiveKind::ALL {
            assert_eq!(PrimitiveKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(
            PrimitiveKind::from_name_ignore_case("edm.string"),
            Some(PrimitiveKind::String)
        );
        assert_eq!(PrimitiveKind::from_name("Int32"), None);
    }

    #[test]
    fn test_lossless_integer_conversion() {
        assert_eq!(
            Value::Int32(2).convert_to(PrimitiveKind::Decimal),
            Some(Value::Decimal(Decimal::from(2)))
        );
        assert_eq!(
            Value::Int32(7).convert_to(PrimitiveKind::Int64),
            Some(Value::Int64(7))
        );
        assert_eq!(Value::Int32(300).convert_to(PrimitiveKind::Byte), None);
        assert_eq!(Value::String("x".into()).convert_to(PrimitiveKind::Int32), None);
    }

    #[test]
    fn test_compare_mixed_integers() {
        assert_eq!(
            Value::Int32(1).compare(&Value::Int64(2)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Null.compare(&Value::Int32(1)), None);
    }

    #[test]
    fn test_display_escapes_quotes() {
        assert_eq!(Value::String("O'Neil".into()).to_string(), "'O''Neil'");
    }
}
