//! Built-in and custom URI function signatures.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{BindError, Result};
use crate::types::{PrimitiveKind, TypeRef};

/// Positional signature of a URI function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    /// Parameter types in call order.
    pub parameters: Vec<TypeRef>,
    /// Result type.
    pub return_type: TypeRef,
}

impl FunctionSignature {
    /// Creates a signature.
    #[must_use]
    pub fn new(parameters: Vec<TypeRef>, return_type: TypeRef) -> Self {
        FunctionSignature {
            parameters,
            return_type,
        }
    }

    /// Returns true if both signatures take the same parameter types,
    /// ignoring nullability.
    #[must_use]
    pub fn same_parameters(&self, other: &FunctionSignature) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.same_type(b))
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

fn p(kind: PrimitiveKind) -> TypeRef {
    TypeRef::primitive(kind, true)
}

fn sig(params: &[PrimitiveKind], ret: PrimitiveKind) -> FunctionSignature {
    FunctionSignature::new(params.iter().map(|k| p(*k)).collect(), p(ret))
}

fn build_built_ins() -> IndexMap<&'static str, Vec<FunctionSignature>> {
    use PrimitiveKind::{
        Boolean, Date, DateTimeOffset, Decimal, Double, Duration, Int32, String, TimeOfDay,
    };

    let mut table: IndexMap<&'static str, Vec<FunctionSignature>> = IndexMap::new();

    // String functions
    for name in ["contains", "endswith", "startswith"] {
        table.insert(name, vec![sig(&[String, String], Boolean)]);
    }
    table.insert("length", vec![sig(&[String], Int32)]);
    table.insert("indexof", vec![sig(&[String, String], Int32)]);
    table.insert(
        "substring",
        vec![sig(&[String, Int32], String), sig(&[String, Int32, Int32], String)],
    );
    for name in ["tolower", "toupper", "trim"] {
        table.insert(name, vec![sig(&[String], String)]);
    }
    table.insert("concat", vec![sig(&[String, String], String)]);
    table.insert("matchesPattern", vec![sig(&[String, String], Boolean)]);

    // Date and time functions
    for name in ["year", "month", "day"] {
        table.insert(
            name,
            vec![sig(&[DateTimeOffset], Int32), sig(&[Date], Int32)],
        );
    }
    for name in ["hour", "minute", "second"] {
        table.insert(
            name,
            vec![sig(&[DateTimeOffset], Int32), sig(&[TimeOfDay], Int32)],
        );
    }
    table.insert(
        "fractionalseconds",
        vec![sig(&[DateTimeOffset], Decimal), sig(&[TimeOfDay], Decimal)],
    );
    table.insert("date", vec![sig(&[DateTimeOffset], Date)]);
    table.insert("time", vec![sig(&[DateTimeOffset], TimeOfDay)]);
    table.insert("totaloffsetminutes", vec![sig(&[DateTimeOffset], Int32)]);
    table.insert("totalseconds", vec![sig(&[Duration], Decimal)]);
    for name in ["now", "maxdatetime", "mindatetime"] {
        table.insert(
            name,
            vec![FunctionSignature::new(
                Vec::new(),
                TypeRef::primitive(DateTimeOffset, false),
            )],
        );
    }

    // Math functions
    for name in ["round", "floor", "ceiling"] {
        table.insert(
            name,
            vec![sig(&[Double], Double), sig(&[Decimal], Decimal)],
        );
    }

    table
}

static BUILT_IN_FUNCTIONS: Lazy<IndexMap<&'static str, Vec<FunctionSignature>>> =
    Lazy::new(build_built_ins);

/// Returns true if `name` is a built-in URI function (exact match).
#[must_use]
pub fn is_built_in(name: &str) -> bool {
    BUILT_IN_FUNCTIONS.contains_key(name)
}

/// Returns the built-in signatures for `name`.
#[must_use]
pub fn built_in_signatures(name: &str) -> Option<&'static [FunctionSignature]> {
    BUILT_IN_FUNCTIONS.get(name).map(Vec::as_slice)
}

/// Registry of user supplied URI functions, searched together with the
/// built-in table.
///
/// Registration goes through an interior lock so a registry can be shared by
/// many concurrent binders.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    custom: RwLock<HashMap<String, Vec<FunctionSignature>>>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom function signature.
    ///
    /// # Errors
    ///
    /// Returns `FunctionSignatureExists` if a built-in or custom function with
    /// the same name already has a signature with the same parameter types.
    pub fn add(&self, name: impl Into<String>, signature: FunctionSignature) -> Result<()> {
        let name = name.into();
        if built_in_signatures(&name)
            .is_some_and(|sigs| sigs.iter().any(|s| s.same_parameters(&signature)))
        {
            return Err(BindError::FunctionSignatureExists { name });
        }
        let mut custom = self.custom.write();
        let entry = custom.entry(name.clone()).or_default();
        if entry.iter().any(|s| s.same_parameters(&signature)) {
            return Err(BindError::FunctionSignatureExists { name });
        }
        debug!(function = %name, signature = %signature, "registered custom uri function");
        entry.push(signature);
        Ok(())
    }

    /// Removes a custom function, or one of its signatures.
    ///
    /// Returns true if anything was removed.
    pub fn remove(&self, name: &str, signature: Option<&FunctionSignature>) -> bool {
        let mut custom = self.custom.write();
        match signature {
            None => custom.remove(name).is_some(),
            Some(target) => {
                let Some(entry) = custom.get_mut(name) else {
                    return false;
                };
                let before = entry.len();
                entry.retain(|s| !s.same_parameters(target));
                let removed = entry.len() != before;
                if entry.is_empty() {
                    custom.remove(name);
                }
                removed
            }
        }
    }

    /// Returns every signature for `name`, built-ins first.
    ///
    /// With `ignore_case` the lookup collects signatures from every function
    /// whose name matches case-insensitively.
    #[must_use]
    pub fn lookup(&self, name: &str, ignore_case: bool) -> Vec<FunctionSignature> {
        let matches = |candidate: &str| {
            if ignore_case {
                candidate.eq_ignore_ascii_case(name)
            } else {
                candidate == name
            }
        };

        let mut result: Vec<FunctionSignature> = BUILT_IN_FUNCTIONS
            .iter()
            .filter(|(n, _)| matches(n))
            .flat_map(|(_, sigs)| sigs.iter().cloned())
            .collect();
        let custom = self.custom.read();
        result.extend(
            custom
                .iter()
                .filter(|(n, _)| matches(n))
                .flat_map(|(_, sigs)| sigs.iter().cloned()),
        );
        result
    }

    /// Returns true if `name` names a built-in or custom function.
    #[must_use]
    pub fn contains(&self, name: &str, ignore_case: bool) -> bool {
        !self.lookup(name, ignore_case).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_table() {
        assert!(is_built_in("contains"));
        assert!(!is_built_in("Contains"));
        assert_eq!(built_in_signatures("substring").map(<[_]>::len), Some(2));
        let now = &built_in_signatures("now").unwrap()[0];
        assert!(now.parameters.is_empty());
        assert!(!now.return_type.nullable);
    }

    #[test]
    fn test_add_custom_function() {
        let registry = FunctionRegistry::new();
        registry
            .add("shop.tax", sig(&[PrimitiveKind::Decimal], PrimitiveKind::Decimal))
            .unwrap();
        assert_eq!(registry.lookup("shop.tax", false).len(), 1);
        assert!(registry.contains("SHOP.TAX", true));
        assert!(!registry.contains("SHOP.TAX", false));
    }

    #[test]
    fn test_duplicate_signature_rejected() {
        let registry = FunctionRegistry::new();
        let err = registry
            .add("length", sig(&[PrimitiveKind::String], PrimitiveKind::Int64))
            .unwrap_err();
        assert!(matches!(err, BindError::FunctionSignatureExists { .. }));

        registry
            .add("length", sig(&[PrimitiveKind::Int32], PrimitiveKind::Int32))
            .unwrap();
        assert!(registry
            .add("length", sig(&[PrimitiveKind::Int32], PrimitiveKind::Int64))
            .is_err());
        assert_eq!(registry.lookup("length", false).len(), 2);
    }

    #[test]
    fn test_remove_custom_function() {
        let registry = FunctionRegistry::new();
        let signature = sig(&[PrimitiveKind::String], PrimitiveKind::Boolean);
        registry.add("shop.isvip", signature.clone()).unwrap();
        assert!(registry.remove("shop.isvip", Some(&signature)));
        assert!(!registry.remove("shop.isvip", None));
        assert!(registry.lookup("shop.isvip", false).is_empty());
    }
}
