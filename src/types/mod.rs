//! Type system shared by the model, the parser and the binder.

mod synthetic;
mod type_ref;
mod value;

pub use synthetic::{SyntheticType, SyntheticTypeBuilder};
pub use type_ref::{display_type, TypeKind, TypeRef};
pub use value::{EnumValue, PrimitiveKind, Value};
