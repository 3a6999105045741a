//! Schema model consumed by the binder.

mod functions;
mod schema;

pub use functions::{built_in_signatures, is_built_in, FunctionRegistry, FunctionSignature};
pub use schema::{
    namespace_of, AlternateKey, AlternateKeyPart, EntitySet, EnumMember, EnumType, Model,
    ModelBuilder, NavigationBinding, NavigationProperty, Operation, OperationKind,
    OperationParameter, Property, StructuredKind, StructuredType, TypeDefinition,
};
