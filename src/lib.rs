//! odata-bind - semantic binder for OData URI query options
//!
//! Parses `$filter`, `$orderby`, `$select`, `$expand`, `$apply`, `$compute`
//! and `$search` text into token trees and binds them against a schema into
//! typed node trees.
//!
//! ```ignore
//! use odata_bind::{BinderContext, BinderSettings, DefaultUriResolver, FunctionRegistry, QueryBinder};
//!
//! let settings = BinderSettings::default();
//! let resolver = DefaultUriResolver::from_settings(&settings);
//! let functions = FunctionRegistry::new();
//! let context = BinderContext::new(&model, &resolver, &settings, &functions);
//! let binder = QueryBinder::new(context, "Customers", [("$filter", "Name eq 'Bob'")])?;
//! let filter = binder.parse_filter()?;
//! ```

pub mod binder;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
mod stack;
pub mod types;

pub use binder::{
    BoundQuery, DefaultUriResolver, MetadataBinder, QueryBinder, QueryNode, TokenBinder,
    UriResolver,
};
pub use config::{BinderContext, BinderSettings};
pub use error::{BindError, ErrorCategory, Result};
pub use model::{FunctionRegistry, Model};
pub use types::{PrimitiveKind, TypeRef, Value};
