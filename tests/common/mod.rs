//! Shared schema and binder setup for the integration tests.

#![allow(dead_code)]

use odata_bind::binder::FilterClause;
use odata_bind::model::{AlternateKey, EntitySet, EnumType, Operation, StructuredType};
use odata_bind::{
    BinderContext, BinderSettings, DefaultUriResolver, FunctionRegistry, Model, PrimitiveKind,
    QueryBinder, Result, TypeRef,
};

/// A small shop schema: customers with orders, an address complex type, a
/// status enum, a derived VIP customer and an open event type.
pub fn shop_model() -> Model {
    Model::builder()
        .enum_type(
            EnumType::new("Shop.Status")
                .member("Open", 0)
                .member("Shipped", 1)
                .member("Cancelled", 2),
        )
        .structured_type(
            StructuredType::complex("Shop.Address")
                .property("Street", TypeRef::string())
                .property("City", TypeRef::string()),
        )
        .structured_type(
            StructuredType::entity("Shop.Customer")
                .key(["Id"])
                .property("Id", TypeRef::int32(false))
                .property("Name", TypeRef::string())
                .property("Age", TypeRef::int32(true))
                .property("Tags", TypeRef::collection(TypeRef::string()))
                .property("Address", TypeRef::complex("Shop.Address", true))
                .navigation("Orders", "Shop.Order", true)
                .navigation("BestFriend", "Shop.Customer", false),
        )
        .structured_type(
            StructuredType::entity("Shop.VipCustomer")
                .with_base("Shop.Customer")
                .property("Level", TypeRef::int32(false)),
        )
        .structured_type(
            StructuredType::entity("Shop.Order")
                .key(["Id"])
                .alternate_key(AlternateKey::of(["Code"]))
                .property("Id", TypeRef::int32(false))
                .property("Code", TypeRef::string())
                .property("Price", TypeRef::decimal(true))
                .property("Quantity", TypeRef::int32(false))
                .property("Total", TypeRef::int64(false))
                .property("Status", TypeRef::enumeration("Shop.Status", false))
                .property(
                    "Placed",
                    TypeRef::primitive(PrimitiveKind::DateTimeOffset, false),
                )
                .property("Delivered", TypeRef::primitive(PrimitiveKind::Date, true))
                .property("Priority", TypeRef::primitive(PrimitiveKind::Byte, false))
                .navigation("Customer", "Shop.Customer", false),
        )
        .structured_type(
            StructuredType::entity("Shop.Event")
                .key(["Id"])
                .open()
                .property("Id", TypeRef::int32(false))
                .navigation("Attendees", "Shop.Customer", true),
        )
        .operation(
            Operation::function("Shop.IsVip")
                .bound_to("customer", TypeRef::entity("Shop.Customer", false))
                .returns(TypeRef::boolean(false)),
        )
        .operation(
            Operation::function("Shop.OrdersAbove")
                .bound_to("customer", TypeRef::entity("Shop.Customer", false))
                .parameter("threshold", TypeRef::decimal(false))
                .returns(TypeRef::collection(TypeRef::entity("Shop.Order", false))),
        )
        .entity_set(
            EntitySet::new("Customers", "Shop.Customer")
                .binding("Orders", "Orders")
                .binding("BestFriend", "Customers"),
        )
        .entity_set(EntitySet::new("Orders", "Shop.Order").binding("Customer", "Customers"))
        .operation(
            Operation::function("Distance")
                .bound_to("event", TypeRef::entity("Shop.Event", false))
                .parameter("from", TypeRef::string())
                .returns(TypeRef::primitive(PrimitiveKind::Double, false)),
        )
        .entity_set(
            EntitySet::new("Events", "Shop.Event").binding("Attendees/BestFriend", "Customers"),
        )
        .build()
        .expect("shop model is valid")
}

/// Owns everything a [`BinderContext`] borrows.
pub struct Fixture {
    pub model: Model,
    pub resolver: DefaultUriResolver,
    pub settings: BinderSettings,
    pub functions: FunctionRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(BinderSettings::default())
    }

    pub fn with_settings(settings: BinderSettings) -> Self {
        Fixture {
            model: shop_model(),
            resolver: DefaultUriResolver::from_settings(&settings),
            settings,
            functions: FunctionRegistry::new(),
        }
    }

    pub fn context(&self) -> BinderContext<'_> {
        BinderContext::new(&self.model, &self.resolver, &self.settings, &self.functions)
    }

    pub fn binder(&self, entity_set: &str, options: &[(&str, &str)]) -> QueryBinder<'_> {
        QueryBinder::new(self.context(), entity_set, options.iter().copied())
            .expect("entity set exists")
    }

    /// Binds `$filter=text` over `entity_set`.
    pub fn filter(&self, entity_set: &str, text: &str) -> Result<FilterClause> {
        self.binder(entity_set, &[("$filter", text)])
            .parse_filter()
            .map(|clause| clause.expect("$filter is present"))
    }
}
