//! Binder benchmarks for OData query options.
//!
//! Measures parse and bind performance for:
//! - `$filter` predicates of growing size
//! - `$select` with nested `$expand`
//! - `$apply` aggregation pipelines

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use odata_bind::model::{EntitySet, StructuredType};
use odata_bind::{
    parser, BinderContext, BinderSettings, DefaultUriResolver, FunctionRegistry, Model,
    QueryBinder, TypeRef,
};

fn model() -> Model {
    Model::builder()
        .structured_type(
            StructuredType::entity("Bench.Customer")
                .key(["Id"])
                .property("Id", TypeRef::int32(false))
                .property("Name", TypeRef::string())
                .property("Age", TypeRef::int32(true))
                .navigation("Orders", "Bench.Order", true),
        )
        .structured_type(
            StructuredType::entity("Bench.Order")
                .key(["Id"])
                .property("Id", TypeRef::int32(false))
                .property("Price", TypeRef::decimal(true))
                .property("Quantity", TypeRef::int32(false))
                .property("Region", TypeRef::string())
                .navigation("Customer", "Bench.Customer", false),
        )
        .entity_set(EntitySet::new("Customers", "Bench.Customer").binding("Orders", "Orders"))
        .entity_set(EntitySet::new("Orders", "Bench.Order").binding("Customer", "Customers"))
        .build()
        .unwrap()
}

/// Benchmark `$filter` parsing alone
fn bench_parse_filter(c: &mut Criterion) {
    let filter = "Name eq 'Bob' and (Age gt 30 or contains(Name, 'o'))";

    c.bench_function("parse_filter", |b| {
        b.iter(|| parser::parse_filter(black_box(filter)).unwrap());
    });
}

/// Benchmark `$filter` parse and bind
fn bench_bind_filter(c: &mut Criterion) {
    let model = model();
    let resolver = DefaultUriResolver::new();
    let settings = BinderSettings::default();
    let functions = FunctionRegistry::new();
    let context = BinderContext::new(&model, &resolver, &settings, &functions);
    let filter = "Name eq 'Bob' and Orders/any(o: o/Price gt 10.5)";

    c.bench_function("bind_filter", |b| {
        b.iter(|| {
            QueryBinder::new(context, "Customers", [("$filter", black_box(filter))])
                .unwrap()
                .parse_filter()
                .unwrap()
        });
    });
}

/// Benchmark `$select` with nested `$expand`
fn bench_bind_select_expand(c: &mut Criterion) {
    let model = model();
    let resolver = DefaultUriResolver::new();
    let settings = BinderSettings::default();
    let functions = FunctionRegistry::new();
    let context = BinderContext::new(&model, &resolver, &settings, &functions);
    let options = [
        ("$select", "Name,Age"),
        (
            "$expand",
            "Orders($filter=Quantity gt 1;$orderby=Price desc;$top=5;$expand=Customer($select=Name))",
        ),
    ];

    c.bench_function("bind_select_expand", |b| {
        b.iter(|| {
            QueryBinder::new(context, "Customers", black_box(options))
                .unwrap()
                .parse_select_and_expand()
                .unwrap()
        });
    });
}

/// Benchmark an `$apply` pipeline followed by a `$filter` over its result
fn bench_bind_apply(c: &mut Criterion) {
    let model = model();
    let resolver = DefaultUriResolver::new();
    let settings = BinderSettings::default();
    let functions = FunctionRegistry::new();
    let context = BinderContext::new(&model, &resolver, &settings, &functions);
    let options = [
        (
            "$apply",
            "filter(Quantity gt 0)/groupby((Region),aggregate(Price with sum as Revenue,$count as Orders))",
        ),
        ("$filter", "Revenue gt 1000"),
    ];

    c.bench_function("bind_apply", |b| {
        b.iter(|| {
            let binder = QueryBinder::new(context, "Orders", black_box(options)).unwrap();
            binder.parse_filter().unwrap()
        });
    });
}

/// Benchmark binding with varying predicate size
fn bench_bind_varying_complexity(c: &mut Criterion) {
    let model = model();
    let resolver = DefaultUriResolver::new();
    let settings = BinderSettings::default();
    let functions = FunctionRegistry::new();
    let context = BinderContext::new(&model, &resolver, &settings, &functions);
    let mut group = c.benchmark_group("bind_complexity");

    for terms in [1usize, 4, 16, 64] {
        let filter = (0..terms)
            .map(|i| format!("Quantity gt {i}"))
            .collect::<Vec<_>>()
            .join(" and ");
        group.bench_with_input(BenchmarkId::new("and_chain", terms), &filter, |b, f| {
            b.iter(|| {
                QueryBinder::new(context, "Orders", [("$filter", black_box(f.as_str()))])
                    .unwrap()
                    .parse_filter()
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_filter,
    bench_bind_filter,
    bench_bind_select_expand,
    bench_bind_apply,
    bench_bind_varying_complexity,
);
criterion_main!(benches);
