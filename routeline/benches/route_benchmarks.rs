use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use routeline::handler::action::Action;
use routeline::message::Method;
use routeline::router::pattern::{Pattern, RequestPath};
use routeline::router::table::RouteTable;

// Lookups against a table shaped like a mid-sized API: mostly placeholder
// routes with a static route registered last.

fn create_populated_route_table(num_routes: usize) -> RouteTable {
    let mut table = RouteTable::new();
    for i in 0..num_routes {
        let method = if i % 4 == 0 { Method::Get } else { Method::Post };
        table
            .register(
                method,
                &format!("/api/resource{}/{{id}}", i),
                Action::classify("ResourceController@show"),
            )
            .unwrap();
    }
    table
        .register(Method::Get, "/api/static", Action::classify("StaticController"))
        .unwrap();
    table
}

fn bench_static_lookup(c: &mut Criterion) {
    let table = create_populated_route_table(1000);

    c.bench_function("route_table_static_lookup", |b| {
        b.iter(|| {
            black_box(table.find("GET", "/api/static"));
        });
    });
}

fn bench_placeholder_lookup(c: &mut Criterion) {
    let table = create_populated_route_table(1000);

    c.bench_function("route_table_placeholder_lookup", |b| {
        b.iter(|| {
            black_box(table.find("GET", "/api/resource500/12345"));
        });
    });
}

fn bench_missing_lookup(c: &mut Criterion) {
    let table = create_populated_route_table(1000);

    c.bench_function("route_table_missing_lookup", |b| {
        b.iter(|| {
            black_box(table.find("DELETE", "/api/resource500/12345"));
        });
    });
}

fn bench_pattern_match(c: &mut Criterion) {
    let pattern = Pattern::parse("/users/{user}/posts/{post}/comments/{comment}").unwrap();
    let path = RequestPath::parse("/users/alice/posts/42/comments/7");

    c.bench_function("pattern_match", |b| {
        b.iter(|| {
            black_box(pattern.matches(&path));
        });
    });
}

criterion_group!(
    benches,
    bench_static_lookup,
    bench_placeholder_lookup,
    bench_missing_lookup,
    bench_pattern_match
);
criterion_main!(benches);
