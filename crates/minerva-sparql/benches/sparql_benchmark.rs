use criterion::{black_box, criterion_group, criterion_main, Criterion};
use minerva_core::{Iri, Literal, Term, Triple};
use minerva_sparql::QueryEngine;
use minerva_store::TripleStore;

const PREFIXES: &str = r#"
    PREFIX ems: <https://example.org/ems#>
    PREFIX exo: <https://example.org/exo#>
"#;

fn build_store(tasks: usize) -> TripleStore {
    let mut store = TripleStore::new();
    let rdf_type = Iri::new("http://www.w3.org/1999/02/22-rdf-syntax-ns#type");
    let task_class = Term::iri("https://example.org/ems#Task");
    let label = Iri::new("https://example.org/exo#label");
    let status = Iri::new("https://example.org/ems#status");
    let statuses = ["todo", "doing", "done"];

    for index in 0..tasks {
        let subject = Term::iri(format!("https://example.org/task{}", index));
        store.add(Triple::new(
            subject.clone(),
            rdf_type.clone(),
            task_class.clone(),
        ));
        store.add(Triple::new(
            subject.clone(),
            label.clone(),
            Term::Literal(Literal::simple(format!("Task number {}", index))),
        ));
        store.add(Triple::new(
            subject,
            status.clone(),
            Term::literal(statuses[index % statuses.len()]),
        ));
    }
    store
}

fn bench_filtered_select(c: &mut Criterion) {
    let engine = QueryEngine::new(build_store(1000));
    let query = format!(
        r#"{}SELECT ?l WHERE {{ ?t a ems:Task ; exo:label ?l ; ems:status ?s . FILTER(?s = "doing") }}"#,
        PREFIXES
    );
    c.bench_function("filtered_select_1k_tasks", |b| {
        b.iter(|| engine.query(black_box(&query)).unwrap())
    });
}

fn bench_group_by_count(c: &mut Criterion) {
    let engine = QueryEngine::new(build_store(1000));
    let query = format!(
        "{}SELECT ?s (COUNT(?t) AS ?c) WHERE {{ ?t a ems:Task ; ems:status ?s }} GROUP BY ?s ORDER BY ?s",
        PREFIXES
    );
    c.bench_function("group_by_count_1k_tasks", |b| {
        b.iter(|| engine.query(black_box(&query)).unwrap())
    });
}

fn bench_order_by(c: &mut Criterion) {
    let engine = QueryEngine::new(build_store(1000));
    let query = format!(
        "{}SELECT ?l WHERE {{ ?t exo:label ?l }} ORDER BY ?l LIMIT 10",
        PREFIXES
    );
    c.bench_function("order_by_limit_1k_tasks", |b| {
        b.iter(|| engine.query(black_box(&query)).unwrap())
    });
}

fn bench_property_path(c: &mut Criterion) {
    let mut store = TripleStore::new();
    let knows = Iri::new("https://example.org/exo#knows");
    for index in 0..200 {
        store.add(Triple::new(
            Term::iri(format!("https://example.org/p{}", index)),
            knows.clone(),
            Term::iri(format!("https://example.org/p{}", index + 1)),
        ));
    }
    let engine = QueryEngine::new(store);
    let query = format!(
        "{}SELECT ?y WHERE {{ <https://example.org/p0> exo:knows+ ?y }}",
        PREFIXES
    );
    c.bench_function("path_closure_200_hops", |b| {
        b.iter(|| engine.query(black_box(&query)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_filtered_select,
    bench_group_by_count,
    bench_order_by,
    bench_property_path
);
criterion_main!(benches);
