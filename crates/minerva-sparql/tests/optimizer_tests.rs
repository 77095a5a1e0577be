use minerva_core::{Iri, Literal, Term, Triple, Variable};
use minerva_sparql::algebra::{Algebra, DefaultPlanBuilder, Expr, Expression, PlanBuilder};
use minerva_sparql::optimizer::{estimate_cost, DefaultOptimizer, OptimizationRule, Optimizer};
use minerva_sparql::parser::{PatternPredicate, PatternTerm, SparqlParser, TriplePattern};
use minerva_sparql::{Executor, Solution};
use minerva_store::TripleStore;
use proptest::prelude::*;
use std::collections::HashMap;

fn var(name: &str) -> PatternTerm {
    PatternTerm::Variable(Variable::new(name))
}

fn iri(value: &str) -> PatternTerm {
    PatternTerm::Term(Term::iri(value))
}

fn tp(subject: PatternTerm, predicate: &str, object: PatternTerm) -> TriplePattern {
    TriplePattern {
        subject,
        predicate: PatternPredicate::Iri(Iri::new(predicate)),
        object,
    }
}

fn bgp(triples: Vec<TriplePattern>) -> Algebra {
    Algebra::Bgp(triples)
}

fn var_equals(name: &str, value: &str) -> Expr {
    Expression::Equal(
        Box::new(Expression::Variable(Variable::new(name))),
        Box::new(Expression::Literal(Literal::simple(value))),
    )
}

fn filter_pushdown() -> DefaultOptimizer {
    DefaultOptimizer::new(vec![OptimizationRule::FilterPushDown])
}

fn join_reordering() -> DefaultOptimizer {
    DefaultOptimizer::new(vec![OptimizationRule::JoinReordering])
}

// ---- cost model ----

#[test]
fn test_bgp_cost_penalizes_variables() {
    assert_eq!(estimate_cost(&bgp(vec![tp(iri("s"), "p", iri("o"))])), 100.0);
    assert_eq!(estimate_cost(&bgp(vec![tp(var("s"), "p", iri("o"))])), 110.0);
    assert_eq!(estimate_cost(&bgp(vec![tp(var("s"), "p", var("o"))])), 120.0);

    // A predicate variable is the worst case for an SPO-indexed store.
    let pred_var = Algebra::Bgp(vec![TriplePattern {
        subject: var("s"),
        predicate: PatternPredicate::Variable(Variable::new("p")),
        object: var("o"),
    }]);
    assert_eq!(estimate_cost(&pred_var), 140.0);
}

#[test]
fn test_operator_costs() {
    let cheap = bgp(vec![tp(iri("s"), "p", var("o"))]); // 110
    let costly = bgp(vec![tp(var("a"), "p", var("b")), tp(var("b"), "q", var("c"))]); // 240

    assert_eq!(
        estimate_cost(&Algebra::Filter(
            var_equals("o", "x"),
            Box::new(cheap.clone())
        )),
        0.3 * 110.0
    );
    assert_eq!(
        estimate_cost(&Algebra::Join(
            Box::new(cheap.clone()),
            Box::new(costly.clone())
        )),
        110.0 * 240.0
    );
    assert_eq!(
        estimate_cost(&Algebra::LeftJoin {
            left: Box::new(cheap.clone()),
            right: Box::new(costly.clone()),
            expr: None,
        }),
        110.0 + 0.5 * 240.0
    );
    assert_eq!(
        estimate_cost(&Algebra::Union(Box::new(cheap), Box::new(costly))),
        110.0 + 240.0
    );
}

// ---- filter push-down ----

#[test]
fn test_filter_pushes_into_left_side() {
    let left = bgp(vec![tp(var("x"), "p", iri("o"))]);
    let right = bgp(vec![tp(var("y"), "q", iri("o"))]);
    let algebra = Algebra::Filter(
        var_equals("x", "v"),
        Box::new(Algebra::Join(Box::new(left.clone()), Box::new(right.clone()))),
    );

    match filter_pushdown().optimize(algebra) {
        Algebra::Join(optimized_left, optimized_right) => {
            assert!(matches!(*optimized_left, Algebra::Filter(_, _)));
            assert_eq!(*optimized_right, right);
        }
        other => panic!("expected join, got {:?}", other),
    }
}

#[test]
fn test_filter_pushes_into_right_side() {
    let left = bgp(vec![tp(var("x"), "p", iri("o"))]);
    let right = bgp(vec![tp(var("y"), "q", iri("o"))]);
    let algebra = Algebra::Filter(
        var_equals("y", "v"),
        Box::new(Algebra::Join(Box::new(left.clone()), Box::new(right))),
    );

    match filter_pushdown().optimize(algebra) {
        Algebra::Join(optimized_left, optimized_right) => {
            assert_eq!(*optimized_left, left);
            assert!(matches!(*optimized_right, Algebra::Filter(_, _)));
        }
        other => panic!("expected join, got {:?}", other),
    }
}

#[test]
fn test_filter_spanning_both_sides_stays() {
    let left = bgp(vec![tp(var("x"), "p", iri("o"))]);
    let right = bgp(vec![tp(var("y"), "q", iri("o"))]);
    let condition = Expression::Equal(
        Box::new(Expression::Variable(Variable::new("x"))),
        Box::new(Expression::Variable(Variable::new("y"))),
    );
    let algebra = Algebra::Filter(
        condition,
        Box::new(Algebra::Join(Box::new(left), Box::new(right))),
    );

    assert!(matches!(
        filter_pushdown().optimize(algebra),
        Algebra::Filter(_, _)
    ));
}

#[test]
fn test_filter_duplicates_into_union_branches() {
    let left = bgp(vec![tp(var("x"), "p", iri("o"))]);
    let right = bgp(vec![tp(var("x"), "q", iri("o"))]);
    let algebra = Algebra::Filter(
        var_equals("x", "v"),
        Box::new(Algebra::Union(Box::new(left), Box::new(right))),
    );

    match filter_pushdown().optimize(algebra) {
        Algebra::Union(optimized_left, optimized_right) => {
            assert!(matches!(*optimized_left, Algebra::Filter(_, _)));
            assert!(matches!(*optimized_right, Algebra::Filter(_, _)));
        }
        other => panic!("expected union, got {:?}", other),
    }
}

#[test]
fn test_filter_not_pushed_into_left_join_right_side() {
    let left = bgp(vec![tp(var("x"), "p", iri("o"))]);
    let right = bgp(vec![tp(var("x"), "q", var("z"))]);
    // ?z is supplied by the optional side: pushing would change semantics.
    let algebra = Algebra::Filter(
        var_equals("z", "v"),
        Box::new(Algebra::LeftJoin {
            left: Box::new(left),
            right: Box::new(right),
            expr: None,
        }),
    );

    assert!(matches!(
        filter_pushdown().optimize(algebra),
        Algebra::Filter(_, _)
    ));
}

#[test]
fn test_filter_disjoint_from_right_pushes_into_left() {
    let left = bgp(vec![tp(var("x"), "p", iri("o"))]);
    let right = bgp(vec![tp(var("y"), "q", var("z"))]);
    let algebra = Algebra::Filter(
        var_equals("x", "v"),
        Box::new(Algebra::LeftJoin {
            left: Box::new(left),
            right: Box::new(right),
            expr: None,
        }),
    );

    match filter_pushdown().optimize(algebra) {
        Algebra::LeftJoin { left, .. } => {
            assert!(matches!(*left, Algebra::Filter(_, _)));
        }
        other => panic!("expected left join, got {:?}", other),
    }
}

// ---- join reordering ----

#[test]
fn test_join_swaps_when_right_is_cheaper() {
    let costly = bgp(vec![
        tp(var("a"), "p", var("b")),
        tp(var("b"), "q", var("c")),
    ]);
    let cheap = bgp(vec![tp(iri("s"), "p", var("o"))]);
    let algebra = Algebra::Join(Box::new(costly.clone()), Box::new(cheap.clone()));

    match join_reordering().optimize(algebra) {
        Algebra::Join(left, right) => {
            assert_eq!(*left, cheap);
            assert_eq!(*right, costly);
        }
        other => panic!("expected join, got {:?}", other),
    }
}

#[test]
fn test_join_keeps_order_when_left_is_cheaper() {
    let cheap = bgp(vec![tp(iri("s"), "p", var("o"))]);
    let costly = bgp(vec![tp(var("a"), "p", var("b"))]);
    let algebra = Algebra::Join(Box::new(cheap.clone()), Box::new(costly.clone()));

    match join_reordering().optimize(algebra) {
        Algebra::Join(left, right) => {
            assert_eq!(*left, cheap);
            assert_eq!(*right, costly);
        }
        other => panic!("expected join, got {:?}", other),
    }
}

#[test]
fn test_no_reordering_under_left_join() {
    let costly = bgp(vec![
        tp(var("a"), "p", var("b")),
        tp(var("b"), "q", var("c")),
    ]);
    let cheap = bgp(vec![tp(iri("s"), "p", var("o"))]);
    let inner_join = Algebra::Join(Box::new(costly), Box::new(cheap));
    let algebra = Algebra::LeftJoin {
        left: Box::new(inner_join.clone()),
        right: Box::new(bgp(vec![tp(var("a"), "r", var("d"))])),
        expr: None,
    };

    match join_reordering().optimize(algebra) {
        Algebra::LeftJoin { left, .. } => assert_eq!(*left, inner_join),
        other => panic!("expected left join, got {:?}", other),
    }
}

// ---- semantic identity ----

fn sample_store() -> TripleStore {
    let mut store = TripleStore::new();
    let p1 = Iri::new("http://example.org/p1");
    let p2 = Iri::new("http://example.org/p2");
    let s1 = Term::iri("http://example.org/s1");
    let s2 = Term::iri("http://example.org/s2");
    store.add(Triple::new(s1.clone(), p1.clone(), s2.clone()));
    store.add(Triple::new(s2.clone(), p1.clone(), s1.clone()));
    store.add(Triple::new(s1.clone(), p2.clone(), Term::literal("v")));
    store.add(Triple::new(s2.clone(), p2.clone(), Term::literal("w")));
    store.add(Triple::new(s1, p1, Term::literal("v")));
    store
}

fn multiset(solutions: Vec<Solution>) -> HashMap<Solution, usize> {
    let mut counts = HashMap::new();
    for solution in solutions {
        *counts.entry(solution).or_insert(0) += 1;
    }
    counts
}

#[test]
fn test_optimizer_is_identity_on_query_semantics() {
    let store = sample_store();
    let executor = Executor::new(&store);
    let queries = [
        "PREFIX ex: <http://example.org/> SELECT ?s ?o WHERE { ?s ex:p1 ?o . ?s ex:p2 ?v . FILTER(?v = \"v\") }",
        "PREFIX ex: <http://example.org/> SELECT ?s WHERE { { ?s ex:p1 ?o } UNION { ?s ex:p2 ?o } FILTER(?o = \"v\") }",
        "PREFIX ex: <http://example.org/> SELECT ?s ?v WHERE { ?s ex:p1 ?o OPTIONAL { ?s ex:p2 ?v } }",
        "PREFIX ex: <http://example.org/> SELECT ?s WHERE { ?s ex:p1 ?o MINUS { ?s ex:p2 \"v\" } }",
        "PREFIX ex: <http://example.org/> SELECT ?s ?o WHERE { ?s ex:p1+ ?o }",
    ];

    for query in queries {
        let parsed = SparqlParser::parse(query).unwrap();
        let algebra = DefaultPlanBuilder.to_algebra(&parsed).unwrap();
        let optimized = DefaultOptimizer::default().optimize(algebra.clone());
        let plain = executor.execute_all(&algebra).unwrap();
        let rewritten = executor.execute_all(&optimized).unwrap();
        assert_eq!(multiset(plain), multiset(rewritten), "query: {}", query);
    }
}

fn pattern_term_strategy() -> impl Strategy<Value = PatternTerm> {
    prop_oneof![
        Just(iri("http://example.org/s1")),
        Just(iri("http://example.org/s2")),
        Just(PatternTerm::Term(Term::literal("v"))),
        Just(var("x")),
        Just(var("y")),
        Just(var("z")),
    ]
}

fn triple_pattern_strategy() -> impl Strategy<Value = TriplePattern> {
    (
        pattern_term_strategy(),
        prop_oneof![
            Just("http://example.org/p1"),
            Just("http://example.org/p2")
        ],
        pattern_term_strategy(),
    )
        .prop_map(|(subject, predicate, object)| tp(subject, predicate, object))
}

fn filter_expr_strategy() -> impl Strategy<Value = Expr> {
    (
        prop_oneof![Just("x"), Just("y"), Just("z")],
        prop_oneof![Just("v"), Just("w")],
    )
        .prop_map(|(variable, value)| var_equals(variable, value))
}

fn algebra_strategy() -> impl Strategy<Value = Algebra> {
    let leaf = proptest::collection::vec(triple_pattern_strategy(), 1..3).prop_map(Algebra::Bgp);
    leaf.prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Algebra::Join(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Algebra::Union(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Algebra::LeftJoin {
                left: Box::new(a),
                right: Box::new(b),
                expr: None,
            }),
            (filter_expr_strategy(), inner.clone())
                .prop_map(|(condition, input)| Algebra::Filter(condition, Box::new(input))),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For any algebra tree, the optimized plan produces the same multiset
    /// of solutions as the original.
    #[test]
    fn prop_optimizer_preserves_semantics(algebra in algebra_strategy()) {
        let store = sample_store();
        let executor = Executor::new(&store);
        let optimized = DefaultOptimizer::default().optimize(algebra.clone());
        let plain = executor.execute_all(&algebra).unwrap();
        let rewritten = executor.execute_all(&optimized).unwrap();
        prop_assert_eq!(multiset(plain), multiset(rewritten));
    }
}
