use minerva_core::Variable;
use minerva_sparql::algebra::{
    visible_variables, AggregateFunction, Algebra, DefaultPlanBuilder, PlanBuilder,
};
use minerva_sparql::parser::SparqlParser;
use minerva_sparql::SparqlError;

fn translate(query: &str) -> Algebra {
    let parsed = SparqlParser::parse(query).expect("query should parse");
    DefaultPlanBuilder
        .to_algebra(&parsed)
        .expect("query should translate")
}

fn translate_err(query: &str) -> SparqlError {
    let parsed = SparqlParser::parse(query).expect("query should parse");
    DefaultPlanBuilder
        .to_algebra(&parsed)
        .expect_err("translation should fail")
}

fn unwrap_project(algebra: Algebra) -> (Vec<Variable>, Algebra) {
    match algebra {
        Algebra::Project(vars, inner) => (vars, *inner),
        other => panic!("expected project, got {:?}", other),
    }
}

#[test]
fn test_empty_where_is_empty_bgp() {
    let algebra = translate("SELECT ?s WHERE { }");
    let (_, inner) = unwrap_project(algebra);
    assert_eq!(inner, Algebra::Bgp(vec![]));
}

#[test]
fn test_where_partition_extends_then_filters() {
    // Joins first, then one extend per BIND, then one filter per FILTER.
    let algebra = translate(
        r#"
        PREFIX ex: <http://example.org/>
        SELECT ?s WHERE {
            FILTER(?o = 1)
            ?s ex:p ?o .
            BIND(2 AS ?b)
        }
        "#,
    );
    let (_, inner) = unwrap_project(algebra);
    match inner {
        Algebra::Filter(_, input) => match *input {
            Algebra::Extend { input, .. } => {
                assert!(matches!(*input, Algebra::Bgp(_)));
            }
            other => panic!("expected extend under filter, got {:?}", other),
        },
        other => panic!("expected filter on top, got {:?}", other),
    }
}

#[test]
fn test_optional_folds_into_left_join() {
    let algebra = translate(
        r#"
        PREFIX ex: <http://example.org/>
        SELECT ?s ?z WHERE { ?s ex:p ?o OPTIONAL { ?s ex:q ?z } }
        "#,
    );
    let (_, inner) = unwrap_project(algebra);
    match inner {
        Algebra::LeftJoin { left, right, expr } => {
            assert!(matches!(*left, Algebra::Bgp(ref t) if t.len() == 1));
            assert!(matches!(*right, Algebra::Bgp(ref t) if t.len() == 1));
            assert!(expr.is_none());
        }
        other => panic!("expected left join, got {:?}", other),
    }
}

#[test]
fn test_optional_inner_filter_becomes_join_condition() {
    let algebra = translate(
        r#"
        PREFIX ex: <http://example.org/>
        SELECT ?s WHERE { ?s ex:p ?o OPTIONAL { ?s ex:q ?z FILTER(?z = 1) } }
        "#,
    );
    let (_, inner) = unwrap_project(algebra);
    match inner {
        Algebra::LeftJoin { expr, .. } => assert!(expr.is_some()),
        other => panic!("expected left join, got {:?}", other),
    }
}

#[test]
fn test_leading_optional_keeps_empty_left() {
    let algebra = translate(
        r#"
        PREFIX ex: <http://example.org/>
        SELECT ?z WHERE { OPTIONAL { ?s ex:q ?z } }
        "#,
    );
    let (_, inner) = unwrap_project(algebra);
    match inner {
        Algebra::LeftJoin { left, .. } => assert_eq!(*left, Algebra::Bgp(vec![])),
        other => panic!("expected left join, got {:?}", other),
    }
}

#[test]
fn test_union_folds_left_associative() {
    let algebra = translate(
        r#"
        PREFIX ex: <http://example.org/>
        SELECT ?s WHERE {
            { ?s ex:a ?o } UNION { ?s ex:b ?o } UNION { ?s ex:c ?o }
        }
        "#,
    );
    let (_, inner) = unwrap_project(algebra);
    match inner {
        Algebra::Union(left, _) => assert!(matches!(*left, Algebra::Union(_, _))),
        other => panic!("expected union, got {:?}", other),
    }
}

#[test]
fn test_minus_applies_to_preceding_patterns() {
    let algebra = translate(
        r#"
        PREFIX ex: <http://example.org/>
        SELECT ?s WHERE { ?s ex:p ?o MINUS { ?s ex:q ?o } }
        "#,
    );
    let (_, inner) = unwrap_project(algebra);
    match inner {
        Algebra::Minus(left, right) => {
            assert!(matches!(*left, Algebra::Bgp(_)));
            assert!(matches!(*right, Algebra::Bgp(_)));
        }
        other => panic!("expected minus, got {:?}", other),
    }
}

#[test]
fn test_select_wrapping_order() {
    // Outer to inner: slice -> orderby -> distinct -> project.
    let algebra = translate(
        r#"
        PREFIX ex: <http://example.org/>
        SELECT DISTINCT ?s WHERE { ?s ex:p ?o } ORDER BY ?s LIMIT 2 OFFSET 1
        "#,
    );
    match algebra {
        Algebra::Slice {
            input,
            offset: Some(1),
            limit: Some(2),
        } => match *input {
            Algebra::OrderBy(_, inner) => match *inner {
                Algebra::Distinct(inner) => {
                    assert!(matches!(*inner, Algebra::Project(_, _)))
                }
                other => panic!("expected distinct, got {:?}", other),
            },
            other => panic!("expected orderby, got {:?}", other),
        },
        other => panic!("expected slice on top, got {:?}", other),
    }
}

#[test]
fn test_values_undef_row() {
    let algebra = translate(
        r#"
        SELECT ?x ?y WHERE { VALUES (?x ?y) { ("a" UNDEF) } }
        "#,
    );
    let (_, inner) = unwrap_project(algebra);
    match inner {
        Algebra::Values { variables, rows } => {
            assert_eq!(variables.len(), 2);
            assert!(rows[0][0].is_some());
            assert!(rows[0][1].is_none());
        }
        other => panic!("expected values, got {:?}", other),
    }
}

#[test]
fn test_subquery_joins_with_outer() {
    let algebra = translate(
        r#"
        PREFIX ex: <http://example.org/>
        SELECT ?s WHERE {
            ?s ex:p ?o .
            { SELECT ?s WHERE { ?s ex:q ?v } }
        }
        "#,
    );
    let (_, inner) = unwrap_project(algebra);
    match inner {
        Algebra::Join(left, right) => {
            assert!(matches!(*left, Algebra::Bgp(_)));
            assert!(matches!(*right, Algebra::SubQuery(_)));
        }
        other => panic!("expected join with subquery, got {:?}", other),
    }
}

#[test]
fn test_group_with_aggregate_alias() {
    let algebra = translate(
        r#"
        PREFIX ex: <http://example.org/>
        SELECT ?s (COUNT(?t) AS ?c) WHERE { ?t ex:status ?s } GROUP BY ?s
        "#,
    );
    let (projected, inner) = unwrap_project(algebra);
    assert_eq!(projected, vec![Variable::new("s"), Variable::new("c")]);
    match &inner {
        Algebra::Group {
            keys, aggregates, ..
        } => {
            assert_eq!(keys, &vec![Variable::new("s")]);
            assert_eq!(aggregates.len(), 1);
            assert_eq!(aggregates[0].0, Variable::new("c"));
            assert_eq!(aggregates[0].1.function, AggregateFunction::Count);
        }
        other => panic!("expected group, got {:?}", other),
    }
    // The group node only exposes its keys and aggregate outputs.
    let visible = visible_variables(&inner);
    assert_eq!(
        visible.into_iter().collect::<Vec<_>>(),
        vec![Variable::new("c"), Variable::new("s")]
    );
}

#[test]
fn test_having_becomes_filter_above_group() {
    let algebra = translate(
        r#"
        PREFIX ex: <http://example.org/>
        SELECT ?s (COUNT(?t) AS ?c)
        WHERE { ?t ex:status ?s }
        GROUP BY ?s
        HAVING (COUNT(?t) > 1)
        "#,
    );
    let (_, inner) = unwrap_project(algebra);
    match inner {
        Algebra::Filter(_, input) => assert!(matches!(*input, Algebra::Group { .. })),
        other => panic!("expected filter above group, got {:?}", other),
    }
}

#[test]
fn test_aggregate_in_filter_is_error() {
    let error = translate_err(
        r#"
        PREFIX ex: <http://example.org/>
        SELECT ?s WHERE { ?s ex:p ?o FILTER(COUNT(?o) > 1) }
        "#,
    );
    assert!(matches!(error, SparqlError::TranslationError(_)));
}

#[test]
fn test_having_without_group_is_error() {
    let error = translate_err("SELECT ?s WHERE { ?s ?p ?o } HAVING(?s = 1)");
    assert!(matches!(error, SparqlError::TranslationError(_)));
}

#[test]
fn test_path_in_construct_template_is_error() {
    let error = translate_err(
        r#"
        PREFIX ex: <http://example.org/>
        CONSTRUCT { ?s ex:a/ex:b ?o } WHERE { ?s ?p ?o }
        "#,
    );
    assert!(matches!(error, SparqlError::TranslationError(_)));
}

#[test]
fn test_nested_service_is_unsupported() {
    let error = translate_err(
        r#"
        SELECT ?s WHERE {
            SERVICE <http://example.org/a> {
                SERVICE <http://example.org/b> { ?s ?p ?o }
            }
        }
        "#,
    );
    assert!(matches!(error, SparqlError::UnsupportedFeature(_)));
}

#[test]
fn test_ask_root() {
    let algebra = translate("ASK { ?s ?p ?o }");
    assert!(matches!(algebra, Algebra::Ask(_)));
}

#[test]
fn test_construct_root_keeps_template() {
    let algebra = translate(
        r#"
        PREFIX ex: <http://example.org/>
        CONSTRUCT { ?s ex:p ?o } WHERE { ?s ex:q ?o } LIMIT 3
        "#,
    );
    match algebra {
        Algebra::Construct { template, input } => {
            assert_eq!(template.len(), 1);
            // Solution modifiers wrap the WHERE translation, inside the root.
            assert!(matches!(*input, Algebra::Slice { .. }));
        }
        other => panic!("expected construct, got {:?}", other),
    }
}

#[test]
fn test_select_star_projects_visible_variables() {
    let algebra = translate("SELECT * WHERE { ?s ?p ?o }");
    let (projected, _) = unwrap_project(algebra);
    assert_eq!(
        projected,
        vec![
            Variable::new("o"),
            Variable::new("p"),
            Variable::new("s")
        ]
    );
}

#[test]
fn test_duplicate_alias_is_error() {
    let error = translate_err("SELECT (1 AS ?x) (2 AS ?x) WHERE { ?s ?p ?o }");
    assert!(matches!(error, SparqlError::TranslationError(_)));
}
