//! Federated SERVICE evaluation
//!
//! Serializes a sub-algebra back to SPARQL, POSTs it to the remote endpoint
//! and parses the SPARQL 1.1 JSON results into solution mappings. One
//! request per SERVICE invocation, with a per-request timeout and bounded
//! retries on transient failures. The client owns a current-thread runtime
//! so the pull-based executor stays synchronous.

use crate::algebra::{Algebra, Expr, Expression};
use crate::parser::{PatternPredicate, PatternTerm, PropertyPath, TriplePattern};
use crate::solution::Solution;
use crate::SparqlError;
use minerva_core::{Iri, Literal, Term, Variable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Transport policy for SERVICE requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Per-request timeout; a timeout aborts without retry.
    pub timeout_secs: u64,
    /// Retries after transient failures (network errors, 5xx responses).
    pub max_retries: u32,
    /// Fixed delay between retries.
    pub retry_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

impl ServiceConfig {
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }
}

/// HTTP client for remote SPARQL endpoints.
pub struct ServiceClient {
    config: ServiceConfig,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

struct Failure {
    transient: bool,
    error: SparqlError,
}

impl Failure {
    fn fatal(error: SparqlError) -> Self {
        Self {
            transient: false,
            error,
        }
    }
}

impl ServiceClient {
    pub fn new(config: ServiceConfig) -> Result<Self, SparqlError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SparqlError::ServiceError(format!("runtime setup failed: {}", e)))?;
        Ok(Self {
            config,
            client: reqwest::Client::new(),
            runtime,
        })
    }

    /// POST a query and return one solution per binding row. Blocks the
    /// calling thread; the in-flight request is aborted when the future is
    /// dropped on timeout.
    pub fn fetch_bindings(
        &self,
        endpoint: &str,
        query: &str,
    ) -> Result<Vec<Solution>, SparqlError> {
        debug!(endpoint, query, "SERVICE request");
        self.runtime.block_on(self.fetch(endpoint, query))
    }

    async fn fetch(&self, endpoint: &str, query: &str) -> Result<Vec<Solution>, SparqlError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(endpoint, query).await {
                Ok(solutions) => return Ok(solutions),
                Err(failure) => {
                    if failure.transient && attempt < self.config.max_retries {
                        attempt += 1;
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms))
                            .await;
                        continue;
                    }
                    return Err(failure.error);
                }
            }
        }
    }

    async fn send_once(&self, endpoint: &str, query: &str) -> Result<Vec<Solution>, Failure> {
        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/sparql-query")
            .header("Accept", "application/sparql-results+json")
            .body(query.to_owned())
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(|e| Failure {
                transient: !e.is_timeout(),
                error: SparqlError::ServiceError(format!("request to {} failed: {}", endpoint, e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Failure {
                transient: status.is_server_error(),
                error: SparqlError::ServiceError(format!(
                    "endpoint {} returned {}",
                    endpoint, status
                )),
            });
        }

        let body = response.text().await.map_err(|e| {
            Failure::fatal(SparqlError::ServiceError(format!(
                "reading response from {} failed: {}",
                endpoint, e
            )))
        })?;
        solutions_from_json(&body).map_err(Failure::fatal)
    }
}

// ---- SPARQL 1.1 JSON results ----

#[derive(Debug, Deserialize)]
struct SparqlJsonResults {
    #[serde(default)]
    #[allow(dead_code)]
    head: Head,
    results: Option<ResultsSection>,
}

/// `head.vars` is informational; only variables present in each row bind.
#[derive(Debug, Default, Deserialize)]
struct Head {
    #[serde(default)]
    #[allow(dead_code)]
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResultsSection {
    #[serde(default)]
    bindings: Vec<HashMap<String, JsonTerm>>,
}

#[derive(Debug, Deserialize)]
struct JsonTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    datatype: Option<String>,
    #[serde(rename = "xml:lang")]
    language: Option<String>,
}

pub(crate) fn solutions_from_json(body: &str) -> Result<Vec<Solution>, SparqlError> {
    let parsed: SparqlJsonResults = serde_json::from_str(body)
        .map_err(|e| SparqlError::ServiceError(format!("invalid results document: {}", e)))?;
    let mut solutions = Vec::new();
    for row in parsed
        .results
        .map(|section| section.bindings)
        .unwrap_or_default()
    {
        let mut solution = Solution::new();
        for (variable, term) in row {
            solution.bind(Variable::new(variable), term_from_json(&term)?);
        }
        solutions.push(solution);
    }
    Ok(solutions)
}

fn term_from_json(term: &JsonTerm) -> Result<Term, SparqlError> {
    match term.kind.as_str() {
        "uri" => Ok(Term::Iri(Iri::new(term.value.clone()))),
        "literal" | "typed-literal" => Ok(Term::Literal(match (&term.language, &term.datatype) {
            (Some(language), _) => Literal::lang_tagged(term.value.clone(), language.clone()),
            (None, Some(datatype)) => {
                Literal::typed(term.value.clone(), Iri::new(datatype.clone()))
            }
            (None, None) => Literal::simple(term.value.clone()),
        })),
        "bnode" => Ok(Term::BlankNode(term.value.clone())),
        other => Err(SparqlError::ServiceError(format!(
            "unknown binding type '{}'",
            other
        ))),
    }
}

// ---- algebra -> SPARQL serialization ----

/// Serialize a SERVICE sub-pattern as a standalone query. The generated text
/// must evaluate, under SPARQL 1.1 semantics, to the same solutions the
/// local engine would produce for the sub-algebra.
pub(crate) fn serialize_service_query(pattern: &Algebra) -> Result<String, SparqlError> {
    Ok(format!(
        "SELECT * WHERE {{ {} }}",
        serialize_pattern(pattern)?
    ))
}

fn serialize_pattern(algebra: &Algebra) -> Result<String, SparqlError> {
    match algebra {
        Algebra::Bgp(triples) => Ok(triples
            .iter()
            .map(serialize_triple)
            .collect::<Result<Vec<_>, _>>()?
            .join(" ")),
        Algebra::Join(left, right) => Ok(format!(
            "{} {}",
            serialize_pattern(left)?,
            serialize_pattern(right)?
        )),
        Algebra::LeftJoin { left, right, expr } => {
            let inner = match expr {
                Some(condition) => format!(
                    "{} FILTER({})",
                    serialize_pattern(right)?,
                    serialize_expr(condition)?
                ),
                None => serialize_pattern(right)?,
            };
            Ok(format!(
                "{} OPTIONAL {{ {} }}",
                serialize_pattern(left)?,
                inner
            ))
        }
        Algebra::Union(left, right) => Ok(format!(
            "{{ {} }} UNION {{ {} }}",
            serialize_pattern(left)?,
            serialize_pattern(right)?
        )),
        Algebra::Minus(left, right) => Ok(format!(
            "{} MINUS {{ {} }}",
            serialize_pattern(left)?,
            serialize_pattern(right)?
        )),
        Algebra::Filter(condition, input) => Ok(format!(
            "{} FILTER({})",
            serialize_pattern(input)?,
            serialize_expr(condition)?
        )),
        Algebra::Extend {
            input,
            variable,
            expr,
        } => Ok(format!(
            "{} BIND({} AS ?{})",
            serialize_pattern(input)?,
            serialize_expr(expr)?,
            variable.as_str()
        )),
        Algebra::Values { variables, rows } => {
            let header = variables
                .iter()
                .map(|v| format!("?{}", v.as_str()))
                .collect::<Vec<_>>()
                .join(" ");
            let data = rows
                .iter()
                .map(|row| {
                    let cells = row
                        .iter()
                        .map(|cell| match cell {
                            Some(term) => term.to_string(),
                            None => "UNDEF".to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    format!("({})", cells)
                })
                .collect::<Vec<_>>()
                .join(" ");
            Ok(format!("VALUES ({}) {{ {} }}", header, data))
        }
        other => Err(SparqlError::UnsupportedFeature(format!(
            "cannot serialize {} inside SERVICE",
            operator_name(other)
        ))),
    }
}

fn operator_name(algebra: &Algebra) -> &'static str {
    match algebra {
        Algebra::Bgp(_) => "BGP",
        Algebra::Values { .. } => "VALUES",
        Algebra::Join(..) => "join",
        Algebra::LeftJoin { .. } => "left join",
        Algebra::Union(..) => "union",
        Algebra::Minus(..) => "minus",
        Algebra::Filter(..) => "filter",
        Algebra::Extend { .. } => "bind",
        Algebra::Project(..) => "projection",
        Algebra::Distinct(_) => "DISTINCT",
        Algebra::Reduced(_) => "REDUCED",
        Algebra::OrderBy(..) => "ORDER BY",
        Algebra::Slice { .. } => "LIMIT/OFFSET",
        Algebra::Group { .. } => "GROUP BY",
        Algebra::SubQuery(_) => "subquery",
        Algebra::Service { .. } => "SERVICE",
        Algebra::Ask(_) => "ASK",
        Algebra::Construct { .. } => "CONSTRUCT",
    }
}

fn serialize_triple(triple: &TriplePattern) -> Result<String, SparqlError> {
    let predicate = match &triple.predicate {
        PatternPredicate::Iri(iri) => format!("<{}>", iri),
        PatternPredicate::Variable(var) => format!("?{}", var.as_str()),
        PatternPredicate::Path(path) => serialize_path(path),
    };
    Ok(format!(
        "{} {} {} .",
        serialize_term(&triple.subject),
        predicate,
        serialize_term(&triple.object)
    ))
}

fn serialize_term(term: &PatternTerm) -> String {
    match term {
        PatternTerm::Variable(var) => format!("?{}", var.as_str()),
        PatternTerm::Term(ground) => ground.to_string(),
    }
}

fn serialize_path(path: &PropertyPath) -> String {
    match path {
        PropertyPath::Predicate(iri) => format!("<{}>", iri),
        PropertyPath::Inverse(inner) => format!("^{}", serialize_path_child(inner)),
        PropertyPath::Sequence(items) => items
            .iter()
            .map(serialize_path_child)
            .collect::<Vec<_>>()
            .join("/"),
        PropertyPath::Alternative(items) => format!(
            "({})",
            items
                .iter()
                .map(serialize_path)
                .collect::<Vec<_>>()
                .join("|")
        ),
        PropertyPath::ZeroOrMore(inner) => format!("{}*", serialize_path_child(inner)),
        PropertyPath::OneOrMore(inner) => format!("{}+", serialize_path_child(inner)),
        PropertyPath::ZeroOrOne(inner) => format!("{}?", serialize_path_child(inner)),
    }
}

fn serialize_path_child(path: &PropertyPath) -> String {
    match path {
        PropertyPath::Sequence(_) | PropertyPath::Alternative(_) => {
            format!("({})", serialize_path(path))
        }
        _ => serialize_path(path),
    }
}

fn serialize_expr(expr: &Expr) -> Result<String, SparqlError> {
    let binary = |op: &str, a: &Expr, b: &Expr| -> Result<String, SparqlError> {
        Ok(format!(
            "({} {} {})",
            serialize_expr(a)?,
            op,
            serialize_expr(b)?
        ))
    };
    match expr {
        Expression::Variable(var) => Ok(format!("?{}", var.as_str())),
        Expression::Literal(lit) => Ok(lit.to_string()),
        Expression::Iri(iri) => Ok(format!("<{}>", iri)),
        Expression::Or(a, b) => binary("||", a, b),
        Expression::And(a, b) => binary("&&", a, b),
        Expression::Not(inner) => Ok(format!("!({})", serialize_expr(inner)?)),
        Expression::Equal(a, b) => binary("=", a, b),
        Expression::NotEqual(a, b) => binary("!=", a, b),
        Expression::Less(a, b) => binary("<", a, b),
        Expression::LessOrEqual(a, b) => binary("<=", a, b),
        Expression::Greater(a, b) => binary(">", a, b),
        Expression::GreaterOrEqual(a, b) => binary(">=", a, b),
        Expression::Add(a, b) => binary("+", a, b),
        Expression::Subtract(a, b) => binary("-", a, b),
        Expression::Multiply(a, b) => binary("*", a, b),
        Expression::Divide(a, b) => binary("/", a, b),
        Expression::UnaryMinus(inner) => Ok(format!("-({})", serialize_expr(inner)?)),
        Expression::FunctionCall(name, args) => {
            let rendered = args
                .iter()
                .map(serialize_expr)
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            if name.contains(':') {
                Ok(format!("<{}>({})", name, rendered))
            } else {
                Ok(format!("{}({})", name, rendered))
            }
        }
        Expression::In(test, list) => {
            let rendered = list
                .iter()
                .map(serialize_expr)
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            Ok(format!("({} IN ({}))", serialize_expr(test)?, rendered))
        }
        Expression::NotIn(test, list) => {
            let rendered = list
                .iter()
                .map(serialize_expr)
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            Ok(format!("({} NOT IN ({}))", serialize_expr(test)?, rendered))
        }
        Expression::Exists(pattern) => {
            Ok(format!("EXISTS {{ {} }}", serialize_pattern(pattern)?))
        }
        Expression::NotExists(pattern) => {
            Ok(format!("NOT EXISTS {{ {} }}", serialize_pattern(pattern)?))
        }
        Expression::Aggregate { .. } => Err(SparqlError::UnsupportedFeature(
            "aggregate inside SERVICE pattern".to_string(),
        )),
    }
}
