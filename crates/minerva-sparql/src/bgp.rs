//! Basic graph pattern evaluation
//!
//! Left-to-right nested-loop binding: every input solution is extended
//! pattern by pattern against the store. Property paths in predicate
//! position are expanded here, with visited sets guaranteeing termination on
//! cyclic graphs.

use crate::evaluator::SolutionIter;
use crate::parser::{PatternPredicate, PatternTerm, PropertyPath, TriplePattern};
use crate::solution::Solution;
use itertools::Either;
use minerva_core::{Term, Variable};
use minerva_store::TripleStore;
use std::collections::{HashSet, VecDeque};

/// Evaluate a BGP over an input solution stream.
pub(crate) fn evaluate_bgp<'a>(
    store: &'a TripleStore,
    patterns: &'a [TriplePattern],
    input: SolutionIter<'a>,
) -> SolutionIter<'a> {
    patterns.iter().fold(input, |stream, pattern| {
        Box::new(stream.flat_map(move |result| match result {
            Err(e) => Either::Left(std::iter::once(Err(e))),
            Ok(solution) => {
                Either::Right(match_pattern(store, pattern, &solution).into_iter().map(Ok))
            }
        }))
    })
}

/// A pattern position after substituting the current solution.
enum Resolved {
    Bound(Term),
    Unbound(Variable),
}

fn resolve(term: &PatternTerm, solution: &Solution) -> Resolved {
    match term {
        PatternTerm::Term(term) => Resolved::Bound(term.clone()),
        PatternTerm::Variable(var) => match solution.get(var) {
            Some(bound) => Resolved::Bound(bound.clone()),
            None => Resolved::Unbound(var.clone()),
        },
    }
}

/// Bind `var` to `term`, or check consistency when it is already bound.
fn try_bind(solution: &mut Solution, var: &Variable, term: Term) -> bool {
    match solution.get(var) {
        Some(existing) => existing == &term,
        None => {
            solution.bind(var.clone(), term);
            true
        }
    }
}

/// All extensions of `solution` matching one triple pattern.
pub(crate) fn match_pattern(
    store: &TripleStore,
    pattern: &TriplePattern,
    solution: &Solution,
) -> Vec<Solution> {
    let subject = resolve(&pattern.subject, solution);
    let object = resolve(&pattern.object, solution);

    match &pattern.predicate {
        PatternPredicate::Iri(predicate) => {
            match_triples(store, subject, Some(predicate.clone()), object, None, solution)
        }
        PatternPredicate::Variable(var) => match solution.get(var) {
            Some(Term::Iri(iri)) => {
                match_triples(store, subject, Some(iri.clone()), object, None, solution)
            }
            Some(_) => Vec::new(),
            None => match_triples(store, subject, None, object, Some(var), solution),
        },
        PatternPredicate::Path(path) => match_path(store, path, subject, object, solution),
    }
}

fn match_triples(
    store: &TripleStore,
    subject: Resolved,
    predicate: Option<minerva_core::Iri>,
    object: Resolved,
    predicate_var: Option<&Variable>,
    solution: &Solution,
) -> Vec<Solution> {
    let subject_term = match &subject {
        Resolved::Bound(term) => Some(term),
        Resolved::Unbound(_) => None,
    };
    let object_term = match &object {
        Resolved::Bound(term) => Some(term),
        Resolved::Unbound(_) => None,
    };

    let mut matches = Vec::new();
    for triple in store.find_triples(subject_term, predicate.as_ref(), object_term) {
        let mut extended = solution.clone();
        if let Resolved::Unbound(var) = &subject {
            if !try_bind(&mut extended, var, triple.subject.clone()) {
                continue;
            }
        }
        if let Some(var) = predicate_var {
            if !try_bind(&mut extended, var, Term::Iri(triple.predicate.clone())) {
                continue;
            }
        }
        if let Resolved::Unbound(var) = &object {
            if !try_bind(&mut extended, var, triple.object.clone()) {
                continue;
            }
        }
        matches.push(extended);
    }
    matches
}

// ---- property paths ----

fn match_path(
    store: &TripleStore,
    path: &PropertyPath,
    subject: Resolved,
    object: Resolved,
    solution: &Solution,
) -> Vec<Solution> {
    match (subject, object) {
        (Resolved::Bound(start), Resolved::Bound(end)) => {
            if path_from(store, path, &start).contains(&end) {
                vec![solution.clone()]
            } else {
                Vec::new()
            }
        }
        (Resolved::Bound(start), Resolved::Unbound(var)) => path_from(store, path, &start)
            .into_iter()
            .filter_map(|end| {
                let mut extended = solution.clone();
                try_bind(&mut extended, &var, end).then_some(extended)
            })
            .collect(),
        (Resolved::Unbound(var), Resolved::Bound(end)) => path_to(store, path, &end)
            .into_iter()
            .filter_map(|start| {
                let mut extended = solution.clone();
                try_bind(&mut extended, &var, start).then_some(extended)
            })
            .collect(),
        (Resolved::Unbound(subject_var), Resolved::Unbound(object_var)) => {
            path_pairs(store, path)
                .into_iter()
                .filter_map(|(start, end)| {
                    let mut extended = solution.clone();
                    (try_bind(&mut extended, &subject_var, start)
                        && try_bind(&mut extended, &object_var, end))
                    .then_some(extended)
                })
                .collect()
        }
    }
}

/// Nodes reachable from `start` over `path`, deduplicated, in discovery
/// order.
fn path_from(store: &TripleStore, path: &PropertyPath, start: &Term) -> Vec<Term> {
    match path {
        PropertyPath::Predicate(predicate) => store
            .find_triples(Some(start), Some(predicate), None)
            .into_iter()
            .map(|triple| triple.object.clone())
            .collect(),
        PropertyPath::Inverse(inner) => path_to(store, inner, start),
        PropertyPath::Sequence(items) => {
            let mut current = vec![start.clone()];
            for item in items {
                let mut seen = HashSet::new();
                let mut next = Vec::new();
                for node in &current {
                    for end in path_from(store, item, node) {
                        if seen.insert(end.clone()) {
                            next.push(end);
                        }
                    }
                }
                current = next;
                if current.is_empty() {
                    break;
                }
            }
            current
        }
        PropertyPath::Alternative(items) => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for item in items {
                for end in path_from(store, item, start) {
                    if seen.insert(end.clone()) {
                        out.push(end);
                    }
                }
            }
            out
        }
        PropertyPath::ZeroOrOne(inner) => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            seen.insert(start.clone());
            out.push(start.clone());
            for end in path_from(store, inner, start) {
                if seen.insert(end.clone()) {
                    out.push(end);
                }
            }
            out
        }
        PropertyPath::OneOrMore(inner) => {
            closure(start, false, |node| path_from(store, inner, node))
        }
        PropertyPath::ZeroOrMore(inner) => {
            closure(start, true, |node| path_from(store, inner, node))
        }
    }
}

/// Nodes that reach `end` over `path` (the mirror of `path_from`).
fn path_to(store: &TripleStore, path: &PropertyPath, end: &Term) -> Vec<Term> {
    match path {
        PropertyPath::Predicate(predicate) => store
            .find_triples(None, Some(predicate), Some(end))
            .into_iter()
            .map(|triple| triple.subject.clone())
            .collect(),
        PropertyPath::Inverse(inner) => path_from(store, inner, end),
        PropertyPath::Sequence(items) => {
            let mut current = vec![end.clone()];
            for item in items.iter().rev() {
                let mut seen = HashSet::new();
                let mut next = Vec::new();
                for node in &current {
                    for start in path_to(store, item, node) {
                        if seen.insert(start.clone()) {
                            next.push(start);
                        }
                    }
                }
                current = next;
                if current.is_empty() {
                    break;
                }
            }
            current
        }
        PropertyPath::Alternative(items) => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for item in items {
                for start in path_to(store, item, end) {
                    if seen.insert(start.clone()) {
                        out.push(start);
                    }
                }
            }
            out
        }
        PropertyPath::ZeroOrOne(inner) => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            seen.insert(end.clone());
            out.push(end.clone());
            for start in path_to(store, inner, end) {
                if seen.insert(start.clone()) {
                    out.push(start);
                }
            }
            out
        }
        PropertyPath::OneOrMore(inner) => closure(end, false, |node| path_to(store, inner, node)),
        PropertyPath::ZeroOrMore(inner) => closure(end, true, |node| path_to(store, inner, node)),
    }
}

/// Breadth-first transitive closure with a visited set per start node, so
/// cyclic graphs terminate.
fn closure(start: &Term, reflexive: bool, step: impl Fn(&Term) -> Vec<Term>) -> Vec<Term> {
    let mut visited = HashSet::new();
    let mut out = Vec::new();
    if reflexive {
        visited.insert(start.clone());
        out.push(start.clone());
    }
    let mut queue = VecDeque::new();
    let mut expanded = HashSet::new();
    queue.push_back(start.clone());
    while let Some(node) = queue.pop_front() {
        if !expanded.insert(node.clone()) {
            continue;
        }
        for next in step(&node) {
            if visited.insert(next.clone()) {
                out.push(next.clone());
                queue.push_back(next);
            }
        }
    }
    out
}

/// All (start, end) pairs the path relates, for patterns with both ends
/// unbound.
fn path_pairs(store: &TripleStore, path: &PropertyPath) -> Vec<(Term, Term)> {
    match path {
        PropertyPath::Predicate(predicate) => store
            .find_triples(None, Some(predicate), None)
            .into_iter()
            .map(|triple| (triple.subject.clone(), triple.object.clone()))
            .collect(),
        PropertyPath::Inverse(inner) => path_pairs(store, inner)
            .into_iter()
            .map(|(start, end)| (end, start))
            .collect(),
        PropertyPath::Sequence(items) => {
            let mut pairs = match items.first() {
                Some(first) => path_pairs(store, first),
                None => return Vec::new(),
            };
            for item in &items[1..] {
                let mut seen = HashSet::new();
                let mut next = Vec::new();
                for (start, mid) in &pairs {
                    for end in path_from(store, item, mid) {
                        let pair = (start.clone(), end);
                        if seen.insert(pair.clone()) {
                            next.push(pair);
                        }
                    }
                }
                pairs = next;
                if pairs.is_empty() {
                    break;
                }
            }
            pairs
        }
        PropertyPath::Alternative(items) => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for item in items {
                for pair in path_pairs(store, item) {
                    if seen.insert(pair.clone()) {
                        out.push(pair);
                    }
                }
            }
            out
        }
        PropertyPath::ZeroOrOne(inner) => {
            let base = path_pairs(store, inner);
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for node in nodes_of(&base) {
                let pair = (node.clone(), node);
                if seen.insert(pair.clone()) {
                    out.push(pair);
                }
            }
            for pair in base {
                if seen.insert(pair.clone()) {
                    out.push(pair);
                }
            }
            out
        }
        PropertyPath::OneOrMore(inner) => {
            let base = path_pairs(store, inner);
            let mut out = Vec::new();
            let mut seen = HashSet::new();
            for start in start_nodes(&base) {
                for end in closure(&start, false, |node| path_from(store, inner, node)) {
                    let pair = (start.clone(), end);
                    if seen.insert(pair.clone()) {
                        out.push(pair);
                    }
                }
            }
            out
        }
        PropertyPath::ZeroOrMore(inner) => {
            // The reflexive pair (x, x) for every node the base path touches,
            // plus the transitive closure.
            let base = path_pairs(store, inner);
            let mut out = Vec::new();
            let mut seen = HashSet::new();
            for node in nodes_of(&base) {
                let pair = (node.clone(), node.clone());
                if seen.insert(pair.clone()) {
                    out.push(pair);
                }
            }
            for start in start_nodes(&base) {
                for end in closure(&start, false, |node| path_from(store, inner, node)) {
                    let pair = (start.clone(), end);
                    if seen.insert(pair.clone()) {
                        out.push(pair);
                    }
                }
            }
            out
        }
    }
}

/// Distinct nodes appearing on either side of the pairs, in first-seen order.
fn nodes_of(pairs: &[(Term, Term)]) -> Vec<Term> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (start, end) in pairs {
        if seen.insert(start.clone()) {
            out.push(start.clone());
        }
        if seen.insert(end.clone()) {
            out.push(end.clone());
        }
    }
    out
}

/// Distinct nodes with outgoing edges, in first-seen order.
fn start_nodes(pairs: &[(Term, Term)]) -> Vec<Term> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (start, _) in pairs {
        if seen.insert(start.clone()) {
            out.push(start.clone());
        }
    }
    out
}
