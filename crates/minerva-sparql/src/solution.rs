//! Solution mappings
//!
//! A solution is a finite partial function from variables to ground terms.
//! Term equality is structural; the RDF 1.1 plain-literal / `xsd:string`
//! identification is already normalized into `minerva_core::Literal`, so no
//! special casing is needed here.

use minerva_core::{Term, Variable};
use std::collections::BTreeMap;

/// A single solution mapping (a row of query results). Backed by an ordered
/// map so that solutions have deterministic iteration order, equality and
/// hashing, which DISTINCT and GROUP rely on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Solution {
    bindings: BTreeMap<Variable, Term>,
}

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style bind, for tests and VALUES rows.
    pub fn with(mut self, variable: Variable, term: Term) -> Self {
        self.bindings.insert(variable, term);
        self
    }

    pub fn bind(&mut self, variable: Variable, term: Term) {
        self.bindings.insert(variable, term);
    }

    pub fn get(&self, variable: &Variable) -> Option<&Term> {
        self.bindings.get(variable)
    }

    pub fn is_bound(&self, variable: &Variable) -> bool {
        self.bindings.contains_key(variable)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.bindings.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Two solutions are compatible iff every variable bound in both maps to
    /// the same term in both.
    pub fn is_compatible(&self, other: &Solution) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .iter()
            .all(|(var, term)| large.get(var).map_or(true, |bound| bound == term))
    }

    /// Whether at least one variable is bound in both solutions. MINUS only
    /// removes a solution when a compatible right-hand solution shares a
    /// binding with it (SPARQL 1.1 section 8.3.4).
    pub fn shares_binding_with(&self, other: &Solution) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.variables().any(|var| large.is_bound(var))
    }

    /// Merge two compatible solutions; `None` when they are incompatible.
    pub fn merge(&self, other: &Solution) -> Option<Solution> {
        if !self.is_compatible(other) {
            return None;
        }
        let mut merged = self.clone();
        for (var, term) in other.iter() {
            merged.bindings.insert(var.clone(), term.clone());
        }
        Some(merged)
    }

    /// Restrict to the given variables; declared-but-unbound variables simply
    /// stay absent.
    pub fn restrict(&self, variables: &[Variable]) -> Solution {
        let mut restricted = Solution::new();
        for var in variables {
            if let Some(term) = self.bindings.get(var) {
                restricted.bindings.insert(var.clone(), term.clone());
            }
        }
        restricted
    }
}

impl FromIterator<(Variable, Term)> for Solution {
    fn from_iter<I: IntoIterator<Item = (Variable, Term)>>(iter: I) -> Self {
        Solution {
            bindings: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minerva_core::{Iri, Literal};

    fn var(name: &str) -> Variable {
        Variable::new(name)
    }

    #[test]
    fn test_compatible_on_shared_variable() {
        let a = Solution::new().with(var("x"), Term::iri("s1"));
        let b = Solution::new()
            .with(var("x"), Term::iri("s1"))
            .with(var("y"), Term::literal("v"));
        assert!(a.is_compatible(&b));
        assert!(b.is_compatible(&a));
    }

    #[test]
    fn test_incompatible_on_conflicting_binding() {
        let a = Solution::new().with(var("x"), Term::iri("s1"));
        let b = Solution::new().with(var("x"), Term::iri("s2"));
        assert!(!a.is_compatible(&b));
        assert_eq!(a.merge(&b), None);
    }

    #[test]
    fn test_disjoint_solutions_are_compatible() {
        let a = Solution::new().with(var("x"), Term::iri("s1"));
        let b = Solution::new().with(var("y"), Term::iri("s2"));
        assert!(a.is_compatible(&b));
        assert!(!a.shares_binding_with(&b));
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_plain_literal_compatible_with_xsd_string() {
        let plain = Term::literal("x");
        let typed = Term::Literal(Literal::typed("x", Iri::new(minerva_core::xsd::STRING)));
        let a = Solution::new().with(var("v"), plain);
        let b = Solution::new().with(var("v"), typed);
        assert!(a.is_compatible(&b));
        assert!(a.shares_binding_with(&b));
    }

    #[test]
    fn test_restrict_drops_unmentioned() {
        let sol = Solution::new()
            .with(var("x"), Term::iri("s"))
            .with(var("y"), Term::literal("v"));
        let restricted = sol.restrict(&[var("x"), var("z")]);
        assert_eq!(restricted.len(), 1);
        assert!(restricted.is_bound(&var("x")));
        assert!(!restricted.is_bound(&var("z")));
    }

    #[test]
    fn test_merge_keeps_unbound_unbound() {
        let a = Solution::new().with(var("x"), Term::iri("s"));
        let merged = a.merge(&Solution::new()).unwrap();
        assert_eq!(merged, a);
    }
}
