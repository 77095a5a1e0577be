//! In-memory triple store with per-position indexing

use minerva_core::{Iri, Term, Triple};
use smallvec::SmallVec;
use std::collections::HashMap;

type IndexBucket = SmallVec<[usize; 8]>;

/// An in-memory set of triples supporting pattern match over any combination
/// of bound subject / predicate / object.
///
/// Triples live in append-only slots; removal blanks the slot and the indexes
/// keep their (now stale) entries, which the match path filters out. Inserting
/// a triple that is already present is a no-op, so a match never returns the
/// same triple twice.
#[derive(Debug, Clone, Default)]
pub struct TripleStore {
    /// Triple slots; `None` marks a removed triple.
    slots: Vec<Option<Triple>>,
    /// Triple -> slot, for duplicate detection and removal.
    occupied: HashMap<Triple, usize>,
    /// Subject term -> slots containing it.
    subject_index: HashMap<Term, IndexBucket>,
    /// Predicate IRI -> slots containing it.
    predicate_index: HashMap<Iri, IndexBucket>,
    /// Object term -> slots containing it.
    object_index: HashMap<Term, IndexBucket>,
}

impl TripleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triple. Returns `false` when the triple was already present.
    pub fn add(&mut self, triple: Triple) -> bool {
        if self.occupied.contains_key(&triple) {
            return false;
        }
        let slot = self.slots.len();
        self.subject_index
            .entry(triple.subject.clone())
            .or_default()
            .push(slot);
        self.predicate_index
            .entry(triple.predicate.clone())
            .or_default()
            .push(slot);
        self.object_index
            .entry(triple.object.clone())
            .or_default()
            .push(slot);
        self.occupied.insert(triple.clone(), slot);
        self.slots.push(Some(triple));
        true
    }

    /// Add every triple from an iterator. Returns how many were new.
    pub fn add_all<I: IntoIterator<Item = Triple>>(&mut self, triples: I) -> usize {
        triples.into_iter().filter(|t| self.add(t.clone())).count()
    }

    /// Remove a triple. Returns `false` when it was not present.
    pub fn remove(&mut self, triple: &Triple) -> bool {
        match self.occupied.remove(triple) {
            Some(slot) => {
                self.slots[slot] = None;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.occupied.clear();
        self.subject_index.clear();
        self.predicate_index.clear();
        self.object_index.clear();
    }

    /// Number of distinct triples currently stored.
    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }

    /// Iterate over all stored triples in insertion order.
    pub fn triples(&self) -> impl Iterator<Item = &Triple> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    /// Find triples matching a pattern; `None` positions are wildcards.
    ///
    /// The most selective available index narrows the candidates, and every
    /// candidate is re-checked against all bound positions, so stale index
    /// entries and partially-indexed lookups cannot leak through. Never
    /// fails; a pattern over unknown terms simply yields nothing.
    pub fn find_triples(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> Vec<&Triple> {
        let candidates: IndexBucket = match (subject, predicate, object) {
            (Some(s), Some(p), Some(o)) => Self::intersect(
                &Self::intersect(
                    self.subject_bucket(s),
                    self.predicate_bucket(p),
                ),
                self.object_bucket(o),
            ),
            (Some(s), Some(p), None) => {
                Self::intersect(self.subject_bucket(s), self.predicate_bucket(p))
            }
            (Some(s), None, Some(o)) => {
                Self::intersect(self.subject_bucket(s), self.object_bucket(o))
            }
            (None, Some(p), Some(o)) => {
                Self::intersect(self.predicate_bucket(p), self.object_bucket(o))
            }
            (Some(s), None, None) => self.subject_bucket(s).iter().copied().collect(),
            (None, None, Some(o)) => self.object_bucket(o).iter().copied().collect(),
            (None, Some(p), None) => self.predicate_bucket(p).iter().copied().collect(),
            (None, None, None) => (0..self.slots.len()).collect(),
        };

        candidates
            .into_iter()
            .filter_map(|slot| self.slots[slot].as_ref())
            .filter(|triple| {
                subject.map_or(true, |s| &triple.subject == s)
                    && predicate.map_or(true, |p| &triple.predicate == p)
                    && object.map_or(true, |o| &triple.object == o)
            })
            .collect()
    }

    fn subject_bucket(&self, subject: &Term) -> &[usize] {
        self.subject_index
            .get(subject)
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    fn predicate_bucket(&self, predicate: &Iri) -> &[usize] {
        self.predicate_index
            .get(predicate)
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    fn object_bucket(&self, object: &Term) -> &[usize] {
        self.object_index
            .get(object)
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    /// Intersect two slot lists; buckets are sorted because slots only grow.
    fn intersect(a: &[usize], b: &[usize]) -> IndexBucket {
        let mut result = IndexBucket::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    result.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        result
    }
}
