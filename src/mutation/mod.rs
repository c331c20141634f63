//! Graph mutation log: the in-memory working set edits go through before a
//! `save()` seals them into the store and the provenance chain.
//!
//! [`MutationLog`] is the contract the restore, chain and impact code drive.
//! [`Editor`] implements it over oxigraph; tests substitute their own.

pub mod editor;

use std::collections::HashSet;

use oxigraph::model::{NamedNode, Quad, Term};

use crate::error::MutationResult;
use crate::graph::{GraphState, object_iri, subject_iri};

pub use editor::{Editor, EditorSettings};

/// The statements an editing session currently sees.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    quads: GraphState,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, quad: Quad) -> bool {
        self.quads.insert(quad)
    }

    pub fn remove(&mut self, quad: &Quad) -> bool {
        self.quads.remove(quad)
    }

    pub fn contains(&self, quad: &Quad) -> bool {
        self.quads.contains(quad)
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub fn clear(&mut self) {
        self.quads.clear();
    }

    /// Statements matching a triple pattern, `None` being a wildcard.
    pub fn scan(
        &self,
        subject: Option<&NamedNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> Vec<Quad> {
        self.quads
            .iter()
            .filter(|q| subject.is_none_or(|s| subject_iri(q).as_ref() == Some(s)))
            .filter(|q| predicate.is_none_or(|p| q.predicate == *p))
            .filter(|q| object.is_none_or(|o| q.object == *o))
            .cloned()
            .collect()
    }

    /// Every statement whose subject is `entity`.
    pub fn subject_state(&self, entity: &NamedNode) -> GraphState {
        self.scan(Some(entity), None, None).into_iter().collect()
    }

    /// Distinct IRI subjects, sorted.
    pub fn subjects(&self) -> Vec<NamedNode> {
        let set: HashSet<NamedNode> = self.quads.iter().filter_map(subject_iri).collect();
        let mut out: Vec<NamedNode> = set.into_iter().collect();
        out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        out
    }

    /// Statements pointing at `entity`.
    pub fn referrers(&self, entity: &NamedNode) -> Vec<Quad> {
        self.quads
            .iter()
            .filter(|q| object_iri(q) == Some(entity))
            .cloned()
            .collect()
    }

    pub fn state(&self) -> &GraphState {
        &self.quads
    }
}

/// Mutation primitives over a working set, sealed by [`MutationLog::save`].
///
/// `graph` arguments are ignored by triplestore-backed implementations.
pub trait MutationLog {
    /// Load the current statements of `entity` (and its baseline) into the
    /// working set. Importing twice is a no-op.
    fn import_entity(&mut self, entity: &NamedNode) -> MutationResult<()>;

    /// Seal the baseline: statements present now count as pre-existing.
    fn mark_preexisting_finished(&mut self);

    fn create(
        &mut self,
        subject: &NamedNode,
        predicate: &NamedNode,
        object: &Term,
        graph: Option<&NamedNode>,
    ) -> MutationResult<()>;

    /// Delete matching statements. With neither predicate nor object the
    /// whole entity goes, including statements referencing it.
    fn delete(
        &mut self,
        subject: &NamedNode,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        graph: Option<&NamedNode>,
    ) -> MutationResult<()>;

    /// Replace `old` with `new` on `(subject, predicate)`.
    fn update(
        &mut self,
        subject: &NamedNode,
        predicate: &NamedNode,
        old: &Term,
        new: &Term,
        graph: Option<&NamedNode>,
    ) -> MutationResult<()> {
        self.delete(subject, Some(predicate), Some(old), graph)?;
        self.create(subject, predicate, new, graph)
    }

    /// Fold `delete` into `keep`: references move to `keep`, `delete` goes.
    fn merge(&mut self, keep: &NamedNode, delete: &NamedNode) -> MutationResult<()>;

    fn working_set(&self) -> &WorkingSet;

    /// Flag a currently deleted entity as coming back to life.
    fn mark_as_restored(&mut self, entity: &NamedNode);

    /// Snapshot recorded as `prov:hadPrimarySource` of the entity's next snapshot.
    fn set_restoration_source(&mut self, entity: &NamedNode, snapshot: &NamedNode);

    /// Persist the working set and emit snapshots. Returns the new snapshot IRIs.
    fn save(&mut self) -> MutationResult<Vec<NamedNode>>;
}
