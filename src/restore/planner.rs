//! Find the entities that must be reverted together with the main one.

use std::collections::HashSet;

use oxigraph::model::NamedNode;
use oxigraph::model::vocab::rdf;

use crate::graph::{Diff, object_iri, subject_iri};

/// Every IRI subject or object of a non-`rdf:type` statement in the diff,
/// plus the main entity itself.
///
/// A changed relationship drags both of its ends into the restore; a type
/// change alone does not.
pub fn plan_affected_entities(diff: &Diff, main: &NamedNode) -> HashSet<NamedNode> {
    let mut affected = HashSet::from([main.clone()]);
    for quad in diff.statements() {
        if quad.predicate.as_ref() == rdf::TYPE {
            continue;
        }
        if let Some(subject) = subject_iri(quad) {
            if subject != *main {
                affected.insert(subject);
            }
        }
        if let Some(object) = object_iri(quad) {
            if object != main {
                affected.insert(object.clone());
            }
        }
    }
    tracing::debug!(entity = %main, affected = affected.len(), "restoration planned");
    affected
}
