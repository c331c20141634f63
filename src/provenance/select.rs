//! Pick the snapshot that describes an entity at a given time.

use chrono::{DateTime, Utc};
use oxigraph::model::NamedNode;

use super::EntityProvenance;

/// The latest live snapshot generated at or before `at`.
///
/// Deletion snapshots never qualify. `None` means the entity had no live
/// state at that time; callers skip such entities rather than fail.
/// Ties on generation time go to the lexicographically greatest IRI so the
/// choice is stable.
pub fn select_snapshot(provenance: &EntityProvenance, at: DateTime<Utc>) -> Option<NamedNode> {
    provenance
        .iter()
        .filter(|(_, meta)| !meta.is_deletion())
        .filter(|(_, meta)| meta.generated_at <= at)
        .max_by(|(a_iri, a), (b_iri, b)| {
            a.generated_at
                .cmp(&b.generated_at)
                .then_with(|| a_iri.as_str().cmp(b_iri.as_str()))
        })
        .map(|(iri, _)| iri.clone())
}
