//! Choose the source snapshot for each entity being restored.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use oxigraph::model::NamedNode;
use serde::Serialize;

use crate::provenance::{EntityProvenance, latest, select_snapshot};

/// An entity taking part in a restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestorationTarget {
    #[serde(serialize_with = "serialize_iri")]
    pub entity: NamedNode,
    /// Snapshot whose state is being brought back.
    #[serde(serialize_with = "serialize_iri")]
    pub source_snapshot: NamedNode,
    /// The entity is currently deleted and must be revived, not just edited.
    pub needs_restore: bool,
}

fn serialize_iri<S: serde::Serializer>(iri: &NamedNode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(iri.as_str())
}

/// Attribute a source snapshot to every affected entity with known history.
///
/// Entities without provenance, or without a live snapshot at `at`, are left
/// out: there is nothing to restore them from.
pub fn prepare_restoration_targets(
    affected: &HashSet<NamedNode>,
    provenance_by_entity: &HashMap<NamedNode, EntityProvenance>,
    at: DateTime<Utc>,
) -> HashMap<NamedNode, RestorationTarget> {
    let mut targets = HashMap::new();
    for entity in affected {
        let Some(provenance) = provenance_by_entity.get(entity) else {
            tracing::warn!(entity = %entity, "no provenance, skipping restoration target");
            continue;
        };
        let Some(source_snapshot) = select_snapshot(provenance, at) else {
            tracing::warn!(entity = %entity, at = %at, "no live snapshot at target time, skipping");
            continue;
        };
        let needs_restore = latest(provenance).is_some_and(|(_, meta)| meta.is_deletion());
        targets.insert(
            entity.clone(),
            RestorationTarget {
                entity: entity.clone(),
                source_snapshot,
                needs_restore,
            },
        );
    }
    targets
}
