//! Provenance snapshots: metadata, the store they live in, selection by time
//! and history reconstruction.
//!
//! Each entity owns a named graph `<entity>/prov/` containing a chain of
//! `prov:Entity` snapshots. A snapshot whose generation time equals its
//! invalidation time records a deletion.

pub mod history;
pub mod select;

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use oxigraph::model::vocab::xsd;
use oxigraph::model::{Literal, NamedNode, Term};
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, ProvenanceError};
use crate::graph::{GraphStore, subject_iri};
use crate::vocab::{dcterms, oc, prov};

pub use history::{EntityHistory, HistoryAccessor, HistoryOptions};
pub use select::select_snapshot;

/// Result type for provenance operations.
pub type ProvenanceResult<T> = std::result::Result<T, ProvenanceError>;

/// Metadata of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub generated_at: DateTime<Utc>,
    pub invalidated_at: Option<DateTime<Utc>>,
    pub attributed_to: Option<String>,
    pub primary_source: Option<String>,
    /// Predecessors. More than one marks a merge.
    pub derived_from: Vec<String>,
    pub update_query: Option<String>,
    pub description: Option<String>,
}

impl SnapshotMeta {
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            invalidated_at: None,
            attributed_to: None,
            primary_source: None,
            derived_from: Vec::new(),
            update_query: None,
            description: None,
        }
    }

    /// A deletion snapshot is generated and invalidated at the same instant.
    pub fn is_deletion(&self) -> bool {
        self.invalidated_at == Some(self.generated_at)
    }

    pub fn is_merge(&self) -> bool {
        self.derived_from.len() > 1
    }
}

/// Snapshots of one entity, keyed by snapshot IRI.
pub type EntityProvenance = HashMap<NamedNode, SnapshotMeta>;

/// Snapshots of an entity in generation order.
pub fn chronological(provenance: &EntityProvenance) -> Vec<(&NamedNode, &SnapshotMeta)> {
    let mut snapshots: Vec<_> = provenance.iter().collect();
    snapshots.sort_by(|(a_iri, a), (b_iri, b)| {
        a.generated_at
            .cmp(&b.generated_at)
            .then_with(|| a_iri.as_str().cmp(b_iri.as_str()))
    });
    snapshots
}

/// The most recent snapshot of an entity.
pub fn latest(provenance: &EntityProvenance) -> Option<(&NamedNode, &SnapshotMeta)> {
    chronological(provenance).pop()
}

/// Render a timestamp as an `xsd:dateTime` literal.
pub fn datetime_literal(at: DateTime<Utc>) -> Literal {
    Literal::new_typed_literal(at.to_rfc3339_opts(SecondsFormat::Micros, true), xsd::DATE_TIME)
}

fn parse_datetime(snapshot: &NamedNode, term: &Term) -> ProvenanceResult<DateTime<Utc>> {
    let value = match term {
        Term::Literal(l) => l.value(),
        other => {
            return Err(ProvenanceError::InvalidTimestamp {
                snapshot: snapshot.as_str().to_string(),
                value: other.to_string(),
            });
        }
    };
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ProvenanceError::InvalidTimestamp {
            snapshot: snapshot.as_str().to_string(),
            value: value.to_string(),
        })
}

fn term_text(term: &Term) -> String {
    match term {
        Term::NamedNode(n) => n.as_str().to_string(),
        Term::Literal(l) => l.value().to_string(),
        other => other.to_string(),
    }
}

/// Read access to the provenance dataset.
pub struct ProvenanceStore {
    graph: GraphStore,
}

impl ProvenanceStore {
    pub fn new(graph: GraphStore) -> Self {
        Self { graph }
    }

    /// The underlying graph store, for writers.
    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// Snapshot IRIs recorded for `entity`, unordered.
    pub fn snapshot_iris(&self, entity: &NamedNode) -> Result<Vec<NamedNode>, GraphError> {
        let specialization_of = NamedNode::from(prov::SPECIALIZATION_OF);
        let target = Term::NamedNode(entity.clone());
        let mut iris: Vec<NamedNode> = self
            .graph
            .quads_matching(None, Some(&specialization_of), Some(&target), None)?
            .iter()
            .filter_map(subject_iri)
            .collect();
        iris.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        iris.dedup();
        Ok(iris)
    }

    /// Read one snapshot's metadata.
    pub fn snapshot(&self, snapshot: &NamedNode) -> ProvenanceResult<SnapshotMeta> {
        let mut generated_at = None;
        let mut meta = SnapshotMeta::new(DateTime::<Utc>::MIN_UTC);
        for quad in self.graph.quads_matching(Some(snapshot), None, None, None)? {
            let p = quad.predicate.as_ref();
            if p == prov::GENERATED_AT_TIME {
                generated_at = Some(parse_datetime(snapshot, &quad.object)?);
            } else if p == prov::INVALIDATED_AT_TIME {
                meta.invalidated_at = Some(parse_datetime(snapshot, &quad.object)?);
            } else if p == prov::WAS_ATTRIBUTED_TO {
                meta.attributed_to = Some(term_text(&quad.object));
            } else if p == prov::HAD_PRIMARY_SOURCE {
                meta.primary_source = Some(term_text(&quad.object));
            } else if p == prov::WAS_DERIVED_FROM {
                meta.derived_from.push(term_text(&quad.object));
            } else if p == oc::HAS_UPDATE_QUERY {
                meta.update_query = Some(term_text(&quad.object));
            } else if p == dcterms::DESCRIPTION {
                meta.description = Some(term_text(&quad.object));
            }
        }
        meta.generated_at = generated_at.ok_or_else(|| ProvenanceError::MissingGenerationTime {
            snapshot: snapshot.as_str().to_string(),
        })?;
        meta.derived_from.sort();
        Ok(meta)
    }

    /// All snapshots of `entity`. Empty if the entity has no history.
    pub fn entity_provenance(&self, entity: &NamedNode) -> ProvenanceResult<EntityProvenance> {
        let mut out = EntityProvenance::new();
        for iri in self.snapshot_iris(entity)? {
            let meta = self.snapshot(&iri)?;
            out.insert(iri, meta);
        }
        Ok(out)
    }

    /// The entity a snapshot belongs to.
    pub fn entity_of(&self, snapshot: &NamedNode) -> Result<Option<NamedNode>, GraphError> {
        let specialization_of = NamedNode::from(prov::SPECIALIZATION_OF);
        Ok(self
            .graph
            .quads_matching(Some(snapshot), Some(&specialization_of), None, None)?
            .into_iter()
            .find_map(|q| match q.object {
                Term::NamedNode(n) => Some(n),
                _ => None,
            }))
    }

    /// Entities whose recorded changes mention `entity` anywhere in their
    /// update queries.
    pub fn entities_mentioning(&self, entity: &NamedNode) -> Result<Vec<NamedNode>, GraphError> {
        let needle = entity.to_string().replace('\\', "\\\\").replace('"', "\\\"");
        let sparql = format!(
            "SELECT DISTINCT ?entity WHERE {{ GRAPH ?g {{ \
                ?snapshot <{specialization}> ?entity ; <{query}> ?q . \
                FILTER(CONTAINS(STR(?q), \"{needle}\")) \
             }} }}",
            specialization = prov::SPECIALIZATION_OF.as_str(),
            query = oc::HAS_UPDATE_QUERY.as_str(),
        );
        let mut out: Vec<NamedNode> = self
            .graph
            .query_select(&sparql)?
            .into_iter()
            .flatten()
            .filter_map(|(var, term)| match term {
                Term::NamedNode(n) if var == "entity" && n != *entity => Some(n),
                _ => None,
            })
            .collect();
        out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        out.dedup();
        Ok(out)
    }
}

impl std::fmt::Debug for ProvenanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvenanceStore").finish()
    }
}
