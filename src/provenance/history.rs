//! History reconstruction by replaying snapshot update queries.
//!
//! An entity's state at each snapshot is rebuilt from scratch: starting from
//! an empty scratch store, every snapshot's `oc:hasUpdateQuery` is applied in
//! generation order and the entity's statements are read back after each one.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use oxigraph::model::NamedNode;
use oxigraph::model::vocab::rdf;
use serde::{Deserialize, Serialize};

use crate::error::ProvenanceError;
use crate::graph::{GraphState, GraphStore, object_iri};

use super::{EntityProvenance, ProvenanceResult, ProvenanceStore, chronological};

/// Which neighbours of an entity get their history loaded alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryOptions {
    /// Entities the main entity points to.
    #[serde(default = "default_true")]
    pub include_related: bool,
    /// Entities that were merged into the main entity.
    #[serde(default = "default_true")]
    pub include_merged: bool,
    /// Entities pointing to the main entity, now or in the past.
    #[serde(default = "default_true")]
    pub include_reverse_relations: bool,
}

fn default_true() -> bool {
    true
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            include_related: true,
            include_merged: true,
            include_reverse_relations: true,
        }
    }
}

impl HistoryOptions {
    /// Only the entity itself.
    pub fn entity_only() -> Self {
        Self {
            include_related: false,
            include_merged: false,
            include_reverse_relations: false,
        }
    }
}

/// Reconstructed states and raw provenance of an entity and its neighbours.
#[derive(Debug, Clone)]
pub struct EntityHistory {
    pub entity: NamedNode,
    /// `entity → generation time → state after that snapshot`.
    pub states: HashMap<NamedNode, BTreeMap<DateTime<Utc>, GraphState>>,
    pub provenance: HashMap<NamedNode, EntityProvenance>,
}

impl EntityHistory {
    /// The state of `entity` at `at`: the one recorded by its latest snapshot
    /// generated at or before `at`.
    pub fn state_at(&self, entity: &NamedNode, at: DateTime<Utc>) -> Option<&GraphState> {
        self.states
            .get(entity)?
            .range(..=at)
            .next_back()
            .map(|(_, state)| state)
    }

    /// Whether `entity` had any snapshot at or before `at`.
    pub fn existed_at(&self, entity: &NamedNode, at: DateTime<Utc>) -> bool {
        self.state_at(entity, at).is_some()
    }

    /// Union of every known entity's state at `at`.
    pub fn graph_at(&self, at: DateTime<Utc>) -> GraphState {
        self.states
            .keys()
            .filter_map(|e| self.state_at(e, at))
            .flat_map(|s| s.iter().cloned())
            .collect()
    }

    /// Entities with known history, sorted by IRI.
    pub fn entities(&self) -> Vec<&NamedNode> {
        let mut out: Vec<&NamedNode> = self.provenance.keys().collect();
        out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        out
    }
}

/// Builds [`EntityHistory`] values from the data and provenance stores.
pub struct HistoryAccessor<'a> {
    data: &'a GraphStore,
    provenance: &'a ProvenanceStore,
}

impl<'a> HistoryAccessor<'a> {
    pub fn new(data: &'a GraphStore, provenance: &'a ProvenanceStore) -> Self {
        Self { data, provenance }
    }

    /// Load the history of `entity` and, depending on `options`, of its
    /// neighbours. Neighbours without snapshots are left out.
    pub fn get_history(
        &self,
        entity: &NamedNode,
        options: HistoryOptions,
    ) -> ProvenanceResult<EntityHistory> {
        let mut history = EntityHistory {
            entity: entity.clone(),
            states: HashMap::new(),
            provenance: HashMap::new(),
        };

        let main_prov = self.provenance.entity_provenance(entity)?;
        if main_prov.is_empty() {
            return Ok(history);
        }
        let main_states = self.replay(entity, &main_prov)?;

        let mut related: HashSet<NamedNode> = HashSet::new();
        if options.include_related {
            let current = self.data.entity_state(entity)?;
            for state in main_states.values().chain(std::iter::once(&current)) {
                related.extend(
                    state
                        .iter()
                        .filter(|q| q.predicate.as_ref() != rdf::TYPE)
                        .filter_map(|q| object_iri(q).cloned()),
                );
            }
        }
        if options.include_reverse_relations {
            related.extend(self.data.referring_entities(entity)?);
            related.extend(self.provenance.entities_mentioning(entity)?);
        }
        if options.include_merged {
            for (snapshot, meta) in &main_prov {
                if !meta.is_merge() {
                    continue;
                }
                for source in &meta.derived_from {
                    let Ok(source) = NamedNode::new(source.as_str()) else {
                        continue;
                    };
                    if let Some(merged) = self.provenance.entity_of(&source)? {
                        if merged != *entity {
                            tracing::debug!(entity = %entity, merged = %merged, snapshot = %snapshot, "including merged entity");
                            related.insert(merged);
                        }
                    }
                }
            }
        }
        related.remove(entity);

        history.states.insert(entity.clone(), main_states);
        history.provenance.insert(entity.clone(), main_prov);

        let mut related: Vec<NamedNode> = related.into_iter().collect();
        related.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        for other in related {
            let prov = self.provenance.entity_provenance(&other)?;
            if prov.is_empty() {
                continue;
            }
            let states = self.replay(&other, &prov)?;
            history.states.insert(other.clone(), states);
            history.provenance.insert(other, prov);
        }

        tracing::debug!(
            entity = %entity,
            entities = history.provenance.len(),
            "history reconstructed"
        );
        Ok(history)
    }

    fn replay(
        &self,
        entity: &NamedNode,
        provenance: &EntityProvenance,
    ) -> ProvenanceResult<BTreeMap<DateTime<Utc>, GraphState>> {
        let scratch = GraphStore::in_memory(self.data.mode())?;
        let mut states = BTreeMap::new();
        for (snapshot, meta) in chronological(provenance) {
            if let Some(query) = &meta.update_query {
                scratch
                    .update(query)
                    .map_err(|e| ProvenanceError::Replay {
                        snapshot: snapshot.as_str().to_string(),
                        message: e.to_string(),
                    })?;
            }
            states.insert(meta.generated_at, scratch.entity_state(entity)?);
        }
        Ok(states)
    }
}
