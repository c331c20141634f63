//! Oxigraph-backed [`MutationLog`].
//!
//! The editor keeps two sets: the baseline (what the store held when each
//! entity was imported) and the working set (baseline plus edits). `save()`
//! diffs the two per subject, writes the data delta in one SPARQL update and
//! then the snapshots describing it in a second one.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{GraphName, Literal, NamedNode, Quad, Term};

use crate::error::{MutationError, MutationResult};
use crate::graph::{GraphState, GraphStore, sorted, sparql_data_block, sparql_update, subject_iri};
use crate::provenance::{ProvenanceStore, datetime_literal, latest};
use crate::vocab::{self, dcterms, oc, prov};

use super::{MutationLog, WorkingSet};

/// Who is editing and on what authority.
#[derive(Debug, Clone, Default)]
pub struct EditorSettings {
    /// Recorded as `prov:wasAttributedTo` on every snapshot.
    pub resp_agent: Option<NamedNode>,
    /// Default `prov:hadPrimarySource` for snapshots that are not revivals.
    pub primary_source: Option<NamedNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Creation,
    Modification,
    Deletion,
    Restoration,
    Merge,
}

/// One editing session over a data store and its provenance store.
pub struct Editor<'a> {
    data: &'a GraphStore,
    provenance: &'a ProvenanceStore,
    settings: EditorSettings,
    working: WorkingSet,
    baseline: WorkingSet,
    imported: HashSet<NamedNode>,
    preexisting_finished: bool,
    restored: HashSet<NamedNode>,
    restoration_sources: HashMap<NamedNode, NamedNode>,
    merges: HashMap<NamedNode, Vec<NamedNode>>,
}

impl<'a> Editor<'a> {
    pub fn new(data: &'a GraphStore, provenance: &'a ProvenanceStore, settings: EditorSettings) -> Self {
        Self {
            data,
            provenance,
            settings,
            working: WorkingSet::new(),
            baseline: WorkingSet::new(),
            imported: HashSet::new(),
            preexisting_finished: false,
            restored: HashSet::new(),
            restoration_sources: HashMap::new(),
            merges: HashMap::new(),
        }
    }

    fn graph_matches(&self, quad: &Quad, graph: Option<&NamedNode>) -> bool {
        match (self.data.mode(), graph) {
            (crate::graph::StoreMode::Quads, Some(g)) => {
                quad.graph_name == GraphName::NamedNode(g.clone())
            }
            _ => true,
        }
    }

    fn reject_blank(term: &Term) -> MutationResult<()> {
        if matches!(term, Term::BlankNode(_)) {
            return Err(MutationError::Validation {
                message: format!("blank node {term} cannot be tracked across snapshots"),
            });
        }
        Ok(())
    }

    fn reject_empty(iri: &NamedNode) -> MutationResult<()> {
        if iri.as_str().is_empty() {
            return Err(MutationError::Validation {
                message: "empty IRI".into(),
            });
        }
        Ok(())
    }

    /// Import every entity with a statement pointing at `entity`.
    fn import_referrers(&mut self, entity: &NamedNode) -> MutationResult<()> {
        let referrers: Vec<NamedNode> = self
            .data
            .referrers(entity)?
            .iter()
            .filter_map(subject_iri)
            .collect();
        for r in referrers {
            self.import_entity(&r)?;
        }
        Ok(())
    }

    /// Persist with an explicit clock reading. Generation times stay strictly
    /// increasing per entity even if `now` is not.
    ///
    /// Timestamps are stored at microsecond precision, so `now` is truncated
    /// before it is compared with the previous snapshot.
    pub fn save_at(&mut self, now: DateTime<Utc>) -> MutationResult<Vec<NamedNode>> {
        let mut entities: HashSet<NamedNode> = self.imported.clone();
        entities.extend(self.working.subjects());
        entities.extend(self.restored.iter().cloned());
        entities.extend(self.merges.keys().cloned());
        let mut entities: Vec<NamedNode> = entities.into_iter().collect();
        entities.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        let mut data_removed: Vec<Quad> = Vec::new();
        let mut data_added: Vec<Quad> = Vec::new();
        let mut prov_quads: Vec<Quad> = Vec::new();
        let mut snapshots = Vec::new();

        for entity in &entities {
            let before = self.baseline.subject_state(entity);
            let after = self.working.subject_state(entity);
            let removed = sorted(&before.difference(&after).cloned().collect::<GraphState>());
            let added = sorted(&after.difference(&before).cloned().collect::<GraphState>());
            let is_restored = self.restored.contains(entity);
            let merged = self.merges.get(entity);

            if removed.is_empty() && added.is_empty() && !is_restored && merged.is_none() {
                continue;
            }
            for q in removed.iter().chain(added.iter()) {
                Self::reject_blank(&q.object)?;
                if subject_iri(q).is_none() {
                    return Err(MutationError::Validation {
                        message: format!("statement {q} has a blank subject"),
                    });
                }
            }

            let history = self.provenance.entity_provenance(entity)?;
            let last = latest(&history);
            let kind = if is_restored && last.is_some() {
                ChangeKind::Restoration
            } else if after.is_empty() {
                ChangeKind::Deletion
            } else if last.is_none() {
                ChangeKind::Creation
            } else if merged.is_some() {
                ChangeKind::Merge
            } else {
                ChangeKind::Modification
            };

            let mut generated = now.trunc_subsecs(6);
            if let Some((_, meta)) = last {
                if generated <= meta.generated_at {
                    generated = meta.generated_at + Duration::microseconds(1);
                }
            }

            let snapshot = NamedNode::new_unchecked(vocab::snapshot_iri(entity.as_str(), history.len() + 1));
            let graph = GraphName::NamedNode(NamedNode::new_unchecked(vocab::provenance_graph_iri(
                entity.as_str(),
            )));
            let mut push = |p: &NamedNode, o: Term| {
                prov_quads.push(Quad::new(snapshot.clone(), p.clone(), o, graph.clone()));
            };

            push(&rdf::TYPE.into(), Term::NamedNode(prov::ENTITY.into()));
            push(&prov::SPECIALIZATION_OF.into(), Term::NamedNode(entity.clone()));
            push(&prov::GENERATED_AT_TIME.into(), datetime_literal(generated).into());
            if kind == ChangeKind::Deletion {
                push(&prov::INVALIDATED_AT_TIME.into(), datetime_literal(generated).into());
            }
            if let Some(agent) = &self.settings.resp_agent {
                push(&prov::WAS_ATTRIBUTED_TO.into(), Term::NamedNode(agent.clone()));
            }
            let source = if is_restored {
                self.restoration_sources
                    .get(entity)
                    .or(self.settings.primary_source.as_ref())
            } else {
                self.settings.primary_source.as_ref()
            };
            if let Some(source) = source {
                push(&prov::HAD_PRIMARY_SOURCE.into(), Term::NamedNode(source.clone()));
            }
            if let Some((previous, _)) = last {
                push(&prov::WAS_DERIVED_FROM.into(), Term::NamedNode(previous.clone()));
            }
            let mut merged_names = Vec::new();
            if let Some(merged) = merged {
                for m in merged {
                    let merged_history = self.provenance.entity_provenance(m)?;
                    if let Some((m_last, _)) = latest(&merged_history) {
                        push(&prov::WAS_DERIVED_FROM.into(), Term::NamedNode(m_last.clone()));
                    }
                    merged_names.push(format!("'{}'", m.as_str()));
                }
            }
            if let Some(query) = sparql_update(&removed, &added) {
                push(&oc::HAS_UPDATE_QUERY.into(), Literal::new_simple_literal(query).into());
            }
            let description = match kind {
                ChangeKind::Creation => format!("The entity '{}' has been created.", entity.as_str()),
                ChangeKind::Modification => format!("The entity '{}' has been modified.", entity.as_str()),
                ChangeKind::Deletion => format!("The entity '{}' has been deleted.", entity.as_str()),
                ChangeKind::Restoration => format!("The entity '{}' has been restored.", entity.as_str()),
                ChangeKind::Merge => format!(
                    "The entity '{}' has been merged with {}.",
                    entity.as_str(),
                    merged_names.join(", ")
                ),
            };
            push(&dcterms::DESCRIPTION.into(), Literal::new_simple_literal(description).into());

            if let Some((previous, meta)) = last {
                if meta.invalidated_at.is_none() {
                    prov_quads.push(Quad::new(
                        previous.clone(),
                        NamedNode::from(prov::INVALIDATED_AT_TIME),
                        datetime_literal(generated),
                        graph.clone(),
                    ));
                }
            }

            data_removed.extend(removed);
            data_added.extend(added);
            snapshots.push(snapshot);
        }

        if let Some(update) = sparql_update(&data_removed, &data_added) {
            self.data.update(&update).map_err(|e| MutationError::Persistence {
                message: e.to_string(),
            })?;
        }
        if !prov_quads.is_empty() {
            let update = format!("INSERT DATA {{\n{}}}", sparql_data_block(&prov_quads));
            if let Err(e) = self.provenance.graph().update(&update) {
                if let Some(undo) = sparql_update(&data_added, &data_removed) {
                    if let Err(undo_err) = self.data.update(&undo) {
                        tracing::warn!(error = %undo_err, "failed to roll back data after provenance write error");
                    }
                }
                return Err(MutationError::Persistence {
                    message: e.to_string(),
                });
            }
        }

        tracing::info!(
            snapshots = snapshots.len(),
            removed = data_removed.len(),
            added = data_added.len(),
            "changes saved"
        );
        self.reset();
        Ok(snapshots)
    }

    fn reset(&mut self) {
        self.working.clear();
        self.baseline.clear();
        self.imported.clear();
        self.preexisting_finished = false;
        self.restored.clear();
        self.restoration_sources.clear();
        self.merges.clear();
    }
}

impl MutationLog for Editor<'_> {
    fn import_entity(&mut self, entity: &NamedNode) -> MutationResult<()> {
        if !self.imported.insert(entity.clone()) {
            return Ok(());
        }
        for quad in self.data.entity_state(entity)? {
            self.baseline.insert(quad.clone());
            self.working.insert(quad);
        }
        Ok(())
    }

    fn mark_preexisting_finished(&mut self) {
        self.preexisting_finished = true;
    }

    fn create(
        &mut self,
        subject: &NamedNode,
        predicate: &NamedNode,
        object: &Term,
        graph: Option<&NamedNode>,
    ) -> MutationResult<()> {
        Self::reject_empty(subject)?;
        Self::reject_empty(predicate)?;
        Self::reject_blank(object)?;
        self.import_entity(subject)?;
        let quad = Quad::new(
            subject.clone(),
            predicate.clone(),
            object.clone(),
            self.data.mode().graph_name(graph),
        );
        if !self.preexisting_finished {
            self.baseline.insert(quad.clone());
        }
        self.working.insert(quad);
        Ok(())
    }

    fn delete(
        &mut self,
        subject: &NamedNode,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        graph: Option<&NamedNode>,
    ) -> MutationResult<()> {
        if let Some(o) = object {
            Self::reject_blank(o)?;
        }
        self.import_entity(subject)?;

        let whole_entity = predicate.is_none() && object.is_none();
        let mut doomed: Vec<Quad> = self
            .working
            .scan(Some(subject), predicate, object)
            .into_iter()
            .filter(|q| self.graph_matches(q, graph))
            .collect();
        if whole_entity {
            self.import_referrers(subject)?;
            doomed.extend(
                self.working
                    .referrers(subject)
                    .into_iter()
                    .filter(|q| self.graph_matches(q, graph)),
            );
        }
        for q in &doomed {
            self.working.remove(q);
        }
        Ok(())
    }

    fn merge(&mut self, keep: &NamedNode, delete: &NamedNode) -> MutationResult<()> {
        self.import_entity(keep)?;
        self.import_entity(delete)?;
        self.import_referrers(delete)?;

        let target = Term::NamedNode(keep.clone());
        for q in self.working.referrers(delete) {
            self.working.remove(&q);
            if subject_iri(&q).as_ref() == Some(delete) {
                continue;
            }
            self.working.insert(Quad::new(
                q.subject.clone(),
                q.predicate.clone(),
                target.clone(),
                q.graph_name.clone(),
            ));
        }
        for q in self.working.scan(Some(delete), None, None) {
            self.working.remove(&q);
        }
        self.merges.entry(keep.clone()).or_default().push(delete.clone());
        Ok(())
    }

    fn working_set(&self) -> &WorkingSet {
        &self.working
    }

    fn mark_as_restored(&mut self, entity: &NamedNode) {
        self.restored.insert(entity.clone());
    }

    fn set_restoration_source(&mut self, entity: &NamedNode, snapshot: &NamedNode) {
        self.restoration_sources.insert(entity.clone(), snapshot.clone());
    }

    fn save(&mut self) -> MutationResult<Vec<NamedNode>> {
        self.save_at(Utc::now())
    }
}
