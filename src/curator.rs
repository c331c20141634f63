//! Curator facade: top-level API for provtrail.
//!
//! The `Curator` owns the data store, the provenance store and the
//! configuration, and exposes the user-level actions: load, inspect history,
//! restore to a point in time, delete with impact policies, and maintain
//! ordered properties.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use chrono::{DateTime, Utc};
use oxigraph::model::{NamedNode, Term};
use serde::Serialize;

use crate::chain::{self, OrderedChain};
use crate::config::{IntermediateRelations, TrailConfig};
use crate::error::{MutationError, TrailResult};
use crate::graph::{GraphStore, StoreMode, graph_context, object_iri, subject_iri};
use crate::impact::{CandidateKind, Impact, ImpactResolver, cascade_delete};
use crate::mutation::{Editor, EditorSettings, MutationLog};
use crate::provenance::{EntityHistory, HistoryAccessor, ProvenanceStore, SnapshotMeta, chronological};
use crate::restore::{RestoreOutcome, restore_to_version};

/// Result of a delete request.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionOutcome {
    pub impact: Impact,
    pub deleted: Vec<String>,
    pub snapshots: Vec<String>,
}

/// One snapshot of an entity, as listed by [`Curator::snapshots`].
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEntry {
    pub snapshot: String,
    #[serde(flatten)]
    pub meta: SnapshotMeta,
}

/// Owns both stores and applies the configured policies.
pub struct Curator {
    config: TrailConfig,
    settings: EditorSettings,
    relations: IntermediateRelations,
    data: GraphStore,
    provenance: ProvenanceStore,
}

impl Curator {
    /// Memory-only curator.
    pub fn in_memory(config: TrailConfig) -> TrailResult<Self> {
        let data = GraphStore::in_memory(config.store_mode())?;
        let provenance = ProvenanceStore::new(GraphStore::in_memory(StoreMode::Quads)?);
        Self::from_stores(config, data, provenance)
    }

    /// Curator persisting under `dir` (`dir/data` and `dir/prov`).
    pub fn open(dir: &Path, config: TrailConfig) -> TrailResult<Self> {
        let data = GraphStore::open(&dir.join("data"), config.store_mode())?;
        let provenance = ProvenanceStore::new(GraphStore::open(&dir.join("prov"), StoreMode::Quads)?);
        Self::from_stores(config, data, provenance)
    }

    fn from_stores(config: TrailConfig, data: GraphStore, provenance: ProvenanceStore) -> TrailResult<Self> {
        let settings = config.editor_settings()?;
        let relations = config.intermediate_relations()?;
        tracing::info!(
            mode = ?data.mode(),
            resp_agent = ?settings.resp_agent.as_ref().map(NamedNode::as_str),
            "curator ready"
        );
        Ok(Self {
            config,
            settings,
            relations,
            data,
            provenance,
        })
    }

    pub fn config(&self) -> &TrailConfig {
        &self.config
    }

    pub fn data(&self) -> &GraphStore {
        &self.data
    }

    pub fn provenance(&self) -> &ProvenanceStore {
        &self.provenance
    }

    /// A fresh editing session over both stores.
    pub fn editor(&self) -> Editor<'_> {
        Editor::new(&self.data, &self.provenance, self.settings.clone())
    }

    /// Ingest N-Quads as new statements, one creation or modification
    /// snapshot per subject.
    pub fn load_nquads(&self, text: &str) -> TrailResult<Vec<NamedNode>> {
        self.load_nquads_at(text, Utc::now())
    }

    pub fn load_nquads_at(&self, text: &str, now: DateTime<Utc>) -> TrailResult<Vec<NamedNode>> {
        let quads = GraphStore::parse_nquads(text)?;
        let mut editor = self.editor();
        editor.mark_preexisting_finished();
        for quad in &quads {
            let Some(subject) = subject_iri(quad) else {
                return Err(MutationError::Validation {
                    message: format!("statement {quad} has a blank subject"),
                }
                .into());
            };
            editor.create(&subject, &quad.predicate, &quad.object, graph_context(quad))?;
        }
        let snapshots = editor.save_at(now)?;
        tracing::info!(statements = quads.len(), snapshots = snapshots.len(), "N-Quads loaded");
        Ok(snapshots)
    }

    /// States and provenance of `entity` and its neighbours.
    pub fn history(&self, entity: &NamedNode) -> TrailResult<EntityHistory> {
        let accessor = HistoryAccessor::new(&self.data, &self.provenance);
        Ok(accessor.get_history(entity, self.config.history)?)
    }

    /// Snapshots of `entity`, oldest first.
    pub fn snapshots(&self, entity: &NamedNode) -> TrailResult<Vec<SnapshotEntry>> {
        let provenance = self.provenance.entity_provenance(entity)?;
        Ok(chronological(&provenance)
            .into_iter()
            .map(|(iri, meta)| SnapshotEntry {
                snapshot: iri.as_str().to_string(),
                meta: meta.clone(),
            })
            .collect())
    }

    /// Bring `entity` and its affected neighbours back to their state at `at`.
    pub fn restore(&self, entity: &NamedNode, at: DateTime<Utc>) -> TrailResult<RestoreOutcome> {
        let accessor = HistoryAccessor::new(&self.data, &self.provenance);
        let mut editor = self.editor();
        Ok(restore_to_version(
            &mut editor,
            &accessor,
            &self.data,
            self.config.history,
            entity,
            at,
        )?)
    }

    /// Orphans and proxies a delete would leave behind.
    pub fn impact(
        &self,
        subject: &NamedNode,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> TrailResult<Impact> {
        let resolver = ImpactResolver::new(&self.data, &self.relations);
        Ok(resolver.find_impact(subject, None, predicate, object)?)
    }

    /// Delete a whole entity and whatever the deletion policies approve.
    pub fn delete_entity(&self, entity: &NamedNode, confirmed: bool) -> TrailResult<DeletionOutcome> {
        self.delete_with_policies(entity, None, None, confirmed)
    }

    /// Delete one statement (or every value of `predicate` when `object` is
    /// `None`) and whatever the deletion policies approve.
    pub fn delete_statement(
        &self,
        subject: &NamedNode,
        predicate: &NamedNode,
        object: Option<&Term>,
        confirmed: bool,
    ) -> TrailResult<DeletionOutcome> {
        self.delete_with_policies(subject, Some(predicate), object, confirmed)
    }

    fn delete_with_policies(
        &self,
        subject: &NamedNode,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        confirmed: bool,
    ) -> TrailResult<DeletionOutcome> {
        let impact = self.impact(subject, predicate, object)?;
        let policies = self.config.deletion;
        let proxies = policies
            .proxies
            .approve(CandidateKind::Proxy, &impact.proxies, confirmed)?;
        let orphans = policies
            .orphans
            .approve(CandidateKind::Orphan, &impact.orphans, confirmed)?;

        let mut editor = self.editor();
        let mut deleted = HashSet::new();
        if predicate.is_none() && object.is_none() {
            cascade_delete(&mut editor, [subject], &mut deleted)?;
        } else {
            editor.delete(subject, predicate, object, None)?;
        }
        cascade_delete(&mut editor, proxies.iter().chain(orphans.iter()), &mut deleted)?;
        let snapshots = editor.save()?;

        let mut deleted: Vec<String> = deleted.iter().map(|n| n.as_str().to_string()).collect();
        deleted.sort();
        tracing::info!(
            entity = %subject,
            deleted = deleted.len(),
            snapshots = snapshots.len(),
            "deletion saved"
        );
        Ok(DeletionOutcome {
            impact,
            deleted,
            snapshots: snapshots.iter().map(|s| s.as_str().to_string()).collect(),
        })
    }

    /// Every value connected to `seeds` through `ordering_predicate` links,
    /// in either direction. Seeds without any such link are left out.
    fn chain_members(&self, ordering_predicate: &NamedNode, seeds: &[NamedNode]) -> TrailResult<Vec<NamedNode>> {
        let mut visited: HashSet<NamedNode> = HashSet::new();
        let mut queue: VecDeque<NamedNode> = seeds.iter().cloned().collect();
        while let Some(node) = queue.pop_front() {
            if visited.contains(&node) {
                continue;
            }
            let mut neighbours: Vec<NamedNode> = Vec::new();
            for q in self
                .data
                .quads_matching(Some(&node), Some(ordering_predicate), None, None)?
            {
                if let Some(next) = object_iri(&q) {
                    neighbours.push(next.clone());
                }
            }
            let term = Term::NamedNode(node.clone());
            for q in self
                .data
                .quads_matching(None, Some(ordering_predicate), Some(&term), None)?
            {
                if let Some(previous) = subject_iri(&q) {
                    neighbours.push(previous);
                }
            }
            if neighbours.is_empty() {
                continue;
            }
            visited.insert(node);
            queue.extend(neighbours);
        }
        let mut members: Vec<NamedNode> = visited.into_iter().collect();
        members.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(members)
    }

    /// Put the values of an ordered property in `new_order`.
    ///
    /// `new_order` must list exactly the values of the existing chain.
    pub fn reorder(
        &self,
        ordering_predicate: &NamedNode,
        new_order: Vec<NamedNode>,
        graph: Option<&NamedNode>,
    ) -> TrailResult<OrderedChain> {
        let current = self.chain_members(ordering_predicate, &new_order)?;
        let mut editor = self.editor();
        let chain = chain::reorder(&mut editor, ordering_predicate, &current, new_order, graph)?;
        editor.save()?;
        Ok(chain)
    }

    /// Link `owner` to each of `values` through `property` and order them
    /// with `ordering_predicate`.
    pub fn link_ordered(
        &self,
        owner: &NamedNode,
        property: &NamedNode,
        ordering_predicate: &NamedNode,
        values: Vec<NamedNode>,
        graph: Option<&NamedNode>,
    ) -> TrailResult<OrderedChain> {
        let chain = OrderedChain::new(values)?;
        let mut editor = self.editor();
        editor.import_entity(owner)?;
        editor.mark_preexisting_finished();
        for value in chain.members() {
            let object = Term::NamedNode(value.clone());
            if editor
                .working_set()
                .scan(Some(owner), Some(property), Some(&object))
                .is_empty()
            {
                editor.create(owner, property, &object, graph)?;
            }
        }
        chain::rebuild_chain(&mut editor, ordering_predicate, &chain, graph)?;
        editor.save()?;
        Ok(chain)
    }

    /// Fold `duplicate` into `keep`.
    pub fn merge(&self, keep: &NamedNode, duplicate: &NamedNode) -> TrailResult<Vec<NamedNode>> {
        let mut editor = self.editor();
        editor.merge(keep, duplicate)?;
        Ok(editor.save()?)
    }

    /// Run a SPARQL SELECT against the data store.
    pub fn query(&self, sparql: &str) -> TrailResult<Vec<Vec<(String, Term)>>> {
        Ok(self.data.query_select(sparql)?)
    }
}

impl std::fmt::Debug for Curator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Curator")
            .field("data", &self.data)
            .field("relations", &self.relations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainError;
    use crate::error::TrailError;
    use crate::impact::{DeletionPolicy, ImpactError};
    use chrono::TimeZone;

    fn iri(s: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("https://example.org/{s}"))
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    const AUTHORS: &str = r#"
<https://example.org/br/1> <https://example.org/hasAuthor> <https://example.org/ar/1> .
<https://example.org/br/1> <https://example.org/hasAuthor> <https://example.org/ar/2> .
<https://example.org/br/1> <https://example.org/hasAuthor> <https://example.org/ar/3> .
<https://example.org/ar/1> <https://example.org/next> <https://example.org/ar/2> .
<https://example.org/ar/2> <https://example.org/next> <https://example.org/ar/3> .
<https://example.org/ar/1> <https://example.org/name> "one" .
<https://example.org/ar/2> <https://example.org/name> "two" .
<https://example.org/ar/3> <https://example.org/name> "three" .
"#;

    #[test]
    fn load_creates_one_snapshot_per_subject() {
        let curator = Curator::in_memory(TrailConfig::default()).unwrap();
        let snaps = curator.load_nquads_at(AUTHORS, at(1)).unwrap();
        assert_eq!(snaps.len(), 4);
        assert_eq!(curator.data().len().unwrap(), 8);
        let listed = curator.snapshots(&iri("ar/1")).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].meta.generated_at, at(1));
    }

    #[test]
    fn blank_subjects_are_rejected_on_load() {
        let curator = Curator::in_memory(TrailConfig::default()).unwrap();
        let err = curator
            .load_nquads("_:b0 <https://example.org/p> \"x\" .\n")
            .unwrap_err();
        assert!(matches!(err, TrailError::Mutation(MutationError::Validation { .. })));
        assert!(curator.data().is_empty().unwrap());
    }

    #[test]
    fn reorder_rewrites_links_only() {
        let curator = Curator::in_memory(TrailConfig::default()).unwrap();
        curator.load_nquads_at(AUTHORS, at(1)).unwrap();

        let chain = curator
            .reorder(&iri("next"), vec![iri("ar/3"), iri("ar/1"), iri("ar/2")], None)
            .unwrap();
        assert_eq!(chain.len(), 3);
        let next = Term::NamedNode(iri("ar/1"));
        assert_eq!(
            curator
                .data()
                .quads_matching(Some(&iri("ar/3")), Some(&iri("next")), Some(&next), None)
                .unwrap()
                .len(),
            1
        );
        assert!(
            curator
                .data()
                .quads_matching(Some(&iri("ar/2")), Some(&iri("next")), None, None)
                .unwrap()
                .is_empty()
        );
        // Names untouched, same IRIs.
        assert_eq!(curator.data().len().unwrap(), 8);
    }

    #[test]
    fn reorder_must_mention_every_member() {
        let curator = Curator::in_memory(TrailConfig::default()).unwrap();
        curator.load_nquads_at(AUTHORS, at(1)).unwrap();
        let err = curator
            .reorder(&iri("next"), vec![iri("ar/2"), iri("ar/1")], None)
            .unwrap_err();
        assert!(matches!(err, TrailError::Chain(ChainError::MembershipMismatch { .. })));
    }

    #[test]
    fn reorder_rejects_values_outside_the_chain() {
        let curator = Curator::in_memory(TrailConfig::default()).unwrap();
        curator.load_nquads_at(AUTHORS, at(1)).unwrap();
        let err = curator
            .reorder(
                &iri("next"),
                vec![iri("ar/3"), iri("ar/1"), iri("ar/2"), iri("ar/9")],
                None,
            )
            .unwrap_err();
        match err {
            TrailError::Chain(ChainError::MembershipMismatch { message }) => {
                assert!(message.contains("unknown [https://example.org/ar/9]"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            curator
                .data()
                .quads_matching(Some(&iri("ar/1")), Some(&iri("next")), None, None)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn link_ordered_builds_owner_links_and_chain() {
        let curator = Curator::in_memory(TrailConfig::default()).unwrap();
        let chain = curator
            .link_ordered(
                &iri("br/9"),
                &iri("hasAuthor"),
                &iri("next"),
                vec![iri("ar/7"), iri("ar/8")],
                None,
            )
            .unwrap();
        assert_eq!(chain.members(), &[iri("ar/7"), iri("ar/8")]);
        assert_eq!(curator.data().len().unwrap(), 3);
        assert_eq!(curator.snapshots(&iri("br/9")).unwrap().len(), 1);
    }

    #[test]
    fn ask_policy_requires_confirmation() {
        let mut config = TrailConfig::default();
        config.deletion.orphans = DeletionPolicy::Ask;
        let curator = Curator::in_memory(config).unwrap();
        curator
            .load_nquads_at(
                "<https://example.org/a> <https://example.org/links> <https://example.org/b> .\n\
                 <https://example.org/b> <https://example.org/name> \"B\" .\n",
                at(1),
            )
            .unwrap();

        let err = curator.delete_entity(&iri("a"), false).unwrap_err();
        assert!(matches!(
            err,
            TrailError::Impact(ImpactError::ConfirmationRequired {
                kind: CandidateKind::Orphan,
                ..
            })
        ));
        assert_eq!(curator.data().len().unwrap(), 2);

        let outcome = curator.delete_entity(&iri("a"), true).unwrap();
        assert_eq!(
            outcome.deleted,
            vec!["https://example.org/a".to_string(), "https://example.org/b".to_string()]
        );
        assert!(curator.data().is_empty().unwrap());
    }

    #[test]
    fn keep_policy_leaves_orphans() {
        let mut config = TrailConfig::default();
        config.deletion.orphans = DeletionPolicy::Keep;
        let curator = Curator::in_memory(config).unwrap();
        curator
            .load_nquads_at(
                "<https://example.org/a> <https://example.org/links> <https://example.org/b> .\n\
                 <https://example.org/b> <https://example.org/name> \"B\" .\n",
                at(1),
            )
            .unwrap();
        let object = Term::NamedNode(iri("b"));
        let outcome = curator
            .delete_statement(&iri("a"), &iri("links"), Some(&object), false)
            .unwrap();
        assert_eq!(outcome.impact.orphans.len(), 1);
        assert!(outcome.deleted.is_empty());
        assert!(curator.data().has_statements(&iri("b")).unwrap());
        assert!(!curator.data().has_statements(&iri("a")).unwrap());
    }
}
