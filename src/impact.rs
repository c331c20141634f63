//! Deletion impact: which entities a delete would strand (orphans) and which
//! n-ary relation nodes would be left dangling (proxies).
//!
//! The resolver only reports; [`DeletionPolicy`] decides what happens to each
//! kind of candidate and [`cascade_delete`] carries the decision out.

use std::collections::HashSet;
use std::fmt;

use miette::Diagnostic;
use oxigraph::model::vocab::rdf;
use oxigraph::model::{NamedNode, Term};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::IntermediateRelations;
use crate::error::{GraphError, MutationError};
use crate::graph::{GraphResult, GraphStore, object_iri};
use crate::mutation::MutationLog;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from impact resolution and policy enforcement.
#[derive(Debug, Error, Diagnostic)]
pub enum ImpactError {
    #[error("deleting {kind}s requires confirmation: {}", .candidates.join(", "))]
    #[diagnostic(
        code(provtrail::impact::confirmation_required),
        help("Review the listed entities and repeat the deletion with confirmation, or change the policy to keep or delete.")
    )]
    ConfirmationRequired {
        kind: CandidateKind,
        candidates: Vec<String>,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Mutation(#[from] MutationError),
}

/// Result type for impact operations.
pub type ImpactResult<T> = std::result::Result<T, ImpactError>;

// ---------------------------------------------------------------------------
// Impact report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Orphan,
    Proxy,
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateKind::Orphan => write!(f, "orphan"),
            CandidateKind::Proxy => write!(f, "proxy"),
        }
    }
}

/// An entity reported by the resolver, with its declared types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub uri: String,
    pub types: Vec<String>,
}

impl EntityRef {
    pub fn iri(&self) -> NamedNode {
        NamedNode::new_unchecked(self.uri.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Impact {
    pub orphans: Vec<EntityRef>,
    pub proxies: Vec<EntityRef>,
}

impl Impact {
    pub fn is_empty(&self) -> bool {
        self.orphans.is_empty() && self.proxies.is_empty()
    }

    pub fn candidates(&self, kind: CandidateKind) -> &[EntityRef] {
        match kind {
            CandidateKind::Orphan => &self.orphans,
            CandidateKind::Proxy => &self.proxies,
        }
    }
}

/// Looks up orphans and proxies against the live graph.
pub struct ImpactResolver<'a> {
    store: &'a GraphStore,
    relations: &'a IntermediateRelations,
}

impl<'a> ImpactResolver<'a> {
    pub fn new(store: &'a GraphStore, relations: &'a IntermediateRelations) -> Self {
        Self { store, relations }
    }

    fn entity_ref(&self, entity: &NamedNode) -> GraphResult<EntityRef> {
        Ok(EntityRef {
            uri: entity.as_str().to_string(),
            types: self
                .store
                .types_of(entity)?
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
        })
    }

    /// IRIs linked to `entity` in either direction, `rdf:type` excluded.
    fn neighbours(&self, entity: &NamedNode) -> GraphResult<HashSet<NamedNode>> {
        let mut out = self.store.referenced_entities(entity)?;
        out.extend(self.store.referring_entities(entity)?);
        out.remove(entity);
        Ok(out)
    }

    fn has_intermediate_type(&self, entity: &NamedNode) -> GraphResult<bool> {
        Ok(self
            .store
            .types_of(entity)?
            .iter()
            .any(|t| self.relations.is_intermediate(t)))
    }

    /// Orphan test for one candidate once `subject`'s link to it is gone.
    fn is_orphan(&self, candidate: &NamedNode, subject: &NamedNode, whole_entity: bool) -> GraphResult<bool> {
        let mut referrers = self.store.referring_entities(candidate)?;
        referrers.remove(subject);
        referrers.remove(candidate);
        if !referrers.is_empty() {
            return Ok(false);
        }
        for target in self.store.referenced_entities(candidate)? {
            if target == *candidate || (whole_entity && target == *subject) {
                continue;
            }
            // Still feeding live data: a hub, not a dead end.
            if self.store.has_statements(&target)? {
                return Ok(false);
            }
        }
        Ok(!self.has_intermediate_type(candidate)?)
    }

    /// Report what deleting `(subject, predicate, object)` would strand.
    ///
    /// With neither `predicate` nor `object` the whole entity is being
    /// deleted. `entity_type` overrides the subject's declared types when
    /// choosing which intermediate classes apply.
    pub fn find_impact(
        &self,
        subject: &NamedNode,
        entity_type: Option<&NamedNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> GraphResult<Impact> {
        let whole_entity = predicate.is_none() && object.is_none();

        let mut candidates: Vec<NamedNode> = self
            .store
            .quads_matching(Some(subject), predicate, object, None)?
            .iter()
            .filter(|q| q.predicate.as_ref() != rdf::TYPE)
            .filter_map(|q| object_iri(q).cloned())
            .filter(|o| o != subject)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        candidates.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        let mut impact = Impact::default();
        for candidate in &candidates {
            if self.is_orphan(candidate, subject, whole_entity)? {
                impact.orphans.push(self.entity_ref(candidate)?);
            }
        }

        let subject_types = match entity_type {
            Some(t) => vec![t.clone()],
            None => self.store.types_of(subject)?,
        };
        let is_proxy = |entity: &NamedNode| -> GraphResult<bool> {
            Ok(self
                .store
                .types_of(entity)?
                .iter()
                .any(|t| self.relations.is_intermediate_for(&subject_types, t)))
        };

        let removed_target = object.and_then(|o| match o {
            Term::NamedNode(n) => Some(n),
            _ => None,
        });
        let mut proxies: Vec<NamedNode> = Vec::new();
        let mut pool: Vec<NamedNode> = self.neighbours(subject)?.into_iter().collect();
        if let Some(target) = removed_target {
            pool.push(target.clone());
        }
        let mut seen = HashSet::new();
        for candidate in pool {
            if !seen.insert(candidate.clone()) || !is_proxy(&candidate)? {
                continue;
            }
            let between = match (whole_entity, removed_target) {
                (true, _) => true,
                (false, Some(target)) => {
                    candidate == *target || self.neighbours(&candidate)?.contains(target)
                }
                // A predicate alone: the proxies hanging off that predicate.
                (false, None) => candidates.contains(&candidate),
            };
            if between {
                proxies.push(candidate);
            }
        }
        proxies.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        for proxy in &proxies {
            impact.proxies.push(self.entity_ref(proxy)?);
        }

        tracing::debug!(
            entity = %subject,
            orphans = impact.orphans.len(),
            proxies = impact.proxies.len(),
            "deletion impact resolved"
        );
        Ok(impact)
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What to do with one kind of deletion candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionPolicy {
    /// Never delete automatically.
    Keep,
    /// Delete without asking.
    Delete,
    /// Delete only once the caller confirms.
    #[default]
    Ask,
}

impl DeletionPolicy {
    /// Entities to delete under this policy.
    pub fn approve(
        self,
        kind: CandidateKind,
        candidates: &[EntityRef],
        confirmed: bool,
    ) -> ImpactResult<Vec<NamedNode>> {
        match self {
            DeletionPolicy::Keep => Ok(Vec::new()),
            DeletionPolicy::Delete => Ok(candidates.iter().map(EntityRef::iri).collect()),
            DeletionPolicy::Ask if candidates.is_empty() || confirmed => {
                Ok(candidates.iter().map(EntityRef::iri).collect())
            }
            DeletionPolicy::Ask => Err(ImpactError::ConfirmationRequired {
                kind,
                candidates: candidates.iter().map(|c| c.uri.clone()).collect(),
            }),
        }
    }
}

/// Delete each target entity once. `deleted` carries the entities already
/// removed in this session; returns how many were newly deleted.
pub fn cascade_delete<'t, L: MutationLog + ?Sized>(
    log: &mut L,
    targets: impl IntoIterator<Item = &'t NamedNode>,
    deleted: &mut HashSet<NamedNode>,
) -> ImpactResult<usize> {
    let mut count = 0;
    for target in targets {
        if deleted.contains(target) {
            continue;
        }
        log.delete(target, None, None, None)?;
        deleted.insert(target.clone());
        count += 1;
        tracing::info!(entity = %target, "entity deleted");
    }
    Ok(count)
}
