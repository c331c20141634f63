//! Time-travel restore: bring an entity, and every entity whose links to it
//! changed since, back to the state they had at a given time.
//!
//! The pipeline is: history → snapshot selection → diff against the live
//! graph → affected entities → source snapshots → mutation log.

pub mod apply;
pub mod attribution;
pub mod planner;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use oxigraph::model::NamedNode;
use serde::Serialize;

use crate::error::{RestoreError, RestoreResult};
use crate::graph::{GraphState, GraphStore, diff};
use crate::mutation::MutationLog;
use crate::provenance::{HistoryAccessor, HistoryOptions, select_snapshot};

pub use apply::apply_restoration;
pub use attribution::{RestorationTarget, prepare_restoration_targets};
pub use planner::plan_affected_entities;

/// Summary of a completed restore.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub entity: String,
    pub source_snapshot: String,
    pub removed: usize,
    pub added: usize,
    pub affected: Vec<String>,
    pub revived: Vec<String>,
    pub snapshots: Vec<String>,
}

fn iris<'a>(items: impl IntoIterator<Item = &'a NamedNode>) -> Vec<String> {
    let mut out: Vec<String> = items.into_iter().map(|n| n.as_str().to_string()).collect();
    out.sort();
    out
}

/// Restore `entity` to its last live state at or before `at`.
///
/// Fails with [`RestoreError::EntityNotFound`] if the entity has no history
/// and [`RestoreError::NoSnapshotAtTime`] if it was not alive by `at`.
/// Neighbours that did not exist yet at `at` are left as they are.
pub fn restore_to_version<L: MutationLog + ?Sized>(
    log: &mut L,
    accessor: &HistoryAccessor<'_>,
    data: &GraphStore,
    options: HistoryOptions,
    entity: &NamedNode,
    at: DateTime<Utc>,
) -> RestoreResult<RestoreOutcome> {
    tracing::info!(entity = %entity, at = %at, "restoring entity");

    let history = accessor.get_history(entity, options)?;
    let main_provenance = history
        .provenance
        .get(entity)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| RestoreError::EntityNotFound {
            entity: entity.as_str().to_string(),
        })?;
    let source = select_snapshot(main_provenance, at).ok_or_else(|| RestoreError::NoSnapshotAtTime {
        entity: entity.as_str().to_string(),
        at: at.to_rfc3339(),
    })?;
    let source_time = main_provenance[&source].generated_at;

    let mut considered: Vec<&NamedNode> = vec![entity];
    considered.extend(
        history
            .entities()
            .into_iter()
            .filter(|e| *e != entity && history.existed_at(e, at)),
    );

    let mut current = GraphState::new();
    let mut historical = GraphState::new();
    for e in &considered {
        current.extend(data.entity_state(e)?);
        let when = if *e == entity { source_time } else { at };
        if let Some(state) = history.state_at(e, when) {
            historical.extend(state.iter().cloned());
        }
    }

    let diff = diff::diff(&current, &historical, data.mode());
    tracing::debug!(
        entity = %entity,
        to_delete = diff.to_delete.len(),
        to_add = diff.to_add.len(),
        "diff computed"
    );

    let affected = plan_affected_entities(&diff, entity);
    let targets = prepare_restoration_targets(&affected, &history.provenance, at);
    let revived: HashSet<&NamedNode> = targets
        .values()
        .filter(|t| t.needs_restore)
        .map(|t| &t.entity)
        .collect();

    let snapshots = apply_restoration(log, &diff, &targets, entity, considered.iter().copied())?;

    let outcome = RestoreOutcome {
        entity: entity.as_str().to_string(),
        source_snapshot: source.as_str().to_string(),
        removed: diff.to_delete.len(),
        added: diff.to_add.len(),
        affected: iris(affected.iter()),
        revived: iris(revived),
        snapshots: iris(snapshots.iter()),
    };
    tracing::info!(
        entity = %entity,
        source = %source,
        snapshots = outcome.snapshots.len(),
        "entity restored"
    );
    Ok(outcome)
}
