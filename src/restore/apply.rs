//! Push a restoration diff through a [`MutationLog`].

use std::collections::HashMap;

use oxigraph::model::{NamedNode, Quad};

use crate::error::RestoreResult;
use crate::graph::{Diff, graph_context, subject_iri};
use crate::mutation::MutationLog;

use super::RestorationTarget;

fn stamp_revival<L: MutationLog + ?Sized>(
    log: &mut L,
    quad: &Quad,
    targets: &HashMap<NamedNode, RestorationTarget>,
) {
    let Some(subject) = subject_iri(quad) else {
        return;
    };
    if let Some(target) = targets.get(&subject) {
        if target.needs_restore {
            log.mark_as_restored(&subject);
            log.set_restoration_source(&subject, &target.source_snapshot);
        }
    }
}

/// Apply `diff` and seal it with one `save()`.
///
/// `entities` is every entity with provenance in the restore; their current
/// state is imported first so deletes and creates run against a full baseline.
/// Revived entities carry their source snapshot as primary source. Returns the
/// snapshots the save produced.
pub fn apply_restoration<'e, L: MutationLog + ?Sized>(
    log: &mut L,
    diff: &Diff,
    targets: &HashMap<NamedNode, RestorationTarget>,
    main: &NamedNode,
    entities: impl IntoIterator<Item = &'e NamedNode>,
) -> RestoreResult<Vec<NamedNode>> {
    for entity in entities {
        log.import_entity(entity)?;
    }
    log.import_entity(main)?;
    log.mark_preexisting_finished();

    for quad in diff.deletions() {
        if let Some(subject) = subject_iri(&quad) {
            log.delete(
                &subject,
                Some(&quad.predicate),
                Some(&quad.object),
                graph_context(&quad),
            )?;
        }
        stamp_revival(log, &quad, targets);
    }

    for quad in diff.additions() {
        if let Some(subject) = subject_iri(&quad) {
            log.create(&subject, &quad.predicate, &quad.object, graph_context(&quad))?;
        }
        stamp_revival(log, &quad, targets);
    }

    // The main entity is revived whenever its latest snapshot is a deletion,
    // even if the diff touches none of its statements.
    let revived_main = targets.get(main).filter(|t| t.needs_restore);
    if let Some(target) = revived_main {
        log.mark_as_restored(main);
        log.set_restoration_source(main, &target.source_snapshot);
    }

    let snapshots = log.save()?;
    tracing::debug!(
        entity = %main,
        revived = revived_main.is_some(),
        snapshots = snapshots.len(),
        "restoration applied"
    );
    Ok(snapshots)
}
