//! End-to-end restore scenarios driven through the curator facade.
//!
//! Setup edits run through an editor with explicit clock readings so the
//! timeline is deterministic; the restores themselves save at wall-clock time.
//! Each setup session seals its baseline first so later creates count as edits.

use chrono::{DateTime, TimeZone, Utc};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{Literal, NamedNode, Term};

use provtrail::config::TrailConfig;
use provtrail::curator::Curator;
use provtrail::error::{RestoreError, TrailError};
use provtrail::mutation::MutationLog;

fn iri(s: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("https://example.org/{s}"))
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
}

fn title(value: &str) -> Term {
    Literal::new_simple_literal(value).into()
}

fn curator() -> Curator {
    Curator::in_memory(TrailConfig::default()).unwrap()
}

/// br/1 created as "Alpha" at 01:00, renamed "Beta" at 02:00, deleted at 03:00.
fn alpha_beta_deleted(curator: &Curator) {
    let mut editor = curator.editor();
    editor.mark_preexisting_finished();
    editor
        .create(&iri("br/1"), &rdf::TYPE.into(), &Term::NamedNode(iri("Book")), None)
        .unwrap();
    editor.create(&iri("br/1"), &iri("title"), &title("Alpha"), None).unwrap();
    editor.save_at(at(1, 0)).unwrap();

    let mut editor = curator.editor();
    editor.mark_preexisting_finished();
    editor
        .update(&iri("br/1"), &iri("title"), &title("Alpha"), &title("Beta"), None)
        .unwrap();
    editor.save_at(at(2, 0)).unwrap();

    let mut editor = curator.editor();
    editor.mark_preexisting_finished();
    editor.delete(&iri("br/1"), None, None, None).unwrap();
    editor.save_at(at(3, 0)).unwrap();
}

#[test]
fn deleted_entity_comes_back_with_its_first_state() {
    let curator = curator();
    alpha_beta_deleted(&curator);
    assert!(!curator.data().has_statements(&iri("br/1")).unwrap());

    let outcome = curator.restore(&iri("br/1"), at(1, 30)).unwrap();
    assert_eq!(outcome.source_snapshot, "https://example.org/br/1/prov/se/1");
    assert_eq!(outcome.added, 2);
    assert_eq!(outcome.removed, 0);
    assert_eq!(outcome.revived, vec!["https://example.org/br/1".to_string()]);
    assert_eq!(outcome.snapshots, vec!["https://example.org/br/1/prov/se/4".to_string()]);

    let state = curator.data().entity_state(&iri("br/1")).unwrap();
    assert_eq!(state.len(), 2);
    assert!(state.iter().any(|q| q.object == title("Alpha")));

    let restored = curator
        .provenance()
        .snapshot(&iri("br/1/prov/se/4"))
        .unwrap();
    assert_eq!(
        restored.primary_source.as_deref(),
        Some("https://example.org/br/1/prov/se/1")
    );
    assert_eq!(restored.derived_from, vec!["https://example.org/br/1/prov/se/3".to_string()]);
    assert!(!restored.is_deletion());
    assert!(restored.description.unwrap().contains("restored"));
}

#[test]
fn restoring_after_deletion_uses_last_live_state() {
    let curator = curator();
    alpha_beta_deleted(&curator);

    let outcome = curator.restore(&iri("br/1"), at(5, 0)).unwrap();
    assert_eq!(outcome.source_snapshot, "https://example.org/br/1/prov/se/2");
    let state = curator.data().entity_state(&iri("br/1")).unwrap();
    assert!(state.iter().any(|q| q.object == title("Beta")));
}

#[test]
fn live_entity_is_reverted_without_revival() {
    let curator = curator();
    let mut editor = curator.editor();
    editor.mark_preexisting_finished();
    editor.create(&iri("br/1"), &iri("title"), &title("Alpha"), None).unwrap();
    editor.save_at(at(1, 0)).unwrap();
    let mut editor = curator.editor();
    editor.mark_preexisting_finished();
    editor
        .update(&iri("br/1"), &iri("title"), &title("Alpha"), &title("Beta"), None)
        .unwrap();
    editor.save_at(at(2, 0)).unwrap();

    let outcome = curator.restore(&iri("br/1"), at(1, 0)).unwrap();
    assert_eq!((outcome.removed, outcome.added), (1, 1));
    assert!(outcome.revived.is_empty());

    let snapshot = curator
        .provenance()
        .snapshot(&NamedNode::new_unchecked(&outcome.snapshots[0]))
        .unwrap();
    assert!(snapshot.primary_source.is_none());
    let query = snapshot.update_query.unwrap();
    assert!(query.contains("DELETE DATA") && query.contains("\"Beta\""));
    assert!(query.contains("INSERT DATA") && query.contains("\"Alpha\""));
}

#[test]
fn referencing_entity_gets_its_link_back() {
    let curator = curator();
    let mut editor = curator.editor();
    editor.mark_preexisting_finished();
    editor.create(&iri("br/1"), &iri("title"), &title("Alpha"), None).unwrap();
    editor.create(&iri("ar/1"), &iri("name"), &title("Ada"), None).unwrap();
    editor
        .create(&iri("ar/1"), &iri("isAuthorOf"), &Term::NamedNode(iri("br/1")), None)
        .unwrap();
    editor.save_at(at(1, 0)).unwrap();

    // Deleting br/1 strips the reference held by ar/1.
    let mut editor = curator.editor();
    editor.mark_preexisting_finished();
    editor.delete(&iri("br/1"), None, None, None).unwrap();
    editor.save_at(at(2, 0)).unwrap();
    assert_eq!(curator.data().entity_state(&iri("ar/1")).unwrap().len(), 1);

    let outcome = curator.restore(&iri("br/1"), at(1, 30)).unwrap();
    assert_eq!(
        outcome.affected,
        vec!["https://example.org/ar/1".to_string(), "https://example.org/br/1".to_string()]
    );
    assert_eq!(outcome.revived, vec!["https://example.org/br/1".to_string()]);
    assert_eq!(curator.data().entity_state(&iri("ar/1")).unwrap().len(), 2);
    assert_eq!(curator.data().entity_state(&iri("br/1")).unwrap().len(), 1);

    // ar/1 was modified, not revived: no restoration source on its snapshot.
    let ar = curator.provenance().snapshot(&iri("ar/1/prov/se/3")).unwrap();
    assert!(ar.primary_source.is_none());
}

#[test]
fn entities_born_after_target_are_left_alone() {
    let curator = curator();
    let mut editor = curator.editor();
    editor.mark_preexisting_finished();
    editor.create(&iri("br/1"), &iri("title"), &title("Alpha"), None).unwrap();
    editor.save_at(at(1, 0)).unwrap();

    let mut editor = curator.editor();
    editor.mark_preexisting_finished();
    editor
        .create(&iri("br/2"), &iri("cites"), &Term::NamedNode(iri("br/1")), None)
        .unwrap();
    editor.save_at(at(2, 0)).unwrap();

    let outcome = curator.restore(&iri("br/1"), at(1, 30)).unwrap();
    assert!(outcome.snapshots.is_empty());
    assert!(curator.data().has_statements(&iri("br/2")).unwrap());
}

#[test]
fn restoring_before_creation_fails() {
    let curator = curator();
    alpha_beta_deleted(&curator);
    let err = curator.restore(&iri("br/1"), at(0, 30)).unwrap_err();
    assert!(matches!(err, TrailError::Restore(RestoreError::NoSnapshotAtTime { .. })));
}

#[test]
fn unknown_entity_is_not_found() {
    let curator = curator();
    let err = curator.restore(&iri("br/404"), at(1, 0)).unwrap_err();
    assert!(matches!(err, TrailError::Restore(RestoreError::EntityNotFound { .. })));
}

#[test]
fn history_replays_every_state() {
    let curator = curator();
    alpha_beta_deleted(&curator);
    let history = curator.history(&iri("br/1")).unwrap();

    assert_eq!(history.state_at(&iri("br/1"), at(1, 0)).unwrap().len(), 2);
    assert!(
        history
            .state_at(&iri("br/1"), at(2, 30))
            .unwrap()
            .iter()
            .any(|q| q.object == title("Beta"))
    );
    assert!(history.state_at(&iri("br/1"), at(3, 0)).unwrap().is_empty());
    assert!(history.state_at(&iri("br/1"), at(0, 0)).is_none());
}
