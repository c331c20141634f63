//! Deletion flows: impact reporting, policies and restoring what a cascade
//! removed.

use chrono::{TimeZone, Utc};
use oxigraph::model::{NamedNode, Term};

use provtrail::config::TrailConfig;
use provtrail::curator::Curator;
use provtrail::error::TrailError;
use provtrail::impact::{CandidateKind, DeletionPolicy, ImpactError};

fn iri(s: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("https://example.org/{s}"))
}

/// Document D has a contributor role R held by person P.
const ROLES: &str = "\
<https://example.org/D> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://purl.org/spar/fabio/Expression> .
<https://example.org/D> <http://purl.org/dc/terms/title> \"On Computable Numbers\" .
<https://example.org/D> <http://purl.org/spar/pro/isDocumentContextFor> <https://example.org/R> .
<https://example.org/R> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://purl.org/spar/pro/RoleInTime> .
<https://example.org/R> <http://purl.org/spar/pro/isHeldBy> <https://example.org/P> .
<https://example.org/P> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://xmlns.com/foaf/0.1/Agent> .
<https://example.org/P> <http://xmlns.com/foaf/0.1/name> \"Alan Turing\" .
";

const CONFIG: &str = r#"
[deletion]
orphans = "ask"
proxies = "delete"

[[intermediate_relations]]
subject_class = "http://purl.org/spar/fabio/Expression"
intermediate_class = "http://purl.org/spar/pro/RoleInTime"
"#;

fn curator_with(config: &str) -> Curator {
    let config = TrailConfig::from_toml(config, "test").unwrap();
    let curator = Curator::in_memory(config).unwrap();
    curator
        .load_nquads_at(ROLES, Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap())
        .unwrap();
    curator
}

#[test]
fn role_is_reported_as_proxy() {
    let curator = curator_with(CONFIG);
    let impact = curator.impact(&iri("D"), None, None).unwrap();
    let proxies: Vec<&str> = impact.proxies.iter().map(|p| p.uri.as_str()).collect();
    assert_eq!(proxies, vec!["https://example.org/R"]);
    assert!(impact.orphans.is_empty());
}

#[test]
fn proxies_are_deleted_with_their_document() {
    let curator = curator_with(CONFIG);
    let outcome = curator.delete_entity(&iri("D"), false).unwrap();
    assert_eq!(
        outcome.deleted,
        vec!["https://example.org/D".to_string(), "https://example.org/R".to_string()]
    );
    assert!(!curator.data().has_statements(&iri("R")).unwrap());
    assert_eq!(curator.data().entity_state(&iri("P")).unwrap().len(), 2);
}

#[test]
fn ask_policy_on_proxies_needs_confirmation() {
    let curator = curator_with(&CONFIG.replace("proxies = \"delete\"", "proxies = \"ask\""));
    let err = curator.delete_entity(&iri("D"), false).unwrap_err();
    match err {
        TrailError::Impact(ImpactError::ConfirmationRequired { kind, candidates }) => {
            assert_eq!(kind, CandidateKind::Proxy);
            assert_eq!(candidates, vec!["https://example.org/R".to_string()]);
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(curator.data().has_statements(&iri("D")).unwrap());
}

#[test]
fn statement_delete_strands_dead_end_orphan() {
    let curator = curator_with(CONFIG);
    let held_by = iri("held");
    curator
        .load_nquads(
            "<https://example.org/P> <https://example.org/held> <https://example.org/award/1> .\n\
             <https://example.org/award/1> <https://example.org/label> \"Smith's Prize\" .\n",
        )
        .unwrap();

    let award = Term::NamedNode(iri("award/1"));
    let impact = curator.impact(&iri("P"), Some(&held_by), Some(&award)).unwrap();
    assert_eq!(impact.orphans.len(), 1);
    assert_eq!(impact.orphans[0].uri, "https://example.org/award/1");

    let outcome = curator
        .delete_statement(&iri("P"), &held_by, Some(&award), true)
        .unwrap();
    assert_eq!(outcome.deleted, vec!["https://example.org/award/1".to_string()]);
    assert!(!curator.data().has_statements(&iri("award/1")).unwrap());
    assert_eq!(curator.data().entity_state(&iri("P")).unwrap().len(), 2);
}

#[test]
fn restore_brings_back_cascaded_proxy() {
    let curator = curator_with(CONFIG);
    let before = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
    curator.delete_entity(&iri("D"), false).unwrap();

    let outcome = curator.restore(&iri("D"), before).unwrap();
    assert_eq!(
        outcome.revived,
        vec!["https://example.org/D".to_string(), "https://example.org/R".to_string()]
    );
    assert_eq!(curator.data().entity_state(&iri("D")).unwrap().len(), 3);
    assert_eq!(curator.data().entity_state(&iri("R")).unwrap().len(), 2);

    let r = curator.snapshots(&iri("R")).unwrap();
    assert_eq!(r.len(), 3);
    assert_eq!(
        r[2].meta.primary_source.as_deref(),
        Some("https://example.org/R/prov/se/1")
    );
}

#[test]
fn keep_policy_for_proxies_leaves_role_dangling() {
    let mut config = TrailConfig::from_toml(CONFIG, "test").unwrap();
    config.deletion.proxies = DeletionPolicy::Keep;
    let curator = Curator::in_memory(config).unwrap();
    curator.load_nquads(ROLES).unwrap();

    let outcome = curator.delete_entity(&iri("D"), false).unwrap();
    assert_eq!(outcome.deleted, vec!["https://example.org/D".to_string()]);
    assert!(curator.data().has_statements(&iri("R")).unwrap());
}
