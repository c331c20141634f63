//! IRIs of the vocabularies used by snapshots and by the curated data.

use oxigraph::model::NamedNodeRef;

pub const PROV_NS: &str = "http://www.w3.org/ns/prov#";
pub const OC_NS: &str = "https://w3id.org/oc/ontology/";
pub const DCTERMS_NS: &str = "http://purl.org/dc/terms/";

/// W3C PROV-O terms.
pub mod prov {
    use super::NamedNodeRef;

    pub const ENTITY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#Entity");
    pub const SPECIALIZATION_OF: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#specializationOf");
    pub const GENERATED_AT_TIME: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#generatedAtTime");
    pub const INVALIDATED_AT_TIME: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#invalidatedAtTime");
    pub const WAS_ATTRIBUTED_TO: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#wasAttributedTo");
    pub const HAD_PRIMARY_SOURCE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#hadPrimarySource");
    pub const WAS_DERIVED_FROM: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#wasDerivedFrom");
}

/// OpenCitations change-tracking terms.
pub mod oc {
    use super::NamedNodeRef;

    pub const HAS_UPDATE_QUERY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://w3id.org/oc/ontology/hasUpdateQuery");
}

pub mod dcterms {
    use super::NamedNodeRef;

    pub const DESCRIPTION: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://purl.org/dc/terms/description");
}

/// Named graph holding the snapshots of `entity`.
pub fn provenance_graph_iri(entity: &str) -> String {
    format!("{entity}/prov/")
}

/// IRI of the `n`-th snapshot (1-based) of `entity`.
pub fn snapshot_iri(entity: &str, n: usize) -> String {
    format!("{entity}/prov/se/{n}")
}
