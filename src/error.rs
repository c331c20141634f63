//! Rich diagnostic error types for provtrail.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so a caller (or the CLI) can tell a
//! missing snapshot apart from a failed save or a pending confirmation.

use miette::Diagnostic;
use thiserror::Error;

use crate::chain::ChainError;
use crate::impact::ImpactError;

/// Top-level error type for provtrail.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum TrailError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Provenance(#[from] ProvenanceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Restore(#[from] RestoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Impact(#[from] ImpactError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Graph store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("graph store error: {message}")]
    #[diagnostic(
        code(provtrail::graph::store),
        help(
            "The oxigraph store reported a storage failure. \
             Check that the data directory exists, is writable, \
             and is not opened by another process."
        )
    )]
    Store { message: String },

    #[error("SPARQL error: {message}")]
    #[diagnostic(
        code(provtrail::graph::sparql),
        help("The SPARQL query or update failed. Check the syntax of the request.")
    )]
    Sparql { message: String },

    #[error("failed to parse RDF input: {message}")]
    #[diagnostic(
        code(provtrail::graph::parse),
        help("The input must be valid N-Quads (one statement per line, ending with ' .').")
    )]
    Parse { message: String },
}

// ---------------------------------------------------------------------------
// Provenance errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ProvenanceError {
    #[error("snapshot {snapshot} has no prov:generatedAtTime")]
    #[diagnostic(
        code(provtrail::provenance::missing_time),
        help(
            "Every snapshot must carry a generation time. \
             The provenance graph is incomplete or was written by another tool."
        )
    )]
    MissingGenerationTime { snapshot: String },

    #[error("snapshot {snapshot} has an invalid timestamp: {value}")]
    #[diagnostic(
        code(provtrail::provenance::bad_time),
        help("Timestamps must be xsd:dateTime values in RFC 3339 form.")
    )]
    InvalidTimestamp { snapshot: String, value: String },

    #[error("failed to replay snapshot {snapshot}: {message}")]
    #[diagnostic(
        code(provtrail::provenance::replay),
        help(
            "The snapshot's update query could not be re-applied while rebuilding history. \
             The stored oc:hasUpdateQuery is probably malformed."
        )
    )]
    Replay { snapshot: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
}

// ---------------------------------------------------------------------------
// Mutation log errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MutationError {
    #[error("invalid value: {message}")]
    #[diagnostic(
        code(provtrail::mutation::validation),
        help("The proposed statement is not acceptable. Fix the value and retry.")
    )]
    Validation { message: String },

    #[error("failed to save changes: {message}")]
    #[diagnostic(
        code(provtrail::mutation::persistence),
        help(
            "Writing the changes or their snapshots failed. \
             Nothing was committed; retry once the store is reachable."
        )
    )]
    Persistence { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Provenance(#[from] ProvenanceError),
}

/// Result type for mutation log operations.
pub type MutationResult<T> = std::result::Result<T, MutationError>;

// ---------------------------------------------------------------------------
// Restore errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RestoreError {
    #[error("no history found for {entity}")]
    #[diagnostic(
        code(provtrail::restore::not_found),
        help("The entity has no snapshots, so there is no earlier state to restore.")
    )]
    EntityNotFound { entity: String },

    #[error("{entity} had no live state at or before {at}")]
    #[diagnostic(
        code(provtrail::restore::no_snapshot),
        help("Pick a time after the entity was created and not inside a deletion.")
    )]
    NoSnapshotAtTime { entity: String, at: String },

    #[error("restoration rejected: {message}")]
    #[diagnostic(
        code(provtrail::restore::validation),
        help("A restored value failed validation. The restore was not applied.")
    )]
    Validation { message: String },

    #[error("restoration could not be saved: {message}")]
    #[diagnostic(
        code(provtrail::restore::persistence),
        help("The store rejected the change set. Nothing was committed.")
    )]
    Persistence { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Provenance(#[from] ProvenanceError),
}

impl From<MutationError> for RestoreError {
    fn from(e: MutationError) -> Self {
        match e {
            MutationError::Validation { message } => Self::Validation { message },
            MutationError::Persistence { message } => Self::Persistence { message },
            MutationError::Graph(g) => Self::Graph(g),
            MutationError::Provenance(p) => Self::Provenance(p),
        }
    }
}

/// Result type for restore operations.
pub type RestoreResult<T> = std::result::Result<T, RestoreError>;

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(provtrail::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(provtrail::config::parse),
        help("Check the TOML syntax in the config file. {message}")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(provtrail::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid IRI in config: {iri}")]
    #[diagnostic(
        code(provtrail::config::iri),
        help("Class and agent identifiers must be absolute IRIs, e.g. http://purl.org/spar/pro/RoleInTime.")
    )]
    InvalidIri { iri: String },
}

/// Convenience alias for functions returning provtrail results.
pub type TrailResult<T> = std::result::Result<T, TrailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_persistence_maps_to_restore_persistence() {
        let err = MutationError::Persistence {
            message: "disk full".into(),
        };
        let restore: RestoreError = err.into();
        match restore {
            RestoreError::Persistence { message } => assert_eq!(message, "disk full"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn mutation_validation_maps_to_restore_validation() {
        let err = MutationError::Validation {
            message: "bad date".into(),
        };
        let restore: RestoreError = err.into();
        assert!(matches!(restore, RestoreError::Validation { .. }));
    }

    #[test]
    fn graph_error_converts_to_trail_error() {
        let err = GraphError::Store {
            message: "closed".into(),
        };
        let trail: TrailError = err.into();
        assert!(matches!(trail, TrailError::Graph(GraphError::Store { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = RestoreError::NoSnapshotAtTime {
            entity: "https://example.org/br/1".into(),
            at: "2020-01-01T00:00:00Z".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("https://example.org/br/1"));
        assert!(msg.contains("2020-01-01"));
    }
}
