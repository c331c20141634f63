// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # provtrail
//!
//! Time travel for provenance-tracked RDF data: every change to an entity is
//! recorded as a PROV-O snapshot, and any entity can be brought back to the
//! state it had at an earlier point in time together with the neighbours
//! whose links to it changed since.
//!
//! ## Architecture
//!
//! - **Graph store** (`graph`): oxigraph-backed store, triple/quad modes, set diffs
//! - **Provenance** (`provenance`): snapshot metadata, history replay, snapshot selection
//! - **Mutation log** (`mutation`): working-set editor that seals changes into snapshots
//! - **Restore** (`restore`): plan, attribute and apply a time-travel restore
//! - **Ordered chains** (`chain`): linked-list ordering of multi-valued properties
//! - **Deletion impact** (`impact`): orphans, proxies and deletion policies
//! - **Curator** (`curator`): facade tying the stores and configuration together
//!
//! ## Library usage
//!
//! ```no_run
//! use chrono::Utc;
//! use oxigraph::model::NamedNode;
//! use provtrail::config::TrailConfig;
//! use provtrail::curator::Curator;
//!
//! let curator = Curator::in_memory(TrailConfig::default()).unwrap();
//! curator
//!     .load_nquads("<https://example.org/br/1> <http://purl.org/dc/terms/title> \"Alpha\" .\n")
//!     .unwrap();
//! let then = Utc::now();
//! let book = NamedNode::new("https://example.org/br/1").unwrap();
//! curator.delete_entity(&book, true).unwrap();
//! curator.restore(&book, then).unwrap();
//! ```

pub mod chain;
pub mod config;
pub mod curator;
pub mod error;
pub mod graph;
pub mod impact;
pub mod mutation;
pub mod provenance;
pub mod restore;
pub mod vocab;
