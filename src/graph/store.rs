//! Persistent RDF store backed by oxigraph.
//!
//! Wraps an oxigraph [`Store`] with the pattern lookups the restore, impact
//! and chain code need, plus atomic SPARQL updates for saving change sets.

use std::collections::HashSet;
use std::path::Path;

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{GraphNameRef, NamedNode, Quad, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::GraphError;

use super::{GraphState, StoreMode, object_iri, subject_iri};

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Oxigraph store plus the mode its statements are compared in.
pub struct GraphStore {
    store: Store,
    mode: StoreMode,
}

impl GraphStore {
    /// Create a new in-memory store (no persistence).
    pub fn in_memory(mode: StoreMode) -> GraphResult<Self> {
        let store = Store::new().map_err(|e| GraphError::Store {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        Ok(Self { store, mode })
    }

    /// Open or create a persistent store at the given path.
    pub fn open(path: &Path, mode: StoreMode) -> GraphResult<Self> {
        std::fs::create_dir_all(path).map_err(|e| GraphError::Store {
            message: format!("failed to create oxigraph directory: {e}"),
        })?;
        let store = Store::open(path).map_err(|e| GraphError::Store {
            message: format!("failed to open oxigraph store at {}: {e}", path.display()),
        })?;
        Ok(Self { store, mode })
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    /// Insert a single statement.
    pub fn insert(&self, quad: &Quad) -> GraphResult<()> {
        self.store.insert(quad).map_err(|e| GraphError::Store {
            message: format!("insert failed: {e}"),
        })?;
        Ok(())
    }

    /// Remove a single statement.
    pub fn remove(&self, quad: &Quad) -> GraphResult<()> {
        self.store.remove(quad).map_err(|e| GraphError::Store {
            message: format!("remove failed: {e}"),
        })?;
        Ok(())
    }

    /// All statements matching the pattern. `None` is a wildcard; a `None`
    /// graph matches every graph, including the default one.
    pub fn quads_matching(
        &self,
        subject: Option<&NamedNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        graph: Option<&NamedNode>,
    ) -> GraphResult<Vec<Quad>> {
        let graph_ref = graph.map(|g| GraphNameRef::NamedNode(g.as_ref()));
        self.store
            .quads_for_pattern(
                subject.map(|s| s.as_ref().into()),
                predicate.map(|p| p.as_ref()),
                object.map(|o| o.as_ref()),
                graph_ref,
            )
            .map(|r| {
                r.map_err(|e| GraphError::Store {
                    message: format!("pattern scan failed: {e}"),
                })
            })
            .collect()
    }

    /// Every statement whose subject is `entity`.
    pub fn entity_state(&self, entity: &NamedNode) -> GraphResult<GraphState> {
        Ok(self
            .quads_matching(Some(entity), None, None, None)?
            .into_iter()
            .map(|q| self.mode.normalize(&q))
            .collect())
    }

    /// Whether `entity` is the subject of at least one statement.
    pub fn has_statements(&self, entity: &NamedNode) -> GraphResult<bool> {
        let mut iter = self.store.quads_for_pattern(
            Some(entity.as_ref().into()),
            None,
            None,
            None,
        );
        match iter.next() {
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(GraphError::Store {
                message: format!("pattern scan failed: {e}"),
            }),
            None => Ok(false),
        }
    }

    /// Every statement whose object is `entity`.
    pub fn referrers(&self, entity: &NamedNode) -> GraphResult<Vec<Quad>> {
        let term = Term::NamedNode(entity.clone());
        self.quads_matching(None, None, Some(&term), None)
    }

    /// Distinct IRI subjects referencing `entity`, excluding `rdf:type` links.
    pub fn referring_entities(&self, entity: &NamedNode) -> GraphResult<HashSet<NamedNode>> {
        Ok(self
            .referrers(entity)?
            .iter()
            .filter(|q| q.predicate.as_ref() != rdf::TYPE)
            .filter_map(subject_iri)
            .collect())
    }

    /// Distinct IRI objects `entity` points to, excluding `rdf:type` links.
    pub fn referenced_entities(&self, entity: &NamedNode) -> GraphResult<HashSet<NamedNode>> {
        Ok(self
            .quads_matching(Some(entity), None, None, None)?
            .iter()
            .filter(|q| q.predicate.as_ref() != rdf::TYPE)
            .filter_map(|q| object_iri(q).cloned())
            .collect())
    }

    /// Declared `rdf:type`s of `entity`, sorted.
    pub fn types_of(&self, entity: &NamedNode) -> GraphResult<Vec<NamedNode>> {
        let rdf_type = NamedNode::from(rdf::TYPE);
        let mut types: Vec<NamedNode> = self
            .quads_matching(Some(entity), Some(&rdf_type), None, None)?
            .iter()
            .filter_map(|q| object_iri(q).cloned())
            .collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types.dedup();
        Ok(types)
    }

    /// Execute a SPARQL update. Oxigraph applies the whole request atomically.
    pub fn update(&self, sparql: &str) -> GraphResult<()> {
        self.store.update(sparql).map_err(|e| GraphError::Sparql {
            message: format!("SPARQL update failed: {e}"),
        })
    }

    /// Parse N-Quads text into statements without touching the store.
    pub fn parse_nquads(text: &str) -> GraphResult<Vec<Quad>> {
        RdfParser::from_format(RdfFormat::NQuads)
            .for_reader(text.as_bytes())
            .map(|r| {
                r.map_err(|e| GraphError::Parse {
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// Execute a SPARQL SELECT query and return results as Vec of binding maps.
    pub fn query_select(&self, sparql: &str) -> GraphResult<Vec<Vec<(String, Term)>>> {
        let results = self.store.query(sparql).map_err(|e| GraphError::Sparql {
            message: format!("SPARQL query failed: {e}"),
        })?;

        match results {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| GraphError::Sparql {
                        message: format!("solution error: {e}"),
                    })?;
                    let mut row = Vec::new();
                    for (var, term) in solution.iter() {
                        row.push((var.as_str().to_string(), term.clone()));
                    }
                    rows.push(row);
                }
                Ok(rows)
            }
            _ => Err(GraphError::Sparql {
                message: "only SELECT queries are supported via query_select".into(),
            }),
        }
    }

    /// Execute a SPARQL ASK query.
    pub fn query_ask(&self, sparql: &str) -> GraphResult<bool> {
        let results = self.store.query(sparql).map_err(|e| GraphError::Sparql {
            message: format!("SPARQL query failed: {e}"),
        })?;
        match results {
            QueryResults::Boolean(b) => Ok(b),
            _ => Err(GraphError::Sparql {
                message: "expected boolean result from ASK query".into(),
            }),
        }
    }

    /// Number of statements in the store, across all graphs.
    pub fn len(&self) -> GraphResult<usize> {
        self.store.len().map_err(|e| GraphError::Store {
            message: format!("len failed: {e}"),
        })
    }

    pub fn is_empty(&self) -> GraphResult<bool> {
        self.len().map(|n| n == 0)
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore").field("mode", &self.mode).finish()
    }
}
