//! Graph layer: statement model, the oxigraph-backed store, and graph diffs.
//!
//! Statements are plain oxigraph [`Quad`]s. In [`StoreMode::Triples`] every
//! statement lives in the default graph and graph names are ignored when
//! comparing; in [`StoreMode::Quads`] the named graph is part of a statement's
//! identity.

pub mod diff;
pub mod store;

use std::collections::HashSet;

use oxigraph::model::{GraphName, NamedNode, Quad, Term};
use serde::{Deserialize, Serialize};

pub use diff::{Diff, diff};
pub use store::{GraphResult, GraphStore};

/// A set of statements: the state of one or more entities at some moment.
pub type GraphState = HashSet<Quad>;

/// Whether the underlying store partitions statements into named graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// Plain triplestore: graph context is ignored.
    #[default]
    Triples,
    /// Quadstore: graph context is part of a statement.
    Quads,
}

impl StoreMode {
    pub fn from_quadstore_flag(is_quadstore: bool) -> Self {
        if is_quadstore { Self::Quads } else { Self::Triples }
    }

    /// Bring a statement into the canonical form for this mode.
    pub fn normalize(self, quad: &Quad) -> Quad {
        match self {
            Self::Quads => quad.clone(),
            Self::Triples => Quad::new(
                quad.subject.clone(),
                quad.predicate.clone(),
                quad.object.clone(),
                GraphName::DefaultGraph,
            ),
        }
    }

    /// Graph name to write a statement into, given an optional context.
    pub fn graph_name(self, context: Option<&NamedNode>) -> GraphName {
        match (self, context) {
            (Self::Quads, Some(g)) => GraphName::NamedNode(g.clone()),
            _ => GraphName::DefaultGraph,
        }
    }
}

/// The subject of a statement, if it is an IRI.
pub fn subject_iri(quad: &Quad) -> Option<NamedNode> {
    match Term::from(quad.subject.clone()) {
        Term::NamedNode(n) => Some(n),
        _ => None,
    }
}

/// The object of a statement, if it is an IRI.
pub fn object_iri(quad: &Quad) -> Option<&NamedNode> {
    match &quad.object {
        Term::NamedNode(n) => Some(n),
        _ => None,
    }
}

/// The named graph of a statement, `None` for the default graph.
pub fn graph_context(quad: &Quad) -> Option<&NamedNode> {
    match &quad.graph_name {
        GraphName::NamedNode(n) => Some(n),
        _ => None,
    }
}

/// Build a statement from its parts.
pub fn statement(
    subject: &NamedNode,
    predicate: &NamedNode,
    object: impl Into<Term>,
    graph: GraphName,
) -> Quad {
    Quad::new(subject.clone(), predicate.clone(), object.into(), graph)
}

/// Statements sorted by their N-Quads rendering, for deterministic iteration.
pub fn sorted(state: &GraphState) -> Vec<Quad> {
    let mut quads: Vec<Quad> = state.iter().cloned().collect();
    quads.sort_by_cached_key(|q| q.to_string());
    quads
}

/// Render statements as a SPARQL `DATA` block body.
///
/// Default-graph statements are written bare, named-graph statements are
/// grouped under `GRAPH <g> { ... }`.
pub fn sparql_data_block(quads: &[Quad]) -> String {
    let mut default = String::new();
    let mut named: Vec<(String, String)> = Vec::new();
    for q in quads {
        let line = format!("{} {} {} .\n", q.subject, q.predicate, q.object);
        match &q.graph_name {
            GraphName::NamedNode(g) => {
                let key = g.to_string();
                match named.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, body)) => body.push_str(&line),
                    None => named.push((key, line)),
                }
            }
            _ => default.push_str(&line),
        }
    }
    let mut out = default;
    for (graph, body) in named {
        out.push_str(&format!("GRAPH {graph} {{\n{body}}}\n"));
    }
    out
}

/// A SPARQL update deleting `removed` then inserting `added`.
///
/// Returns `None` when there is nothing to do.
pub fn sparql_update(removed: &[Quad], added: &[Quad]) -> Option<String> {
    let mut parts = Vec::new();
    if !removed.is_empty() {
        parts.push(format!("DELETE DATA {{\n{}}}", sparql_data_block(removed)));
    }
    if !added.is_empty() {
        parts.push(format!("INSERT DATA {{\n{}}}", sparql_data_block(added)));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" ;\n"))
    }
}
