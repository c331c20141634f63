//! Set difference between a live graph and a historical one.

use oxigraph::model::Quad;

use super::{GraphState, StoreMode, sorted};

/// What must change to turn the current graph into the historical one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Present now, absent in the target state.
    pub to_delete: GraphState,
    /// Absent now, present in the target state.
    pub to_add: GraphState,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty()
    }

    /// Deletions in deterministic order.
    pub fn deletions(&self) -> Vec<Quad> {
        sorted(&self.to_delete)
    }

    /// Additions in deterministic order.
    pub fn additions(&self) -> Vec<Quad> {
        sorted(&self.to_add)
    }

    /// Every statement touched by the diff.
    pub fn statements(&self) -> impl Iterator<Item = &Quad> {
        self.to_delete.iter().chain(self.to_add.iter())
    }
}

/// Compute `current − historical` and `historical − current`.
///
/// In [`StoreMode::Triples`] graph names are dropped before comparing, so the
/// same triple in two graphs counts once.
pub fn diff(current: &GraphState, historical: &GraphState, mode: StoreMode) -> Diff {
    let current: GraphState = current.iter().map(|q| mode.normalize(q)).collect();
    let historical: GraphState = historical.iter().map(|q| mode.normalize(q)).collect();

    let to_delete = current.difference(&historical).cloned().collect();
    let to_add = historical.difference(&current).cloned().collect();

    Diff { to_delete, to_add }
}

/// Apply a diff to a graph state: remove deletions, then insert additions.
pub fn apply(state: &GraphState, diff: &Diff, mode: StoreMode) -> GraphState {
    let mut out: GraphState = state.iter().map(|q| mode.normalize(q)).collect();
    for q in &diff.to_delete {
        out.remove(q);
    }
    out.extend(diff.to_add.iter().cloned());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::statement;
    use oxigraph::model::{GraphName, Literal, NamedNode};

    fn iri(s: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("https://example.org/{s}"))
    }

    fn name(entity: &str, value: &str, graph: GraphName) -> Quad {
        statement(
            &iri(entity),
            &iri("name"),
            Literal::new_simple_literal(value),
            graph,
        )
    }

    fn state(quads: &[Quad]) -> GraphState {
        quads.iter().cloned().collect()
    }

    #[test]
    fn diff_is_symmetric() {
        let g = GraphName::DefaultGraph;
        let a = state(&[name("e1", "Alpha", g.clone()), name("e2", "Shared", g.clone())]);
        let b = state(&[name("e1", "Beta", g.clone()), name("e2", "Shared", g)]);

        let ab = diff(&a, &b, StoreMode::Triples);
        let ba = diff(&b, &a, StoreMode::Triples);
        assert_eq!(ab.to_add, ba.to_delete);
        assert_eq!(ab.to_delete, ba.to_add);
        assert!(ab.to_delete.is_disjoint(&ab.to_add));
    }

    #[test]
    fn applying_diff_reaches_target() {
        let g = GraphName::DefaultGraph;
        let a = state(&[name("e1", "Alpha", g.clone()), name("e3", "Gone", g.clone())]);
        let b = state(&[name("e1", "Beta", g.clone()), name("e4", "New", g)]);

        let d = diff(&a, &b, StoreMode::Triples);
        assert_eq!(apply(&a, &d, StoreMode::Triples), b);
        assert_eq!(d.deletions().len(), 2);
        assert_eq!(d.additions().len(), 2);
    }

    #[test]
    fn identical_graphs_have_empty_diff() {
        let a = state(&[name("e1", "Alpha", GraphName::DefaultGraph)]);
        assert!(diff(&a, &a, StoreMode::Triples).is_empty());
        assert!(diff(&GraphState::new(), &GraphState::new(), StoreMode::Quads).is_empty());
    }

    #[test]
    fn quad_mode_distinguishes_graphs() {
        let g1 = GraphName::NamedNode(iri("g1"));
        let g2 = GraphName::NamedNode(iri("g2"));
        let a = state(&[name("e1", "Alpha", g1)]);
        let b = state(&[name("e1", "Alpha", g2)]);

        assert!(diff(&a, &b, StoreMode::Triples).is_empty());
        let d = diff(&a, &b, StoreMode::Quads);
        assert_eq!(d.to_delete.len(), 1);
        assert_eq!(d.to_add.len(), 1);
    }

    #[test]
    fn literals_compare_by_datatype_and_language() {
        let g = GraphName::DefaultGraph;
        let plain = statement(&iri("e1"), &iri("name"), Literal::new_simple_literal("x"), g.clone());
        let tagged = statement(
            &iri("e1"),
            &iri("name"),
            Literal::new_language_tagged_literal_unchecked("x", "en"),
            g,
        );
        let d = diff(&state(&[plain]), &state(&[tagged]), StoreMode::Triples);
        assert_eq!(d.to_delete.len(), 1);
        assert_eq!(d.to_add.len(), 1);
    }
}
