//! Ordered multi-valued properties stored as a singly linked list of
//! `(value, ordering_predicate, next_value)` statements.
//!
//! Order is always computed on an [`OrderedChain`] (a plain vector) and only
//! turned back into link statements when written, so a rebuild cannot leave
//! a cycle or a fork behind.

use std::collections::{HashMap, HashSet};

use miette::Diagnostic;
use oxigraph::model::{NamedNode, Term};
use thiserror::Error;

use crate::error::MutationError;
use crate::graph::object_iri;
use crate::mutation::{MutationLog, WorkingSet};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors specific to ordered chains.
#[derive(Debug, Error, Diagnostic)]
pub enum ChainError {
    #[error("ordering cycle through {node}")]
    #[diagnostic(
        code(provtrail::chain::cycle),
        help("Following the ordering predicate loops back. Rebuild the chain from an explicit order.")
    )]
    Cycle { node: String },

    #[error("{node} has more than one successor")]
    #[diagnostic(
        code(provtrail::chain::branch),
        help("Each value may link to at most one next value. Rebuild the chain from an explicit order.")
    )]
    Branch { node: String },

    #[error("chain has several first elements: {heads}")]
    #[diagnostic(
        code(provtrail::chain::multiple_heads),
        help("The values form more than one list. Rebuild the chain from an explicit order.")
    )]
    MultipleHeads { heads: String },

    #[error("{node} appears twice in the requested order")]
    #[diagnostic(
        code(provtrail::chain::duplicate),
        help("Every value may appear only once in an ordered property.")
    )]
    DuplicateMember { node: String },

    #[error("requested order does not match the current values: {message}")]
    #[diagnostic(
        code(provtrail::chain::membership),
        help("A reorder must list exactly the values the property currently has.")
    )]
    MembershipMismatch { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Mutation(#[from] MutationError),
}

/// Result type for chain operations.
pub type ChainResult<T> = std::result::Result<T, ChainError>;

// ---------------------------------------------------------------------------
// Ordered chain
// ---------------------------------------------------------------------------

/// An explicit, duplicate-free order of values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderedChain {
    members: Vec<NamedNode>,
}

impl OrderedChain {
    pub fn new(members: Vec<NamedNode>) -> ChainResult<Self> {
        let mut seen = HashSet::new();
        for m in &members {
            if !seen.insert(m) {
                return Err(ChainError::DuplicateMember {
                    node: m.as_str().to_string(),
                });
            }
        }
        Ok(Self { members })
    }

    pub fn members(&self) -> &[NamedNode] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// `(value, next)` pairs. The last member has no successor.
    pub fn links(&self) -> impl Iterator<Item = (&NamedNode, &NamedNode)> {
        self.members.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// Decode link pairs into an order.
    ///
    /// `members` lists values that may have no link at all (a one-element
    /// chain). Forks, cycles and disconnected lists are rejected.
    pub fn from_links(links: &[(NamedNode, NamedNode)], members: &[NamedNode]) -> ChainResult<Self> {
        let mut next: HashMap<&NamedNode, &NamedNode> = HashMap::new();
        let mut nodes: HashSet<&NamedNode> = members.iter().collect();
        let mut targets: HashSet<&NamedNode> = HashSet::new();
        for (from, to) in links {
            if let Some(existing) = next.insert(from, to) {
                if existing != to {
                    return Err(ChainError::Branch {
                        node: from.as_str().to_string(),
                    });
                }
            }
            nodes.insert(from);
            nodes.insert(to);
            targets.insert(to);
        }
        if nodes.is_empty() {
            return Ok(Self::default());
        }

        let mut heads: Vec<&NamedNode> = nodes.iter().copied().filter(|n| !targets.contains(n)).collect();
        heads.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let head = match heads.as_slice() {
            [] => {
                let mut any: Vec<&&NamedNode> = nodes.iter().collect();
                any.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                return Err(ChainError::Cycle {
                    node: any[0].as_str().to_string(),
                });
            }
            [head] => *head,
            many => {
                return Err(ChainError::MultipleHeads {
                    heads: many.iter().map(|h| h.as_str()).collect::<Vec<_>>().join(", "),
                });
            }
        };

        let mut order = vec![head.clone()];
        let mut visited: HashSet<&NamedNode> = HashSet::from([head]);
        let mut cursor = head;
        while let Some(&succ) = next.get(cursor) {
            if !visited.insert(succ) {
                return Err(ChainError::Cycle {
                    node: succ.as_str().to_string(),
                });
            }
            order.push(succ.clone());
            cursor = succ;
        }
        if visited.len() != nodes.len() {
            // A single head without forks: the leftover nodes must loop.
            let mut rest: Vec<&&NamedNode> = nodes.iter().filter(|n| !visited.contains(**n)).collect();
            rest.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            return Err(ChainError::Cycle {
                node: rest[0].as_str().to_string(),
            });
        }
        Ok(Self { members: order })
    }
}

/// Read the chain linking `members` from the working set.
pub fn read_chain(
    working: &WorkingSet,
    ordering_predicate: &NamedNode,
    members: &[NamedNode],
) -> ChainResult<OrderedChain> {
    let mut links = Vec::new();
    for m in members {
        for q in working.scan(Some(m), Some(ordering_predicate), None) {
            if let Some(next) = object_iri(&q) {
                links.push((m.clone(), next.clone()));
            }
        }
    }
    OrderedChain::from_links(&links, members)
}

/// Replace every outgoing ordering link of the chain's members with links
/// following the chain's order.
pub fn rebuild_chain<L: MutationLog + ?Sized>(
    log: &mut L,
    ordering_predicate: &NamedNode,
    chain: &OrderedChain,
    graph: Option<&NamedNode>,
) -> ChainResult<()> {
    for m in chain.members() {
        log.import_entity(m)?;
    }
    log.mark_preexisting_finished();
    for m in chain.members() {
        if !log
            .working_set()
            .scan(Some(m), Some(ordering_predicate), None)
            .is_empty()
        {
            log.delete(m, Some(ordering_predicate), None, graph)?;
        }
    }
    for (value, next) in chain.links() {
        log.create(value, ordering_predicate, &Term::NamedNode(next.clone()), graph)?;
    }
    tracing::debug!(predicate = %ordering_predicate, members = chain.len(), "chain rebuilt");
    Ok(())
}

/// Reorder the values of an existing chain.
///
/// Members keep their IRIs; only the link statements change.
pub fn reorder<L: MutationLog + ?Sized>(
    log: &mut L,
    ordering_predicate: &NamedNode,
    current_members: &[NamedNode],
    new_order: Vec<NamedNode>,
    graph: Option<&NamedNode>,
) -> ChainResult<OrderedChain> {
    for m in current_members {
        log.import_entity(m)?;
    }
    log.mark_preexisting_finished();
    let current = read_chain(log.working_set(), ordering_predicate, current_members)?;
    let requested = OrderedChain::new(new_order)?;

    let have: HashSet<&NamedNode> = current.members().iter().collect();
    let want: HashSet<&NamedNode> = requested.members().iter().collect();
    if have != want {
        let mut missing: Vec<&str> = have.difference(&want).map(|n| n.as_str()).collect();
        let mut unknown: Vec<&str> = want.difference(&have).map(|n| n.as_str()).collect();
        missing.sort();
        unknown.sort();
        return Err(ChainError::MembershipMismatch {
            message: format!("missing [{}], unknown [{}]", missing.join(", "), unknown.join(", ")),
        });
    }

    rebuild_chain(log, ordering_predicate, &requested, graph)?;
    Ok(requested)
}
