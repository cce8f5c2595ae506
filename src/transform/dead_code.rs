//! DeadCodeEliminate (§4.4): declarations with an empty use-set are
//! dropped from a module's item list. Ports are kept regardless — they are
//! externally observable even with no internal reader.

use crate::ast::{Ast, NodeId, NodeKind};
use crate::resolve::Resolver;

pub fn eliminate(ast: &Ast, resolver: &Resolver, items: &[NodeId]) -> Vec<NodeId> {
    items
        .iter()
        .copied()
        .filter(|&item| match ast.kind(item) {
            NodeKind::Decl(d) if d.port_direction.is_none() => !resolver.uses(item).is_empty(),
            _ => true,
        })
        .collect()
}
