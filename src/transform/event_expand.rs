//! EventExpand (§4.4): `always @(*)` carries no explicit sensitivity list
//! (`events` is empty, per the doc comment on
//! [`crate::ast::NodeKind::EventControl`]); this pass derives one from the
//! body's read-set so a back-end that only knows how to edge-detect named
//! signals (this crate's reference engine included) has something to
//! trigger on.

use crate::ast::{Ast, EdgeType, NodeId, NodeKind};
use crate::resolve::Resolver;

/// Returns an explicit `Either`-edge event per distinct declaration read by
/// `body`, built as fresh `Event`/`Ident` nodes bound to those
/// declarations directly (bypassing lexical lookup, same trick
/// [`crate::isolate`] uses for cross-module wiring — the body may resolve
/// identifiers whose lexical scope is no longer in view once extracted).
pub fn expand(ast: &mut Ast, resolver: &mut Resolver, body: NodeId) -> Vec<NodeId> {
    let mut reads = Vec::new();
    collect_reads(ast, resolver, body, &mut reads);
    reads.sort_unstable();
    reads.dedup();

    reads
        .into_iter()
        .map(|decl| {
            let ident = ast.push_synth(NodeKind::Ident {
                path: vec!["<sensitivity>".to_string()],
                indices: vec![],
                range: None,
            });
            resolver.bind_external(ident, decl);
            let event = ast.push_synth(NodeKind::Event { edge: EdgeType::Either, expr: ident });
            ast.link_children(event);
            event
        })
        .collect()
}

fn collect_reads(ast: &Ast, resolver: &Resolver, id: NodeId, out: &mut Vec<NodeId>) {
    if let NodeKind::Ident { .. } = ast.kind(id) {
        if let Some(decl) = resolver.resolution(id) {
            out.push(decl);
        }
    }
    for child in ast.children(id) {
        collect_reads(ast, resolver, child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::Ast;

    #[test]
    fn combinational_body_expands_to_one_event_per_read() {
        let mut ast = Ast::new();
        let (module, body) = {
            let mut b = Builder::new(&mut ast);
            let zero_a = b.unsigned(1, 0);
            let a = b.reg_decl("a", 1, false, vec![], Some(zero_a));
            let zero_q = b.unsigned(1, 0);
            let q = b.reg_decl("q", 1, false, vec![], Some(zero_q));
            let a_ident = b.ident("a");
            let q_ident = b.ident("q");
            let assign = b.blocking_assign(q_ident, a_ident);
            let body = b.begin(vec![assign]);
            let module = b.module_decl("m", vec![], vec![a, q, body]);
            (module, body)
        };
        let mut resolver = Resolver::new();
        resolver.build_module(&ast, module);

        let events = expand(&mut ast, &mut resolver, body);
        assert_eq!(events.len(), 1); // only `a` is read; `q` is written
    }
}
