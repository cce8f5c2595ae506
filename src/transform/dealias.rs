//! DeAlias (§4.4): a `wire` that does nothing but forward another signal
//! (`continuous_assign(a, b)` with both sides plain identifiers and no
//! other driver for `a`) is redundant — every reader of `a` can read `b`
//! directly. This pass finds the single-hop case and returns the
//! substitution table; callers rewrite identifier nodes through it rather
//! than this pass mutating the tree itself, since the actual rewrite
//! touches arbitrary reader sites across the module that this function
//! doesn't need to know about.

use std::collections::HashMap;

use crate::ast::{Ast, DeclStorage, NodeId, NodeKind};
use crate::resolve::Resolver;

/// Maps an aliased net's declaration to the declaration it forwards.
pub type AliasTable = HashMap<NodeId, NodeId>;

pub fn find_aliases(ast: &Ast, resolver: &Resolver, items: &[NodeId]) -> AliasTable {
    let mut aliases = AliasTable::new();
    for &item in items {
        let NodeKind::ContinuousAssign { lhs, rhs } = ast.kind(item) else {
            continue;
        };
        let NodeKind::Ident { path: lhs_path, indices: li, range: lr } = ast.kind(*lhs) else {
            continue;
        };
        let NodeKind::Ident { path: rhs_path, indices: ri, range: rr } = ast.kind(*rhs) else {
            continue;
        };
        if !li.is_empty() || lr.is_some() || !ri.is_empty() || rr.is_some() {
            continue; // only whole-signal forwarding, no slices/indices
        }
        let _ = (lhs_path, rhs_path);
        let (Some(lhs_decl), Some(rhs_decl)) = (resolver.resolution(*lhs), resolver.resolution(*rhs)) else {
            continue;
        };
        let NodeKind::Decl(d) = ast.kind(lhs_decl) else {
            continue;
        };
        if d.storage != DeclStorage::Net || d.port_direction.is_some() {
            continue; // only a plain internal wire is a candidate
        }
        // A decl driven by more than this one assign isn't a pure alias.
        if resolver.uses(lhs_decl).iter().filter(|&&u| u == *lhs).count() != 1 {
            continue;
        }
        aliases.insert(lhs_decl, rhs_decl);
    }
    aliases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::Ast;

    #[test]
    fn plain_wire_forward_is_detected_as_an_alias() {
        let mut ast = Ast::new();
        let (module, a_decl, b_decl) = {
            let mut b = Builder::new(&mut ast);
            let b_decl = b.net_decl("b", 8, None);
            let a_decl = b.net_decl("a", 8, None);
            let a_ident = b.ident("a");
            let b_ident = b.ident("b");
            let assign = b.continuous_assign(a_ident, b_ident);
            let module = b.module_decl("m", vec![], vec![b_decl, a_decl, assign]);
            (module, a_decl, b_decl)
        };
        let mut resolver = Resolver::new();
        resolver.build_module(&ast, module);
        let NodeKind::ModuleDeclaration { items, .. } = ast.kind(module).clone() else { unreachable!() };
        let aliases = find_aliases(&ast, &resolver, &items);
        assert_eq!(aliases.get(&a_decl), Some(&b_decl));
    }
}
