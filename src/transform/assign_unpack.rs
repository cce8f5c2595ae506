//! AssignUnpack (§4.4): `{a, b, c} = expr` has more than one left-hand
//! side, which no back-end's assign primitive accepts directly. This pass
//! replaces a [`NodeKind::PackedAssign`] with a temporary holding `expr`'s
//! value plus one plain assign per field, sliced out MSB-first (matching
//! concatenation order: the first target named is the most-significant
//! field).

use crate::ast::{Ast, DeclStorage, NodeId, NodeKind};
use crate::resolve::Resolver;

/// Expands `packed` (a `PackedAssign` node) into `[temp_decl, feed, field_0,
/// field_1, ...]`, ready to splice into the enclosing item/statement list in
/// place of the original node. `nonblocking` selects whether the generated
/// field assigns use `<=` or `=`, matching the original `PackedAssign`'s
/// calling context.
pub fn expand(ast: &mut Ast, resolver: &mut Resolver, packed: NodeId, nonblocking: bool) -> Vec<NodeId> {
    let NodeKind::PackedAssign { targets, rhs } = ast.kind(packed).clone() else {
        return vec![packed];
    };

    let widths: Vec<usize> = targets
        .iter()
        .map(|&t| target_width(ast, resolver, t))
        .collect();
    let total: usize = widths.iter().sum::<usize>().max(1);

    let temp_decl = ast.push_synth(NodeKind::Decl(crate::ast::DeclInfo {
        name: "__pack".to_string(),
        storage: DeclStorage::Net,
        width: total,
        signed: false,
        real: false,
        dims: vec![],
        init: None,
        port_direction: None,
    }));
    let temp_read = ast.push_synth(NodeKind::Ident {
        path: vec!["__pack".to_string()],
        indices: vec![],
        range: None,
    });
    resolver.bind_external(temp_read, temp_decl);
    let feed = ast.push_synth(NodeKind::ContinuousAssign { lhs: temp_read, rhs });
    ast.link_children(feed);

    let mut out = vec![temp_decl, feed];
    let mut hi = total;
    for (target, width) in targets.into_iter().zip(widths) {
        let lo = hi - width;
        let range = ast.push_synth(NodeKind::RangeConst { msb: (hi - 1) as i64, lsb: lo as i64 });
        let slice_read = ast.push_synth(NodeKind::Ident {
            path: vec!["__pack".to_string()],
            indices: vec![],
            range: Some(range),
        });
        resolver.bind_external(slice_read, temp_decl);
        let field = if nonblocking {
            ast.push_synth(NodeKind::NonblockingAssign { lhs: target, rhs: slice_read })
        } else {
            ast.push_synth(NodeKind::BlockingAssign { lhs: target, rhs: slice_read })
        };
        ast.link_children(field);
        out.push(field);
        hi = lo;
    }
    out
}

fn target_width(ast: &Ast, resolver: &Resolver, target: NodeId) -> usize {
    let Some(decl) = resolver.resolution(target) else {
        return 1;
    };
    match ast.kind(decl) {
        NodeKind::Decl(d) => d.width,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::Ast;

    #[test]
    fn packed_assign_splits_into_msb_first_field_writes() {
        let mut ast = Ast::new();
        let (module, packed) = {
            let mut b = Builder::new(&mut ast);
            let zero_a = b.unsigned(4, 0);
            let a = b.reg_decl("a", 4, false, vec![], Some(zero_a));
            let zero_c = b.unsigned(4, 0);
            let c = b.reg_decl("c", 4, false, vec![], Some(zero_c));
            let src = b.unsigned(8, 0xAB);
            let a_ident = b.ident("a");
            let c_ident = b.ident("c");
            let packed = b.packed_assign(vec![a_ident, c_ident], src);
            let module = b.module_decl("m", vec![], vec![a, c, packed]);
            (module, packed)
        };
        let mut resolver = Resolver::new();
        resolver.build_module(&ast, module);

        let expanded = expand(&mut ast, &mut resolver, packed, false);
        // temp decl + feed + one field assign per target
        assert_eq!(expanded.len(), 2 + 2);
    }
}
