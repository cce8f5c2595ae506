//! BlockFlatten (§4.4): a nested `begin...end` with no declarations of its
//! own contributes nothing but an extra scope frame; its statements can be
//! spliced straight into the parent block.

use crate::ast::{Ast, NodeId, NodeKind};

/// Flattens one level of `items`: any `Begin` among them whose own
/// statements declare no locals is replaced by its statements inline.
pub fn flatten(ast: &Ast, items: &[NodeId]) -> Vec<NodeId> {
    let mut out = Vec::with_capacity(items.len());
    for &item in items {
        if let NodeKind::Begin(inner) = ast.kind(item) {
            if !inner.iter().any(|&s| matches!(ast.kind(s), NodeKind::Decl(_))) {
                out.extend(inner.iter().copied());
                continue;
            }
        }
        out.push(item);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::Ast;

    #[test]
    fn decl_free_nested_block_is_spliced_into_parent() {
        let mut ast = Ast::new();
        let mut b = Builder::new(&mut ast);
        let s1 = b.sys_task("$display", vec![]);
        let s2 = b.sys_task("$display", vec![]);
        let inner = b.begin(vec![s1, s2]);
        let outer_stmt = b.sys_task("$finish", vec![]);
        let outer = vec![inner, outer_stmt];

        let flattened = flatten(&ast, &outer);
        assert_eq!(flattened, vec![s1, s2, outer_stmt]);
    }

    #[test]
    fn nested_block_with_a_local_decl_is_kept_intact() {
        let mut ast = Ast::new();
        let mut b = Builder::new(&mut ast);
        let zero = b.unsigned(1, 0);
        let decl = b.reg_decl("local", 1, false, vec![], Some(zero));
        let inner = b.begin(vec![decl]);
        let outer = vec![inner];

        assert_eq!(flatten(&ast, &outer), vec![inner]);
    }
}
