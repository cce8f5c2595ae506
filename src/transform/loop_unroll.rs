//! LoopUnroll (§4.4): `repeat` with a statically-known count becomes a
//! straight-line sequence of copies of its body.
//!
//! The reference engine executes `for`/`while`/`repeat` directly rather
//! than requiring them unrolled first (§9: it is a tree-walking
//! interpreter, not a state-machine compiler), so this pass exists for
//! back-ends that can't — it is not in the reference engine's own
//! pipeline. `repeat` is the one loop form this crate unrolls eagerly
//! since, unlike `for`, it carries no induction variable a back-end would
//! need substituted per copy: the body NodeId can simply be repeated.

use crate::ast::{Ast, NodeId, NodeKind};

/// Rewrites `id` in place if it is a `RepeatLoop` with a literal `Number`
/// count, replacing it with a `Begin` of `count` copies of its body.
/// Leaves any other node kind untouched and returns it unchanged.
pub fn unroll(ast: &mut Ast, id: NodeId) -> NodeId {
    let NodeKind::RepeatLoop { count, body } = ast.kind(id).clone() else {
        return id;
    };
    let NodeKind::Number(n) = ast.kind(count).clone() else {
        return id;
    };
    let reps = n.to_usize();
    let unrolled = ast.push_synth(NodeKind::Begin(vec![body; reps]));
    ast.link_children(unrolled);
    unrolled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::Ast;

    #[test]
    fn literal_repeat_unrolls_to_n_copies() {
        let mut ast = Ast::new();
        let mut b = Builder::new(&mut ast);
        let stmt = b.sys_task("$display", vec![]);
        let count = b.unsigned(8, 3);
        let repeat = b.repeat_loop(count, stmt);
        let unrolled = unroll(&mut ast, repeat);
        match ast.kind(unrolled) {
            NodeKind::Begin(v) => assert_eq!(v.len(), 3),
            other => panic!("expected Begin, got {other:?}"),
        }
    }

    #[test]
    fn non_literal_count_is_left_alone() {
        let mut ast = Ast::new();
        let mut b = Builder::new(&mut ast);
        let stmt = b.sys_task("$display", vec![]);
        let count = b.ident("n");
        let repeat = b.repeat_loop(count, stmt);
        assert_eq!(unroll(&mut ast, repeat), repeat);
    }
}
