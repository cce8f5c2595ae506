//! ConstantProp (§4.4): expressions whose leaves are all literals fold to
//! a single `Number` node, computed with the same [`crate::evaluate`]
//! machinery the runtime uses for everything else — a literal subtree has
//! no identifiers, so evaluating it needs no resolver.

use crate::ast::{Ast, NodeId, NodeKind};
use crate::evaluate::Evaluator;
use crate::resolve::Resolver;

/// Folds `id` to a literal `Number` if every leaf beneath it is itself a
/// literal (no identifiers, no system-function calls). Returns the
/// original id unchanged otherwise.
pub fn fold(ast: &mut Ast, id: NodeId) -> NodeId {
    if !is_foldable(ast, id) {
        return id;
    }
    let resolver = Resolver::new();
    let value = Evaluator::new(ast, &resolver).get_value(id);
    let folded = ast.push_synth(NodeKind::Number(value));
    folded
}

fn is_foldable(ast: &Ast, id: NodeId) -> bool {
    match ast.kind(id) {
        NodeKind::Number(_) => true,
        NodeKind::Ident { .. } | NodeKind::SysFuncCall { .. } => false,
        NodeKind::Unary { expr, .. } => is_foldable(ast, *expr),
        NodeKind::Binary { lhs, rhs, .. } => is_foldable(ast, *lhs) && is_foldable(ast, *rhs),
        NodeKind::Conditional { cond, then_branch, else_branch } => {
            is_foldable(ast, *cond) && is_foldable(ast, *then_branch) && is_foldable(ast, *else_branch)
        }
        NodeKind::Concat(parts) => parts.iter().all(|p| is_foldable(ast, *p)),
        NodeKind::MultiConcat { count, concat } => is_foldable(ast, *count) && is_foldable(ast, *concat),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::{Ast, BinaryOp};

    #[test]
    fn literal_arithmetic_folds_to_a_number() {
        let mut ast = Ast::new();
        let expr = {
            let mut b = Builder::new(&mut ast);
            let lhs = b.unsigned(8, 2);
            let rhs = b.unsigned(8, 3);
            b.binary(BinaryOp::Times, lhs, rhs)
        };
        let folded = fold(&mut ast, expr);
        match ast.kind(folded) {
            NodeKind::Number(v) => assert_eq!(v.to_u64(), 6),
            other => panic!("expected Number, got {other:?}"),
        }
    }

    #[test]
    fn expression_with_an_identifier_is_not_folded() {
        let mut ast = Ast::new();
        let expr = {
            let mut b = Builder::new(&mut ast);
            let lhs = b.ident("x");
            let rhs = b.unsigned(8, 3);
            b.binary(BinaryOp::Plus, lhs, rhs)
        };
        assert_eq!(fold(&mut ast, expr), expr);
    }
}
