//! IndexNormalize (§4.4): a constant range `[hi:lo]` with `lo != 0` is
//! rewritten to the equivalent zero-based `[hi-lo:0]`; a caller adjusting
//! every use would subtract `lo` from the corresponding index expression.
//!
//! Optional for the software interpreter (§4.4 names it explicitly as
//! such) — [`crate::evaluate::Evaluator::range_bounds`] already resolves
//! an arbitrary `lo` directly, so the reference engine never calls this.
//! Kept for a back-end whose slice primitive requires a zero-based range.

use crate::ast::{Ast, NodeId, NodeKind};

/// Returns `(normalized_range, lo)` if `range` is a constant range with
/// `lo != 0`; otherwise returns `(range, 0)` unchanged.
pub fn normalize(ast: &mut Ast, range: NodeId) -> (NodeId, i64) {
    let NodeKind::RangeConst { msb, lsb } = ast.kind(range).clone() else {
        return (range, 0);
    };
    if lsb == 0 {
        return (range, 0);
    }
    let shifted = ast.push_synth(NodeKind::RangeConst { msb: msb - lsb, lsb: 0 });
    (shifted, lsb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ast;

    #[test]
    fn nonzero_lo_shifts_to_zero_based() {
        let mut ast = Ast::new();
        let range = ast.push_synth(NodeKind::RangeConst { msb: 7, lsb: 4 });
        let (shifted, lo) = normalize(&mut ast, range);
        assert_eq!(lo, 4);
        match ast.kind(shifted) {
            NodeKind::RangeConst { msb, lsb } => assert_eq!((*msb, *lsb), (3, 0)),
            other => panic!("expected RangeConst, got {other:?}"),
        }
    }

    #[test]
    fn already_zero_based_is_untouched() {
        let mut ast = Ast::new();
        let range = ast.push_synth(NodeKind::RangeConst { msb: 7, lsb: 0 });
        assert_eq!(normalize(&mut ast, range), (range, 0));
    }
}
