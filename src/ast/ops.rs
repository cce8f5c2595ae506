//! Operator tags. Kept separate from [`super::node::NodeKind`] so the width/
//! type rules in `evaluate.rs` can match on them without pulling in the rest
//! of the node representation.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Plus,
    Minus,
    Times,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Xnor,
    Eq,
    Neq,
    CaseEq,
    CaseNeq,
    Lt,
    Leq,
    Gt,
    Geq,
    LogAnd,
    LogOr,
    ShiftLeft,
    ShiftRight,
    ShiftLeftArith,
    ShiftRightArith,
    Pow,
}

impl BinaryOp {
    /// Arithmetic/bitwise operators that context-determine both operands to
    /// the parent's width (§4.1 rule 2).
    pub fn widens_both_operands(self) -> bool {
        matches!(
            self,
            BinaryOp::Plus
                | BinaryOp::Minus
                | BinaryOp::Times
                | BinaryOp::Div
                | BinaryOp::Mod
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Xnor
        )
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::CaseEq
                | BinaryOp::CaseNeq
                | BinaryOp::Lt
                | BinaryOp::Leq
                | BinaryOp::Gt
                | BinaryOp::Geq
                | BinaryOp::LogAnd
                | BinaryOp::LogOr
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(
            self,
            BinaryOp::ShiftLeft
                | BinaryOp::ShiftRight
                | BinaryOp::ShiftLeftArith
                | BinaryOp::ShiftRightArith
        )
    }

    pub fn is_pow(self) -> bool {
        matches!(self, BinaryOp::Pow)
    }

    /// Comparison/logical operators always produce an unsigned bit.
    pub fn yields_unsigned_bit(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::CaseEq
                | BinaryOp::CaseNeq
                | BinaryOp::Lt
                | BinaryOp::Leq
                | BinaryOp::Gt
                | BinaryOp::Geq
                | BinaryOp::LogAnd
                | BinaryOp::LogOr
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Xnor
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Plus,
    Minus,
    Tilde,
    ReduceAnd,
    ReduceNand,
    ReduceOr,
    ReduceNor,
    ReduceXor,
    ReduceXnor,
    LogNot,
}

impl UnaryOp {
    pub fn is_reduction(self) -> bool {
        matches!(
            self,
            UnaryOp::ReduceAnd
                | UnaryOp::ReduceNand
                | UnaryOp::ReduceOr
                | UnaryOp::ReduceNor
                | UnaryOp::ReduceXor
                | UnaryOp::ReduceXnor
                | UnaryOp::LogNot
        )
    }

    pub fn drops_sign(self) -> bool {
        matches!(self, UnaryOp::Tilde)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EdgeType {
    Posedge,
    Negedge,
    Either,
}
