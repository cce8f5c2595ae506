pub mod builder;
pub mod node;
pub mod ops;

pub use node::{
    Ast, CaseArm, DeclInfo, DeclStorage, GenerateCaseArm, Node, NodeFlags, NodeId, NodeKind,
    PortConnection, PortDirection, SourceLoc,
};
pub use ops::{BinaryOp, EdgeType, UnaryOp};
