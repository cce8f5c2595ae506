//! Arena-allocated AST.
//!
//! The original system decorates AST nodes intrusively (a value cache, a
//! dirty bit, a monitor list living directly on the node). Reimplemented
//! here as an arena of [`Node`]s addressed by [`NodeId`]: the decoration
//! (parent link, flags, cached value, monitor list) lives as ordinary fields
//! on the arena slot, and `NodeKind` carries only the node's own shape. This
//! keeps invalidation and the node tied together (the redesign note in the
//! spec's design notes calls out this exact trade) while avoiding a
//! second, out-of-band side table that could fall out of sync with the tree.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::ast::ops::{BinaryOp, EdgeType, UnaryOp};
use crate::bits::Bits;

pub type NodeId = usize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeFlags {
    pub dirty: bool,
    pub scheduled: bool,
}

#[derive(Clone, Debug)]
pub struct SourceLoc {
    pub file: Rc<str>,
    pub line: u32,
}

impl SourceLoc {
    pub fn synthetic() -> Self {
        SourceLoc {
            file: Rc::from("<synthesized>"),
            line: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PortDirection {
    Input,
    Output,
    Inout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeclStorage {
    Net,
    Reg,
    Integer,
    Parameter,
    Localparam,
    Genvar,
}

/// A declaration's shape: bit width, signedness, and any array dimensions
/// (declared outermost-first, matching `dereference`'s row-major rule).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DeclInfo {
    pub name: String,
    pub storage: DeclStorage,
    pub width: usize,
    pub signed: bool,
    pub real: bool,
    pub dims: Vec<usize>,
    pub init: Option<NodeId>,
    pub port_direction: Option<PortDirection>,
}

impl DeclInfo {
    pub fn total_elements(&self) -> usize {
        self.dims.iter().product::<usize>().max(1)
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CaseArm {
    pub labels: Vec<NodeId>,
    pub body: NodeId,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GenerateCaseArm {
    pub labels: Vec<NodeId>,
    pub items: Vec<NodeId>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PortConnection {
    pub name: Option<String>,
    pub expr: NodeId,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum NodeKind {
    Number(Bits),
    StringLit(String),

    /// `path` is a hierarchical reference (`a.b.c`); length 1 for ordinary
    /// local identifiers. `indices` are array-dereference expressions
    /// (outermost dimension first); `range` optionally names a bit-select.
    Ident {
        path: Vec<String>,
        indices: Vec<NodeId>,
        range: Option<NodeId>,
    },

    Unary {
        op: UnaryOp,
        expr: NodeId,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Conditional {
        cond: NodeId,
        then_branch: NodeId,
        else_branch: NodeId,
    },
    Concat(Vec<NodeId>),
    MultiConcat {
        count: NodeId,
        concat: NodeId,
    },

    /// `[msb:lsb]` with statically known bounds.
    RangeConst {
        msb: i64,
        lsb: i64,
    },
    /// `[base +: width]`
    RangePlus {
        base: NodeId,
        width: usize,
    },
    /// `[base -: width]`
    RangeMinus {
        base: NodeId,
        width: usize,
    },

    /// `$feof`, `$fopen`, `$time`, `$random`, ... used in expression position.
    SysFuncCall {
        name: String,
        args: Vec<NodeId>,
    },

    Decl(DeclInfo),

    ContinuousAssign {
        lhs: NodeId,
        rhs: NodeId,
    },
    BlockingAssign {
        lhs: NodeId,
        rhs: NodeId,
    },
    NonblockingAssign {
        lhs: NodeId,
        rhs: NodeId,
    },
    /// `{a, b, c} = expr` — eliminated by `AssignUnpack` before reaching a
    /// back-end, kept here so the pass has something to rewrite.
    PackedAssign {
        targets: Vec<NodeId>,
        rhs: NodeId,
    },

    Begin(Vec<NodeId>),
    If {
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    Case {
        cond: NodeId,
        arms: Vec<CaseArm>,
        default: Option<NodeId>,
    },
    ForLoop {
        init: NodeId,
        cond: NodeId,
        step: NodeId,
        body: NodeId,
    },
    WhileLoop {
        cond: NodeId,
        body: NodeId,
    },
    RepeatLoop {
        count: NodeId,
        body: NodeId,
    },

    Event {
        edge: EdgeType,
        expr: NodeId,
    },
    /// `always @(...) body`; `events` empty means `@(*)` (sensitivity is
    /// derived by `EventExpand` before a back-end that requires it runs).
    EventControl {
        events: Vec<NodeId>,
        body: NodeId,
    },
    AlwaysConstruct {
        body: NodeId,
    },
    InitialConstruct {
        body: NodeId,
        ignore: bool,
    },

    SysTaskCall {
        name: String,
        args: Vec<NodeId>,
    },

    ModuleInstantiation {
        module_name: String,
        iid: String,
        params: Vec<(String, NodeId)>,
        ports: Vec<PortConnection>,
    },

    GenerateFor {
        genvar: String,
        init: i64,
        limit: NodeId,
        step: i64,
        body: Vec<NodeId>,
        block_prefix: String,
    },
    GenerateIf {
        cond: NodeId,
        then_items: Vec<NodeId>,
        else_items: Vec<NodeId>,
    },
    GenerateCase {
        cond: NodeId,
        arms: Vec<GenerateCaseArm>,
        default: Vec<NodeId>,
    },

    ModuleDeclaration {
        name: String,
        ports: Vec<NodeId>,
        items: Vec<NodeId>,
        attrs: std::collections::BTreeMap<String, String>,
    },
}

pub struct Node {
    pub parent: Cell<Option<NodeId>>,
    pub flags: Cell<NodeFlags>,
    pub loc: SourceLoc,
    /// Cached evaluated value(s); length 1 for scalar expressions, length
    /// `total_elements()` for array declarations.
    pub bit_val: RefCell<Vec<Bits>>,
    /// Nodes whose evaluation depends on this one (populated by the
    /// resolver when an identifier resolves and, for declarations, reused by
    /// an engine's active-scheduling as the "who reads me" set).
    pub monitors: RefCell<Vec<NodeId>>,
    pub kind: NodeKind,
}

impl Node {
    fn new(kind: NodeKind, loc: SourceLoc) -> Self {
        Node {
            parent: Cell::new(None),
            flags: Cell::new(NodeFlags {
                dirty: true,
                scheduled: false,
            }),
            loc,
            bit_val: RefCell::new(vec![Bits::zero(1)]),
            monitors: RefCell::new(Vec::new()),
            kind,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.get().dirty
    }

    pub fn set_dirty(&self, d: bool) {
        let mut f = self.flags.get();
        f.dirty = d;
        self.flags.set(f);
    }

    pub fn is_scheduled(&self) -> bool {
        self.flags.get().scheduled
    }

    pub fn set_scheduled(&self, s: bool) {
        let mut f = self.flags.get();
        f.scheduled = s;
        self.flags.set(f);
    }
}

/// The AST arena. Owns every node reachable from any declared module and
/// destroys them together; IR passes build their output in a fresh `Ast`
/// rather than mutating this one in place (§3: "IR passes produce new ASTs
/// with identical semantics").
#[derive(Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Ast { nodes: Vec::new() }
    }

    pub fn push(&mut self, kind: NodeKind, loc: SourceLoc) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(kind, loc));
        id
    }

    pub fn push_synth(&mut self, kind: NodeKind) -> NodeId {
        self.push(kind, SourceLoc::synthetic())
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn set_parent(&self, child: NodeId, parent: NodeId) {
        self.nodes[child].parent.set(Some(parent));
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent.get()
    }

    /// Children touched directly by a node, used by the resolver for
    /// lexical-scope walks and by IR passes for generic subtree recursion.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        use NodeKind::*;
        match &self.nodes[id].kind {
            Number(_) | StringLit(_) | RangeConst { .. } => vec![],
            Ident {
                indices, range, ..
            } => {
                let mut v = indices.clone();
                v.extend(range.iter().copied());
                v
            }
            Unary { expr, .. } => vec![*expr],
            Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Conditional {
                cond,
                then_branch,
                else_branch,
            } => vec![*cond, *then_branch, *else_branch],
            Concat(v) => v.clone(),
            MultiConcat { count, concat } => vec![*count, *concat],
            RangePlus { base, .. } | RangeMinus { base, .. } => vec![*base],
            SysFuncCall { args, .. } => args.clone(),
            Decl(d) => d.init.iter().copied().collect(),
            ContinuousAssign { lhs, rhs }
            | BlockingAssign { lhs, rhs }
            | NonblockingAssign { lhs, rhs } => vec![*lhs, *rhs],
            PackedAssign { targets, rhs } => {
                let mut v = targets.clone();
                v.push(*rhs);
                v
            }
            Begin(v) => v.clone(),
            If {
                cond,
                then_branch,
                else_branch,
            } => {
                let mut v = vec![*cond, *then_branch];
                v.extend(else_branch.iter().copied());
                v
            }
            Case {
                cond,
                arms,
                default,
            } => {
                let mut v = vec![*cond];
                for a in arms {
                    v.extend(a.labels.iter().copied());
                    v.push(a.body);
                }
                v.extend(default.iter().copied());
                v
            }
            ForLoop {
                init,
                cond,
                step,
                body,
            } => vec![*init, *cond, *step, *body],
            WhileLoop { cond, body } => vec![*cond, *body],
            RepeatLoop { count, body } => vec![*count, *body],
            Event { expr, .. } => vec![*expr],
            EventControl { events, body } => {
                let mut v = events.clone();
                v.push(*body);
                v
            }
            AlwaysConstruct { body } => vec![*body],
            InitialConstruct { body, .. } => vec![*body],
            SysTaskCall { args, .. } => args.clone(),
            ModuleInstantiation { params, ports, .. } => {
                let mut v: Vec<NodeId> = params.iter().map(|(_, n)| *n).collect();
                v.extend(ports.iter().map(|p| p.expr));
                v
            }
            GenerateFor { limit, body, .. } => {
                let mut v = vec![*limit];
                v.extend(body.iter().copied());
                v
            }
            GenerateIf {
                cond,
                then_items,
                else_items,
            } => {
                let mut v = vec![*cond];
                v.extend(then_items.iter().copied());
                v.extend(else_items.iter().copied());
                v
            }
            GenerateCase {
                cond,
                arms,
                default,
            } => {
                let mut v = vec![*cond];
                for a in arms {
                    v.extend(a.labels.iter().copied());
                    v.extend(a.items.iter().copied());
                }
                v.extend(default.iter().copied());
                v
            }
            ModuleDeclaration { ports, items, .. } => {
                let mut v = ports.clone();
                v.extend(items.iter().copied());
                v
            }
        }
    }

    pub fn link_children(&self, id: NodeId) {
        for c in self.children(id) {
            self.set_parent(c, id);
        }
    }
}
