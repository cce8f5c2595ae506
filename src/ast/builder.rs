//! Programmatic AST construction.
//!
//! The lexer/parser that turns HDL source text into these nodes is an
//! external collaborator (§1): this module is the contract it is expected
//! to build against — push a node, get back a stable [`NodeId`] with parent
//! links already wired to its children. Tests and the CLI's manifest loader
//! use it directly in place of a textual front end.

use std::rc::Rc;

use super::node::*;
use super::ops::{BinaryOp, EdgeType, UnaryOp};
use crate::bits::{BitType, Bits};

pub struct Builder<'a> {
    pub ast: &'a mut Ast,
    file: Rc<str>,
    line: u32,
}

impl<'a> Builder<'a> {
    pub fn new(ast: &'a mut Ast) -> Self {
        Builder {
            ast,
            file: Rc::from("<builder>"),
            line: 0,
        }
    }

    pub fn at(ast: &'a mut Ast, file: &str, line: u32) -> Self {
        Builder {
            ast,
            file: Rc::from(file),
            line,
        }
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc {
            file: self.file.clone(),
            line: self.line,
        }
    }

    fn emit(&mut self, kind: NodeKind) -> NodeId {
        let loc = self.loc();
        let id = self.ast.push(kind, loc);
        self.ast.link_children(id);
        id
    }

    pub fn number(&mut self, bits: Bits) -> NodeId {
        self.emit(NodeKind::Number(bits))
    }

    pub fn unsigned(&mut self, width: usize, val: u64) -> NodeId {
        self.number(Bits::from_u64(width, BitType::Unsigned, val))
    }

    pub fn signed(&mut self, width: usize, val: i64) -> NodeId {
        self.number(Bits::from_i64(width, val))
    }

    pub fn string_lit(&mut self, s: impl Into<String>) -> NodeId {
        self.emit(NodeKind::StringLit(s.into()))
    }

    pub fn ident(&mut self, name: impl Into<String>) -> NodeId {
        self.emit(NodeKind::Ident {
            path: vec![name.into()],
            indices: vec![],
            range: None,
        })
    }

    pub fn hier_ident(&mut self, path: Vec<String>) -> NodeId {
        self.emit(NodeKind::Ident {
            path,
            indices: vec![],
            range: None,
        })
    }

    pub fn index(&mut self, name: impl Into<String>, indices: Vec<NodeId>) -> NodeId {
        self.emit(NodeKind::Ident {
            path: vec![name.into()],
            indices,
            range: None,
        })
    }

    pub fn bit_select(&mut self, name: impl Into<String>, range: NodeId) -> NodeId {
        self.emit(NodeKind::Ident {
            path: vec![name.into()],
            indices: vec![],
            range: Some(range),
        })
    }

    pub fn range_const(&mut self, msb: i64, lsb: i64) -> NodeId {
        self.emit(NodeKind::RangeConst { msb, lsb })
    }

    pub fn range_plus(&mut self, base: NodeId, width: usize) -> NodeId {
        self.emit(NodeKind::RangePlus { base, width })
    }

    pub fn range_minus(&mut self, base: NodeId, width: usize) -> NodeId {
        self.emit(NodeKind::RangeMinus { base, width })
    }

    pub fn unary(&mut self, op: UnaryOp, expr: NodeId) -> NodeId {
        self.emit(NodeKind::Unary { op, expr })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.emit(NodeKind::Binary { op, lhs, rhs })
    }

    pub fn conditional(&mut self, cond: NodeId, then_branch: NodeId, else_branch: NodeId) -> NodeId {
        self.emit(NodeKind::Conditional {
            cond,
            then_branch,
            else_branch,
        })
    }

    pub fn concat(&mut self, parts: Vec<NodeId>) -> NodeId {
        self.emit(NodeKind::Concat(parts))
    }

    pub fn multi_concat(&mut self, count: NodeId, concat: NodeId) -> NodeId {
        self.emit(NodeKind::MultiConcat { count, concat })
    }

    pub fn sys_func(&mut self, name: impl Into<String>, args: Vec<NodeId>) -> NodeId {
        self.emit(NodeKind::SysFuncCall {
            name: name.into(),
            args,
        })
    }

    pub fn sys_task(&mut self, name: impl Into<String>, args: Vec<NodeId>) -> NodeId {
        self.emit(NodeKind::SysTaskCall {
            name: name.into(),
            args,
        })
    }

    pub fn net_decl(&mut self, name: impl Into<String>, width: usize, init: Option<NodeId>) -> NodeId {
        self.decl(DeclInfo {
            name: name.into(),
            storage: DeclStorage::Net,
            width,
            signed: false,
            real: false,
            dims: vec![],
            init,
            port_direction: None,
        })
    }

    pub fn reg_decl(
        &mut self,
        name: impl Into<String>,
        width: usize,
        signed: bool,
        dims: Vec<usize>,
        init: Option<NodeId>,
    ) -> NodeId {
        self.decl(DeclInfo {
            name: name.into(),
            storage: DeclStorage::Reg,
            width,
            signed,
            real: false,
            dims,
            init,
            port_direction: None,
        })
    }

    pub fn integer_decl(&mut self, name: impl Into<String>, init: Option<NodeId>) -> NodeId {
        self.decl(DeclInfo {
            name: name.into(),
            storage: DeclStorage::Integer,
            width: 32,
            signed: true,
            real: false,
            dims: vec![],
            init,
            port_direction: None,
        })
    }

    pub fn real_decl(&mut self, name: impl Into<String>, init: Option<NodeId>) -> NodeId {
        self.decl(DeclInfo {
            name: name.into(),
            storage: DeclStorage::Reg,
            width: 64,
            signed: true,
            real: true,
            dims: vec![],
            init,
            port_direction: None,
        })
    }

    pub fn param_decl(&mut self, name: impl Into<String>, width: usize, init: NodeId) -> NodeId {
        self.decl(DeclInfo {
            name: name.into(),
            storage: DeclStorage::Parameter,
            width,
            signed: false,
            real: false,
            dims: vec![],
            init: Some(init),
            port_direction: None,
        })
    }

    pub fn localparam_decl(&mut self, name: impl Into<String>, width: usize, init: NodeId) -> NodeId {
        self.decl(DeclInfo {
            name: name.into(),
            storage: DeclStorage::Localparam,
            width,
            signed: false,
            real: false,
            dims: vec![],
            init: Some(init),
            port_direction: None,
        })
    }

    pub fn genvar_decl(&mut self, name: impl Into<String>) -> NodeId {
        self.decl(DeclInfo {
            name: name.into(),
            storage: DeclStorage::Genvar,
            width: 32,
            signed: true,
            real: false,
            dims: vec![],
            init: None,
            port_direction: None,
        })
    }

    pub fn port_decl(
        &mut self,
        name: impl Into<String>,
        width: usize,
        dir: PortDirection,
        storage: DeclStorage,
    ) -> NodeId {
        self.decl(DeclInfo {
            name: name.into(),
            storage,
            width,
            signed: false,
            real: false,
            dims: vec![],
            init: None,
            port_direction: Some(dir),
        })
    }

    fn decl(&mut self, info: DeclInfo) -> NodeId {
        self.emit(NodeKind::Decl(info))
    }

    pub fn continuous_assign(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.emit(NodeKind::ContinuousAssign { lhs, rhs })
    }

    pub fn blocking_assign(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.emit(NodeKind::BlockingAssign { lhs, rhs })
    }

    pub fn nonblocking_assign(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.emit(NodeKind::NonblockingAssign { lhs, rhs })
    }

    pub fn packed_assign(&mut self, targets: Vec<NodeId>, rhs: NodeId) -> NodeId {
        self.emit(NodeKind::PackedAssign { targets, rhs })
    }

    pub fn begin(&mut self, stmts: Vec<NodeId>) -> NodeId {
        self.emit(NodeKind::Begin(stmts))
    }

    pub fn if_stmt(&mut self, cond: NodeId, then_branch: NodeId, else_branch: Option<NodeId>) -> NodeId {
        self.emit(NodeKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    pub fn case_stmt(&mut self, cond: NodeId, arms: Vec<CaseArm>, default: Option<NodeId>) -> NodeId {
        self.emit(NodeKind::Case {
            cond,
            arms,
            default,
        })
    }

    pub fn for_loop(&mut self, init: NodeId, cond: NodeId, step: NodeId, body: NodeId) -> NodeId {
        self.emit(NodeKind::ForLoop {
            init,
            cond,
            step,
            body,
        })
    }

    pub fn while_loop(&mut self, cond: NodeId, body: NodeId) -> NodeId {
        self.emit(NodeKind::WhileLoop { cond, body })
    }

    pub fn repeat_loop(&mut self, count: NodeId, body: NodeId) -> NodeId {
        self.emit(NodeKind::RepeatLoop { count, body })
    }

    pub fn event(&mut self, edge: EdgeType, expr: NodeId) -> NodeId {
        self.emit(NodeKind::Event { edge, expr })
    }

    pub fn event_control(&mut self, events: Vec<NodeId>, body: NodeId) -> NodeId {
        self.emit(NodeKind::EventControl { events, body })
    }

    pub fn always(&mut self, body: NodeId) -> NodeId {
        self.emit(NodeKind::AlwaysConstruct { body })
    }

    pub fn initial(&mut self, body: NodeId, ignore: bool) -> NodeId {
        self.emit(NodeKind::InitialConstruct { body, ignore })
    }

    pub fn instantiation(
        &mut self,
        module_name: impl Into<String>,
        iid: impl Into<String>,
        params: Vec<(String, NodeId)>,
        ports: Vec<PortConnection>,
    ) -> NodeId {
        self.emit(NodeKind::ModuleInstantiation {
            module_name: module_name.into(),
            iid: iid.into(),
            params,
            ports,
        })
    }

    pub fn generate_for(
        &mut self,
        genvar: impl Into<String>,
        init: i64,
        limit: NodeId,
        step: i64,
        body: Vec<NodeId>,
        block_prefix: impl Into<String>,
    ) -> NodeId {
        self.emit(NodeKind::GenerateFor {
            genvar: genvar.into(),
            init,
            limit,
            step,
            body,
            block_prefix: block_prefix.into(),
        })
    }

    pub fn generate_if(&mut self, cond: NodeId, then_items: Vec<NodeId>, else_items: Vec<NodeId>) -> NodeId {
        self.emit(NodeKind::GenerateIf {
            cond,
            then_items,
            else_items,
        })
    }

    pub fn module_decl(
        &mut self,
        name: impl Into<String>,
        ports: Vec<NodeId>,
        items: Vec<NodeId>,
    ) -> NodeId {
        self.emit(NodeKind::ModuleDeclaration {
            name: name.into(),
            ports,
            items,
            attrs: Default::default(),
        })
    }
}
