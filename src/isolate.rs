//! Isolate pass (§4.3): walks an elaborated instance tree and produces a
//! single flat list of top-level items a back-end engine can run directly,
//! plus a deterministic variable-id table.
//!
//! The original contract mangles every externally-visible identifier into a
//! `__x<v>`/`__l<v>` port/local on a stand-alone `ModuleDeclaration`, because
//! the back-ends it serves (FPGA co-simulation, independently recompiled
//! software engines) only ever see one module's text at a time and must
//! agree on variable numbering across separate compiles. This crate ships a
//! single tree-walking engine that already shares one [`crate::ast::Ast`]
//! and one [`crate::resolve::Resolver`] across the whole hierarchy, so there
//! is nothing to keep in sync across compiles — flattening here skips the
//! textual mangling and instead rewires instance boundaries directly by
//! `NodeId`, via [`crate::resolve::Resolver::bind_external`]. The numbering
//! contract survives: `Vid`s are assigned by walking the tree in a fixed
//! (depth-first, declaration) order, so two runs over the same elaborated
//! hierarchy produce the same table.

use std::collections::HashMap;

use crate::ast::{DeclStorage, NodeId, NodeKind, PortConnection, PortDirection};
use crate::error::{CascadeError, Result};
use crate::program::Program;

pub type Vid = u32;

/// Deterministic `declaration -> variable-id` table for one flattened run.
#[derive(Default, Debug)]
pub struct VarMap {
    by_decl: HashMap<NodeId, Vid>,
    by_vid: Vec<NodeId>,
}

impl VarMap {
    fn assign(&mut self, decl: NodeId) -> Vid {
        if let Some(&v) = self.by_decl.get(&decl) {
            return v;
        }
        let vid = self.by_vid.len() as Vid;
        self.by_vid.push(decl);
        self.by_decl.insert(decl, vid);
        vid
    }

    pub fn vid_of(&self, decl: NodeId) -> Option<Vid> {
        self.by_decl.get(&decl).copied()
    }

    pub fn decl_of(&self, vid: Vid) -> Option<NodeId> {
        self.by_vid.get(vid as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.by_vid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_vid.is_empty()
    }
}

/// The flattened form of an elaborated instance tree: a single item list an
/// engine can evaluate, and the variable-id table assigned while building it.
pub struct FlatProgram {
    pub items: Vec<NodeId>,
    pub vars: VarMap,
}

/// Flattens the instance tree rooted at `root_path` (as recorded by
/// [`Program::eval`]) into a [`FlatProgram`]. Every non-instantiation item
/// from every elaborated module in the tree is kept; each
/// `ModuleInstantiation` is replaced by one synthetic `ContinuousAssign` per
/// port connection, wiring the connection's outside expression straight to
/// the instance's port declaration by `NodeId` rather than by name.
pub fn flatten(program: &mut Program, root_path: &str) -> Result<FlatProgram> {
    let root = program
        .elab_find(root_path)
        .ok_or_else(|| CascadeError::UndefinedReference {
            kind: "elaborated instance",
            name: root_path.to_string(),
        })?;

    let mut items = Vec::new();
    let mut vars = VarMap::default();
    let mut stack = vec![(root_path.to_string(), root)];
    while let Some((path, module)) = stack.pop() {
        let NodeKind::ModuleDeclaration { ports, items: mod_items, .. } = program.ast.kind(module).clone() else {
            continue;
        };
        for &port in &ports {
            vars.assign(port);
        }
        for &item in &mod_items {
            if let NodeKind::ModuleInstantiation { iid, ports: conns, .. } = program.ast.kind(item).clone() {
                let child_path = format!("{}.{}", path, iid);
                let Some(child) = program.elab_find(&child_path) else {
                    continue; // nested instantiation failed to elaborate; already logged
                };
                wire_connections(program, child, &conns, &mut items)?;
                stack.push((child_path, child));
            } else {
                if let NodeKind::Decl(_) = program.ast.kind(item) {
                    vars.assign(item);
                }
                items.push(item);
            }
        }
    }
    Ok(FlatProgram { items, vars })
}

/// For each port connection on an instantiation, synthesizes the assign
/// that moves data across the boundary and binds its port-side identifier
/// directly to the port declaration (bypassing lexical scope lookup, which
/// cannot see across an instance boundary, per §4.2).
fn wire_connections(
    program: &mut Program,
    child_module: NodeId,
    conns: &[PortConnection],
    out: &mut Vec<NodeId>,
) -> Result<()> {
    let NodeKind::ModuleDeclaration { ports, .. } = program.ast.kind(child_module).clone() else {
        return Ok(());
    };
    for (i, conn) in conns.iter().enumerate() {
        let port = match &conn.name {
            Some(name) => ports.iter().copied().find(|&p| matches!(program.ast.kind(p), NodeKind::Decl(d) if &d.name == name)),
            None => ports.get(i).copied(),
        };
        let Some(port) = port else {
            return Err(CascadeError::UndefinedReference {
                kind: "port",
                name: conn.name.clone().unwrap_or_else(|| format!("#{i}")),
            });
        };
        let NodeKind::Decl(d) = program.ast.kind(port).clone() else {
            continue;
        };
        let port_ident = program.ast.push_synth(NodeKind::Ident {
            path: vec![format!("__port_{}", d.name)],
            indices: vec![],
            range: None,
        });
        program.resolver.bind_external(port_ident, port);

        let assign = match d.port_direction {
            Some(PortDirection::Input) => program.ast.push_synth(NodeKind::ContinuousAssign {
                lhs: port_ident,
                rhs: conn.expr,
            }),
            Some(PortDirection::Output) => program.ast.push_synth(NodeKind::ContinuousAssign {
                lhs: conn.expr,
                rhs: port_ident,
            }),
            // Inout ports are treated as bidirectional nets, approximated
            // here as a second assign feeding the port from the outside.
            Some(PortDirection::Inout) | None => program.ast.push_synth(NodeKind::ContinuousAssign {
                lhs: port_ident,
                rhs: conn.expr,
            }),
        };
        program.ast.link_children(assign);
        out.push(assign);
    }
    Ok(())
}

/// `true` for a declaration storage class that still needs an engine-owned
/// state slot after isolation (parameters/localparams/genvars are folded to
/// constants by earlier passes and carry no runtime state of their own).
pub fn is_stateful(storage: DeclStorage) -> bool {
    matches!(storage, DeclStorage::Net | DeclStorage::Reg | DeclStorage::Integer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::{Ast, DeclStorage, PortDirection};

    #[test]
    fn flatten_wires_child_output_port_to_parent_net() {
        let mut ast = Ast::new();
        let leaf_module = {
            let mut b = Builder::new(&mut ast);
            let one = b.unsigned(1, 1);
            let q = b.port_decl("q", 1, PortDirection::Output, DeclStorage::Reg);
            let q_ident = b.ident("q");
            let assign = b.continuous_assign(q_ident, one);
            b.module_decl("leaf", vec![q], vec![assign])
        };
        let top_net = {
            let mut b = Builder::new(&mut ast);
            let net = b.net_decl("w", 1, None);
            net
        };
        let inst = {
            let mut b = Builder::new(&mut ast);
            let w_ident = b.ident("w");
            b.instantiation(
                "leaf",
                "l0",
                vec![],
                vec![PortConnection { name: Some("q".to_string()), expr: w_ident }],
            )
        };
        let top_module = Builder::new(&mut ast).module_decl("top", vec![], vec![top_net, inst]);

        let mut program = Program::new(ast);
        program.declare(leaf_module).unwrap();
        program.declare(top_module).unwrap();
        let top_inst = NodeKind::ModuleInstantiation {
            module_name: "top".to_string(),
            iid: "top".to_string(),
            params: vec![],
            ports: vec![],
        };
        let top_inst_id = program.ast.push_synth(top_inst);
        program.eval(top_inst_id).unwrap();

        let flat = flatten(&mut program, "top").unwrap();
        assert!(!flat.items.is_empty());
        assert!(!flat.vars.is_empty());
    }
}
