//! Module tree (§4.5). Each [`Module`] tracks one elaborated instance's
//! place in the hierarchy: its source in the [`Program`] (`psrc`), the
//! engine currently bound to it, and a version counter bumped on every
//! engine hand-off.
//!
//! This crate's single tree-walking back-end runs the whole hierarchy
//! through one flattened engine (`crate::isolate::flatten`) rather than
//! one engine per `Module`, so the tree here is bookkeeping — it names
//! each instance for the save-file format (§6) and is the shape a second,
//! per-module back-end would hang real per-instance engines off of.

use crate::ast::NodeId;

pub struct Module {
    /// Fully-qualified instance path, e.g. `top.alu0`.
    pub path: String,
    /// The instance's elaborated declaration, owned by the `Program`.
    pub psrc: NodeId,
    pub version: u32,
    pub children: Vec<Module>,
}

impl Module {
    pub fn new(path: String, psrc: NodeId) -> Self {
        Module {
            path,
            psrc,
            version: 0,
            children: Vec::new(),
        }
    }

    /// Depth-first, deterministic (declaration order) walk over this
    /// instance and every descendant — the order §4.5's construction
    /// step requires for IR regeneration and compilation.
    pub fn walk(&self) -> Vec<&Module> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }

    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}

/// Builds the `Module` tree for the instance rooted at `root_path` by
/// walking `program`'s elaborated map for nested `ModuleInstantiation`
/// items, mirroring the walk `crate::isolate::flatten` does for the engine
/// item list.
pub fn build_tree(program: &crate::program::Program, root_path: &str) -> Option<Module> {
    let root = program.elab_find(root_path)?;
    let mut module = Module::new(root_path.to_string(), root);
    let crate::ast::NodeKind::ModuleDeclaration { items, .. } = program.ast.kind(root) else {
        return Some(module);
    };
    for &item in items {
        if let crate::ast::NodeKind::ModuleInstantiation { iid, .. } = program.ast.kind(item) {
            let child_path = format!("{}.{}", root_path, iid);
            if let Some(child) = build_tree(program, &child_path) {
                module.children.push(child);
            }
        }
    }
    Some(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::{Ast, NodeKind};
    use crate::program::Program;

    #[test]
    fn tree_walk_visits_parent_before_children() {
        let mut ast = Ast::new();
        let leaf = {
            let mut b = Builder::new(&mut ast);
            b.module_decl("leaf", vec![], vec![])
        };
        let top = {
            let mut b = Builder::new(&mut ast);
            let inst = b.instantiation("leaf", "l0", vec![], vec![]);
            b.module_decl("top", vec![], vec![inst])
        };
        let mut program = Program::new(ast);
        program.declare(leaf).unwrap();
        program.declare(top).unwrap();
        let top_inst = NodeKind::ModuleInstantiation {
            module_name: "top".to_string(),
            iid: "top".to_string(),
            params: vec![],
            ports: vec![],
        };
        let id = program.ast.push_synth(top_inst);
        program.eval(id).unwrap();

        let tree = build_tree(&program, "top").unwrap();
        let paths: Vec<&str> = tree.walk().iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["top", "top.l0"]);
    }
}
