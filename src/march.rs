//! Retarget / march support (§6, "marches").
//!
//! A march is an attribute, recorded on a [`NodeKind::ModuleDeclaration`]'s
//! `attrs` map, naming which back-end a module should run on next time it
//! is elaborated. Retargeting a running simulation means: checkpoint the
//! old engine's state (`Engine::get_state`/`get_input`), swap the march
//! attribute, re-elaborate, build the new engine, and restore the
//! checkpoint into it — the "engine swap atomicity" contract in §4.5.
//! This crate ships one engine, so `retarget` here is necessarily a
//! same-engine round trip (state out, state back in); it exists so the
//! hand-off contract has a real, tested implementation even though there's
//! only one back-end to hand off to.

use crate::ast::NodeId;
use crate::engine::{Engine, StateMap};
use crate::error::{CascadeError, Result};
use crate::program::Program;

pub const MARCH_ATTR: &str = "march";

/// Reads the march name currently recorded on `module`'s declaration, if
/// any.
pub fn current_march(program: &Program, module: NodeId) -> Option<String> {
    let crate::ast::NodeKind::ModuleDeclaration { attrs, .. } = program.ast.kind(module) else {
        return None;
    };
    attrs.get(MARCH_ATTR).cloned()
}

/// Sets the march attribute on the *declared* (pre-elaboration) module
/// named `module_name`. Takes effect the next time that module is
/// instantiated; an already-elaborated instance must go through
/// [`Checkpoint::capture`]/[`Checkpoint::restore`] around a fresh `eval` to
/// pick it up.
pub fn set_march(program: &mut Program, module_name: &str, march: &str) -> Result<()> {
    let decl = program
        .decl_find(module_name)
        .ok_or_else(|| CascadeError::UndefinedReference {
            kind: "module",
            name: module_name.to_string(),
        })?;
    // `Ast` nodes are append-only and `ModuleDeclaration.attrs` has no
    // interior mutability, so retargeting rewrites by copying the node's
    // `NodeKind` rather than mutating it in place, and leaves the stale
    // declaration dangling (harmless: nothing but `decl_find` reaches it,
    // and that table is about to point at the new node instead).
    let crate::ast::NodeKind::ModuleDeclaration { name, ports, items, attrs } = program.ast.kind(decl).clone() else {
        return Err(CascadeError::Typecheck(format!("'{}' is not a module", module_name)));
    };
    let mut attrs = attrs;
    attrs.insert(MARCH_ATTR.to_string(), march.to_string());
    let new_decl = program.ast.push_synth(crate::ast::NodeKind::ModuleDeclaration {
        name,
        ports,
        items,
        attrs,
    });
    program.ast.link_children(new_decl);
    program.replace_decl(module_name, new_decl)
}

/// A captured engine checkpoint (§4.5): state plus the input values the
/// engine was last driven with, carried across a retarget's re-elaboration.
pub struct Checkpoint {
    pub state: StateMap,
    pub input: StateMap,
}

impl Checkpoint {
    pub fn capture(engine: &impl Engine) -> Self {
        Checkpoint {
            state: engine.get_state(),
            input: engine.get_input(),
        }
    }

    pub fn restore(&self, engine: &mut impl Engine) {
        engine.set_state(&self.state);
        engine.set_input(&self.input);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::{Ast, NodeKind};

    #[test]
    fn set_march_records_the_attribute_on_a_fresh_declaration_node() {
        let mut ast = Ast::new();
        let module = Builder::new(&mut ast).module_decl("top", vec![], vec![]);
        let mut program = Program::new(ast);
        program.declare(module).unwrap();

        set_march(&mut program, "top", "fpga-x1").unwrap();
        let decl = program.decl_find("top").unwrap();
        assert_eq!(current_march(&program, decl).as_deref(), Some("fpga-x1"));
    }
}
