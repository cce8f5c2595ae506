//! Compiled-AST manifest loader.
//!
//! The HDL lexer/parser is an external collaborator (§1) this crate never
//! implements; what it hands this crate is the AST itself. This loader is
//! that hand-off's concrete shape: a JSON document holding one arena's
//! worth of [`NodeKind`]s in push order (so a `NodeId` is simply an index
//! into the `nodes` array, exactly as `Ast::push` would have assigned it)
//! plus the list of top-level module declarations to register with a
//! [`Program`].

use serde::Deserialize;

use crate::ast::{Ast, NodeId, NodeKind};
use crate::error::{CascadeError, Result};
use crate::program::Program;

#[derive(Deserialize)]
struct AstFile {
    nodes: Vec<NodeKind>,
    modules: Vec<NodeId>,
}

/// Loads `path`, replays its node list into a fresh [`Ast`] in order, and
/// declares every named module against a fresh [`Program`].
pub fn load_program(path: impl AsRef<std::path::Path>) -> Result<Program> {
    let text = std::fs::read_to_string(path)?;
    let file: AstFile = serde_json::from_str(&text).map_err(|e| CascadeError::Config(e.to_string()))?;

    let mut ast = Ast::new();
    for kind in file.nodes {
        ast.push_synth(kind);
    }
    for id in 0..ast.len() {
        ast.link_children(id);
    }

    let mut program = Program::new(ast);
    for module in file.modules {
        program.declare(module)?;
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Writes a compiled-AST document to a real file and loads it back,
    /// exercising the hand-off this module exists for against an actual
    /// filesystem round trip rather than an in-memory `Ast`.
    #[test]
    fn load_program_declares_modules_from_a_manifest_file() {
        let nodes = vec![NodeKind::ModuleDeclaration {
            name: "top".to_string(),
            ports: vec![],
            items: vec![],
            attrs: Default::default(),
        }];
        let text = serde_json::to_string(&serde_json::json!({
            "nodes": nodes,
            "modules": [0],
        }))
        .unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();

        let program = load_program(file.path()).unwrap();
        assert!(program.decl_find("top").is_some());
    }
}
