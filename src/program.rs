//! Declaration store and instance-tree elaborator (§4.2, grounded in
//! `verilog/program/program.h`). A [`Program`] owns two checkpointable
//! maps: `decls` holds one [`crate::ast::NodeKind::ModuleDeclaration`] per
//! module name exactly as declared; `elabs` holds one *elaborated* copy per
//! fully-qualified instance path, produced by walking the instance tree and
//! deep-copying each declaration's item list into the runtime [`Ast`] under
//! that path's namespace. The [`crate::isolate`] pass (not this one) is
//! responsible for flattening an elaborated tree into mangled, port-free
//! form for a back-end engine.

use std::collections::HashMap;

use crate::ast::{Ast, NodeId, NodeKind, PortConnection};
use crate::error::{CascadeError, Result};
use crate::resolve::Resolver;
use crate::undo::UndoMap;

pub struct Program {
    pub ast: Ast,
    decls: UndoMap<String, NodeId>,
    elabs: UndoMap<String, NodeId>,
    root_decl: Option<String>,
    root_elab: Option<String>,
    inst_queue: Vec<PendingInst>,
    pub resolver: Resolver,
    pub log: Vec<CascadeError>,
}

struct PendingInst {
    path: String,
    module_name: String,
    params: Vec<(String, NodeId)>,
    ports: Vec<PortConnection>,
    /// Module names on the instantiation chain leading to this one,
    /// including `module_name` itself; used to reject a module that
    /// (directly or transitively) instantiates itself.
    ancestry: Vec<String>,
}

impl Program {
    pub fn new(ast: Ast) -> Self {
        Program {
            ast,
            decls: UndoMap::new(),
            elabs: UndoMap::new(),
            root_decl: None,
            root_elab: None,
            inst_queue: Vec::new(),
            resolver: Resolver::new(),
            log: Vec::new(),
        }
    }

    pub fn decl_find(&self, name: &str) -> Option<NodeId> {
        self.decls.get(&name.to_string()).copied()
    }

    pub fn elab_find(&self, path: &str) -> Option<NodeId> {
        self.elabs.get(&path.to_string()).copied()
    }

    pub fn root_decl(&self) -> Option<NodeId> {
        self.root_decl.as_ref().and_then(|n| self.decl_find(n))
    }

    pub fn root_elab(&self) -> Option<NodeId> {
        self.root_elab.as_ref().and_then(|p| self.elab_find(p))
    }

    /// Declares a module. The first declaration becomes the root by
    /// convention (§4.2): later declarations without an explicit top-level
    /// instantiation are library modules awaited by `eval`.
    pub fn declare(&mut self, id: NodeId) -> Result<()> {
        let NodeKind::ModuleDeclaration { name, .. } = self.ast.kind(id) else {
            return Err(CascadeError::Typecheck("declare() given a non-module node".into()));
        };
        let name = name.clone();
        if self.decls.contains(&name) {
            return Err(CascadeError::Typecheck(format!("module '{}' already declared", name)));
        }
        if self.root_decl.is_none() {
            self.root_decl = Some(name.clone());
        }
        self.decls.insert(name, id);
        Ok(())
    }

    /// Repoints `name`'s declaration at `new_id` (e.g. after
    /// [`crate::march::set_march`] rewrites a module's attrs onto a fresh
    /// node). Existing elaborated instances are untouched; a retarget only
    /// takes effect on the next `eval` of that module.
    pub fn replace_decl(&mut self, name: &str, new_id: NodeId) -> Result<()> {
        if !self.decls.contains(&name.to_string()) {
            return Err(CascadeError::UndefinedReference {
                kind: "module",
                name: name.to_string(),
            });
        }
        self.decls.insert(name.to_string(), new_id);
        Ok(())
    }

    pub fn declare_and_instantiate(&mut self, id: NodeId) -> Result<()> {
        let NodeKind::ModuleDeclaration { name, .. } = self.ast.kind(id) else {
            return Err(CascadeError::Typecheck("declare_and_instantiate() given a non-module node".into()));
        };
        let name = name.clone();
        self.declare(id)?;
        let inst = NodeKind::ModuleInstantiation {
            module_name: name.clone(),
            iid: name,
            params: vec![],
            ports: vec![],
        };
        let inst_id = self.ast.push_synth(inst);
        self.eval(inst_id)
    }

    /// Queues a top-level instantiation and drains it (and any
    /// instantiations nested inside it) until the instance tree is fully
    /// elaborated. The first instantiation evaluated becomes the root.
    pub fn eval(&mut self, item: NodeId) -> Result<()> {
        let NodeKind::ModuleInstantiation {
            module_name,
            iid,
            params,
            ports,
        } = self.ast.kind(item).clone()
        else {
            return Err(CascadeError::Typecheck("eval() given a non-instantiation node".into()));
        };
        let path = iid.clone();
        if self.root_elab.is_none() {
            self.root_elab = Some(path.clone());
        }
        let ancestry = vec![module_name.clone()];
        self.inst_queue.push(PendingInst {
            path,
            module_name,
            params,
            ports,
            ancestry,
        });
        self.drain()
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(pending) = self.inst_queue.pop() {
            self.elaborate_instance(pending)?;
        }
        Ok(())
    }

    /// Deep-copies `module_name`'s declaration body into the runtime AST
    /// under `path`'s namespace, queuing any instantiations it contains so
    /// nested instances are elaborated before `drain` returns.
    fn elaborate_instance(&mut self, pending: PendingInst) -> Result<()> {
        let Some(decl_id) = self.decl_find(&pending.module_name) else {
            self.log.push(CascadeError::UndefinedReference {
                kind: "module",
                name: pending.module_name.clone(),
            });
            return Err(CascadeError::UndefinedReference {
                kind: "module",
                name: pending.module_name,
            });
        };
        let overrides: HashMap<String, NodeId> = pending.params.iter().cloned().collect();
        let mut copier = Copier {
            ast: &mut self.ast,
            prefix: pending.path.clone(),
            map: HashMap::new(),
            overrides,
        };
        let elaborated = copier.copy(decl_id);
        self.elabs.insert(pending.path.clone(), elaborated);

        self.queue_nested_instances(elaborated, &pending.path, &pending.ancestry)?;
        self.resolver.build_module(&self.ast, elaborated);
        let _ = pending.ports; // port binding is the data plane's job (§4.5), not elaboration's
        Ok(())
    }

    fn queue_nested_instances(&mut self, module: NodeId, parent_path: &str, ancestry: &[String]) -> Result<()> {
        let NodeKind::ModuleDeclaration { items, .. } = self.ast.kind(module).clone() else {
            return Ok(());
        };
        for item in items {
            if let NodeKind::ModuleInstantiation {
                module_name,
                iid,
                params,
                ports,
            } = self.ast.kind(item).clone()
            {
                if ancestry.contains(&module_name) {
                    return Err(CascadeError::RecursiveInstantiation(format!(
                        "{}.{}",
                        parent_path, iid
                    )));
                }
                let mut child_ancestry = ancestry.to_vec();
                child_ancestry.push(module_name.clone());
                self.inst_queue.push(PendingInst {
                    path: format!("{}.{}", parent_path, iid),
                    module_name,
                    params,
                    ports,
                    ancestry: child_ancestry,
                });
            }
        }
        Ok(())
    }
}

/// Deep-copies a subtree into the same arena, remapping every [`NodeId`] it
/// touches so the copy shares no nodes with the original declaration (a
/// second instantiation of the same module must not alias state with the
/// first).
struct Copier<'a> {
    ast: &'a mut Ast,
    prefix: String,
    map: HashMap<NodeId, NodeId>,
    /// Parameter name -> override expression, taken from the instantiation
    /// that triggered this copy. The override node lives outside the
    /// subtree being copied, so it is deep-copied on first use like any
    /// other original node rather than looked up in `map`.
    overrides: HashMap<String, NodeId>,
}

impl<'a> Copier<'a> {
    fn copy(&mut self, id: NodeId) -> NodeId {
        if let Some(&mapped) = self.map.get(&id) {
            return mapped;
        }
        let kind = self.ast.kind(id).clone();
        let loc = self.ast.get(id).loc.clone();
        let new_kind = self.remap_kind(kind);
        let new_id = self.ast.push(new_kind, loc);
        self.map.insert(id, new_id);
        self.ast.link_children(new_id);
        new_id
    }

    fn copy_opt(&mut self, id: Option<NodeId>) -> Option<NodeId> {
        id.map(|n| self.copy(n))
    }

    fn copy_vec(&mut self, ids: &[NodeId]) -> Vec<NodeId> {
        ids.iter().map(|&n| self.copy(n)).collect()
    }

    fn remap_kind(&mut self, kind: NodeKind) -> NodeKind {
        use NodeKind::*;
        match kind {
            Number(b) => Number(b),
            StringLit(s) => StringLit(s),
            Ident { path, indices, range } => Ident {
                path,
                indices: self.copy_vec(&indices),
                range: self.copy_opt(range),
            },
            Unary { op, expr } => Unary { op, expr: self.copy(expr) },
            Binary { op, lhs, rhs } => Binary {
                op,
                lhs: self.copy(lhs),
                rhs: self.copy(rhs),
            },
            Conditional { cond, then_branch, else_branch } => Conditional {
                cond: self.copy(cond),
                then_branch: self.copy(then_branch),
                else_branch: self.copy(else_branch),
            },
            Concat(v) => Concat(self.copy_vec(&v)),
            MultiConcat { count, concat } => MultiConcat {
                count: self.copy(count),
                concat: self.copy(concat),
            },
            RangeConst { msb, lsb } => RangeConst { msb, lsb },
            RangePlus { base, width } => RangePlus { base: self.copy(base), width },
            RangeMinus { base, width } => RangeMinus { base: self.copy(base), width },
            SysFuncCall { name, args } => SysFuncCall { name, args: self.copy_vec(&args) },
            Decl(mut d) => {
                let override_expr = if matches!(d.storage, crate::ast::DeclStorage::Parameter) {
                    self.overrides.get(&d.name).copied()
                } else {
                    None
                };
                d.init = match override_expr {
                    Some(expr) => Some(self.copy(expr)),
                    None => self.copy_opt(d.init),
                };
                Decl(d)
            }
            ContinuousAssign { lhs, rhs } => ContinuousAssign {
                lhs: self.copy(lhs),
                rhs: self.copy(rhs),
            },
            BlockingAssign { lhs, rhs } => BlockingAssign {
                lhs: self.copy(lhs),
                rhs: self.copy(rhs),
            },
            NonblockingAssign { lhs, rhs } => NonblockingAssign {
                lhs: self.copy(lhs),
                rhs: self.copy(rhs),
            },
            PackedAssign { targets, rhs } => PackedAssign {
                targets: self.copy_vec(&targets),
                rhs: self.copy(rhs),
            },
            Begin(v) => Begin(self.copy_vec(&v)),
            If { cond, then_branch, else_branch } => If {
                cond: self.copy(cond),
                then_branch: self.copy(then_branch),
                else_branch: self.copy_opt(else_branch),
            },
            Case { cond, arms, default } => Case {
                cond: self.copy(cond),
                arms: arms
                    .into_iter()
                    .map(|a| crate::ast::CaseArm {
                        labels: self.copy_vec(&a.labels),
                        body: self.copy(a.body),
                    })
                    .collect(),
                default: self.copy_opt(default),
            },
            ForLoop { init, cond, step, body } => ForLoop {
                init: self.copy(init),
                cond: self.copy(cond),
                step: self.copy(step),
                body: self.copy(body),
            },
            WhileLoop { cond, body } => WhileLoop { cond: self.copy(cond), body: self.copy(body) },
            RepeatLoop { count, body } => RepeatLoop { count: self.copy(count), body: self.copy(body) },
            Event { edge, expr } => Event { edge, expr: self.copy(expr) },
            EventControl { events, body } => EventControl {
                events: self.copy_vec(&events),
                body: self.copy(body),
            },
            AlwaysConstruct { body } => AlwaysConstruct { body: self.copy(body) },
            InitialConstruct { body, ignore } => InitialConstruct { body: self.copy(body), ignore },
            SysTaskCall { name, args } => SysTaskCall { name, args: self.copy_vec(&args) },
            ModuleInstantiation { module_name, iid, params, ports } => ModuleInstantiation {
                module_name,
                iid,
                params: params.into_iter().map(|(n, v)| (n, self.copy(v))).collect(),
                ports: ports
                    .into_iter()
                    .map(|p| PortConnection { name: p.name, expr: self.copy(p.expr) })
                    .collect(),
            },
            GenerateFor { genvar, init, limit, step, body, block_prefix } => GenerateFor {
                genvar,
                init,
                limit: self.copy(limit),
                step,
                body: self.copy_vec(&body),
                block_prefix,
            },
            GenerateIf { cond, then_items, else_items } => GenerateIf {
                cond: self.copy(cond),
                then_items: self.copy_vec(&then_items),
                else_items: self.copy_vec(&else_items),
            },
            GenerateCase { cond, arms, default } => GenerateCase {
                cond: self.copy(cond),
                arms: arms
                    .into_iter()
                    .map(|a| crate::ast::GenerateCaseArm {
                        labels: self.copy_vec(&a.labels),
                        items: self.copy_vec(&a.items),
                    })
                    .collect(),
                default: self.copy_vec(&default),
            },
            ModuleDeclaration { name, ports, items, attrs } => ModuleDeclaration {
                name: format!("{}${}", self.prefix, name),
                ports: self.copy_vec(&ports),
                items: self.copy_vec(&items),
                attrs,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;

    #[test]
    fn declare_then_eval_elaborates_a_root_instance() {
        let mut ast = Ast::new();
        let module = {
            let mut b = Builder::new(&mut ast);
            let zero = b.unsigned(1, 0);
            let decl = b.reg_decl("r", 1, false, vec![], Some(zero));
            b.module_decl("top", vec![], vec![decl])
        };
        let mut program = Program::new(ast);
        program.declare(module).unwrap();
        assert!(program.root_decl().is_some());

        let inst = NodeKind::ModuleInstantiation {
            module_name: "top".to_string(),
            iid: "top".to_string(),
            params: vec![],
            ports: vec![],
        };
        let inst_id = program.ast.push_synth(inst);
        program.eval(inst_id).unwrap();

        assert!(program.root_elab().is_some());
        assert_eq!(program.elab_find("top"), program.root_elab());
    }

    #[test]
    fn second_instance_does_not_alias_first() {
        let mut ast = Ast::new();
        let module = {
            let mut b = Builder::new(&mut ast);
            let zero = b.unsigned(8, 0);
            let decl = b.reg_decl("r", 8, false, vec![], Some(zero));
            b.module_decl("leaf", vec![], vec![decl])
        };
        let mut program = Program::new(ast);
        program.declare(module).unwrap();

        for iid in ["a", "b"] {
            let inst = NodeKind::ModuleInstantiation {
                module_name: "leaf".to_string(),
                iid: iid.to_string(),
                params: vec![],
                ports: vec![],
            };
            let inst_id = program.ast.push_synth(inst);
            program.eval(inst_id).unwrap();
        }
        let a = program.elab_find("a").unwrap();
        let b = program.elab_find("b").unwrap();
        assert_ne!(a, b);
    }
}
