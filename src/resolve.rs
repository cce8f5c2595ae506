//! Resolver / Navigator (§4.2).
//!
//! Maintains `resolution(id) -> decl` and `uses(decl) -> {id, ...}` as side
//! tables keyed by [`NodeId`] rather than intrusive fields on the
//! declaration node — the arena already owns the monitor list for
//! evaluator invalidation (§3); the resolver owns the *name lookup* half of
//! the contract, which is naturally a separate concern and, per the design
//! notes, safer to invalidate as a unit than to keep consistent piecemeal on
//! the node itself.
//!
//! Scope lookup is strictly lexical: a single recursive walk over a
//! module's items builds both caches in one pass, threading a stack of
//! name -> declaration scopes so a genvar or generate-block local shadows an
//! outer declaration of the same name exactly where it's lexically visible.

use std::collections::HashMap;

use crate::ast::{Ast, DeclStorage, NodeId, NodeKind};

#[derive(Default)]
pub struct Resolver {
    resolution: HashMap<NodeId, NodeId>,
    uses: HashMap<NodeId, Vec<NodeId>>,
}

type Scope = HashMap<String, NodeId>;

impl Resolver {
    pub fn new() -> Self {
        Resolver::default()
    }

    pub fn resolution(&self, id: NodeId) -> Option<NodeId> {
        self.resolution.get(&id).copied()
    }

    pub fn uses(&self, decl: NodeId) -> &[NodeId] {
        self.uses.get(&decl).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Registers an (initially empty) use-set for a freshly-inserted
    /// declaration, per the resolver's maintenance contract (i).
    pub fn register_decl(&mut self, decl: NodeId) {
        self.uses.entry(decl).or_default();
    }

    /// Removes every identifier under `root` from both caches (contract
    /// iii): called before a subtree is rebuilt or discarded.
    pub fn invalidate(&mut self, ast: &Ast, root: NodeId) {
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            if let Some(decl) = self.resolution.remove(&n) {
                if let Some(set) = self.uses.get_mut(&decl) {
                    set.retain(|&u| u != n);
                }
            }
            self.uses.remove(&n);
            stack.extend(ast.children(n));
        }
    }

    fn bind(&mut self, id: NodeId, decl: NodeId) {
        self.resolution.insert(id, decl);
        self.uses.entry(decl).or_default().push(id);
    }

    /// Binds an identifier to a declaration outside the lexical walk's
    /// reach — used by [`crate::isolate`] to wire a port-connection
    /// expression straight to the instance's port declaration rather than
    /// through a name lookup that can't cross a module boundary (§4.2).
    pub fn bind_external(&mut self, id: NodeId, decl: NodeId) {
        self.register_decl(decl);
        self.bind(id, decl);
    }

    /// Rebuilds both caches for an entire module declaration in one pass.
    pub fn build_module(&mut self, ast: &Ast, module: NodeId) {
        self.invalidate(ast, module);
        let NodeKind::ModuleDeclaration { ports, items, .. } = ast.kind(module) else {
            return;
        };
        let mut root_scope: Scope = Scope::new();
        for &p in ports {
            if let NodeKind::Decl(d) = ast.kind(p) {
                self.register_decl(p);
                root_scope.insert(d.name.clone(), p);
            }
        }
        let mut stack = vec![root_scope];
        let items = items.clone();
        for &item in &items {
            self.walk_item(ast, item, &mut stack);
        }
    }

    fn lookup(stack: &[Scope], name: &str) -> Option<NodeId> {
        for scope in stack.iter().rev() {
            if let Some(&d) = scope.get(name) {
                return Some(d);
            }
        }
        None
    }

    fn declare(&mut self, stack: &mut [Scope], name: &str, decl: NodeId) {
        self.register_decl(decl);
        stack.last_mut().unwrap().insert(name.to_string(), decl);
    }

    fn walk_item(&mut self, ast: &Ast, id: NodeId, stack: &mut Vec<Scope>) {
        match ast.kind(id) {
            NodeKind::Decl(d) => {
                if let Some(init) = d.init {
                    self.walk_expr(ast, init, stack);
                }
                self.declare(stack, &d.name.clone(), id);
            }
            NodeKind::ContinuousAssign { lhs, rhs }
            | NodeKind::BlockingAssign { lhs, rhs }
            | NodeKind::NonblockingAssign { lhs, rhs } => {
                self.walk_expr(ast, *lhs, stack);
                self.walk_expr(ast, *rhs, stack);
            }
            NodeKind::PackedAssign { targets, rhs } => {
                for t in targets.clone() {
                    self.walk_expr(ast, t, stack);
                }
                self.walk_expr(ast, *rhs, stack);
            }
            NodeKind::Begin(stmts) => {
                stack.push(Scope::new());
                for s in stmts.clone() {
                    self.walk_item(ast, s, stack);
                }
                stack.pop();
            }
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.walk_expr(ast, *cond, stack);
                self.walk_item(ast, *then_branch, stack);
                if let Some(e) = else_branch {
                    self.walk_item(ast, *e, stack);
                }
            }
            NodeKind::Case {
                cond,
                arms,
                default,
            } => {
                self.walk_expr(ast, *cond, stack);
                for a in arms.clone() {
                    for l in &a.labels {
                        self.walk_expr(ast, *l, stack);
                    }
                    self.walk_item(ast, a.body, stack);
                }
                if let Some(d) = default {
                    self.walk_item(ast, *d, stack);
                }
            }
            NodeKind::ForLoop {
                init,
                cond,
                step,
                body,
            } => {
                stack.push(Scope::new());
                self.walk_item(ast, *init, stack);
                self.walk_expr(ast, *cond, stack);
                self.walk_item(ast, *body, stack);
                self.walk_item(ast, *step, stack);
                stack.pop();
            }
            NodeKind::WhileLoop { cond, body } => {
                self.walk_expr(ast, *cond, stack);
                self.walk_item(ast, *body, stack);
            }
            NodeKind::RepeatLoop { count, body } => {
                self.walk_expr(ast, *count, stack);
                self.walk_item(ast, *body, stack);
            }
            NodeKind::EventControl { events, body } => {
                for e in events.clone() {
                    self.walk_expr(ast, e, stack);
                }
                self.walk_item(ast, *body, stack);
            }
            NodeKind::AlwaysConstruct { body } => self.walk_item(ast, *body, stack),
            NodeKind::InitialConstruct { body, .. } => self.walk_item(ast, *body, stack),
            NodeKind::SysTaskCall { args, .. } => {
                for a in args.clone() {
                    self.walk_expr(ast, a, stack);
                }
            }
            NodeKind::ModuleInstantiation { params, ports, .. } => {
                for (_, p) in params.clone() {
                    self.walk_expr(ast, p, stack);
                }
                for conn in ports.clone() {
                    self.walk_expr(ast, conn.expr, stack);
                }
            }
            NodeKind::GenerateFor {
                genvar,
                limit,
                body,
                ..
            } => {
                self.walk_expr(ast, *limit, stack);
                stack.push(Scope::new());
                // The genvar itself has no backing Decl node pre-elaboration;
                // callers that expand GenerateFor materialize one per
                // iteration and re-run the resolver on the unrolled body.
                let _ = genvar;
                for item in body.clone() {
                    self.walk_item(ast, item, stack);
                }
                stack.pop();
            }
            NodeKind::GenerateIf {
                cond,
                then_items,
                else_items,
            } => {
                self.walk_expr(ast, *cond, stack);
                stack.push(Scope::new());
                for item in then_items.clone() {
                    self.walk_item(ast, item, stack);
                }
                stack.pop();
                stack.push(Scope::new());
                for item in else_items.clone() {
                    self.walk_item(ast, item, stack);
                }
                stack.pop();
            }
            NodeKind::GenerateCase {
                cond,
                arms,
                default,
            } => {
                self.walk_expr(ast, *cond, stack);
                for a in arms.clone() {
                    stack.push(Scope::new());
                    for item in a.items {
                        self.walk_item(ast, item, stack);
                    }
                    stack.pop();
                }
                stack.push(Scope::new());
                for item in default.clone() {
                    self.walk_item(ast, item, stack);
                }
                stack.pop();
            }
            NodeKind::ModuleDeclaration { .. } => {
                // Nested module declarations don't occur in item position;
                // instantiation is the only cross-module construct.
            }
            _ => {}
        }
    }

    fn walk_expr(&mut self, ast: &Ast, id: NodeId, stack: &mut Vec<Scope>) {
        match ast.kind(id) {
            NodeKind::Ident {
                path,
                indices,
                range,
            } => {
                for i in indices.clone() {
                    self.walk_expr(ast, i, stack);
                }
                if let Some(r) = range {
                    self.walk_expr(ast, *r, stack);
                }
                // Hierarchical references (`a.b.c`) cross module boundaries
                // and are resolved by the Program against the instance
                // table, not by lexical scope lookup here.
                if path.len() == 1 {
                    if let Some(decl) = Self::lookup(stack, &path[0]) {
                        self.bind(id, decl);
                    }
                }
            }
            NodeKind::Unary { expr, .. } => self.walk_expr(ast, *expr, stack),
            NodeKind::Binary { lhs, rhs, .. } => {
                self.walk_expr(ast, *lhs, stack);
                self.walk_expr(ast, *rhs, stack);
            }
            NodeKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                self.walk_expr(ast, *cond, stack);
                self.walk_expr(ast, *then_branch, stack);
                self.walk_expr(ast, *else_branch, stack);
            }
            NodeKind::Concat(parts) => {
                for p in parts.clone() {
                    self.walk_expr(ast, p, stack);
                }
            }
            NodeKind::MultiConcat { count, concat } => {
                self.walk_expr(ast, *count, stack);
                self.walk_expr(ast, *concat, stack);
            }
            NodeKind::RangePlus { base, .. } | NodeKind::RangeMinus { base, .. } => {
                self.walk_expr(ast, *base, stack);
            }
            NodeKind::SysFuncCall { args, .. } => {
                for a in args.clone() {
                    self.walk_expr(ast, a, stack);
                }
            }
            _ => {}
        }
    }

    /// `true` for a declaration node whose storage makes it a valid
    /// assignment target outside of `assign` (boundary check, §8).
    pub fn is_reg_like(ast: &Ast, decl: NodeId) -> bool {
        matches!(
            ast.kind(decl),
            NodeKind::Decl(d) if matches!(d.storage, DeclStorage::Reg | DeclStorage::Integer)
        )
    }
}
