//! The reference software engine (§4.6, "the software interpreter").
//!
//! A tree-walking interpreter over one [`FlatProgram`]: continuous
//! assigns settle to a fixed point every `evaluate()`, `always` blocks run
//! when one of their (possibly `EventExpand`-derived) sensitivity events
//! fires, and nonblocking assigns stage into `pending_nb` for
//! `conditional_update` to apply — matching the blocking/nonblocking split
//! in §4.1. Loops and bit-range bounds are walked directly at runtime;
//! per §4.4 "the software interpreter runs only loop unrolling and the
//! optional index normalization" is read here as "a tree-walker doesn't
//! need either," so neither pass is invoked (see `crate::transform`'s
//! module doc). `EventExpand` is still run, once, for any `always @(*)`
//! block at construction time, since the interpreter's edge detection
//! needs a concrete sensitivity list to test.

use std::collections::HashMap;

use crate::ast::{NodeId, NodeKind, PortDirection};
use crate::bits::Bits;
use crate::engine::{Engine, StateMap};
use crate::evaluate::Evaluator;
use crate::isolate::{is_stateful, FlatProgram, Vid};
use crate::program::Program;
use crate::streams::{self, StreamTable};
use crate::transform::event_expand;

/// Bounds an in-engine `for`/`while`/`repeat` loop so a runaway user
/// program (an infinite `while` with no side effect the engine can see)
/// can't hang the process; not part of the spec's semantics, a safety
/// valve for the tree-walker specifically.
const MAX_LOOP_ITERS: u64 = 1_000_000;

pub struct ReferenceEngine<'a> {
    evaluator: Evaluator<'a>,
    flat: FlatProgram,
    continuous: Vec<NodeId>,
    initials: Vec<NodeId>,
    always: Vec<(Vec<NodeId>, NodeId)>,
    event_priors: HashMap<NodeId, Bits>,
    pending_nb: Vec<(NodeId, Vec<NodeId>, Option<NodeId>, Bits)>,
    streams: StreamTable,
    dirty_external: bool,
    finished: bool,
    initial_ran: bool,
    outputs_snapshot: HashMap<Vid, Bits>,
}

impl<'a> ReferenceEngine<'a> {
    /// Builds the engine over `flat`, expanding any `always @(*)` block's
    /// empty sensitivity list in `program`'s shared AST first (the one
    /// mutation this constructor performs) before taking the long-lived
    /// shared borrows the evaluator needs.
    pub fn new(program: &'a mut Program, flat: FlatProgram) -> Self {
        let mut continuous = Vec::new();
        let mut initials = Vec::new();
        let mut always: Vec<(Vec<NodeId>, NodeId)> = Vec::new();

        for &item in &flat.items {
            match program.ast.kind(item).clone() {
                NodeKind::ContinuousAssign { .. } => continuous.push(item),
                NodeKind::InitialConstruct { body, ignore } => {
                    if !ignore {
                        initials.push(body);
                    }
                }
                NodeKind::AlwaysConstruct { body } => {
                    if let NodeKind::EventControl { events, body: inner } = program.ast.kind(body).clone() {
                        let events = if events.is_empty() {
                            event_expand::expand(&mut program.ast, &mut program.resolver, inner)
                        } else {
                            events
                        };
                        always.push((events, inner));
                    }
                }
                _ => {}
            }
        }

        let evaluator = Evaluator::new(&program.ast, &program.resolver);
        let mut event_priors = HashMap::new();
        for (events, _) in &always {
            for &ev in events {
                if let NodeKind::Event { expr, .. } = evaluator.ast.kind(ev) {
                    event_priors.insert(ev, evaluator.get_value(*expr));
                }
            }
        }

        ReferenceEngine {
            evaluator,
            flat,
            continuous,
            initials,
            always,
            event_priors,
            pending_nb: Vec::new(),
            streams: StreamTable::new(),
            dirty_external: false,
            finished: false,
            initial_ran: false,
            outputs_snapshot: HashMap::new(),
        }
    }

    pub fn stream_contents(&self, id: streams::FId) -> Option<&[u8]> {
        self.streams.contents(id)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn settle_continuous(&mut self) {
        let passes = self.continuous.len() + 1;
        for _ in 0..passes {
            for &item in &self.continuous.clone() {
                if let NodeKind::ContinuousAssign { lhs, rhs } = self.evaluator.ast.kind(item).clone() {
                    let val = self.evaluator.get_value(rhs);
                    self.evaluator.assign_value(lhs, &val);
                }
            }
        }
    }

    fn target_width(&self, target: NodeId) -> usize {
        match self.evaluator.resolver.resolution(target) {
            Some(decl) => match self.evaluator.ast.kind(decl) {
                NodeKind::Decl(d) => d.width,
                _ => 1,
            },
            None => 1,
        }
    }

    /// Renders `$display`/`$write`-style arguments. A string literal prints
    /// as its own text (the common `$write("literal")` case); anything else
    /// prints as the numeric value of its `Bits` — a documented
    /// simplification, this crate does not parse `%d`-style format
    /// specifiers out of a literal's text the way `$display` would.
    fn format_args(&self, args: &[NodeId]) -> String {
        args.iter()
            .map(|&a| match self.evaluator.ast.kind(a) {
                NodeKind::StringLit(s) => s.clone(),
                _ => self.evaluator.get_value(a).to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn exec_sys_task(&mut self, name: &str, args: &[NodeId]) {
        match name {
            "$display" => {
                let mut text = self.format_args(args).into_bytes();
                text.push(b'\n');
                self.streams.write(streams::STDOUT, &text);
            }
            "$write" | "$monitor" | "$strobe" => {
                let text = self.format_args(args);
                self.streams.write(streams::STDOUT, text.as_bytes());
            }
            "$finish" | "$stop" => {
                self.streams.finish();
                self.finished = true;
            }
            _ => {}
        }
    }

    fn exec_stmt(&mut self, id: NodeId) {
        if self.finished {
            return;
        }
        match self.evaluator.ast.kind(id).clone() {
            NodeKind::Begin(stmts) => {
                for s in stmts {
                    self.exec_stmt(s);
                    if self.finished {
                        break;
                    }
                }
            }
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if !self.evaluator.get_value(cond).is_zero() {
                    self.exec_stmt(then_branch);
                } else if let Some(e) = else_branch {
                    self.exec_stmt(e);
                }
            }
            NodeKind::Case { cond, arms, default } => {
                let cv = self.evaluator.get_value(cond);
                let mut matched = false;
                for arm in &arms {
                    if arm
                        .labels
                        .iter()
                        .any(|&l| Bits::values_equal(&self.evaluator.get_value(l), &cv))
                    {
                        self.exec_stmt(arm.body);
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    if let Some(d) = default {
                        self.exec_stmt(d);
                    }
                }
            }
            NodeKind::ForLoop { init, cond, step, body } => {
                self.exec_stmt(init);
                let mut guard = 0u64;
                while !self.evaluator.get_value(cond).is_zero() {
                    self.exec_stmt(body);
                    self.exec_stmt(step);
                    guard += 1;
                    if guard >= MAX_LOOP_ITERS || self.finished {
                        break;
                    }
                }
            }
            NodeKind::WhileLoop { cond, body } => {
                let mut guard = 0u64;
                while !self.evaluator.get_value(cond).is_zero() {
                    self.exec_stmt(body);
                    guard += 1;
                    if guard >= MAX_LOOP_ITERS || self.finished {
                        break;
                    }
                }
            }
            NodeKind::RepeatLoop { count, body } => {
                let n = self.evaluator.get_value(count).to_usize().min(MAX_LOOP_ITERS as usize);
                for _ in 0..n {
                    self.exec_stmt(body);
                    if self.finished {
                        break;
                    }
                }
            }
            NodeKind::ContinuousAssign { lhs, rhs } | NodeKind::BlockingAssign { lhs, rhs } => {
                let val = self.evaluator.get_value(rhs);
                self.evaluator.assign_value(lhs, &val);
            }
            NodeKind::NonblockingAssign { lhs, rhs } => {
                let val = self.evaluator.get_value(rhs);
                if let (Some(decl), NodeKind::Ident { indices, range, .. }) = (
                    self.evaluator.resolver.resolution(lhs),
                    self.evaluator.ast.kind(lhs).clone(),
                ) {
                    self.pending_nb.push((decl, indices, range, val));
                }
            }
            NodeKind::PackedAssign { targets, rhs } => {
                let widths: Vec<usize> = targets.iter().map(|&t| self.target_width(t)).collect();
                let total: usize = widths.iter().sum::<usize>().max(1);
                let src = self.evaluator.get_value(rhs).resize(total);
                let mut hi = total;
                for (&t, w) in targets.iter().zip(widths) {
                    let lo = hi - w;
                    let slice = src.slice((hi - 1).max(lo), lo);
                    self.evaluator.assign_value(t, &slice);
                    hi = lo;
                }
            }
            NodeKind::SysTaskCall { name, args } => self.exec_sys_task(&name, &args),
            _ => {}
        }
    }
}

impl<'a> Engine for ReferenceEngine<'a> {
    fn evaluate(&mut self) {
        if !self.initial_ran {
            for body in self.initials.clone() {
                self.exec_stmt(body);
            }
            self.initial_ran = true;
        }
        self.settle_continuous();
        for idx in 0..self.always.len() {
            let (events, body) = self.always[idx].clone();
            let mut triggered = false;
            for &ev in &events {
                let prior = self
                    .event_priors
                    .get(&ev)
                    .cloned()
                    .unwrap_or_else(|| Bits::zero(1));
                if self.evaluator.is_clock_edge(ev, &prior) {
                    triggered = true;
                }
            }
            if triggered {
                self.exec_stmt(body);
            }
            for &ev in &events {
                if let NodeKind::Event { expr, .. } = self.evaluator.ast.kind(ev).clone() {
                    let cur = self.evaluator.get_value(expr);
                    self.event_priors.insert(ev, cur);
                }
            }
        }
        self.settle_continuous();
        self.dirty_external = false;
    }

    fn there_are_reads(&self) -> bool {
        self.dirty_external
    }

    fn there_are_updates(&self) -> bool {
        !self.pending_nb.is_empty()
    }

    fn conditional_update(&mut self) -> bool {
        if self.pending_nb.is_empty() {
            return false;
        }
        for (decl, indices, range, val) in std::mem::take(&mut self.pending_nb) {
            self.evaluator.assign_decl(decl, &indices, range, &val);
        }
        true
    }

    fn read(&mut self, vid: Vid, bits: &Bits) {
        if let Some(decl) = self.flat.vars.decl_of(vid) {
            self.evaluator.assign_decl(decl, &[], None, bits);
            self.dirty_external = true;
        }
    }

    fn write(&mut self) -> Vec<(Vid, Bits)> {
        let mut changed = Vec::new();
        for vid in 0..self.flat.vars.len() as Vid {
            let Some(decl) = self.flat.vars.decl_of(vid) else {
                continue;
            };
            let val = self.evaluator.get_value(decl);
            let unchanged = self
                .outputs_snapshot
                .get(&vid)
                .is_some_and(|prev| Bits::values_equal(prev, &val));
            if !unchanged {
                self.outputs_snapshot.insert(vid, val.clone());
                changed.push((vid, val));
            }
        }
        changed
    }

    fn get_state(&self) -> StateMap {
        let mut m = HashMap::new();
        for vid in 0..self.flat.vars.len() as Vid {
            if let Some(decl) = self.flat.vars.decl_of(vid) {
                if let Some(storage) = self.evaluator.decl_storage(decl) {
                    if is_stateful(storage) {
                        m.insert(vid, self.evaluator.get_value(decl));
                    }
                }
            }
        }
        m
    }

    fn set_state(&mut self, state: &StateMap) {
        for (&vid, val) in state {
            if let Some(decl) = self.flat.vars.decl_of(vid) {
                self.evaluator.assign_decl(decl, &[], None, val);
            }
        }
    }

    fn get_input(&self) -> StateMap {
        let mut m = HashMap::new();
        for vid in 0..self.flat.vars.len() as Vid {
            if let Some(decl) = self.flat.vars.decl_of(vid) {
                if let NodeKind::Decl(d) = self.evaluator.ast.kind(decl) {
                    if matches!(d.port_direction, Some(PortDirection::Input)) {
                        m.insert(vid, self.evaluator.get_value(decl));
                    }
                }
            }
        }
        m
    }

    fn set_input(&mut self, input: &StateMap) {
        for (&vid, val) in input {
            if let Some(decl) = self.flat.vars.decl_of(vid) {
                self.evaluator.assign_decl(decl, &[], None, val);
            }
        }
        self.dirty_external = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::{Ast, DeclStorage, EdgeType};
    use crate::bits::BitType;
    use crate::isolate::flatten;

    #[test]
    fn clocked_counter_increments_on_posedge() {
        let mut ast = Ast::new();
        let module = {
            let mut b = Builder::new(&mut ast);
            let zero_clk = b.unsigned(1, 0);
            let clk = b.reg_decl("clk", 1, false, vec![], Some(zero_clk));
            let zero_cnt = b.unsigned(8, 0);
            let cnt = b.reg_decl("cnt", 8, false, vec![], Some(zero_cnt));

            let clk_read = b.ident("clk");
            let event = b.event(EdgeType::Posedge, clk_read);
            let cnt_lhs = b.ident("cnt");
            let cnt_rhs_read = b.ident("cnt");
            let one = b.unsigned(8, 1);
            let sum = b.binary(crate::ast::BinaryOp::Plus, cnt_rhs_read, one);
            let assign = b.nonblocking_assign(cnt_lhs, sum);
            let ctrl = b.event_control(vec![event], assign);
            let always = b.always(ctrl);

            b.module_decl("top", vec![], vec![clk, cnt, always])
        };

        let mut program = Program::new(ast);
        program.declare(module).unwrap();
        let inst = NodeKind::ModuleInstantiation {
            module_name: "top".to_string(),
            iid: "top".to_string(),
            params: vec![],
            ports: vec![],
        };
        let inst_id = program.ast.push_synth(inst);
        program.eval(inst_id).unwrap();

        let flat = flatten(&mut program, "top").unwrap();
        let mut engine = ReferenceEngine::new(&mut program, flat);

        // Drive clk 0 -> 1 -> 0 -> 1 and step the engine after each edge.
        // Declaration order gives vid 0 = clk, vid 1 = cnt (see `flatten`).
        for val in [0u64, 1, 0, 1] {
            if let Some(decl) = engine.flat.vars.decl_of(0) {
                engine
                    .evaluator
                    .assign_decl(decl, &[], None, &Bits::from_u64(1, BitType::Unsigned, val));
            }
            engine.evaluate();
            engine.conditional_update();
        }

        let cnt_decl = engine.flat.vars.decl_of(1).unwrap();
        assert_eq!(engine.evaluator.get_value(cnt_decl).to_u64(), 2);
    }

    /// Writes one element of a `reg` array via a clocked always block and
    /// checks the other elements were left untouched — `element_index`'s
    /// linearized-offset path, exercised end to end. `get_array_value`
    /// (private-field access, hence a unit test rather than a `tests/`
    /// black-box one) is the only way to see past element 0 of an array
    /// declaration's cache from outside the evaluator.
    #[test]
    fn array_write_targets_a_single_element() {
        let mut ast = Ast::new();
        let module = {
            let mut b = Builder::new(&mut ast);
            let zero1 = b.unsigned(1, 0);
            let clk = b.reg_decl("clk", 1, false, vec![], Some(zero1));
            let mem = b.reg_decl("mem", 8, false, vec![4], None);

            let clk_read = b.ident("clk");
            let event = b.event(EdgeType::Posedge, clk_read);

            let idx = b.unsigned(8, 2);
            let mem_lhs = b.index("mem", vec![idx]);
            let val = b.unsigned(8, 0x99);
            let write = b.nonblocking_assign(mem_lhs, val);
            let ctrl = b.event_control(vec![event], write);
            let always = b.always(ctrl);

            b.module_decl("top", vec![], vec![clk, mem, always])
        };

        let mut program = Program::new(ast);
        program.declare(module).unwrap();
        let inst = NodeKind::ModuleInstantiation {
            module_name: "top".to_string(),
            iid: "top".to_string(),
            params: vec![],
            ports: vec![],
        };
        let inst_id = program.ast.push_synth(inst);
        program.eval(inst_id).unwrap();
        let flat = flatten(&mut program, "top").unwrap();
        let mut engine = ReferenceEngine::new(&mut program, flat);

        let clk_decl = engine.flat.vars.decl_of(0).unwrap();
        engine
            .evaluator
            .assign_decl(clk_decl, &[], None, &Bits::from_u64(1, BitType::Unsigned, 1));
        engine.evaluate();
        engine.conditional_update();

        let mem_decl = engine.flat.vars.decl_of(1).unwrap();
        let elements = engine.evaluator.get_array_value(mem_decl);
        assert_eq!(elements[2].to_u64(), 0x99);
        assert_eq!(elements[0].to_u64(), 0);
        assert_eq!(elements[1].to_u64(), 0);
        assert_eq!(elements[3].to_u64(), 0);
    }
}
