//! Expression evaluator and bit-vector model glue (§4.1).
//!
//! Width/type/value are not kept as three separate caches: a node's
//! self-determined width and type *are* `bit_val[0].width()` /
//! `bit_val[0].bit_type()` (the width contract in §8 is true by
//! construction, not by a side assertion). Context-determination is folded
//! into the recursive evaluation itself — an operator first self-determines
//! each operand by evaluating it, then resizes the operand `Bits` to the
//! context width the rule in §4.1 calls for before combining them.

use crate::ast::{Ast, BinaryOp, DeclStorage, EdgeType, NodeId, NodeKind, UnaryOp};
use crate::bits::{BitType, Bits};
use crate::resolve::Resolver;

/// External handler for `$feof` — injected so the core stays independent of
/// file/stream I/O plumbing (out of scope, §1). Defaults to "always eof".
pub type FeofHandler<'a> = dyn Fn(u32) -> bool + 'a;
/// External handler for `$fopen` — defaults to "always fails" (stream id 0).
pub type FopenHandler<'a> = dyn Fn(&str, &str) -> u32 + 'a;

pub struct Evaluator<'a> {
    pub ast: &'a Ast,
    pub resolver: &'a Resolver,
    pub feof: Box<FeofHandler<'a>>,
    pub fopen: Box<FopenHandler<'a>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(ast: &'a Ast, resolver: &'a Resolver) -> Self {
        Evaluator {
            ast,
            resolver,
            feof: Box::new(|_| true),
            fopen: Box::new(|_, _| 0),
        }
    }

    pub fn with_feof(mut self, f: impl Fn(u32) -> bool + 'a) -> Self {
        self.feof = Box::new(f);
        self
    }

    pub fn with_fopen(mut self, f: impl Fn(&str, &str) -> u32 + 'a) -> Self {
        self.fopen = Box::new(f);
        self
    }

    /// `get_value(e)`: returns the cached value, recomputing the subtree
    /// first if its dirty flag is set. A node that is not dirty is returned
    /// straight from `bit_val[0]` with no recursion — this is the cache the
    /// invalidation contract in §4.1 exists to keep sound.
    pub fn get_value(&self, id: NodeId) -> Bits {
        let node = self.ast.get(id);
        if !node.is_dirty() {
            return node.bit_val.borrow()[0].clone();
        }
        // An array-valued declaration's cache holds one slot per element;
        // `compute` only knows how to produce the (broadcast) initializer,
        // so the first touch fans it out across the whole array instead of
        // collapsing the cache back down to a single slot.
        if let NodeKind::Decl(d) = self.ast.kind(id) {
            if !d.dims.is_empty() {
                let n = d.total_elements();
                let init_val = self.compute(id);
                let mut cache = node.bit_val.borrow_mut();
                if cache.len() != n {
                    *cache = vec![init_val; n];
                }
                drop(cache);
                node.set_dirty(false);
                return node.bit_val.borrow()[0].clone();
            }
        }
        let v = self.compute(id);
        *node.bit_val.borrow_mut() = vec![v.clone()];
        node.set_dirty(false);
        v
    }

    /// Evaluates an array-valued declaration's full element vector (used by
    /// engine state capture and array writes).
    pub fn get_array_value(&self, decl: NodeId) -> Vec<Bits> {
        self.get_value(decl);
        self.ast.get(decl).bit_val.borrow().clone()
    }

    fn decl_width_signed_real(&self, decl: NodeId) -> (usize, bool, bool) {
        match self.ast.kind(decl) {
            NodeKind::Decl(d) => (d.width, d.signed, d.real),
            _ => (1, false, false),
        }
    }

    fn compute(&self, id: NodeId) -> Bits {
        match self.ast.kind(id).clone() {
            NodeKind::Number(b) => b,
            NodeKind::StringLit(s) => {
                // Packed into a bit vector, 8 bits per character, MSB first.
                let bytes = s.as_bytes();
                let width = (bytes.len() * 8).max(1);
                let mut words = vec![0u64; (width + 63) / 64];
                for (i, byte) in bytes.iter().rev().enumerate() {
                    let bitpos = i * 8;
                    let word = bitpos / 64;
                    let off = bitpos % 64;
                    words[word] |= (*byte as u64) << off;
                }
                Bits::from_words(width, BitType::Unsigned, words)
            }
            NodeKind::Ident { .. } => self.eval_ident(id),
            NodeKind::Unary { op, expr } => self.eval_unary(op, expr),
            NodeKind::Binary { op, lhs, rhs } => self.eval_binary(op, lhs, rhs),
            NodeKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                let a = self.get_value(then_branch);
                let b = self.get_value(else_branch);
                let ty = if a.is_real() || b.is_real() {
                    BitType::Real
                } else if a.is_signed() && b.is_signed() {
                    BitType::Signed
                } else {
                    BitType::Unsigned
                };
                let w = a.width().max(b.width());
                let chosen = if !self.get_value(cond).is_zero() { a } else { b };
                if ty.is_real() {
                    Bits::from_real(chosen.as_real())
                } else {
                    chosen.resize(w).with_type(ty)
                }
            }
            NodeKind::Concat(parts) => {
                let vals: Vec<Bits> = parts.iter().map(|p| self.get_value(*p)).collect();
                Bits::concat(&vals)
            }
            NodeKind::MultiConcat { count, concat } => {
                let n = self.get_value(count).to_usize();
                let v = self.get_value(concat);
                Bits::replicate(n, &v)
            }
            NodeKind::RangeConst { msb, lsb } => Bits::from_i64(64, msb - lsb + 1),
            NodeKind::RangePlus { width, .. } | NodeKind::RangeMinus { width, .. } => {
                Bits::from_u64(64, BitType::Unsigned, width as u64)
            }
            NodeKind::SysFuncCall { name, args } => self.eval_sys_func(&name, &args),
            NodeKind::Decl(d) => match d.init {
                Some(init) => self.get_value(init).resize(d.width).with_type(if d.real {
                    BitType::Real
                } else if d.signed {
                    BitType::Signed
                } else {
                    BitType::Unsigned
                }),
                None => Bits::zero(d.width),
            },
            NodeKind::Event { expr, .. } => self.get_value(expr),
            _ => Bits::zero(1),
        }
    }

    fn eval_unary(&self, op: UnaryOp, expr: NodeId) -> Bits {
        let v = self.get_value(expr);
        match op {
            UnaryOp::Plus => v,
            UnaryOp::Minus => Bits::neg(&v),
            UnaryOp::Tilde => Bits::bitnot(&v).with_type(BitType::Unsigned),
            UnaryOp::ReduceAnd => Bits::reduce_and(&v),
            UnaryOp::ReduceNand => Bits::reduce_nand(&v),
            UnaryOp::ReduceOr => Bits::reduce_or(&v),
            UnaryOp::ReduceNor => Bits::reduce_nor(&v),
            UnaryOp::ReduceXor => Bits::reduce_xor(&v),
            UnaryOp::ReduceXnor => Bits::reduce_xnor(&v),
            UnaryOp::LogNot => Bits::logical_not(&v),
        }
    }

    fn eval_binary(&self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Bits {
        let a = self.get_value(lhs);
        let b = self.get_value(rhs);
        match op {
            BinaryOp::Plus => Bits::add(&a, &b),
            BinaryOp::Minus => Bits::sub(&a, &b),
            BinaryOp::Times => Bits::mul(&a, &b),
            BinaryOp::Div => Bits::div(&a, &b),
            BinaryOp::Mod => Bits::rem(&a, &b),
            BinaryOp::And => Bits::bitand(&a, &b),
            BinaryOp::Or => Bits::bitor(&a, &b),
            BinaryOp::Xor => Bits::bitxor(&a, &b),
            BinaryOp::Xnor => Bits::bitxnor(&a, &b),
            BinaryOp::Eq | BinaryOp::CaseEq => Bits::eq(&a, &b),
            BinaryOp::Neq | BinaryOp::CaseNeq => Bits::neq(&a, &b),
            BinaryOp::Lt => Bits::lt(&a, &b),
            BinaryOp::Leq => Bits::leq(&a, &b),
            BinaryOp::Gt => Bits::gt(&a, &b),
            BinaryOp::Geq => Bits::geq(&a, &b),
            BinaryOp::LogAnd => Bits::logical_and(&a, &b),
            BinaryOp::LogOr => Bits::logical_or(&a, &b),
            BinaryOp::ShiftLeft => Bits::shl(&a, &b),
            BinaryOp::ShiftRight => Bits::shr_logical(&a, &b),
            BinaryOp::ShiftLeftArith => Bits::shl(&a, &b),
            BinaryOp::ShiftRightArith => Bits::shr_arith(&a, &b),
            BinaryOp::Pow => Bits::pow(&a, &b),
        }
    }

    fn eval_sys_func(&self, name: &str, args: &[NodeId]) -> Bits {
        match name {
            "$feof" => {
                let fd = self.get_value(args[0]).to_u64() as u32;
                Bits::from_bool((self.feof)(fd))
            }
            "$fopen" => {
                let path_bits = self.get_value(args[0]);
                let mode_bits = args.get(1).map(|a| self.get_value(*a));
                let path = bits_to_string(&path_bits);
                let mode = mode_bits.map(|m| bits_to_string(&m)).unwrap_or_default();
                Bits::from_u64(32, BitType::Unsigned, (self.fopen)(&path, &mode) as u64)
            }
            "$time" => Bits::from_u64(64, BitType::Unsigned, 0),
            "$random" => Bits::from_i64(32, 0),
            _ => Bits::zero(1),
        }
    }

    fn eval_ident(&self, id: NodeId) -> Bits {
        let Some(decl) = self.resolver.resolution(id) else {
            return Bits::zero(1);
        };
        let NodeKind::Ident { indices, range, .. } = self.ast.kind(id).clone() else {
            unreachable!()
        };
        let element = self.dereference_read(decl, &indices);
        match range {
            None => element,
            Some(r) => {
                let (msb, lsb) = self.range_bounds(r);
                element.slice(msb, lsb)
            }
        }
    }

    /// Resolves `[b +: n]` / `[b -: n]` / constant ranges to `(msb, lsb)`.
    pub fn range_bounds(&self, range_node: NodeId) -> (usize, usize) {
        match self.ast.kind(range_node).clone() {
            NodeKind::RangeConst { msb, lsb } => (msb.max(0) as usize, lsb.max(0) as usize),
            NodeKind::RangePlus { base, width } => {
                let b = self.get_value(base).to_usize();
                (b + width - 1, b)
            }
            NodeKind::RangeMinus { base, width } => {
                let b = self.get_value(base).to_usize();
                (b, b.saturating_sub(width - 1))
            }
            _ => (0, 0),
        }
    }

    /// Linearises multi-dimensional array indices into a single element
    /// offset (row-major, outermost dimension most significant). Indices
    /// beyond the declared array bound read as zero (§4.1, silent
    /// out-of-range read).
    fn element_index(&self, decl: NodeId, indices: &[NodeId]) -> Option<usize> {
        let NodeKind::Decl(d) = self.ast.kind(decl) else {
            return None;
        };
        if d.dims.is_empty() {
            return Some(0);
        }
        let mut offset = 0usize;
        for (dim, idx_node) in d.dims.iter().zip(indices.iter()) {
            let i = self.get_value(*idx_node).to_usize();
            if i >= *dim {
                return None;
            }
            offset = offset * *dim + i;
        }
        Some(offset)
    }

    fn dereference_read(&self, decl: NodeId, indices: &[NodeId]) -> Bits {
        self.get_value(decl);
        match self.element_index(decl, indices) {
            Some(i) => self
                .ast
                .get(decl)
                .bit_val
                .borrow()
                .get(i)
                .cloned()
                .unwrap_or_else(|| Bits::zero(self.decl_width_signed_real(decl).0)),
            None => Bits::zero(self.decl_width_signed_real(decl).0),
        }
    }

    /// `assign_value(id, val)`: writes through to the resolved declaration's
    /// cache at the dereferenced element/slice, then walks the declaration's
    /// use-list marking every identifier referring to it (and every
    /// ancestor expression up to the root) dirty. A write that changes no
    /// bit still walks the use-list in this implementation — detecting a
    /// true no-op write would require comparing against the pre-image,
    /// which costs as much as the invalidation walk it would save.
    pub fn assign_value(&self, id: NodeId, val: &Bits) {
        let Some(decl) = self.resolver.resolution(id) else {
            return;
        };
        let NodeKind::Ident { indices, range, .. } = self.ast.kind(id).clone() else {
            return;
        };
        self.assign_decl(decl, &indices, range, val);
    }

    pub fn assign_decl(&self, decl: NodeId, indices: &[NodeId], range: Option<NodeId>, val: &Bits) {
        self.get_value(decl);
        let Some(i) = self.element_index(decl, indices) else {
            return; // out-of-range write: silently dropped
        };
        // Resolved before taking the cache's RefCell borrow: a `range`
        // bound expression can itself reference `decl` (e.g. a self-index),
        // and evaluating it while `cache` is borrowed would panic.
        let slice_bounds = range.map(|r| self.range_bounds(r));
        let (width, signed, real) = self.decl_width_signed_real(decl);
        let mut cache = self.ast.get(decl).bit_val.borrow_mut();
        if i >= cache.len() {
            return;
        }
        match slice_bounds {
            None => {
                let ty = if real {
                    BitType::Real
                } else if signed {
                    BitType::Signed
                } else {
                    BitType::Unsigned
                };
                cache[i] = val.resize(width).with_type(ty);
            }
            Some((msb, lsb)) => {
                cache[i].slice_assign(msb, lsb, val);
            }
        }
        drop(cache);
        self.invalidate_dependents(decl);
    }

    pub fn invalidate_dependents(&self, decl: NodeId) {
        for &use_id in self.resolver.uses(decl) {
            self.mark_dirty_upward(use_id);
        }
    }

    fn mark_dirty_upward(&self, mut id: NodeId) {
        loop {
            let node = self.ast.get(id);
            if node.is_dirty() {
                break;
            }
            node.set_dirty(true);
            match self.ast.parent(id) {
                Some(p) => id = p,
                None => break,
            }
        }
    }

    /// Typecheck-time boundary checks (§8): a 1-bit scalar cannot be
    /// bit-sliced, and a range with `lo > hi` is rejected outright.
    pub fn check_range_bounds(ast: &Ast, decl: NodeId, range_node: NodeId) -> Result<(), String> {
        let width = match ast.kind(decl) {
            NodeKind::Decl(d) => d.width,
            _ => return Ok(()),
        };
        if width <= 1 {
            if matches!(ast.kind(range_node), NodeKind::RangeConst { .. }) {
                return Err("cannot bit-select a 1-bit scalar".to_string());
            }
        }
        if let NodeKind::RangeConst { msb, lsb } = ast.kind(range_node) {
            if lsb > msb {
                return Err(format!("range [{}:{}] has lo > hi", msb, lsb));
            }
        }
        Ok(())
    }

    pub fn is_clock_edge(&self, event: NodeId, prior: &Bits) -> bool {
        let NodeKind::Event { edge, expr } = self.ast.kind(event).clone() else {
            return false;
        };
        let cur = self.get_value(expr);
        match edge {
            EdgeType::Posedge => prior.is_zero() && !cur.is_zero(),
            EdgeType::Negedge => !prior.is_zero() && cur.is_zero(),
            EdgeType::Either => !Bits::values_equal(prior, &cur),
        }
    }

    pub fn decl_storage(&self, decl: NodeId) -> Option<DeclStorage> {
        match self.ast.kind(decl) {
            NodeKind::Decl(d) => Some(d.storage),
            _ => None,
        }
    }
}

fn bits_to_string(b: &Bits) -> String {
    let mut bytes = Vec::new();
    let nbytes = (b.width() + 7) / 8;
    for i in (0..nbytes).rev() {
        let mut byte = 0u8;
        for bit in 0..8 {
            if b.bit(i * 8 + bit) {
                byte |= 1 << bit;
            }
        }
        if byte != 0 {
            bytes.push(byte);
        }
    }
    String::from_utf8_lossy(&bytes).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::Ast;

    #[test]
    fn arithmetic_self_determines_max_width() {
        let mut ast = Ast::new();
        let (lhs, rhs) = {
            let mut b = Builder::new(&mut ast);
            let lhs = b.unsigned(4, 5);
            let rhs = b.unsigned(4, 7);
            (lhs, rhs)
        };
        let expr = Builder::new(&mut ast).binary(BinaryOp::Plus, lhs, rhs);
        let resolver = Resolver::new();
        let ev = Evaluator::new(&ast, &resolver);
        assert_eq!(ev.get_value(expr).to_u64(), 12);
    }

    #[test]
    fn write_invalidates_dependent_expression() {
        let mut ast = Ast::new();
        let (module, id, expr) = {
            let mut b = Builder::new(&mut ast);
            let zero = b.unsigned(8, 0);
            let decl = b.reg_decl("r", 8, false, vec![], Some(zero));
            let out_zero = b.unsigned(8, 0);
            let out = b.reg_decl("out", 8, false, vec![], Some(out_zero));
            let lhs = b.ident("out");
            let id = b.ident("r");
            let one = b.unsigned(8, 1);
            let expr = b.binary(BinaryOp::Plus, id, one);
            let assign = b.continuous_assign(lhs, expr);
            let module = b.module_decl("m", vec![], vec![decl, out, assign]);
            (module, id, expr)
        };
        let mut resolver = Resolver::new();
        resolver.build_module(&ast, module);

        let ev = Evaluator::new(&ast, &resolver);
        assert_eq!(ev.get_value(expr).to_u64(), 1);
        ev.assign_value(id, &Bits::from_u64(8, BitType::Unsigned, 41));
        assert_eq!(ev.get_value(expr).to_u64(), 42);
    }
}
