//! The engine contract (§3, "Engine contract (uniform across back-ends)").
//!
//! Every back-end — the tree-walking [`crate::engines::reference`] engine
//! this crate ships, and any FPGA/co-simulation engine built against the
//! same data-plane wire format later — implements this trait so the
//! scheduler (`runtime::Scheduler`) never special-cases which kind of
//! engine it is driving.

use std::collections::HashMap;

use crate::bits::Bits;
use crate::isolate::Vid;

/// An engine's view of "what state looks like" for checkpoint/restore and
/// hand-off between engine versions (§4.5, "Engine swap atomicity").
pub type StateMap = HashMap<Vid, Bits>;

pub trait Engine {
    /// Classification for scheduler fast paths (§4.6). Defaults suit a
    /// general logic engine; a clock source or a no-op placeholder engine
    /// override the relevant one.
    fn is_stub(&self) -> bool {
        false
    }
    fn is_clock(&self) -> bool {
        false
    }
    fn is_logic(&self) -> bool {
        true
    }

    /// Drains active events (continuous assigns settle, triggered `always`
    /// blocks run) and produces any pending outputs.
    fn evaluate(&mut self);

    /// Whether any input this engine reads has changed since its last
    /// `evaluate`/`conditional_evaluate` call.
    fn there_are_reads(&self) -> bool;

    /// `evaluate()` but only if `there_are_reads()` — the scheduler calls
    /// this from `drain_updates` rather than paying for a full evaluate on
    /// every engine every pass.
    fn conditional_evaluate(&mut self) {
        if self.there_are_reads() {
            self.evaluate();
        }
    }

    /// Whether this engine has nonblocking writes staged and not yet
    /// applied.
    fn there_are_updates(&self) -> bool;

    /// Applies any pending nonblocking updates. Returns whether any were
    /// applied.
    fn conditional_update(&mut self) -> bool;

    /// Hints whether `done_step` does anything for this engine — lets the
    /// scheduler skip the call entirely for engines that never override it.
    fn overrides_done_step(&self) -> bool {
        false
    }
    /// End-of-step bookkeeping (clearing edge-detection priors, etc.).
    fn done_step(&mut self) {}
    /// Terminal cleanup, called once as the simulation winds down.
    fn done_simulation(&mut self) {}

    /// Runs this engine's own inner loop against a local clock value for up
    /// to `max_iters` virtual ticks with no external interaction, returning
    /// the number of iterations actually completed. The default — "can't do
    /// this" — forces the scheduler to fall back to the reference loop,
    /// which is the only path this crate's software engine exercises (§9:
    /// open-loop is a performance fast path, not an observable-behavior
    /// requirement).
    fn open_loop(&mut self, _clock_id: Vid, _clock_val: bool, _max_iters: u64) -> u64 {
        0
    }

    fn get_clock_id(&self) -> Option<Vid> {
        None
    }
    fn get_clock_val(&self) -> bool {
        false
    }
    fn set_clock_val(&mut self, _val: bool) {}

    /// Pushes an externally-written value into variable `vid`.
    fn read(&mut self, vid: Vid, bits: &Bits);
    /// Drains this engine's pending output writes since the last call.
    fn write(&mut self) -> Vec<(Vid, Bits)>;

    fn get_state(&self) -> StateMap;
    fn set_state(&mut self, state: &StateMap);
    fn get_input(&self) -> StateMap;
    fn set_input(&mut self, input: &StateMap);
}
