//! Runtime scheduler (§4.6, "Runtime Scheduler").
//!
//! Implements the reference-scheduler loop only: "repeat while `schedule_all`
//! OR `drain_updates()`: run `drain_active()`", read as the post-test loop
//! the phrasing names ("repeat ... while ...") rather than a pre-test one —
//! `drain_active()` always runs at least once per `step()` call, then
//! `done_step` bookkeeping and logical-time increment follow. `schedule_all`
//! starts set so the very first step forces a full `evaluate()` regardless
//! of whether anything has driven a read yet — otherwise a fresh
//! simulation's `$initial` blocks and continuous assigns would never
//! settle. It clears itself after that first pass; a fresh `Scheduler`
//! (e.g. the one a march retarget builds around a restored checkpoint, per
//! `crate::march`) gets its own forced pass the same way. A value driven in
//! via `drive()` ahead of a later `step()` call still reaches `evaluate()`
//! on that step, since `drain_active()`'s own `there_are_reads()` check
//! (not the outer loop's condition) is what notices it. The open-loop fast
//! path (§9) is a performance optimization
//! documented as "observationally identical" to this loop, so this crate,
//! with exactly one engine per run, never takes it — `Engine::open_loop`'s
//! default (0 iterations completed) always forces the fallback path here.

use crate::bits::Bits;
use crate::engine::Engine;
use crate::isolate::Vid;

pub struct Scheduler<E: Engine> {
    engine: E,
    /// Logical simulation time, incremented once per completed step.
    pub time: u64,
    finished: bool,
    /// Forces the next `drain_active` to evaluate even with no reads
    /// pending. Set by `new`; cleared after it fires once.
    schedule_all: bool,
}

impl<E: Engine> Scheduler<E> {
    pub fn new(engine: E) -> Self {
        Scheduler {
            engine,
            time: 0,
            finished: false,
            schedule_all: true,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Pushes an externally-driven value into the running engine (§4.6,
    /// data plane inbound edge) ahead of the next `step`.
    pub fn drive(&mut self, vid: Vid, val: &Bits) {
        self.engine.read(vid, val);
    }

    /// Runs one full scheduler step: "repeat while `schedule_all` or
    /// `drain_updates()`: run `drain_active()`", then `done_step` and
    /// logical-time increment. Read as the post-test loop the phrasing
    /// literally describes ("repeat ... while ...", not "while ... repeat
    /// ..."): `drain_active()` always runs at least once per step, so a
    /// value driven in via `drive()` before this call gets processed on
    /// this step rather than only on the one call where `schedule_all`
    /// happens to still be armed.
    pub fn step(&mut self) -> Vec<(Vid, Bits)> {
        loop {
            self.drain_active();
            self.schedule_all = false;
            if !self.drain_updates() {
                break;
            }
        }
        if self.engine.overrides_done_step() {
            self.engine.done_step();
        }
        self.time += 1;
        self.engine.write()
    }

    /// Runs `step` until the engine reports `$finish`/`$stop` (via
    /// `Engine::write` never being enough to tell on its own, so callers
    /// poll a finished flag their engine exposes) or `max_steps` elapses,
    /// whichever comes first. `is_done` lets a caller plug in that
    /// engine-specific completion check without this scheduler depending on
    /// a concrete engine type.
    pub fn run_until(&mut self, max_steps: u64, mut is_done: impl FnMut(&E) -> bool) {
        while self.time < max_steps && !self.finished {
            self.step();
            if is_done(&self.engine) {
                self.finished = true;
            }
        }
    }

    /// Evaluates the engine while it has reads pending, or once unconditionally
    /// if `schedule_all` is still armed — stopping once a pass produces no
    /// further reads (a single engine's `evaluate` settles its own
    /// combinational fixed point internally, so that's usually one pass; the
    /// loop shape is kept so a second engine feeding this one could still
    /// cascade without reshaping this method).
    fn drain_active(&mut self) {
        let mut force = self.schedule_all;
        loop {
            if force || self.engine.there_are_reads() {
                self.engine.evaluate();
                force = false;
            } else {
                break;
            }
        }
    }

    /// Applies any staged nonblocking updates, re-evaluating once more if
    /// applying them produced new reads. Returns whether an update was
    /// applied.
    fn drain_updates(&mut self) -> bool {
        let applied = self.engine.conditional_update();
        if applied {
            self.engine.conditional_evaluate();
        }
        applied
    }
}

impl<E: Engine> Drop for Scheduler<E> {
    fn drop(&mut self) {
        self.engine.done_simulation();
    }
}
