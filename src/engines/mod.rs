//! Back-ends implementing the [`crate::engine::Engine`] contract (§3).
//!
//! [`reference`] is the only engine this crate ships: a tree-walking
//! interpreter over a [`crate::isolate::FlatProgram`]. The module exists
//! (rather than putting the engine straight in `engine.rs`) so a second
//! back-end sharing the same contract has somewhere to live.

pub mod reference;
