//! FId stream table (§4.6, "FId streams").
//!
//! IDs 0-5 are the standard streams, bound once at startup. `fopen`
//! allocates a fresh buffer; the top bit of an `FId` records whether the
//! runtime owns the buffer (allocated by `fopen`) or it was borrowed in
//! from the host (`rdbuf` on an id the caller already owns). Writes after
//! `finish()` are silently dropped, matching the "squelch" behavior called
//! out in §4.6.

use std::collections::HashMap;

pub type FId = u32;

pub const STDIN: FId = 0;
pub const STDOUT: FId = 1;
pub const STDERR: FId = 2;
pub const STDWARN: FId = 3;
pub const STDINFO: FId = 4;
pub const STDLOG: FId = 5;

/// Top bit of the 31-bit `FId` space: set for runtime-owned buffers.
const OWNED_BIT: FId = 1 << 30;

pub struct StreamTable {
    buffers: HashMap<FId, Vec<u8>>,
    next: FId,
    finished: bool,
}

impl Default for StreamTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTable {
    pub fn new() -> Self {
        let mut table = StreamTable {
            buffers: HashMap::new(),
            next: 6,
            finished: false,
        };
        for id in [STDIN, STDOUT, STDERR, STDWARN, STDINFO, STDLOG] {
            table.buffers.insert(id, Vec::new());
        }
        table
    }

    /// Allocates a new runtime-owned buffer, returning its id.
    pub fn fopen(&mut self) -> FId {
        let id = self.next | OWNED_BIT;
        self.next += 1;
        self.buffers.insert(id, Vec::new());
        id
    }

    /// Installs or retrieves the buffer for `id`, creating an empty one on
    /// first reference (a borrowed id the host hasn't written through yet).
    pub fn rdbuf(&mut self, id: FId) -> &mut Vec<u8> {
        self.buffers.entry(id).or_default()
    }

    pub fn write(&mut self, id: FId, data: &[u8]) {
        if self.finished {
            return;
        }
        self.buffers.entry(id).or_default().extend_from_slice(data);
    }

    pub fn contents(&self, id: FId) -> Option<&[u8]> {
        self.buffers.get(&id).map(|v| v.as_slice())
    }

    pub fn is_owned(id: FId) -> bool {
        id & OWNED_BIT != 0
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fopen_allocates_owned_ids_above_the_standard_streams() {
        let mut t = StreamTable::new();
        let a = t.fopen();
        let b = t.fopen();
        assert!(StreamTable::is_owned(a));
        assert_ne!(a, b);
    }

    #[test]
    fn writes_after_finish_are_squelched() {
        let mut t = StreamTable::new();
        t.write(STDOUT, b"before");
        t.finish();
        t.write(STDOUT, b"after");
        assert_eq!(t.contents(STDOUT).unwrap(), b"before");
    }
}
