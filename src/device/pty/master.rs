// SPDX-License-Identifier: MPL-2.0

//! The master side of a pty pair. Per spec.md §9's resolved Open Question
//! 3, the master bypasses the line discipline entirely for READ/WRITE:
//! writes go straight into the slave's raw input queue (as if typed), and
//! reads drain whatever the slave's line discipline produced as output.
//! Only IOCTL on a `PTYPX_MINOR` falls through to the ordinary dispatcher
//! path against the paired slave `Line`.

use super::SharedPtyPair;

pub struct PtyMaster {
    pair: SharedPtyPair,
}

impl PtyMaster {
    pub fn new(pair: SharedPtyPair) -> Self {
        PtyMaster { pair }
    }

    /// Read up to `count` bytes of slave output. Returns `None` if nothing
    /// is available yet (caller decides EAGAIN vs. SUSPEND).
    pub fn read(&self, count: usize) -> Option<Vec<u8>> {
        let mut pair = self.pair.borrow_mut();
        if pair.to_master.is_empty() {
            return if pair.master_closed { Some(Vec::new()) } else { None };
        }
        let n = count.min(pair.to_master.len());
        Some(pair.to_master.drain(..n).collect())
    }

    /// Feed bytes to the slave as if typed at the terminal.
    pub fn write(&self, bytes: &[u8]) {
        self.pair.borrow_mut().to_slave.extend(bytes.iter().copied());
    }

    pub fn has_output(&self) -> bool {
        !self.pair.borrow().to_master.is_empty()
    }

    pub fn close(&self) {
        self.pair.borrow_mut().master_closed = true;
    }
}
