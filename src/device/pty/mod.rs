// SPDX-License-Identifier: MPL-2.0

//! Pseudo-terminal master/slave split (spec.md §9, Open Question 3:
//! resolved as "the master bypasses the line discipline except IOCTL").
//!
//! Grounded on the teacher's `kernel/src/device/pty/pty.rs`
//! (`PtyMaster`/`PtySlave` sharing a `ring-buffer`-backed duplex channel);
//! this crate reduces that to two plain `VecDeque`s behind an `Rc<RefCell>`
//! since the dispatcher that touches both ends is single-threaded
//! (spec.md §5 "Scheduling model").

pub mod master;
pub mod slave;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// The duplex byte channel a pty master/slave pair shares. `to_slave` is
/// what the master wrote (keystrokes); `to_master` is what the slave's
/// line discipline produced as output.
#[derive(Default)]
pub struct PtyPair {
    pub to_slave: VecDeque<u8>,
    pub to_master: VecDeque<u8>,
    /// Set when the master side has been dropped/closed; the slave then
    /// behaves as hung up (spec.md §3 "hangup").
    pub master_closed: bool,
}

pub type SharedPtyPair = Rc<RefCell<PtyPair>>;

pub fn new_pair() -> SharedPtyPair {
    Rc::new(RefCell::new(PtyPair::default()))
}
