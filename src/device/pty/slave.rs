// SPDX-License-Identifier: MPL-2.0

//! The slave side of a pty pair: an ordinary [`DeviceBackend`] whose
//! "hardware" is the shared [`super::PtyPair`] queue instead of a real
//! UART or keyboard.

use super::SharedPtyPair;
use crate::device::DeviceBackend;
use crate::tty::echo::EchoSink;
use crate::tty::output::out_process;
use crate::tty::Line;

pub struct PtySlaveBackend {
    pair: SharedPtyPair,
}

impl PtySlaveBackend {
    pub fn new(pair: SharedPtyPair) -> Self {
        PtySlaveBackend { pair }
    }
}

impl DeviceBackend for PtySlaveBackend {
    fn devread(&mut self, line: &mut Line, sink: &mut dyn EchoSink, probe: bool) -> bool {
        let mut pair = self.pair.borrow_mut();
        if probe {
            return !pair.to_slave.is_empty();
        }
        if pair.to_slave.is_empty() {
            return false;
        }
        let bytes: Vec<u8> = pair.to_slave.drain(..).collect();
        drop(pair);
        let outcome = line.feed(&bytes, sink);
        if outcome.consumed < bytes.len() {
            let mut pair = self.pair.borrow_mut();
            for b in bytes[outcome.consumed..].iter().rev() {
                pair.to_slave.push_front(*b);
            }
        }
        true
    }

    fn devwrite(&mut self, line: &mut Line, probe: bool) -> bool {
        if line.inhibited {
            return false;
        }
        if probe {
            return true;
        }
        let tab_size = line.tab_size();
        let termios = line.termios;
        let writer = match line.writer.as_mut() {
            Some(w) => w,
            None => return false,
        };
        if writer.leftover == 0 {
            return true;
        }
        let ict = writer.pending.len();
        let oct = ict * 2 + 8;
        let (out, res) = out_process(&writer.pending, ict, oct, &termios, tab_size, &mut line.queue.column);
        self.pair.borrow_mut().to_master.extend(out);
        let writer = line.writer.as_mut().expect("checked above");
        writer.pending.drain(0..res.consumed_in);
        writer.cumulative += res.consumed_in;
        writer.leftover = writer.pending.len();
        true
    }

    fn emit_echo_batch(&mut self, bytes: &[u8]) {
        self.pair.borrow_mut().to_master.extend(bytes.iter().copied());
    }

    fn icancel(&mut self, _line: &mut Line) {
        self.pair.borrow_mut().to_slave.clear();
    }

    fn ocancel(&mut self, _line: &mut Line) {
        self.pair.borrow_mut().to_master.clear();
    }
}
