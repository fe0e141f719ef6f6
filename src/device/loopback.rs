// SPDX-License-Identifier: MPL-2.0

//! An in-memory device back-end used by tests and the demo binary: input
//! is whatever a test pushes via [`LoopbackBackend::push_input`], output
//! accumulates in a buffer a test can inspect via
//! [`LoopbackBackend::take_output`].
//!
//! No teacher counterpart (the teacher always has a real hardware or
//! `ostd` IPC peer); grounded on the general shape of the teacher's
//! `Console`/driver test doubles is not applicable here since the teacher
//! has none — this is new, but kept to the same trait surface as every
//! other backend so it exercises the dispatcher identically.

use super::DeviceBackend;
use crate::tty::echo::EchoSink;
use crate::tty::output::out_process;
use crate::tty::Line;

#[derive(Default)]
pub struct LoopbackBackend {
    input_pending: Vec<u8>,
    output: Vec<u8>,
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input_pending.extend_from_slice(bytes);
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn has_pending_input(&self) -> bool {
        !self.input_pending.is_empty()
    }
}

impl DeviceBackend for LoopbackBackend {
    fn devread(&mut self, line: &mut Line, sink: &mut dyn EchoSink, probe: bool) -> bool {
        if probe {
            return !self.input_pending.is_empty();
        }
        if self.input_pending.is_empty() {
            return false;
        }
        let bytes = std::mem::take(&mut self.input_pending);
        let outcome = line.feed(&bytes, sink);
        if outcome.consumed < bytes.len() {
            self.input_pending = bytes[outcome.consumed..].to_vec();
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
        if line.writer.is_none() {
            return false;
        }
        // No real hardware latency behind this backend, so drain the whole
        // pending buffer now instead of waiting for a device-ready event
        // that will never come; `out_process` may still stop short of the
        // full buffer per call (e.g. an LF rewrite), hence the loop.
        loop {
            let writer = line.writer.as_mut().expect("checked above");
            if writer.leftover == 0 {
                break;
            }
            let ict = writer.pending.len();
            let oct = ict * 2 + 8;
            let (out, res) = out_process(&writer.pending, ict, oct, &termios, tab_size, &mut line.queue.column);
            self.output.extend_from_slice(&out);
            let writer = line.writer.as_mut().expect("checked above");
            writer.pending.drain(0..res.consumed_in);
            writer.cumulative += res.consumed_in;
            writer.leftover = writer.pending.len();
            if res.consumed_in == 0 {
                break;
            }
        }
        true
    }

    fn emit_echo_batch(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn ocancel(&mut self, _line: &mut Line) {
        self.output.clear();
    }

    fn icancel(&mut self, _line: &mut Line) {
        self.input_pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineKind;

    struct NullSink;
    impl EchoSink for NullSink {
        fn emit(&mut self, _bytes: &[u8]) {}
    }

    #[test]
    fn devread_feeds_pending_bytes_into_the_line() {
        let mut line = Line::new(0, 0, LineKind::Console, 8, 64);
        let mut backend = LoopbackBackend::new();
        backend.push_input(b"hi\n");
        let mut sink = NullSink;
        assert!(backend.devread(&mut line, &mut sink, false));
        assert_eq!(line.queue.len(), 3);
        assert!(!backend.has_pending_input());
    }

    #[test]
    fn devwrite_onlcr_maps_output() {
        let mut line = Line::new(0, 0, LineKind::Console, 8, 64);
        line.start_write(b"hi\n".to_vec(), false, 1).unwrap();
        let mut backend = LoopbackBackend::new();
        assert!(backend.devwrite(&mut line, false));
        backend.devwrite(&mut line, false);
        assert_eq!(backend.take_output(), b"hi\r\n");
        assert_eq!(line.writer.as_ref().unwrap().leftover, 0);
    }
}
