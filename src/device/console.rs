// SPDX-License-Identifier: MPL-2.0

//! Bridges a real console: a background thread blocks on `Stdin::read`
//! and forwards bytes over a channel, since the dispatcher's event loop
//! (spec.md §4.1) must never block inside a handler. `devwrite` writes
//! processed output straight to `Stdout`.
//!
//! Grounded on the teacher's `kernel/src/device/tty/console.rs` (the
//! console back-end registers `devread`/`devwrite` against a real
//! framebuffer/keyboard pair); this crate has no framebuffer, so stdio
//! plays that role, with the same "hardware owns its own thread, posts
//! notifications" shape spec.md §2/§5 describes for device interrupts.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use super::DeviceBackend;
use crate::tty::echo::EchoSink;
use crate::tty::output::out_process;
use crate::tty::Line;

pub struct ConsoleBackend {
    rx: Receiver<u8>,
    pending: Vec<u8>,
}

impl ConsoleBackend {
    /// Spawn the stdin-reading thread and return a backend ready to be
    /// registered against a line.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            let mut byte = [0u8; 1];
            loop {
                match stdin.lock().read(&mut byte) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(byte[0]).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        ConsoleBackend {
            rx,
            pending: Vec::new(),
        }
    }

    fn drain_channel(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(b) => self.pending.push(b),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }
}

impl Default for ConsoleBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBackend for ConsoleBackend {
    fn devread(&mut self, line: &mut Line, sink: &mut dyn EchoSink, probe: bool) -> bool {
        self.drain_channel();
        if probe {
            return !self.pending.is_empty();
        }
        if self.pending.is_empty() {
            return false;
        }
        let bytes = std::mem::take(&mut self.pending);
        let outcome = line.feed(&bytes, sink);
        if outcome.consumed < bytes.len() {
            self.pending = bytes[outcome.consumed..].to_vec();
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
        loop {
            let writer = line.writer.as_mut().expect("checked above");
            if writer.leftover == 0 {
                break;
            }
            let ict = writer.pending.len();
            let oct = ict * 2 + 8;
            let (out, res) = out_process(&writer.pending, ict, oct, &termios, tab_size, &mut line.queue.column);
            let mut stdout = io::stdout();
            let _ = stdout.write_all(&out);
            let _ = stdout.flush();
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
        let mut stdout = io::stdout();
        let _ = stdout.write_all(bytes);
        let _ = stdout.flush();
    }

    fn icancel(&mut self, _line: &mut Line) {
        self.pending.clear();
    }
}
