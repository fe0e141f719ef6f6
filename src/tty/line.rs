// SPDX-License-Identifier: MPL-2.0

//! Per-line state (spec.md §3): termios/winsize, the input queue, escape
//! state, reader/writer/drain slots, and the control fields `setattr` and
//! `sigchar` mutate.
//!
//! Grounded on the teacher's `LineDiscipline` struct shape
//! (`device/tty/line_discipline.rs`: `termios`, `current_line`,
//! `read_buffer`, job-control fields), generalized to the full slot/select
//! bookkeeping spec.md §3 names, which the teacher's work-in-progress
//! struct does not yet carry.

use crate::config::LineKind;
use crate::error::Errno;
use crate::message::{ProcId, SelectOps};

use super::echo::EchoSink;
use super::input::{in_process, InProcessOutcome, Signal};
use super::queue::InputQueue;
use super::termios::{Cc, IFlags, LFlags, Termios, WinSize};

/// A suspended (or just-completed) reader, spec.md §3 "Reader slot".
#[derive(Debug)]
pub struct ReaderSlot {
    pub leftover: usize,
    pub cumulative: usize,
    pub buf: Vec<u8>,
    pub proc: ProcId,
    pub nonblock: bool,
    pub revived: bool,
}

/// A suspended (or just-completed) writer, spec.md §3 "Writer slot".
#[derive(Debug)]
pub struct WriterSlot {
    pub pending: Vec<u8>,
    pub leftover: usize,
    pub cumulative: usize,
    pub proc: ProcId,
    pub nonblock: bool,
    pub revived: bool,
}

/// A `TCSETSW`/`TCSETSF`/`TCDRAIN` request waiting for the writer to drain.
#[derive(Debug, Clone)]
pub enum DrainRequest {
    Drain,
    SetAttrWait(Termios),
    SetAttrFlush(Termios),
}

#[derive(Debug)]
pub struct DrainSlot {
    pub request: DrainRequest,
    pub proc: ProcId,
}

/// A pending SELECT subscription (spec.md §3 "Select").
#[derive(Debug, Clone, Copy)]
pub struct SelectSub {
    pub ops: SelectOps,
    pub proc: ProcId,
}

/// Outcome of `in_transfer` (spec.md §4.4): how much has been delivered to
/// the reader so far, and whether the slot is now satisfied.
#[derive(Debug, Clone, Copy)]
pub struct TransferResult {
    pub cumulative: usize,
    pub finished: bool,
}

/// `setattr`'s side effects the dispatcher must still carry out (timer
/// cancellation lives in the server-owned `TimerWheel`, signal delivery in
/// the server's injected sender).
#[derive(Debug, Clone, Copy)]
pub struct SetattrOutcome {
    pub hangup: bool,
}

pub struct Line {
    pub id: usize,
    pub minor: u32,
    pub kind: LineKind,
    pub termios: Termios,
    pub winsize: WinSize,
    pub queue: InputQueue,
    pub escaped: bool,
    pub reprint_pending: bool,
    pub reader: Option<ReaderSlot>,
    pub writer: Option<WriterSlot>,
    pub drain: Option<DrainSlot>,
    pub pgrp: ProcId,
    pub open_count: u32,
    pub inhibited: bool,
    pub events_flag: bool,
    pub min: usize,
    pub select_sub: Option<SelectSub>,
    /// Signals `feed` raised but that a device backend's `devread`
    /// couldn't deliver itself (it only sees a `&mut Line`, not the
    /// dispatcher's signal sender). Drained by the dispatcher after each
    /// `devread` call.
    pub pending_signals: Vec<Signal>,
    /// Set by `feed` when step 9 of `in_process` decided to arm the
    /// interbyte timer. Drained (and cleared) by the dispatcher.
    pub pending_timer_arm: bool,
    tab_size: usize,
}

impl Line {
    pub fn new(id: usize, minor: u32, kind: LineKind, tab_size: usize, queue_capacity: usize) -> Self {
        Line {
            id,
            minor,
            kind,
            termios: Termios::default(),
            winsize: WinSize::default(),
            queue: InputQueue::new(queue_capacity),
            escaped: false,
            reprint_pending: false,
            reader: None,
            writer: None,
            drain: None,
            pgrp: 0,
            open_count: 0,
            inhibited: false,
            events_flag: false,
            min: 1,
            select_sub: None,
            pending_signals: Vec::new(),
            pending_timer_arm: false,
            tab_size,
        }
    }

    /// Run the input processor over `bytes` (spec.md §4.3), updating this
    /// line's queue and escape state in place. Signals and the interbyte
    /// timer-arm decision are additionally queued onto `pending_signals`/
    /// `pending_timer_arm` for the dispatcher, since a device backend's
    /// `devread` (which calls this) only has a `&mut Line`, not the
    /// server's signal sender or timer wheel.
    pub fn feed(&mut self, bytes: &[u8], sink: &mut dyn EchoSink) -> InProcessOutcome {
        let outcome = in_process(
            &mut self.queue,
            &self.termios,
            &mut self.escaped,
            &mut self.reprint_pending,
            &mut self.inhibited,
            self.tab_size,
            bytes,
            sink,
        );
        self.pending_signals.extend_from_slice(&outcome.signals);
        self.pending_timer_arm |= outcome.arm_interbyte_timer;
        outcome
    }

    /// `in_transfer` (spec.md §4.4): drain queued cells into the reader
    /// slot's buffer. Returns `None` when the preconditions (a reader slot
    /// with `leftover > 0`, `eot_count >= min`) are not met.
    pub fn in_transfer(&mut self) -> Option<TransferResult> {
        let min = if self.termios.is_hangup() { 0 } else { self.min };

        if self.reader.as_ref()?.leftover == 0 {
            return None;
        }
        if self.queue.eot_count() < min {
            return None;
        }

        while self.reader.as_ref().map(|r| r.leftover > 0).unwrap_or(false) && self.queue.eot_count() > 0 {
            let cell = match self.queue.pop_front() {
                Some(c) => c,
                None => break,
            };
            let canonical = self.termios.is_canonical();
            let reader = self.reader.as_mut().expect("checked above");
            if !cell.eof {
                reader.buf.push(cell.ch);
                reader.cumulative += 1;
                reader.leftover = reader.leftover.saturating_sub(1);
            }
            if cell.eot && canonical {
                reader.leftover = 0;
            }
        }

        let reader = self.reader.as_ref()?;
        Some(TransferResult {
            cumulative: reader.cumulative,
            finished: reader.leftover == 0,
        })
    }

    pub fn start_read(&mut self, count: usize, nonblock: bool, proc: ProcId) -> Result<(), Errno> {
        if self.reader.is_some() {
            return Err(Errno::EIO);
        }
        if count == 0 {
            return Err(Errno::EINVAL);
        }
        self.reader = Some(ReaderSlot {
            leftover: count,
            cumulative: 0,
            buf: Vec::with_capacity(count.min(4096)),
            proc,
            nonblock,
            revived: false,
        });
        Ok(())
    }

    pub fn start_write(&mut self, data: Vec<u8>, nonblock: bool, proc: ProcId) -> Result<(), Errno> {
        if self.writer.is_some() {
            return Err(Errno::EIO);
        }
        if data.is_empty() {
            return Err(Errno::EINVAL);
        }
        let leftover = data.len();
        self.writer = Some(WriterSlot {
            pending: data,
            leftover,
            cumulative: 0,
            proc,
            nonblock,
            revived: false,
        });
        Ok(())
    }

    pub fn cancel_reader(&mut self) -> Option<ProcId> {
        self.reader.take().map(|r| r.proc)
    }

    pub fn cancel_writer(&mut self) -> Option<ProcId> {
        self.writer.take().map(|w| w.proc)
    }

    pub fn cancel_drain(&mut self) -> Option<ProcId> {
        self.drain.take().map(|d| d.proc)
    }

    /// READ entry point's VMIN/VTIME adjustment (spec.md §4.8): call once a
    /// reader slot is populated, before the first `in_transfer`/timer
    /// decision. Returns whether an interbyte-style read timeout should be
    /// (re)armed, and with what threshold.
    pub fn read_entry_timer_adjustment(&mut self) -> Option<usize> {
        if self.termios.is_raw() && self.termios.cc(Cc::VTIME) > 0 {
            if self.termios.cc(Cc::VMIN) == 0 {
                self.min = 1;
                return Some(self.termios.cc(Cc::VTIME) as usize);
            } else if self.queue.eot_count() == 0 {
                self.min = self.termios.cc(Cc::VMIN) as usize;
                return None; // caller cancels any existing timer, doesn't arm a new one here
            }
        }
        None
    }

    /// `setattr` (spec.md §4.7). The caller (dispatcher) must still cancel
    /// this line's read timer and, on `hangup`, deliver `SIGHUP` and call
    /// [`Line::flush_on_signal`].
    pub fn setattr(&mut self, new: Termios) -> SetattrOutcome {
        let leaving_canonical = self.termios.is_canonical() && !new.is_canonical();
        self.termios = new;
        if leaving_canonical {
            self.queue.mark_all_eot();
        }
        self.recompute_min();
        if !self.termios.iflags.contains(IFlags::IXON) {
            self.inhibited = false;
        }
        SetattrOutcome {
            hangup: self.termios.is_hangup(),
        }
    }

    fn recompute_min(&mut self) {
        self.min = if self.termios.is_canonical() {
            1
        } else {
            let vmin = self.termios.cc(Cc::VMIN) as usize;
            let vtime = self.termios.cc(Cc::VTIME);
            if vmin == 0 && vtime > 0 {
                1
            } else {
                vmin
            }
        };
    }

    /// `sigchar`'s queue-flush half (spec.md §4.7); signal delivery to
    /// `pgrp` is the caller's responsibility (an injected callback, since
    /// process-group delivery is an out-of-scope collaborator per
    /// spec.md §1). Returns whether the flush happened (`NOFLSH` unset);
    /// the caller must then also cancel device output and set
    /// `events_flag`.
    pub fn flush_on_signal(&mut self) -> bool {
        if self.termios.lflags.contains(LFlags::NOFLSH) {
            return false;
        }
        self.queue.clear();
        self.inhibited = false;
        self.events_flag = true;
        true
    }

    /// Readiness for `do_select` (spec.md §4.7). `device_write_ready` is
    /// the device backend's `devwrite(probe=1)` answer.
    pub fn select_ready(&self, device_write_ready: bool) -> SelectOps {
        if self.termios.is_hangup() {
            return SelectOps::READ | SelectOps::WRITE | SelectOps::ERROR;
        }
        let mut ready = SelectOps::empty();
        let read_ready = self.reader.as_ref().map_or(false, |r| r.leftover > 0)
            || (!self.queue.is_empty() && (self.termios.is_raw() || self.queue.eot_count() > 0));
        if read_ready {
            ready |= SelectOps::READ;
        }
        if self.writer.as_ref().map_or(false, |w| w.leftover > 0) || device_write_ready {
            ready |= SelectOps::WRITE;
        }
        ready
    }

    pub fn tab_size(&self) -> usize {
        self.tab_size
    }

    /// `CLOSE` (spec.md §4.7) on reaching `open_count == 0`.
    pub fn reset_to_defaults(&mut self) {
        self.queue.clear();
        self.writer = None;
        self.drain = None;
        self.pgrp = 0;
        self.termios = Termios::default();
        self.winsize = WinSize::default();
        self.escaped = false;
        self.reprint_pending = false;
        self.inhibited = false;
        self.recompute_min();
    }
}
