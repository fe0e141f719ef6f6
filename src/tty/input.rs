// SPDX-License-Identifier: MPL-2.0

//! Input processor (`in_process`, spec.md §4.3): the 12-step pipeline that
//! turns a raw byte run from a device into queued cells, invoking the echo
//! engine and raising signals along the way.
//!
//! The teacher's `LineDiscipline::push_char` covers a handful of these
//! steps (`ICANON`/`ICRNL`/`ISIG`/`ECHO`/`ECHOCTL`/`IEXTEN`'s `VERASE`) one
//! character at a time; this generalizes it to the full step list,
//! processing a whole buffer per call the way MINIX's `in_process` does.

use super::echo::{echo_erase, echo_erase_key, reprint, tty_echo, EchoSink};
use super::queue::{Cell, InputQueue};
use super::termios::{Cc, IFlags, LFlags, Termios, POSIX_VDISABLE};

/// A signal `in_process` decided to raise. Delivery (to a process group,
/// plus the input-flush half of `sigchar`) is the caller's responsibility —
/// grounded on spec.md §4.7 naming `sigchar` as a distinct step invoked
/// *from* `in_process`, not folded into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Sigint,
    Sigquit,
}

/// Everything `in_process` cannot decide unilaterally, handed back to the
/// line for bookkeeping it alone can do (timers, opportunistic transfer).
#[derive(Debug, Default)]
pub struct InProcessOutcome {
    pub consumed: usize,
    pub signals: Vec<Signal>,
    /// Step 9: arm the VMIN/VTIME interbyte timer (raw mode only).
    pub arm_interbyte_timer: bool,
    /// Step 8 broke early in raw mode because the queue is full; the
    /// caller got a partial `consumed` count and should retry the rest.
    pub stopped_on_full_queue: bool,
}

/// Consume `bytes`, mutating `queue`, `escaped`, `reprint_pending`, and
/// `inhibited` in place. Returns how much of `bytes` was consumed plus the
/// signals/timer/backpressure decisions the caller must act on.
#[allow(clippy::too_many_arguments)]
pub fn in_process(
    queue: &mut InputQueue,
    termios: &Termios,
    escaped: &mut bool,
    reprint_pending: &mut bool,
    inhibited: &mut bool,
    tab_size: usize,
    bytes: &[u8],
    sink: &mut impl EchoSink,
) -> InProcessOutcome {
    let mut out = InProcessOutcome::default();
    let mut idx = 0;

    'chars: while idx < bytes.len() {
        let mut ch = bytes[idx];
        idx += 1;

        // Step 1: ISTRIP.
        if termios.iflags.contains(IFlags::ISTRIP) {
            ch &= 0x7f;
        }

        // Step 2: IEXTEN escape handling.
        let mut forced_escape = false;
        let mut skip_steps_3_to_5 = false;
        if termios.lflags.contains(LFlags::IEXTEN) {
            if *escaped {
                forced_escape = true;
                *escaped = false;
                skip_steps_3_to_5 = true;
            } else if termios.cc_matches(Cc::VLNEXT, ch) {
                *escaped = true;
                sink.emit(b"^");
                sink.emit(b"\x08");
                continue 'chars;
            } else if termios.cc_matches(Cc::VREPRINT, ch) {
                let cells = queue.cells_since_last_eot();
                let updated = reprint(&cells, termios, tab_size, &mut queue.column, sink);
                queue.set_tail_lens(&updated);
                *reprint_pending = false;
                continue 'chars;
            }
        }

        // Step 3: a byte equal to POSIX_VDISABLE can never match a cc slot;
        // `Termios::cc_matches` already enforces this for every comparison
        // below, so no separate guard is needed here.
        debug_assert_eq!(POSIX_VDISABLE, 0);

        if !skip_steps_3_to_5 {
            // Step 4: CR/LF mapping.
            if ch == b'\r' {
                if termios.iflags.contains(IFlags::IGNCR) {
                    continue 'chars;
                } else if termios.iflags.contains(IFlags::ICRNL) {
                    ch = b'\n';
                }
            } else if ch == b'\n' && termios.iflags.contains(IFlags::INLCR) {
                ch = b'\r';
            }
        }

        let mut cell = Cell::plain(ch);
        cell.escaped = forced_escape;

        if !skip_steps_3_to_5 && termios.is_canonical() {
            // Step 5: canonical-mode editing.
            if termios.cc_matches(Cc::VERASE, ch) {
                // `back_over`'s reprint-if-messed-up check (spec.md §4.4):
                // redraw the echoed line before erasing from it if output
                // has interleaved since the last echo.
                if *reprint_pending {
                    let cells = queue.cells_since_last_eot();
                    let updated = reprint(&cells, termios, tab_size, &mut queue.column, sink);
                    queue.set_tail_lens(&updated);
                    *reprint_pending = false;
                }
                if let Some(popped) = queue.pop_back() {
                    if termios.lflags.contains(LFlags::ECHOE) {
                        echo_erase(popped, sink);
                    } else {
                        echo_erase_key(termios, tab_size, &mut queue.column, sink);
                    }
                }
                continue 'chars;
            }
            if termios.cc_matches(Cc::VKILL, ch) {
                // Same reprint-if-messed-up check, once, before the erase
                // loop (mirroring the teacher's `while (back_over(tp)) {}`,
                // whose first iteration triggers it).
                if *reprint_pending {
                    let cells = queue.cells_since_last_eot();
                    let updated = reprint(&cells, termios, tab_size, &mut queue.column, sink);
                    queue.set_tail_lens(&updated);
                    *reprint_pending = false;
                }
                while let Some(back) = queue.peek_back() {
                    if back.eot {
                        break;
                    }
                    let popped = queue.pop_back().expect("peeked back just now");
                    if termios.lflags.contains(LFlags::ECHOE) {
                        echo_erase(popped, sink);
                    }
                }
                if !termios.lflags.contains(LFlags::ECHOE) {
                    echo_erase_key(termios, tab_size, &mut queue.column, sink);
                    if termios.lflags.contains(LFlags::ECHOK) {
                        sink.emit(b"\n");
                        queue.column = 0;
                    }
                }
                continue 'chars;
            }
            if termios.cc_matches(Cc::VEOF, ch) {
                cell.eot = true;
                cell.eof = true;
            } else if ch == b'\n' || termios.cc_matches(Cc::VEOL, ch) {
                cell.eot = true;
            }
        }

        // Step 6: flow control.
        if !skip_steps_3_to_5 && termios.iflags.contains(IFlags::IXON) {
            if termios.cc_matches(Cc::VSTOP, ch) {
                *inhibited = true;
                continue 'chars;
            }
            if *inhibited {
                if termios.cc_matches(Cc::VSTART, ch) {
                    *inhibited = false;
                    continue 'chars;
                } else if termios.iflags.contains(IFlags::IXANY) {
                    *inhibited = false;
                }
            }
        }

        // Step 7: signals.
        if !skip_steps_3_to_5 && termios.lflags.contains(LFlags::ISIG) {
            if termios.cc_matches(Cc::VINTR, ch) {
                out.signals.push(Signal::Sigint);
                tty_echo(cell, termios, tab_size, &mut queue.column, sink);
                continue 'chars;
            }
            if termios.cc_matches(Cc::VQUIT, ch) {
                out.signals.push(Signal::Sigquit);
                tty_echo(cell, termios, tab_size, &mut queue.column, sink);
                continue 'chars;
            }
        }

        // Step 8: queue-full policy.
        if queue.is_full() {
            if termios.is_canonical() {
                continue 'chars;
            }
            idx -= 1;
            out.stopped_on_full_queue = true;
            break 'chars;
        }

        // Step 9: raw mode EOT tagging and interbyte timer arm.
        if termios.is_raw() {
            cell.eot = true;
            if queue.is_empty() {
                let vmin = termios.cc(Cc::VMIN);
                let vtime = termios.cc(Cc::VTIME);
                if vmin > 0 && vtime > 0 {
                    out.arm_interbyte_timer = true;
                }
            }
        }

        // Step 10: echo.
        let is_eol = cell.ch == b'\n' || cell.eot;
        if termios.lflags.contains(LFlags::ECHO)
            || (is_eol && termios.lflags.contains(LFlags::ECHONL))
        {
            cell = tty_echo(cell, termios, tab_size, &mut queue.column, sink);
        } else if !queue.is_empty() {
            *reprint_pending = true;
        }

        // Step 11: enqueue.
        queue.push(cell);

        // Step 12: opportunistic transfer is the caller's job — it owns
        // the reader slot, which this module never sees.
    }

    out.consumed = idx;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecSink(Vec<u8>);
    impl EchoSink for VecSink {
        fn emit(&mut self, bytes: &[u8]) {
            self.0.extend_from_slice(bytes);
        }
    }

    fn run(termios: &Termios, bytes: &[u8]) -> (InputQueue, InProcessOutcome, Vec<u8>) {
        let mut queue = InputQueue::new(64);
        let mut escaped = false;
        let mut reprint_pending = false;
        let mut inhibited = false;
        let mut sink = VecSink(Vec::new());
        let outcome = in_process(
            &mut queue,
            termios,
            &mut escaped,
            &mut reprint_pending,
            &mut inhibited,
            8,
            bytes,
            &mut sink,
        );
        (queue, outcome, sink.0)
    }

    #[test]
    fn canonical_line_is_queued_with_eot_on_newline() {
        let termios = Termios::default();
        let (mut queue, outcome, echoed) = run(&termios, b"hi\n");
        assert_eq!(outcome.consumed, 3);
        assert_eq!(echoed, b"hi\r\n");
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.eot_count(), 1);
        assert!(queue.pop_front().unwrap().ch == b'h');
        assert!(queue.pop_front().unwrap().ch == b'i');
        let nl = queue.pop_front().unwrap();
        assert!(nl.eot);
    }

    #[test]
    fn verase_pops_the_previous_cell() {
        let termios = Termios::default();
        let (queue, _outcome, _echoed) = run(&termios, b"ab\x7f");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn verase_reprints_first_when_echo_was_suppressed_over_a_pending_queue() {
        let mut termios = Termios::default();
        termios.lflags.remove(LFlags::ECHO);
        let mut queue = InputQueue::new(64);
        let mut escaped = false;
        let mut reprint_pending = false;
        let mut inhibited = false;
        let mut sink = VecSink(Vec::new());

        // "a" lands in an empty queue (no reprint owed yet); "b" lands
        // while the queue already holds "a" with ECHO off, which is what
        // marks the line as needing a reprint before its next edit.
        in_process(
            &mut queue,
            &termios,
            &mut escaped,
            &mut reprint_pending,
            &mut inhibited,
            8,
            b"ab",
            &mut sink,
        );
        assert!(reprint_pending);
        assert_eq!(queue.len(), 2);

        in_process(
            &mut queue,
            &termios,
            &mut escaped,
            &mut reprint_pending,
            &mut inhibited,
            8,
            b"\x7f",
            &mut sink,
        );
        assert!(!reprint_pending);
        assert_eq!(queue.len(), 1);
        assert!(sink.0.starts_with(b"^R\r\n"));
    }

    #[test]
    fn vintr_raises_sigint_and_is_not_stored() {
        let termios = Termios::default();
        let (queue, outcome, _echoed) = run(&termios, b"\x03");
        assert_eq!(outcome.signals, vec![Signal::Sigint]);
        assert!(queue.is_empty());
    }

    #[test]
    fn vstop_inhibits_and_vstart_resumes() {
        let termios = Termios::default();
        let mut queue = InputQueue::new(64);
        let mut escaped = false;
        let mut reprint_pending = false;
        let mut inhibited = false;
        let mut sink = VecSink(Vec::new());
        in_process(
            &mut queue,
            &termios,
            &mut escaped,
            &mut reprint_pending,
            &mut inhibited,
            8,
            b"\x13",
            &mut sink,
        );
        assert!(inhibited);
        in_process(
            &mut queue,
            &termios,
            &mut escaped,
            &mut reprint_pending,
            &mut inhibited,
            8,
            b"\x11",
            &mut sink,
        );
        assert!(!inhibited);
    }

    #[test]
    fn raw_mode_tags_every_cell_as_eot() {
        let mut termios = Termios::default();
        termios.lflags.remove(LFlags::ICANON);
        let (mut queue, outcome, _echoed) = run(&termios, b"xy");
        assert_eq!(outcome.consumed, 2);
        assert_eq!(queue.eot_count(), 2);
        assert!(queue.pop_front().unwrap().eot);
        assert!(queue.pop_front().unwrap().eot);
    }

    #[test]
    fn full_queue_stops_early_in_raw_mode_with_partial_consumption() {
        let mut termios = Termios::default();
        termios.lflags.remove(LFlags::ICANON);
        let mut queue = InputQueue::new(4);
        let mut escaped = false;
        let mut reprint_pending = false;
        let mut inhibited = false;
        let mut sink = VecSink(Vec::new());
        let outcome = in_process(
            &mut queue,
            &termios,
            &mut escaped,
            &mut reprint_pending,
            &mut inhibited,
            8,
            b"abcdef",
            &mut sink,
        );
        assert!(outcome.stopped_on_full_queue);
        assert_eq!(outcome.consumed, 4);
        assert!(queue.is_full());
    }

    #[test]
    fn lnext_escapes_the_following_control_character() {
        let termios = Termios::default();
        let (mut queue, outcome, _echoed) = run(&termios, b"\x16\x03");
        assert_eq!(outcome.consumed, 2);
        let cell = queue.pop_front().unwrap();
        assert_eq!(cell.ch, 0x03);
        assert!(cell.escaped);
        assert!(outcome.signals.is_empty());
    }
}
