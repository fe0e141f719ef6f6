// SPDX-License-Identifier: MPL-2.0

//! The request dispatcher (spec.md §4.1, §4.2, §4.7, §4.8): a single
//! `Server` owning the fixed line table, the device back-ends, and the
//! timer wheel, servicing one request at a time.
//!
//! Grounded on the teacher's `kernel/src/device/tty/mod.rs` (the
//! `Tty`/`TtyDriver` pair routing `read`/`write`/`ioctl` to a
//! `LineDiscipline`), generalized to the full dispatch surface spec.md
//! §4 names (SELECT/STATUS/CANCEL/OPEN/CLOSE, suspend/revive), none of
//! which the teacher's work-in-progress file implements yet.

use log::{debug, trace, warn};

use crate::config::{Config, LineKind};
use crate::device::loopback::LoopbackBackend;
use crate::device::pty::master::PtyMaster;
use crate::device::pty::slave::PtySlaveBackend;
use crate::device::pty::new_pair;
use crate::device::{DeviceBackend, DeviceKind};
use crate::error::Errno;
use crate::message::{
    FlowAction, FlushSelector, IoctlRequest, ProcId, Reply, Request, SelectOps, StatusEvent,
};
use crate::tty::echo::EchoSink;
use crate::tty::input::Signal as InputSignal;
use crate::tty::line::{DrainRequest, DrainSlot, SelectSub};
use crate::tty::termios::Termios;
use crate::tty::timer::{vtime_to_duration, TimerWheel};
use crate::tty::Line;

/// Signals this subsystem can raise (spec.md §4.3 step 7, §4.7 `setattr`'s
/// `SIGHUP`). Job-control signals (`SIGTTIN`/`SIGTTOU`) are out of scope
/// per spec.md §1/§4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Sigint,
    Sigquit,
    Sighup,
}

struct CollectSink(Vec<u8>);
impl EchoSink for CollectSink {
    fn emit(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }
}

pub struct Server {
    config: Config,
    lines: Vec<Line>,
    devices: Vec<DeviceKind>,
    timers: TimerWheel,
    pty_masters: Vec<PtyMaster>,
    on_signal: Box<dyn FnMut(ProcId, Signal)>,
}

impl Server {
    /// Build the fixed line table (spec.md §3 "Lifecycle": all Lines are
    /// created at server start, never destroyed). `device_for` assigns a
    /// back-end per line index/kind; pty slaves are always a
    /// [`PtySlaveBackend`] regardless of what `device_for` returns for
    /// `LineKind::Pty`, since the master/slave pairing must be wired by
    /// the server, not the caller.
    pub fn new(
        config: Config,
        mut device_for: impl FnMut(usize, LineKind) -> DeviceKind,
        on_signal: impl FnMut(ProcId, Signal) + 'static,
    ) -> Self {
        let mut lines = Vec::with_capacity(config.n_lines());
        let mut devices = Vec::with_capacity(config.n_lines());
        let mut pty_masters = Vec::with_capacity(config.n_pty);
        let mut idx = 0;

        for k in 0..config.n_cons {
            lines.push(Line::new(
                idx,
                config.cons_minor_base() + k as u32,
                LineKind::Console,
                config.tab_size,
                config.queue_capacity,
            ));
            devices.push(device_for(idx, LineKind::Console));
            idx += 1;
        }
        for k in 0..config.n_serial {
            lines.push(Line::new(
                idx,
                config.rs232_minor_base() + k as u32,
                LineKind::Serial,
                config.tab_size,
                config.queue_capacity,
            ));
            devices.push(device_for(idx, LineKind::Serial));
            idx += 1;
        }
        for k in 0..config.n_pty {
            lines.push(Line::new(
                idx,
                config.ttypx_minor_base() + k as u32,
                LineKind::Pty,
                config.tab_size,
                config.queue_capacity,
            ));
            let pair = new_pair();
            devices.push(DeviceKind::PtySlave(PtySlaveBackend::new(pair.clone())));
            pty_masters.push(PtyMaster::new(pair));
            idx += 1;
        }

        Server {
            config,
            lines,
            devices,
            timers: TimerWheel::new(),
            pty_masters,
            on_signal: Box::new(on_signal),
        }
    }

    /// A server with an in-memory [`LoopbackBackend`] on every line — the
    /// std-crate equivalent of the teacher's `ktest` fixtures, used by the
    /// integration tests and the demo binary.
    pub fn demo(config: Config) -> Self {
        Self::new(config, |_idx, _kind| DeviceKind::Loopback(LoopbackBackend::new()), |_proc, _sig| {})
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn line(&self, idx: usize) -> &Line {
        &self.lines[idx]
    }

    pub fn line_mut(&mut self, idx: usize) -> &mut Line {
        &mut self.lines[idx]
    }

    pub fn device_mut(&mut self, idx: usize) -> &mut DeviceKind {
        &mut self.devices[idx]
    }

    pub fn pty_master(&self, k: usize) -> &PtyMaster {
        &self.pty_masters[k]
    }

    /// Resolve `minor` (spec.md §6 "Minor-number mapping") and dispatch,
    /// replying `ENXIO` for an unknown minor (spec.md §4.1 step 3). This is
    /// the entry point a message-port front-end would call with the raw
    /// minor carried on the wire, as opposed to [`Server::dispatch`], which
    /// already takes a resolved line index (used directly by tests and by
    /// callers that resolved the minor themselves).
    ///
    /// Per spec.md §9 Open Question 3 / §4.1: a `PTYPX_MINOR` (pty master)
    /// is delegated to the pty back-end directly, bypassing the line
    /// discipline for READ/WRITE/OPEN/CLOSE/SELECT/CANCEL/STATUS — only
    /// IOCTL falls through to the ordinary line-discipline path against the
    /// paired slave `Line`.
    pub fn resolve_and_dispatch(&mut self, proc: ProcId, minor: u32, request: Request) -> Reply {
        match self.config.try_resolve_minor(minor) {
            Ok((line, _kind)) => return self.dispatch(proc, line, request),
            Err(e) if e.error() != Errno::ENXIO => return Reply::Err(e.error()),
            Err(_) => {}
        }
        if let Some(slave_line) = self.config.resolve_ptypx_minor(minor) {
            if matches!(request, Request::Ioctl(_)) {
                return self.dispatch(proc, slave_line, request);
            }
            let master_idx = slave_line - self.config.n_cons - self.config.n_serial;
            return self.dispatch_pty_master(master_idx, request);
        }
        Reply::Err(Errno::ENXIO)
    }

    /// The pty master bypass path itself: no `Line`, no line discipline, no
    /// termios — just the shared duplex byte channel of
    /// [`crate::device::pty::PtyPair`]. Master-side OPEN/CLOSE/SELECT/
    /// CANCEL have no per-line state to track here (allocation of a fresh
    /// pty pair on OPEN is out of scope per spec.md §1's Non-goals), so
    /// they reply `Ok` unconditionally; READ/WRITE talk to the pair.
    fn dispatch_pty_master(&mut self, master_idx: usize, request: Request) -> Reply {
        let master = &self.pty_masters[master_idx];
        match request {
            Request::Read { count, nonblock } => match master.read(count) {
                Some(data) => Reply::ReadDone { data },
                None if nonblock => Reply::Err(Errno::EAGAIN),
                None => Reply::Suspend,
            },
            Request::Write { data, nonblock: _ } => {
                let count = data.len();
                master.write(&data);
                Reply::WriteDone { count }
            }
            Request::Open { .. } | Request::Close => Reply::Ok,
            Request::Select { ops, .. } => {
                let mut ready = SelectOps::empty();
                if master.has_output() {
                    ready |= SelectOps::READ;
                }
                ready |= SelectOps::WRITE;
                Reply::SelectReady(ready & ops)
            }
            Request::Cancel { .. } => Reply::Err(Errno::EINTR),
            Request::Status => Reply::Ok,
            Request::Ioctl(_) => unreachable!("Ioctl is routed to the slave line by resolve_and_dispatch"),
        }
    }

    /// Expire due timers (alarm classification, spec.md §4.1 step 3) and
    /// run `handle_events` on every line whose timer fired or whose
    /// `events_flag` is otherwise set.
    pub fn on_alarm(&mut self, now: std::time::Instant) {
        for line_idx in self.timers.expire(now) {
            self.lines[line_idx].events_flag = true;
        }
        self.pump_events();
    }

    /// Hardware interrupt notification (spec.md §4.1 step 3): a bitmask is
    /// collapsed by the caller into "these lines may have work"; this
    /// crate takes the line list directly rather than a raw IRQ bitmask
    /// (no physical IRQ lines exist in a std process).
    pub fn on_hardware_interrupt(&mut self, lines: &[usize]) {
        for &idx in lines {
            self.lines[idx].events_flag = true;
        }
        self.pump_events();
    }

    fn pump_events(&mut self) {
        for idx in 0..self.lines.len() {
            if self.lines[idx].events_flag {
                self.handle_events(idx);
            }
        }
    }

    pub fn next_alarm_deadline(&self) -> Option<std::time::Instant> {
        self.timers.next_deadline()
    }

    /// `handle_events` (spec.md §4.2).
    pub fn handle_events(&mut self, idx: usize) {
        loop {
            self.lines[idx].events_flag = false;

            let mut collected = CollectSink(Vec::new());
            self.devices[idx].devread(&mut self.lines[idx], &mut collected, false);
            if !collected.0.is_empty() {
                self.devices[idx].emit_echo_batch(&collected.0);
            }
            self.drain_feed_side_effects(idx);

            self.devices[idx].devwrite(&mut self.lines[idx], false);
            self.complete_write_if_drained(idx);

            self.try_complete_drain(idx);

            if !self.lines[idx].events_flag {
                break;
            }
        }

        if let Some(result) = self.lines[idx].in_transfer() {
            if result.finished {
                self.complete_read(idx);
            }
        }

        self.retry_select(idx);
    }

    /// Apply the signals/timer-arm decisions `Line::feed` queued during the
    /// `devread` call just made.
    fn drain_feed_side_effects(&mut self, idx: usize) {
        let signals: Vec<InputSignal> = self.lines[idx].pending_signals.drain(..).collect();
        for sig in signals {
            let mapped = match sig {
                InputSignal::Sigint => Signal::Sigint,
                InputSignal::Sigquit => Signal::Sigquit,
            };
            self.raise_signal(idx, mapped);
        }
        if std::mem::take(&mut self.lines[idx].pending_timer_arm) {
            let vtime = self.lines[idx].termios.cc(crate::tty::termios::Cc::VTIME);
            self.timers.set(idx, vtime_to_duration(vtime));
        }
    }

    /// `sigchar` (spec.md §4.7): deliver to `pgrp`, then (unless `NOFLSH`)
    /// flush input, cancel device output, clear inhibition, raise events.
    fn raise_signal(&mut self, idx: usize, sig: Signal) {
        let pgrp = self.lines[idx].pgrp;
        if pgrp != 0 {
            (self.on_signal)(pgrp, sig);
        }
        if self.lines[idx].flush_on_signal() {
            self.devices[idx].ocancel(&mut self.lines[idx]);
        }
    }

    fn try_complete_drain(&mut self, idx: usize) {
        let writer_done = self.lines[idx].writer.as_ref().map(|w| w.leftover == 0).unwrap_or(true);
        if !writer_done {
            return;
        }
        let Some(drain) = self.lines[idx].drain.take() else {
            return;
        };
        match drain.request {
            DrainRequest::Drain => {
                self.reply_ok(drain.proc);
            }
            DrainRequest::SetAttrWait(new) => {
                self.apply_setattr(idx, new);
                self.reply_ok(drain.proc);
            }
            DrainRequest::SetAttrFlush(new) => {
                self.lines[idx].queue.clear();
                self.apply_setattr(idx, new);
                self.reply_ok(drain.proc);
            }
        }
    }

    fn reply_ok(&self, _proc: ProcId) {
        // Direct replies in this crate are returned synchronously by
        // `dispatch`; a drain completing asynchronously (after the
        // original TCSETSW/TCSETSF/TCDRAIN call already returned
        // `Suspend`) has no reply channel left to use here other than the
        // REVIVE/STATUS path, which the caller discovers via `do_status`
        // finding `drain == None` and the line no longer busy. Nothing
        // further to send from this function itself.
    }

    fn apply_setattr(&mut self, idx: usize, new: Termios) {
        let outcome = self.lines[idx].setattr(new);
        self.timers.clear(idx);
        if outcome.hangup {
            self.raise_signal(idx, Signal::Sighup);
        }
        self.devices[idx].ioctl(&self.lines[idx]);
    }

    /// Mark a just-finished reader slot as revived (spec.md §4.2 "reply
    /// code ∈ {direct, revive}, revived_flag"). `dispatch`'s `Read` arm
    /// (direct path, same call that populated the slot) takes the slot
    /// itself by checking `leftover == 0` and never looks at this flag;
    /// it only matters when `in_transfer` finishes asynchronously — a
    /// later `handle_events` run off an interrupt/alarm, with no `Read`
    /// call on this stack — so that `do_status` can find it.
    fn complete_read(&mut self, idx: usize) {
        if let Some(reader) = self.lines[idx].reader.as_mut() {
            reader.revived = true;
        }
    }

    /// Same as [`Server::complete_read`] but for the writer slot, which
    /// `handle_events`'s do-while loop never otherwise re-checks after the
    /// `devwrite` call (unlike the reader, whose completion is detected by
    /// the `in_transfer` call that always follows the loop).
    fn complete_write_if_drained(&mut self, idx: usize) {
        if let Some(writer) = self.lines[idx].writer.as_mut() {
            if writer.leftover == 0 {
                writer.revived = true;
            }
        }
    }

    /// A subscribed SELECT becomes satisfiable any time events run, not only
    /// when the caller polls again. This just leaves `select_sub` in place
    /// for `do_status` to find and resolve — a real mpsc server would also
    /// push a wakeup to `sub.proc` here.
    fn retry_select(&mut self, _idx: usize) {}

    /// The single synchronous entry point: process one request against
    /// `line` on behalf of `proc`, returning the reply. This plays the
    /// role of a message-port round trip without requiring an actual
    /// `std::sync::mpsc` thread in callers (tests, the demo binary) that
    /// don't need one; [`Server::on_hardware_interrupt`]/[`Server::on_alarm`]
    /// cover the other two event sources of spec.md §5.
    pub fn dispatch(&mut self, proc: ProcId, line: usize, request: Request) -> Reply {
        if line >= self.lines.len() {
            return Reply::Err(Errno::ENXIO);
        }
        trace!("line {line}: dispatch {request:?} from proc {proc}");
        match request {
            Request::Open { no_noctty } => self.do_open(line, proc, no_noctty),
            Request::Close => self.do_close(line),
            Request::Read { count, nonblock } => self.do_read(line, proc, count, nonblock),
            Request::Write { data, nonblock } => self.do_write(line, proc, data, nonblock),
            Request::Ioctl(req) => self.do_ioctl(line, proc, req),
            Request::Select { ops, notify } => self.do_select(line, proc, ops, notify),
            Request::Cancel { ops } => self.do_cancel(line, proc, ops),
            Request::Status => self.do_status(proc),
        }
    }

    /// OPEN (spec.md §4.7). The log minor rejects READ (see `do_read`) but
    /// still accepts OPEN for write.
    fn do_open(&mut self, idx: usize, proc: ProcId, no_noctty: bool) -> Reply {
        self.lines[idx].open_count += 1;
        if !no_noctty {
            self.lines[idx].pgrp = proc;
            debug!("line {idx}: proc {proc} became controlling tty");
            return Reply::BecameControllingTty;
        }
        Reply::Ok
    }

    fn do_close(&mut self, idx: usize) -> Reply {
        let line = &mut self.lines[idx];
        if line.open_count > 0 {
            line.open_count -= 1;
        }
        if line.open_count == 0 {
            line.cancel_reader();
            line.cancel_writer();
            self.devices[idx].icancel(line);
            self.devices[idx].ocancel(line);
            self.devices[idx].close(line);
            self.timers.clear(idx);
            self.lines[idx].reset_to_defaults();
        }
        Reply::Ok
    }

    fn do_read(&mut self, idx: usize, proc: ProcId, count: usize, nonblock: bool) -> Reply {
        if self.config.is_log_minor(self.lines[idx].minor) {
            return Reply::Err(Errno::EACCES);
        }
        if let Err(e) = self.lines[idx].start_read(count, nonblock, proc) {
            return Reply::Err(e);
        }

        match self.lines[idx].read_entry_timer_adjustment() {
            Some(vtime) => self.timers.set(idx, vtime_to_duration(vtime as u8)),
            None => self.timers.clear(idx),
        }

        self.lines[idx].in_transfer();
        self.handle_events(idx);

        let finished = self.lines[idx].reader.as_ref().map(|r| r.leftover == 0).unwrap_or(true);
        if finished {
            let reader = self.lines[idx].reader.take().expect("finished implies a slot existed");
            return Reply::ReadDone { data: reader.buf };
        }

        if nonblock {
            let reader = self.lines[idx].reader.take().expect("populated above");
            if reader.cumulative > 0 {
                return Reply::ReadDone { data: reader.buf };
            }
            return Reply::Err(Errno::EAGAIN);
        }

        Reply::Suspend
    }

    fn do_write(&mut self, idx: usize, proc: ProcId, data: Vec<u8>, nonblock: bool) -> Reply {
        if let Err(e) = self.lines[idx].start_write(data, nonblock, proc) {
            return Reply::Err(e);
        }

        self.handle_events(idx);

        let finished = self.lines[idx].writer.as_ref().map(|w| w.leftover == 0).unwrap_or(true);
        if finished {
            let writer = self.lines[idx].writer.take().expect("finished implies a slot existed");
            return Reply::WriteDone { count: writer.cumulative };
        }

        if nonblock {
            let writer = self.lines[idx].writer.take().expect("populated above");
            if writer.cumulative > 0 {
                return Reply::WriteDone { count: writer.cumulative };
            }
            return Reply::Err(Errno::EAGAIN);
        }

        Reply::Suspend
    }

    fn do_ioctl(&mut self, idx: usize, proc: ProcId, req: IoctlRequest) -> Reply {
        match req {
            IoctlRequest::GetTermios => Reply::Termios(self.lines[idx].termios),
            IoctlRequest::SetTermios(new) => {
                self.apply_setattr(idx, new);
                Reply::Ok
            }
            IoctlRequest::SetTermiosWait(new) => self.wait_then_setattr(idx, proc, DrainRequest::SetAttrWait(new)),
            IoctlRequest::SetTermiosFlush(new) => self.wait_then_setattr(idx, proc, DrainRequest::SetAttrFlush(new)),
            IoctlRequest::GetWinSize => Reply::WinSize(self.lines[idx].winsize),
            IoctlRequest::SetWinSize(ws) => {
                self.lines[idx].winsize = ws;
                Reply::Ok
            }
            IoctlRequest::Drain => self.wait_then_setattr(idx, proc, DrainRequest::Drain),
            IoctlRequest::Flush(sel) => {
                match sel {
                    FlushSelector::In => self.lines[idx].queue.clear(),
                    FlushSelector::Out => {
                        self.devices[idx].ocancel(&mut self.lines[idx]);
                        self.lines[idx].writer = None;
                    }
                    FlushSelector::Both => {
                        self.lines[idx].queue.clear();
                        self.devices[idx].ocancel(&mut self.lines[idx]);
                        self.lines[idx].writer = None;
                    }
                }
                Reply::Ok
            }
            IoctlRequest::Flow(action) => {
                match action {
                    FlowAction::OutputStop | FlowAction::InputStop => self.lines[idx].inhibited = true,
                    FlowAction::OutputStart | FlowAction::InputStart => self.lines[idx].inhibited = false,
                }
                Reply::Ok
            }
            IoctlRequest::Break => {
                self.devices[idx].send_break(&mut self.lines[idx]);
                Reply::Ok
            }
            IoctlRequest::SetKeymapOrFont(payload) => {
                if self.lines[idx].kind == LineKind::Console {
                    let _ = payload;
                    Reply::Ok
                } else {
                    Reply::Err(Errno::ENOTTY)
                }
            }
            IoctlRequest::GetPgrp => {
                if self.lines[idx].kind == LineKind::Pty || self.lines[idx].kind == LineKind::Console {
                    Reply::Pgrp(self.lines[idx].pgrp)
                } else {
                    Reply::Err(Errno::ENOTTY)
                }
            }
            IoctlRequest::SetPgrp(pgrp) => {
                self.lines[idx].pgrp = pgrp;
                Reply::Ok
            }
        }
    }

    fn wait_then_setattr(&mut self, idx: usize, proc: ProcId, request: DrainRequest) -> Reply {
        let drained = self.lines[idx].writer.as_ref().map(|w| w.leftover == 0).unwrap_or(true);
        if drained {
            match request {
                DrainRequest::Drain => Reply::Ok,
                DrainRequest::SetAttrWait(new) => {
                    self.apply_setattr(idx, new);
                    Reply::Ok
                }
                DrainRequest::SetAttrFlush(new) => {
                    self.lines[idx].queue.clear();
                    self.apply_setattr(idx, new);
                    Reply::Ok
                }
            }
        } else {
            self.lines[idx].drain = Some(DrainSlot { request, proc });
            Reply::Suspend
        }
    }

    fn do_select(&mut self, idx: usize, proc: ProcId, ops: SelectOps, notify: bool) -> Reply {
        let write_probe = self.devices[idx].devwrite(&mut self.lines[idx], true);
        let ready = self.lines[idx].select_ready(write_probe) & ops;
        if !ready.is_empty() {
            return Reply::SelectReady(ready);
        }
        if notify {
            self.lines[idx].select_sub = Some(SelectSub { ops, proc });
        }
        Reply::SelectReady(SelectOps::empty())
    }

    /// Scan all lines for the first thing pending for `proc`, as
    /// [`StatusEvent`] (spec.md §4.7's "reply the first match"), then
    /// convert it to the wire-level [`Reply`].
    fn find_status_event(&mut self, proc: ProcId) -> StatusEvent {
        for idx in 0..self.lines.len() {
            if let Some(sub) = self.lines[idx].select_sub {
                if sub.proc == proc {
                    let write_probe = self.devices[idx].devwrite(&mut self.lines[idx], true);
                    let ready = self.lines[idx].select_ready(write_probe) & sub.ops;
                    if !ready.is_empty() {
                        self.lines[idx].select_sub = None;
                        return StatusEvent::IoReady { line: idx, ops: ready };
                    }
                }
            }
            if let Some(reader) = &self.lines[idx].reader {
                if reader.proc == proc && reader.revived {
                    return StatusEvent::ReviveRead {
                        line: idx,
                        cumulative: reader.buf.len(),
                    };
                }
            }
            if let Some(writer) = &self.lines[idx].writer {
                if writer.proc == proc && writer.revived {
                    return StatusEvent::ReviveWrite {
                        line: idx,
                        cumulative: writer.cumulative,
                    };
                }
            }
        }
        StatusEvent::NoStatus
    }

    fn do_status(&mut self, proc: ProcId) -> Reply {
        match self.find_status_event(proc) {
            StatusEvent::IoReady { ops, .. } => Reply::SelectReady(ops),
            StatusEvent::ReviveRead { line, .. } => {
                let reader = self.lines[line].reader.take().expect("just found above");
                Reply::ReadDone { data: reader.buf }
            }
            StatusEvent::ReviveWrite { line, .. } => {
                let writer = self.lines[line].writer.take().expect("just found above");
                Reply::WriteDone { count: writer.cumulative }
            }
            StatusEvent::NoStatus => {
                warn!("proc {proc}: STATUS poll with nothing pending");
                Reply::Ok
            }
        }
    }

    fn do_cancel(&mut self, idx: usize, proc: ProcId, ops: SelectOps) -> Reply {
        let mut cancelled = false;
        if ops.contains(SelectOps::READ) {
            if let Some(reader) = &self.lines[idx].reader {
                if reader.proc == proc {
                    self.lines[idx].cancel_reader();
                    self.devices[idx].icancel(&mut self.lines[idx]);
                    cancelled = true;
                }
            }
        }
        if ops.contains(SelectOps::WRITE) {
            if let Some(writer) = &self.lines[idx].writer {
                if writer.proc == proc {
                    self.lines[idx].cancel_writer();
                    cancelled = true;
                }
            }
        }
        if let Some(drain) = &self.lines[idx].drain {
            if drain.proc == proc {
                self.lines[idx].cancel_drain();
                cancelled = true;
            }
        }
        if cancelled {
            self.lines[idx].events_flag = true;
        }
        Reply::Err(Errno::EINTR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::loopback::LoopbackBackend;

    fn demo_server() -> Server {
        Server::demo(Config::default())
    }

    fn loopback_mut(server: &mut Server, idx: usize) -> &mut LoopbackBackend {
        match server.device_mut(idx) {
            DeviceKind::Loopback(b) => b,
            _ => panic!("expected a loopback backend"),
        }
    }

    #[test]
    fn open_read_write_close_round_trip() {
        let mut server = demo_server();
        assert_eq!(server.dispatch(1, 0, Request::Open { no_noctty: false }), Reply::BecameControllingTty);

        let reply = server.dispatch(1, 0, Request::Read { count: 8, nonblock: true });
        assert_eq!(reply, Reply::Err(Errno::EAGAIN));

        loopback_mut(&mut server, 0).push_input(b"hi\n");
        server.handle_events(0);
        let reply = server.dispatch(1, 0, Request::Read { count: 8, nonblock: true });
        assert_eq!(reply, Reply::ReadDone { data: b"hi\n".to_vec() });

        let reply = server.dispatch(1, 0, Request::Write { data: b"ok\n".to_vec(), nonblock: false });
        assert_eq!(reply, Reply::WriteDone { count: 3 });
        assert_eq!(loopback_mut(&mut server, 0).take_output(), b"ok\r\n");

        assert_eq!(server.dispatch(1, 0, Request::Close), Reply::Ok);
        assert_eq!(server.line(0).open_count, 0);
    }

    #[test]
    fn blocking_read_suspends_until_input_arrives() {
        let mut server = demo_server();
        let reply = server.dispatch(1, 0, Request::Read { count: 8, nonblock: false });
        assert_eq!(reply, Reply::Suspend);
        assert!(server.line(0).reader.is_some());

        loopback_mut(&mut server, 0).push_input(b"ok\n");
        server.handle_events(0);
        assert!(server.line(0).reader.is_none());
    }

    #[test]
    fn cancel_clears_the_suspended_reader_and_replies_eintr() {
        let mut server = demo_server();
        server.dispatch(1, 0, Request::Read { count: 8, nonblock: false });
        let reply = server.dispatch(1, 0, Request::Cancel { ops: SelectOps::READ });
        assert_eq!(reply, Reply::Err(Errno::EINTR));
        assert!(server.line(0).reader.is_none());
    }

    #[test]
    fn log_minor_rejects_read_with_eacces() {
        let config = Config::default();
        let mut server = Server::new(config, |_i, _k| DeviceKind::Loopback(LoopbackBackend::new()), |_p, _s| {});
        let log_minor = config.log_minor();
        let (log_line, _) = config.resolve_minor(log_minor).unwrap();
        let reply = server.dispatch(1, log_line, Request::Read { count: 8, nonblock: true });
        assert_eq!(reply, Reply::Err(Errno::EACCES));
    }

    #[test]
    fn resolve_and_dispatch_reports_enxio_for_an_unknown_minor() {
        let mut server = demo_server();
        let bogus_minor = server.config().ptypx_minor_base() + server.config().n_pty as u32 + 1000;
        let reply = server.resolve_and_dispatch(1, bogus_minor, Request::Read { count: 1, nonblock: true });
        assert_eq!(reply, Reply::Err(Errno::ENXIO));
    }

    #[test]
    fn resolve_and_dispatch_routes_a_console_minor_through_the_line_discipline() {
        let mut server = demo_server();
        let reply = server.resolve_and_dispatch(1, 0, Request::Open { no_noctty: true });
        assert_eq!(reply, Reply::Ok);
    }

    #[test]
    fn pty_master_write_bypasses_the_line_discipline_and_reaches_the_slave_queue() {
        let mut server = demo_server();
        let config = *server.config();
        let master_minor = config.ptypx_minor_base();
        let slave_line = config.n_cons + config.n_serial;

        let reply = server.resolve_and_dispatch(1, master_minor, Request::Write { data: b"hi\n".to_vec(), nonblock: false });
        assert_eq!(reply, Reply::WriteDone { count: 3 });

        server.handle_events(slave_line);
        assert_eq!(server.line(slave_line).queue.len(), 3);
    }

    #[test]
    fn pty_master_ioctl_falls_through_to_the_paired_slave_line() {
        let mut server = demo_server();
        let config = *server.config();
        let master_minor = config.ptypx_minor_base();
        let slave_line = config.n_cons + config.n_serial;

        let reply = server.resolve_and_dispatch(
            1,
            master_minor,
            Request::Ioctl(IoctlRequest::GetTermios),
        );
        assert_eq!(reply, Reply::Termios(server.line(slave_line).termios));
    }

    #[test]
    fn select_reports_read_ready_once_a_full_line_is_queued() {
        let mut server = demo_server();
        let reply = server.dispatch(1, 0, Request::Select { ops: SelectOps::READ, notify: false });
        assert_eq!(reply, Reply::SelectReady(SelectOps::empty()));

        loopback_mut(&mut server, 0).push_input(b"go\n");
        server.handle_events(0);
        let reply = server.dispatch(1, 0, Request::Select { ops: SelectOps::READ, notify: false });
        assert_eq!(reply, Reply::SelectReady(SelectOps::READ));
    }

    /// `TCDRAIN` against a writer that is still inhibited (spec.md §4.7:
    /// "record the pending ioctl in the drain slot and suspend") completes
    /// only once `handle_events` drains the writer, not before.
    #[test]
    fn tcdrain_suspends_until_the_writer_slot_empties_then_completes() {
        let mut server = demo_server();
        server.dispatch(1, 0, Request::Open { no_noctty: true });

        loopback_mut(&mut server, 0).push_input(b"\x13"); // VSTOP
        server.handle_events(0);
        assert!(server.line(0).inhibited);

        let reply = server.dispatch(1, 0, Request::Write { data: b"abc".to_vec(), nonblock: false });
        assert_eq!(reply, Reply::Suspend);

        let reply = server.dispatch(1, 0, Request::Ioctl(IoctlRequest::Drain));
        assert_eq!(reply, Reply::Suspend);
        assert!(server.line(0).drain.is_some());

        loopback_mut(&mut server, 0).push_input(b"\x11"); // VSTART
        server.handle_events(0);
        assert!(server.line(0).drain.is_none());
        let writer = server.line(0).writer.as_ref().expect("writer slot awaiting STATUS poll");
        assert_eq!(writer.leftover, 0);
    }

    #[test]
    fn tcflsh_both_is_idempotent() {
        let mut server = demo_server();
        server.dispatch(1, 0, Request::Open { no_noctty: true });
        loopback_mut(&mut server, 0).push_input(b"partial");
        server.handle_events(0);
        assert!(server.line(0).queue.len() > 0);

        let reply = server.dispatch(1, 0, Request::Ioctl(IoctlRequest::Flush(FlushSelector::Both)));
        assert_eq!(reply, Reply::Ok);
        assert_eq!(server.line(0).queue.len(), 0);
        assert_eq!(server.line(0).queue.eot_count(), 0);

        let reply = server.dispatch(1, 0, Request::Ioctl(IoctlRequest::Flush(FlushSelector::Both)));
        assert_eq!(reply, Reply::Ok);
        assert_eq!(server.line(0).queue.len(), 0);
    }

    #[test]
    fn getpgrp_setpgrp_round_trip_on_a_console_line() {
        let mut server = demo_server();
        server.dispatch(1, 0, Request::Open { no_noctty: false });
        assert_eq!(server.dispatch(1, 0, Request::Ioctl(IoctlRequest::GetPgrp)), Reply::Pgrp(1));

        let reply = server.dispatch(1, 0, Request::Ioctl(IoctlRequest::SetPgrp(42)));
        assert_eq!(reply, Reply::Ok);
        assert_eq!(server.dispatch(1, 0, Request::Ioctl(IoctlRequest::GetPgrp)), Reply::Pgrp(42));
    }

    #[test]
    fn getpgrp_is_enotty_on_a_serial_line() {
        let config = Config::default();
        let mut server = Server::new(config, |_i, _k| DeviceKind::Loopback(LoopbackBackend::new()), |_p, _s| {});
        let serial_line = config.n_cons;
        let reply = server.dispatch(1, serial_line, Request::Ioctl(IoctlRequest::GetPgrp));
        assert_eq!(reply, Reply::Err(Errno::ENOTTY));
    }
}
