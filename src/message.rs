// SPDX-License-Identifier: MPL-2.0

//! The message-port protocol of spec.md §6: request/reply shapes and the
//! out-of-band notification used for the `SUSPEND`/`REVIVE` handshake of
//! spec.md §5, §4.7.
//!
//! There is no teacher counterpart for the message port itself — the
//! teacher runs inside `ostd`'s own IPC, which this crate cannot depend on
//! (spec.md §1 names the surrounding microkernel as an out-of-scope
//! collaborator) — so the shapes here are new, grounded in spec.md §6's
//! enumeration of request kinds and reply messages. The port itself is
//! [`crate::dispatcher::Server::dispatch`], a synchronous call standing in
//! for a send/receive round trip (see `SPEC_FULL.md` §8).

use bitflags::bitflags;

use crate::error::Errno;
use crate::tty::termios::{Termios, WinSize};

/// Identifies the calling process. Opaque beyond equality/ordering.
pub type ProcId = u32;

bitflags! {
    pub struct SelectOps: u8 {
        const READ  = 0b001;
        const WRITE = 0b010;
        const ERROR = 0b100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushSelector {
    In,
    Out,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    /// `TCOOFF`: suspend output.
    OutputStop,
    /// `TCOON`: resume output.
    OutputStart,
    /// `TCIOFF`: send VSTOP (or force `stopped`).
    InputStop,
    /// `TCION`: send VSTART (or force `running`).
    InputStart,
}

/// The `IOCTL` sub-requests of spec.md §4.7.
#[derive(Debug, Clone)]
pub enum IoctlRequest {
    GetTermios,
    SetTermios(Termios),
    SetTermiosWait(Termios),
    SetTermiosFlush(Termios),
    GetWinSize,
    SetWinSize(WinSize),
    Drain,
    Flush(FlushSelector),
    Flow(FlowAction),
    Break,
    /// `KIOCSMAP`/`TIOCSFON`: honored only on consoles, opaque payload.
    SetKeymapOrFont(Vec<u8>),
    GetPgrp,
    SetPgrp(ProcId),
}

/// One request arriving at the dispatcher's message port (spec.md §6).
#[derive(Debug, Clone)]
pub enum Request {
    Read { count: usize, nonblock: bool },
    Write { data: Vec<u8>, nonblock: bool },
    Ioctl(IoctlRequest),
    Open { no_noctty: bool },
    Close,
    Select { ops: SelectOps, notify: bool },
    Cancel { ops: SelectOps },
    Status,
}

/// The direct (synchronous) reply to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `TASK_REPLY` for requests with no extra payload (CLOSE, CANCEL,
    /// most IOCTLs with an in-parameter only).
    Ok,
    ReadDone { data: Vec<u8> },
    WriteDone { count: usize },
    Termios(Termios),
    WinSize(WinSize),
    Pgrp(ProcId),
    /// OPEN became the controlling terminal (spec.md §4.7: reply `1`).
    BecameControllingTty,
    /// `DEV_IO_READY` for a SELECT that was immediately satisfiable.
    SelectReady(SelectOps),
    /// The request could not complete now; the caller is suspended and
    /// must later issue `Status` to retrieve the `Revive`/`IoReady`
    /// outcome (spec.md §5 "Suspension points").
    Suspend,
    Err(Errno),
}

/// What `do_status` (spec.md §4.7) finds pending for a given caller,
/// scanning all Lines in order and returning the first match.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    IoReady { line: usize, ops: SelectOps },
    ReviveRead { line: usize, cumulative: usize },
    ReviveWrite { line: usize, cumulative: usize },
    NoStatus,
}
