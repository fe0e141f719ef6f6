// SPDX-License-Identifier: MPL-2.0

//! A device-independent terminal line discipline: the canonical/raw input
//! editing, echo rendering, output post-processing, and suspend/revive
//! request handling a character device sits behind, decoupled from any
//! particular keyboard, UART, or pty transport.
//!
//! See `SPEC_FULL.md` in the repository root for the full module-by-module
//! behavioral description this crate implements.

pub mod config;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod tty;

pub use config::{Config, LineKind};
pub use device::{console::ConsoleBackend, loopback::LoopbackBackend, DeviceBackend, DeviceKind};
pub use dispatcher::{Server, Signal};
pub use error::{Errno, Error};
pub use message::{
    FlowAction, FlushSelector, IoctlRequest, ProcId, Reply, Request, SelectOps, StatusEvent,
};
pub use tty::echo::EchoSink;
pub use tty::termios::{Cc, IFlags, LFlags, OFlags, Speed, Termios, WinSize};
pub use tty::Line;
