// SPDX-License-Identifier: MPL-2.0

//! The device back-end contract (spec.md §6, §9) and its closed set of
//! implementations.
//!
//! spec.md §9 raises "tagged variant vs. trait object" as an open design
//! question and recommends the tagged variant since the back-end set is
//! closed (console, serial, pty slave — loopback added for tests/demo);
//! [`DeviceKind`] is that tagged enum. [`DeviceBackend`] is still expressed
//! as a trait, grounded on the teacher's `TtyDriver` trait
//! (`kernel/src/device/tty/n_tty.rs`), so each backend's implementation
//! reads like ordinary trait impls instead of one large match.
//!
//! The vtable is *not* embedded in [`Line`](crate::tty::Line) the way
//! spec.md §3 literally tables it: storing `Box<dyn DeviceBackend>` inside
//! `Line` and then calling `self.device.devread(self, ...)` would require
//! Line to alias itself mutably. The dispatcher instead keeps a
//! `Vec<DeviceKind>` parallel to its `Vec<Line>`, indexed by the same line
//! id — same lifetime (immutable after init, one per line), just not a
//! self-referential field.

pub mod console;
pub mod loopback;
pub mod pty;

use crate::tty::echo::EchoSink;
use crate::tty::Line;

/// Per-line hardware/peer adapter. Default behavior for an unimplemented
/// operation is a no-op, matching spec.md §6 "default is a no-op".
pub trait DeviceBackend {
    /// Drain hardware input into the line's input processor. `probe` asks
    /// "would work be available?" without consuming.
    fn devread(&mut self, line: &mut Line, sink: &mut dyn EchoSink, probe: bool) -> bool;
    /// Consume the writer slot via `out_process`. `probe` reports write
    /// readiness without consuming.
    fn devwrite(&mut self, line: &mut Line, probe: bool) -> bool;
    /// Discard pending output.
    fn ocancel(&mut self, _line: &mut Line) {}
    /// Discard hardware input buffers.
    fn icancel(&mut self, _line: &mut Line) {}
    /// Apply current termios to hardware (baud, bits, etc).
    fn ioctl(&mut self, _line: &Line) {}
    /// Emit a single echoed byte to the sink (keyboard LEDs, etc; most
    /// backends don't need this beyond what the echo engine already wrote
    /// to the transfer sink).
    fn echo(&mut self, _ch: u8) {}

    /// Forward a whole run of echoed bytes at once. The dispatcher collects
    /// everything `in_process` echoes during one `devread` into a scratch
    /// buffer (since `devread` cannot also borrow its own backend as the
    /// echo sink) and hands the batch here afterwards. Default forwards one
    /// byte at a time through [`DeviceBackend::echo`].
    fn emit_echo_batch(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.echo(b);
        }
    }
    /// Assert BREAK (`TCSBRK`).
    fn send_break(&mut self, _line: &mut Line) {}
    /// Release hardware on final CLOSE.
    fn close(&mut self, _line: &mut Line) {}
}

/// The closed set of concrete back-ends this crate ships.
pub enum DeviceKind {
    Loopback(loopback::LoopbackBackend),
    Console(console::ConsoleBackend),
    PtySlave(pty::slave::PtySlaveBackend),
}

impl DeviceBackend for DeviceKind {
    fn devread(&mut self, line: &mut Line, sink: &mut dyn EchoSink, probe: bool) -> bool {
        match self {
            DeviceKind::Loopback(b) => b.devread(line, sink, probe),
            DeviceKind::Console(b) => b.devread(line, sink, probe),
            DeviceKind::PtySlave(b) => b.devread(line, sink, probe),
        }
    }

    fn devwrite(&mut self, line: &mut Line, probe: bool) -> bool {
        match self {
            DeviceKind::Loopback(b) => b.devwrite(line, probe),
            DeviceKind::Console(b) => b.devwrite(line, probe),
            DeviceKind::PtySlave(b) => b.devwrite(line, probe),
        }
    }

    fn ocancel(&mut self, line: &mut Line) {
        match self {
            DeviceKind::Loopback(b) => b.ocancel(line),
            DeviceKind::Console(b) => b.ocancel(line),
            DeviceKind::PtySlave(b) => b.ocancel(line),
        }
    }

    fn icancel(&mut self, line: &mut Line) {
        match self {
            DeviceKind::Loopback(b) => b.icancel(line),
            DeviceKind::Console(b) => b.icancel(line),
            DeviceKind::PtySlave(b) => b.icancel(line),
        }
    }

    fn ioctl(&mut self, line: &Line) {
        match self {
            DeviceKind::Loopback(b) => b.ioctl(line),
            DeviceKind::Console(b) => b.ioctl(line),
            DeviceKind::PtySlave(b) => b.ioctl(line),
        }
    }

    fn echo(&mut self, ch: u8) {
        match self {
            DeviceKind::Loopback(b) => b.echo(ch),
            DeviceKind::Console(b) => b.echo(ch),
            DeviceKind::PtySlave(b) => b.echo(ch),
        }
    }

    fn emit_echo_batch(&mut self, bytes: &[u8]) {
        match self {
            DeviceKind::Loopback(b) => b.emit_echo_batch(bytes),
            DeviceKind::Console(b) => b.emit_echo_batch(bytes),
            DeviceKind::PtySlave(b) => b.emit_echo_batch(bytes),
        }
    }

    fn send_break(&mut self, line: &mut Line) {
        match self {
            DeviceKind::Loopback(b) => b.send_break(line),
            DeviceKind::Console(b) => b.send_break(line),
            DeviceKind::PtySlave(b) => b.send_break(line),
        }
    }

    fn close(&mut self, line: &mut Line) {
        match self {
            DeviceKind::Loopback(b) => b.close(line),
            DeviceKind::Console(b) => b.close(line),
            DeviceKind::PtySlave(b) => b.close(line),
        }
    }
}
