// SPDX-License-Identifier: MPL-2.0

//! The echo engine (`tty_echo`, `back_over`, `reprint` of spec.md §4.4,
//! §4.5). Grounded on the teacher's `LineDiscipline::output_char`, but
//! generalized: the teacher only renders `ECHOCTL` control chars, `\n`,
//! `\r` and `VERASE`; this implements the full rendering spec.md §4.5
//! requires (tab expansion with column tracking, `^?` for DEL, EOF
//! backspacing, reprint).

use super::queue::Cell;
use super::termios::{Cc, Termios};

/// Where rendered echo bytes go. The teacher threads an `FnMut(&str)`
/// callback through `push_char`/`output_char` for the same purpose; this
/// crate widens it to raw bytes so non-UTF8 control sequences don't need
/// an intermediate `&str`.
pub trait EchoSink {
    fn emit(&mut self, bytes: &[u8]);
}

impl<F: FnMut(&[u8])> EchoSink for F {
    fn emit(&mut self, bytes: &[u8]) {
        (self)(bytes)
    }
}

/// Render one input cell to the echo sink, returning the cell with its
/// `len` (screen columns consumed) filled in. `column` is the line's
/// running tab-stop counter (spec.md §3, §4.5).
pub fn tty_echo(
    mut cell: Cell,
    termios: &Termios,
    tab_size: usize,
    column: &mut usize,
    sink: &mut impl EchoSink,
) -> Cell {
    use super::termios::LFlags;

    if !termios.lflags.contains(LFlags::ECHO) {
        let is_eol = cell.ch == b'\n' || cell.eot;
        if is_eol && termios.lflags.contains(LFlags::ICANON | LFlags::ECHONL) {
            sink.emit(b"\n");
        }
        cell.len = 0;
        return cell;
    }

    let ch = cell.ch;
    let tab_mask = tab_size - 1;
    if ch == b'\t' && !cell.escaped && !cell.eot {
        let mut len = 0u8;
        loop {
            sink.emit(b" ");
            *column += 1;
            len += 1;
            if len as usize >= tab_size || (*column & tab_mask) == 0 {
                break;
            }
        }
        cell.len = len;
    } else if (ch == b'\r' || ch == b'\n') && cell.eot {
        // A CR/LF that closes a line is echoed literally, not remapped.
        sink.emit(&[ch]);
        *column = 0;
        cell.len = 0;
    } else if ch < 0x20 {
        let rendered = [b'^', ch + b'@'];
        sink.emit(&rendered);
        *column += 2;
        cell.len = 2;
    } else if ch == 0x7f {
        sink.emit(b"^?");
        *column += 2;
        cell.len = 2;
    } else {
        // Everything else (0x20..0x7e, and 0x80..0xff for 8-bit chars) is
        // emitted verbatim at one column.
        sink.emit(&[ch]);
        *column += 1;
        cell.len = 1;
    }

    if cell.eof {
        // Visible as an empty token: undo whatever columns we just
        // advanced so the cursor is left where it was (spec.md §4.5).
        for _ in 0..cell.len {
            sink.emit(b"\x08");
        }
    }

    cell
}

/// Erase echo for a character popped by `back_over` (spec.md §4.4): emit
/// `len` copies of `\b \b`.
pub fn echo_erase(cell: Cell, sink: &mut impl EchoSink) {
    for _ in 0..cell.len {
        sink.emit(b"\x08 \x08");
    }
}

/// Echo the ERASE key itself, used when `ECHOE` is off (spec.md §4.3
/// VERASE step).
pub fn echo_erase_key(
    termios: &Termios,
    tab_size: usize,
    column: &mut usize,
    sink: &mut impl EchoSink,
) {
    let cell = Cell::plain(termios.cc(Cc::VERASE));
    tty_echo(cell, termios, tab_size, column, sink);
}

/// `reprint` (spec.md §4.4): emit `^R\r\n`, then re-echo each cell from
/// the most recent EOT forward, returning the updated cells (with `len`
/// refreshed) so the queue can record the new echo geometry.
pub fn reprint(
    cells: &[Cell],
    termios: &Termios,
    tab_size: usize,
    column: &mut usize,
    sink: &mut impl EchoSink,
) -> Vec<Cell> {
    sink.emit(b"^R\r\n");
    *column = 0;
    cells
        .iter()
        .map(|c| tty_echo(*c, termios, tab_size, column, sink))
        .collect()
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

    #[test]
    fn control_char_renders_as_caret_notation() {
        let termios = Termios::default();
        let mut column = 0;
        let mut sink = VecSink(Vec::new());
        let cell = tty_echo(Cell::plain(0x03), &termios, 8, &mut column, &mut sink);
        assert_eq!(sink.0, b"^C");
        assert_eq!(cell.len, 2);
    }

    #[test]
    fn printable_char_renders_verbatim() {
        let termios = Termios::default();
        let mut column = 0;
        let mut sink = VecSink(Vec::new());
        let cell = tty_echo(Cell::plain(b'h'), &termios, 8, &mut column, &mut sink);
        assert_eq!(sink.0, b"h");
        assert_eq!(cell.len, 1);
        assert_eq!(column, 1);
    }

    #[test]
    fn tab_expands_to_next_stop() {
        let termios = Termios::default();
        let mut column = 3;
        let mut sink = VecSink(Vec::new());
        tty_echo(Cell::plain(b'\t'), &termios, 8, &mut column, &mut sink);
        assert_eq!(sink.0, b"     ");
        assert_eq!(column, 8);
    }

    #[test]
    fn erase_emits_backspace_space_backspace() {
        let mut sink = VecSink(Vec::new());
        let cell = Cell {
            len: 1,
            ..Cell::plain(b'a')
        };
        echo_erase(cell, &mut sink);
        assert_eq!(sink.0, b"\x08 \x08");
    }

    #[test]
    fn del_renders_as_caret_question_mark() {
        let termios = Termios::default();
        let mut column = 0;
        let mut sink = VecSink(Vec::new());
        tty_echo(Cell::plain(0x7f), &termios, 8, &mut column, &mut sink);
        assert_eq!(sink.0, b"^?");
    }
}
