// SPDX-License-Identifier: MPL-2.0

//! Output processor (`out_process`, spec.md §4.6): a column-tracking pass
//! over a caller-provided circular buffer performing CR/LF mapping and tab
//! expansion.
//!
//! The teacher's `LineDiscipline::write` is an unimplemented `todo!()`
//! (`device/tty/line_discipline.rs`); this is a from-spec implementation,
//! following the same buffer-rewriting shape MINIX's `out_process` uses
//! (spec's own grounding source, `drivers/tty/tty.c`).

use super::termios::{OFlags, Termios};

/// Result of one `out_process` call: how many input/output units were
/// consumed, mirroring spec.md's `*icount`/`*ocount` out-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessResult {
    pub consumed_in: usize,
    pub consumed_out: usize,
}

/// Process `buf[..ict]` in place, writing processed output into the same
/// buffer at increasing offsets up to `oct` slots, updating `column`
/// (mod `tab_size`). Stops early ("buffer shape changed") when an LF needs
/// to expand to CR+LF and fewer than 2 output slots remain, or when a tab
/// needs more slots than remain.
///
/// `buf` must have room for up to one extra byte of expansion at the
/// current write position; callers pass a scratch `Vec` sized generously
/// (the teacher's raw pointer/`bstart..bend` scheme becomes a `Vec` output
/// parameter in this std crate).
pub fn out_process(
    buf: &[u8],
    ict: usize,
    oct: usize,
    termios: &Termios,
    tab_size: usize,
    column: &mut usize,
) -> (Vec<u8>, ProcessResult) {
    let mut out = Vec::with_capacity(oct.min(ict + 8));
    let mut consumed_in = 0;
    let mut consumed_out = 0;
    let tab_mask = tab_size - 1;

    let mut i = 0;
    while i < ict {
        if consumed_out >= oct {
            break;
        }
        let ch = buf[i];
        match ch {
            0x07 => {
                // BEL: no column change.
                out.push(ch);
                consumed_out += 1;
            }
            0x08 => {
                out.push(ch);
                consumed_out += 1;
                *column = column.saturating_sub(1);
            }
            b'\r' => {
                out.push(ch);
                consumed_out += 1;
                *column = 0;
            }
            b'\n' => {
                if termios.oflags.contains(OFlags::OPOST | OFlags::ONLCR) {
                    if oct - consumed_out < 2 {
                        break;
                    }
                    out.push(b'\r');
                    out.push(b'\n');
                    consumed_out += 2;
                    *column = 0;
                } else {
                    out.push(ch);
                    consumed_out += 1;
                }
                i += 1;
                consumed_in += 1;
                // Buffer shape changed (a 1-in/2-out rewrite): stop here,
                // matching spec.md §4.6's "consume 1 input, 2 output, and
                // stop".
                break;
            }
            b'\t' => {
                let tablen = tab_size - (*column & tab_mask);
                if termios.oflags.contains(OFlags::OPOST | OFlags::XTABS) {
                    if oct - consumed_out < tablen {
                        break;
                    }
                    for _ in 0..tablen {
                        out.push(b' ');
                    }
                    consumed_out += tablen;
                } else {
                    out.push(ch);
                    consumed_out += 1;
                }
                *column += tablen;
            }
            _ => {
                out.push(ch);
                consumed_out += 1;
                *column += 1;
            }
        }
        i += 1;
        consumed_in += 1;
    }

    (
        out,
        ProcessResult {
            consumed_in,
            consumed_out,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onlcr_maps_lf_to_cr_lf_with_room() {
        let termios = Termios::default();
        let mut column = 0;
        let (out, res) = out_process(b"A\nB", 3, 4, &termios, 8, &mut column);
        assert_eq!(out, b"A\r\n");
        assert_eq!(res.consumed_in, 2);
        assert_eq!(res.consumed_out, 3);
    }

    #[test]
    fn stops_before_lf_expansion_without_room() {
        let termios = Termios::default();
        let mut column = 0;
        // Only 2 output slots; after "A" consumes 1, only 1 remains for
        // the 2-slot LF rewrite, so it must stop.
        let (out, res) = out_process(b"A\nB", 3, 2, &termios, 8, &mut column);
        assert_eq!(out, b"A");
        assert_eq!(res.consumed_in, 1);
        assert_eq!(res.consumed_out, 1);
    }

    #[test]
    fn bare_cr_resets_column_without_consuming_extra_output() {
        let termios = Termios::default();
        let mut column = 5;
        let (out, res) = out_process(b"\r", 1, 4, &termios, 8, &mut column);
        assert_eq!(out, b"\r");
        assert_eq!(column, 0);
        assert_eq!(res.consumed_out, 1);
    }

    #[test]
    fn tab_expands_to_spaces() {
        let termios = Termios::default();
        let mut column = 0;
        let (out, _res) = out_process(b"\t", 1, 8, &termios, 8, &mut column);
        assert_eq!(out, b"        ");
        assert_eq!(column, 8);
    }

    #[test]
    fn plain_lf_passthrough_without_onlcr_leaves_column_untouched() {
        let mut termios = Termios::default();
        termios.oflags.remove(OFlags::ONLCR);
        let mut column = 3;
        let (out, res) = out_process(b"\n", 1, 4, &termios, 8, &mut column);
        assert_eq!(out, b"\n");
        assert_eq!(res.consumed_in, 1);
        assert_eq!(res.consumed_out, 1);
        assert_eq!(column, 3);
    }
}
