//! Streaming producers for GET transfers.
//!
//! Every producer fills the output buffer completely unless the transfer
//! is over; a short return is the end-of-transfer signal. Output never
//! aligns with packet boundaries, so each producer resumes mid-line and
//! mid-word from the transfer state alone.

use crate::catalog::Catalog;
use crate::hex;
use crate::target::Target;
use crate::transfer::{Codec, LineBuf, Transfer};

/// Banner returned by `/help`.
pub const HELP_TEXT: &str = "Available TAPCP commands:\n\
  /help    - this message\n\
  /listdev - list FPGA device info\n\
  /temp    - get FPGA temperature\n\
  [/dev/]DEVNAME[.OFFSET[.LENGTH]] - access DEVNAME\n\
  /fpga.OFFSET[.LENGTH] - access FPGA memory space\n\
  /cpu.OFFSET[.LENGTH]  - access CPU memory space\n";

impl Transfer {
    /// Fills `out` with the next chunk of the transfer.
    ///
    /// Returns the number of bytes produced. Anything short of `out.len()`
    /// ends the transfer; the engine must not call again.
    pub fn produce(&mut self, target: &mut impl Target, out: &mut [u8]) -> usize {
        let Transfer {
            cursor,
            remaining,
            line,
            codec,
            ..
        } = self;
        match codec {
            Codec::Help => copy_span(HELP_TEXT.as_bytes(), cursor, remaining, out),
            Codec::Temp => line.drain(out),
            Codec::ListdevText => listdev_text(target, cursor, line, out),
            Codec::ListdevOctet => copy_span(target.catalog(), cursor, remaining, out),
            Codec::CpuBytesOctet => {
                let mut len = 0;
                while len < out.len() && *remaining > 0 {
                    out[len] = target.read_cpu_byte(*cursor);
                    *cursor = cursor.wrapping_add(1);
                    *remaining -= 1;
                    len += 1;
                }
                len
            }
            Codec::CpuBytesText { label } => {
                let mut len = 0;
                while len < out.len() {
                    if line.is_drained() {
                        if *remaining == 0 {
                            break;
                        }
                        let buf = line.clear();
                        hex::push_u32(buf, *label, true);
                        *label = label.wrapping_add(16);
                        buf.push(b':');
                        buf.push(b' ');
                        for i in 0..16 {
                            if i != 0 && i & 3 == 0 {
                                buf.push(b' ');
                            }
                            hex::push_u8(buf, target.read_cpu_byte(*cursor), hex::ZEROS_BOTH);
                            *cursor = cursor.wrapping_add(1);
                            *remaining -= 1;
                            if *remaining == 0 {
                                break;
                            }
                        }
                        buf.push(b'\n');
                    }
                    len += line.drain(&mut out[len..]);
                }
                len
            }
            Codec::FpgaWordsOctet { word } => {
                let mut len = 0;
                while len < out.len() && *remaining > 0 {
                    *remaining -= 1;
                    match *remaining & 3 {
                        // Word boundary: perform the load for the next four
                        // output bytes.
                        3 => {
                            *word = target.read_fpga_word(*cursor);
                            *cursor = cursor.wrapping_add(4);
                            out[len] = (*word >> 24) as u8;
                        }
                        2 => out[len] = (*word >> 16) as u8,
                        1 => out[len] = (*word >> 8) as u8,
                        _ => out[len] = *word as u8,
                    }
                    len += 1;
                }
                len
            }
            Codec::FpgaWordsText { label } => {
                let mut len = 0;
                while len < out.len() {
                    if line.is_drained() {
                        if *remaining == 0 {
                            break;
                        }
                        let buf = line.clear();
                        hex::push_u32(buf, *label, true);
                        *label = label.wrapping_add(16);
                        buf.push(b':');
                        buf.push(b' ');
                        for i in 0..4 {
                            if i > 0 {
                                buf.push(b' ');
                            }
                            let word = target.read_fpga_word(*cursor);
                            *cursor = cursor.wrapping_add(4);
                            *remaining -= 4;
                            hex::push_u32(buf, word, true);
                            if *remaining == 0 {
                                break;
                            }
                        }
                        buf.push(b'\n');
                    }
                    len += line.drain(&mut out[len..]);
                }
                len
            }
            Codec::PutFpgaOctet { .. } | Codec::PutFpgaText { .. } => {
                debug_assert!(false, "produce called on a write transfer");
                0
            }
        }
    }
}

/// Copies from a fixed byte span, advancing `cursor` through it.
fn copy_span(src: &[u8], cursor: &mut u32, remaining: &mut i64, out: &mut [u8]) -> usize {
    let start = (*cursor as usize).min(src.len());
    let n = (out.len() as i64)
        .min(*remaining)
        .max(0)
        .min((src.len() - start) as i64) as usize;
    out[..n].copy_from_slice(&src[start..start + n]);
    *cursor += n as u32;
    *remaining -= n as i64;
    n
}

/// One listing line per catalog entry:
/// `NAME<TAB>MODE<TAB>OFFSET<TAB>LENGTH<TAB>TYPE<LF>`, with MODE `1` for
/// read-only entries and `3` otherwise, and hex fields at minimal width.
fn listdev_text(
    target: &mut impl Target,
    cursor: &mut u32,
    line: &mut LineBuf,
    out: &mut [u8],
) -> usize {
    let mut len = 0;
    while len < out.len() {
        if line.is_drained() {
            let Some(catalog) = Catalog::new(target.catalog()) else {
                return len;
            };
            let mut entries = catalog.entries_at(*cursor as usize);
            let Some((name, info)) = entries.next() else {
                return len;
            };
            *cursor = entries.pos() as u32;
            let buf = line.clear();
            buf.extend_from_slice(name.as_bytes());
            buf.push(b'\t');
            buf.push(if info.read_only() { b'1' } else { b'3' });
            buf.push(b'\t');
            hex::push_u32(buf, info.addr(), false);
            buf.push(b'\t');
            hex::push_u32(buf, info.length, false);
            buf.push(b'\t');
            hex::push_u32(buf, u32::from(info.type_code), false);
            buf.push(b'\n');
        }
        len += line.drain(&mut out[len..]);
    }
    len
}

#[cfg(test)]
mod test {
    use crate::resolve::open;
    use crate::testutil::{read_all, TestTarget};
    use crate::transfer::{Mode, Op};

    #[test]
    fn help_returns_banner_verbatim() {
        let mut target = TestTarget::default();
        let mut t = open(&mut target, "/help", Mode::Netascii, Op::Get).unwrap();
        let out = read_all(&mut t, &mut target, 512);
        assert_eq!(out, super::HELP_TEXT.as_bytes());
    }

    #[test]
    fn listdev_text_formats_table() {
        let mut target = TestTarget::default();
        target.catalog = crate::CatalogBuilder::new()
            .push("A", 0x100, 0x20, 5, false)
            .push("B", 0x200, 0x10, 6, true)
            .finish();
        let mut t = open(&mut target, "/listdev", Mode::Netascii, Op::Get).unwrap();
        let out = read_all(&mut t, &mut target, 512);
        assert_eq!(out, b"A\t3\t100\t20\t5\nB\t1\t200\t10\t6\n");
    }

    #[test]
    fn listdev_octet_returns_raw_blob() {
        let mut target = TestTarget::default();
        let mut t = open(&mut target, "/listdev", Mode::Octet, Op::Get).unwrap();
        let out = read_all(&mut t, &mut target, 512);
        assert_eq!(out, target.catalog);
    }

    #[test]
    fn fpga_text_dump_single_line() {
        let mut target = TestTarget::counting(8);
        let mut t = open(&mut target, "/fpga.0.10", Mode::Netascii, Op::Get).unwrap();
        let out = read_all(&mut t, &mut target, 512);
        assert_eq!(out, b"00000000: 00010203 04050607 08090A0B 0C0D0E0F\n");
    }

    #[test]
    fn fpga_text_dump_partial_line_has_no_trailing_space() {
        let mut target = TestTarget::counting(8);
        let mut t = open(&mut target, "/fpga.0.18", Mode::Netascii, Op::Get).unwrap();
        let out = read_all(&mut t, &mut target, 512);
        assert_eq!(
            out,
            b"00000000: 00010203 04050607 08090A0B 0C0D0E0F\n\
              00000010: 10111213 14151617\n"
                .as_slice()
        );
    }

    #[test]
    fn fpga_octet_streams_words_msb_first() {
        let mut target = TestTarget::counting(8);
        let mut t = open(&mut target, "/fpga.0.10", Mode::Octet, Op::Get).unwrap();
        let out = read_all(&mut t, &mut target, 512);
        let expected: Vec<u8> = (0u8..0x10).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn first_label_is_zero_regardless_of_offset() {
        let mut target = TestTarget::counting(32);
        let mut t = open(&mut target, "/fpga.40.10", Mode::Netascii, Op::Get).unwrap();
        let out = read_all(&mut t, &mut target, 512);
        assert!(out.starts_with(b"00000000: 40414243"));
    }

    #[test]
    fn chunk_schedule_does_not_change_output() {
        let mut target = TestTarget::counting(64);
        for path in ["/fpga.0.fc", "/cpu.0.33", "/listdev", "/help"] {
            let mut whole = open(&mut target, path, Mode::Netascii, Op::Get).unwrap();
            let expected = read_all(&mut whole, &mut target, 512);
            for chunk in [1, 7, 16] {
                let mut t = open(&mut target, path, Mode::Netascii, Op::Get).unwrap();
                assert_eq!(read_all(&mut t, &mut target, chunk), expected, "{}", path);
            }
        }
    }

    #[test]
    fn cpu_text_dump_groups_bytes() {
        let mut target = TestTarget::default();
        target.cpu = (0u8..0x20).collect();
        let mut t = open(&mut target, "/cpu.0.14", Mode::Netascii, Op::Get).unwrap();
        let out = read_all(&mut t, &mut target, 512);
        assert_eq!(
            out,
            b"00000000: 00010203 04050607 08090A0B 0C0D0E0F\n\
              00000010: 10111213\n"
                .as_slice()
        );
    }

    #[test]
    fn cpu_octet_reads_bytes() {
        let mut target = TestTarget::default();
        target.cpu = (0u8..0x20).collect();
        let mut t = open(&mut target, "/cpu.4.8", Mode::Octet, Op::Get).unwrap();
        let out = read_all(&mut t, &mut target, 512);
        assert_eq!(out, (4u8..12).collect::<Vec<u8>>());
    }

    #[test]
    fn temp_text_renders_tenths() {
        let mut target = TestTarget::default();
        target.temp = Some(41.57);
        let mut t = open(&mut target, "/temp", Mode::Netascii, Op::Get).unwrap();
        assert_eq!(read_all(&mut t, &mut target, 512), b"41.5\n");
    }

    #[test]
    fn temp_octet_is_big_endian_float() {
        let mut target = TestTarget::default();
        target.temp = Some(38.25);
        let mut t = open(&mut target, "/temp", Mode::Octet, Op::Get).unwrap();
        assert_eq!(read_all(&mut t, &mut target, 512), 38.25f32.to_be_bytes());
    }

    #[test]
    fn text_read_matches_octet_read_wordwise() {
        let mut target = TestTarget::counting(16);
        let mut bin = open(&mut target, "/fpga.0.40", Mode::Octet, Op::Get).unwrap();
        let bytes = read_all(&mut bin, &mut target, 512);
        let mut txt = open(&mut target, "/fpga.0.40", Mode::Netascii, Op::Get).unwrap();
        let dump = String::from_utf8(read_all(&mut txt, &mut target, 512)).unwrap();

        let from_text: Vec<u32> = dump
            .lines()
            .flat_map(|l| l.split(": ").nth(1).unwrap().split(' '))
            .map(|w| u32::from_str_radix(w, 16).unwrap())
            .collect();
        let from_bin: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(from_text, from_bin);
    }
}
