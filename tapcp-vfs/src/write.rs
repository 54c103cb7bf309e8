//! Streaming consumers for PUT transfers.
//!
//! Incoming data is chunked at arbitrary packet boundaries, so both
//! consumers carry their progress (word accumulator, pending line) in the
//! transfer state and accept any fragmentation of the same payload.

use crate::error::ConsumeError;
use crate::hex;
use crate::target::Target;
use crate::transfer::{Codec, Transfer, LINE_BUF_CAPACITY};

impl Transfer {
    /// Feeds one packet's payload to the write codec.
    ///
    /// Returns the number of bytes consumed (always the whole payload) or
    /// the error that aborts the transfer. Words already stored stay
    /// stored; there is no rollback.
    pub fn consume(
        &mut self,
        target: &mut impl Target,
        data: &[u8],
    ) -> Result<usize, ConsumeError> {
        let Transfer {
            cursor,
            remaining,
            line,
            codec,
            ..
        } = self;
        match codec {
            Codec::PutFpgaOctet { acc, count } => {
                for &b in data {
                    if *remaining == 0 {
                        return Err(ConsumeError::BoundExceeded);
                    }
                    *acc = (*acc << 8) | u32::from(b);
                    *count = count.wrapping_add(1);
                    // A partial trailing word never reaches the hardware;
                    // only whole words are stored.
                    if *count & 3 == 0 {
                        target.write_fpga_word(*cursor, *acc);
                        *cursor = cursor.wrapping_add(4);
                    }
                    if *remaining > 0 {
                        *remaining -= 1;
                    }
                }
                Ok(data.len())
            }
            Codec::PutFpgaText { colon_seen } => {
                for &c in data {
                    if line.len() >= LINE_BUF_CAPACITY {
                        return Err(ConsumeError::LineOverflow);
                    }
                    // Leading whitespace never starts a line.
                    if line.is_empty() && c.is_ascii_whitespace() {
                        continue;
                    }
                    // Everything before the first colon is a label.
                    if c == b':' && !*colon_seen {
                        *colon_seen = true;
                        line.clear();
                        continue;
                    }
                    line.push(c);
                    if c == b'\n' {
                        parse_dump_line(target, cursor, remaining, line.bytes())?;
                        line.clear();
                        *colon_seen = false;
                    }
                }
                Ok(data.len())
            }
            _ => {
                debug_assert!(false, "consume called on a read transfer");
                Ok(0)
            }
        }
    }
}

/// Extracts 32-bit words from one buffered, LF-terminated hexdump line and
/// stores them. Runs of hex digits split into successive words of up to
/// eight digits, the last possibly shorter; the first byte that is neither
/// whitespace nor a hex digit ends the line.
fn parse_dump_line(
    target: &mut impl Target,
    cursor: &mut u32,
    remaining: &mut i64,
    line: &[u8],
) -> Result<(), ConsumeError> {
    let mut pos = 0;
    while line[pos] != b'\n' {
        if line[pos].is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if !line[pos].is_ascii_hexdigit() {
            break;
        }
        while line[pos].is_ascii_hexdigit() {
            if *remaining >= 0 && *remaining < 4 {
                return Err(ConsumeError::BoundExceeded);
            }
            let mut word = 0;
            pos += hex::parse_u32(&line[pos..], &mut word);
            target.write_fpga_word(*cursor, word);
            *cursor = cursor.wrapping_add(4);
            if *remaining > 0 {
                *remaining -= 4;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::error::ConsumeError;
    use crate::resolve::open;
    use crate::testutil::{read_all, TestTarget};
    use crate::transfer::{Mode, Op};

    #[test]
    fn text_write_spans_lines() {
        let mut target = TestTarget::counting(64);
        let mut t = open(&mut target, "/fpga.40", Mode::Netascii, Op::Put).unwrap();
        t.consume(&mut target, b"label: DEADBEEF CAFEBABE\nmore: 12345678\n")
            .unwrap();
        assert_eq!(target.fpga[16..19], [0xDEAD_BEEF, 0xCAFE_BABE, 0x1234_5678]);
    }

    #[test]
    fn equivalent_hexdump_spellings() {
        let lines: [&[u8]; 3] = [
            b"label: 00 11 22 33\n",
            b"00000000 00000011 00000022 00000033\n",
            b"00000000000000110000002233\n",
        ];
        for payload in lines {
            let mut target = TestTarget::counting(8);
            let mut t = open(&mut target, "/fpga.0", Mode::Netascii, Op::Put).unwrap();
            t.consume(&mut target, payload).unwrap();
            assert_eq!(target.fpga[..4], [0x00, 0x11, 0x22, 0x33]);
        }
    }

    #[test]
    fn fragmentation_does_not_change_memory() {
        let payload = b"label: DEADBEEF CAFEBABE 00C0FFEE 01020304\nfeed: 55AA55AA\n";
        let mut reference = TestTarget::counting(16);
        let mut t = open(&mut reference, "/fpga.0", Mode::Netascii, Op::Put).unwrap();
        t.consume(&mut reference, payload).unwrap();

        for split in 1..payload.len() {
            let mut target = TestTarget::counting(16);
            let mut t = open(&mut target, "/fpga.0", Mode::Netascii, Op::Put).unwrap();
            t.consume(&mut target, &payload[..split]).unwrap();
            t.consume(&mut target, &payload[split..]).unwrap();
            assert_eq!(target.fpga, reference.fpga, "split at {}", split);
        }
    }

    #[test]
    fn octet_write_round_trips() {
        let mut target = TestTarget::counting(8);
        let payload = [0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04];
        let mut t = open(&mut target, "/fpga.8", Mode::Octet, Op::Put).unwrap();
        t.consume(&mut target, &payload).unwrap();

        let mut back = open(&mut target, "/fpga.8.8", Mode::Octet, Op::Get).unwrap();
        assert_eq!(read_all(&mut back, &mut target, 512), payload);
    }

    #[test]
    fn octet_write_drops_partial_trailing_word() {
        let mut target = TestTarget::counting(8);
        let mut t = open(&mut target, "/fpga.0", Mode::Octet, Op::Put).unwrap();
        t.consume(&mut target, &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x11])
            .unwrap();
        assert_eq!(target.fpga[0], 0xAABB_CCDD);
        // The three leftover bytes never reach word 1.
        assert_eq!(target.fpga[1], 0x0405_0607);
    }

    #[test]
    fn octet_write_respects_bound() {
        let mut target = TestTarget::counting(2);
        let mut t = open(&mut target, "/fpga.4", Mode::Octet, Op::Put).unwrap();
        let err = t.consume(&mut target, &[0u8; 8]).unwrap_err();
        assert_eq!(err, ConsumeError::BoundExceeded);
    }

    #[test]
    fn text_write_respects_bound() {
        let mut target = TestTarget::counting(2);
        let mut t = open(&mut target, "/fpga.0", Mode::Netascii, Op::Put).unwrap();
        let err = t
            .consume(&mut target, b": 11111111 22222222 33333333\n")
            .unwrap_err();
        assert_eq!(err, ConsumeError::BoundExceeded);
        // The in-bounds words were stored before the overflow.
        assert_eq!(target.fpga, [0x1111_1111, 0x2222_2222]);
    }

    #[test]
    fn overlong_line_is_fatal() {
        let mut target = TestTarget::counting(512);
        let mut t = open(&mut target, "/fpga.0", Mode::Netascii, Op::Put).unwrap();
        let err = t.consume(&mut target, &[b'0'; 400]).unwrap_err();
        assert_eq!(err, ConsumeError::LineOverflow);
    }

    #[test]
    fn comment_after_words_is_data_hazard() {
        // 'c' of a trailing comment is a hex digit and becomes a fifth word.
        let mut target = TestTarget::counting(8);
        let mut t = open(&mut target, "/fpga.0", Mode::Netascii, Op::Put).unwrap();
        t.consume(&mut target, b": 00000001 cabbage\n").unwrap();
        assert_eq!(target.fpga[0], 1);
        assert_eq!(target.fpga[1], 0xCABBA);
    }

    #[test]
    fn hexdump_read_parses_back_identically() {
        let mut source = TestTarget::counting(16);
        let mut t = open(&mut source, "/fpga.0.40", Mode::Netascii, Op::Get).unwrap();
        let dump = read_all(&mut t, &mut source, 512);

        let mut sink = TestTarget::counting(16);
        for w in sink.fpga.iter_mut() {
            *w = 0;
        }
        let mut put = open(&mut sink, "/fpga.0", Mode::Netascii, Op::Put).unwrap();
        put.consume(&mut sink, &dump).unwrap();
        assert_eq!(sink.fpga, source.fpga);

        let mut again = open(&mut sink, "/fpga.0.40", Mode::Netascii, Op::Get).unwrap();
        assert_eq!(read_all(&mut again, &mut sink, 512), dump);
    }
}
