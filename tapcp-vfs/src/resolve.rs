//! Filename resolution: translates a requested path into an open transfer.
//!
//! The engine determines mode and direction from the request packet; this
//! module parses the name, consults the catalog, enforces permissions and
//! bounds, seeds the cursor and binds the matching codec. A rejected open
//! touches no hardware.

use crate::catalog::Catalog;
use crate::error::OpenError;
use crate::hex;
use crate::read::HELP_TEXT;
use crate::target::Target;
use crate::transfer::{Codec, Mode, Op, Transfer};

/// Which raw memory window a `/fpga` or `/cpu` request addresses.
#[derive(Copy, Clone, Eq, PartialEq)]
enum Space {
    Fpga,
    Cpu,
}

/// Resolves `filename` and prepares the transfer for it.
///
/// Names without a leading slash are device names relative to `/dev`:
/// `sys_scratchpad` and `/dev/sys_scratchpad` are the same request.
pub fn open(
    target: &mut impl Target,
    filename: &str,
    mode: Mode,
    op: Op,
) -> Result<Transfer, OpenError> {
    match filename {
        "/help" => open_help(op),
        "/listdev" => open_listdev(target, mode, op),
        "/temp" => open_temp(target, mode, op),
        _ => {
            if let Some(rest) = filename.strip_prefix("/fpga.") {
                open_mem(target, Space::Fpga, rest, mode, op)
            } else if let Some(rest) = filename.strip_prefix("/cpu.") {
                open_mem(target, Space::Cpu, rest, mode, op)
            } else if let Some(rest) = filename.strip_prefix("/dev/") {
                open_dev(target, rest, mode, op)
            } else if filename.starts_with('/') {
                Err(OpenError::UnknownPath(filename.to_string()))
            } else {
                open_dev(target, filename, mode, op)
            }
        }
    }
}

// The banner is the same in both modes.
fn open_help(op: Op) -> Result<Transfer, OpenError> {
    if op == Op::Put {
        return Err(OpenError::ReadOnly("/help".to_string()));
    }
    let mut t = Transfer::new(op, Codec::Help);
    t.remaining = HELP_TEXT.len() as i64;
    Ok(t)
}

fn open_listdev(target: &mut impl Target, mode: Mode, op: Op) -> Result<Transfer, OpenError> {
    if op == Op::Put {
        return Err(OpenError::ReadOnly("/listdev".to_string()));
    }
    let catalog = Catalog::new(target.catalog()).ok_or(OpenError::BadCatalog)?;
    Ok(match mode {
        Mode::Octet => {
            // Raw form ships the length prefix too.
            let mut t = Transfer::new(op, Codec::ListdevOctet);
            t.remaining = (catalog.entries_len() + 2) as i64;
            t
        }
        Mode::Netascii => Transfer::new(op, Codec::ListdevText),
    })
}

fn open_temp(target: &mut impl Target, mode: Mode, op: Op) -> Result<Transfer, OpenError> {
    if op == Op::Put {
        return Err(OpenError::ReadOnly("/temp".to_string()));
    }
    let temp = target.fpga_temp().ok_or(OpenError::NoTempSensor)?;
    let mut t = Transfer::new(op, Codec::Temp);
    let buf = t.line.clear();
    match mode {
        Mode::Octet => buf.extend_from_slice(&temp.to_be_bytes()),
        Mode::Netascii => {
            // Truncated to tenths of a degree.
            let deci = (temp * 10.0) as u32;
            buf.extend_from_slice(format!("{}.{}\n", deci / 10, deci % 10).as_bytes());
        }
    }
    Ok(t)
}

fn open_dev(
    target: &mut impl Target,
    request: &str,
    mode: Mode,
    op: Op,
) -> Result<Transfer, OpenError> {
    let (name, ext) = match request.find('.') {
        Some(i) => (&request[..i], &request[i + 1..]),
        None => (request, ""),
    };
    let catalog = Catalog::new(target.catalog()).ok_or(OpenError::BadCatalog)?;
    let dev = catalog
        .lookup(name)
        .ok_or_else(|| OpenError::UnknownDevice(name.to_string()))?;
    if op == Op::Put && dev.read_only() {
        return Err(OpenError::ReadOnly(name.to_string()));
    }

    // Device extents are in words.
    let (off, len) = parse_extent(ext, op, 0);
    let word_len = dev.word_len();
    let len = if len == 0 {
        // Zero or absent length means everything from the offset on. This
        // is also the write bound: writes may not grow a device.
        match word_len.checked_sub(off) {
            None => {
                return Err(OpenError::OutOfBounds {
                    offset: off,
                    length: 0,
                    size: word_len,
                })
            }
            Some(0) => return Err(OpenError::EmptyRange),
            Some(rest) => rest,
        }
    } else {
        len
    };
    if op == Op::Get && u64::from(off) + u64::from(len) > u64::from(word_len) {
        return Err(OpenError::OutOfBounds {
            offset: off,
            length: len,
            size: word_len,
        });
    }

    let mut t = Transfer::new(op, fpga_codec(op, mode));
    t.cursor = dev.addr().wrapping_add(off << 2);
    t.remaining = i64::from(len) << 2;
    Ok(t)
}

fn open_mem(
    target: &mut impl Target,
    space: Space,
    request: &str,
    mode: Mode,
    op: Op,
) -> Result<Transfer, OpenError> {
    if space == Space::Cpu && op == Op::Put {
        return Err(OpenError::ReadOnly("/cpu".to_string()));
    }
    if request.is_empty() {
        return Err(OpenError::MissingOffset);
    }

    // Raw memory extents are in bytes; round to whole words.
    let (off, len) = parse_extent(request, op, 1);
    let off = off & !3;
    let len = len.wrapping_add(3) & !3;
    let size = target.fpga_size();

    if op == Op::Get {
        if len == 0 {
            return Err(OpenError::EmptyRange);
        }
        // CPU reads may wrap; only the FPGA window is bounds checked.
        if space == Space::Fpga && u64::from(off) + u64::from(len) > u64::from(size) {
            return Err(OpenError::OutOfBounds {
                offset: off,
                length: len,
                size,
            });
        }
    }

    let codec = match space {
        Space::Fpga => fpga_codec(op, mode),
        // CPU writes were rejected above, so this is always a read.
        Space::Cpu => match mode {
            Mode::Octet => Codec::CpuBytesOctet,
            Mode::Netascii => Codec::CpuBytesText { label: 0 },
        },
    };
    let mut t = Transfer::new(op, codec);
    t.cursor = off;
    t.remaining = match op {
        Op::Get => i64::from(len),
        // The write bound is whatever is left of the window.
        Op::Put => match size.checked_sub(off) {
            Some(bound) => i64::from(bound),
            None => {
                return Err(OpenError::OutOfBounds {
                    offset: off,
                    length: 0,
                    size,
                })
            }
        },
    };
    Ok(t)
}

fn fpga_codec(op: Op, mode: Mode) -> Codec {
    match (op, mode) {
        (Op::Get, Mode::Octet) => Codec::FpgaWordsOctet { word: 0 },
        (Op::Get, Mode::Netascii) => Codec::FpgaWordsText { label: 0 },
        (Op::Put, Mode::Octet) => Codec::PutFpgaOctet { acc: 0, count: 0 },
        (Op::Put, Mode::Netascii) => Codec::PutFpgaText { colon_seen: false },
    }
}

/// Parses the dotted `OFF[.LEN]` extension. `LEN` is only honored on
/// reads; written length is governed by the client's data. Digits stop at
/// the first non-hex character, and an absent field keeps its default.
fn parse_extent(ext: &str, op: Op, default_len: u32) -> (u32, u32) {
    let mut off = 0;
    let mut len = default_len;
    let bytes = ext.as_bytes();
    if !bytes.is_empty() {
        let used = hex::parse_u32(bytes, &mut off);
        if op == Op::Get && used < bytes.len() {
            hex::parse_u32(&bytes[used + 1..], &mut len);
        }
    }
    (off, len)
}
