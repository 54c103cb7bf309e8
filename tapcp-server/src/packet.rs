//! TFTP wire format: the request, data, acknowledgement and error
//! datagrams exchanged with clients.

use std::{error::Error, fmt::Display};

use tapcp_vfs::{Mode, Op};

/// Maximum payload carried by one DATA packet. A shorter payload ends the
/// transfer.
pub const BLOCK_SIZE: usize = 512;

/// Largest datagram the engine sends or accepts: opcode, block number and
/// a full data block.
pub const MAX_DATAGRAM: usize = 4 + BLOCK_SIZE;

const OP_RRQ: u16 = 1;
const OP_WRQ: u16 = 2;
const OP_DATA: u16 = 3;
const OP_ACK: u16 = 4;
const OP_ERROR: u16 = 5;

/// Error codes sent to clients.
pub mod error_code {
    pub const NOT_DEFINED: u16 = 0;
    pub const FILE_NOT_FOUND: u16 = 1;
    pub const ACCESS_VIOLATION: u16 = 2;
    pub const ILLEGAL_OPERATION: u16 = 4;
}

/// One parsed datagram.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Packet<'a> {
    /// RRQ or WRQ, distinguished by `op`.
    Request {
        op: Op,
        filename: &'a str,
        mode: Mode,
    },
    Data {
        block: u16,
        payload: &'a [u8],
    },
    Ack {
        block: u16,
    },
    Error {
        code: u16,
        message: String,
    },
}

#[derive(Debug)]
pub enum PacketError {
    /// Datagram too short for its opcode's fixed fields.
    Truncated,
    UnknownOpcode(u16),
    /// Filename or mode string missing its terminator or not UTF-8.
    BadString,
    UnknownMode(String),
}

impl Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketError::Truncated => write!(f, "datagram truncated"),
            PacketError::UnknownOpcode(op) => write!(f, "unknown opcode {}", op),
            PacketError::BadString => write!(f, "malformed string field"),
            PacketError::UnknownMode(mode) => write!(f, "unsupported transfer mode {}", mode),
        }
    }
}

impl Error for PacketError {}

fn take_cstr(buf: &[u8]) -> Result<(&str, &[u8]), PacketError> {
    let nul = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(PacketError::BadString)?;
    let s = std::str::from_utf8(&buf[..nul]).map_err(|_| PacketError::BadString)?;
    Ok((s, &buf[nul + 1..]))
}

impl<'a> Packet<'a> {
    /// Parses one received datagram.
    pub fn parse(buf: &'a [u8]) -> Result<Packet<'a>, PacketError> {
        if buf.len() < 4 {
            return Err(PacketError::Truncated);
        }
        let opcode = u16::from_be_bytes([buf[0], buf[1]]);
        let rest = &buf[2..];
        match opcode {
            OP_RRQ | OP_WRQ => {
                let (filename, rest) = take_cstr(rest)?;
                // Anything after the mode terminator is an option list
                // (blksize and friends); none are negotiated here.
                let (mode, _options) = take_cstr(rest)?;
                let mode = if mode.eq_ignore_ascii_case("netascii") {
                    Mode::Netascii
                } else if mode.eq_ignore_ascii_case("octet") {
                    Mode::Octet
                } else {
                    return Err(PacketError::UnknownMode(mode.to_string()));
                };
                let op = if opcode == OP_RRQ { Op::Get } else { Op::Put };
                Ok(Packet::Request { op, filename, mode })
            }
            OP_DATA => Ok(Packet::Data {
                block: u16::from_be_bytes([rest[0], rest[1]]),
                payload: &rest[2..],
            }),
            OP_ACK => Ok(Packet::Ack {
                block: u16::from_be_bytes([rest[0], rest[1]]),
            }),
            OP_ERROR => {
                let code = u16::from_be_bytes([rest[0], rest[1]]);
                let text = &rest[2..];
                let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
                Ok(Packet::Error {
                    code,
                    message: String::from_utf8_lossy(&text[..end]).into_owned(),
                })
            }
            other => Err(PacketError::UnknownOpcode(other)),
        }
    }
}

/// Builds an RRQ or WRQ datagram. The engine itself only parses requests;
/// this is for clients and tests.
pub fn request(op: Op, filename: &str, mode: Mode) -> Vec<u8> {
    let opcode = match op {
        Op::Get => OP_RRQ,
        Op::Put => OP_WRQ,
    };
    let mode = match mode {
        Mode::Netascii => "netascii",
        Mode::Octet => "octet",
    };
    let mut pkt = Vec::with_capacity(4 + filename.len() + mode.len());
    pkt.extend_from_slice(&opcode.to_be_bytes());
    pkt.extend_from_slice(filename.as_bytes());
    pkt.push(0);
    pkt.extend_from_slice(mode.as_bytes());
    pkt.push(0);
    pkt
}

/// Builds a DATA datagram for `block`.
pub fn data(block: u16, payload: &[u8]) -> Vec<u8> {
    let mut pkt = Vec::with_capacity(4 + payload.len());
    pkt.extend_from_slice(&OP_DATA.to_be_bytes());
    pkt.extend_from_slice(&block.to_be_bytes());
    pkt.extend_from_slice(payload);
    pkt
}

/// Builds an ACK datagram for `block`.
pub fn ack(block: u16) -> Vec<u8> {
    let mut pkt = Vec::with_capacity(4);
    pkt.extend_from_slice(&OP_ACK.to_be_bytes());
    pkt.extend_from_slice(&block.to_be_bytes());
    pkt
}

/// Builds an ERROR datagram.
pub fn error(code: u16, message: &str) -> Vec<u8> {
    let mut pkt = Vec::with_capacity(5 + message.len());
    pkt.extend_from_slice(&OP_ERROR.to_be_bytes());
    pkt.extend_from_slice(&code.to_be_bytes());
    pkt.extend_from_slice(message.as_bytes());
    pkt.push(0);
    pkt
}
