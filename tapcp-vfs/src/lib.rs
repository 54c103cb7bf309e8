//! # TAPCP Virtual Filesystem
//!
//! This crate is the core of a TAPCP server: it maps a gateware target's
//! internal resources — device registers, raw FPGA address space, CPU
//! address space, the device catalog and a help banner — into a virtual
//! filesystem served over a TFTP-style protocol (two operations, GET and
//! PUT; two modes, netascii and octet).
//!
//! ## Overview
//!
//! The client names a resource; the server translates the name into memory
//! accesses. The filename grammar is:
//!
//! ```text
//! /help                              fixed command summary (read-only)
//! /listdev                           device table (text) or raw catalog (octet)
//! /temp                              FPGA temperature, when a sensor exists
//! /dev/NAME[.OFFSET[.NWORDS]]        named device memory, extents in words
//! NAME[.OFFSET[.NWORDS]]             same, /dev/ implied
//! /fpga.OFFSET[.NBYTES]              raw FPGA space, extents in bytes
//! /cpu.OFFSET[.NBYTES]               raw CPU space (read-only)
//! ```
//!
//! Offsets and lengths are hexadecimal. Octet transfers carry words in
//! network byte order. Netascii reads produce a hexdump — an eight-digit
//! label, a colon and sixteen bytes per line — and netascii writes accept
//! the same hexdump back, or any line of whitespace-separated hex digit
//! runs. Labels before the first colon of a line are discarded.
//!
//! ## Driving a transfer
//!
//! An external engine owns the protocol (blocks, retransmission,
//! timeouts). It calls [`open`] once per request, then repeatedly calls
//! [`Transfer::produce`] (GET) or [`Transfer::consume`] (PUT). Every
//! producer fills its output buffer completely until the final short
//! chunk; consumers accept any fragmentation of the payload. All progress
//! is held in the [`Transfer`], never on the stack.
//!
//! ```
//! use tapcp_vfs::{open, CatalogBuilder, Mode, Op, Target};
//!
//! struct Bench {
//!     regs: Vec<u32>,
//!     catalog: Vec<u8>,
//! }
//!
//! impl Target for Bench {
//!     fn fpga_size(&self) -> u32 {
//!         (self.regs.len() * 4) as u32
//!     }
//!     fn read_fpga_word(&mut self, addr: u32) -> u32 {
//!         self.regs[(addr / 4) as usize]
//!     }
//!     fn write_fpga_word(&mut self, addr: u32, word: u32) {
//!         self.regs[(addr / 4) as usize] = word;
//!     }
//!     fn read_cpu_byte(&mut self, _addr: u32) -> u8 {
//!         0
//!     }
//!     fn catalog(&self) -> &[u8] {
//!         &self.catalog
//!     }
//! }
//!
//! let mut bench = Bench {
//!     regs: vec![0xDEADBEEF; 4],
//!     catalog: CatalogBuilder::new()
//!         .push("sys_scratchpad", 0, 16, 3, false)
//!         .finish(),
//! };
//!
//! let mut transfer = open(&mut bench, "sys_scratchpad.0.1", Mode::Netascii, Op::Get)
//!     .expect("scratchpad is in the catalog");
//! let mut block = [0u8; 512];
//! let n = transfer.produce(&mut bench, &mut block);
//! assert_eq!(&block[..n], b"00000000: DEADBEEF\n");
//! ```
//!
//! ## Concurrency
//!
//! The core is single-threaded and never blocks: each call runs to
//! completion and returns. The engine must serialize the callbacks of one
//! transfer; transfers to overlapping regions are not arbitrated.

pub mod catalog;
pub mod error;
pub mod hex;
pub mod read;
pub mod resolve;
pub mod target;
pub mod transfer;
mod write;

pub use catalog::{Catalog, CatalogBuilder, DeviceInfo};
pub use error::{ConsumeError, OpenError};
pub use read::HELP_TEXT;
pub use resolve::open;
pub use target::Target;
pub use transfer::{Mode, Op, Transfer};
