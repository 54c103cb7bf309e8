//! # TAPCP Server Engine
//!
//! A lock-step TFTP engine (UDP, 512-byte blocks, stop-and-wait
//! retransmission) that serves the [`tapcp_vfs`] virtual filesystem of a
//! hardware [`Target`](tapcp_vfs::Target).
//!
//! ## How It Works
//!
//! 1. A backend (memory-mapped window, simulator, ...) implements the
//!    [`tapcp_vfs::Target`] trait
//! 2. The backend is wrapped in a [`server::Server`] bound to a UDP port
//! 3. Each read or write request is resolved by [`tapcp_vfs::open`]; a
//!    rejected open answers the client with a protocol error packet
//! 4. Accepted transfers run block by block on their own ephemeral socket,
//!    the engine calling the transfer's `produce`/`consume` chunk hooks
//!
//! ## Basic Usage
//!
//! ```ignore
//! use tapcp_server::server::Builder;
//!
//! let mut server = Builder::new().bind(my_target, "0.0.0.0:69")?;
//! server.serve()?;
//! ```
//!
//! ## Protocol Notes
//!
//! Requests use the classic packet layout: RRQ/WRQ with a filename and a
//! mode string (`netascii` or `octet`, case-insensitive), DATA/ACK in
//! lock-step, ERROR to abort. Option lists appended to a request are
//! accepted and ignored; the block size is fixed at 512. Netascii data is
//! passed through untouched — the filesystem's text framing is LF-only by
//! definition, and CR/LF rewriting would corrupt hexdump round-trips.
//!
//! ## Thread Model
//!
//! One transfer runs at a time on the caller's thread. That serializes
//! all hardware access, which the codecs rely on.
//!
//! ## Logging
//!
//! This crate uses the `log` facade. Wire an implementation such as
//! `env_logger` in the binary to see request, retransmission and error
//! diagnostics.

pub mod packet;
pub mod server;
