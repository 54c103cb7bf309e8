//! Per-transfer state threaded through every chunk callback.

/// Transfer mode from the request packet.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
    /// Text framing: hexdumps and tables.
    Netascii,
    /// Raw bytes in network byte order.
    Octet,
}

/// Transfer direction from the request packet.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Op {
    Get,
    Put,
}

/// Capacity of the per-transfer line buffer. Sized for the widest listing
/// line: a 255-byte device name, three tabs, the mode digit, two hex fields
/// of up to eight digits, a two-digit type code and the newline. Text-mode
/// writes use the same buffer, so this is also the longest accepted input
/// line.
pub const LINE_BUF_CAPACITY: usize = 288;

/// One formatted output line being drained, or one input line being
/// accumulated. Lines never outlive a transfer, so the buffer lives here
/// rather than in shared storage.
#[derive(Debug)]
pub(crate) struct LineBuf {
    buf: Vec<u8>,
    pos: usize,
}

impl LineBuf {
    fn new() -> LineBuf {
        LineBuf {
            buf: Vec::with_capacity(LINE_BUF_CAPACITY),
            pos: 0,
        }
    }

    /// True when no formatted bytes are pending.
    pub(crate) fn is_drained(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Resets the line and hands out the storage for refilling.
    pub(crate) fn clear(&mut self) -> &mut Vec<u8> {
        self.buf.clear();
        self.pos = 0;
        &mut self.buf
    }

    /// Copies pending bytes into `out`, resetting once the line is fully
    /// consumed. Returns the number of bytes copied.
    pub(crate) fn drain(&mut self, out: &mut [u8]) -> usize {
        let pending = &self.buf[self.pos..];
        let n = pending.len().min(out.len());
        out[..n].copy_from_slice(&pending[..n]);
        self.pos += n;
        if self.pos >= self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        }
        n
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn push(&mut self, c: u8) {
        self.buf.push(c);
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// The codec bound to a transfer, with its private state. One dispatch
/// site per direction matches on this.
#[derive(Debug)]
pub(crate) enum Codec {
    /// `/help`: copies the fixed banner.
    Help,
    /// `/temp`: drains a reply prerendered at open.
    Temp,
    /// `/listdev` text: one formatted table line per catalog entry. The
    /// cursor tracks the resume position within the entry region.
    ListdevText,
    /// `/listdev` octet: the raw catalog blob, length prefix included.
    ListdevOctet,
    /// CPU-space octet read: a raw byte stream.
    CpuBytesOctet,
    /// CPU-space text read: 16-byte hexdump lines.
    CpuBytesText { label: u32 },
    /// FPGA-space octet read: words drained one byte per slot, MSB first.
    FpgaWordsOctet { word: u32 },
    /// FPGA-space text read: four full-width words per hexdump line.
    FpgaWordsText { label: u32 },
    /// FPGA-space octet write: accumulate four bytes, store one word.
    PutFpgaOctet { acc: u32, count: u32 },
    /// FPGA-space text write: hexdump lines reassembled across packets.
    PutFpgaText { colon_seen: bool },
}

/// State for one open transfer, advanced exclusively by
/// [`produce`](Transfer::produce) and [`consume`](Transfer::consume).
/// Progress lives entirely here, never on the stack, so the engine may
/// drop the transfer between any two calls.
#[derive(Debug)]
pub struct Transfer {
    pub(crate) write: bool,
    /// Next byte address to read or write.
    pub(crate) cursor: u32,
    /// Reads: bytes still to produce. Writes: bytes still allowed, with -1
    /// meaning unbounded.
    pub(crate) remaining: i64,
    pub(crate) line: LineBuf,
    pub(crate) codec: Codec,
}

impl Transfer {
    pub(crate) fn new(op: Op, codec: Codec) -> Transfer {
        Transfer {
            write: op == Op::Put,
            cursor: 0,
            remaining: 0,
            line: LineBuf::new(),
            codec,
        }
    }

    /// Whether this transfer consumes data (PUT) rather than producing it.
    pub fn is_write(&self) -> bool {
        self.write
    }
}
