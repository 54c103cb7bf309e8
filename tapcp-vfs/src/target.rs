//! The hardware gateway between the virtual filesystem and the platform.

/// Backend interface that the codecs drive.
///
/// Implementors expose the gateware (FPGA) address space, the processor
/// address space and the device catalog. FPGA accesses are always 32 bits
/// wide at 4-byte-aligned byte offsets. `read_fpga_word` returns the
/// logical register value with any bus byte swap already undone; the
/// codecs put words on the wire MSB-first regardless of host byte order.
pub trait Target {
    /// Size of the FPGA address space in bytes.
    fn fpga_size(&self) -> u32;

    /// 32-bit load from FPGA space. `addr` is a byte offset, 4-aligned.
    fn read_fpga_word(&mut self, addr: u32) -> u32;

    /// 32-bit store to FPGA space. `addr` is a byte offset, 4-aligned.
    fn write_fpga_word(&mut self, addr: u32, word: u32);

    /// Byte load from CPU space. `addr` is absolute; reads past the window
    /// may wrap rather than fail.
    fn read_cpu_byte(&mut self, addr: u32) -> u8;

    /// The device catalog blob, 16-bit big-endian length prefix included.
    fn catalog(&self) -> &[u8];

    /// Die temperature in degrees Celsius, when the platform has a sensor.
    /// `/temp` answers file-not-found while this returns `None`.
    fn fpga_temp(&self) -> Option<f32> {
        None
    }
}
