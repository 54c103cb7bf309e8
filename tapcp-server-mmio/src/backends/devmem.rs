//! # Memory-Mapped Window Backend
//!
//! For platforms that expose the gateware bus slave through a mappable
//! character device (a UIO node or `/dev/mem`).
//!
//! ## Example Usage
//!
//! ```ignore
//! use tapcp_server_mmio::backends::devmem::DevmemTarget;
//! use tapcp_server::server::{Config, Server};
//!
//! let catalog = std::fs::read("core_info.bin")?;
//! let target = DevmemTarget::new("/dev/uio0", 0x0400_0000, catalog)?;
//! let mut server = Server::bind(target, Config::default(), "0.0.0.0:69")?;
//! server.serve()?;
//! ```
use std::{
    ffi::c_void,
    fs::OpenOptions,
    io,
    num::NonZero,
    path::Path,
    ptr::{read_volatile, write_volatile, NonNull},
};

use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use tapcp_vfs::Target;

/// Target backed by mapped hardware windows.
///
/// The FPGA window is mandatory. A CPU window may be mapped in addition;
/// without one, CPU-space reads return zero.
pub struct DevmemTarget {
    fpga: *mut u32,
    fpga_size: u32,
    cpu: *mut u8,
    cpu_size: u32,
    catalog: Vec<u8>,
}

fn map_window(path: &Path, size: u32) -> io::Result<*mut c_void> {
    log::debug!("mapping {} (size=0x{:x})", path.display(), size);
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = NonZero::new(size as usize)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "window size must be non-zero"))?;
    let ptr = unsafe {
        mmap(
            None,
            len,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED,
            file,
            0,
        )?
    };
    log::info!("mapped {} at {:p}", path.display(), ptr.as_ptr());
    Ok(ptr.as_ptr())
}

impl DevmemTarget {
    /// Maps the FPGA window of `path`. `catalog` is the packed device
    /// catalog for the loaded gateware; device extents in it are trusted
    /// to lie inside the window.
    pub fn new(path: impl AsRef<Path>, size: u32, catalog: Vec<u8>) -> io::Result<DevmemTarget> {
        let fpga = map_window(path.as_ref(), size)? as *mut u32;
        Ok(DevmemTarget {
            fpga,
            fpga_size: size,
            cpu: std::ptr::null_mut(),
            cpu_size: 0,
            catalog,
        })
    }

    /// Maps a second window for `/cpu` reads.
    pub fn map_cpu_window(&mut self, path: impl AsRef<Path>, size: u32) -> io::Result<()> {
        self.cpu = map_window(path.as_ref(), size)? as *mut u8;
        self.cpu_size = size;
        Ok(())
    }
}

impl Target for DevmemTarget {
    fn fpga_size(&self) -> u32 {
        self.fpga_size
    }

    fn read_fpga_word(&mut self, addr: u32) -> u32 {
        // The bus stores words big-endian; hand the codecs the logical
        // register value.
        // SAFETY: the resolver bounds-checks raw accesses against the
        // window size and the catalog extents lie inside it.
        u32::from_be(unsafe { read_volatile(self.fpga.add((addr / 4) as usize)) })
    }

    fn write_fpga_word(&mut self, addr: u32, word: u32) {
        // SAFETY: as in read_fpga_word.
        unsafe { write_volatile(self.fpga.add((addr / 4) as usize), word.to_be()) }
    }

    fn read_cpu_byte(&mut self, addr: u32) -> u8 {
        if self.cpu.is_null() {
            return 0;
        }
        // SAFETY: the index is reduced into the mapped window.
        unsafe { read_volatile(self.cpu.add((addr % self.cpu_size) as usize)) }
    }

    fn catalog(&self) -> &[u8] {
        &self.catalog
    }
}

impl Drop for DevmemTarget {
    fn drop(&mut self) {
        if let Some(ptr) = NonNull::new(self.fpga) {
            unsafe {
                let _ = munmap(ptr.cast(), self.fpga_size as usize);
            }
        }
        if let Some(ptr) = NonNull::new(self.cpu) {
            unsafe {
                let _ = munmap(ptr.cast(), self.cpu_size as usize);
            }
        }
    }
}
