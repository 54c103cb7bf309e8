//! # Simulator Backend
//!
//! A RAM-backed target with a small canned register catalog. Serves
//! protocol bring-up and client development without hardware on the bench.

use tapcp_vfs::{CatalogBuilder, Target};

const BOARD_ID: u32 = 0x7461_7063;
const CLKCOUNTER_ADDR: u32 = 0x4;

/// Fully simulated target: a word vector for FPGA space, a byte vector
/// for CPU space and a fixed fake temperature.
pub struct SimTarget {
    fpga: Vec<u32>,
    cpu: Vec<u8>,
    catalog: Vec<u8>,
}

impl SimTarget {
    /// Builds a simulator with at least `words` words of FPGA space. The
    /// catalog exposes a board id, a clock counter that ticks on every
    /// read, and a scratchpad register file at 0x100.
    pub fn new(words: usize) -> SimTarget {
        let catalog = CatalogBuilder::new()
            .push("sys_board_id", 0x0, 0x4, 1, true)
            .push("sys_clkcounter", CLKCOUNTER_ADDR, 0x4, 1, true)
            .push("sys_scratchpad", 0x100, 0x100, 3, false)
            .finish();
        let mut fpga = vec![0u32; words.max(0x200 / 4)];
        fpga[0] = BOARD_ID;
        SimTarget {
            fpga,
            cpu: (0..=255).cycle().take(0x1000).collect(),
            catalog,
        }
    }
}

impl Target for SimTarget {
    fn fpga_size(&self) -> u32 {
        (self.fpga.len() * 4) as u32
    }

    fn read_fpga_word(&mut self, addr: u32) -> u32 {
        let idx = (addr / 4) as usize;
        if addr == CLKCOUNTER_ADDR {
            self.fpga[idx] = self.fpga[idx].wrapping_add(1);
        }
        self.fpga[idx]
    }

    fn write_fpga_word(&mut self, addr: u32, word: u32) {
        log::trace!("sim: write {:08X} at 0x{:x}", word, addr);
        self.fpga[(addr / 4) as usize] = word;
    }

    fn read_cpu_byte(&mut self, addr: u32) -> u8 {
        self.cpu[addr as usize % self.cpu.len()]
    }

    fn catalog(&self) -> &[u8] {
        &self.catalog
    }

    fn fpga_temp(&self) -> Option<f32> {
        Some(38.5)
    }
}
