use pcie_bar_tlp::BarImplementation;

use crate::byte_enable_mask;

const WORDS: usize = 4096 / 4;

/// 4 KiB of zero-initialised RAM. Addresses wrap within the window.
///
/// Contents survive [`BarImplementation::reset`], like block RAM behind a logic reset.
#[derive(Clone)]
pub struct ZeroWrite4k {
    mem: Box<[u32; WORDS]>,
}

impl Default for ZeroWrite4k {
    fn default() -> Self {
        Self::new()
    }
}

impl ZeroWrite4k {
    pub fn new() -> Self {
        Self {
            mem: Box::new([0; WORDS]),
        }
    }

    fn index(addr: u32) -> usize {
        ((addr as usize) >> 2) % WORDS
    }

    /// Reads a DWORD directly, bypassing the controller.
    pub fn peek(&self, addr: u32) -> u32 {
        self.mem[Self::index(addr)]
    }
}

impl std::fmt::Debug for ZeroWrite4k {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nonzero = self.mem.iter().filter(|&&w| w != 0).count();
        f.debug_struct("ZeroWrite4k")
            .field("nonzero_words", &nonzero)
            .finish()
    }
}

impl BarImplementation for ZeroWrite4k {
    fn read(&mut self, addr: u32, _byte_enable: u8) -> u32 {
        self.mem[Self::index(addr)]
    }

    fn write(&mut self, addr: u32, byte_enable: u8, data: u32) {
        let mask = byte_enable_mask(byte_enable);
        let word = &mut self.mem[Self::index(addr)];
        *word = (*word & !mask) | (data & mask);
        tracing::trace!(addr, byte_enable, data, "zero_write_4k store");
    }
}
