use std::collections::BTreeMap;

use pcie_bar_tlp::BarImplementation;

/// Read-only register file: fixed values at DWORD-aligned offsets inside a window.
///
/// Offsets outside the table read as zero and the address wraps at the window size. The write
/// path accepts every write and changes nothing.
#[derive(Debug, Clone)]
pub struct RegisterTable {
    window: u32,
    registers: BTreeMap<u32, u32>,
    interrupt_enable: bool,
}

impl RegisterTable {
    /// `window` is rounded up to a power of two of at least one DWORD.
    pub fn new(window: u32, registers: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let window = window.max(4).next_power_of_two();
        let registers = registers
            .into_iter()
            .map(|(offset, value)| ((offset & !0x3) & (window - 1), value))
            .collect();
        Self {
            window,
            registers,
            interrupt_enable: false,
        }
    }

    pub fn with_interrupt_enable(mut self, enable: bool) -> Self {
        self.interrupt_enable = enable;
        self
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

impl BarImplementation for RegisterTable {
    fn read(&mut self, addr: u32, _byte_enable: u8) -> u32 {
        let offset = addr & (self.window - 1);
        self.registers.get(&offset).copied().unwrap_or(0)
    }

    fn write(&mut self, addr: u32, byte_enable: u8, data: u32) {
        tracing::trace!(addr, byte_enable, data, "register table write ignored");
    }

    fn interrupt_enable(&self) -> bool {
        self.interrupt_enable
    }
}
