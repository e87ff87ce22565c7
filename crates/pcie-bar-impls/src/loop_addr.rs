use pcie_bar_tlp::BarImplementation;

/// Loopback test BAR: every read returns its own address. Writes are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopAddr;

impl BarImplementation for LoopAddr {
    fn read(&mut self, addr: u32, _byte_enable: u8) -> u32 {
        addr
    }

    fn write(&mut self, _addr: u32, _byte_enable: u8, _data: u32) {}
}
