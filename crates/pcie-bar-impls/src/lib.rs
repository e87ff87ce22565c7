//! Reference BAR backends for [`pcie_bar_tlp::BarController`].
//!
//! These are the small register/memory models used by harnesses and tests: a zero-initialised
//! 4 KiB RAM, an address loopback and a fixed register table.

mod loop_addr;
mod register_table;
mod zero_write_4k;

pub use loop_addr::LoopAddr;
pub use register_table::RegisterTable;
pub use zero_write_4k::ZeroWrite4k;

/// Expands a 4-bit byte enable into a 32-bit lane mask (bit `n` selects bits `8n+7..8n`).
pub fn byte_enable_mask(byte_enable: u8) -> u32 {
    (0..4)
        .filter(|lane| byte_enable & (1 << lane) != 0)
        .fold(0, |mask, lane| mask | (0xff << (8 * lane)))
}
