//! Facade over the BAR engine model and its reference backends.

pub use pcie_bar_impls as impls;
pub use pcie_bar_tlp as tlp;

pub use pcie_bar_tlp::{BarController, BarControllerConfig, BarImplementation, TickOutput};
