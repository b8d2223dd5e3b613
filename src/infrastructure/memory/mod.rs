//! Memory pressure adapters

mod sysinfo_probe;

pub use sysinfo_probe::SysinfoMemoryProbe;
