//! Memory pressure port interface

/// Port for sampling system memory usage
pub trait MemoryProbe: Send + Sync {
    /// Current memory usage as a percentage of total (0..=100)
    fn usage_percent(&self) -> f64;
}

/// Probe that never reports pressure
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPressure;

impl MemoryProbe for NoPressure {
    fn usage_percent(&self) -> f64 {
        0.0
    }
}
