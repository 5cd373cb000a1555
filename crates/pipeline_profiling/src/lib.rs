//! Wall-clock instrumentation.

pub mod instrumentation;

pub use instrumentation::timing::{TaskTimer, TimedTask};
