//! Logging facade used throughout the pipeline runner.

pub use log::{debug, error, info, trace, warn};
