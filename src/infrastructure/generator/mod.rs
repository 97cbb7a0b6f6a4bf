//! Image generator implementations

mod stability;

pub use stability::{StabilityConfig, StabilityImageGenerator};
