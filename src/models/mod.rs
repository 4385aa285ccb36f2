//! Request and response bodies

pub mod feature;
pub mod prediction;

pub use feature::*;
pub use prediction::*;
