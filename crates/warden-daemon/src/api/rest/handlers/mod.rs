//! API request handlers

mod health;
mod instances;

pub use health::*;
pub use instances::*;
