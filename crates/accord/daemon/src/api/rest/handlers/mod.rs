//! API request handlers

mod health;
mod progress;
mod verify;

pub use health::*;
pub use progress::*;
pub use verify::*;
