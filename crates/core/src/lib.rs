//! Core data types for the volume alert bot.

pub mod alert;
pub mod level;
pub mod observation;

pub use alert::*;
pub use level::*;
pub use observation::*;
