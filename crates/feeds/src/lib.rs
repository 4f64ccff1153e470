//! Volume observation sources.
//!
//! This crate provides:
//! - The [`ObservationSource`] trait consumed by the alert orchestrator
//! - A Binance REST kline source
//! - Symbol discovery from the exchange listing

pub mod discovery;
pub mod error;
pub mod rest;
pub mod source;

pub use discovery::*;
pub use error::*;
pub use rest::*;
pub use source::*;
