//! Volume alert pipeline.
//!
//! This crate provides:
//! - Tiered classification of volume spikes on bullish candles
//! - Per-(symbol, level) cooldown with durable JSON state
//! - Telegram delivery and the cycle orchestrator tying it together

pub mod classifier;
pub mod config;
pub mod dedup;
pub mod format;
pub mod orchestrator;
pub mod sink;
pub mod state;
pub mod telegram;

pub use classifier::AlertClassifier;
pub use config::{AlertConfig, AlertSettings, ConfigError, SymbolFilter};
pub use dedup::{default_cooldown, AlertDeduplicationStore, KeyState};
pub use orchestrator::{AlertOrchestrator, CycleReport, CycleSettings, OutcomeKind, SendOutcome};
pub use sink::{DeliveryError, NotificationSink};
pub use state::{AlertStateStore, JsonFileState, MemoryState, StateBackend, StateError};
pub use telegram::TelegramSink;
