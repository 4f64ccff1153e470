//! Observation source abstraction.

use crate::FetchError;
use async_trait::async_trait;
use volume_core::VolumeObservation;

/// Supplies the current volume snapshot for a symbol.
///
/// Implementations are read-only and independent per symbol, so callers may
/// fetch several symbols concurrently.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn get_observation(&self, symbol: &str) -> Result<VolumeObservation, FetchError>;
}
