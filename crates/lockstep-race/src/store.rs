//! Persistence boundary for finalized races.

use async_trait::async_trait;
use lockstep_protocol::RaceId;

use crate::{RaceResult, StoreError};

/// Records finalized races. Shared across rooms as `Arc<dyn RaceStore>`;
/// implementations do their own synchronization.
#[async_trait]
pub trait RaceStore: Send + Sync {
    /// Persists a finalized race and returns its durable id.
    async fn record_race(&self, result: &RaceResult) -> Result<RaceId, StoreError>;
}
