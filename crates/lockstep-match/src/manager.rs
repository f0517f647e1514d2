//! Match room manager: opens, tracks, and recovers match rooms.

use std::collections::HashMap;
use std::sync::Arc;

use lockstep_protocol::MatchId;
use lockstep_race::RoomEventSink;

use crate::room::spawn_match_room;
use crate::{Match, MatchError, MatchHandle, MatchRoomConfig, MatchSnapshot, MatchStore, RatingService};

/// Owns one handle per open match room.
///
/// This is the entry point for match operations from the command layer.
/// At most one room is open per match.
pub struct MatchRoomManager {
    rooms: HashMap<MatchId, MatchHandle>,
    config: MatchRoomConfig,
    store: Arc<dyn MatchStore>,
    ratings: Arc<dyn RatingService>,
}

impl MatchRoomManager {
    pub fn new(
        config: MatchRoomConfig,
        store: Arc<dyn MatchStore>,
        ratings: Arc<dyn RatingService>,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
            store,
            ratings,
        }
    }

    /// Commits `m` and opens a room for it.
    pub async fn open(
        &mut self,
        m: Match,
        sink: Arc<dyn RoomEventSink>,
    ) -> Result<MatchId, MatchError> {
        if let Some(id) = m.id() {
            if self.rooms.contains_key(&id) {
                return Err(MatchError::AlreadyOpen(id));
            }
        }
        let handle = spawn_match_room(
            m,
            self.config.clone(),
            sink,
            Arc::clone(&self.store),
            Arc::clone(&self.ratings),
        )
        .await?;
        let match_id = handle.match_id();
        self.rooms.insert(match_id, handle);
        tracing::info!(%match_id, "match room opened");
        Ok(match_id)
    }

    pub fn get(&self, match_id: MatchId) -> Option<&MatchHandle> {
        self.rooms.get(&match_id)
    }

    pub async fn snapshot(&self, match_id: MatchId) -> Result<MatchSnapshot, MatchError> {
        let handle = self
            .rooms
            .get(&match_id)
            .ok_or(MatchError::NotFound(match_id))?;
        handle.snapshot().await
    }

    /// Shuts a room down and forgets it.
    pub async fn close(&mut self, match_id: MatchId) -> Result<(), MatchError> {
        let handle = self
            .rooms
            .remove(&match_id)
            .ok_or(MatchError::NotFound(match_id))?;
        let _ = handle.shutdown().await;
        tracing::info!(%match_id, "match room closed");
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Reopens a room for every persisted match that is not finished.
    ///
    /// `resolve` maps a match to the sink of the room that should host it.
    /// A match it cannot place is logged and left unrecovered; so is one
    /// whose room fails to open. Only failing to list the matches at all
    /// is an error.
    pub async fn recover<F>(&mut self, mut resolve: F) -> Result<Vec<MatchId>, MatchError>
    where
        F: FnMut(&Match) -> Option<Arc<dyn RoomEventSink>>,
    {
        let pending = self.store.incomplete_matches().await?;
        let mut recovered = Vec::with_capacity(pending.len());

        for m in pending {
            let Some(match_id) = m.id() else {
                continue;
            };
            if self.rooms.contains_key(&match_id) {
                continue;
            }
            let Some(sink) = resolve(&m) else {
                tracing::warn!(%match_id, "no room for persisted match, leaving it unrecovered");
                continue;
            };
            match self.open(m, sink).await {
                Ok(id) => recovered.push(id),
                Err(e) => tracing::warn!(%match_id, error = %e, "failed to recover match"),
            }
        }

        tracing::info!(recovered = recovered.len(), "match recovery finished");
        Ok(recovered)
    }

    /// Shuts every room down.
    pub async fn shutdown_all(&mut self) {
        for (match_id, handle) in self.rooms.drain() {
            if handle.shutdown().await.is_err() {
                tracing::debug!(%match_id, "match room already stopped");
            }
        }
    }
}
