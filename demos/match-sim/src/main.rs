//! Simulates a scheduled best-of-3 between two racers.
//!
//! Both racers agree on a start a few seconds out; the match room warns
//! them, opens each race, and the simulated racers ready up and finish
//! with a coin flip deciding who wins. Results go to the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use lockstep::prelude::*;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

const ADA: UserId = UserId(1);
const GRACE: UserId = UserId(2);

// ---------------------------------------------------------------------------
// Room output
// ---------------------------------------------------------------------------

/// Prints everything the match room says.
async fn print_room(mut rx: mpsc::UnboundedReceiver<RoomMessage>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            RoomMessage::Write(text) => println!("[room] {text}"),
            RoomMessage::Leaderboard(text) => println!("[board]\n{text}"),
            RoomMessage::PostResult(text) => println!("[results] {text}"),
            RoomMessage::Alert(text) => println!("[alert] {text}"),
            other => println!("[room] {other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Racers
// ---------------------------------------------------------------------------

/// Plays every race the room opens until the match is decided.
async fn play(
    handle: MatchHandle,
    mut events: broadcast::Receiver<MatchEvent>,
    countdown: Duration,
) -> Result<(), LockstepError> {
    while let Ok(event) = events.recv().await {
        match event {
            MatchEvent::RaceOpened { number, .. } => {
                info!(number, "racers readying up");
                for user in [ADA, GRACE] {
                    handle.act(MatchAction::Race(RaceAction::Ready(user))).await?;
                }
                tokio::time::sleep(countdown + Duration::from_secs(2)).await;
                let winner = if rand::random_bool(0.5) { ADA } else { GRACE };
                handle.act(MatchAction::Race(RaceAction::Finish(winner))).await?;
            }
            MatchEvent::RaceRecorded { number, winner, .. } => {
                info!(number, ?winner, "race recorded");
            }
            MatchEvent::RaceCanceled { number } => {
                info!(number, "race canceled");
            }
            MatchEvent::Complete { wins } => {
                info!(?wins, "match decided");
                break;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), LockstepError> {
    lockstep::init_tracing();

    let engine = EngineConfig::load();
    let mut config = engine.match_room_config();
    // Shrink the timings so the simulation finishes in seconds.
    config.race.countdown = Duration::from_secs(3);
    config.race.finalize_delay = Duration::from_secs(2);
    config.first_warning = Duration::from_secs(4);
    config.final_warning = Duration::from_secs(2);

    let mut m = Match::new(
        Participant::new(ADA, "ada"),
        Participant::new(GRACE, "grace"),
        RaceInfo::new("Any%, seeded", true),
    );
    m.set_best_of(3);
    m.set_ranked(true);
    m.suggest_time(Utc::now() + TimeDelta::seconds(6));
    m.confirm(Side::One);
    m.confirm(Side::Two);

    let store = Arc::new(MemoryStore::new());
    let (sink, rx) = ChannelSink::new();
    tokio::spawn(print_room(rx));

    let countdown = config.race.countdown;
    let mut manager = MatchRoomManager::new(config, store.clone(), store.clone());
    let match_id = manager.open(m, Arc::new(sink)).await?;
    let handle = manager
        .get(match_id)
        .cloned()
        .ok_or(lockstep::matches::MatchError::NotFound(match_id))?;
    let events = handle.subscribe();

    play(handle, events, countdown).await?;

    for (user, name) in [(ADA, "ada"), (GRACE, "grace")] {
        info!(%user, name, rating = store.rating(user), "final rating");
    }
    for race in store.match_races(match_id) {
        info!(number = race.race_number, winner = ?race.winner, "stored race");
    }

    manager.shutdown_all().await;
    Ok(())
}
