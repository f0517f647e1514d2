//! Integration tests for the race room actor, driven through handles with
//! a paused clock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lockstep_protocol::{Participant, RaceId, UserId};
use lockstep_race::{
    ChannelSink, IdlePolicy, RaceAction, RaceConfig, RaceError, RaceEvent, RaceHandle, RaceInfo,
    RaceResult, RaceStatus, RaceStore, RaceTimer, RoomMessage, StoreError, spawn_idle_monitor,
    spawn_race,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

// =========================================================================
// Test collaborators
// =========================================================================

#[derive(Default)]
struct RecordingStore {
    recorded: Mutex<Vec<RaceResult>>,
    fail: bool,
}

#[async_trait]
impl RaceStore for RecordingStore {
    async fn record_race(&self, result: &RaceResult) -> Result<RaceId, StoreError> {
        if self.fail {
            return Err(StoreError::Unavailable("database offline".into()));
        }
        let mut recorded = self.recorded.lock();
        recorded.push(result.clone());
        Ok(RaceId(recorded.len() as u64))
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn alpha() -> Participant {
    Participant::new(UserId(1), "alpha")
}

fn beta() -> Participant {
    Participant::new(UserId(2), "beta")
}

fn config() -> RaceConfig {
    RaceConfig {
        countdown: Duration::from_secs(10),
        unpause_countdown: Duration::from_secs(3),
        finalize_delay: Duration::from_secs(30),
        ..RaceConfig::default()
    }
}

fn open_race(store: Option<Arc<dyn RaceStore>>) -> (RaceHandle, mpsc::UnboundedReceiver<RoomMessage>) {
    let (sink, rx) = ChannelSink::new();
    let handle = spawn_race(config(), RaceInfo::new("Any%", false), Arc::new(sink), store);
    (handle, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<RoomMessage>) -> Vec<RoomMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn events(msgs: &[RoomMessage]) -> Vec<RaceEvent> {
    msgs.iter()
        .filter_map(|m| match m {
            RoomMessage::Event(e) => Some(e.clone()),
            _ => None,
        })
        .collect()
}

fn writes(msgs: &[RoomMessage]) -> Vec<String> {
    msgs.iter()
        .filter_map(|m| match m {
            RoomMessage::Write(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

async fn start(handle: &RaceHandle) {
    assert!(handle.act(RaceAction::EnterAndReady(alpha())).await.unwrap());
    assert!(handle.act(RaceAction::EnterAndReady(beta())).await.unwrap());
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(handle.snapshot().await.unwrap().status, RaceStatus::Racing);
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_race_runs_to_recorded_result() {
    let store = Arc::new(RecordingStore::default());
    let (handle, mut rx) = open_race(Some(store.clone()));
    start(&handle).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(handle.act(RaceAction::Finish(UserId(2))).await.unwrap());
    assert!(handle.act(RaceAction::Forfeit(UserId(1))).await.unwrap());
    assert_eq!(handle.snapshot().await.unwrap().status, RaceStatus::Completed);

    tokio::time::sleep(Duration::from_secs(31)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, RaceStatus::Finalized);
    assert_eq!(snapshot.armed_timer, None);

    let msgs = drain(&mut rx);
    let evs = events(&msgs);
    assert_eq!(evs[0], RaceEvent::RacerEnter(alpha()));
    assert_eq!(evs[1], RaceEvent::RacerEnter(beta()));
    assert_eq!(evs[2], RaceEvent::Begin);
    assert_eq!(evs[3], RaceEvent::End);
    match &evs[4] {
        RaceEvent::Finalize { result, race_id } => {
            assert_eq!(*race_id, Some(RaceId(1)));
            assert_eq!(result.winner(), Some(&beta()));
        }
        other => panic!("expected finalize, got {other:?}"),
    }
    assert_eq!(evs.len(), 5, "each transition emits once");
    assert!(msgs.iter().any(|m| matches!(m, RoomMessage::PostResult(_))));
    assert_eq!(store.recorded.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_leaves_race_finalized_and_reports() {
    let store = Arc::new(RecordingStore {
        fail: true,
        ..Default::default()
    });
    let (handle, mut rx) = open_race(Some(store));
    start(&handle).await;
    handle.act(RaceAction::Finish(UserId(1))).await.unwrap();
    handle.act(RaceAction::Finish(UserId(2))).await.unwrap();
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(handle.snapshot().await.unwrap().status, RaceStatus::Finalized);
    let msgs = drain(&mut rx);
    assert!(writes(&msgs).iter().any(|w| w.contains("could not be recorded")));
    assert!(events(&msgs).iter().any(|e| matches!(
        e,
        RaceEvent::Finalize { race_id: None, .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_no_store_still_announces_result() {
    let (handle, mut rx) = open_race(None);
    start(&handle).await;
    handle.act(RaceAction::Finish(UserId(1))).await.unwrap();
    handle.act(RaceAction::Finish(UserId(2))).await.unwrap();
    tokio::time::sleep(Duration::from_secs(31)).await;

    let msgs = drain(&mut rx);
    assert!(msgs.iter().any(|m| matches!(m, RoomMessage::PostResult(_))));
}

// =========================================================================
// Cancellation races
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_countdown_at_deadline_is_never_torn() {
    let (handle, _rx) = open_race(None);
    handle.act(RaceAction::EnterAndReady(alpha())).await.unwrap();
    handle.act(RaceAction::EnterAndReady(beta())).await.unwrap();
    tokio::time::advance(Duration::from_secs(10)).await;

    let cancelled = handle.act(RaceAction::CancelCountdown).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    if cancelled {
        assert_eq!(snapshot.status, RaceStatus::EntryOpen);
        assert_eq!(snapshot.armed_timer, None);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(handle.snapshot().await.unwrap().status, RaceStatus::EntryOpen);
    } else {
        assert_eq!(snapshot.status, RaceStatus::Racing);
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_countdown_after_start_fails() {
    let (handle, _rx) = open_race(None);
    start(&handle).await;
    assert!(!handle.act(RaceAction::CancelCountdown).await.unwrap());
    assert_eq!(handle.snapshot().await.unwrap().status, RaceStatus::Racing);
}

#[tokio::test(start_paused = true)]
async fn test_correction_in_finalize_window_prevents_recording() {
    let store = Arc::new(RecordingStore::default());
    let (handle, _rx) = open_race(Some(store.clone()));
    start(&handle).await;
    handle.act(RaceAction::Finish(UserId(1))).await.unwrap();
    handle.act(RaceAction::Finish(UserId(2))).await.unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(handle.act(RaceAction::Unfinish(UserId(2))).await.unwrap());
    tokio::time::sleep(Duration::from_secs(60)).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, RaceStatus::Racing);
    assert!(store.recorded.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_timer_armed() {
    let (handle, _rx) = open_race(None);
    start(&handle).await;
    handle.act(RaceAction::Pause).await.unwrap();
    handle.act(RaceAction::Unpause).await.unwrap();
    assert_eq!(handle.snapshot().await.unwrap().armed_timer, Some(RaceTimer::Unpause));

    // Everyone leaves while the unpause countdown runs: finalization
    // replaces it.
    handle.act(RaceAction::Forfeit(UserId(1))).await.unwrap();
    handle.act(RaceAction::Forfeit(UserId(2))).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, RaceStatus::Completed);
    assert_eq!(snapshot.armed_timer, Some(RaceTimer::Finalize));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.snapshot().await.unwrap().status, RaceStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_race_ignores_every_command() {
    let (handle, mut rx) = open_race(None);
    start(&handle).await;
    assert!(handle.act(RaceAction::Cancel).await.unwrap());
    let board = handle.leaderboard().await.unwrap();
    drain(&mut rx);

    for action in [
        RaceAction::Finish(UserId(1)),
        RaceAction::Forfeit(UserId(2)),
        RaceAction::Enter(Participant::new(UserId(3), "gamma")),
        RaceAction::Pause,
        RaceAction::Cancel,
    ] {
        assert!(!handle.act(action).await.unwrap());
    }
    assert_eq!(handle.leaderboard().await.unwrap(), board);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_force_forfeit_by_admin() {
    let (handle, mut rx) = open_race(None);
    start(&handle).await;
    drain(&mut rx);
    assert!(handle.act(RaceAction::ForceForfeit(UserId(2))).await.unwrap());
    assert_eq!(writes(&drain(&mut rx)), vec!["beta has been forfeit by an admin."]);
}

// =========================================================================
// Handle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_makes_handle_unavailable() {
    let (handle, _rx) = open_race(None);
    handle.shutdown().await.unwrap();
    tokio::task::yield_now().await;
    let err = handle.snapshot().await.unwrap_err();
    assert!(matches!(err, RaceError::Unavailable(key) if key == handle.key()));
    assert!(handle.is_closed());
}

// =========================================================================
// Idle monitor
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_monitor_warns_then_closes_empty_room() {
    let (sink, mut rx) = ChannelSink::new();
    let sink = Arc::new(sink);
    let handle = spawn_race(config(), RaceInfo::default(), sink.clone(), None);
    let monitor = spawn_idle_monitor(handle.clone(), sink, IdlePolicy::default());

    tokio::time::sleep(Duration::from_secs(100)).await;
    let msgs = drain(&mut rx);
    assert_eq!(
        writes(&msgs),
        vec!["This room will close in 90 seconds if nobody enters."]
    );

    monitor.await.unwrap();
    let msgs = drain(&mut rx);
    assert!(msgs.contains(&RoomMessage::Close));
    assert!(events(&msgs).contains(&RaceEvent::Cancel));
    assert_eq!(handle.snapshot().await.unwrap().status, RaceStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_idle_monitor_resets_when_someone_enters() {
    let (sink, mut rx) = ChannelSink::new();
    let sink = Arc::new(sink);
    let handle = spawn_race(config(), RaceInfo::default(), sink.clone(), None);
    let _monitor = spawn_idle_monitor(handle.clone(), sink, IdlePolicy::default());

    tokio::time::sleep(Duration::from_secs(60)).await;
    handle.act(RaceAction::Enter(alpha())).await.unwrap();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(!drain(&mut rx).contains(&RoomMessage::Close));

    handle.act(RaceAction::Unenter(UserId(1))).await.unwrap();
    tokio::time::sleep(Duration::from_secs(400)).await;
    assert!(drain(&mut rx).contains(&RoomMessage::Close));
}

#[tokio::test(start_paused = true)]
async fn test_idle_monitor_stops_once_race_starts() {
    let (sink, _rx) = ChannelSink::new();
    let sink = Arc::new(sink);
    let handle = spawn_race(config(), RaceInfo::default(), sink.clone(), None);
    let monitor = spawn_idle_monitor(handle.clone(), sink, IdlePolicy::default());
    start(&handle).await;

    tokio::time::timeout(Duration::from_secs(200), monitor)
        .await
        .expect("monitor exits")
        .unwrap();
    assert_eq!(handle.snapshot().await.unwrap().status, RaceStatus::Racing);
}
