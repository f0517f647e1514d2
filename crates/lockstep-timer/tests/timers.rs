//! Integration tests for timers, timer slots and the stopwatch.
//!
//! Uses `start_paused = true` so Tokio's clock only moves when every task
//! is idle (or when we `advance` it), which makes deadlines deterministic.

use std::time::Duration;

use lockstep_timer::{Stopwatch, Timer, TimerId, TimerSlot};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Countdown,
    Finalize,
}

#[derive(Debug, PartialEq, Eq)]
struct Fired {
    id: TimerId,
    step: &'static str,
}

fn channel() -> (mpsc::UnboundedSender<Fired>, mpsc::UnboundedReceiver<Fired>) {
    mpsc::unbounded_channel()
}

fn wrap(id: TimerId, step: &'static str) -> Fired {
    Fired { id, step }
}

// =========================================================================
// Timer
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_timer_posts_steps_in_order() {
    let (tx, mut rx) = channel();
    let timer = Timer::spawn(
        vec![
            (Duration::ZERO, "announce"),
            (Duration::from_secs(7), "3"),
            (Duration::from_secs(10), "go"),
        ],
        tx,
        wrap,
    );

    let steps: Vec<_> = [rx.recv().await, rx.recv().await, rx.recv().await]
        .into_iter()
        .map(|f| f.unwrap())
        .collect();
    assert!(steps.iter().all(|f| f.id == timer.id()));
    assert_eq!(
        steps.iter().map(|f| f.step).collect::<Vec<_>>(),
        vec!["announce", "3", "go"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_timer_respects_deadline() {
    let (tx, mut rx) = channel();
    let _timer = Timer::after(Duration::from_secs(30), "finalize", tx, wrap);

    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(rx.try_recv().is_err(), "fired early");

    tokio::time::advance(Duration::from_secs(1)).await;
    let fired = rx.recv().await.unwrap();
    assert_eq!(fired.step, "finalize");
}

#[tokio::test(start_paused = true)]
async fn test_dropping_timer_aborts_it() {
    let (tx, mut rx) = channel();
    let timer = Timer::after(Duration::from_secs(5), "never", tx, wrap);
    drop(timer);

    tokio::time::sleep(Duration::from_secs(10)).await;
    // Sender was dropped with the aborted task.
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_timer_ids_are_unique() {
    let (tx, _rx) = channel();
    let a = Timer::after(Duration::from_secs(1), "a", tx.clone(), wrap);
    let b = Timer::after(Duration::from_secs(1), "b", tx, wrap);
    assert_ne!(a.id(), b.id());
}

// =========================================================================
// TimerSlot
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_before_fire_wins() {
    let (tx, mut rx) = channel();
    let mut slot = TimerSlot::new();
    slot.arm(Kind::Countdown, Timer::after(Duration::from_secs(10), "go", tx, wrap));

    assert!(slot.cancel(Kind::Countdown));
    assert!(!slot.is_armed());
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_message_queued_still_wins_and_message_is_stale() {
    let (tx, mut rx) = channel();
    let mut slot = TimerSlot::new();
    slot.arm(Kind::Countdown, Timer::after(Duration::ZERO, "go", tx, wrap));

    // The step is already sitting in the channel...
    let fired = rx.recv().await.unwrap();
    // ...but the owner has not applied it, so the cancel wins.
    assert!(slot.cancel(Kind::Countdown));
    assert_eq!(slot.complete(fired.id), None);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_completion_fails() {
    let (tx, mut rx) = channel();
    let mut slot = TimerSlot::new();
    slot.arm(Kind::Countdown, Timer::after(Duration::from_secs(1), "go", tx, wrap));

    let fired = rx.recv().await.unwrap();
    assert_eq!(slot.complete(fired.id), Some(Kind::Countdown));
    assert!(!slot.cancel(Kind::Countdown), "effect already applied");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_wrong_kind_leaves_slot_armed() {
    let (tx, _rx) = channel();
    let mut slot = TimerSlot::new();
    slot.arm(Kind::Finalize, Timer::after(Duration::from_secs(30), "f", tx, wrap));

    assert!(!slot.cancel(Kind::Countdown));
    assert_eq!(slot.kind(), Some(Kind::Finalize));
}

#[tokio::test(start_paused = true)]
async fn test_accepts_keeps_slot_armed_for_intermediate_steps() {
    let (tx, mut rx) = channel();
    let mut slot = TimerSlot::new();
    slot.arm(
        Kind::Countdown,
        Timer::spawn(vec![(Duration::ZERO, "tick"), (Duration::from_secs(1), "go")], tx, wrap),
    );

    let tick = rx.recv().await.unwrap();
    assert_eq!(slot.accepts(tick.id), Some(Kind::Countdown));
    assert!(slot.is_armed());
    let go = rx.recv().await.unwrap();
    assert_eq!(slot.complete(go.id), Some(Kind::Countdown));
    assert!(!slot.is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_rearming_displaces_previous_timer() {
    let (tx, mut rx) = channel();
    let mut slot = TimerSlot::new();
    slot.arm(Kind::Countdown, Timer::after(Duration::from_secs(1), "old", tx.clone(), wrap));
    let displaced = slot.arm(Kind::Finalize, Timer::after(Duration::from_secs(2), "new", tx, wrap));
    assert_eq!(displaced, Some(Kind::Countdown));

    let fired = rx.recv().await.unwrap();
    assert_eq!(fired.step, "new");
    assert_eq!(slot.complete(fired.id), Some(Kind::Finalize));
}

// =========================================================================
// Stopwatch
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_stopwatch_zero_before_start() {
    let sw = Stopwatch::new();
    assert!(!sw.is_started());
    assert_eq!(sw.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_stopwatch_measures_elapsed() {
    let mut sw = Stopwatch::new();
    sw.start();
    tokio::time::advance(Duration::from_millis(8_345)).await;
    assert_eq!(sw.elapsed(), Duration::from_millis(8_345));
}

#[tokio::test(start_paused = true)]
async fn test_stopwatch_excludes_paused_time() {
    let mut sw = Stopwatch::new();
    sw.start();
    tokio::time::advance(Duration::from_secs(10)).await;

    assert!(sw.pause());
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(sw.elapsed(), Duration::from_secs(10));

    assert!(sw.resume());
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(sw.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_stopwatch_pause_resume_with_no_time_between_is_seamless() {
    let mut sw = Stopwatch::new();
    sw.start();
    tokio::time::advance(Duration::from_secs(3)).await;

    let before = sw.elapsed();
    sw.pause();
    sw.resume();
    assert_eq!(sw.elapsed(), before);
}

#[tokio::test(start_paused = true)]
async fn test_stopwatch_pause_is_idempotent() {
    let mut sw = Stopwatch::new();
    assert!(!sw.pause(), "cannot pause before start");
    sw.start();
    assert!(sw.pause());
    assert!(!sw.pause());
    assert!(sw.resume());
    assert!(!sw.resume());
}
