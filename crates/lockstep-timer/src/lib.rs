//! Cancellable timers and a pause-aware stopwatch for lockstep.
//!
//! Every delayed effect in the engine (race countdowns, the finalize
//! window, unpause countdowns, match-start alarms) is a [`Timer`]: a small
//! Tokio task that sleeps through a list of deadlines and posts one message
//! per deadline to the actor that owns it. Timers never touch state
//! themselves.
//!
//! # Cancellation contract
//!
//! The owning actor keeps its timer in a [`TimerSlot`]. Because the actor
//! processes timer messages one at a time, "has this timer's effect
//! happened yet?" has a definite answer at every point the actor looks:
//!
//! - [`TimerSlot::cancel`] returns `true` if the timer was still armed. Any
//!   message it already queued is now stale and will be rejected by
//!   [`TimerSlot::accepts`] / [`TimerSlot::complete`].
//! - It returns `false` once the final step has been completed, i.e. the
//!   effect is already applied. There is no third outcome.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* user commands */ }
//!         Some(fired) = timer_rx.recv() => {
//!             if slot.complete(fired.id).is_some() { /* apply effect */ }
//!         }
//!     }
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// Counter for generating unique timer IDs.
static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Identifies one spawned timer. Messages carry it so the owner can tell
/// a live timer's step from a stale one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

/// A running timer task.
///
/// Dropping a `Timer` aborts its task, so an owner that forgets a timer
/// (or is itself dropped) never leaves a sleeper behind.
pub struct Timer {
    id: TimerId,
    task: JoinHandle<()>,
}

impl Timer {
    /// Spawns a timer that posts `wrap(id, step)` to `tx` at each offset.
    ///
    /// Offsets are measured from the moment of the call and should be
    /// non-decreasing. An offset of zero posts immediately. The task ends
    /// after the last step or as soon as the receiver is gone.
    pub fn spawn<S, M, F>(steps: Vec<(Duration, S)>, tx: mpsc::UnboundedSender<M>, wrap: F) -> Self
    where
        S: Send + 'static,
        M: Send + 'static,
        F: Fn(TimerId, S) -> M + Send + 'static,
    {
        let id = TimerId(NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed));
        let start = Instant::now();
        debug!(timer = %id, steps = steps.len(), "timer armed");

        let task = tokio::spawn(async move {
            for (offset, step) in steps {
                time::sleep_until(start + offset).await;
                if tx.send(wrap(id, step)).is_err() {
                    trace!(timer = %id, "timer owner gone, stopping");
                    return;
                }
            }
        });

        Self { id, task }
    }

    /// Spawns a single-step timer.
    pub fn after<S, M, F>(delay: Duration, step: S, tx: mpsc::UnboundedSender<M>, wrap: F) -> Self
    where
        S: Send + 'static,
        M: Send + 'static,
        F: Fn(TimerId, S) -> M + Send + 'static,
    {
        Self::spawn(vec![(delay, step)], tx, wrap)
    }

    pub fn id(&self) -> TimerId {
        self.id
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// TimerSlot
// ---------------------------------------------------------------------------

/// Holds at most one armed timer, labelled with a caller-defined kind.
///
/// A single slot shared by several kinds of delay (a race's countdown and
/// its finalize window, say) makes "at most one outstanding timer" a
/// structural property instead of a checked one.
#[derive(Debug)]
pub struct TimerSlot<K> {
    armed: Option<(K, Timer)>,
}

impl<K: Copy + PartialEq + fmt::Debug> TimerSlot<K> {
    pub fn new() -> Self {
        Self { armed: None }
    }

    /// Arms `timer` under `kind`. A previously armed timer is cancelled
    /// and its kind returned.
    pub fn arm(&mut self, kind: K, timer: Timer) -> Option<K> {
        let displaced = self.armed.replace((kind, timer)).map(|(k, _)| k);
        if let Some(previous) = displaced {
            debug!(?previous, ?kind, "armed timer displaced an outstanding one");
        }
        displaced
    }

    /// Cancels the armed timer if it is of `kind`.
    ///
    /// Returns `true` when the cancellation won: the timer was armed and
    /// its effect has not been applied. Returns `false` when nothing of
    /// that kind is armed, which includes the case where it already fired.
    pub fn cancel(&mut self, kind: K) -> bool {
        match &self.armed {
            Some((armed, _)) if *armed == kind => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    /// Cancels whatever is armed, returning its kind.
    pub fn cancel_any(&mut self) -> Option<K> {
        self.armed.take().map(|(k, _)| k)
    }

    /// Kind of the armed timer, if any.
    pub fn kind(&self) -> Option<K> {
        self.armed.as_ref().map(|(k, _)| *k)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// For an intermediate step: returns the kind if `id` is the armed
    /// timer. The slot stays armed.
    pub fn accepts(&self, id: TimerId) -> Option<K> {
        match &self.armed {
            Some((kind, timer)) if timer.id() == id => Some(*kind),
            _ => None,
        }
    }

    /// For the final step: if `id` is the armed timer, disarms the slot
    /// and returns its kind. Stale ids return `None` and change nothing.
    pub fn complete(&mut self, id: TimerId) -> Option<K> {
        let kind = self.accepts(id)?;
        self.armed = None;
        Some(kind)
    }
}

impl<K: Copy + PartialEq + fmt::Debug> Default for TimerSlot<K> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Stopwatch
// ---------------------------------------------------------------------------

/// Measures race time, excluding any time spent paused.
///
/// Pausing records the pause instant; resuming shifts the start reference
/// forward by the paused duration, so `elapsed()` read just before a pause
/// and just after the matching resume agree.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    started: Option<Instant>,
    paused_at: Option<Instant>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) from zero.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.paused_at = None;
    }

    /// Freezes the clock. Returns `false` if not running or already paused.
    pub fn pause(&mut self) -> bool {
        if self.started.is_none() || self.paused_at.is_some() {
            return false;
        }
        self.paused_at = Some(Instant::now());
        true
    }

    /// Unfreezes the clock. Returns `false` if it was not paused.
    pub fn resume(&mut self) -> bool {
        let (Some(started), Some(paused_at)) = (self.started, self.paused_at) else {
            return false;
        };
        self.started = Some(started + paused_at.elapsed());
        self.paused_at = None;
        true
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Time run so far. Zero before `start`.
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.paused_at) {
            (None, _) => Duration::ZERO,
            (Some(started), Some(paused_at)) => paused_at.saturating_duration_since(started),
            (Some(started), None) => started.elapsed(),
        }
    }
}
