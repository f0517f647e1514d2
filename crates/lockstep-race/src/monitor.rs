//! Closes race rooms nobody entered.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{RaceAction, RaceHandle, RaceStatus, RoomEventSink};

/// How long an open race may sit without entrants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    /// Warn the room after this long with nobody entered.
    pub warn_after: Duration,
    /// Cancel the race and close the room after this long.
    pub close_after: Duration,
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            warn_after: Duration::from_secs(90),
            close_after: Duration::from_secs(180),
        }
    }
}

/// Watches an open race and closes its room once the entrant list has
/// been empty for `policy.close_after`.
///
/// The monitor stops on its own once the race starts, reaches a terminal
/// state, or its actor goes away.
pub fn spawn_idle_monitor(
    handle: RaceHandle,
    sink: Arc<dyn RoomEventSink>,
    policy: IdlePolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut warned = false;
        loop {
            let Ok(snapshot) = handle.snapshot().await else {
                return;
            };
            if snapshot.status >= RaceStatus::Racing {
                tracing::debug!(race = %handle.key(), "idle monitor stopped");
                return;
            }

            let wait = if snapshot.has_any_entrants() {
                warned = false;
                policy.warn_after
            } else {
                let idle = snapshot.since_last_empty;
                if idle >= policy.close_after {
                    tracing::info!(race = %handle.key(), ?idle, "closing idle race room");
                    sink.write("Closing this room: nobody has entered.");
                    let _ = handle.act(RaceAction::Cancel).await;
                    sink.close();
                    return;
                }
                if idle >= policy.warn_after && !warned {
                    warned = true;
                    let left = policy.close_after - idle;
                    sink.write(&format!(
                        "This room will close in {} seconds if nobody enters.",
                        left.as_secs()
                    ));
                }
                if idle >= policy.warn_after {
                    policy.close_after - idle
                } else {
                    policy.warn_after - idle
                }
            };
            tokio::time::sleep(wait).await;
        }
    })
}
