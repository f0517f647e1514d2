//! Finalized race results.

use chrono::{DateTime, Utc};
use lockstep_protocol::{Participant, RaceTime};
use serde::{Deserialize, Serialize};

use crate::{Level, RaceInfo, Racer, RacerState};

/// One row of a finalized race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RacerResult {
    pub participant: Participant,
    /// 1-based finishing place; `None` for anyone who did not finish.
    pub place: Option<u32>,
    pub state: RacerState,
    pub time: Option<RaceTime>,
    pub igt: Option<RaceTime>,
    pub level: Level,
    pub comment: Option<String>,
}

/// The full, sorted result set of a race, as handed to persistence and to
/// the hosting room when the race finalizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub info: RaceInfo,
    pub seed: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    /// Leaderboard order: finishers by time, then forfeits, then the rest.
    pub racers: Vec<RacerResult>,
}

impl RaceResult {
    /// Builds a result from racers already in leaderboard order.
    pub(crate) fn from_ordered(
        info: RaceInfo,
        seed: Option<u32>,
        started_at: Option<DateTime<Utc>>,
        racers: &[&Racer],
    ) -> Self {
        let mut place = 0;
        let racers = racers
            .iter()
            .map(|r| {
                let place = r.is_finished().then(|| {
                    place += 1;
                    place
                });
                RacerResult {
                    participant: r.participant().clone(),
                    place,
                    state: r.state(),
                    time: r.time(),
                    igt: r.igt(),
                    level: r.level(),
                    comment: r.comment().map(str::to_string),
                }
            })
            .collect();
        Self {
            info,
            seed,
            started_at,
            racers,
        }
    }

    /// First-place finisher, if anybody finished.
    pub fn winner(&self) -> Option<&Participant> {
        self.racers
            .iter()
            .find(|r| r.place == Some(1))
            .map(|r| &r.participant)
    }

    /// Text posted to the results feed.
    pub fn render(&self) -> String {
        let mut out = self.info.description.clone();
        if let Some(seed) = self.seed {
            out.push_str(&format!(" (seed {seed})"));
        }
        if let Some(started) = self.started_at {
            out.push_str(&format!(" -- {}", started.format("%Y-%m-%d %H:%M UTC")));
        }
        for r in &self.racers {
            out.push('\n');
            out.push_str(&result_line(r));
        }
        out
    }
}

fn result_line(r: &RacerResult) -> String {
    let mut line = match (r.place, r.state) {
        (Some(place), _) => format!("{place:>2}. {}", r.participant.name),
        _ => format!("    {}", r.participant.name),
    };
    match r.state {
        RacerState::Finished => {
            if let Some(time) = r.time {
                line.push_str(&format!(" --- {time}"));
            }
            if let Some(igt) = r.igt {
                line.push_str(&format!(" (igt {igt})"));
            }
        }
        RacerState::Forfeit => {
            line.push_str(" --- Forfeit");
            if let Level::Reached(level) = r.level {
                line.push_str(&format!(" (reached {level})"));
            }
        }
        _ => line.push_str(" --- Did not finish"),
    }
    if let Some(comment) = &r.comment {
        line.push_str(&format!(" -- {comment}"));
    }
    line
}
