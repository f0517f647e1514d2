//! Start-time alarm planning.
//!
//! Turning a wall-clock start time into timer offsets is a pure function
//! of "now", so it is computed once here and handed to a [`Timer`] as a
//! step list.
//!
//! [`Timer`]: lockstep_timer::Timer

use std::time::Duration;

use chrono::{DateTime, Utc};

/// One step of the start-time alarm chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmStep {
    /// Ping both racers.
    FirstWarning,
    /// Last call, plus the public alert.
    FinalWarning,
    /// Open the first race.
    Begin,
}

/// Offsets (from now) at which each alarm step fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmPlan {
    pub steps: Vec<(Duration, AlarmStep)>,
    /// The start time had already passed when the plan was made.
    pub overdue: bool,
}

/// Plans the alarm chain for a match starting at `scheduled`.
///
/// Warnings whose moment has passed fire immediately, except that the
/// first warning is dropped once the final one is due. An overdue match
/// only gets `Begin`, at offset zero.
pub fn plan(
    now: DateTime<Utc>,
    scheduled: DateTime<Utc>,
    first_warning: Duration,
    final_warning: Duration,
) -> AlarmPlan {
    let remaining = match (scheduled - now).to_std() {
        Ok(remaining) if !remaining.is_zero() => remaining,
        _ => {
            return AlarmPlan {
                steps: vec![(Duration::ZERO, AlarmStep::Begin)],
                overdue: true,
            };
        }
    };

    let mut steps = Vec::with_capacity(3);
    if remaining > final_warning && first_warning > final_warning {
        steps.push((remaining.saturating_sub(first_warning), AlarmStep::FirstWarning));
    }
    steps.push((remaining.saturating_sub(final_warning), AlarmStep::FinalWarning));
    steps.push((remaining, AlarmStep::Begin));
    AlarmPlan {
        steps,
        overdue: false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    const FIRST: Duration = Duration::from_secs(15 * 60);
    const FINAL: Duration = Duration::from_secs(5 * 60);

    fn mins(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn test_full_chain_when_far_out() {
        let now = Utc::now();
        let p = plan(now, now + TimeDelta::minutes(60), FIRST, FINAL);
        assert!(!p.overdue);
        assert_eq!(
            p.steps,
            vec![
                (mins(45), AlarmStep::FirstWarning),
                (mins(55), AlarmStep::FinalWarning),
                (mins(60), AlarmStep::Begin),
            ]
        );
    }

    #[test]
    fn test_inside_first_window_warns_immediately() {
        let now = Utc::now();
        let p = plan(now, now + TimeDelta::minutes(10), FIRST, FINAL);
        assert_eq!(p.steps[0], (Duration::ZERO, AlarmStep::FirstWarning));
        assert_eq!(p.steps[1], (mins(5), AlarmStep::FinalWarning));
    }

    #[test]
    fn test_inside_final_window_skips_first_warning() {
        let now = Utc::now();
        let p = plan(now, now + TimeDelta::minutes(3), FIRST, FINAL);
        assert_eq!(
            p.steps,
            vec![
                (Duration::ZERO, AlarmStep::FinalWarning),
                (mins(3), AlarmStep::Begin),
            ]
        );
    }

    #[test]
    fn test_past_start_is_overdue() {
        let now = Utc::now();
        let p = plan(now, now - TimeDelta::minutes(30), FIRST, FINAL);
        assert!(p.overdue);
        assert_eq!(p.steps, vec![(Duration::ZERO, AlarmStep::Begin)]);
    }
}
