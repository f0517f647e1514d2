//! Race times in hundredths of a second.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// An elapsed race time, stored as whole hundredths of a second.
///
/// Unset times are modelled as `Option<RaceTime>` by the owners of the
/// value rather than with a sentinel.
///
/// Displayed as `m:ss.hh`, or `h:mm:ss.hh` once an hour has passed:
///
/// ```
/// use lockstep_protocol::RaceTime;
///
/// assert_eq!(RaceTime::from_hundredths(8_345).to_string(), "1:23.45");
/// assert_eq!(RaceTime::from_hundredths(372_345).to_string(), "1:02:03.45");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceTime(u32);

impl RaceTime {
    pub const ZERO: RaceTime = RaceTime(0);

    pub fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    /// Truncates to whole hundredths; saturates at `u32::MAX` (~497 days).
    pub fn from_duration(duration: Duration) -> Self {
        let hundredths = duration.as_millis() / 10;
        Self(u32::try_from(hundredths).unwrap_or(u32::MAX))
    }

    pub fn hundredths(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(u64::from(self.0) * 10)
    }
}

impl fmt::Display for RaceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hundredths = self.0 % 100;
        let total_secs = self.0 / 100;
        let secs = total_secs % 60;
        let mins = (total_secs / 60) % 60;
        let hours = total_secs / 3600;
        if hours > 0 {
            write!(f, "{hours}:{mins:02}:{secs:02}.{hundredths:02}")
        } else {
            write!(f, "{mins}:{secs:02}.{hundredths:02}")
        }
    }
}

impl FromStr for RaceTime {
    type Err = ProtocolError;

    /// Parses `[[h:]m:]s[.f]` where `f` is one or two fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidTime(s.to_string());
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (trimmed, None),
        };

        let hundredths = match fraction {
            None => 0,
            Some(f) if (1..=2).contains(&f.len()) && f.bytes().all(|b| b.is_ascii_digit()) => {
                let value: u32 = f.parse().map_err(|_| invalid())?;
                if f.len() == 1 { value * 10 } else { value }
            }
            Some(_) => return Err(invalid()),
        };

        let fields: Vec<&str> = whole.split(':').collect();
        if fields.len() > 3 {
            return Err(invalid());
        }
        let mut total_secs: u64 = 0;
        for (i, field) in fields.iter().enumerate() {
            if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let value: u64 = field.parse().map_err(|_| invalid())?;
            // Anything below the leading field is a base-60 digit.
            if i > 0 && value >= 60 {
                return Err(invalid());
            }
            total_secs = total_secs
                .checked_mul(60)
                .and_then(|t| t.checked_add(value))
                .ok_or_else(invalid)?;
        }

        let total = total_secs
            .checked_mul(100)
            .and_then(|t| t.checked_add(u64::from(hundredths)))
            .and_then(|t| u32::try_from(t).ok())
            .ok_or_else(invalid)?;
        Ok(Self(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_under_an_hour() {
        assert_eq!(RaceTime::from_hundredths(0).to_string(), "0:00.00");
        assert_eq!(RaceTime::from_hundredths(505).to_string(), "0:05.05");
        assert_eq!(RaceTime::from_hundredths(8_345).to_string(), "1:23.45");
    }

    #[test]
    fn test_parse_rejects_oversized_field() {
        let err = "18446744073709551615:00".parse::<RaceTime>().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidTime(_)));
        assert!("99999999999999999999".parse::<RaceTime>().is_err());
        assert!("4294967296".parse::<RaceTime>().is_err());
    }

    #[test]
    fn test_display_with_hours() {
        assert_eq!(RaceTime::from_hundredths(360_000).to_string(), "1:00:00.00");
    }

    #[test]
    fn test_parse_accepts_common_shapes() {
        assert_eq!("1:23.45".parse::<RaceTime>().unwrap().hundredths(), 8_345);
        assert_eq!("83.4".parse::<RaceTime>().unwrap().hundredths(), 8_340);
        assert_eq!("1:02:03".parse::<RaceTime>().unwrap().hundredths(), 372_300);
        assert_eq!(" 7 ".parse::<RaceTime>().unwrap().hundredths(), 700);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "abc", "1:60.00", "1:2:3:4", "1.234", "1..2", ":30", "-5"] {
            assert!(bad.parse::<RaceTime>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_parse_display_agree() {
        let t = RaceTime::from_hundredths(123_456);
        assert_eq!(t.to_string().parse::<RaceTime>().unwrap(), t);
    }

    #[test]
    fn test_from_duration_truncates() {
        let t = RaceTime::from_duration(Duration::from_millis(12_349));
        assert_eq!(t.hundredths(), 1_234);
        assert_eq!(t.as_duration(), Duration::from_millis(12_340));
    }
}
