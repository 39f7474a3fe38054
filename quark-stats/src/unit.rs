//! Time units for reported statistics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit in which summary statistics are reported
///
/// Samples are always recorded in seconds and scaled on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Seconds (factor 1)
    #[default]
    #[serde(rename = "sec", alias = "s")]
    Seconds,
    /// Milliseconds (factor 1e3)
    #[serde(rename = "ms")]
    Milliseconds,
    /// Microseconds (factor 1e6)
    #[serde(rename = "us")]
    Microseconds,
}

impl TimeUnit {
    /// Multiplier applied to a value in seconds
    pub fn factor(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Milliseconds => 1e3,
            TimeUnit::Microseconds => 1e6,
        }
    }

    /// Convert a value in seconds to this unit
    pub fn scale(self, seconds: f64) -> f64 {
        seconds * self.factor()
    }

    /// Short suffix used in human output
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "sec",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Microseconds => "us",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Unrecognised time unit text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown time unit '{0}' (expected sec, ms or us)")]
pub struct ParseUnitError(pub String);

impl FromStr for TimeUnit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sec" | "s" | "seconds" => Ok(TimeUnit::Seconds),
            "ms" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "us" | "microseconds" => Ok(TimeUnit::Microseconds),
            other => Err(ParseUnitError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factors() {
        assert_eq!(TimeUnit::Seconds.factor(), 1.0);
        assert_eq!(TimeUnit::Milliseconds.factor(), 1e3);
        assert_eq!(TimeUnit::Microseconds.factor(), 1e6);
    }

    #[test]
    fn test_parse() {
        assert_eq!("sec".parse::<TimeUnit>().unwrap(), TimeUnit::Seconds);
        assert_eq!("MS".parse::<TimeUnit>().unwrap(), TimeUnit::Milliseconds);
        assert_eq!("us".parse::<TimeUnit>().unwrap(), TimeUnit::Microseconds);
        assert!("ns".parse::<TimeUnit>().is_err());
    }
}
