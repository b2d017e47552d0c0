//! Expiry choices accepted on create

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use cinder_core::UnixMillis;
use serde::{Deserialize, Serialize};

use crate::error::PasteError;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Named expiry windows offered to creators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpiryPreset {
    #[serde(rename = "10m")]
    TenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
    /// Thirty days
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "never")]
    Never,
}

impl ExpiryPreset {
    /// Lifetime of the preset, `None` for [`ExpiryPreset::Never`]
    pub fn duration(&self) -> Option<Duration> {
        let secs = match self {
            ExpiryPreset::TenMinutes => 10 * MINUTE,
            ExpiryPreset::OneHour => HOUR,
            ExpiryPreset::OneDay => DAY,
            ExpiryPreset::OneWeek => 7 * DAY,
            ExpiryPreset::OneMonth => 30 * DAY,
            ExpiryPreset::Never => return None,
        };
        Some(Duration::from_secs(secs))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryPreset::TenMinutes => "10m",
            ExpiryPreset::OneHour => "1h",
            ExpiryPreset::OneDay => "1d",
            ExpiryPreset::OneWeek => "1w",
            ExpiryPreset::OneMonth => "1M",
            ExpiryPreset::Never => "never",
        }
    }
}

impl fmt::Display for ExpiryPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpiryPreset {
    type Err = PasteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "10m" => Ok(ExpiryPreset::TenMinutes),
            "1h" => Ok(ExpiryPreset::OneHour),
            "1d" => Ok(ExpiryPreset::OneDay),
            "1w" => Ok(ExpiryPreset::OneWeek),
            "1M" => Ok(ExpiryPreset::OneMonth),
            "never" => Ok(ExpiryPreset::Never),
            other => Err(PasteError::InvalidRequest(format!(
                "unknown expiry preset: {}",
                other
            ))),
        }
    }
}

/// When a new paste should expire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    #[default]
    Never,
    /// Relative to creation time
    After(Duration),
    /// Absolute instant, which must lie in the future
    At(UnixMillis),
}

impl Expiry {
    /// Absolute expiry for a paste created at `now`
    pub fn resolve(&self, now: UnixMillis) -> Result<Option<UnixMillis>, PasteError> {
        match *self {
            Expiry::Never => Ok(None),
            Expiry::After(ttl) => {
                let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                Ok(Some(now.saturating_add(millis)))
            }
            Expiry::At(at) if at > now => Ok(Some(at)),
            Expiry::At(_) => Err(PasteError::InvalidRequest(
                "expiresAt must be in the future".into(),
            )),
        }
    }
}

impl From<ExpiryPreset> for Expiry {
    fn from(preset: ExpiryPreset) -> Self {
        match preset.duration() {
            Some(ttl) => Expiry::After(ttl),
            None => Expiry::Never,
        }
    }
}
