//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Default ceiling on the number of clip names a project table may hold.
pub const DEFAULT_ANIMATION_LIMIT: u32 = 16384;

/// Configuration read once at process start.
/// Missing fields fall back to [`Config::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fixed size of an augmented clip table (original plus injected clips).
    pub animation_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            animation_limit: DEFAULT_ANIMATION_LIMIT,
        }
    }
}

impl Config {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Apply a raw `AnimationLimit` setting. Negative values are ignored and
    /// values beyond `u32::MAX` saturate. Returns whether the limit changed.
    pub fn apply_animation_limit(&mut self, raw: i64) -> bool {
        if raw < 0 {
            return false;
        }
        self.animation_limit = u32::try_from(raw).unwrap_or(u32::MAX);
        log::info!("  > AnimationLimit  =  {}", self.animation_limit);
        true
    }
}
