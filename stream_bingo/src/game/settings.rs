//! Game settings attached to a game name.
//!
//! Settings survive restarts: they are keyed by the game name rather than the
//! session instance, so a fresh session picks up the previous configuration.

use serde::{Deserialize, Serialize};

/// Lower bound on the auto-call interval, in seconds
pub const MIN_AUTO_CALL_SECS: u32 = 20;

/// Upper bound on the auto-call interval, in seconds
pub const MAX_AUTO_CALL_SECS: u32 = 600;

/// Host-configurable settings for a game name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Whether numbers are called automatically
    pub auto_call_enabled: bool,

    /// Seconds between automatic calls, clamped to 20..=600
    pub auto_call_interval: u32,

    /// Whether an ended game restarts automatically
    pub auto_restart_enabled: bool,

    /// Seconds from game end to automatic restart
    pub auto_restart_interval: u32,

    /// Whether the game ends automatically after the final call
    pub auto_end_enabled: bool,

    /// Seconds from pool exhaustion to automatic end
    pub auto_end_interval: u32,

    /// Whether called numbers are read aloud on the host display
    pub tts_enabled: bool,

    /// Voice identifier for text-to-speech
    pub tts_voice: Option<String>,

    /// Background choice for the host display
    pub background: Option<String>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            auto_call_enabled: false,
            auto_call_interval: 30,
            auto_restart_enabled: false,
            auto_restart_interval: 120,
            auto_end_enabled: false,
            auto_end_interval: 30,
            tts_enabled: false,
            tts_voice: None,
            background: None,
        }
    }
}

/// A partial settings update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameSettingsPatch {
    pub auto_call_enabled: Option<bool>,
    pub auto_call_interval: Option<u32>,
    pub auto_restart_enabled: Option<bool>,
    pub auto_restart_interval: Option<u32>,
    pub auto_end_enabled: Option<bool>,
    pub auto_end_interval: Option<u32>,
    pub tts_enabled: Option<bool>,
    pub tts_voice: Option<String>,
    pub background: Option<String>,
}

impl GameSettings {
    /// Merge a partial update, clamping the auto-call interval to its bounds
    pub fn merge(&mut self, patch: GameSettingsPatch) {
        if let Some(enabled) = patch.auto_call_enabled {
            self.auto_call_enabled = enabled;
        }
        if let Some(interval) = patch.auto_call_interval {
            self.auto_call_interval = interval.clamp(MIN_AUTO_CALL_SECS, MAX_AUTO_CALL_SECS);
        }
        if let Some(enabled) = patch.auto_restart_enabled {
            self.auto_restart_enabled = enabled;
        }
        if let Some(interval) = patch.auto_restart_interval {
            self.auto_restart_interval = interval;
        }
        if let Some(enabled) = patch.auto_end_enabled {
            self.auto_end_enabled = enabled;
        }
        if let Some(interval) = patch.auto_end_interval {
            self.auto_end_interval = interval;
        }
        if let Some(enabled) = patch.tts_enabled {
            self.tts_enabled = enabled;
        }
        if let Some(voice) = patch.tts_voice {
            self.tts_voice = Some(voice);
        }
        if let Some(background) = patch.background {
            self.background = Some(background);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_leaves_absent_fields_untouched() {
        let mut settings = GameSettings::default();
        settings.merge(GameSettingsPatch {
            auto_call_enabled: Some(true),
            ..Default::default()
        });

        assert!(settings.auto_call_enabled);
        assert_eq!(settings.auto_call_interval, 30);
        assert!(!settings.auto_restart_enabled);
    }

    #[test]
    fn test_merge_clamps_auto_call_interval() {
        let mut settings = GameSettings::default();

        settings.merge(GameSettingsPatch {
            auto_call_interval: Some(5),
            ..Default::default()
        });
        assert_eq!(settings.auto_call_interval, MIN_AUTO_CALL_SECS);

        settings.merge(GameSettingsPatch {
            auto_call_interval: Some(10_000),
            ..Default::default()
        });
        assert_eq!(settings.auto_call_interval, MAX_AUTO_CALL_SECS);

        settings.merge(GameSettingsPatch {
            auto_call_interval: Some(45),
            ..Default::default()
        });
        assert_eq!(settings.auto_call_interval, 45);
    }
}
