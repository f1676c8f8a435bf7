//! Stream quality tiers and the profile lists they request.

use nexus_protocol::messages::{ProfileNotFoundAction, StartPlayback, StreamProfile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality tier requested by the caller.
///
/// Each tier names one primary video profile and falls back only to
/// profiles of lower bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl StreamQuality {
    /// Primary profile for this tier.
    #[must_use]
    pub const fn primary(self) -> StreamProfile {
        match self {
            Self::Low => StreamProfile::VideoH264100kbitL30,
            Self::Medium => StreamProfile::VideoH264530kbitL31,
            Self::High => StreamProfile::VideoH2642mbitL40,
        }
    }

    /// Acceptable fallbacks, best first.
    #[must_use]
    pub const fn fallbacks(self) -> &'static [StreamProfile] {
        match self {
            Self::Low => &[StreamProfile::VideoH26450kbitL12],
            Self::Medium => &[StreamProfile::VideoH264100kbitL30],
            Self::High => &[
                StreamProfile::VideoH264530kbitL31,
                StreamProfile::VideoH264100kbitL30,
            ],
        }
    }

    /// Build the `StartPlayback` request for this tier.
    ///
    /// The AAC audio profile is appended to the fallbacks when `with_audio`
    /// is set.
    #[must_use]
    pub fn start_playback(self, session_id: u32, with_audio: bool) -> StartPlayback {
        let mut other_profiles: Vec<i32> = self.fallbacks().iter().map(|p| *p as i32).collect();
        if with_audio {
            other_profiles.push(StreamProfile::AudioAac as i32);
        }

        StartPlayback {
            session_id,
            profile: Some(self.primary() as i32),
            start_time: 0,
            other_profiles,
            profile_not_found_action: Some(ProfileNotFoundAction::Redirect as i32),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for StreamQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown stream quality '{other}'")),
        }
    }
}
