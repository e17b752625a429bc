use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Release tracks, ordered from most to least stable. A node declared on
/// track `t` is visible when the selected track is `t` or less stable.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseTrack {
    #[default]
    Stable,
    PreRelease,
    Experimental,
}

impl ReleaseTrack {
    pub const ALL: [ReleaseTrack; 3] = [
        ReleaseTrack::Stable,
        ReleaseTrack::PreRelease,
        ReleaseTrack::Experimental,
    ];

    /// Command-line token selecting this track; stable has none.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            ReleaseTrack::Stable => None,
            ReleaseTrack::PreRelease => Some("pre-release"),
            ReleaseTrack::Experimental => Some("experimental"),
        }
    }

    pub fn from_prefix(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.prefix() == Some(token))
    }

    /// Whether a node declared on `node_track` is visible on this track.
    pub fn admits(self, node_track: ReleaseTrack) -> bool {
        node_track <= self
    }
}

impl fmt::Display for ReleaseTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().unwrap_or("stable"))
    }
}

impl FromStr for ReleaseTrack {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" | "" => Ok(ReleaseTrack::Stable),
            other => Self::from_prefix(other).ok_or_else(|| format!("unknown release track: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_ordering_gates_visibility() {
        assert!(ReleaseTrack::Stable.admits(ReleaseTrack::Stable));
        assert!(!ReleaseTrack::Stable.admits(ReleaseTrack::PreRelease));
        assert!(ReleaseTrack::PreRelease.admits(ReleaseTrack::Stable));
        assert!(!ReleaseTrack::PreRelease.admits(ReleaseTrack::Experimental));
        assert!(ReleaseTrack::Experimental.admits(ReleaseTrack::PreRelease));
    }

    #[test]
    fn test_prefix_roundtrip() {
        assert_eq!(ReleaseTrack::from_prefix("pre-release"), Some(ReleaseTrack::PreRelease));
        assert_eq!(ReleaseTrack::from_prefix("experimental"), Some(ReleaseTrack::Experimental));
        assert_eq!(ReleaseTrack::from_prefix("stable"), None);
        assert_eq!("stable".parse::<ReleaseTrack>().unwrap(), ReleaseTrack::Stable);
        assert!("beta".parse::<ReleaseTrack>().is_err());
    }
}
