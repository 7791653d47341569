//! Per-channel source attribution.
//!
//! Attribution is carried as a small tag struct alongside each channel rather than a
//! parallel string map, so tagging a whole universe costs 512 small copies instead of
//! 512 heap allocations.

use serde::Serialize;

/// Discriminant for [`SourceTag`]; kept as a plain `u8` so the tag is `Copy` and cheap
/// to store per-channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum SourceKind {
    Unknown = 0,
    Input = 1,
    User = 2,
    Scene = 3,
    Park = 4,
    Group = 5,
}

/// Attribution for a single channel's currently-effective value.
///
/// `payload` holds a kind-dependent numeric id (client id, scene id, group id) and is
/// unused for `Unknown`/`Input`/`Park`. Attribution is advisory only: it must never
/// influence the numeric output, only what clients are told produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTag {
    pub kind: SourceKind,
    pub payload: u32,
}

impl SourceTag {
    pub const UNKNOWN: SourceTag = SourceTag {
        kind: SourceKind::Unknown,
        payload: 0,
    };

    pub const INPUT: SourceTag = SourceTag {
        kind: SourceKind::Input,
        payload: 0,
    };

    pub const PARK: SourceTag = SourceTag {
        kind: SourceKind::Park,
        payload: 0,
    };

    pub fn user(client_id: u32) -> Self {
        Self {
            kind: SourceKind::User,
            payload: client_id,
        }
    }

    pub fn scene(scene_id: u32) -> Self {
        Self {
            kind: SourceKind::Scene,
            payload: scene_id,
        }
    }

    pub fn group(group_id: u32) -> Self {
        Self {
            kind: SourceKind::Group,
            payload: group_id,
        }
    }

    /// Renders the wire-level attribution string used in `source` fields, e.g.
    /// `user:42`, `scene:7`, `park`, `input`, `group:3`, `unknown`.
    pub fn to_wire_string(&self) -> String {
        match self.kind {
            SourceKind::Unknown => "unknown".to_string(),
            SourceKind::Input => "input".to_string(),
            SourceKind::Park => "park".to_string(),
            SourceKind::User => format!("user:{}", self.payload),
            SourceKind::Scene => format!("scene:{}", self.payload),
            SourceKind::Group => format!("group:{}", self.payload),
        }
    }
}

impl Default for SourceTag {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_match_the_documented_formats() {
        assert_eq!(SourceTag::UNKNOWN.to_wire_string(), "unknown");
        assert_eq!(SourceTag::INPUT.to_wire_string(), "input");
        assert_eq!(SourceTag::PARK.to_wire_string(), "park");
        assert_eq!(SourceTag::user(42).to_wire_string(), "user:42");
        assert_eq!(SourceTag::scene(7).to_wire_string(), "scene:7");
        assert_eq!(SourceTag::group(3).to_wire_string(), "group:3");
    }
}
