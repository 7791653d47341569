//! Access profiles, consumed by the auth gate (§4.K).

use serde::{Deserialize, Serialize};

/// A named permission set assigned to an authenticated client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessProfile {
    pub name: String,
    pub is_admin: bool,
    pub allowed_pages: Vec<String>,
    /// `None` means all grids are allowed.
    pub allowed_grids: Option<Vec<u64>>,
    /// `None` means all scenes are allowed.
    pub allowed_scenes: Option<Vec<u64>>,
    pub can_park: bool,
    pub can_highlight: bool,
    pub can_bypass: bool,
}

impl AccessProfile {
    /// The built-in profile granted by IP whitelist matches and the bootstrap admin
    /// password, with every permission enabled.
    pub fn admin() -> Self {
        Self {
            name: "admin".to_string(),
            is_admin: true,
            allowed_pages: vec![],
            allowed_grids: None,
            allowed_scenes: None,
            can_park: true,
            can_highlight: true,
            can_bypass: true,
        }
    }

    pub fn allows_grid(&self, grid_id: u64) -> bool {
        self.is_admin
            || self
                .allowed_grids
                .as_ref()
                .map(|g| g.contains(&grid_id))
                .unwrap_or(true)
    }

    pub fn allows_scene(&self, scene_id: u64) -> bool {
        self.is_admin
            || self
                .allowed_scenes
                .as_ref()
                .map(|s| s.contains(&scene_id))
                .unwrap_or(true)
    }

    pub fn allows_page(&self, page: &str) -> bool {
        self.is_admin || self.allowed_pages.is_empty() || self.allowed_pages.iter().any(|p| p == page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_profile_allows_everything() {
        let profile = AccessProfile::admin();
        assert!(profile.allows_grid(99));
        assert!(profile.allows_scene(99));
        assert!(profile.allows_page("anything"));
    }

    #[test]
    fn restricted_profile_respects_allow_lists() {
        let profile = AccessProfile {
            name: "operator".into(),
            is_admin: false,
            allowed_pages: vec!["stage".into()],
            allowed_grids: Some(vec![1]),
            allowed_scenes: Some(vec![10]),
            can_park: false,
            can_highlight: false,
            can_bypass: false,
        };
        assert!(profile.allows_grid(1));
        assert!(!profile.allows_grid(2));
        assert!(profile.allows_scene(10));
        assert!(!profile.allows_scene(11));
        assert!(profile.allows_page("stage"));
        assert!(!profile.allows_page("settings"));
    }
}
