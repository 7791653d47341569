//! Auth/permission gate (§4.K): login, IP-whitelist auto-auth, and per-action checks.

pub mod token;
pub mod whitelist;

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::error::DmxxError;
use crate::model::profile::AccessProfile;

pub use token::{issue_token, verify_token, TokenClaims};
pub use whitelist::{find_match, password_matches, WhitelistRule};

/// Default token lifetime.
const TOKEN_LIFETIME_SECS: u64 = 24 * 60 * 60;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Result of a successful login or IP-whitelist auto-auth.
pub struct AuthGrant {
    pub token: String,
    pub profile: AccessProfile,
}

/// Validates a login password against `config` and issues a signed token.
pub fn login(
    config: &Config,
    password: &str,
    client_fingerprint: &str,
    profile: AccessProfile,
) -> Result<AuthGrant, DmxxError> {
    if !password_matches(password, &config.password) {
        return Err(DmxxError::AuthFailed("invalid password".to_string()));
    }
    let claims = TokenClaims {
        profile_name: profile.name.clone(),
        expiry: unix_now() + TOKEN_LIFETIME_SECS,
        client_fingerprint: client_fingerprint.to_string(),
    };
    let token = issue_token(&claims, config.secret_key.as_bytes())?;
    Ok(AuthGrant { token, profile })
}

/// Verifies a bearer token against `config`'s secret key.
pub fn authenticate_token(config: &Config, token: &str) -> Result<TokenClaims, DmxxError> {
    verify_token(token, config.secret_key.as_bytes(), unix_now())
}

/// Looks up whether `remote_ip` auto-authenticates via the IP whitelist, resolving its
/// rule's configured profile name against `profiles`.
pub fn whitelist_auto_auth<'a>(
    config: &Config,
    remote_ip: IpAddr,
    profiles: &'a [AccessProfile],
) -> Option<&'a AccessProfile> {
    let IpAddr::V4(ipv4) = remote_ip else {
        return None;
    };
    let rule = find_match(&config.ip_whitelist, ipv4)?;
    profiles.iter().find(|p| p.name == rule.profile)
}

/// Actions gated by [`AccessProfile`] permission flags, beyond the grid/scene/page
/// allow-lists checked directly against the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedAction {
    Park,
    Highlight,
    InputBypass,
}

/// Checks whether `profile` is permitted to perform `action`.
pub fn check_permission(profile: &AccessProfile, action: GatedAction) -> Result<(), DmxxError> {
    let allowed = match action {
        GatedAction::Park => profile.can_park,
        GatedAction::Highlight => profile.can_highlight,
        GatedAction::InputBypass => profile.can_bypass,
    };
    if allowed || profile.is_admin {
        Ok(())
    } else {
        Err(DmxxError::PermissionDenied(format!("{action:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            password: "hunter2".to_string(),
            secret_key: "shh".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn login_with_correct_password_succeeds() {
        let grant = login(&test_config(), "hunter2", "fp", AccessProfile::admin()).unwrap();
        assert!(!grant.token.is_empty());
    }

    #[test]
    fn login_with_wrong_password_fails() {
        assert!(login(&test_config(), "nope", "fp", AccessProfile::admin()).is_err());
    }

    #[test]
    fn issued_token_authenticates() {
        let config = test_config();
        let grant = login(&config, "hunter2", "fp", AccessProfile::admin()).unwrap();
        let claims = authenticate_token(&config, &grant.token).unwrap();
        assert_eq!(claims.profile_name, "admin");
    }

    #[test]
    fn permission_denied_for_profile_without_can_park() {
        let profile = AccessProfile {
            name: "viewer".into(),
            is_admin: false,
            allowed_pages: vec![],
            allowed_grids: None,
            allowed_scenes: None,
            can_park: false,
            can_highlight: false,
            can_bypass: false,
        };
        assert!(check_permission(&profile, GatedAction::Park).is_err());
    }

    #[test]
    fn admin_bypasses_permission_flags() {
        let profile = AccessProfile {
            name: "admin".into(),
            is_admin: true,
            allowed_pages: vec![],
            allowed_grids: None,
            allowed_scenes: None,
            can_park: false,
            can_highlight: false,
            can_bypass: false,
        };
        assert!(check_permission(&profile, GatedAction::Park).is_ok());
    }
}
