//! Camera and location permission gating
//!
//! Permission denial is a persistent state the user resolves; it is never
//! retried automatically.

use crate::{Error, Result};

/// Capability a screen needs before its pipeline can start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Camera,
    Location,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Camera => write!(f, "camera"),
            Self::Location => write!(f, "location"),
        }
    }
}

/// Grant state reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    Granted,
    /// Denied, but the platform will still show the request dialog
    #[default]
    Denied,
    /// Denied with "don't ask again"; only the settings screen can grant it
    PermanentlyDenied,
}

/// What the UI must offer the user for a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAction {
    None,
    /// Show a "request permissions" button
    Request,
    /// Show a "grant permissions in settings" button
    OpenSettings,
}

impl PermissionState {
    /// UI action required to move towards `Granted`
    #[must_use]
    pub const fn required_action(self) -> PermissionAction {
        match self {
            Self::Granted => PermissionAction::None,
            Self::Denied => PermissionAction::Request,
            Self::PermanentlyDenied => PermissionAction::OpenSettings,
        }
    }
}

/// Parses `granted`, `denied` or `permanently-denied`
impl std::str::FromStr for PermissionState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "granted" | "true" | "1" => Ok(Self::Granted),
            "denied" | "false" | "0" => Ok(Self::Denied),
            "permanently-denied" | "permanently_denied" | "revoked" => Ok(Self::PermanentlyDenied),
            other => Err(format!("unknown permission state `{other}`")),
        }
    }
}

/// Fail unless `state` is granted
///
/// # Errors
///
/// Returns `Error::Permission` naming the missing capability
pub fn ensure_granted(permission: Permission, state: PermissionState) -> Result<()> {
    match state {
        PermissionState::Granted => Ok(()),
        other => {
            tracing::warn!(%permission, state = ?other, "permission not granted");
            Err(Error::Permission(permission.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_follow_state() {
        assert_eq!(PermissionState::Granted.required_action(), PermissionAction::None);
        assert_eq!(PermissionState::Denied.required_action(), PermissionAction::Request);
        assert_eq!(
            PermissionState::PermanentlyDenied.required_action(),
            PermissionAction::OpenSettings
        );
    }

    #[test]
    fn parses_state_names() {
        let parse = |s: &str| s.parse::<PermissionState>();
        assert_eq!(parse("granted"), Ok(PermissionState::Granted));
        assert_eq!(parse(" Denied "), Ok(PermissionState::Denied));
        assert_eq!(
            parse("permanently-denied"),
            Ok(PermissionState::PermanentlyDenied)
        );
        assert!(parse("maybe").is_err());
    }

    #[test]
    fn ensure_granted_reports_capability() {
        assert!(ensure_granted(Permission::Camera, PermissionState::Granted).is_ok());
        let err = ensure_granted(Permission::Location, PermissionState::Denied).unwrap_err();
        assert!(err.to_string().contains("location"));
    }
}
