use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by the permission administration flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a grant is created.
    PermissionGranted,
    /// Emitted when grants are deactivated for a subject/resource/action.
    PermissionRevoked,
    /// Emitted when a team's default role grants are bootstrapped.
    PermissionDefaultsBootstrapped,
    /// Emitted when a grant's expiry is changed.
    PermissionExpiryExtended,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionGranted => "permission.granted",
            Self::PermissionRevoked => "permission.revoked",
            Self::PermissionDefaultsBootstrapped => "permission.defaults_bootstrapped",
            Self::PermissionExpiryExtended => "permission.expiry_extended",
        }
    }
}
