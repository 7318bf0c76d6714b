//! Domain entities and invariants for the team permission engine.

#![forbid(unsafe_code)]

mod audit;
mod conditions;
mod grant;
mod membership;
mod permission;

pub use audit::AuditAction;
pub use conditions::{ConditionContext, GrantConditions};
pub use grant::{DEFAULT_ROLE_GRANTS, GrantId, PermissionGrant};
pub use membership::{MembershipStatus, TeamMembership};
pub use permission::{Action, ResourceType, Subject};
