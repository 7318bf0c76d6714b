//! Application services and ports for the team permission engine.

#![forbid(unsafe_code)]

mod grant_ports;
mod permission_admin_service;
mod permission_resolver;
mod role_resolver;

pub use grant_ports::{AuditEvent, AuditRepository, GrantStore, MembershipDirectory};
pub use permission_admin_service::{GrantInput, PermissionAdministrator};
pub use permission_resolver::{PermissionResolver, PermissionSummary};
pub use role_resolver::RoleResolver;
