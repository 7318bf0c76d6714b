//! Infrastructure adapters for the permission engine ports.

#![forbid(unsafe_code)]

mod in_memory_audit_log;
mod in_memory_grant_store;
mod in_memory_membership_directory;
mod postgres_audit_repository;
mod postgres_grant_store;
mod postgres_membership_directory;

pub use in_memory_audit_log::InMemoryAuditLog;
pub use in_memory_grant_store::InMemoryGrantStore;
pub use in_memory_membership_directory::InMemoryMembershipDirectory;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_grant_store::PostgresGrantStore;
pub use postgres_membership_directory::PostgresMembershipDirectory;
