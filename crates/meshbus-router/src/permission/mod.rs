//! Transport permission policy: the permission database and the filter
//! consulted on every transport-selection decision.

pub mod db;
pub mod filter;

pub use db::PermissionDb;
pub use filter::TransportPermission;
