//! Tenant domain - read-only business profile snapshots

mod entity;
mod repository;

pub use entity::{BusinessConfig, Contact, EmailProvider, TenantProfile, TenantTag};
pub use repository::TenantProfileRepository;
