//! Tenant profile storage

mod in_memory;
mod postgres;

pub use in_memory::InMemoryTenantProfileRepository;
pub use postgres::PostgresTenantProfileRepository;
