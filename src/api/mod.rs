//! API layer - HTTP endpoints and middleware

pub mod deploy;
pub mod health;
pub mod middleware;
pub mod router;
pub mod state;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use router::create_router;
pub use state::AppState;
