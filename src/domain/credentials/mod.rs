//! Credential domain - remote engine credentials and the per-tenant id mapping

mod mapping;
mod remote;
mod resolved;

pub use mapping::{CredentialMapping, CredentialMappingRepository};
pub use remote::{CreateCredentialRequest, CredentialKind, RemoteCredential};
pub use resolved::ResolvedCredentials;
