use serde::Serialize;

use super::CredentialKind;
use crate::domain::tenant::EmailProvider;

/// Remote credential ids bound to one deployment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCredentials {
    pub mailbox_provider: EmailProvider,
    pub mailbox_id: String,
    pub llm_id: String,
    pub datastore_id: Option<String>,
    /// Kinds created during this resolution
    pub created: Vec<CredentialKind>,
}

impl ResolvedCredentials {
    pub fn id_for(&self, kind: CredentialKind) -> Option<&str> {
        match kind {
            CredentialKind::Gmail | CredentialKind::Outlook => {
                (CredentialKind::for_mailbox(self.mailbox_provider) == kind)
                    .then_some(self.mailbox_id.as_str())
            }
            CredentialKind::OpenAi => Some(&self.llm_id),
            CredentialKind::Datastore => self.datastore_id.as_deref(),
        }
    }
}
