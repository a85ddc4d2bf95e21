//! Credentials owned by the remote engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tenant::EmailProvider;

/// Kinds of credential a tenant pipeline binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Gmail,
    Outlook,
    OpenAi,
    Datastore,
}

impl CredentialKind {
    pub const ALL: [CredentialKind; 4] = [
        CredentialKind::Gmail,
        CredentialKind::Outlook,
        CredentialKind::OpenAi,
        CredentialKind::Datastore,
    ];

    /// Credential type identifier understood by the remote engine
    pub fn engine_type(&self) -> &'static str {
        match self {
            Self::Gmail => "gmailOAuth2",
            Self::Outlook => "microsoftOutlookOAuth2Api",
            Self::OpenAi => "openAiApi",
            Self::Datastore => "supabaseApi",
        }
    }

    pub fn from_engine_type(engine_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.engine_type() == engine_type)
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            Self::Gmail => "Gmail",
            Self::Outlook => "Outlook",
            Self::OpenAi => "OpenAI",
            Self::Datastore => "Datastore",
        }
    }

    pub fn for_mailbox(provider: EmailProvider) -> Self {
        match provider {
            EmailProvider::Gmail => Self::Gmail,
            EmailProvider::Outlook => Self::Outlook,
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::Gmail => "gmail",
            Self::Outlook => "outlook",
            Self::OpenAi => "openai",
            Self::Datastore => "datastore",
        };
        write!(f, "{}", value)
    }
}

/// Credential metadata as reported by the remote engine. Secret data is write-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCredential {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl RemoteCredential {
    pub fn kind(&self) -> Option<CredentialKind> {
        CredentialKind::from_engine_type(&self.credential_type)
    }
}

/// Body for creating a credential in the remote engine
#[derive(Debug, Clone, Serialize)]
pub struct CreateCredentialRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub data: serde_json::Value,
}

impl CreateCredentialRequest {
    pub fn new(name: impl Into<String>, kind: CredentialKind, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            credential_type: kind.engine_type().to_string(),
            data,
        }
    }
}
