//! Tenant profile snapshot consumed by the provisioning engine

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Mailbox provider a tenant connects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    #[serde(alias = "mailboxA")]
    Gmail,
    #[serde(alias = "mailboxB")]
    Outlook,
}

impl EmailProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Outlook => "outlook",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "gmail" | "mailboxA" => Ok(Self::Gmail),
            "outlook" | "mailboxB" => Ok(Self::Outlook),
            other => Err(DomainError::validation(format!(
                "Unknown email provider '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for EmailProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Business configuration owned by the surrounding application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessConfig {
    pub business_name: String,
    pub business_types: Vec<String>,
    pub email_domain: Option<String>,
    pub timezone: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub service_area: Option<String>,
    pub response_tone: Option<String>,
    pub signature: Option<String>,
    pub business_hours: Option<String>,
}

/// A manager or supplier contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Contact {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Immutable per-request snapshot of a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantProfile {
    tenant_id: String,
    business_config: BusinessConfig,
    #[serde(default)]
    managers: Vec<Contact>,
    #[serde(default)]
    suppliers: Vec<Contact>,
    /// Category name to remote label id
    #[serde(default)]
    label_map: BTreeMap<String, String>,
    provider_in_use: EmailProvider,
}

impl TenantProfile {
    pub fn new(
        tenant_id: impl Into<String>,
        business_config: BusinessConfig,
        provider_in_use: EmailProvider,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            business_config,
            managers: Vec::new(),
            suppliers: Vec::new(),
            label_map: BTreeMap::new(),
            provider_in_use,
        }
    }

    pub fn with_managers(mut self, managers: Vec<Contact>) -> Self {
        self.managers = managers;
        self
    }

    pub fn with_suppliers(mut self, suppliers: Vec<Contact>) -> Self {
        self.suppliers = suppliers;
        self
    }

    pub fn with_label(mut self, category: impl Into<String>, label_id: impl Into<String>) -> Self {
        self.label_map.insert(category.into(), label_id.into());
        self
    }

    pub fn with_label_map(mut self, label_map: BTreeMap<String, String>) -> Self {
        self.label_map = label_map;
        self
    }

    /// Same profile bound to a different mailbox provider
    pub fn with_provider(mut self, provider: EmailProvider) -> Self {
        self.provider_in_use = provider;
        self
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn business_config(&self) -> &BusinessConfig {
        &self.business_config
    }

    pub fn business_name(&self) -> &str {
        &self.business_config.business_name
    }

    pub fn managers(&self) -> &[Contact] {
        &self.managers
    }

    pub fn suppliers(&self) -> &[Contact] {
        &self.suppliers
    }

    pub fn label_map(&self) -> &BTreeMap<String, String> {
        &self.label_map
    }

    pub fn provider_in_use(&self) -> EmailProvider {
        self.provider_in_use
    }

    pub fn tag(&self) -> TenantTag {
        TenantTag::for_tenant(&self.tenant_id)
    }

    /// Display name used for remote objects, falls back to the tenant id
    pub fn display_name(&self) -> &str {
        let name = self.business_config.business_name.trim();

        if name.is_empty() {
            &self.tenant_id
        } else {
            name
        }
    }

    pub fn workflow_name(&self) -> String {
        format!("{} Automation {}", self.display_name(), self.tag())
    }
}

/// Deterministic marker embedded in the name of every remote object owned by a tenant.
///
/// Built from the whole tenant id so distinct tenants never share a tag. Bracket and
/// percent characters are escaped, so a tag can only appear inside another tenant's
/// tag when the ids are equal. Remote lookups match on `name.contains(tag)`, so renaming
/// the business does not orphan previously created workflows or credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantTag(String);

impl TenantTag {
    pub fn for_tenant(tenant_id: &str) -> Self {
        let mut tag = String::with_capacity(tenant_id.len() + 2);
        tag.push('[');
        for c in tenant_id.trim().chars() {
            match c {
                '%' => tag.push_str("%25"),
                '[' => tag.push_str("%5B"),
                ']' => tag.push_str("%5D"),
                other => tag.push(other),
            }
        }
        tag.push(']');

        Self(tag)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, name: &str) -> bool {
        name.contains(&self.0)
    }
}

impl std::fmt::Display for TenantTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> TenantProfile {
        TenantProfile::new(
            "3f2a9c1e-77aa-4c1b-9e0d-5b6c7d8e9f00",
            BusinessConfig {
                business_name: "Acme Pools".to_string(),
                ..Default::default()
            },
            EmailProvider::Gmail,
        )
    }

    #[test]
    fn test_tag_uses_whole_tenant_id() {
        let tag = TenantTag::for_tenant("3f2a9c1e-77aa-4c1b");
        assert_eq!(tag.as_str(), "[3f2a9c1e-77aa-4c1b]");
    }

    #[test]
    fn test_ids_sharing_a_prefix_get_distinct_tags() {
        let first = TenantTag::for_tenant("tenant-0001");
        let second = TenantTag::for_tenant("tenant-0002");
        let uuid_a = TenantTag::for_tenant("3f2a9c1e-77aa-4c1b-9e0d-5b6c7d8e9f00");
        let uuid_b = TenantTag::for_tenant("3f2a9c1e-77aa-4c1b-9e0d-5b6c7d8e9f01");

        assert_ne!(first, second);
        assert_ne!(uuid_a, uuid_b);
        assert!(!first.matches("Beta Roofing Automation [tenant-0002]"));
        assert!(!TenantTag::for_tenant("tenant-1").matches("Acme Automation [tenant-10]"));
    }

    #[test]
    fn test_brackets_in_tenant_id_are_escaped() {
        let tag = TenantTag::for_tenant("a]b[c%");
        assert_eq!(tag.as_str(), "[a%5Db%5Bc%25]");

        // "b" must not match inside the tag of "a] [b"
        let nested = TenantTag::for_tenant("a] [b");
        assert!(!TenantTag::for_tenant("b").matches(nested.as_str()));
    }

    #[test]
    fn test_tag_matching() {
        let profile = profile();
        let tag = profile.tag();

        assert!(tag.matches(&profile.workflow_name()));
        assert!(tag.matches("Old Name Automation [3f2a9c1e-77aa-4c1b-9e0d-5b6c7d8e9f00]"));
        assert!(!tag.matches("Other Automation [3f2a9c1e]"));
    }

    #[test]
    fn test_workflow_name() {
        assert_eq!(
            profile().workflow_name(),
            "Acme Pools Automation [3f2a9c1e-77aa-4c1b-9e0d-5b6c7d8e9f00]"
        );
    }

    #[test]
    fn test_display_name_falls_back_to_tenant_id() {
        let profile = TenantProfile::new("tenant-1", BusinessConfig::default(), EmailProvider::Gmail);
        assert_eq!(profile.display_name(), "tenant-1");
    }

    #[test]
    fn test_email_provider_aliases() {
        assert_eq!(EmailProvider::parse("mailboxA").unwrap(), EmailProvider::Gmail);
        assert_eq!(EmailProvider::parse("outlook").unwrap(), EmailProvider::Outlook);
        assert!(EmailProvider::parse("yahoo").is_err());

        let parsed: EmailProvider = serde_json::from_str("\"mailboxB\"").unwrap();
        assert_eq!(parsed, EmailProvider::Outlook);
    }
}
