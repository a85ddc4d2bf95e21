use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::content::{ContentGenerator, GeneratedContent, LabelProvisioner};
use crate::domain::integration::Integration;
use crate::domain::tenant::TenantProfile;
use crate::domain::DomainError;

/// Matches `${var:name}` and `${var:name:default}`
static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{var:([a-z][a-z0-9_]*)(?::([^}]*))?\}").expect("valid variable regex")
});

const DEFAULT_CATEGORIES: [&str; 4] = ["Urgent", "Sales", "Support", "Suppliers"];

const CLASSIFIER_TEMPLATE: &str = "You triage incoming email for ${var:business_name}, \
a ${var:business_types:local service business} serving ${var:service_area:its customers}.\n\
Classify each message into exactly one of these categories: ${var:categories}.\n\
Messages from these suppliers belong to Suppliers: ${var:suppliers:none}.\n\
Reply with the category name only.";

const REPLY_TEMPLATE: &str = "You draft replies on behalf of ${var:business_name}.\n\
Write in a ${var:response_tone:friendly and professional} tone.\n\
Business hours: ${var:business_hours:not specified}. Phone: ${var:phone:not listed}. \
Website: ${var:website:not listed}.\n\
Never promise prices or dates; escalate those to ${var:managers:the team}.\n\
End every reply with:\n${var:signature}";

/// Substitutes variables, falling back to the inline default or "" when a value is
/// missing or blank
fn render(template: &str, values: &HashMap<&str, String>) -> String {
    VARIABLE_PATTERN
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            values
                .get(name)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .or_else(|| caps.get(2).map(|d| d.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Deterministic prompt text built from the tenant's business configuration.
///
/// Lets the service run end to end without an LLM-backed generator.
#[derive(Debug, Default)]
pub struct TemplateContentGenerator;

impl TemplateContentGenerator {
    pub fn new() -> Self {
        Self
    }

    fn values(profile: &TenantProfile) -> HashMap<&'static str, String> {
        let config = profile.business_config();
        let optional = |value: &Option<String>| value.clone().unwrap_or_default();

        let categories = if profile.label_map().is_empty() {
            DEFAULT_CATEGORIES.join(", ")
        } else {
            profile
                .label_map()
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };

        let names = |contacts: &[crate::domain::tenant::Contact]| {
            contacts
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        HashMap::from([
            ("business_name", profile.display_name().to_string()),
            ("business_types", config.business_types.join(", ")),
            ("service_area", optional(&config.service_area)),
            ("response_tone", optional(&config.response_tone)),
            ("business_hours", optional(&config.business_hours)),
            ("phone", optional(&config.phone)),
            ("website", optional(&config.website)),
            (
                "signature",
                config
                    .signature
                    .clone()
                    .unwrap_or_else(|| profile.display_name().to_string()),
            ),
            ("categories", categories),
            ("suppliers", names(profile.suppliers())),
            ("managers", names(profile.managers())),
        ])
    }
}

#[async_trait]
impl ContentGenerator for TemplateContentGenerator {
    async fn generate(&self, profile: &TenantProfile) -> Result<GeneratedContent, DomainError> {
        let values = Self::values(profile);
        let classifier_prompt = render(CLASSIFIER_TEMPLATE, &values);
        let reply_prompt = render(REPLY_TEMPLATE, &values);

        debug!(tenant_id = %profile.tenant_id(), "Generated workflow prompts");

        Ok(GeneratedContent {
            classifier_prompt,
            reply_prompt,
        })
    }
}

/// Label provisioner that leaves the mailbox untouched
#[derive(Debug, Default)]
pub struct NoopLabelProvisioner;

#[async_trait]
impl LabelProvisioner for NoopLabelProvisioner {
    async fn provision(
        &self,
        profile: &TenantProfile,
        integration: &Integration,
    ) -> Result<(), DomainError> {
        debug!(
            tenant_id = %profile.tenant_id(),
            provider = %integration.provider,
            labels = profile.label_map().len(),
            "Label provisioning disabled"
        );
        Ok(())
    }
}
