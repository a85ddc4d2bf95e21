//! Tenant data injection into workflow templates
//!
//! Templates are engine workflow documents containing `{{TOKEN}}` placeholders inside
//! JSON string literals. Injection works on the serialized text, so every value is
//! JSON-escaped before it is substituted.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use super::WorkflowShape;
use crate::domain::content::GeneratedContent;
use crate::domain::credentials::{CredentialKind, ResolvedCredentials};
use crate::domain::tenant::{EmailProvider, TenantProfile};
use crate::domain::workflow::WorkflowPayload;
use crate::domain::DomainError;

/// Matches any placeholder token: {{TOKEN_NAME}}
static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Z][A-Z0-9_]*)\}\}").expect("valid placeholder regex"));

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Z0-9]+").expect("valid label regex"));

const GMAIL_TEMPLATE: &str = include_str!("../../../templates/gmail.json");
const OUTLOOK_TEMPLATE: &str = include_str!("../../../templates/outlook.json");

/// A parsed, validated workflow template
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    raw: String,
    shape: WorkflowShape,
}

impl WorkflowTemplate {
    pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let payload: WorkflowPayload = serde_json::from_str(&raw)
            .map_err(|e| DomainError::injection(format!("Invalid workflow template: {}", e)))?;
        let shape = WorkflowShape::of(&payload.nodes, &payload.connections);

        Ok(Self { raw, shape })
    }

    pub fn shape(&self) -> &WorkflowShape {
        &self.shape
    }

    /// Distinct placeholder names present in the template
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = PLACEHOLDER_PATTERN
            .captures_iter(&self.raw)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Everything injected into a template for one deployment
#[derive(Debug, Clone, Copy)]
pub struct InjectionContext<'a> {
    pub profile: &'a TenantProfile,
    pub credentials: &'a ResolvedCredentials,
    pub content: &'a GeneratedContent,
}

/// Merges tenant configuration into provider-specific templates
#[derive(Debug, Clone)]
pub struct TemplateInjector {
    templates: HashMap<EmailProvider, WorkflowTemplate>,
}

impl TemplateInjector {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Injector loaded with the templates shipped in `templates/`
    pub fn builtin() -> Result<Self, DomainError> {
        Ok(Self::new()
            .with_template(EmailProvider::Gmail, WorkflowTemplate::parse(GMAIL_TEMPLATE)?)
            .with_template(
                EmailProvider::Outlook,
                WorkflowTemplate::parse(OUTLOOK_TEMPLATE)?,
            ))
    }

    pub fn with_template(mut self, provider: EmailProvider, template: WorkflowTemplate) -> Self {
        self.templates.insert(provider, template);
        self
    }

    pub fn template(&self, provider: EmailProvider) -> Option<&WorkflowTemplate> {
        self.templates.get(&provider)
    }

    /// Produce a deployable payload for the profile's mailbox provider
    pub fn inject(&self, ctx: &InjectionContext<'_>) -> Result<WorkflowPayload, DomainError> {
        let provider = ctx.credentials.mailbox_provider;
        let template = self.template(provider).ok_or_else(|| {
            DomainError::configuration(format!("No workflow template for provider '{}'", provider))
        })?;

        let replacements = build_replacements(ctx);
        let mut unresolved: Vec<String> = Vec::new();

        // Single pass over the template, substituted values are never rescanned
        let text = PLACEHOLDER_PATTERN.replace_all(&template.raw, |caps: &Captures<'_>| {
            let token = &caps[1];
            match replacements.get(token) {
                Some(value) => escape_json_string(value),
                None => {
                    unresolved.push(token.to_string());
                    String::new()
                }
            }
        });

        if !unresolved.is_empty() {
            warn!(
                tenant_id = %ctx.profile.tenant_id(),
                placeholders = ?unresolved,
                "Unresolved template placeholders replaced with empty values"
            );
        }

        let payload: WorkflowPayload = serde_json::from_str(&text).map_err(|e| {
            DomainError::injection(format!("Injected workflow is not valid JSON: {}", e))
        })?;

        let shape = WorkflowShape::of(&payload.nodes, &payload.connections);
        if &shape != template.shape() {
            return Err(DomainError::injection(format!(
                "Injected workflow changed shape: {} nodes / {} sources, expected {} / {}",
                shape.node_count(),
                shape.source_count(),
                template.shape().node_count(),
                template.shape().source_count()
            )));
        }

        debug!(
            tenant_id = %ctx.profile.tenant_id(),
            provider = %provider,
            nodes = payload.node_count(),
            tokens = replacements.len(),
            "Injected workflow template"
        );

        Ok(payload)
    }
}

impl Default for TemplateInjector {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholder token for a label category: "Urgent Requests" -> LABEL_URGENT_REQUESTS
pub fn label_token(category: &str) -> String {
    let upper = category.trim().to_uppercase();
    let normalized = NON_ALPHANUMERIC.replace_all(&upper, "_");
    format!("LABEL_{}", normalized.trim_matches('_'))
}

fn build_replacements(ctx: &InjectionContext<'_>) -> BTreeMap<String, String> {
    let profile = ctx.profile;
    let config = profile.business_config();
    let credentials = ctx.credentials;
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();

    let mut map = BTreeMap::new();
    let mut put = |token: &str, value: String| {
        map.insert(token.to_string(), value);
    };

    put("BUSINESS_NAME", profile.display_name().to_string());
    put("BUSINESS_DOMAIN", opt(&config.email_domain));
    put(
        "BUSINESS_TIMEZONE",
        config.timezone.clone().unwrap_or_else(|| "UTC".to_string()),
    );
    put("BUSINESS_PHONE", opt(&config.phone));
    put("BUSINESS_WEBSITE", opt(&config.website));
    put("BUSINESS_HOURS", opt(&config.business_hours));
    put("SERVICE_AREA", opt(&config.service_area));
    put("RESPONSE_TONE", opt(&config.response_tone));
    put("EMAIL_SIGNATURE", opt(&config.signature));
    put("BUSINESS_TYPES", config.business_types.join(", "));

    put("MANAGER_NAMES", join(profile.managers().iter().map(|c| c.name.as_str()), ", "));
    put("MANAGER_EMAILS", join(profile.managers().iter().map(|c| c.email.as_str()), ","));
    put("SUPPLIER_NAMES", join(profile.suppliers().iter().map(|c| c.name.as_str()), ", "));
    put("SUPPLIER_EMAILS", join(profile.suppliers().iter().map(|c| c.email.as_str()), ","));

    put("TENANT_ID", profile.tenant_id().to_string());
    put("WORKFLOW_NAME", profile.workflow_name());

    put("MAILBOX_CREDENTIAL_ID", credentials.mailbox_id.clone());
    for (token, kind) in [
        ("GMAIL_CREDENTIAL_ID", CredentialKind::Gmail),
        ("OUTLOOK_CREDENTIAL_ID", CredentialKind::Outlook),
        ("OPENAI_CREDENTIAL_ID", CredentialKind::OpenAi),
        ("DATASTORE_CREDENTIAL_ID", CredentialKind::Datastore),
    ] {
        put(token, credentials.id_for(kind).unwrap_or_default().to_string());
    }

    put("CLASSIFIER_PROMPT", ctx.content.classifier_prompt.clone());
    put("REPLY_PROMPT", ctx.content.reply_prompt.clone());

    for (category, label_id) in profile.label_map() {
        put(&label_token(category), label_id.clone());
    }

    map
}

fn join<'a>(values: impl Iterator<Item = &'a str>, separator: &str) -> String {
    values.collect::<Vec<_>>().join(separator)
}

/// Escape a value for embedding inside a JSON string literal
fn escape_json_string(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
