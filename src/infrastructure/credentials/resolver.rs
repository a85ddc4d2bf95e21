//! Resolves the remote credentials a tenant workflow binds, creating them on demand

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use metrics::counter;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::KeyPool;
use crate::domain::credentials::{
    CreateCredentialRequest, CredentialKind, CredentialMapping, CredentialMappingRepository,
    RemoteCredential, ResolvedCredentials,
};
use crate::domain::integration::{IntegrationRepository, TokenRefresher};
use crate::domain::tenant::{EmailProvider, TenantProfile};
use crate::domain::{DomainError, WorkflowEngine};
use crate::infrastructure::integration::OAuthClientConfig;

/// Shared datastore the tenant pipelines log into
#[derive(Debug, Clone)]
pub struct DatastoreSettings {
    pub url: String,
    pub service_key: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResolverSettings {
    pub gmail_oauth: OAuthClientConfig,
    pub outlook_oauth: OAuthClientConfig,
    /// Datastore credentials are only provisioned when set
    pub datastore: Option<DatastoreSettings>,
}

/// What the credential listing told us, when the engine supports it
#[derive(Debug, Default)]
struct ListingView {
    survivors: HashMap<CredentialKind, String>,
    known_ids: Option<HashSet<String>>,
}

impl ListingView {
    fn is_orphaned(&self, id: &str) -> bool {
        self.known_ids
            .as_ref()
            .is_some_and(|known| !known.contains(id))
    }
}

/// Ensures each tenant has exactly one usable remote credential per provider.
///
/// Lookups go mapping, integration (mailbox only), name-matched listing, then creation.
/// Every created id is persisted before `resolve` returns.
#[derive(Debug)]
pub struct CredentialResolver {
    engine: Arc<dyn WorkflowEngine>,
    integrations: Arc<dyn IntegrationRepository>,
    mappings: Arc<dyn CredentialMappingRepository>,
    token_refresher: Arc<dyn TokenRefresher>,
    key_pool: KeyPool,
    settings: ResolverSettings,
}

impl CredentialResolver {
    pub fn new(
        engine: Arc<dyn WorkflowEngine>,
        integrations: Arc<dyn IntegrationRepository>,
        mappings: Arc<dyn CredentialMappingRepository>,
        token_refresher: Arc<dyn TokenRefresher>,
        key_pool: KeyPool,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            engine,
            integrations,
            mappings,
            token_refresher,
            key_pool,
            settings,
        }
    }

    pub fn key_pool(&self) -> &KeyPool {
        &self.key_pool
    }

    #[instrument(skip_all, fields(tenant_id = %profile.tenant_id(), provider = %profile.provider_in_use()))]
    pub async fn resolve(&self, profile: &TenantProfile) -> Result<ResolvedCredentials, DomainError> {
        let tenant_id = profile.tenant_id();
        let mut mapping = self
            .mappings
            .get(tenant_id)
            .await?
            .unwrap_or_else(|| CredentialMapping::new(tenant_id));

        let (view, changed) = self.deduplicate(profile, &mut mapping).await;
        if changed {
            mapping = self.mappings.upsert(mapping).await?;
        }

        let mut created = Vec::new();

        let mailbox_id = self
            .resolve_mailbox(profile, &mut mapping, &view, &mut created)
            .await?;

        let llm_id = self
            .resolve_shared(profile, CredentialKind::OpenAi, &mut mapping, &view, &mut created)
            .await?;

        let datastore_id = if self.settings.datastore.is_some() {
            Some(
                self.resolve_shared(profile, CredentialKind::Datastore, &mut mapping, &view, &mut created)
                    .await?,
            )
        } else {
            None
        };

        Ok(ResolvedCredentials {
            mailbox_provider: profile.provider_in_use(),
            mailbox_id,
            llm_id,
            datastore_id,
            created,
        })
    }

    /// Best-effort cleanup of duplicated and orphaned credentials.
    ///
    /// Returns the listing view and whether the mapping changed.
    async fn deduplicate(
        &self,
        profile: &TenantProfile,
        mapping: &mut CredentialMapping,
    ) -> (ListingView, bool) {
        let listing = match self.engine.list_credentials().await {
            Ok(listing) => listing,
            Err(e) if e.is_not_supported() => {
                debug!("Engine does not list credentials, skipping deduplication");
                return (ListingView::default(), false);
            }
            Err(e) => {
                warn!(error = %e, "Failed to list credentials, skipping deduplication");
                return (ListingView::default(), false);
            }
        };

        let known_ids: HashSet<String> = listing.iter().map(|c| c.id.clone()).collect();
        let mut changed = false;

        for kind in CredentialKind::ALL {
            let orphaned = mapping
                .get(kind)
                .filter(|id| !known_ids.contains(*id))
                .map(str::to_string);

            if let Some(id) = orphaned {
                warn!(kind = %kind, credential_id = %id, "Mapped credential no longer exists remotely, clearing");
                changed |= mapping.set(kind, None);
            }
        }

        let tag = profile.tag();
        let mut groups: BTreeMap<CredentialKind, Vec<RemoteCredential>> = BTreeMap::new();
        for credential in listing.into_iter().filter(|c| tag.matches(&c.name)) {
            if let Some(kind) = credential.kind() {
                groups.entry(kind).or_default().push(credential);
            }
        }

        let mut survivors = HashMap::new();
        for (kind, mut group) in groups {
            // Newest first; credentials without a creation time sort last
            group.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let survivor = group.remove(0);

            for duplicate in &group {
                match self.engine.delete_credential(&duplicate.id).await {
                    Ok(()) => {
                        info!(kind = %kind, credential_id = %duplicate.id, "Deleted duplicate credential");
                        counter!("credential_duplicates_removed_total", "kind" => kind.to_string())
                            .increment(1);
                    }
                    Err(e) => {
                        warn!(kind = %kind, credential_id = %duplicate.id, error = %e, "Failed to delete duplicate credential");
                    }
                }
            }

            if !group.is_empty() {
                changed |= mapping.set(kind, Some(survivor.id.clone()));
            }

            survivors.insert(kind, survivor.id);
        }

        let view = ListingView {
            survivors,
            known_ids: Some(known_ids),
        };

        (view, changed)
    }

    async fn resolve_mailbox(
        &self,
        profile: &TenantProfile,
        mapping: &mut CredentialMapping,
        view: &ListingView,
        created: &mut Vec<CredentialKind>,
    ) -> Result<String, DomainError> {
        let provider = profile.provider_in_use();
        let kind = CredentialKind::for_mailbox(provider);

        if let Some(id) = mapping.get(kind) {
            debug!(kind = %kind, credential_id = %id, "Using mapped credential");
            return Ok(id.to_string());
        }

        let integration = self
            .integrations
            .get_active(profile.tenant_id(), provider)
            .await?;

        let bound = integration
            .as_ref()
            .and_then(|i| i.remote_credential_id.clone());

        if let Some(id) = bound {
            if view.is_orphaned(&id) {
                warn!(kind = %kind, credential_id = %id, "Integration references a missing credential, ignoring");
            } else {
                debug!(kind = %kind, credential_id = %id, "Backfilling mapping from integration");
                self.remember(mapping, kind, &id).await?;
                return Ok(id);
            }
        }

        if let Some(id) = view.survivors.get(&kind) {
            debug!(kind = %kind, credential_id = %id, "Adopting existing remote credential");
            self.remember(mapping, kind, id).await?;

            if let Some(mut integration) = integration {
                integration.bind_remote_credential(id.as_str());
                self.integrations.save(integration).await?;
            }

            return Ok(id.clone());
        }

        let mut integration = integration.ok_or_else(|| {
            DomainError::configuration(format!(
                "No active {} integration for tenant '{}'",
                provider,
                profile.tenant_id()
            ))
        })?;

        let refresh_token = integration
            .usable_refresh_token()
            .map(str::to_string)
            .ok_or_else(|| {
                DomainError::configuration(format!(
                    "The {} integration for tenant '{}' has no refresh token",
                    provider,
                    profile.tenant_id()
                ))
            })?;

        let mut scope = None;
        match self.token_refresher.refresh(provider, &refresh_token).await {
            Ok(tokens) => {
                integration.apply_refreshed_tokens(&tokens);
                scope = tokens.scope;
                integration = self.integrations.save(integration).await?;
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, using stored tokens");
            }
        }

        let oauth = self.oauth_client(provider);
        let data = json!({
            "clientId": oauth.client_id,
            "clientSecret": oauth.client_secret,
            "oauthTokenData": {
                "access_token": integration.access_token,
                "refresh_token": integration.refresh_token,
                "expires_at": integration.token_expires_at.map(|t| t.timestamp_millis()),
                "scope": scope,
                "token_type": "Bearer",
            },
        });

        let credential = self.create(profile, kind, data).await?;

        integration.bind_remote_credential(credential.id.as_str());
        self.integrations.save(integration).await?;
        self.remember(mapping, kind, &credential.id).await?;
        created.push(kind);

        Ok(credential.id)
    }

    async fn resolve_shared(
        &self,
        profile: &TenantProfile,
        kind: CredentialKind,
        mapping: &mut CredentialMapping,
        view: &ListingView,
        created: &mut Vec<CredentialKind>,
    ) -> Result<String, DomainError> {
        if let Some(id) = mapping.get(kind) {
            debug!(kind = %kind, credential_id = %id, "Using mapped credential");
            return Ok(id.to_string());
        }

        if let Some(id) = view.survivors.get(&kind) {
            debug!(kind = %kind, credential_id = %id, "Adopting existing remote credential");
            self.remember(mapping, kind, id).await?;
            return Ok(id.clone());
        }

        let data = self.shared_credential_data(kind)?;
        let credential = self.create(profile, kind, data).await?;

        self.remember(mapping, kind, &credential.id).await?;
        created.push(kind);

        Ok(credential.id)
    }

    async fn create(
        &self,
        profile: &TenantProfile,
        kind: CredentialKind,
        data: Value,
    ) -> Result<RemoteCredential, DomainError> {
        let name = format!(
            "{} {} {}",
            profile.display_name(),
            kind.display_label(),
            profile.tag()
        );

        let credential = self
            .engine
            .create_credential(&CreateCredentialRequest::new(name, kind, data))
            .await?;

        info!(kind = %kind, credential_id = %credential.id, "Created remote credential");
        counter!("credentials_created_total", "kind" => kind.to_string()).increment(1);

        Ok(credential)
    }

    /// Persist an id into the mapping when it changed
    async fn remember(
        &self,
        mapping: &mut CredentialMapping,
        kind: CredentialKind,
        id: &str,
    ) -> Result<(), DomainError> {
        if mapping.set(kind, Some(id.to_string())) {
            *mapping = self.mappings.upsert(mapping.clone()).await?;
        }
        Ok(())
    }

    fn shared_credential_data(&self, kind: CredentialKind) -> Result<Value, DomainError> {
        match kind {
            CredentialKind::OpenAi => Ok(json!({ "apiKey": self.key_pool.next_key()? })),
            CredentialKind::Datastore => {
                let datastore = self.settings.datastore.as_ref().ok_or_else(|| {
                    DomainError::configuration("Shared datastore is not configured")
                })?;

                Ok(json!({
                    "host": datastore.url,
                    "serviceRole": datastore.service_key,
                }))
            }
            other => Err(DomainError::internal(format!(
                "{} is not a shared credential",
                other
            ))),
        }
    }

    fn oauth_client(&self, provider: EmailProvider) -> &OAuthClientConfig {
        match provider {
            EmailProvider::Gmail => &self.settings.gmail_oauth,
            EmailProvider::Outlook => &self.settings.outlook_oauth,
        }
    }
}
