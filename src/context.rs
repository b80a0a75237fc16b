//! Explicitly wired application context
//!
//! Everything process-wide (version registry, session store, token manager)
//! is built here once and handed out by reference. Nothing is global.

use crate::api::{
    ApiClient, ApiTransport, EmployeesApi, RemoteAuth, RequestGate, RestClient, TripsApi,
};
use crate::audit::AuditLog;
use crate::auth::{AuthApi, TokenManager, TokenStore};
use crate::cache::{ExpiringStore, VersionRegistry};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, ConfigManager};
use crate::error::TriplogResult;
use crate::http::{HttpClient, UreqClient};
use crate::storage::{FileStorage, MemoryStorage, StorageBackend};
use std::sync::Arc;
use tracing::debug;

/// Collaborators for an [`AppContext`]; anything not supplied gets a default
pub struct AppContextBuilder {
    config: Config,
    cache_storage: Option<Arc<dyn StorageBackend>>,
    session_storage: Option<Arc<dyn StorageBackend>>,
    http: Option<Arc<dyn HttpClient>>,
    auth: Option<Arc<dyn AuthApi>>,
    clock: Option<Arc<dyn Clock>>,
    audit: Option<AuditLog>,
}

impl AppContextBuilder {
    /// Backend for cache cells and the version map (default: in memory)
    pub fn cache_storage(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.cache_storage = Some(backend);
        self
    }

    /// Backend for session fields (default: in memory)
    pub fn session_storage(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.session_storage = Some(backend);
        self
    }

    /// Transport (default: [`UreqClient`] with the configured timeout)
    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Auth service (default: [`RemoteAuth`] over the transport)
    pub fn auth_api(mut self, auth: Arc<dyn AuthApi>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn build(self) -> AppContext {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let http = self
            .http
            .unwrap_or_else(|| Arc::new(UreqClient::new(config.api.timeout())));
        let cache_storage = self
            .cache_storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let session_storage = self
            .session_storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));

        let transport = ApiTransport::new(http, &config.api.base_url, &config.api.api_key)
            .with_timeout(config.api.timeout());
        let auth = self
            .auth
            .unwrap_or_else(|| Arc::new(RemoteAuth::new(transport.clone())));

        let registry = Arc::new(VersionRegistry::load(cache_storage.clone()));
        let cache = Arc::new(
            ExpiringStore::new(cache_storage, registry, clock.clone())
                .with_enabled(config.cache.enabled),
        );

        let tokens = Arc::new(TokenStore::new(session_storage));
        let manager = Arc::new(TokenManager::with_options(
            tokens.clone(),
            auth,
            cache.clone(),
            clock,
            config.auth.refresh_threshold_secs,
            self.audit.unwrap_or_else(AuditLog::disabled),
        ));

        let gate = RequestGate::new(manager.clone(), config.api.api_key.clone());
        let api = Arc::new(ApiClient::new(transport, gate));
        let rest = RestClient::new(api.clone(), cache.clone());
        let trips = TripsApi::new(rest.clone());
        let employees = EmployeesApi::new(rest.clone());

        AppContext {
            config,
            cache,
            tokens,
            manager,
            api,
            rest,
            trips,
            employees,
        }
    }
}

/// The wired object graph
pub struct AppContext {
    config: Config,
    cache: Arc<ExpiringStore>,
    tokens: Arc<TokenStore>,
    manager: Arc<TokenManager>,
    api: Arc<ApiClient>,
    rest: RestClient,
    trips: TripsApi,
    employees: EmployeesApi,
}

impl AppContext {
    pub fn builder(config: Config) -> AppContextBuilder {
        AppContextBuilder {
            config,
            cache_storage: None,
            session_storage: None,
            http: None,
            auth: None,
            clock: None,
            audit: None,
        }
    }

    /// Production graph: file storage under the state directory, the
    /// `ureq` transport and the wall clock.
    ///
    /// Cache and session live in separate directories so clearing the cache
    /// never signs the user out.
    pub async fn open(config: Config) -> TriplogResult<Self> {
        ConfigManager::ensure_state_dirs().await?;
        let cache_storage = FileStorage::open(ConfigManager::cache_dir())?;
        let session_storage = FileStorage::open(ConfigManager::session_dir())?;
        let audit = AuditLog::new(&config);

        Ok(Self::builder(config)
            .cache_storage(Arc::new(cache_storage))
            .session_storage(Arc::new(session_storage))
            .audit_log(audit)
            .build())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ExpiringStore> {
        &self.cache
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn manager(&self) -> &Arc<TokenManager> {
        &self.manager
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn trips(&self) -> &TripsApi {
        &self.trips
    }

    pub fn employees(&self) -> &EmployeesApi {
        &self.employees
    }

    /// Let any in-flight refresh settle and persist the version map
    pub async fn shutdown(self) {
        self.manager.settle().await;
        self.cache.registry().flush();
        debug!("Context shut down");
    }
}
