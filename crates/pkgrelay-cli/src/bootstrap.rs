//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter:
//! - Database pool, job repository and credential cache (via pkgrelay-db)
//! - Distribution client, relay transport and token provider (via pkgrelay-http)
//! - Acquisition chain and dispatcher (via pkgrelay-pipeline)
//!
//! Command handlers receive the composed [`RelayContext`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pkgrelay_core::{
    BroadcastRelayEmitter, CachedCredentialStore, CredentialCachePort, CredentialDomain,
    CredentialSettings, CredentialStore, DispatcherConfig, ResolvedPaths, StaticTokenProvider,
    TokenProvider,
};
use pkgrelay_db::{StoreFactory, setup_database};
use pkgrelay_http::{
    HttpClientConfig, HttpDistributionClient, HttpRelayTransport, HttpTokenProvider,
    RemoteRelayRequester,
};
use pkgrelay_pipeline::{
    AcquisitionChain, DirectoryPackageRegistry, LocalExtractionStrategy, RelayDispatcher,
    RelayDispatcherDeps, RemoteFetchStrategy, build_relay_dispatcher,
};

use crate::error::CliError;
use crate::parser::Cli;

/// Events buffered per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 256;

/// How often `pkgrelay run` looks for jobs queued by other commands.
const STORAGE_POLL: Duration = Duration::from_secs(2);

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Explicit data directory.
    pub data_dir: Option<PathBuf>,
    /// Installed package directory; defaults to `{data}/packages`.
    pub packages_dir: Option<PathBuf>,
    /// Relay server base URL.
    pub relay_url: Option<String>,
    /// Distribution service base URL.
    pub distribution_url: Option<String>,
    /// Token refresh endpoint.
    pub token_url: Option<String>,
    /// Secret for the token endpoint.
    pub token_secret: Option<String>,
    /// Fixed relay token.
    pub relay_token: Option<String>,
    /// Fixed distribution token.
    pub distribution_token: Option<String>,
    /// Dispatcher limits.
    pub dispatcher: DispatcherConfig,
}

impl CliConfig {
    /// Build the configuration from parsed arguments.
    pub fn from_cli(cli: &Cli) -> Self {
        let endpoints = cli.endpoints.clone();
        let mut dispatcher = DispatcherConfig::default().with_storage_poll(STORAGE_POLL);
        if let Some(max) = endpoints.max_concurrent {
            dispatcher = dispatcher.with_max_concurrent(max);
        }
        Self {
            data_dir: cli.data_dir.clone(),
            packages_dir: endpoints.packages_dir,
            relay_url: endpoints.relay_url,
            distribution_url: endpoints.distribution_url,
            token_url: endpoints.token_refresh_url,
            token_secret: endpoints.token_secret,
            relay_token: endpoints.relay_token,
            distribution_token: endpoints.distribution_token,
            dispatcher,
        }
    }

    /// HTTP adapter configuration.
    pub fn http_config(&self) -> HttpClientConfig {
        let mut http = HttpClientConfig::new().with_transfer_window(self.dispatcher.transfer_window);
        if let Some(url) = &self.relay_url {
            http = http.with_relay_url(url);
        }
        if let Some(url) = &self.distribution_url {
            http = http.with_distribution_url(url);
        }
        if let Some(url) = &self.token_url {
            http = http.with_token_url(url);
        }
        http
    }
}

/// Fully composed application context for CLI commands.
pub struct RelayContext {
    /// The relay dispatcher, loaded from storage.
    pub dispatcher: Arc<RelayDispatcher>,
    /// Emitter the dispatcher publishes to.
    pub events: Arc<BroadcastRelayEmitter>,
    /// Server-side download requests.
    pub requester: RemoteRelayRequester,
    /// Resolved data paths.
    pub paths: ResolvedPaths,
    /// Installed package directory.
    pub packages_dir: PathBuf,
}

impl RelayContext {
    /// Access the dispatcher.
    pub fn dispatcher(&self) -> &Arc<RelayDispatcher> {
        &self.dispatcher
    }
}

/// Bootstrap the CLI application.
///
/// Opens the database, wires the adapters into a dispatcher and loads the
/// persisted queue without changing it. The runner is not started; `run`
/// takes the runner lock and calls `restore` itself.
pub async fn bootstrap(config: CliConfig) -> Result<RelayContext> {
    let paths = ResolvedPaths::resolve(config.data_dir.as_deref())
        .map_err(|e| CliError::Config(e.to_string()))?;
    let packages_dir = config
        .packages_dir
        .clone()
        .unwrap_or_else(|| paths.data_root.join("packages"));

    // 1. Storage
    let pool = setup_database(&paths.database)
        .await
        .map_err(|e| CliError::Database(format!("{e:#}")))?;
    let cache = StoreFactory::credential_cache(pool.clone(), &paths.credential_key)
        .map_err(|e| CliError::Config(e.to_string()))?;
    let repository = StoreFactory::job_repository(pool);

    // 2. Credentials and HTTP adapters
    let http = config.http_config();
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(build_credentials(&config, &http, cache)?);
    let distribution = HttpDistributionClient::new(&http)
        .map_err(|e| CliError::Config(e.to_string()))?;
    let transport = HttpRelayTransport::new(&http, Arc::clone(&credentials))
        .map_err(|e| CliError::Config(e.to_string()))?;
    let requester = RemoteRelayRequester::new(&http, Arc::clone(&credentials))
        .map_err(|e| CliError::Config(e.to_string()))?;

    // 3. Acquisition chain: remote first, installed copy as fallback
    let chain = AcquisitionChain::new(
        Arc::new(RemoteFetchStrategy::new(
            Arc::new(distribution),
            Arc::clone(&credentials),
        )),
        Arc::new(LocalExtractionStrategy::new(Arc::new(
            DirectoryPackageRegistry::new(packages_dir.clone()),
        ))),
    );

    // 4. Dispatcher
    let events = Arc::new(BroadcastRelayEmitter::new(EVENT_CAPACITY));
    let dispatcher = build_relay_dispatcher(RelayDispatcherDeps {
        repository,
        chain,
        transport: Arc::new(transport),
        events: events.clone(),
        config: config.dispatcher,
    });
    dispatcher.load().await.map_err(CliError::from)?;

    Ok(RelayContext {
        dispatcher,
        events,
        requester,
        paths,
        packages_dir,
    })
}

/// Compose the credential store.
///
/// A refresh endpoint serves both domains; a fixed token for a domain
/// takes its place.
fn build_credentials(
    config: &CliConfig,
    http: &HttpClientConfig,
    cache: Arc<dyn CredentialCachePort>,
) -> Result<CachedCredentialStore> {
    let mut store = CachedCredentialStore::new(CredentialSettings::default()).with_cache(cache);

    if let Some(url) = http.token_url() {
        let provider: Arc<dyn TokenProvider> = Arc::new(
            HttpTokenProvider::new(http, url)
                .map_err(|e| CliError::Config(e.to_string()))?
                .with_secret(config.token_secret.clone()),
        );
        store = store
            .with_provider(CredentialDomain::Distribution, Arc::clone(&provider))
            .with_provider(CredentialDomain::Relay, provider);
    }

    let fixed = [
        (CredentialDomain::Distribution, &config.distribution_token),
        (CredentialDomain::Relay, &config.relay_token),
    ];
    for (domain, token) in fixed {
        if let Some(token) = token.as_deref().filter(|t| !t.trim().is_empty()) {
            store = store.with_provider(
                domain,
                Arc::new(StaticTokenProvider::new(token, domain.as_str())),
            );
        }
    }

    for domain in [CredentialDomain::Distribution, CredentialDomain::Relay] {
        if !store.has_provider(domain) {
            tracing::warn!(target: "pkgrelay.credentials", domain = domain.as_str(), "No credential source configured");
        }
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgrelay_core::{AssetRequest, JobRepositoryPort, JobState, RelayDispatcherPort};

    fn config_in(dir: &std::path::Path) -> CliConfig {
        CliConfig {
            data_dir: Some(dir.to_path_buf()),
            relay_token: Some("relay-token".to_string()),
            ..CliConfig::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_creates_data_files() {
        let dir = tempfile::tempdir().unwrap();

        let ctx = bootstrap(config_in(dir.path())).await.unwrap();

        assert!(ctx.paths.database.exists());
        assert!(ctx.paths.credential_key.exists());
        assert_eq!(ctx.packages_dir, dir.path().join("packages"));
        assert!(ctx.dispatcher().list_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn queued_jobs_survive_a_new_context() {
        let dir = tempfile::tempdir().unwrap();

        let first = bootstrap(config_in(dir.path())).await.unwrap();
        let handle = first
            .dispatcher()
            .enqueue(AssetRequest::with_defaults("com.example.app", "42"))
            .await
            .unwrap();
        drop(first);

        let second = bootstrap(config_in(dir.path())).await.unwrap();
        let job = second.dispatcher().get_job(&handle.id).await.unwrap();
        assert_eq!(job.state, JobState::Queued);
    }

    #[tokio::test]
    async fn bootstrap_leaves_running_jobs_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ResolvedPaths::under(dir.path().to_path_buf());
        let pool = setup_database(&paths.database).await.unwrap();
        let repository = StoreFactory::job_repository(pool);
        let mut running = pkgrelay_core::Job::new(
            AssetRequest::with_defaults("com.example.app", "42"),
            chrono::Utc::now(),
        );
        running.state = JobState::Relaying;
        repository.upsert(&running).await.unwrap();

        let ctx = tokio_test::assert_ok!(bootstrap(config_in(dir.path())).await);

        let seen = ctx.dispatcher().get_job(&running.id).await.unwrap();
        assert_eq!(seen.state, JobState::Relaying);
        assert!(seen.last_error.is_none());
        let stored = repository.load_all().await.unwrap();
        assert_eq!(stored[0].state, JobState::Relaying);
    }

    #[test]
    fn http_config_carries_token_url() {
        let config = CliConfig {
            token_url: Some("https://auth.internal/token".to_string()),
            ..CliConfig::default()
        };
        assert_eq!(
            config.http_config().token_url(),
            Some("https://auth.internal/token")
        );
    }

    #[tokio::test]
    async fn fixed_tokens_configure_their_domain_only() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ResolvedPaths::under(dir.path().to_path_buf());
        let pool = setup_database(&paths.database).await.unwrap();
        let cache = StoreFactory::credential_cache(pool, &paths.credential_key).unwrap();
        let config = CliConfig {
            relay_token: Some("relay-token".to_string()),
            distribution_token: Some("  ".to_string()),
            ..CliConfig::default()
        };

        let store = build_credentials(&config, &config.http_config(), cache).unwrap();
        assert!(store.has_provider(CredentialDomain::Relay));
        assert!(!store.has_provider(CredentialDomain::Distribution));
    }
}
