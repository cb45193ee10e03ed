//! Resolution of configured provider identifiers into runtime providers.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::ProviderHttpClient,
	provider::{
		ClaimsMapper, ClaimsPassthroughMapper, ConfigurationCollection, ConfiguredProvider,
		Provider, ProviderConfiguration, ProviderId, ProviderKind,
	},
};

type CacheKey = (ProviderId, String);

/// Shared runtime dependencies handed to every provider.
#[derive(Clone, Debug)]
pub struct ProviderDependencies {
	/// HTTP client for token, discovery, key-set, and userinfo requests.
	pub http: ProviderHttpClient,
	/// Claims mapper evaluator.
	pub mapper: Arc<dyn ClaimsMapper>,
}
impl ProviderDependencies {
	/// Dependencies using `http` and the passthrough mapper.
	pub fn new(http: ProviderHttpClient) -> Self {
		Self { http, mapper: Arc::new(ClaimsPassthroughMapper) }
	}

	/// Replaces the claims mapper.
	pub fn with_mapper(mut self, mapper: Arc<dyn ClaimsMapper>) -> Self {
		self.mapper = mapper;

		self
	}
}

/// Builds and caches runtime providers.
#[derive(Debug)]
pub struct ProviderRegistry {
	deps: ProviderDependencies,
	cache: RwLock<HashMap<CacheKey, Arc<dyn Provider>>>,
}
impl ProviderRegistry {
	/// Creates an empty registry.
	pub fn new(deps: ProviderDependencies) -> Self {
		Self { deps, cache: RwLock::new(HashMap::new()) }
	}

	/// Resolves the provider `id` configured in `collection`.
	///
	/// Fails with [`Error::ProviderUnknown`] when no entry carries `id` and with
	/// [`ConfigError::ProviderKindUnsupported`] when its kind has no constructor.
	pub fn resolve(
		&self,
		collection: &ConfigurationCollection,
		id: &str,
	) -> Result<Arc<dyn Provider>> {
		let config = collection
			.find(id)
			.ok_or_else(|| Error::ProviderUnknown { provider: id.to_owned() })?;
		let kind = config.kind()?;

		config.validate_for(kind)?;

		let key = (config.id.clone(), config.fingerprint());

		if let Some(provider) = self.cache.read().get(&key) {
			return Ok(Arc::clone(provider));
		}

		let redirect_uri = collection.redirect_uri(&config.id);
		let provider = construct(kind, config.clone(), redirect_uri, &self.deps)?;

		tracing::debug!(provider = %config.id, kind = %kind, "Constructed provider.");

		Ok(Arc::clone(self.cache.write().entry(key).or_insert(provider)))
	}

	/// Number of cached providers.
	pub fn cached(&self) -> usize {
		self.cache.read().len()
	}
}

fn construct(
	kind: ProviderKind,
	config: ProviderConfiguration,
	redirect_uri: Url,
	deps: &ProviderDependencies,
) -> Result<Arc<dyn Provider>, ConfigError> {
	let deps = deps.clone();
	let provider = match kind {
		ProviderKind::Microsoft => ConfiguredProvider::microsoft(config, redirect_uri, deps)?,
		ProviderKind::Apple => ConfiguredProvider::apple(config, redirect_uri, deps)?,
		ProviderKind::Generic
		| ProviderKind::Google
		| ProviderKind::GitHub
		| ProviderKind::GitHubApp
		| ProviderKind::GitLab
		| ProviderKind::Discord
		| ProviderKind::Slack
		| ProviderKind::Facebook
		| ProviderKind::Auth0
		| ProviderKind::Vk
		| ProviderKind::Yandex
		| ProviderKind::Spotify
		| ProviderKind::NetId
		| ProviderKind::DingTalk
		| ProviderKind::LinkedIn
		| ProviderKind::Patreon => ConfiguredProvider::standard(config, kind, redirect_uri, deps),
	};

	Ok(Arc::new(provider))
}
