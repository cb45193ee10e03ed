//! Provider configuration loaded once at startup.

// std
use std::{collections::HashSet, fs, path::Path};
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	provider::{ProviderId, ProviderKind, ScopeList},
	secret::Secret,
};

/// Callback path appended to the base redirect URI, followed by `/{provider_id}`.
pub const CALLBACK_PATH: &str = "/self-service/methods/oidc/callback";

/// Where Microsoft subjects come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectSource {
	/// The `sub` claim of the OIDC userinfo document.
	#[default]
	Userinfo,
	/// The `id` of the Microsoft Graph `/me` resource.
	Me,
}

/// One configured provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfiguration {
	/// Identifier referenced by the UI and substituted into the callback path.
	pub id: ProviderId,
	/// Provider kind, kept raw so unsupported kinds can be reported with the supported list.
	pub provider: String,
	/// Human-readable label.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub label: String,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	#[serde(default, skip_serializing_if = "Secret::is_empty")]
	pub client_secret: Secret,
	/// Issuer used for discovery and ID-token validation.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub issuer_url: Option<Url>,
	/// Authorization endpoint override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth_url: Option<Url>,
	/// Token endpoint override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_url: Option<Url>,
	/// Microsoft tenant (`common`, `organizations`, `consumers`, or a tenant id).
	#[serde(default, rename = "microsoft_tenant", skip_serializing_if = "Option::is_none")]
	pub tenant: Option<String>,
	/// Microsoft subject source.
	#[serde(default)]
	pub subject_source: SubjectSource,
	/// Apple developer team identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub apple_team_id: Option<String>,
	/// Apple signing key identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub apple_private_key_id: Option<String>,
	/// Apple signing key, PEM encoded.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub apple_private_key: Option<Secret>,
	/// Requested scopes; the kind's defaults apply when empty.
	#[serde(default)]
	pub scope: ScopeList,
	/// Claims mapper reference evaluated into identity traits.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub mapper_url: String,
	/// Opaque `claims` request forwarded to the authorization endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub requested_claims: Option<Value>,
	/// Audiences accepted on ID tokens besides the client id.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub additional_id_token_audiences: Vec<String>,
}
impl ProviderConfiguration {
	/// Creates a configuration with only the required fields set.
	pub fn new(id: ProviderId, kind: ProviderKind, client_id: impl Into<String>) -> Self {
		Self {
			id,
			provider: kind.as_str().into(),
			label: String::new(),
			client_id: client_id.into(),
			client_secret: Secret::default(),
			issuer_url: None,
			auth_url: None,
			token_url: None,
			tenant: None,
			subject_source: SubjectSource::default(),
			apple_team_id: None,
			apple_private_key_id: None,
			apple_private_key: None,
			scope: ScopeList::default(),
			mapper_url: String::new(),
			requested_claims: None,
			additional_id_token_audiences: Vec::new(),
		}
	}

	/// Sets the client secret.
	pub fn with_client_secret(mut self, secret: impl Into<Secret>) -> Self {
		self.client_secret = secret.into();

		self
	}

	/// Sets the issuer used for discovery.
	pub fn with_issuer_url(mut self, issuer: Url) -> Self {
		self.issuer_url = Some(issuer);

		self
	}

	/// Overrides the authorization and token endpoints.
	pub fn with_endpoints(mut self, auth_url: Url, token_url: Url) -> Self {
		self.auth_url = Some(auth_url);
		self.token_url = Some(token_url);

		self
	}

	/// Sets the requested scopes.
	pub fn with_scope(mut self, scope: ScopeList) -> Self {
		self.scope = scope;

		self
	}

	/// Sets the Microsoft tenant.
	pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
		self.tenant = Some(tenant.into());

		self
	}

	/// Sets the Microsoft subject source.
	pub fn with_subject_source(mut self, source: SubjectSource) -> Self {
		self.subject_source = source;

		self
	}

	/// Sets the Apple signing key triple.
	pub fn with_apple_signing_key(
		mut self,
		team_id: impl Into<String>,
		key_id: impl Into<String>,
		private_key: impl Into<Secret>,
	) -> Self {
		self.apple_team_id = Some(team_id.into());
		self.apple_private_key_id = Some(key_id.into());
		self.apple_private_key = Some(private_key.into());

		self
	}

	/// Sets the claims mapper reference.
	pub fn with_mapper_url(mut self, mapper_url: impl Into<String>) -> Self {
		self.mapper_url = mapper_url.into();

		self
	}

	/// Sets the opaque `claims` request.
	pub fn with_requested_claims(mut self, claims: Value) -> Self {
		self.requested_claims = Some(claims);

		self
	}

	/// Parses the configured kind.
	pub fn kind(&self) -> Result<ProviderKind, ConfigError> {
		self.provider.parse()
	}

	/// Scopes to request: configured ones, or the kind's defaults.
	pub fn scopes(&self, kind: ProviderKind) -> ScopeList {
		if self.scope.is_empty() {
			ScopeList::from_static(kind.profile().default_scopes)
		} else {
			self.scope.clone()
		}
	}

	/// Stable base64 (no padding) SHA-256 digest of the configuration.
	pub fn fingerprint(&self) -> String {
		let bytes = serde_json::to_vec(self).unwrap_or_default();

		STANDARD_NO_PAD.encode(Sha256::digest(bytes))
	}

	/// Checks the fields `kind` requires.
	pub fn validate_for(&self, kind: ProviderKind) -> Result<(), ConfigError> {
		let missing =
			|field| ConfigError::MissingField { provider: self.id.to_string(), field };

		if self.client_id.is_empty() {
			return Err(missing("client_id"));
		}

		match kind {
			ProviderKind::Generic | ProviderKind::Auth0 =>
				if self.issuer_url.is_none() {
					if self.auth_url.is_none() {
						return Err(missing("auth_url"));
					}
					if self.token_url.is_none() {
						return Err(missing("token_url"));
					}
				},
			ProviderKind::Microsoft =>
				if self.tenant.as_deref().is_none_or(str::is_empty) {
					return Err(missing("microsoft_tenant"));
				},
			ProviderKind::Apple =>
				if self.client_secret.is_empty() {
					if self.apple_team_id.is_none() {
						return Err(missing("apple_team_id"));
					}
					if self.apple_private_key_id.is_none() {
						return Err(missing("apple_private_key_id"));
					}
					if self.apple_private_key.is_none() {
						return Err(missing("apple_private_key"));
					}
				},
			_ => {},
		}

		Ok(())
	}
}

/// Every configured provider plus the base of their redirect URIs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationCollection {
	/// Public base URL the callback path is appended to.
	pub base_redirect_uri: Url,
	/// Configured providers, in display order.
	#[serde(default)]
	pub providers: Vec<ProviderConfiguration>,
}
impl ConfigurationCollection {
	/// Creates an empty collection.
	pub fn new(base_redirect_uri: Url) -> Self {
		Self { base_redirect_uri, providers: Vec::new() }
	}

	/// Adds a provider.
	pub fn with_provider(mut self, provider: ProviderConfiguration) -> Self {
		self.providers.push(provider);

		self
	}

	/// Finds a provider by identifier.
	pub fn find(&self, id: &str) -> Option<&ProviderConfiguration> {
		self.providers.iter().find(|p| &*p.id == id)
	}

	/// Redirect URI registered with the provider `id`.
	pub fn redirect_uri(&self, id: &ProviderId) -> Url {
		let mut url = self.base_redirect_uri.clone();
		let path = format!("{}{CALLBACK_PATH}/{id}", url.path().trim_end_matches('/'));

		url.set_path(&path);
		url.set_query(None);
		url.set_fragment(None);

		url
	}

	/// Startup validation of the whole collection.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !matches!(self.base_redirect_uri.scheme(), "http" | "https") {
			return Err(ConfigError::InvalidBaseRedirect {
				url: self.base_redirect_uri.to_string(),
			});
		}

		let mut seen = HashSet::new();

		for provider in &self.providers {
			if !seen.insert(&*provider.id) {
				return Err(ConfigError::DuplicateProvider { id: provider.id.to_string() });
			}

			provider.validate_for(provider.kind()?)?;
		}

		Ok(())
	}
}

/// Settings of the OIDC login method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OidcMethodConfig {
	/// Whether the method accepts logins.
	#[serde(default)]
	pub enabled: bool,
	/// Provider configuration.
	pub config: ConfigurationCollection,
}
impl OidcMethodConfig {
	/// Creates an enabled method.
	pub fn enabled(config: ConfigurationCollection) -> Self {
		Self { enabled: true, config }
	}

	/// Parses and validates JSON settings.
	pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_slice(bytes);
		let config: Self = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ConfigError::Parse { source })?;

		config.config.validate()?;

		Ok(config)
	}

	/// Reads, parses, and validates JSON settings from `path`.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let bytes = fs::read(path)
			.map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;

		Self::from_json_slice(&bytes)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn id(value: &str) -> ProviderId {
		ProviderId::new(value).expect("Provider fixture should be valid.")
	}

	fn base() -> Url {
		Url::parse("https://auth.example.com/").expect("Base URL should parse.")
	}

	#[test]
	fn redirect_uri_substitutes_provider() {
		let collection = ConfigurationCollection::new(
			Url::parse("https://example.com/identity/").expect("Base URL should parse."),
		);

		assert_eq!(
			collection.redirect_uri(&id("google")).as_str(),
			"https://example.com/identity/self-service/methods/oidc/callback/google"
		);
	}

	#[test]
	fn parse_errors_report_the_field_path() {
		let raw = br#"{
			"enabled": true,
			"config": {
				"base_redirect_uri": "https://auth.example.com",
				"providers": [{ "id": "google", "provider": "google", "client_id": 7 }]
			}
		}"#;
		let err = OidcMethodConfig::from_json_slice(raw).expect_err("Client id must be a string.");

		match err {
			ConfigError::Parse { source } =>
				assert_eq!(source.path().to_string(), "config.providers[0].client_id"),
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn loads_valid_settings() {
		let raw = br#"{
			"enabled": true,
			"config": {
				"base_redirect_uri": "https://auth.example.com",
				"providers": [
					{
						"id": "google",
						"provider": "google",
						"client_id": "cid",
						"client_secret": "secret",
						"scope": ["openid", "email"],
						"mapper_url": "file:///etc/mappers/google.jsonnet"
					},
					{
						"id": "work",
						"provider": "microsoft",
						"client_id": "cid",
						"microsoft_tenant": "organizations",
						"subject_source": "me"
					}
				]
			}
		}"#;
		let settings = OidcMethodConfig::from_json_slice(raw).expect("Settings should load.");
		let google = settings.config.find("google").expect("Google should be configured.");
		let work = settings.config.find("work").expect("Work should be configured.");

		assert!(settings.enabled);
		assert_eq!(google.scope.normalized(), "openid email");
		assert_eq!(google.client_secret.expose(), "secret");
		assert!(!format!("{google:?}").contains("secret\""));
		assert_eq!(work.subject_source, SubjectSource::Me);
		assert_eq!(work.tenant.as_deref(), Some("organizations"));
	}

	#[test]
	fn validation_catches_duplicates_and_missing_fields() {
		let google = ProviderConfiguration::new(id("google"), ProviderKind::Google, "cid");
		let duplicate = ConfigurationCollection::new(base())
			.with_provider(google.clone())
			.with_provider(google);

		assert!(matches!(duplicate.validate(), Err(ConfigError::DuplicateProvider { .. })));

		let generic = ConfigurationCollection::new(base()).with_provider(
			ProviderConfiguration::new(id("corp"), ProviderKind::Generic, "cid"),
		);

		assert!(matches!(
			generic.validate(),
			Err(ConfigError::MissingField { field: "auth_url", .. })
		));

		let microsoft = ConfigurationCollection::new(base()).with_provider(
			ProviderConfiguration::new(id("ms"), ProviderKind::Microsoft, "cid"),
		);

		assert!(matches!(
			microsoft.validate(),
			Err(ConfigError::MissingField { field: "microsoft_tenant", .. })
		));

		let apple = ConfigurationCollection::new(base()).with_provider(
			ProviderConfiguration::new(id("apple"), ProviderKind::Apple, "cid")
				.with_apple_signing_key("TEAM", "KEY", "pem"),
		);

		assert!(apple.validate().is_ok());
	}

	#[test]
	fn validation_reports_unsupported_kinds() {
		let mut config = ProviderConfiguration::new(id("legacy"), ProviderKind::Generic, "cid");

		config.provider = "myspace".into();

		let collection = ConfigurationCollection::new(base()).with_provider(config);

		assert!(matches!(
			collection.validate(),
			Err(ConfigError::ProviderKindUnsupported { .. })
		));
	}

	#[test]
	fn default_scopes_follow_the_kind() {
		let config = ProviderConfiguration::new(id("gh"), ProviderKind::GitHub, "cid");

		assert_eq!(config.scopes(ProviderKind::GitHub).normalized(), "user:email");

		let custom = config.with_scope(
			ScopeList::new(["read:user"]).expect("Scope fixture should be valid."),
		);

		assert_eq!(custom.scopes(ProviderKind::GitHub).normalized(), "read:user");
	}

	#[test]
	fn fingerprint_tracks_changes() {
		let a = ProviderConfiguration::new(id("google"), ProviderKind::Google, "cid");
		let b = a.clone().with_client_secret("rotated");

		assert_eq!(a.fingerprint(), a.clone().fingerprint());
		assert_ne!(a.fingerprint(), b.fingerprint());
	}
}
