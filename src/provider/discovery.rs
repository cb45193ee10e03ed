//! Endpoint resolution from static profiles, configuration overrides, and OIDC discovery.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::ProviderHttpClient,
	provider::{ProviderConfiguration, ProviderProfile},
};

const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";
const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Endpoints a runtime provider talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEndpoints {
	/// Expected `iss` of ID tokens.
	pub issuer: Option<String>,
	/// Authorization endpoint.
	pub authorization: Url,
	/// Token endpoint.
	pub token: Url,
	/// Userinfo endpoint.
	pub userinfo: Option<Url>,
	/// JSON Web Key Set.
	pub jwks: Option<Url>,
}

/// Subset of an OpenID Provider Metadata document.
#[derive(Clone, Debug, Deserialize)]
pub struct DiscoveryDocument {
	/// Issuer identifier.
	pub issuer: String,
	/// Authorization endpoint.
	pub authorization_endpoint: Url,
	/// Token endpoint.
	pub token_endpoint: Url,
	/// Userinfo endpoint.
	#[serde(default)]
	pub userinfo_endpoint: Option<Url>,
	/// JSON Web Key Set.
	#[serde(default)]
	pub jwks_uri: Option<Url>,
}

/// Fetches `{issuer}/.well-known/openid-configuration` and checks its issuer.
pub(crate) async fn discover(
	http: &ProviderHttpClient,
	config: &ProviderConfiguration,
	issuer: &Url,
) -> Result<DiscoveryDocument> {
	let url = discovery_url(issuer).map_err(|source| ConfigError::InvalidUrl {
		provider: config.id.to_string(),
		field: "issuer_url",
		source,
	})?;
	let document: DiscoveryDocument = http.get_json("discovery", &url, None, None).await?;

	if trim_issuer(&document.issuer) != trim_issuer(issuer.as_str()) {
		return Err(ConfigError::IssuerMismatch {
			provider: config.id.to_string(),
			expected: issuer.to_string(),
			found: document.issuer,
		}
		.into());
	}

	tracing::debug!(
		provider = %config.id,
		issuer = %document.issuer,
		"Discovered provider endpoints."
	);

	Ok(document)
}

/// Endpoints from a discovery document, with configured overrides applied.
pub(crate) fn from_discovery(
	config: &ProviderConfiguration,
	document: DiscoveryDocument,
) -> ProviderEndpoints {
	ProviderEndpoints {
		issuer: Some(document.issuer),
		authorization: config.auth_url.clone().unwrap_or(document.authorization_endpoint),
		token: config.token_url.clone().unwrap_or(document.token_endpoint),
		userinfo: document.userinfo_endpoint,
		jwks: document.jwks_uri,
	}
}

/// Endpoints from the kind's profile, with configured overrides applied.
pub(crate) fn from_profile(
	config: &ProviderConfiguration,
	profile: &ProviderProfile,
	tenant: Option<&str>,
) -> Result<ProviderEndpoints, ConfigError> {
	let fill = |field: &'static str, template: Option<&'static str>| {
		template
			.map(|template| {
				let value = match tenant {
					Some(tenant) => template.replace(TENANT_PLACEHOLDER, tenant),
					None => template.to_owned(),
				};

				Url::parse(&value).map_err(|source| ConfigError::InvalidUrl {
					provider: config.id.to_string(),
					field,
					source,
				})
			})
			.transpose()
	};
	let missing = |field| ConfigError::MissingField { provider: config.id.to_string(), field };
	let authorization = match &config.auth_url {
		Some(url) => url.clone(),
		None => fill("auth_url", profile.authorization_url)?.ok_or_else(|| missing("auth_url"))?,
	};
	let token = match &config.token_url {
		Some(url) => url.clone(),
		None => fill("token_url", profile.token_url)?.ok_or_else(|| missing("token_url"))?,
	};
	let issuer = profile.issuer.map(|issuer| match tenant {
		Some(tenant) => issuer.replace(TENANT_PLACEHOLDER, tenant),
		None => issuer.to_owned(),
	});

	Ok(ProviderEndpoints {
		issuer,
		authorization,
		token,
		userinfo: fill("userinfo_url", profile.userinfo_url)?,
		jwks: fill("jwks_url", profile.jwks_url)?,
	})
}

fn discovery_url(issuer: &Url) -> Result<Url, url::ParseError> {
	let mut base = issuer.clone();

	if !base.path().ends_with('/') {
		let path = format!("{}/", base.path());

		base.set_path(&path);
	}

	base.join(WELL_KNOWN_PATH)
}

fn trim_issuer(issuer: &str) -> &str {
	issuer.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::provider::{ProviderId, ProviderKind};

	fn config(kind: ProviderKind) -> ProviderConfiguration {
		ProviderConfiguration::new(
			ProviderId::new(kind.as_str()).expect("Provider fixture should be valid."),
			kind,
			"client",
		)
	}

	#[test]
	fn discovery_url_keeps_issuer_path() {
		let issuer =
			Url::parse("https://tenant.auth0.com/realms/main").expect("Issuer should parse.");

		assert_eq!(
			discovery_url(&issuer).expect("Discovery URL should build.").as_str(),
			"https://tenant.auth0.com/realms/main/.well-known/openid-configuration"
		);
	}

	#[test]
	fn profile_endpoints_substitute_tenant_and_honor_overrides() {
		let microsoft = config(ProviderKind::Microsoft).with_tenant("contoso");
		let endpoints = from_profile(&microsoft, ProviderKind::Microsoft.profile(), Some("contoso"))
			.expect("Microsoft endpoints should resolve.");

		assert_eq!(
			endpoints.token.as_str(),
			"https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
		);
		assert_eq!(
			endpoints.issuer.as_deref(),
			Some("https://login.microsoftonline.com/contoso/v2.0")
		);

		let token = Url::parse("https://proxy.example.com/token").expect("Token URL should parse.");
		let auth = Url::parse("https://proxy.example.com/auth").expect("Auth URL should parse.");
		let github = config(ProviderKind::GitHub).with_endpoints(auth.clone(), token.clone());
		let endpoints = from_profile(&github, ProviderKind::GitHub.profile(), None)
			.expect("GitHub endpoints should resolve.");

		assert_eq!(endpoints.authorization, auth);
		assert_eq!(endpoints.token, token);
		assert_eq!(
			endpoints.userinfo.as_ref().map(Url::as_str),
			Some("https://api.github.com/user")
		);
	}

	#[test]
	fn generic_without_endpoints_is_missing_fields() {
		let generic = config(ProviderKind::Generic);
		let err = from_profile(&generic, ProviderKind::Generic.profile(), None)
			.expect_err("Generic providers have no static endpoints.");

		assert!(matches!(err, ConfigError::MissingField { field: "auth_url", .. }));
	}

	#[tokio::test]
	async fn discovery_rejects_foreign_issuer() {
		let server = MockServer::start_async().await;

		server
			.mock_async(|when, then| {
				when.method(GET).path("/.well-known/openid-configuration");
				then.status(200).json_body(serde_json::json!({
					"issuer": "https://evil.example.com",
					"authorization_endpoint": "https://evil.example.com/auth",
					"token_endpoint": "https://evil.example.com/token"
				}));
			})
			.await;

		let issuer = Url::parse(&server.base_url()).expect("Issuer should parse.");
		let generic = config(ProviderKind::Generic).with_issuer_url(issuer.clone());
		let http = ProviderHttpClient::new().expect("HTTP client should build.");
		let err = discover(&http, &generic, &issuer)
			.await
			.expect_err("A foreign issuer must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::IssuerMismatch { .. })));
	}
}
