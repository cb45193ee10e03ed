//! The runtime [`Provider`] built for every configured kind.

// crates.io
use async_lock::OnceCell;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	oauth::{OAuth2Client, OAuth2ClientConfig, TokenSet},
	provider::{
		AppleSecretSigner, Claims, IdTokenVerifier, Provider, ProviderConfiguration,
		ProviderDependencies, ProviderEndpoints, ProviderFuture, ProviderKind, ProviderProfile,
		ScopeList, SubjectSource, discovery,
		id_token::{self, Expectations, JwksCache},
	},
	secret::Secret,
};

const GRAPH_ME_URL: &str = "https://graph.microsoft.com/v1.0/me";

#[derive(Debug)]
enum Flavor {
	Standard,
	Microsoft { tenant: String, subject_source: SubjectSource },
	Apple { signer: Option<AppleSecretSigner> },
}

/// Provider assembled from a kind profile and its configuration.
#[derive(Debug)]
pub struct ConfiguredProvider {
	config: ProviderConfiguration,
	kind: ProviderKind,
	profile: &'static ProviderProfile,
	redirect_uri: Url,
	scopes: ScopeList,
	flavor: Flavor,
	deps: ProviderDependencies,
	endpoints: OnceCell<Arc<ProviderEndpoints>>,
	jwks: JwksCache,
}
impl ConfiguredProvider {
	/// Provider using the kind's profile as is.
	pub fn standard(
		config: ProviderConfiguration,
		kind: ProviderKind,
		redirect_uri: Url,
		deps: ProviderDependencies,
	) -> Self {
		Self::with_flavor(config, kind, redirect_uri, deps, Flavor::Standard)
	}

	/// Microsoft provider with its tenant substituted into the profile.
	pub fn microsoft(
		config: ProviderConfiguration,
		redirect_uri: Url,
		deps: ProviderDependencies,
	) -> Result<Self, ConfigError> {
		let tenant = config.tenant.clone().filter(|tenant| !tenant.is_empty()).ok_or_else(|| {
			ConfigError::MissingField { provider: config.id.to_string(), field: "microsoft_tenant" }
		})?;
		let subject_source = config.subject_source;

		Ok(Self::with_flavor(
			config,
			ProviderKind::Microsoft,
			redirect_uri,
			deps,
			Flavor::Microsoft { tenant, subject_source },
		))
	}

	/// Apple provider, parsing its signing key when no static secret is configured.
	pub fn apple(
		config: ProviderConfiguration,
		redirect_uri: Url,
		deps: ProviderDependencies,
	) -> Result<Self, ConfigError> {
		let signer = if config.client_secret.is_empty() {
			Some(AppleSecretSigner::from_config(&config)?.ok_or_else(|| {
				ConfigError::MissingField {
					provider: config.id.to_string(),
					field: "apple_private_key",
				}
			})?)
		} else {
			None
		};

		Ok(Self::with_flavor(config, ProviderKind::Apple, redirect_uri, deps, Flavor::Apple {
			signer,
		}))
	}

	fn with_flavor(
		config: ProviderConfiguration,
		kind: ProviderKind,
		redirect_uri: Url,
		deps: ProviderDependencies,
		flavor: Flavor,
	) -> Self {
		let scopes = config.scopes(kind);

		Self {
			config,
			kind,
			profile: kind.profile(),
			redirect_uri,
			scopes,
			flavor,
			deps,
			endpoints: OnceCell::new(),
			jwks: JwksCache::new(),
		}
	}

	/// Resolved endpoints, discovered on first use.
	pub async fn endpoints(&self) -> Result<Arc<ProviderEndpoints>> {
		self.endpoints
			.get_or_try_init(|| async { self.resolve_endpoints().await.map(Arc::new) })
			.await
			.cloned()
	}

	async fn resolve_endpoints(&self) -> Result<ProviderEndpoints> {
		let mut endpoints = match &self.config.issuer_url {
			Some(issuer) => discovery::from_discovery(
				&self.config,
				discovery::discover(&self.deps.http, &self.config, issuer).await?,
			),
			None => discovery::from_profile(&self.config, self.profile, self.tenant())?,
		};

		if let Flavor::Microsoft { subject_source: SubjectSource::Me, .. } = &self.flavor {
			endpoints.userinfo = Some(Url::parse(GRAPH_ME_URL).map_err(|source| {
				ConfigError::InvalidUrl {
					provider: self.config.id.to_string(),
					field: "userinfo_url",
					source,
				}
			})?);
		}

		Ok(endpoints)
	}

	fn tenant(&self) -> Option<&str> {
		match &self.flavor {
			Flavor::Microsoft { tenant, .. } => Some(tenant),
			_ => None,
		}
	}

	fn client_secret(&self) -> Result<Secret, ConfigError> {
		match &self.flavor {
			Flavor::Apple { signer: Some(signer) } => signer.sign(OffsetDateTime::now_utc()),
			_ => Ok(self.config.client_secret.clone()),
		}
	}

	fn audiences(&self) -> Vec<String> {
		let mut audiences = vec![self.config.client_id.clone()];

		audiences.extend(self.config.additional_id_token_audiences.iter().cloned());

		audiences
	}

	async fn verify_id_token(&self, endpoints: &ProviderEndpoints, token: &str) -> Result<Claims> {
		let (Some(jwks), Some(issuer)) = (&endpoints.jwks, &endpoints.issuer) else {
			return Err(Error::internal(
				"The provider cannot verify ID tokens.",
				format!("Provider `{}` has no key set or issuer.", self.config.id),
			));
		};
		let audiences = self.audiences();

		id_token::verify(
			&self.deps.http,
			jwks,
			&self.jwks,
			token,
			Expectations { issuer, audiences: &audiences },
		)
		.await
	}

	async fn userinfo_claims(
		&self,
		endpoints: &ProviderEndpoints,
		tokens: &TokenSet,
		subject_field: &str,
	) -> Result<Claims> {
		let Some(userinfo) = &endpoints.userinfo else {
			return Err(Error::internal(
				"The provider did not return a subject identifier.",
				format!(
					"Provider `{}` has neither a verifiable ID token nor a userinfo endpoint.",
					self.config.id
				),
			));
		};
		let document: Value = self
			.deps
			.http
			.get_json(
				"userinfo",
				userinfo,
				Some(tokens.access_token.expose()),
				self.profile.userinfo_token_header,
			)
			.await?;

		Claims::from_document(document, subject_field)
	}
}
impl Provider for ConfiguredProvider {
	fn config(&self) -> &ProviderConfiguration {
		&self.config
	}

	fn kind(&self) -> ProviderKind {
		self.kind
	}

	fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	fn oauth2(&self) -> ProviderFuture<'_, OAuth2Client> {
		Box::pin(async move {
			let endpoints = self.endpoints().await?;
			let secret = self.client_secret()?;

			Ok(OAuth2Client::new(
				OAuth2ClientConfig {
					client_id: &self.config.client_id,
					client_secret: &secret,
					authorization_url: &endpoints.authorization,
					token_url: &endpoints.token,
					redirect_uri: &self.redirect_uri,
					client_secret_post: self.profile.client_secret_post,
					scopes: &self.scopes,
				},
				self.deps.http.clone(),
			))
		})
	}

	fn auth_code_url_options(&self) -> Vec<(String, String)> {
		let mut options: Vec<(String, String)> = self
			.profile
			.authorization_parameters
			.iter()
			.map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
			.collect();

		if let Some(claims) = &self.config.requested_claims {
			options.push(("claims".into(), claims.to_string()));
		}

		options
	}

	fn upstream_parameters(&self, requested: &BTreeMap<String, String>) -> Vec<(String, String)> {
		self.profile
			.upstream_parameters
			.iter()
			.filter_map(|key| {
				requested
					.get(*key)
					.filter(|value| !value.is_empty())
					.map(|value| ((*key).to_owned(), value.clone()))
			})
			.collect()
	}

	fn claims<'a>(&'a self, tokens: &'a TokenSet) -> ProviderFuture<'a, Claims> {
		Box::pin(async move {
			let endpoints = self.endpoints().await?;
			let claims = match (&self.flavor, tokens.id_token()) {
				(Flavor::Microsoft { subject_source: SubjectSource::Me, .. }, _) =>
					self.userinfo_claims(&endpoints, tokens, "id").await?,
				(_, Some(token)) if endpoints.jwks.is_some() =>
					self.verify_id_token(&endpoints, token).await?,
				(Flavor::Apple { .. }, _) =>
					return Err(Error::InvalidIdToken {
						reason: "the token response carried no ID token".into(),
					}),
				_ => self.userinfo_claims(&endpoints, tokens, self.profile.subject_field).await?,
			};

			claims.ensure_subject()?;

			Ok(claims)
		})
	}

	fn id_token_verifier(&self) -> Option<&dyn IdTokenVerifier> {
		self.profile.verifies_id_tokens.then_some(self as &dyn IdTokenVerifier)
	}

	fn map_claims<'a>(&'a self, claims: &'a Claims) -> ProviderFuture<'a, Value> {
		self.deps.mapper.map(&self.config.mapper_url, claims)
	}
}
impl IdTokenVerifier for ConfiguredProvider {
	fn claims_from_id_token<'a>(&'a self, id_token: &'a str) -> ProviderFuture<'a, Claims> {
		Box::pin(async move {
			let endpoints = self.endpoints().await?;

			self.verify_id_token(&endpoints, id_token).await
		})
	}
}
