//! OAuth 2.0 client facade used for authorization redirects and code exchanges.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken,
	EndpointNotSet, EndpointSet, ExtraTokenFields, HttpClientError, RedirectUrl,
	RequestTokenError, Scope, StandardRevocableToken, StandardTokenResponse, TokenResponse,
	TokenUrl,
	basic::{
		BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError,
		BasicRevocationErrorResponse, BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError, TransportError},
	http::{ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::ScopeList,
	secret::Secret,
};

type OidcTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	OidcTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Extra token-response fields carried by OpenID Connect providers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Raw ID token, when the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Endpoints and credentials needed to build an [`OAuth2Client`].
#[derive(Clone, Debug)]
pub struct OAuth2ClientConfig<'a> {
	/// OAuth client identifier.
	pub client_id: &'a str,
	/// OAuth client secret; empty secrets are not sent.
	pub client_secret: &'a Secret,
	/// Authorization endpoint.
	pub authorization_url: &'a Url,
	/// Token endpoint.
	pub token_url: &'a Url,
	/// Redirect URI registered with the provider.
	pub redirect_uri: &'a Url,
	/// Send client credentials in the request body rather than Basic auth.
	pub client_secret_post: bool,
	/// Scopes requested on the authorization URL.
	pub scopes: &'a ScopeList,
}

/// Tokens returned by a provider for one authentication attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
	/// Access token; empty when the set was built from a native ID token.
	pub access_token: Secret,
	/// Token type reported by the provider.
	pub token_type: String,
	/// Refresh token, when issued.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<Secret>,
	/// ID token, when issued.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<Secret>,
	/// Access-token expiry, when reported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<OffsetDateTime>,
	/// Scopes granted by the provider.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scopes: Vec<String>,
}
impl TokenSet {
	/// Token set wrapping an ID token presented by a native client.
	pub fn from_id_token(id_token: impl Into<Secret>) -> Self {
		Self {
			access_token: Secret::default(),
			token_type: "bearer".into(),
			refresh_token: None,
			id_token: Some(id_token.into()),
			expires_at: None,
			scopes: Vec::new(),
		}
	}

	/// Raw ID token, if present and non-empty.
	pub fn id_token(&self) -> Option<&str> {
		self.id_token.as_ref().map(Secret::expose).filter(|token| !token.is_empty())
	}
}

/// OAuth 2.0 client bound to one provider.
#[derive(Clone, Debug)]
pub struct OAuth2Client {
	inner: ConfiguredClient,
	http: ProviderHttpClient,
	scopes: ScopeList,
}
impl OAuth2Client {
	/// Builds a client from resolved endpoints.
	pub fn new(config: OAuth2ClientConfig<'_>, http: ProviderHttpClient) -> Self {
		let mut inner = Client::new(ClientId::new(config.client_id.to_owned()))
			.set_auth_uri(AuthUrl::from_url(config.authorization_url.clone()))
			.set_token_uri(TokenUrl::from_url(config.token_url.clone()))
			.set_redirect_uri(RedirectUrl::from_url(config.redirect_uri.clone()));

		if !config.client_secret.is_empty() {
			inner = inner.set_client_secret(ClientSecret::new(
				config.client_secret.expose().to_owned(),
			));
		}
		if config.client_secret_post {
			inner = inner.set_auth_type(AuthType::RequestBody);
		}

		Self { inner, http, scopes: config.scopes.clone() }
	}

	/// Authorization URL carrying `state`, the configured scopes, and `extra` parameters.
	pub fn auth_code_url(&self, state: &str, extra: &[(String, String)]) -> Url {
		let state = state.to_owned();
		let mut request = self.inner.authorize_url(move || CsrfToken::new(state));

		for scope in self.scopes.iter() {
			request = request.add_scope(Scope::new(scope.to_owned()));
		}
		for (key, value) in extra {
			request = request.add_extra_param(key, value);
		}

		let (url, _) = request.url();

		url
	}

	/// Exchanges an authorization code for tokens.
	pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http.instrumented(meta.clone());
		let response = self
			.inner
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.request_async(&instrumented)
			.await
			.map_err(|e| map_request_error(meta.take(), e))?;
		let expires_at = response
			.expires_in()
			.and_then(|expires_in| i64::try_from(expires_in.as_secs()).ok())
			.map(|secs| OffsetDateTime::now_utc() + Duration::seconds(secs));

		Ok(TokenSet {
			access_token: Secret::new(response.access_token().secret().to_owned()),
			token_type: response.token_type().as_ref().to_owned(),
			refresh_token: response
				.refresh_token()
				.map(|token| Secret::new(token.secret().to_owned())),
			id_token: response.extra_fields().id_token.clone().map(Secret::new),
			expires_at,
			scopes: response
				.scopes()
				.map(|scopes| scopes.iter().map(|scope| scope.to_string()).collect())
				.unwrap_or_default(),
		})
	}
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, meta),
		RequestTokenError::Request(error) => map_transport_error(meta, error),
		RequestTokenError::Parse(error, _body) =>
			TransientError::TokenResponseParse { source: error, status: meta_status(meta) }.into(),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let reason = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	match response.error() {
		BasicErrorResponseType::InvalidClient | BasicErrorResponseType::UnauthorizedClient =>
			Error::InvalidClient { reason },
		BasicErrorResponseType::Extension(code)
			if code == "temporarily_unavailable" || code == "server_error" =>
			TransientError::TokenEndpoint {
				message: reason,
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
		_ => Error::InvalidGrant { reason },
	}
}

fn map_transport_error(
	meta: Option<&ResponseMetadata>,
	err: HttpClientError<ReqwestError>,
) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!(
				"HTTP client error occurred while calling the token endpoint: {message}"
			),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;

	fn client(server: &MockServer, secret_post: bool) -> OAuth2Client {
		let authorization_url = Url::parse("https://idp.example.com/authorize")
			.expect("Authorization URL should parse.");
		let token_url = Url::parse(&server.url("/token")).expect("Token URL should parse.");
		let redirect_uri = Url::parse("https://app.example.com/callback/google")
			.expect("Redirect URI should parse.");
		let secret = Secret::new("shh");
		let scopes = ScopeList::new(["openid", "email"]).expect("Scopes should be valid.");

		OAuth2Client::new(
			OAuth2ClientConfig {
				client_id: "client-id",
				client_secret: &secret,
				authorization_url: &authorization_url,
				token_url: &token_url,
				redirect_uri: &redirect_uri,
				client_secret_post: secret_post,
				scopes: &scopes,
			},
			ProviderHttpClient::new().expect("HTTP client should build."),
		)
	}

	#[test]
	fn authorization_url_carries_state_scopes_and_extras() {
		let server = MockServer::start();
		let url = client(&server, false)
			.auth_code_url("state-1", &[("login_hint".into(), "a@example.com".into())]);
		let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();

		assert_eq!(pairs.get("state").map(String::as_str), Some("state-1"));
		assert_eq!(pairs.get("scope").map(String::as_str), Some("openid email"));
		assert_eq!(pairs.get("login_hint").map(String::as_str), Some("a@example.com"));
		assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(
			pairs.get("redirect_uri").map(String::as_str),
			Some("https://app.example.com/callback/google")
		);
	}

	#[tokio::test]
	async fn exchange_returns_id_token() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/token")
					.body_includes("code=abc")
					.body_includes("client_secret=shh");
				then.status(200).json_body(serde_json::json!({
					"access_token": "at",
					"token_type": "Bearer",
					"expires_in": 3600,
					"refresh_token": "rt",
					"id_token": "header.payload.signature"
				}));
			})
			.await;
		let tokens =
			client(&server, true).exchange_code("abc").await.expect("Exchange should succeed.");

		mock.assert_async().await;
		assert_eq!(tokens.access_token.expose(), "at");
		assert_eq!(tokens.id_token(), Some("header.payload.signature"));
		assert!(tokens.expires_at.is_some());
	}

	#[tokio::test]
	async fn exchange_classifies_oauth_errors() {
		let server = MockServer::start_async().await;

		server
			.mock_async(|when, then| {
				when.method(POST).path("/token");
				then.status(400).json_body(serde_json::json!({
					"error": "invalid_grant",
					"error_description": "code already used"
				}));
			})
			.await;

		let err = client(&server, false)
			.exchange_code("replayed")
			.await
			.expect_err("A replayed code should be rejected.");

		match err {
			Error::InvalidGrant { reason } => assert!(reason.contains("code already used")),
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn native_token_set_hides_empty_id_token() {
		assert_eq!(TokenSet::from_id_token("").id_token(), None);
		assert_eq!(TokenSet::from_id_token("jwt").id_token(), Some("jwt"));
	}
}
