//! Bridge-level error types shared across providers, flows, and the login strategy.

// self
use crate::{_prelude::*, flow::FlowType, provider::ProviderId};

/// Bridge-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical bridge error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Continuity container could not be resumed.
	#[error(transparent)]
	Continuity(#[from] crate::continuity::ContinuityError),
	/// Persistence-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::PersistenceError,
	),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The login method is switched off in configuration.
	#[error("The `{method}` login method is disabled.")]
	MethodDisabled {
		/// Strategy identifier.
		method: &'static str,
	},
	/// No configured provider carries the requested identifier.
	#[error("OpenID Connect provider `{provider}` is unknown or has not been configured.")]
	ProviderUnknown {
		/// Identifier supplied by the caller.
		provider: String,
	},
	/// API flows must present an ID token obtained by the native client.
	#[error("The `id_token` field is required when logging in through an API flow.")]
	IdTokenMissing,
	/// Provider cannot verify ID tokens directly.
	#[error("Provider `{provider}` does not support logging in through an API flow.")]
	ProviderNoApiSupport {
		/// Provider identifier.
		provider: ProviderId,
	},
	/// Identity matched by identifier but no linked provider entry matched.
	#[error("Unable to find matching OpenID Connect credentials.")]
	CredentialsMismatch {
		/// Provider identifier asserted by the callback.
		provider: ProviderId,
		/// Subject asserted by the provider.
		subject: String,
	},
	/// The flow outlived its lifespan.
	#[error("The login flow expired at {expired_at}.")]
	FlowExpired {
		/// Expired flow identifier.
		flow_id: Uuid,
		/// Instant the flow expired.
		expired_at: OffsetDateTime,
	},
	/// The request payload could not be used.
	#[error("The request is malformed: {reason}.")]
	BadRequest {
		/// Human-readable explanation.
		reason: String,
	},
	/// The provider redirected back with an OAuth error.
	#[error("The upstream provider returned an error: {error}.")]
	Upstream {
		/// OAuth `error` parameter.
		error: String,
		/// OAuth `error_description` parameter.
		description: Option<String>,
	},
	/// Provider rejected the grant (e.g., bad or replayed code).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or bridge-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or bridge-supplied reason string.
		reason: String,
	},
	/// ID token failed signature or claim validation.
	#[error("The ID token is invalid: {reason}.")]
	InvalidIdToken {
		/// Validation failure summary.
		reason: String,
	},
	/// Internal inconsistency; details stay server side.
	#[error("{reason}")]
	Internal {
		/// Public reason.
		reason: String,
		/// Server-side debug detail.
		debug: Option<String>,
	},
}
impl Error {
	/// Builds an internal error with server-side debug detail.
	pub fn internal(reason: impl Into<String>, debug: impl Into<String>) -> Self {
		Self::Internal { reason: reason.into(), debug: Some(debug.into()) }
	}

	/// Builds a bad-request error.
	pub fn bad_request(reason: impl Into<String>) -> Self {
		Self::BadRequest { reason: reason.into() }
	}

	/// Error class used to pick the response status.
	pub fn class(&self) -> ErrorClass {
		use crate::continuity::ContinuityError;

		match self {
			Self::Config(_)
			| Self::Storage(_)
			| Self::Internal { .. }
			| Self::CredentialsMismatch { .. }
			| Self::InvalidClient { .. }
			| Self::Continuity(ContinuityError::Serialization { .. }) => ErrorClass::Internal,
			Self::Continuity(ContinuityError::Expired { .. }) | Self::FlowExpired { .. } =>
				ErrorClass::Gone,
			Self::Continuity(_) => ErrorClass::BadRequest,
			Self::Transient(_) | Self::Transport(_) => ErrorClass::BadGateway,
			Self::MethodDisabled { .. } => ErrorClass::Forbidden,
			Self::ProviderUnknown { .. } => ErrorClass::NotFound,
			Self::IdTokenMissing
			| Self::ProviderNoApiSupport { .. }
			| Self::BadRequest { .. }
			| Self::Upstream { .. }
			| Self::InvalidGrant { .. }
			| Self::InvalidIdToken { .. } => ErrorClass::BadRequest,
		}
	}

	/// Stable machine-readable identifier.
	pub fn id(&self) -> &'static str {
		match self {
			Self::Config(ConfigError::ProviderKindUnsupported { .. }) =>
				"provider_kind_unsupported",
			Self::Config(_) => "configuration_error",
			Self::Continuity(e) => e.id(),
			Self::Storage(_) => "storage_error",
			Self::Transient(_) => "provider_unavailable",
			Self::Transport(_) => "provider_unreachable",
			Self::MethodDisabled { .. } => "method_disabled",
			Self::ProviderUnknown { .. } => "provider_unknown",
			Self::IdTokenMissing => "id_token_missing",
			Self::ProviderNoApiSupport { .. } => "provider_no_api_support",
			Self::CredentialsMismatch { .. } => "credentials_mismatch",
			Self::FlowExpired { .. } => "self_service_flow_expired",
			Self::BadRequest { .. } => "bad_request",
			Self::Upstream { .. } => "upstream_error",
			Self::InvalidGrant { .. } => "invalid_grant",
			Self::InvalidClient { .. } => "invalid_client",
			Self::InvalidIdToken { .. } => "invalid_id_token",
			Self::Internal { .. } => "internal_server_error",
		}
	}

	/// Server-side detail that must never reach end users.
	pub fn debug(&self) -> Option<String> {
		match self {
			Self::CredentialsMismatch { provider, subject } => Some(format!(
				"Unable to find credentials that match the given provider \"{provider}\" and subject \"{subject}\"."
			)),
			Self::Internal { debug, .. } => debug.clone(),
			Self::Upstream { description, .. } => description.clone(),
			Self::Config(e) => StdError::source(e).map(ToString::to_string),
			Self::Storage(e) => Some(e.to_string()),
			_ => None,
		}
	}
}

/// Coarse error classes mapped onto HTTP status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
	/// Caller supplied an unusable request.
	BadRequest,
	/// Request is understood but not allowed.
	Forbidden,
	/// Referenced resource does not exist.
	NotFound,
	/// Referenced resource existed but has expired.
	Gone,
	/// Server-side failure or inconsistency.
	Internal,
	/// Upstream provider failure.
	BadGateway,
}
impl ErrorClass {
	/// HTTP status code for the class.
	pub const fn status_code(self) -> u16 {
		match self {
			ErrorClass::BadRequest => 400,
			ErrorClass::Forbidden => 403,
			ErrorClass::NotFound => 404,
			ErrorClass::Gone => 410,
			ErrorClass::Internal => 500,
			ErrorClass::BadGateway => 502,
		}
	}

	/// Canonical HTTP reason phrase.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorClass::BadRequest => "Bad Request",
			ErrorClass::Forbidden => "Forbidden",
			ErrorClass::NotFound => "Not Found",
			ErrorClass::Gone => "Gone",
			ErrorClass::Internal => "Internal Server Error",
			ErrorClass::BadGateway => "Bad Gateway",
		}
	}
}
impl Display for ErrorClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised by the bridge.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// The configured provider kind has no registered constructor.
	#[error(
		"Provider kind `{kind}` is not supported; supported kinds are: {}.",
		.supported.join(", ")
	)]
	ProviderKindUnsupported {
		/// Kind string found in configuration.
		kind: String,
		/// Every kind the registry can construct.
		supported: Vec<&'static str>,
	},
	/// Two providers share the same identifier.
	#[error("Provider identifier `{id}` is configured more than once.")]
	DuplicateProvider {
		/// Duplicated identifier.
		id: String,
	},
	/// A kind-specific field is missing.
	#[error("Provider `{provider}` is missing the `{field}` field.")]
	MissingField {
		/// Provider identifier.
		provider: String,
		/// Missing field name.
		field: &'static str,
	},
	/// A configured URL cannot be parsed.
	#[error("Provider `{provider}` has an invalid `{field}` URL.")]
	InvalidUrl {
		/// Provider identifier.
		provider: String,
		/// Offending field name.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The base redirect URI cannot carry the callback path.
	#[error("Base redirect URI `{url}` must be an http(s) URL.")]
	InvalidBaseRedirect {
		/// Offending URI.
		url: String,
	},
	/// The discovery document names a different issuer than the configured one.
	#[error("Provider `{provider}` discovered issuer `{found}` but `{expected}` is configured.")]
	IssuerMismatch {
		/// Provider identifier.
		provider: String,
		/// Configured issuer.
		expected: String,
		/// Issuer named by the discovery document.
		found: String,
	},
	/// Identifier validation failed.
	#[error("Configuration contains an invalid identifier.")]
	InvalidIdentifier(#[from] crate::provider::IdentifierError),
	/// Configuration document could not be parsed.
	#[error("Configuration document could not be parsed at `{}`.", .source.path())]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Configuration file could not be read.
	#[error("Configuration file {path} could not be read.")]
	Io {
		/// File path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Client secret could not be minted for the provider.
	#[error("Client secret for provider `{provider}` could not be generated.")]
	ClientSecret {
		/// Provider identifier.
		provider: String,
		/// Signing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or bridge-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Discovery, JWKS, or userinfo endpoint did not answer in time.
	#[error("The {endpoint} endpoint timed out.")]
	ProviderTimeout {
		/// Endpoint label.
		endpoint: &'static str,
	},
	/// Discovery, JWKS, or userinfo endpoint returned a body that could not be decoded.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	ProviderResponseParse {
		/// Endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Discovery, JWKS, or userinfo endpoint answered with a failure status.
	#[error("The {endpoint} endpoint responded with HTTP {status}.")]
	ProviderEndpoint {
		/// Endpoint label.
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failure annotated with the provider, flow, and container context it happened in.
///
/// Every failure leaving [`OidcStrategy`](crate::strategy::OidcStrategy) is a
/// `LoginError`; the caller turns it into UI errors on the flow or a JSON body.
#[derive(Debug, ThisError)]
#[error("OpenID Connect login failed: {source}")]
pub struct LoginError {
	/// Provider the attempt targeted, once known.
	pub provider: Option<ProviderId>,
	/// Originating login flow, unknown only when a callback cannot be tied to one.
	pub flow_id: Option<Uuid>,
	/// Originating flow type.
	pub flow_type: Option<FlowType>,
	/// Traits carried by the request or the continuity container.
	pub traits: Option<Value>,
	/// Registration flow created by a pivot before the failure, if any.
	pub registration_flow_id: Option<Uuid>,
	/// Underlying failure.
	#[source]
	pub source: Error,
}
impl LoginError {
	/// Error class of the underlying failure.
	pub fn class(&self) -> ErrorClass {
		self.source.class()
	}

	/// JSON body rendered for API clients.
	pub fn body(&self) -> ErrorBody {
		let class = self.class();

		ErrorBody {
			id: self.source.id().into(),
			code: class.status_code(),
			status: class.as_str().into(),
			reason: self.source.to_string(),
		}
	}
}

/// Machine-readable error body returned to API clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Stable error identifier.
	pub id: String,
	/// HTTP status code.
	pub code: u16,
	/// HTTP reason phrase.
	pub status: String,
	/// Human-readable reason.
	pub reason: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::continuity::ContinuityError;

	#[test]
	fn unsupported_kind_lists_supported_kinds() {
		let err = Error::from(ConfigError::ProviderKindUnsupported {
			kind: "myspace".into(),
			supported: vec!["generic", "google"],
		});
		let message = err.to_string();

		assert!(message.contains("myspace"));
		assert!(message.contains("generic, google"));
		assert_eq!(err.id(), "provider_kind_unsupported");
	}

	#[test]
	fn credentials_mismatch_is_internal_and_hides_details() {
		let provider = ProviderId::new("google").expect("Provider fixture should be valid.");
		let err = Error::CredentialsMismatch { provider, subject: "sub-123".into() };

		assert_eq!(err.class(), ErrorClass::Internal);
		assert!(!err.to_string().contains("sub-123"));
		assert!(err.debug().expect("Debug detail should be retained.").contains("sub-123"));
	}

	#[test]
	fn expiry_errors_are_gone() {
		let err = Error::from(ContinuityError::Expired { expired_at: OffsetDateTime::UNIX_EPOCH });

		assert_eq!(err.class(), ErrorClass::Gone);
		assert_eq!(err.class().status_code(), 410);
	}

	#[test]
	fn login_error_body_carries_kind_and_reason() {
		let err = LoginError {
			provider: None,
			flow_id: Some(Uuid::new_v4()),
			flow_type: Some(FlowType::Api),
			traits: None,
			registration_flow_id: None,
			source: Error::IdTokenMissing,
		};
		let body = err.body();

		assert_eq!(body.id, "id_token_missing");
		assert_eq!(body.code, 400);
		assert!(body.reason.contains("id_token"));
	}
}
