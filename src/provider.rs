//! Provider configuration, static kind profiles, and runtime providers.
//!
//! A [`ProviderConfiguration`] names one of the [`ProviderKind`]s. The [`ProviderRegistry`]
//! turns it into an [`Arc<dyn Provider>`] exposing an [`OAuth2Client`], claim extraction,
//! and, for kinds that support it, direct ID-token verification through [`IdTokenVerifier`].
//! Construction never touches the network; discovery and key sets are fetched on first use.

pub mod apple;
pub mod claims;
pub mod config;
pub mod configured;
pub mod discovery;
pub mod id;
pub mod kind;
pub mod registry;
pub mod scope;

mod id_token;

pub use apple::*;
pub use claims::*;
pub use config::*;
pub use configured::*;
pub use discovery::{DiscoveryDocument, ProviderEndpoints};
pub use id::*;
pub use kind::*;
pub use registry::*;
pub use scope::*;

// self
use crate::{
	_prelude::*,
	oauth::{OAuth2Client, TokenSet},
};

/// Boxed future returned by provider operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Runtime provider bound to one configuration entry.
pub trait Provider
where
	Self: Send + Sync + Debug,
{
	/// Configuration the provider was built from.
	fn config(&self) -> &ProviderConfiguration;

	/// Kind of the provider.
	fn kind(&self) -> ProviderKind;

	/// Redirect URI registered with the provider.
	fn redirect_uri(&self) -> &Url;

	/// OAuth 2.0 client for redirects and code exchanges.
	fn oauth2(&self) -> ProviderFuture<'_, OAuth2Client>;

	/// Fixed parameters added to every authorization URL.
	fn auth_code_url_options(&self) -> Vec<(String, String)>;

	/// Caller-supplied parameters the provider accepts, in request order.
	fn upstream_parameters(&self, requested: &BTreeMap<String, String>) -> Vec<(String, String)>;

	/// Claims asserted by the tokens of a completed code exchange.
	fn claims<'a>(&'a self, tokens: &'a TokenSet) -> ProviderFuture<'a, Claims>;

	/// Direct ID-token verification, for kinds whose native clients can obtain one.
	fn id_token_verifier(&self) -> Option<&dyn IdTokenVerifier>;

	/// Evaluates the configured claims mapper.
	fn map_claims<'a>(&'a self, claims: &'a Claims) -> ProviderFuture<'a, Value>;
}

/// Verifies ID tokens presented by native clients.
pub trait IdTokenVerifier
where
	Self: Send + Sync,
{
	/// Verifies `id_token` and returns its claims.
	fn claims_from_id_token<'a>(&'a self, id_token: &'a str) -> ProviderFuture<'a, Claims>;
}

/// Turns provider claims into identity traits.
pub trait ClaimsMapper
where
	Self: Send + Sync + Debug,
{
	/// Evaluates `mapper_url` against `claims`.
	fn map<'a>(&'a self, mapper_url: &'a str, claims: &'a Claims) -> ProviderFuture<'a, Value>;
}

/// Mapper returning `{"traits": <claims>}` regardless of the mapper reference.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClaimsPassthroughMapper;
impl ClaimsMapper for ClaimsPassthroughMapper {
	fn map<'a>(&'a self, _: &'a str, claims: &'a Claims) -> ProviderFuture<'a, Value> {
		Box::pin(async move {
			let traits = serde_json::to_value(claims).map_err(|e| {
				Error::internal("Unable to map provider claims.", e.to_string())
			})?;

			Ok(serde_json::json!({ "traits": traits }))
		})
	}
}
