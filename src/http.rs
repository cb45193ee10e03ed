//! Transport primitives for token exchanges and provider metadata requests.
//!
//! [`ProviderHttpClient`] wraps a reqwest client. Token exchanges go through short-lived
//! [`InstrumentedHandle`]s implementing [`AsyncHttpClient`] so the status and `Retry-After`
//! hint of the last response reach error classification through a [`ResponseMetadataSlot`].
//! Discovery, JWKS, and userinfo requests use [`ProviderHttpClient::get_json`].

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::{
	header::{ACCEPT, HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError, TransportError},
};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Metadata from the most recent HTTP response, used for error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, if a response arrived.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Shared HTTP client used for every provider request.
///
/// Redirects are never followed: token, discovery, and userinfo endpoints answer directly.
#[derive(Clone, Debug)]
pub struct ProviderHttpClient(ReqwestClient);
impl ProviderHttpClient {
	/// Builds the default client.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(Policy::none())
			.user_agent(USER_AGENT)
			.timeout(REQUEST_TIMEOUT)
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest client. It should not follow redirects.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds an [`AsyncHttpClient`] handle recording outcomes in `slot`.
	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle(Arc::new(InstrumentedHttpClient { client: self.0.clone(), slot }))
	}

	/// GETs `url` and decodes the JSON body.
	///
	/// `token` is sent as `Authorization: Bearer` unless `token_header` names another header.
	pub(crate) async fn get_json<T>(
		&self,
		endpoint: &'static str,
		url: &Url,
		token: Option<&str>,
		token_header: Option<&'static str>,
	) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut request = self.0.get(url.clone()).header(ACCEPT, "application/json");

		if let Some(token) = token {
			request = match token_header {
				Some(name) => request.header(name, token),
				None => request.bearer_auth(token),
			};
		}

		let response = request.send().await.map_err(|e| map_reqwest_error(endpoint, e))?;
		let status = response.status();

		if !status.is_success() {
			return Err(
				TransientError::ProviderEndpoint { endpoint, status: status.as_u16() }.into()
			);
		}

		let bytes = response.bytes().await.map_err(|e| map_reqwest_error(endpoint, e))?;
		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| TransientError::ProviderResponseParse { endpoint, source }.into())
	}
}
impl Deref for ProviderHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// [`AsyncHttpClient`] handle returned by [`ProviderHttpClient`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut converted =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

fn map_reqwest_error(endpoint: &'static str, err: ReqwestError) -> Error {
	if err.is_timeout() {
		return TransientError::ProviderTimeout { endpoint }.into();
	}

	TransportError::from(err).into()
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
