//! ID-token signature and claim validation against a provider's JSON Web Key Set.

// crates.io
use jsonwebtoken::{
	Algorithm, DecodingKey, Validation, decode, decode_header,
	jwk::{Jwk, JwkSet},
};
// self
use crate::{_prelude::*, http::ProviderHttpClient, provider::Claims};

const REQUIRED_CLAIMS: [&str; 4] = ["exp", "iss", "aud", "sub"];

/// Lazily fetched key set, refetched once when a token names an unknown key.
#[derive(Debug)]
pub(crate) struct JwksCache {
	keys: RwLock<Option<Arc<JwkSet>>>,
}
impl JwksCache {
	pub(crate) fn new() -> Self {
		Self { keys: RwLock::new(None) }
	}

	async fn key(&self, http: &ProviderHttpClient, url: &Url, kid: Option<&str>) -> Result<Jwk> {
		let cached = self.keys.read().clone();

		if let Some(key) = cached.as_deref().and_then(|keys| select(keys, kid)) {
			return Ok(key);
		}

		let fresh: Arc<JwkSet> = Arc::new(http.get_json("jwks", url, None, None).await?);

		*self.keys.write() = Some(Arc::clone(&fresh));

		select(&fresh, kid).ok_or_else(|| Error::InvalidIdToken {
			reason: match kid {
				Some(kid) => format!("no signing key matches key id `{kid}`"),
				None => "the token names no key id and the key set is ambiguous".into(),
			},
		})
	}
}

/// What a verified token must assert.
pub(crate) struct Expectations<'a> {
	pub(crate) issuer: &'a str,
	pub(crate) audiences: &'a [String],
}

/// Verifies `token` and returns its claims.
pub(crate) async fn verify(
	http: &ProviderHttpClient,
	jwks_url: &Url,
	cache: &JwksCache,
	token: &str,
	expect: Expectations<'_>,
) -> Result<Claims> {
	let header = decode_header(token).map_err(invalid)?;

	if matches!(header.alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
		return Err(Error::InvalidIdToken {
			reason: format!("symmetric algorithm {:?} is not accepted", header.alg),
		});
	}

	let jwk = cache.key(http, jwks_url, header.kid.as_deref()).await?;
	let key = DecodingKey::from_jwk(&jwk).map_err(invalid)?;
	let mut validation = Validation::new(header.alg);

	validation.set_issuer(&[expect.issuer]);
	validation.set_audience(expect.audiences);
	validation.set_required_spec_claims(&REQUIRED_CLAIMS);

	let data = decode::<Value>(token, &key, &validation).map_err(invalid)?;

	Claims::from_document(data.claims, "sub")
}

fn select(keys: &JwkSet, kid: Option<&str>) -> Option<Jwk> {
	match kid {
		Some(kid) => keys.find(kid).cloned(),
		None if keys.keys.len() == 1 => keys.keys.first().cloned(),
		None => None,
	}
}

fn invalid(err: jsonwebtoken::errors::Error) -> Error {
	Error::InvalidIdToken { reason: err.to_string() }
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::_preludet::{TEST_KEY_ID, sign_id_token, test_jwks};

	#[tokio::test]
	async fn verifies_and_caches_keys() {
		let server = MockServer::start_async().await;
		let keys = server
			.mock_async(|when, then| {
				when.method(GET).path("/keys");
				then.status(200).json_body(test_jwks());
			})
			.await;
		let http = ProviderHttpClient::new().expect("HTTP client should build.");
		let url = Url::parse(&server.url("/keys")).expect("JWKS URL should parse.");
		let cache = JwksCache::new();
		let audiences = vec!["client".to_owned()];
		let token = sign_id_token(serde_json::json!({
			"iss": "https://accounts.example.com",
			"aud": "client",
			"sub": "sub-123",
			"email": "a@example.com",
			"exp": OffsetDateTime::now_utc().unix_timestamp() + 600
		}));

		for _ in 0..2 {
			let claims = verify(
				&http,
				&url,
				&cache,
				&token,
				Expectations { issuer: "https://accounts.example.com", audiences: &audiences },
			)
			.await
			.expect("A valid token should verify.");

			assert_eq!(claims.subject, "sub-123");
			assert_eq!(claims.email(), Some("a@example.com"));
		}

		keys.assert_calls_async(1).await;
	}

	#[tokio::test]
	async fn rejects_wrong_audience_and_unknown_keys() {
		let server = MockServer::start_async().await;

		server
			.mock_async(|when, then| {
				when.method(GET).path("/keys");
				then.status(200).json_body(test_jwks());
			})
			.await;

		let http = ProviderHttpClient::new().expect("HTTP client should build.");
		let url = Url::parse(&server.url("/keys")).expect("JWKS URL should parse.");
		let cache = JwksCache::new();
		let audiences = vec!["client".to_owned()];
		let claims = serde_json::json!({
			"iss": "https://accounts.example.com",
			"aud": "someone-else",
			"sub": "sub-123",
			"exp": OffsetDateTime::now_utc().unix_timestamp() + 600
		});
		let err = verify(
			&http,
			&url,
			&cache,
			&sign_id_token(claims),
			Expectations { issuer: "https://accounts.example.com", audiences: &audiences },
		)
		.await
		.expect_err("A foreign audience must be rejected.");

		assert!(matches!(err, Error::InvalidIdToken { .. }));

		let keys: JwkSet =
			serde_json::from_value(test_jwks()).expect("Test JWKS should deserialize.");

		assert!(select(&keys, Some("other")).is_none());
		assert!(select(&keys, Some(TEST_KEY_ID)).is_some());
	}
}
