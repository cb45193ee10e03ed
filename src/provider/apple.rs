//! Sign in with Apple client secrets, minted as short-lived ES256 JWTs.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
// self
use crate::{_prelude::*, error::ConfigError, provider::ProviderConfiguration, secret::Secret};

const APPLE_AUDIENCE: &str = "https://appleid.apple.com";
const SECRET_LIFETIME: Duration = Duration::hours(1);

#[derive(Serialize)]
struct SecretClaims<'a> {
	iss: &'a str,
	sub: &'a str,
	aud: &'a str,
	iat: i64,
	exp: i64,
}

/// Mints client secrets from a team id, key id, and PEM-encoded P-256 key.
#[derive(Clone)]
pub struct AppleSecretSigner {
	provider: String,
	team_id: String,
	key_id: String,
	client_id: String,
	key: EncodingKey,
}
impl AppleSecretSigner {
	/// Parses the signing key of `config`.
	///
	/// Returns `None` when the key triple is incomplete.
	pub fn from_config(config: &ProviderConfiguration) -> Result<Option<Self>, ConfigError> {
		let (Some(team_id), Some(key_id), Some(pem)) =
			(&config.apple_team_id, &config.apple_private_key_id, &config.apple_private_key)
		else {
			return Ok(None);
		};
		let key = EncodingKey::from_ec_pem(pem.expose().as_bytes()).map_err(|source| {
			ConfigError::ClientSecret { provider: config.id.to_string(), source }
		})?;

		Ok(Some(Self {
			provider: config.id.to_string(),
			team_id: team_id.clone(),
			key_id: key_id.clone(),
			client_id: config.client_id.clone(),
			key,
		}))
	}

	/// Signs a client secret valid for one hour from `now`.
	pub fn sign(&self, now: OffsetDateTime) -> Result<Secret, ConfigError> {
		let mut header = Header::new(Algorithm::ES256);

		header.kid = Some(self.key_id.clone());

		let claims = SecretClaims {
			iss: &self.team_id,
			sub: &self.client_id,
			aud: APPLE_AUDIENCE,
			iat: now.unix_timestamp(),
			exp: (now + SECRET_LIFETIME).unix_timestamp(),
		};

		encode(&header, &claims, &self.key)
			.map(Secret::new)
			.map_err(|source| ConfigError::ClientSecret { provider: self.provider.clone(), source })
	}
}
impl Debug for AppleSecretSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppleSecretSigner")
			.field("team_id", &self.team_id)
			.field("key_id", &self.key_id)
			.finish_non_exhaustive()
	}
}
