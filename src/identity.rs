//! Identity records, credentials, and authenticator assurance levels.

// self
use crate::_prelude::*;

/// Authenticator assurance level reached by (or required of) a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aal {
	/// Nothing completed yet.
	#[default]
	Aal0,
	/// One factor completed.
	Aal1,
	/// Two factors completed.
	Aal2,
	/// Hardware-backed second factor completed.
	Aal3,
}

/// Credential kinds an identity may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsType {
	/// Password credentials.
	Password,
	/// OpenID Connect credentials linked through this bridge.
	Oidc,
	/// Time-based one-time passwords.
	Totp,
	/// WebAuthn authenticators.
	#[serde(rename = "webauthn")]
	WebAuthn,
	/// Recovery codes.
	LookupSecret,
}
impl CredentialsType {
	/// Returns the wire identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialsType::Password => "password",
			CredentialsType::Oidc => "oidc",
			CredentialsType::Totp => "totp",
			CredentialsType::WebAuthn => "webauthn",
			CredentialsType::LookupSecret => "lookup_secret",
		}
	}
}
impl Display for CredentialsType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Credentials of a single type attached to an identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
	/// Credential kind.
	#[serde(rename = "type")]
	pub credentials_type: CredentialsType,
	/// Unique identifiers this credential can be found by.
	#[serde(default)]
	pub identifiers: Vec<String>,
	/// Kind-specific configuration, stored as raw JSON.
	#[serde(default)]
	pub config: Value,
	/// Configuration schema version.
	#[serde(default)]
	pub version: u32,
}
impl Credentials {
	/// Builds OIDC credentials linking every `(provider, subject)` pair in `config`.
	pub fn oidc(config: &CredentialsOidc) -> serde_json::Result<Self> {
		Ok(Self {
			credentials_type: CredentialsType::Oidc,
			identifiers: config
				.providers
				.iter()
				.map(|p| oidc_unique_id(&p.provider, &p.subject))
				.collect(),
			config: serde_json::to_value(config)?,
			version: 0,
		})
	}

	/// Decodes the stored configuration as OIDC credentials.
	pub fn decode_oidc(&self) -> serde_json::Result<CredentialsOidc> {
		CredentialsOidc::deserialize(&self.config)
	}
}

/// Stored configuration of OIDC credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsOidc {
	/// Linked provider accounts.
	#[serde(default)]
	pub providers: Vec<CredentialsOidcProvider>,
}
impl CredentialsOidc {
	/// Returns the linked entry matching the asserted `(provider, subject)` pair.
	pub fn find(&self, provider: &str, subject: &str) -> Option<&CredentialsOidcProvider> {
		self.providers.iter().find(|p| p.provider == provider && p.subject == subject)
	}
}

/// One provider account linked to an identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsOidcProvider {
	/// Subject asserted by the provider.
	pub subject: String,
	/// Provider identifier from configuration.
	pub provider: String,
	/// ID token issued when the account was linked.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub initial_id_token: String,
	/// Access token issued when the account was linked.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub initial_access_token: String,
	/// Refresh token issued when the account was linked.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub initial_refresh_token: String,
}

/// Identity known to the local store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
	/// Identity identifier.
	pub id: Uuid,
	/// Identity schema the traits validate against.
	pub schema_id: String,
	/// Schema-defined traits.
	#[serde(default)]
	pub traits: Value,
	/// Credentials keyed by type.
	#[serde(default)]
	pub credentials: BTreeMap<CredentialsType, Credentials>,
}
impl Identity {
	/// Creates an identity without credentials.
	pub fn new(schema_id: impl Into<String>, traits: Value) -> Self {
		Self {
			id: Uuid::new_v4(),
			schema_id: schema_id.into(),
			traits,
			credentials: BTreeMap::new(),
		}
	}

	/// Attaches credentials, replacing any of the same type.
	pub fn with_credentials(mut self, credentials: Credentials) -> Self {
		self.credentials.insert(credentials.credentials_type, credentials);

		self
	}

	/// Returns credentials of the given type.
	pub fn credentials(&self, credentials_type: CredentialsType) -> Option<&Credentials> {
		self.credentials.get(&credentials_type)
	}
}

/// Unique credential identifier of an OIDC account: `{provider}:{subject}`.
pub fn oidc_unique_id(provider: &str, subject: &str) -> String {
	format!("{provider}:{subject}")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn unique_id_joins_provider_and_subject() {
		assert_eq!(oidc_unique_id("google", "sub-123"), "google:sub-123");
	}

	#[test]
	fn aal_orders_by_strength() {
		assert!(Aal::Aal1 > Aal::Aal0);
		assert!(Aal::Aal2 > Aal::Aal1);
		assert_eq!(
			serde_json::to_string(&Aal::Aal1).expect("AAL should serialize to JSON."),
			"\"aal1\""
		);
	}

	#[test]
	fn oidc_credentials_round_trip_through_config() {
		let config = CredentialsOidc {
			providers: vec![CredentialsOidcProvider {
				subject: "sub-123".into(),
				provider: "google".into(),
				..Default::default()
			}],
		};
		let credentials = Credentials::oidc(&config).expect("OIDC credentials should encode.");

		assert_eq!(credentials.identifiers, vec!["google:sub-123".to_owned()]);

		let decoded = credentials.decode_oidc().expect("OIDC credentials should decode.");

		assert!(decoded.find("google", "sub-123").is_some());
		assert!(decoded.find("google", "sub-999").is_none());
		assert!(decoded.find("github", "sub-123").is_none());
	}

	#[test]
	fn malformed_config_fails_to_decode() {
		let credentials = Credentials {
			credentials_type: CredentialsType::Oidc,
			identifiers: vec!["google:sub-123".into()],
			config: serde_json::json!({ "providers": "oops" }),
			version: 0,
		};

		assert!(credentials.decode_oidc().is_err());
	}
}
