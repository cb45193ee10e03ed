//! Supported provider kinds and their static profiles.

// self
use crate::{_prelude::*, error::ConfigError};

/// Provider kinds the registry can construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
	/// Any OpenID Connect compliant provider.
	Generic,
	/// Google.
	Google,
	/// GitHub OAuth app.
	#[serde(rename = "github")]
	GitHub,
	/// GitHub app.
	#[serde(rename = "github-app")]
	GitHubApp,
	/// GitLab.
	#[serde(rename = "gitlab")]
	GitLab,
	/// Microsoft identity platform.
	Microsoft,
	/// Discord.
	Discord,
	/// Slack.
	Slack,
	/// Facebook.
	Facebook,
	/// Auth0 tenant.
	Auth0,
	/// VK.
	Vk,
	/// Yandex.
	Yandex,
	/// Sign in with Apple.
	Apple,
	/// Spotify.
	Spotify,
	/// netID.
	#[serde(rename = "netid")]
	NetId,
	/// DingTalk.
	#[serde(rename = "dingtalk")]
	DingTalk,
	/// LinkedIn.
	#[serde(rename = "linkedin")]
	LinkedIn,
	/// Patreon.
	Patreon,
}
impl ProviderKind {
	/// Every supported kind, in documentation order.
	pub const ALL: [ProviderKind; 18] = [
		ProviderKind::Generic,
		ProviderKind::Google,
		ProviderKind::GitHub,
		ProviderKind::GitHubApp,
		ProviderKind::GitLab,
		ProviderKind::Microsoft,
		ProviderKind::Discord,
		ProviderKind::Slack,
		ProviderKind::Facebook,
		ProviderKind::Auth0,
		ProviderKind::Vk,
		ProviderKind::Yandex,
		ProviderKind::Apple,
		ProviderKind::Spotify,
		ProviderKind::NetId,
		ProviderKind::DingTalk,
		ProviderKind::LinkedIn,
		ProviderKind::Patreon,
	];

	/// Returns the configuration identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			ProviderKind::Generic => "generic",
			ProviderKind::Google => "google",
			ProviderKind::GitHub => "github",
			ProviderKind::GitHubApp => "github-app",
			ProviderKind::GitLab => "gitlab",
			ProviderKind::Microsoft => "microsoft",
			ProviderKind::Discord => "discord",
			ProviderKind::Slack => "slack",
			ProviderKind::Facebook => "facebook",
			ProviderKind::Auth0 => "auth0",
			ProviderKind::Vk => "vk",
			ProviderKind::Yandex => "yandex",
			ProviderKind::Apple => "apple",
			ProviderKind::Spotify => "spotify",
			ProviderKind::NetId => "netid",
			ProviderKind::DingTalk => "dingtalk",
			ProviderKind::LinkedIn => "linkedin",
			ProviderKind::Patreon => "patreon",
		}
	}

	/// Configuration identifiers of every supported kind.
	pub fn supported() -> Vec<&'static str> {
		Self::ALL.iter().map(|kind| kind.as_str()).collect()
	}

	/// Static defaults for the kind.
	pub fn profile(self) -> &'static ProviderProfile {
		match self {
			ProviderKind::Generic => &GENERIC,
			ProviderKind::Google => &GOOGLE,
			ProviderKind::GitHub => &GITHUB,
			ProviderKind::GitHubApp => &GITHUB_APP,
			ProviderKind::GitLab => &GITLAB,
			ProviderKind::Microsoft => &MICROSOFT,
			ProviderKind::Discord => &DISCORD,
			ProviderKind::Slack => &SLACK,
			ProviderKind::Facebook => &FACEBOOK,
			ProviderKind::Auth0 => &AUTH0,
			ProviderKind::Vk => &VK,
			ProviderKind::Yandex => &YANDEX,
			ProviderKind::Apple => &APPLE,
			ProviderKind::Spotify => &SPOTIFY,
			ProviderKind::NetId => &NETID,
			ProviderKind::DingTalk => &DINGTALK,
			ProviderKind::LinkedIn => &LINKEDIN,
			ProviderKind::Patreon => &PATREON,
		}
	}
}
impl Display for ProviderKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ProviderKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL.into_iter().find(|kind| kind.as_str() == s).ok_or_else(|| {
			ConfigError::ProviderKindUnsupported {
				kind: s.to_owned(),
				supported: Self::supported(),
			}
		})
	}
}

/// Defaults shared by every provider of one kind.
///
/// URLs may contain a `{tenant}` placeholder, substituted from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderProfile {
	/// Expected `iss` of ID tokens.
	pub issuer: Option<&'static str>,
	/// Authorization endpoint.
	pub authorization_url: Option<&'static str>,
	/// Token endpoint.
	pub token_url: Option<&'static str>,
	/// Userinfo endpoint.
	pub userinfo_url: Option<&'static str>,
	/// JSON Web Key Set used to verify ID tokens.
	pub jwks_url: Option<&'static str>,
	/// Scopes requested when configuration names none.
	pub default_scopes: &'static [&'static str],
	/// Dotted path of the subject within the userinfo document.
	pub subject_field: &'static str,
	/// Whether native clients may log in with an ID token issued to them directly.
	pub verifies_id_tokens: bool,
	/// Upstream parameters forwarded to the authorization endpoint.
	pub upstream_parameters: &'static [&'static str],
	/// Fixed authorization parameters.
	pub authorization_parameters: &'static [(&'static str, &'static str)],
	/// Whether client credentials go in the token request body instead of Basic auth.
	pub client_secret_post: bool,
	/// Header carrying the access token on userinfo requests; `None` uses a bearer token.
	pub userinfo_token_header: Option<&'static str>,
}

const BASE: ProviderProfile = ProviderProfile {
	issuer: None,
	authorization_url: None,
	token_url: None,
	userinfo_url: None,
	jwks_url: None,
	default_scopes: &[],
	subject_field: "sub",
	verifies_id_tokens: false,
	upstream_parameters: &["login_hint"],
	authorization_parameters: &[],
	client_secret_post: false,
	userinfo_token_header: None,
};
const GENERIC: ProviderProfile = ProviderProfile {
	default_scopes: &["openid"],
	upstream_parameters: &["login_hint", "prompt"],
	..BASE
};
const GOOGLE: ProviderProfile = ProviderProfile {
	issuer: Some("https://accounts.google.com"),
	authorization_url: Some("https://accounts.google.com/o/oauth2/v2/auth"),
	token_url: Some("https://oauth2.googleapis.com/token"),
	userinfo_url: Some("https://openidconnect.googleapis.com/v1/userinfo"),
	jwks_url: Some("https://www.googleapis.com/oauth2/v3/certs"),
	default_scopes: &["openid", "email", "profile"],
	verifies_id_tokens: true,
	upstream_parameters: &["login_hint", "hd", "prompt"],
	..BASE
};
const GITHUB: ProviderProfile = ProviderProfile {
	authorization_url: Some("https://github.com/login/oauth/authorize"),
	token_url: Some("https://github.com/login/oauth/access_token"),
	userinfo_url: Some("https://api.github.com/user"),
	default_scopes: &["user:email"],
	subject_field: "id",
	..BASE
};
const GITHUB_APP: ProviderProfile = ProviderProfile { default_scopes: &[], ..GITHUB };
const GITLAB: ProviderProfile = ProviderProfile {
	issuer: Some("https://gitlab.com"),
	authorization_url: Some("https://gitlab.com/oauth/authorize"),
	token_url: Some("https://gitlab.com/oauth/token"),
	userinfo_url: Some("https://gitlab.com/oauth/userinfo"),
	jwks_url: Some("https://gitlab.com/oauth/discovery/keys"),
	default_scopes: &["openid", "email", "profile"],
	..BASE
};
const MICROSOFT: ProviderProfile = ProviderProfile {
	issuer: Some("https://login.microsoftonline.com/{tenant}/v2.0"),
	authorization_url: Some("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/authorize"),
	token_url: Some("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token"),
	userinfo_url: Some("https://graph.microsoft.com/oidc/userinfo"),
	default_scopes: &["openid", "email", "profile"],
	upstream_parameters: &["login_hint", "prompt", "domain_hint"],
	..BASE
};
const DISCORD: ProviderProfile = ProviderProfile {
	authorization_url: Some("https://discord.com/api/oauth2/authorize"),
	token_url: Some("https://discord.com/api/oauth2/token"),
	userinfo_url: Some("https://discord.com/api/users/@me"),
	default_scopes: &["identify", "email"],
	subject_field: "id",
	upstream_parameters: &["prompt"],
	..BASE
};
const SLACK: ProviderProfile = ProviderProfile {
	issuer: Some("https://slack.com"),
	authorization_url: Some("https://slack.com/openid/connect/authorize"),
	token_url: Some("https://slack.com/api/openid.connect.token"),
	userinfo_url: Some("https://slack.com/api/openid.connect.userInfo"),
	jwks_url: Some("https://slack.com/openid/connect/keys"),
	default_scopes: &["openid", "email", "profile"],
	..BASE
};
const FACEBOOK: ProviderProfile = ProviderProfile {
	authorization_url: Some("https://www.facebook.com/v17.0/dialog/oauth"),
	token_url: Some("https://graph.facebook.com/v17.0/oauth/access_token"),
	userinfo_url: Some("https://graph.facebook.com/me?fields=id,name,first_name,last_name,email"),
	default_scopes: &["email", "public_profile"],
	subject_field: "id",
	upstream_parameters: &[],
	client_secret_post: true,
	..BASE
};
const AUTH0: ProviderProfile = ProviderProfile {
	default_scopes: &["openid", "email", "profile"],
	upstream_parameters: &["login_hint", "prompt"],
	..BASE
};
const VK: ProviderProfile = ProviderProfile {
	authorization_url: Some("https://oauth.vk.com/authorize"),
	token_url: Some("https://oauth.vk.com/access_token"),
	userinfo_url: Some("https://api.vk.com/method/users.get?v=5.131&fields=photo_200,nickname"),
	default_scopes: &["email"],
	subject_field: "response.0.id",
	upstream_parameters: &[],
	client_secret_post: true,
	..BASE
};
const YANDEX: ProviderProfile = ProviderProfile {
	authorization_url: Some("https://oauth.yandex.com/authorize"),
	token_url: Some("https://oauth.yandex.com/token"),
	userinfo_url: Some("https://login.yandex.ru/info?format=json"),
	default_scopes: &["login:email", "login:info"],
	subject_field: "id",
	client_secret_post: true,
	..BASE
};
const APPLE: ProviderProfile = ProviderProfile {
	issuer: Some("https://appleid.apple.com"),
	authorization_url: Some("https://appleid.apple.com/auth/authorize"),
	token_url: Some("https://appleid.apple.com/auth/token"),
	jwks_url: Some("https://appleid.apple.com/auth/keys"),
	default_scopes: &["email", "name"],
	verifies_id_tokens: true,
	upstream_parameters: &[],
	authorization_parameters: &[("response_mode", "form_post")],
	client_secret_post: true,
	..BASE
};
const SPOTIFY: ProviderProfile = ProviderProfile {
	authorization_url: Some("https://accounts.spotify.com/authorize"),
	token_url: Some("https://accounts.spotify.com/api/token"),
	userinfo_url: Some("https://api.spotify.com/v1/me"),
	default_scopes: &["user-read-email", "user-read-private"],
	subject_field: "id",
	upstream_parameters: &[],
	..BASE
};
const NETID: ProviderProfile = ProviderProfile {
	issuer: Some("https://broker.netid.de"),
	authorization_url: Some("https://broker.netid.de/authorize"),
	token_url: Some("https://broker.netid.de/token"),
	userinfo_url: Some("https://broker.netid.de/userinfo"),
	jwks_url: Some("https://broker.netid.de/jwks"),
	default_scopes: &["openid"],
	upstream_parameters: &["prompt"],
	..BASE
};
const DINGTALK: ProviderProfile = ProviderProfile {
	authorization_url: Some("https://login.dingtalk.com/oauth2/auth"),
	token_url: Some("https://api.dingtalk.com/v1.0/oauth2/userAccessToken"),
	userinfo_url: Some("https://api.dingtalk.com/v1.0/contact/users/me"),
	default_scopes: &["openid"],
	subject_field: "openId",
	upstream_parameters: &[],
	client_secret_post: true,
	userinfo_token_header: Some("x-acs-dingtalk-access-token"),
	..BASE
};
const LINKEDIN: ProviderProfile = ProviderProfile {
	issuer: Some("https://www.linkedin.com/oauth"),
	authorization_url: Some("https://www.linkedin.com/oauth/v2/authorization"),
	token_url: Some("https://www.linkedin.com/oauth/v2/accessToken"),
	userinfo_url: Some("https://api.linkedin.com/v2/userinfo"),
	default_scopes: &["openid", "email", "profile"],
	upstream_parameters: &[],
	client_secret_post: true,
	..BASE
};
const PATREON: ProviderProfile = ProviderProfile {
	authorization_url: Some("https://www.patreon.com/oauth2/authorize"),
	token_url: Some("https://www.patreon.com/api/oauth2/token"),
	userinfo_url: Some(
		"https://www.patreon.com/api/oauth2/v2/identity?fields%5Buser%5D=email,first_name,last_name,full_name",
	),
	default_scopes: &["identity", "identity[email]"],
	subject_field: "data.id",
	upstream_parameters: &[],
	client_secret_post: true,
	..BASE
};

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn kinds_round_trip_through_their_names() {
		for kind in ProviderKind::ALL {
			assert_eq!(kind.as_str().parse::<ProviderKind>().ok(), Some(kind));
			assert_eq!(
				serde_json::to_value(kind).expect("Kind should serialize."),
				Value::String(kind.as_str().into())
			);
		}
	}

	#[test]
	fn unknown_kind_lists_every_supported_kind() {
		let err = "myspace".parse::<ProviderKind>().expect_err("Unknown kinds must be rejected.");

		match err {
			ConfigError::ProviderKindUnsupported { kind, supported } => {
				assert_eq!(kind, "myspace");
				assert_eq!(supported.len(), ProviderKind::ALL.len());
				assert!(supported.contains(&"github-app"));
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn profiles_without_static_endpoints_are_configured_kinds() {
		for kind in ProviderKind::ALL {
			let profile = kind.profile();
			let configured = matches!(kind, ProviderKind::Generic | ProviderKind::Auth0);

			assert_eq!(profile.authorization_url.is_none(), configured, "{kind}");
			assert_eq!(profile.token_url.is_none(), configured, "{kind}");

			if profile.verifies_id_tokens {
				assert!(profile.jwks_url.is_some() && profile.issuer.is_some(), "{kind}");
			}
		}
	}
}
