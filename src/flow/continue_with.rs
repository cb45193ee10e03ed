//! Post-completion directives attached to flows.

// crates.io
use serde::{Deserializer, Serializer, de::Error as _};
// self
use crate::{_prelude::*, flow, secret::Secret};

/// Directive telling the caller what to do once a flow completes.
///
/// Unknown actions received from newer peers deserialize into [`ContinueWith::Unknown`] and
/// serialize back unchanged.
#[derive(Clone, Debug, PartialEq)]
pub enum ContinueWith {
	/// A session exists and is identified by the carried token.
	SetSessionToken(ContinueWithSetSessionToken),
	/// The caller should continue into a verification flow.
	VerificationUi(ContinueWithVerificationUi),
	/// Action this version does not understand, kept verbatim.
	Unknown(Value),
}
impl ContinueWith {
	/// Builds a session-token directive.
	pub fn set_session_token(token: impl Into<Secret>) -> Self {
		Self::SetSessionToken(ContinueWithSetSessionToken { ory_session_token: token.into() })
	}

	/// Builds a verification UI directive for `address`.
	pub fn verification_ui(flow_id: Uuid, address: impl Into<String>) -> Self {
		Self::VerificationUi(ContinueWithVerificationUi {
			flow: ContinueWithVerificationUiFlow {
				id: flow_id,
				verifiable_address: address.into(),
			},
		})
	}

	/// Wire action tag.
	pub fn action(&self) -> Option<&str> {
		match self {
			Self::SetSessionToken(_) => Some(SET_SESSION_TOKEN),
			Self::VerificationUi(_) => Some(VERIFICATION_UI),
			Self::Unknown(value) => value.get("action").and_then(Value::as_str),
		}
	}

	/// Augments `url` for callers that follow the directive inline.
	pub fn append_to(&self, url: &Url) -> Url {
		match self {
			Self::VerificationUi(item) => item.append_to(url),
			Self::SetSessionToken(_) | Self::Unknown(_) => url.clone(),
		}
	}
}
impl Serialize for ContinueWith {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match self {
			Self::SetSessionToken(item) => TaggedRef::SetSessionToken(item).serialize(serializer),
			Self::VerificationUi(item) => TaggedRef::VerificationUi(item).serialize(serializer),
			Self::Unknown(value) => value.serialize(serializer),
		}
	}
}
impl<'de> Deserialize<'de> for ContinueWith {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = Value::deserialize(deserializer)?;
		let action = value
			.get("action")
			.and_then(Value::as_str)
			.ok_or_else(|| D::Error::custom("continue_with item is missing its `action` tag"))?;

		match action {
			SET_SESSION_TOKEN | VERIFICATION_UI =>
				match Tagged::deserialize(value).map_err(D::Error::custom)? {
					Tagged::SetSessionToken(item) => Ok(Self::SetSessionToken(item)),
					Tagged::VerificationUi(item) => Ok(Self::VerificationUi(item)),
				},
			_ => Ok(Self::Unknown(value)),
		}
	}
}

/// Payload of [`ContinueWith::SetSessionToken`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueWithSetSessionToken {
	/// Token identifying the new session.
	pub ory_session_token: Secret,
}

/// Payload of [`ContinueWith::VerificationUi`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueWithVerificationUi {
	/// Verification flow to continue with.
	pub flow: ContinueWithVerificationUiFlow,
}
impl ContinueWithVerificationUi {
	/// Sets the `flow` query parameter to the verification flow identifier.
	pub fn append_to(&self, url: &Url) -> Url {
		flow::set_query_param(url, "flow", &self.flow.id.to_string())
	}
}

/// Verification flow reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueWithVerificationUiFlow {
	/// Verification flow identifier.
	pub id: Uuid,
	/// Address awaiting verification.
	pub verifiable_address: String,
}

/// Flows that carry post-completion directives.
pub trait FlowWithContinueWith {
	/// Appends a directive; order is significant.
	fn add_continue_with(&mut self, item: ContinueWith);

	/// Directives in insertion order.
	fn continue_with(&self) -> &[ContinueWith];
}

const SET_SESSION_TOKEN: &str = "set_ory_session_token";
const VERIFICATION_UI: &str = "verification_ui";

#[derive(Serialize)]
#[serde(tag = "action")]
enum TaggedRef<'a> {
	#[serde(rename = "set_ory_session_token")]
	SetSessionToken(&'a ContinueWithSetSessionToken),
	#[serde(rename = "verification_ui")]
	VerificationUi(&'a ContinueWithVerificationUi),
}

#[derive(Deserialize)]
#[serde(tag = "action")]
enum Tagged {
	#[serde(rename = "set_ory_session_token")]
	SetSessionToken(ContinueWithSetSessionToken),
	#[serde(rename = "verification_ui")]
	VerificationUi(ContinueWithVerificationUi),
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base() -> Url {
		Url::parse("https://app.example.com/verify?lang=en").expect("Base URL should parse.")
	}

	#[test]
	fn verification_ui_append_is_idempotent() {
		let flow_id = Uuid::new_v4();
		let item = ContinueWith::verification_ui(flow_id, "user@example.com");
		let once = item.append_to(&base());
		let twice = item.append_to(&once);
		let flows = twice.query_pairs().filter(|(k, _)| k == "flow").collect::<Vec<_>>();

		assert_eq!(once, twice);
		assert_eq!(flows.len(), 1);
		assert_eq!(flows[0].1, flow_id.to_string());
		assert!(twice.query_pairs().any(|(k, v)| k == "lang" && v == "en"));
	}

	#[test]
	fn set_session_token_never_touches_url() {
		let item = ContinueWith::set_session_token("tok");

		assert_eq!(item.append_to(&base()), base());
	}

	#[test]
	fn wire_shape_is_tagged() {
		let flow_id = Uuid::new_v4();
		let items = vec![
			ContinueWith::set_session_token("tok"),
			ContinueWith::verification_ui(flow_id, "user@example.com"),
		];
		let json = serde_json::to_value(&items).expect("Directives should serialize to JSON.");

		assert_eq!(
			json,
			serde_json::json!([
				{ "action": "set_ory_session_token", "ory_session_token": "tok" },
				{
					"action": "verification_ui",
					"flow": { "id": flow_id, "verifiable_address": "user@example.com" }
				}
			])
		);

		let back: Vec<ContinueWith> =
			serde_json::from_value(json).expect("Directives should deserialize from JSON.");

		assert_eq!(back, items);
	}

	#[test]
	fn unknown_actions_round_trip() {
		let raw =
			serde_json::json!({ "action": "redirect_browser_to", "redirect_browser_to": "x" });
		let item: ContinueWith =
			serde_json::from_value(raw.clone()).expect("Unknown actions should deserialize.");

		assert!(matches!(item, ContinueWith::Unknown(_)));
		assert_eq!(item.action(), Some("redirect_browser_to"));
		assert_eq!(item.append_to(&base()), base());
		assert_eq!(serde_json::to_value(&item).expect("Unknown actions should serialize."), raw);
	}

	#[test]
	fn known_action_with_wrong_shape_is_rejected() {
		let raw = serde_json::json!({ "action": "verification_ui", "flow": "nope" });

		assert!(serde_json::from_value::<ContinueWith>(raw).is_err());
		assert!(serde_json::from_value::<ContinueWith>(serde_json::json!({ "x": 1 })).is_err());
	}
}
