//! Self-service flows, their state machine, and the collaborator contracts around them.

pub mod continue_with;
pub mod login;
pub mod registration;
pub mod request;

pub use continue_with::*;
pub use login::*;
pub use registration::*;
pub use request::*;

// self
use crate::_prelude::*;

/// Query parameter carrying the post-flow destination.
pub const RETURN_TO_PARAMETER: &str = "return_to";

/// How the client drives a flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
	/// Browser client following redirects and cookies.
	Browser,
	/// Native or API client exchanging JSON.
	Api,
}
impl FlowType {
	/// Returns the wire identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowType::Browser => "browser",
			FlowType::Api => "api",
		}
	}
}
impl Display for FlowType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Severity of a UI message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiTextKind {
	/// Informational message.
	Info,
	/// Error message.
	Error,
}

/// Message rendered alongside a flow's form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiText {
	/// Stable message identifier.
	pub id: u32,
	/// Rendered text.
	pub text: String,
	/// Severity.
	#[serde(rename = "type")]
	pub kind: UiTextKind,
}

/// Form state of a flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowUi {
	/// URL the form submits to.
	pub action: String,
	/// HTTP method of the form.
	pub method: String,
	/// Messages attached to the whole form.
	#[serde(default)]
	pub messages: Vec<UiText>,
}
impl FlowUi {
	/// Builds an empty form posting to `action`.
	pub fn post(action: &Url) -> Self {
		Self { action: action.to_string(), method: "POST".into(), messages: Vec::new() }
	}
}

/// Returns `url` with every `key` query value replaced by a single `value`.
pub fn set_query_param(url: &Url, key: &str, value: &str) -> Url {
	let retained = url
		.query_pairs()
		.filter(|(k, _)| k != key)
		.map(|(k, v)| (k.into_owned(), v.into_owned()))
		.collect::<Vec<_>>();
	let mut out = url.clone();

	out.query_pairs_mut().clear().extend_pairs(retained).append_pair(key, value);

	out
}

/// Copies the `return_to` query parameter of `from` onto `to`, when present.
pub fn take_over_return_to_parameter(from: &Url, to: &Url) -> Url {
	match from.query_pairs().find(|(k, v)| k == RETURN_TO_PARAMETER && !v.is_empty()) {
		Some((_, return_to)) => set_query_param(to, RETURN_TO_PARAMETER, &return_to),
		None => to.clone(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("Test URL should parse.")
	}

	#[test]
	fn set_query_param_replaces_all_values() {
		let out = set_query_param(&url("https://a.example/x?flow=1&b=2&flow=3"), "flow", "9");

		assert_eq!(out.as_str(), "https://a.example/x?b=2&flow=9");
	}

	#[test]
	fn return_to_is_taken_over() {
		let from = url("https://auth.example/self-service/login/browser?return_to=https%3A%2F%2Fapp.example%2Fhome");
		let to = url("https://auth.example/self-service/registration?flow=abc");
		let out = take_over_return_to_parameter(&from, &to);

		assert_eq!(
			out.query_pairs().find(|(k, _)| k == "return_to").map(|(_, v)| v.into_owned()),
			Some("https://app.example/home".to_owned())
		);
		assert!(out.query_pairs().any(|(k, v)| k == "flow" && v == "abc"));
	}

	#[test]
	fn missing_return_to_leaves_target_untouched() {
		let to = url("https://auth.example/self-service/registration?flow=abc");

		assert_eq!(take_over_return_to_parameter(&url("https://auth.example/login"), &to), to);
		assert_eq!(
			take_over_return_to_parameter(&url("https://auth.example/login?return_to="), &to),
			to
		);
	}

	#[test]
	fn flow_type_uses_lowercase_wire_names() {
		assert_eq!(
			serde_json::to_string(&FlowType::Api).expect("Flow type should serialize."),
			"\"api\""
		);
		assert!(serde_json::from_str::<FlowType>("\"native\"").is_err());
	}
}
