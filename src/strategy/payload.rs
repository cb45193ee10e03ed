//! Wire payload submitted to select a provider or present a native ID token.

// crates.io
use serde_json::Map;
// self
use crate::{
	_prelude::*,
	flow::{FlowType, RequestBody, StrategyRequest},
	strategy::STRATEGY_ID,
};

/// Body of a login submission handled by the OIDC method.
///
/// Browser flows submit form fields (or query parameters); nested fields use dotted keys such
/// as `traits.email` or `upstream_parameters.login_hint`. API flows submit JSON.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpdateLoginFlowWithOidcMethod {
	/// Provider to authenticate with.
	pub provider: String,
	/// CSRF token of the flow; checked by the routing layer.
	pub csrf_token: String,
	/// Method identifier; must be `oidc` when present.
	pub method: String,
	/// Traits kept for a registration pivot.
	pub traits: Option<Value>,
	/// Parameters forwarded to the provider's authorization endpoint.
	pub upstream_parameters: Option<Value>,
	/// ID token obtained by a native client.
	pub id_token: String,
}
impl UpdateLoginFlowWithOidcMethod {
	/// Decodes the payload of `request` for a flow of `flow_type`.
	pub fn from_request(request: &StrategyRequest, flow_type: FlowType) -> Result<Self> {
		match (flow_type, &request.body) {
			(FlowType::Api, RequestBody::Json(body)) => decode(body.clone()),
			(FlowType::Api, RequestBody::Form(fields)) =>
				decode(nest(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))),
			(FlowType::Api, RequestBody::Empty) => Ok(Self::default()),
			(FlowType::Browser, body) => {
				let query = request.url.query_pairs().collect::<Vec<_>>();
				let query = query.iter().map(|(k, v)| (&**k, &**v));
				let document = match body {
					RequestBody::Form(fields) => nest(
						query.chain(fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
					),
					RequestBody::Json(Value::Object(fields)) => {
						let mut document = nest(query);

						if let Value::Object(target) = &mut document {
							target.extend(fields.clone());
						}

						document
					},
					RequestBody::Json(_) =>
						return Err(Error::bad_request("expected a JSON object")),
					RequestBody::Empty => nest(query),
				};

				decode(document)
			},
		}
	}

	/// Returns `true` when the payload names another method.
	pub fn targets_other_method(&self) -> bool {
		!self.method.is_empty() && self.method != STRATEGY_ID
	}

	/// Upstream parameters as strings keyed by name.
	pub fn upstream_parameters(&self) -> Result<BTreeMap<String, String>> {
		let Some(parameters) = &self.upstream_parameters else {
			return Ok(BTreeMap::new());
		};
		let Value::Object(parameters) = parameters else {
			return Err(Error::bad_request("`upstream_parameters` must be an object"));
		};

		parameters
			.iter()
			.map(|(key, value)| match value {
				Value::String(value) => Ok((key.to_owned(), value.to_owned())),
				_ => Err(Error::bad_request(format!(
					"upstream parameter `{key}` must be a string"
				))),
			})
			.collect()
	}
}

fn decode(document: Value) -> Result<UpdateLoginFlowWithOidcMethod> {
	serde_path_to_error::deserialize(document).map_err(|e| {
		Error::bad_request(format!("unable to decode the login payload at `{}`", e.path()))
	})
}

// Later fields win, so form fields override query parameters.
fn nest<'a>(fields: impl Iterator<Item = (&'a str, &'a str)>) -> Value {
	let mut root = Map::new();

	for (key, value) in fields {
		let mut target = &mut root;
		let mut segments = key.split('.').peekable();

		while let Some(segment) = segments.next() {
			if segments.peek().is_none() {
				target.insert(segment.to_owned(), Value::String(value.to_owned()));

				break;
			}

			let entry =
				target.entry(segment.to_owned()).or_insert_with(|| Value::Object(Map::new()));

			if !entry.is_object() {
				*entry = Value::Object(Map::new());
			}

			match entry {
				Value::Object(next) => target = next,
				_ => break,
			}
		}
	}

	Value::Object(root)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("Test URL should parse.")
	}

	#[test]
	fn browser_form_merges_query_and_nests_dotted_keys() {
		let request = StrategyRequest::new(url(
			"https://auth.example/self-service/login?flow=abc&provider=github",
		))
		.with_form([
			("provider", "google"),
			("traits.email", "a@example.com"),
			("upstream_parameters.login_hint", "a@example.com"),
		]);
		let payload = UpdateLoginFlowWithOidcMethod::from_request(&request, FlowType::Browser)
			.expect("Form payload should decode.");

		assert_eq!(payload.provider, "google");
		assert_eq!(payload.traits, Some(serde_json::json!({ "email": "a@example.com" })));
		assert_eq!(
			payload.upstream_parameters().expect("Upstream parameters should decode."),
			BTreeMap::from([("login_hint".to_owned(), "a@example.com".to_owned())])
		);
	}

	#[test]
	fn api_json_is_decoded_and_method_checked() {
		let request = StrategyRequest::new(url("https://auth.example/self-service/login"))
			.with_json(serde_json::json!({
				"provider": "google",
				"method": "password",
				"id_token": "header.payload.sig",
			}));
		let payload = UpdateLoginFlowWithOidcMethod::from_request(&request, FlowType::Api)
			.expect("JSON payload should decode.");

		assert_eq!(payload.id_token, "header.payload.sig");
		assert!(payload.targets_other_method());
	}

	#[test]
	fn api_form_bodies_nest_dotted_keys() {
		let request = StrategyRequest::new(url("https://auth.example/self-service/login"))
			.with_form([
				("provider", "google"),
				("id_token", "header.payload.sig"),
				("traits.email", "a@example.com"),
			]);
		let payload = UpdateLoginFlowWithOidcMethod::from_request(&request, FlowType::Api)
			.expect("Form payload of an API flow should decode.");

		assert_eq!(payload.provider, "google");
		assert_eq!(payload.id_token, "header.payload.sig");
		assert_eq!(payload.traits, Some(serde_json::json!({ "email": "a@example.com" })));
	}

	#[test]
	fn api_flows_ignore_query_parameters() {
		let request =
			StrategyRequest::new(url("https://auth.example/self-service/login?provider=google"));
		let payload = UpdateLoginFlowWithOidcMethod::from_request(&request, FlowType::Api)
			.expect("Empty payload should decode.");

		assert!(payload.provider.is_empty());
		assert!(!payload.targets_other_method());
	}

	#[test]
	fn malformed_payloads_are_bad_requests() {
		let request = StrategyRequest::new(url("https://auth.example/self-service/login"))
			.with_json(serde_json::json!({ "provider": 7 }));
		let err = UpdateLoginFlowWithOidcMethod::from_request(&request, FlowType::Api)
			.expect_err("A numeric provider should be rejected.");

		assert!(matches!(err, Error::BadRequest { .. }));
		assert!(err.to_string().contains("provider"));

		let payload = UpdateLoginFlowWithOidcMethod {
			upstream_parameters: Some(serde_json::json!({ "hd": 1 })),
			..Default::default()
		};

		assert!(payload.upstream_parameters().is_err());
	}
}
