//! Normalized identity assertions extracted from providers.

// crates.io
use serde_json::Map;
// self
use crate::_prelude::*;

/// Identity assertion made by a provider for one authentication attempt.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
	/// Stable identifier of the user within the provider.
	#[serde(rename = "sub")]
	pub subject: String,
	/// Issuer of the assertion, when known.
	#[serde(rename = "iss", default, skip_serializing_if = "Option::is_none")]
	pub issuer: Option<String>,
	/// Every other attribute, kept verbatim for the claims mapper.
	#[serde(flatten)]
	pub raw: Map<String, Value>,
}
impl Claims {
	/// Creates claims carrying only a subject.
	pub fn new(subject: impl Into<String>) -> Self {
		Self { subject: subject.into(), issuer: None, raw: Map::new() }
	}

	/// Adds an attribute.
	pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
		self.raw.insert(key.into(), value);

		self
	}

	/// Builds claims from a provider document, reading the subject at the dotted `subject_path`.
	///
	/// Numeric subjects are rendered as decimal strings. Array elements are addressed by index,
	/// e.g. `response.0.id`.
	pub fn from_document(document: Value, subject_path: &str) -> Result<Self> {
		let subject = lookup(&document, subject_path).and_then(scalar_to_string).ok_or_else(|| {
			Error::internal(
				"The provider did not return a subject identifier.",
				format!("No scalar value was found at `{subject_path}` in the provider response."),
			)
		})?;
		let mut raw = match document {
			Value::Object(map) => map,
			other => Map::from_iter([("value".to_owned(), other)]),
		};

		raw.remove("sub");

		let issuer = match raw.remove("iss") {
			Some(Value::String(iss)) => Some(iss),
			_ => None,
		};
		let claims = Self { subject, issuer, raw };

		claims.ensure_subject()?;

		Ok(claims)
	}

	/// Fails when the subject is empty.
	pub fn ensure_subject(&self) -> Result<()> {
		if self.subject.trim().is_empty() {
			return Err(Error::internal(
				"The provider did not return a subject identifier.",
				"The provider returned an empty subject.",
			));
		}

		Ok(())
	}

	/// Returns an attribute.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.raw.get(key)
	}

	/// Email address, if asserted.
	pub fn email(&self) -> Option<&str> {
		self.get("email").and_then(Value::as_str)
	}

	/// Whether the provider verified the email address.
	///
	/// Some providers encode the flag as a string.
	pub fn email_verified(&self) -> bool {
		match self.get("email_verified") {
			Some(Value::Bool(verified)) => *verified,
			Some(Value::String(verified)) => verified.eq_ignore_ascii_case("true"),
			_ => false,
		}
	}

	/// Display name, if asserted.
	pub fn name(&self) -> Option<&str> {
		self.get("name").and_then(Value::as_str)
	}
}

fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
	path.split('.').try_fold(document, |node, segment| match node {
		Value::Object(map) => map.get(segment),
		Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
		_ => None,
	})
}

fn scalar_to_string(value: &Value) -> Option<String> {
	match value {
		Value::String(s) if !s.is_empty() => Some(s.clone()),
		Value::Number(n) => Some(n.to_string()),
		_ => None,
	}
}
