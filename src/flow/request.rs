//! Transport-neutral request and response views handed to the strategy by the routing layer.

// self
use crate::{_prelude::*, session::Session};

/// Body of an inbound request.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
	/// No body.
	#[default]
	Empty,
	/// `application/x-www-form-urlencoded` fields in submission order.
	Form(Vec<(String, String)>),
	/// `application/json` document.
	Json(Value),
}

/// Inbound request as seen by the strategy.
#[derive(Clone, Debug)]
pub struct StrategyRequest {
	/// Full request URL, including the query.
	pub url: Url,
	/// Headers with lowercase names.
	pub headers: BTreeMap<String, String>,
	/// Parsed body.
	pub body: RequestBody,
	/// Cookies sent by the browser.
	pub cookies: BTreeMap<String, String>,
	/// Session already authenticating the request, if any.
	pub session: Option<Session>,
}
impl StrategyRequest {
	/// Creates a request for `url` without headers, body, or cookies.
	pub fn new(url: Url) -> Self {
		Self {
			url,
			headers: BTreeMap::new(),
			body: RequestBody::Empty,
			cookies: BTreeMap::new(),
			session: None,
		}
	}

	/// Adds a header; the name is lowercased.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name.to_ascii_lowercase(), value.into());

		self
	}

	/// Sets a form body.
	pub fn with_form<I, K, V>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.body =
			RequestBody::Form(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
		self.headers
			.insert("content-type".into(), "application/x-www-form-urlencoded".into());

		self
	}

	/// Sets a JSON body.
	pub fn with_json(mut self, body: Value) -> Self {
		self.body = RequestBody::Json(body);
		self.headers.insert("content-type".into(), "application/json".into());

		self
	}

	/// Adds a cookie.
	pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.cookies.insert(name.into(), value.into());

		self
	}

	/// Attaches the session authenticating the request.
	pub fn with_session(mut self, session: Session) -> Self {
		self.session = Some(session);

		self
	}

	/// Returns a header value by case-insensitive name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Returns the first query value for `key`.
	pub fn query(&self, key: &str) -> Option<String> {
		self.url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
	}

	/// Replaces every `key` query value with `value`.
	pub fn set_query(&mut self, key: &str, value: &str) {
		self.url = crate::flow::set_query_param(&self.url, key, value);
	}

	/// Returns a cookie value.
	pub fn cookie(&self, name: &str) -> Option<&str> {
		self.cookies.get(name).map(String::as_str)
	}

	/// Returns `true` when the client negotiates JSON rather than HTML.
	pub fn is_json_request(&self) -> bool {
		let accepts_json = self.header("accept").is_some_and(|v| v.contains("application/json"));
		let sends_json =
			self.header("content-type").is_some_and(|v| v.starts_with("application/json"));

		accepts_json || sends_json
	}

	/// Returns `true` when a valid session already authenticates the request.
	pub fn is_authenticated(&self) -> bool {
		self.session.as_ref().is_some_and(Session::is_authenticated)
	}
}

/// Cookie written to the response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetCookie {
	/// Cookie name.
	pub name: String,
	/// Cookie value; empty when clearing.
	pub value: String,
	/// Lifetime; zero clears the cookie.
	pub max_age: Duration,
	/// Cookie path.
	pub path: String,
	/// `HttpOnly` attribute.
	pub http_only: bool,
}

/// Response sink the strategy writes redirects, bodies, and cookies into.
#[derive(Clone, Debug, Default)]
pub struct StrategyResponse {
	/// Status code, once written.
	pub status: Option<u16>,
	/// `Location` header for redirects.
	pub location: Option<Url>,
	/// JSON body, once written.
	pub body: Option<Value>,
	/// Cookies to set, in order.
	pub cookies: Vec<SetCookie>,
}
impl StrategyResponse {
	/// Writes a `303 See Other` redirect.
	pub fn redirect(&mut self, to: Url) {
		self.status = Some(303);
		self.location = Some(to);
	}

	/// Tells a JSON client that the browser must navigate to `to`.
	pub fn browser_location_change_required(&mut self, to: Url) {
		self.status = Some(422);
		self.body = Some(serde_json::json!({
			"error": {
				"id": "browser_location_change_required",
				"code": 422,
				"status": "Unprocessable Entity",
				"reason": "In order to complete this flow please redirect the browser to the provided URL.",
			},
			"redirect_browser_to": to.as_str(),
		}));
	}

	/// Adds a cookie.
	pub fn set_cookie(&mut self, cookie: SetCookie) {
		self.cookies.retain(|c| c.name != cookie.name);
		self.cookies.push(cookie);
	}

	/// Returns the last value written for cookie `name`.
	pub fn cookie(&self, name: &str) -> Option<&SetCookie> {
		self.cookies.iter().find(|c| c.name == name)
	}

	/// Returns `true` once a status has been written.
	pub fn is_written(&self) -> bool {
		self.status.is_some()
	}
}
