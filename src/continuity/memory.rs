//! In-process [`ContinuityManager`] sealing containers with HMAC-SHA256.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	continuity::{ContinuityError, ContinuityFuture, ContinuityManager},
	flow::{SetCookie, StrategyRequest, StrategyResponse},
};

type HmacSha256 = Hmac<Sha256>;

/// Source of the current instant.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

const COOKIE_PREFIX: &str = "continuity";
const KEY_LEN: usize = 32;

struct Container {
	name: String,
	payload: Vec<u8>,
	mac: Vec<u8>,
	expires_at: OffsetDateTime,
}

/// Continuity manager keeping containers in process memory.
///
/// Each browser receives a cookie per channel holding the container identifier and a MAC over
/// `(channel, identifier)`; the container itself carries a MAC over its payload. Only a
/// browser holding the cookie can resume, and a container resumes at most once.
pub struct MemoryContinuityManager {
	key: Vec<u8>,
	containers: Mutex<HashMap<Uuid, Container>>,
	clock: Clock,
}
impl MemoryContinuityManager {
	/// Creates a manager sealing containers with `key`.
	pub fn new(key: impl Into<Vec<u8>>) -> Self {
		Self {
			key: key.into(),
			containers: Mutex::new(HashMap::new()),
			clock: Arc::new(OffsetDateTime::now_utc),
		}
	}

	/// Creates a manager with a random sealing key.
	pub fn with_random_key() -> Self {
		let mut key = vec![0_u8; KEY_LEN];

		rand::rng().fill_bytes(&mut key);

		Self::new(key)
	}

	/// Replaces the clock used for expiry checks.
	pub fn with_clock(mut self, clock: Clock) -> Self {
		self.clock = clock;

		self
	}

	/// Name of the cookie binding channel `name` to a browser.
	pub fn cookie_name(name: &str) -> String {
		format!("{COOKIE_PREFIX}_{name}")
	}

	/// Number of containers not yet resumed.
	///
	/// Expired containers count until the next pause evicts them.
	pub fn pending(&self) -> usize {
		self.containers.lock().len()
	}

	fn mac(&self, parts: &[&[u8]]) -> Result<HmacSha256, ContinuityError> {
		let mut mac =
			HmacSha256::new_from_slice(&self.key).map_err(|_| ContinuityError::Tampered)?;

		// Length-prefix each part so boundaries cannot shift.
		for part in parts {
			mac.update(&(part.len() as u64).to_be_bytes());
			mac.update(part);
		}

		Ok(mac)
	}

	fn binding(&self, name: &str, id: &Uuid) -> Result<HmacSha256, ContinuityError> {
		self.mac(&[name.as_bytes(), id.as_bytes()])
	}

	fn seal(&self, name: &str, id: &Uuid, payload: &[u8]) -> Result<HmacSha256, ContinuityError> {
		self.mac(&[name.as_bytes(), id.as_bytes(), payload])
	}

	fn cookie_value(&self, name: &str, id: &Uuid) -> Result<String, ContinuityError> {
		let tag = self.binding(name, id)?.finalize().into_bytes();

		Ok(format!("{id}.{}", URL_SAFE_NO_PAD.encode(tag)))
	}

	fn verify_cookie(&self, name: &str, value: &str) -> Result<Uuid, ContinuityError> {
		let (id, tag) = value.split_once('.').ok_or(ContinuityError::Tampered)?;
		let id = Uuid::parse_str(id).map_err(|_| ContinuityError::Tampered)?;
		let tag = URL_SAFE_NO_PAD.decode(tag).map_err(|_| ContinuityError::Tampered)?;

		self.binding(name, &id)?.verify_slice(&tag).map_err(|_| ContinuityError::Tampered)?;

		Ok(id)
	}

	fn pause_now(
		&self,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		name: &str,
		payload: Value,
		lifespan: Duration,
	) -> Result<(), ContinuityError> {
		let cookie_name = Self::cookie_name(name);
		let payload = serde_json::to_vec(&payload)
			.map_err(|e| ContinuityError::Serialization { message: e.to_string() })?;
		let id = Uuid::new_v4();
		let mac = self.seal(name, &id, &payload)?.finalize().into_bytes().to_vec();
		let now = (self.clock)();
		let value = self.cookie_value(name, &id)?;
		let mut containers = self.containers.lock();

		// Sweep containers past their lifespan.
		containers.retain(|_, container| container.expires_at > now);

		if let Some(previous) =
			request.cookie(&cookie_name).and_then(|v| self.verify_cookie(name, v).ok())
		{
			containers.remove(&previous);
		}

		containers.insert(id, Container {
			name: name.to_owned(),
			payload,
			mac,
			expires_at: now + lifespan,
		});
		response.set_cookie(SetCookie {
			name: cookie_name,
			value,
			max_age: lifespan,
			path: "/".into(),
			http_only: true,
		});

		Ok(())
	}

	fn resume_now(
		&self,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		name: &str,
	) -> Result<Value, ContinuityError> {
		let cookie_name = Self::cookie_name(name);
		let missing = || ContinuityError::Missing { name: name.to_owned() };
		let cookie = request.cookie(&cookie_name).ok_or_else(missing)?;
		let id = self.verify_cookie(name, cookie)?;

		response.set_cookie(SetCookie {
			name: cookie_name,
			value: String::new(),
			max_age: Duration::ZERO,
			path: "/".into(),
			http_only: true,
		});

		let container = self.containers.lock().remove(&id).ok_or_else(missing)?;

		if container.name != name {
			return Err(ContinuityError::Tampered);
		}

		self.seal(name, &id, &container.payload)?
			.verify_slice(&container.mac)
			.map_err(|_| ContinuityError::Tampered)?;

		if (self.clock)() >= container.expires_at {
			return Err(ContinuityError::Expired { expired_at: container.expires_at });
		}

		serde_json::from_slice(&container.payload).map_err(|_| ContinuityError::Tampered)
	}
}
impl Debug for MemoryContinuityManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryContinuityManager")
			.field("key", &"<redacted>")
			.field("pending", &self.pending())
			.finish()
	}
}
impl ContinuityManager for MemoryContinuityManager {
	fn pause<'a>(
		&'a self,
		request: &'a StrategyRequest,
		response: &'a mut StrategyResponse,
		name: &'a str,
		payload: Value,
		lifespan: Duration,
	) -> ContinuityFuture<'a, ()> {
		Box::pin(async move { self.pause_now(request, response, name, payload, lifespan) })
	}

	fn resume<'a>(
		&'a self,
		request: &'a StrategyRequest,
		response: &'a mut StrategyResponse,
		name: &'a str,
	) -> ContinuityFuture<'a, Value> {
		Box::pin(async move { self.resume_now(request, response, name) })
	}
}
