//! Suspension channel carrying a login attempt across the provider redirect.
//!
//! A [`ContinuityManager`] binds an opaque payload to the caller's browser session under a named
//! channel. Resuming consumes the payload; a second resume, a resume after expiry, or a resume
//! from another browser fails.

pub mod memory;

pub use memory::MemoryContinuityManager;

// crates.io
use subtle::ConstantTimeEq;
// self
use crate::{
	_prelude::*,
	flow::{StrategyRequest, StrategyResponse},
};

/// Future returned by [`ContinuityManager`] implementations.
pub type ContinuityFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ContinuityError>> + 'a + Send>>;

/// Time-boxed, tamper-evident, consume-once storage scoped to a browser session.
pub trait ContinuityManager
where
	Self: Send + Sync,
{
	/// Binds `payload` to the browser session behind `request` under channel `name` until
	/// `lifespan` elapses.
	fn pause<'a>(
		&'a self,
		request: &'a StrategyRequest,
		response: &'a mut StrategyResponse,
		name: &'a str,
		payload: Value,
		lifespan: Duration,
	) -> ContinuityFuture<'a, ()>;

	/// Retrieves and invalidates the payload paused under `name`.
	fn resume<'a>(
		&'a self,
		request: &'a StrategyRequest,
		response: &'a mut StrategyResponse,
		name: &'a str,
	) -> ContinuityFuture<'a, Value>;
}

/// Payload suspended while the user is at the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationPayload {
	/// CSRF nonce the provider must echo back.
	pub state: String,
	/// Login flow the callback belongs to.
	pub flow_id: Uuid,
	/// Traits submitted with the login, used if the attempt pivots to registration.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub traits: Option<Value>,
}
impl ContinuationPayload {
	/// Suspends the payload under `name`.
	pub async fn pause(
		&self,
		manager: &dyn ContinuityManager,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		name: &str,
		lifespan: Duration,
	) -> Result<(), ContinuityError> {
		let payload = serde_json::to_value(self)
			.map_err(|e| ContinuityError::Serialization { message: e.to_string() })?;

		manager.pause(request, response, name, payload, lifespan).await
	}

	/// Resumes the payload paused under `name` and checks the echoed `state`.
	///
	/// The container is consumed even when the state does not match.
	pub async fn resume(
		manager: &dyn ContinuityManager,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		name: &str,
		state: &str,
	) -> Result<Self, ContinuityError> {
		let payload = Self::take(manager, request, response, name).await?;

		payload.ensure_state(state)?;

		Ok(payload)
	}

	/// Resumes the payload paused under `name` without looking at the echoed `state`.
	///
	/// Callers must run [`ContinuationPayload::ensure_state`] before trusting the payload.
	pub async fn take(
		manager: &dyn ContinuityManager,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		name: &str,
	) -> Result<Self, ContinuityError> {
		let raw = manager.resume(request, response, name).await?;

		serde_json::from_value(raw).map_err(|_| ContinuityError::Tampered)
	}

	/// Fails unless `state` equals the paused nonce, compared in constant time.
	pub fn ensure_state(&self, state: &str) -> Result<(), ContinuityError> {
		if !bool::from(self.state.as_bytes().ct_eq(state.as_bytes())) {
			return Err(ContinuityError::StateMismatch);
		}

		Ok(())
	}

	/// Fails unless the payload is bound to `flow_id`.
	pub fn ensure_flow(&self, flow_id: Uuid) -> Result<(), ContinuityError> {
		if self.flow_id != flow_id {
			return Err(ContinuityError::FlowMismatch { expected: self.flow_id, found: flow_id });
		}

		Ok(())
	}
}

/// Failures raised while pausing or resuming a container.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ContinuityError {
	/// Nothing is paused under the channel for this browser session, or it was consumed.
	#[error("No resumable login attempt was found for channel `{name}`.")]
	Missing {
		/// Channel name.
		name: String,
	},
	/// The container or its browser binding failed integrity checks.
	#[error("The resumable login attempt failed integrity checks.")]
	Tampered,
	/// The container outlived its lifespan.
	#[error("The resumable login attempt expired at {expired_at}.")]
	Expired {
		/// Instant the container expired.
		expired_at: OffsetDateTime,
	},
	/// The provider echoed a different `state` than the one paused.
	#[error("The `state` parameter does not match the login attempt.")]
	StateMismatch,
	/// The container belongs to a different flow.
	#[error("The resumable login attempt belongs to flow {expected}, not {found}.")]
	FlowMismatch {
		/// Flow bound at pause time.
		expected: Uuid,
		/// Flow the callback referenced.
		found: Uuid,
	},
	/// The payload could not be encoded.
	#[error("The continuity payload could not be encoded: {message}.")]
	Serialization {
		/// Encoder message.
		message: String,
	},
}
impl ContinuityError {
	/// Stable machine-readable identifier.
	pub fn id(&self) -> &'static str {
		match self {
			Self::Missing { .. } => "continuity_missing",
			Self::Tampered => "continuity_tampered",
			Self::Expired { .. } => "continuity_expired",
			Self::StateMismatch => "csrf_state_mismatch",
			Self::FlowMismatch { .. } => "continuity_flow_mismatch",
			Self::Serialization { .. } => "continuity_serialization",
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn flow_binding_is_checked() {
		let payload =
			ContinuationPayload { state: "s".into(), flow_id: Uuid::new_v4(), traits: None };

		assert!(payload.ensure_flow(payload.flow_id).is_ok());
		assert!(matches!(
			payload.ensure_flow(Uuid::new_v4()),
			Err(ContinuityError::FlowMismatch { .. })
		));
	}

	#[test]
	fn echoed_state_must_match_exactly() {
		let payload =
			ContinuationPayload { state: "abc".into(), flow_id: Uuid::new_v4(), traits: None };

		assert!(payload.ensure_state("abc").is_ok());
		assert_eq!(payload.ensure_state("abd"), Err(ContinuityError::StateMismatch));
		assert_eq!(payload.ensure_state("ab"), Err(ContinuityError::StateMismatch));
		assert_eq!(payload.ensure_state(""), Err(ContinuityError::StateMismatch));
	}
}
