//! Observability helpers for the login strategy.
//!
//! # Feature Flags
//!
//! - Spans named `oidc_login_bridge.login` carry the `stage` (entry point) and `provider`
//!   fields.
//! - Enable `metrics` to increment the `oidc_login_bridge_login_total` counter for every
//!   attempt and result, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Strategy entry points observed by the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoginStage {
	/// Login submission (provider selection or native ID token).
	Login,
	/// Provider callback.
	Callback,
	/// Hand-off to the registration counterpart.
	Registration,
}
impl LoginStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LoginStage::Login => "login",
			LoginStage::Callback => "callback",
			LoginStage::Registration => "registration",
		}
	}
}
impl Display for LoginStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded per stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a stage.
	Attempt,
	/// The browser was sent to the provider.
	Redirect,
	/// A session was issued for an existing identity.
	SessionIssued,
	/// The attempt continued as a registration.
	RegistrationPivot,
	/// The strategy declined the request.
	NotResponsible,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Redirect => "redirect",
			StageOutcome::SessionIssued => "session_issued",
			StageOutcome::RegistrationPivot => "registration_pivot",
			StageOutcome::NotResponsible => "not_responsible",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
