//! Login counter.
//!
//! Every stage entry and result bumps `oidc_login_bridge_login_total` once. Without the
//! `metrics` feature the call compiles down to nothing.

// self
use crate::obs::{LoginStage, StageOutcome};

/// Counter name exported to the installed recorder.
pub const LOGIN_TOTAL: &str = "oidc_login_bridge_login_total";

/// Counts one `outcome` of `stage`.
#[cfg(feature = "metrics")]
pub fn record_login_outcome(stage: LoginStage, outcome: StageOutcome) {
	let [stage, outcome] = labels(stage, outcome);

	metrics::counter!(LOGIN_TOTAL, stage.0 => stage.1, outcome.0 => outcome.1).increment(1);
}

/// Counts one `outcome` of `stage`.
#[cfg(not(feature = "metrics"))]
pub fn record_login_outcome(stage: LoginStage, outcome: StageOutcome) {
	let _ = labels(stage, outcome);
}

fn labels(stage: LoginStage, outcome: StageOutcome) -> [(&'static str, &'static str); 2] {
	[("stage", stage.as_str()), ("outcome", outcome.as_str())]
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn counter_labels_pair_stage_with_outcome() {
		assert_eq!(labels(LoginStage::Callback, StageOutcome::Failure), [
			("stage", "callback"),
			("outcome", "failure"),
		]);
	}

	#[test]
	fn recording_without_a_recorder_is_silent() {
		record_login_outcome(LoginStage::Registration, StageOutcome::RegistrationPivot);
	}
}
