//! CSRF `state` values bound to a login flow.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, secret};

const NONCE_LEN: usize = 32;

/// Generates an unguessable `state` carrying `flow_id`.
///
/// The value is `base64url("{flow_id}:{nonce}")`, so the callback can find its flow before the
/// continuity container is consulted. The nonce alone provides the CSRF protection.
pub fn generate_state(flow_id: Uuid) -> String {
	let nonce = secret::random_alphanumeric(NONCE_LEN);

	URL_SAFE_NO_PAD.encode(format!("{flow_id}:{nonce}"))
}

/// Extracts the flow identifier from a `state` produced by [`generate_state`].
pub fn flow_id_from_state(state: &str) -> Result<Uuid> {
	let malformed = || Error::bad_request("the `state` parameter is malformed");
	let raw = URL_SAFE_NO_PAD.decode(state).map_err(|_| malformed())?;
	let raw = String::from_utf8(raw).map_err(|_| malformed())?;
	let (flow_id, nonce) = raw.split_once(':').ok_or_else(malformed)?;

	if nonce.is_empty() {
		return Err(malformed());
	}

	Uuid::parse_str(flow_id).map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn state_round_trips_flow_id() {
		let flow_id = Uuid::new_v4();
		let state = generate_state(flow_id);

		assert_eq!(flow_id_from_state(&state).expect("State should decode."), flow_id);
		assert_ne!(state, generate_state(flow_id), "Each attempt must get a fresh nonce.");
	}

	#[test]
	fn malformed_states_are_rejected() {
		assert!(flow_id_from_state("not base64 !").is_err());
		assert!(flow_id_from_state(&URL_SAFE_NO_PAD.encode("no-separator")).is_err());
		assert!(
			flow_id_from_state(&URL_SAFE_NO_PAD.encode(format!("{}:", Uuid::new_v4()))).is_err()
		);
	}
}
