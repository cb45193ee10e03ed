//! Sessions issued once a login completes.

// self
use crate::{_prelude::*, identity::Aal, secret::Secret};

const SESSION_TOKEN_LEN: usize = 32;

/// Authentication method completed within a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationMethod {
	/// Strategy identifier, e.g. `oidc`.
	pub method: String,
	/// Assurance level the method satisfied.
	pub aal: Aal,
	/// Instant the method completed.
	pub completed_at: OffsetDateTime,
}

/// Session issued for an identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
	/// Session identifier.
	pub id: Uuid,
	/// Opaque token identifying the session to API clients.
	pub token: Secret,
	/// Whether the session may be used to authenticate requests.
	pub active: bool,
	/// Identity the session belongs to, once bound.
	pub identity_id: Option<Uuid>,
	/// Highest assurance level reached.
	pub authenticator_assurance_level: Aal,
	/// Methods completed, in order.
	pub authentication_methods: Vec<AuthenticationMethod>,
	/// Issue instant.
	pub issued_at: OffsetDateTime,
}
impl Session {
	/// Creates an inactive session that hooks activate once the login completes.
	pub fn new_inactive() -> Self {
		Self {
			id: Uuid::new_v4(),
			token: Secret::random(SESSION_TOKEN_LEN),
			active: false,
			identity_id: None,
			authenticator_assurance_level: Aal::Aal0,
			authentication_methods: Vec::new(),
			issued_at: OffsetDateTime::now_utc(),
		}
	}

	/// Records that `method` completed at `aal`.
	pub fn completed_login_for(&mut self, method: &str, aal: Aal) {
		self.authentication_methods.push(AuthenticationMethod {
			method: method.to_owned(),
			aal,
			completed_at: OffsetDateTime::now_utc(),
		});

		if aal > self.authenticator_assurance_level {
			self.authenticator_assurance_level = aal;
		}
	}

	/// Binds the session to an identity and activates it.
	pub fn activate(&mut self, identity_id: Uuid) {
		self.identity_id = Some(identity_id);
		self.active = true;
	}

	/// Returns `true` when the session is active and bound to an identity.
	pub fn is_authenticated(&self) -> bool {
		self.active && self.identity_id.is_some()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn new_sessions_start_inactive() {
		let session = Session::new_inactive();

		assert!(!session.active);
		assert!(!session.is_authenticated());
		assert_eq!(session.authenticator_assurance_level, Aal::Aal0);
		assert!(!format!("{session:?}").contains(session.token.expose()));
	}

	#[test]
	fn completed_login_raises_aal() {
		let mut session = Session::new_inactive();

		session.completed_login_for("oidc", Aal::Aal1);

		assert_eq!(session.authenticator_assurance_level, Aal::Aal1);
		assert_eq!(session.authentication_methods.len(), 1);
		assert_eq!(session.authentication_methods[0].method, "oidc");

		session.activate(Uuid::new_v4());

		assert!(session.is_authenticated());
	}
}
