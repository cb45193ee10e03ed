//! Login flow record, its state machine, and the post-login hook contract.

// self
use crate::{
	_prelude::*,
	flow::{ContinueWith, FlowType, FlowUi, FlowWithContinueWith, StrategyRequest, StrategyResponse},
	identity::{Aal, Identity},
	session::Session,
};

/// Future returned by collaborator hooks.
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// Position of a login attempt in the OIDC state machine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoginState {
	/// No provider selected yet.
	#[default]
	Choosing,
	/// Authorization URL issued; the attempt is suspended in the continuity channel.
	AwaitingProviderRedirect {
		/// Selected provider.
		provider: String,
	},
	/// The provider redirected back.
	CallbackReceived {
		/// Provider that answered.
		provider: String,
	},
	/// Claims were obtained and verified.
	ClaimsVerified {
		/// Provider that asserted the claims.
		provider: String,
		/// Asserted subject.
		subject: String,
	},
	/// A session was issued.
	Completed {
		/// Issued session.
		session_id: Uuid,
	},
	/// Control moved to a registration flow.
	PivotedToRegistration {
		/// Registration flow that took over.
		registration_flow_id: Uuid,
	},
	/// The attempt failed.
	Failed {
		/// Stable error identifier.
		kind: String,
	},
}
impl LoginState {
	/// Returns `true` for states no transition may leave.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed { .. } | Self::PivotedToRegistration { .. })
	}

	/// Returns `true` when `next` is reachable from `self`.
	///
	/// A failed attempt may be retried on the same flow, so `Failed` re-enters the machine
	/// at provider selection.
	pub fn can_transition_to(&self, next: &LoginState) -> bool {
		use LoginState::*;

		match (self, next) {
			(Completed { .. } | PivotedToRegistration { .. }, _) => false,
			(_, Failed { .. }) => true,
			(
				Choosing | AwaitingProviderRedirect { .. } | Failed { .. },
				AwaitingProviderRedirect { .. } | ClaimsVerified { .. },
			) => true,
			(AwaitingProviderRedirect { .. }, CallbackReceived { .. }) => true,
			(CallbackReceived { .. }, ClaimsVerified { .. }) => true,
			(ClaimsVerified { .. }, Completed { .. } | PivotedToRegistration { .. }) => true,
			_ => false,
		}
	}

	/// Short label used in logs.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Choosing => "choosing",
			Self::AwaitingProviderRedirect { .. } => "awaiting_provider_redirect",
			Self::CallbackReceived { .. } => "callback_received",
			Self::ClaimsVerified { .. } => "claims_verified",
			Self::Completed { .. } => "completed",
			Self::PivotedToRegistration { .. } => "pivoted_to_registration",
			Self::Failed { .. } => "failed",
		}
	}
}

/// Server-held login flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginFlow {
	/// Flow identifier.
	pub id: Uuid,
	/// Client kind driving the flow.
	#[serde(rename = "type")]
	pub flow_type: FlowType,
	/// State machine position.
	#[serde(default)]
	pub state: LoginState,
	/// Method currently driving the flow.
	#[serde(default)]
	pub active: Option<String>,
	/// Assurance level the flow must reach.
	pub requested_aal: Aal,
	/// Whether the user asked to re-authenticate despite a valid session.
	#[serde(default)]
	pub refresh: bool,
	/// Post-flow destination.
	#[serde(default)]
	pub return_to: Option<String>,
	/// URL of the request that created the flow.
	pub request_url: Url,
	/// Creation instant.
	pub issued_at: OffsetDateTime,
	/// Expiry instant.
	pub expires_at: OffsetDateTime,
	/// Form state.
	pub ui: FlowUi,
	/// CSRF token bound to the flow.
	#[serde(default)]
	pub csrf_token: String,
	/// Post-completion directives.
	#[serde(default)]
	pub continue_with: Vec<ContinueWith>,
}
impl LoginFlow {
	/// Creates a flow that expires after `lifespan`.
	pub fn new(flow_type: FlowType, lifespan: Duration, request_url: Url) -> Self {
		let now = OffsetDateTime::now_utc();
		let return_to = request_url
			.query_pairs()
			.find(|(k, v)| k == crate::flow::RETURN_TO_PARAMETER && !v.is_empty())
			.map(|(_, v)| v.into_owned());

		Self {
			id: Uuid::new_v4(),
			flow_type,
			state: LoginState::Choosing,
			active: None,
			requested_aal: Aal::Aal1,
			refresh: false,
			return_to,
			ui: FlowUi::post(&request_url),
			request_url,
			issued_at: now,
			expires_at: now + lifespan,
			csrf_token: crate::secret::random_alphanumeric(32),
			continue_with: Vec::new(),
		}
	}

	/// Sets the requested assurance level.
	pub fn with_requested_aal(mut self, aal: Aal) -> Self {
		self.requested_aal = aal;

		self
	}

	/// Marks the flow as a forced re-authentication.
	pub fn with_refresh(mut self, refresh: bool) -> Self {
		self.refresh = refresh;

		self
	}

	/// Returns `true` once `expires_at` has passed.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}

	/// Moves the flow to `next`.
	pub fn transition(&mut self, next: LoginState) -> Result<()> {
		if !self.state.can_transition_to(&next) {
			return Err(Error::internal(
				"The login flow is in an unexpected state.",
				format!(
					"Login flow {} cannot move from `{}` to `{}`.",
					self.id,
					self.state.as_str(),
					next.as_str()
				),
			));
		}

		self.state = next;

		Ok(())
	}

	/// Records a failure unless the flow already concluded.
	pub fn fail(&mut self, kind: &str) {
		if !self.state.is_terminal() {
			self.state = LoginState::Failed { kind: kind.to_owned() };
		}
	}
}
impl FlowWithContinueWith for LoginFlow {
	fn add_continue_with(&mut self, item: ContinueWith) {
		self.continue_with.push(item);
	}

	fn continue_with(&self) -> &[ContinueWith] {
		&self.continue_with
	}
}

/// Hooks run after a login succeeded, typically activating and persisting the session.
pub trait LoginHookExecutor
where
	Self: Send + Sync,
{
	/// Runs every post-login hook for `identity` in the UI node group `group`.
	fn post_login_hook<'a>(
		&'a self,
		request: &'a StrategyRequest,
		response: &'a mut StrategyResponse,
		group: &'static str,
		flow: &'a mut LoginFlow,
		identity: &'a Identity,
		session: &'a mut Session,
	) -> HookFuture<'a>;
}
