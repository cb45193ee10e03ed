//! Registration flow record and the contract of the registration counterpart.

// self
use crate::{
	_prelude::*,
	continuity::ContinuationPayload,
	flow::{ContinueWith, FlowType, FlowUi, FlowWithContinueWith, StrategyRequest, StrategyResponse},
	identity::Identity,
	oauth::TokenSet,
	provider::{Claims, Provider},
};

/// Future returned by the registration counterpart.
pub type RegistrationFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Server-held registration flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrationFlow {
	/// Flow identifier.
	pub id: Uuid,
	/// Client kind driving the flow.
	#[serde(rename = "type")]
	pub flow_type: FlowType,
	/// Method currently driving the flow.
	#[serde(default)]
	pub active: Option<String>,
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
impl RegistrationFlow {
	/// Creates a flow that expires after `lifespan`.
	pub fn new(
		flow_type: FlowType,
		lifespan: Duration,
		request_url: Url,
		options: RegistrationFlowOptions,
	) -> Self {
		let now = OffsetDateTime::now_utc();

		Self {
			id: Uuid::new_v4(),
			flow_type,
			active: None,
			return_to: options.return_to,
			ui: FlowUi::post(&request_url),
			request_url,
			issued_at: now,
			expires_at: now + lifespan,
			csrf_token: crate::secret::random_alphanumeric(32),
			continue_with: Vec::new(),
		}
	}
}
impl FlowWithContinueWith for RegistrationFlow {
	fn add_continue_with(&mut self, item: ContinueWith) {
		self.continue_with.push(item);
	}

	fn continue_with(&self) -> &[ContinueWith] {
		&self.continue_with
	}
}

/// Options applied when a registration flow is created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationFlowOptions {
	/// Destination to carry over from the originating flow.
	pub return_to: Option<String>,
}
impl RegistrationFlowOptions {
	/// Carries over the destination of the originating flow.
	pub fn with_return_to(mut self, return_to: impl Into<String>) -> Self {
		self.return_to = Some(return_to.into());

		self
	}
}

/// Registration side of the bridge, invoked when a login finds no linked identity.
pub trait RegistrationCounterpart
where
	Self: Send + Sync,
{
	/// Creates and persists a new registration flow.
	fn new_registration_flow<'a>(
		&'a self,
		request: &'a StrategyRequest,
		response: &'a mut StrategyResponse,
		flow_type: FlowType,
		options: RegistrationFlowOptions,
	) -> RegistrationFuture<'a, RegistrationFlow>;

	/// Registers the identity asserted by `claims`, reusing the token and continuity payload of
	/// the login attempt.
	#[allow(clippy::too_many_arguments)]
	fn process_registration<'a>(
		&'a self,
		request: &'a StrategyRequest,
		response: &'a mut StrategyResponse,
		flow: &'a mut RegistrationFlow,
		token: Option<&'a TokenSet>,
		claims: &'a Claims,
		provider: &'a dyn Provider,
		container: Option<&'a ContinuationPayload>,
	) -> RegistrationFuture<'a, Option<Identity>>;
}
