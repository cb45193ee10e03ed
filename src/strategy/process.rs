//! Identity lookup after claims were verified: session issuance or the registration pivot.

// self
use crate::{
	_prelude::*,
	continuity::ContinuationPayload,
	flow::{
		ContinueWith, FlowType, FlowWithContinueWith, LoginFlow, LoginState, RETURN_TO_PARAMETER,
		RegistrationFlowOptions, StrategyRequest, StrategyResponse, take_over_return_to_parameter,
	},
	identity::{Aal, Credentials, CredentialsType, Identity, oidc_unique_id},
	oauth::TokenSet,
	obs::{self, LoginStage, StageOutcome},
	provider::{Claims, Provider},
	session::Session,
	strategy::{AttemptContext, Completion, NODE_GROUP, OidcStrategy, STRATEGY_ID},
};

/// Verified assertion handed to `process_login`.
pub(super) struct VerifiedAttempt<'a> {
	pub(super) provider: &'a dyn Provider,
	pub(super) token: &'a TokenSet,
	pub(super) claims: &'a Claims,
	pub(super) container: Option<&'a ContinuationPayload>,
}

impl OidcStrategy {
	/// Finds the identity linked to the verified claims and completes the login, or pivots into
	/// registration when no identity is linked.
	pub(super) async fn process_login(
		&self,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		flow: &mut LoginFlow,
		attempt: VerifiedAttempt<'_>,
		ctx: &mut AttemptContext,
	) -> Result<Completion> {
		let provider_id = &attempt.provider.config().id;
		let identifier = oidc_unique_id(provider_id, &attempt.claims.subject);
		let found = self
			.identities
			.find_by_credentials_identifier(CredentialsType::Oidc, &identifier)
			.await;

		match found {
			Ok((identity, credentials)) =>
				self.issue_session(request, response, flow, &attempt, identity, credentials).await,
			Err(e) if e.is_not_found() => {
				tracing::debug!(
					provider = %provider_id,
					subject = %attempt.claims.subject,
					"Received successful OpenID Connect callback but user is not registered. Re-initializing registration flow now."
				);

				self.pivot_to_registration(request, response, flow, &attempt, ctx).await
			},
			Err(e) => Err(e.into()),
		}
	}

	async fn issue_session(
		&self,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		flow: &mut LoginFlow,
		attempt: &VerifiedAttempt<'_>,
		identity: Identity,
		credentials: Credentials,
	) -> Result<Completion> {
		let provider_id = &attempt.provider.config().id;
		let subject = &attempt.claims.subject;
		let linked = credentials.decode_oidc().map_err(|e| {
			Error::internal(
				"The OpenID Connect credentials could not be decoded properly.",
				e.to_string(),
			)
		})?;

		if linked.find(provider_id, subject).is_none() {
			return Err(Error::CredentialsMismatch {
				provider: provider_id.clone(),
				subject: subject.clone(),
			});
		}

		let mut session = Session::new_inactive();

		session.completed_login_for(STRATEGY_ID, Aal::Aal1);

		self.hooks
			.post_login_hook(request, response, NODE_GROUP, flow, &identity, &mut session)
			.await?;

		if flow.flow_type == FlowType::Api {
			flow.add_continue_with(ContinueWith::set_session_token(session.token.clone()));
		}

		flow.transition(LoginState::Completed { session_id: session.id })?;
		self.flows.update_login_flow(flow).await?;

		tracing::debug!(
			provider = %provider_id,
			identity_id = %identity.id,
			session_id = %session.id,
			"Issued a session for an OpenID Connect login."
		);

		Ok(Completion::SessionIssued(Box::new(session)))
	}

	async fn pivot_to_registration(
		&self,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		flow: &mut LoginFlow,
		attempt: &VerifiedAttempt<'_>,
		ctx: &mut AttemptContext,
	) -> Result<Completion> {
		let mut options = RegistrationFlowOptions::default();
		let mut request = request.clone();

		if let Some(return_to) = &flow.return_to {
			options = options.with_return_to(return_to);
			request.set_query(RETURN_TO_PARAMETER, return_to);
		}

		let mut registration = self
			.registration
			.new_registration_flow(&request, response, flow.flow_type, options)
			.await?;

		registration.request_url =
			take_over_return_to_parameter(&flow.request_url, &registration.request_url);
		ctx.registration_flow_id = Some(registration.id);

		obs::record_login_outcome(LoginStage::Registration, StageOutcome::Attempt);

		self.registration
			.process_registration(
				&request,
				response,
				&mut registration,
				Some(attempt.token),
				attempt.claims,
				attempt.provider,
				attempt.container,
			)
			.await?;

		flow.transition(LoginState::PivotedToRegistration {
			registration_flow_id: registration.id,
		})?;
		self.flows.update_login_flow(flow).await?;

		obs::record_login_outcome(LoginStage::Registration, StageOutcome::RegistrationPivot);

		Ok(Completion::RegistrationPivot(Box::new(registration)))
	}
}
