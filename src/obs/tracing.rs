// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::LoginStage};

/// Span wrapping one strategy entry point.
#[derive(Clone, Debug)]
pub struct LoginSpan {
	span: Span,
}
impl LoginSpan {
	/// Creates a span tagged with the stage and provider.
	pub fn new(stage: LoginStage, provider: &str) -> Self {
		let span = tracing::info_span!(
			"oidc_login_bridge.login",
			stage = stage.as_str(),
			provider = %provider
		);

		Self { span }
	}

	/// Runs `fut` inside the span without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
