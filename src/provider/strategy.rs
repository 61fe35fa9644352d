//! Classification of failed token requests into the broker error taxonomy.
//!
//! The context keeps only primitive data (status codes, OAuth fields, body preview) so the
//! classification stays decoupled from any HTTP client.

// self
use crate::{_prelude::*, provider::GrantType};

/// Broad outcome of a failed token request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
	/// The provider rejected the client or the grant.
	Authentication,
	/// Anything else: server errors, throttling, timeouts, unexpected payloads.
	Upstream,
}

/// Context describing one failed token request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
}
impl TokenErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
		}
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for providers that return non-JSON payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}

	/// Short human-readable reason, preferring structured OAuth fields.
	pub fn reason(&self) -> String {
		match (&self.oauth_error, &self.error_description) {
			(Some(error), Some(description)) => format!("{error}: {description}"),
			(Some(error), None) => error.clone(),
			(None, Some(description)) => description.clone(),
			(None, None) => match (self.http_status, &self.body_preview) {
				(Some(status), Some(body)) if !body.trim().is_empty() =>
					format!("HTTP {status}: {body}"),
				(Some(status), _) => format!("HTTP {status}"),
				(None, _) => "token endpoint request failed".into(),
			},
		}
	}
}

/// Classifies a failed token request.
///
/// A 401 or 403 status is always an authentication failure. Otherwise structured OAuth fields
/// take precedence, then body text hints; anything else is an upstream failure.
pub fn classify_token_error(ctx: &TokenErrorContext) -> FailureKind {
	if matches!(ctx.http_status, Some(401 | 403)) {
		return FailureKind::Authentication;
	}
	if let Some(kind) =
		classify_oauth_error(ctx.oauth_error.as_deref(), ctx.error_description.as_deref())
	{
		return kind;
	}
	if let Some(kind) = classify_body(ctx.body_preview.as_deref()) {
		return kind;
	}

	FailureKind::Upstream
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= TokenErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(TokenErrorContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn classify_oauth_error(
	oauth_error: Option<&str>,
	error_description: Option<&str>,
) -> Option<FailureKind> {
	oauth_error
		.and_then(match_exact_value)
		.or_else(|| error_description.and_then(match_exact_value))
		.or_else(|| classify_body(error_description))
}

fn match_exact_value(value: &str) -> Option<FailureKind> {
	const AUTHENTICATION: [&str; 4] =
		["invalid_client", "unauthorized_client", "invalid_grant", "access_denied"];
	const UPSTREAM: [&str; 2] = ["temporarily_unavailable", "server_error"];

	if AUTHENTICATION.iter().any(|code| value.eq_ignore_ascii_case(code)) {
		Some(FailureKind::Authentication)
	} else if UPSTREAM.iter().any(|code| value.eq_ignore_ascii_case(code)) {
		Some(FailureKind::Upstream)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<FailureKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_client") || text.contains("invalid_grant") =>
			Some(FailureKind::Authentication),
		text if text.contains("temporarily_unavailable") => Some(FailureKind::Upstream),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oauth_codes_drive_classification() {
		let ctx = TokenErrorContext::new(GrantType::RefreshToken)
			.with_http_status(400)
			.with_oauth_error("invalid_grant");

		assert_eq!(classify_token_error(&ctx), FailureKind::Authentication);

		let ctx = TokenErrorContext::new(GrantType::ClientCredentials)
			.with_http_status(400)
			.with_oauth_error("temporarily_unavailable");

		assert_eq!(classify_token_error(&ctx), FailureKind::Upstream);
	}

	#[test]
	fn rejected_statuses_win_over_upstream_codes() {
		for (status, code) in [(401, "server_error"), (403, "temporarily_unavailable")] {
			let ctx = TokenErrorContext::new(GrantType::ClientCredentials)
				.with_http_status(status)
				.with_oauth_error(code);

			assert_eq!(classify_token_error(&ctx), FailureKind::Authentication, "{status} {code}");
		}

		let ctx = TokenErrorContext::new(GrantType::RefreshToken)
			.with_http_status(401)
			.with_body_preview("temporarily_unavailable");

		assert_eq!(classify_token_error(&ctx), FailureKind::Authentication);
	}

	#[test]
	fn body_hints_precede_status_codes() {
		let ctx = TokenErrorContext::new(GrantType::ClientCredentials)
			.with_http_status(500)
			.with_body_preview("upstream said INVALID_CLIENT");

		assert_eq!(classify_token_error(&ctx), FailureKind::Authentication);
	}

	#[test]
	fn bare_status_codes_are_classified() {
		for (status, expected) in [
			(401, FailureKind::Authentication),
			(403, FailureKind::Authentication),
			(400, FailureKind::Upstream),
			(429, FailureKind::Upstream),
			(503, FailureKind::Upstream),
		] {
			let ctx = TokenErrorContext::new(GrantType::ClientCredentials).with_http_status(status);

			assert_eq!(classify_token_error(&ctx), expected, "status {status}");
		}
	}

	#[test]
	fn previews_are_truncated_and_reasons_prefer_oauth_fields() {
		let ctx = TokenErrorContext::new(GrantType::ClientCredentials)
			.with_http_status(502)
			.with_body_preview("x".repeat(300));

		assert_eq!(ctx.body_preview.as_deref().map(|body| body.chars().count()), Some(257));
		assert!(ctx.reason().starts_with("HTTP 502: xxx"));

		let ctx = ctx.with_oauth_error("server_error").with_error_description("try later");

		assert_eq!(ctx.reason(), "server_error: try later");
	}
}
