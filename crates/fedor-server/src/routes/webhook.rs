use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use fedor_core::intake::EVENT_HEADER;
use fedor_core::signature::{self, SIGNATURE_HEADER};
use fedor_core::{classify, Decision, FedorError, IntakeRules, WebhookPayload};
use tracing::{info, warn};

use crate::error::AppError;
use crate::state::AppState;

/// POST /webhook: authenticate a GitHub delivery, classify it and, when it
/// concerns a reviewable pull request, (re)arm the debounce timer for it.
pub async fn receive(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    // Nothing is parsed before the signature checks out.
    let sig = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = signature::verify(app.config.webhook_secret.as_bytes(), &body, sig) {
        warn!(error = %e, "webhook: rejected delivery");
        return Err(e.into());
    }

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::bad_request("missing X-GitHub-Event header"))?;

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(FedorError::from)?;

    let rules = IntakeRules {
        required_label: app.config.required_label.as_deref(),
        bot_login: &app.config.bot_login,
    };
    match classify(event, &payload, &rules) {
        Decision::Schedule(trigger) => {
            let pr = trigger.target.pr;
            info!(key = %trigger.target, reason = %trigger.reason, event, "webhook: accepted");
            app.scheduler.trigger(trigger.target, trigger.reason);
            Ok(Json(serde_json::json!({ "status": "ok", "pr": pr })))
        }
        Decision::Ignore(reason) => {
            info!(event, reason = %reason, "webhook: ignored");
            Ok(Json(serde_json::json!({ "status": "ignored", "reason": reason })))
        }
    }
}
