use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use partbot_line::{
    events::{parse_events, EventContext, EventDispatcher},
    signature::{self, SIGNATURE_HEADER},
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct WebhookState {
    channel_secret: SecretString,
    dispatcher: Arc<EventDispatcher>,
}

impl WebhookState {
    pub fn new(channel_secret: SecretString, dispatcher: EventDispatcher) -> Self {
        Self { channel_secret, dispatcher: Arc::new(dispatcher) }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/callback", post(callback)).with_state(state)
}

/// Responds as soon as the signature checks out. Events are dispatched on a
/// detached task and their outcome never changes the response.
pub async fn callback(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let correlation_id = Uuid::new_v4().to_string();
    let provided = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());

    debug!(
        event_name = "ingress.line.webhook_body",
        correlation_id = %correlation_id,
        body = %String::from_utf8_lossy(&body),
        "webhook request body"
    );

    let verified = provided.is_some_and(|value| {
        signature::verify(&body, value, state.channel_secret.expose_secret())
    });
    if !verified {
        warn!(
            event_name = "ingress.line.signature_rejected",
            correlation_id = %correlation_id,
            signature_present = provided.is_some(),
            "webhook signature verification failed"
        );
        return (StatusCode::BAD_REQUEST, "Invalid signature");
    }

    let webhook = match parse_events(&body) {
        Ok(webhook) => webhook,
        Err(error) => {
            warn!(
                event_name = "ingress.line.parse_failed",
                correlation_id = %correlation_id,
                error = %error,
                "verified webhook body could not be parsed; acknowledging without dispatch"
            );
            return (StatusCode::OK, "OK");
        }
    };

    info!(
        event_name = "ingress.line.webhook_accepted",
        correlation_id = %correlation_id,
        event_count = webhook.events.len(),
        "webhook accepted"
    );

    if !webhook.events.is_empty() {
        let dispatcher = state.dispatcher.clone();
        let ctx = EventContext { correlation_id };
        tokio::spawn(async move {
            let summary = dispatcher.dispatch_all(&webhook, &ctx).await;
            info!(
                event_name = "ingress.line.webhook_dispatched",
                correlation_id = %ctx.correlation_id,
                replied = summary.replied,
                ignored = summary.ignored,
                failed = summary.failed,
                "webhook events dispatched"
            );
        });
    }

    (StatusCode::OK, "OK")
}
