use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use partbot_core::LookupResolver;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::reply::{ReplyChannel, ReplyError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineWebhook {
    pub destination: Option<String>,
    pub events: Vec<LineEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineEvent {
    TextMessage(TextMessageEvent),
    Unsupported { event_type: String },
}

impl LineEvent {
    pub fn event_type(&self) -> LineEventType {
        match self {
            Self::TextMessage(_) => LineEventType::TextMessage,
            Self::Unsupported { .. } => LineEventType::Unsupported,
        }
    }

    pub fn reply_token(&self) -> Option<&str> {
        match self {
            Self::TextMessage(event) => Some(&event.reply_token),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LineEventType {
    TextMessage,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub reply_token: String,
    pub text: String,
    pub user_id: Option<String>,
    pub webhook_event_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(String),
    Ignored,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("webhook body is not a valid event envelope: {0}")]
    Envelope(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("handler produced a reply for an event without a reply token")]
    MissingReplyToken,
    #[error(transparent)]
    Reply(#[from] ReplyError),
}

#[derive(Deserialize)]
struct RawWebhook {
    #[serde(default)]
    destination: Option<String>,
    events: Vec<serde_json::Value>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    reply_token: Option<String>,
    message: Option<RawMessage>,
    source: Option<RawSource>,
    webhook_event_id: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawSource {
    user_id: Option<String>,
}

/// Parses a webhook body into events. Anything other than a text message
/// carrying a reply token becomes `Unsupported`, including entries whose shape
/// does not match a known event. Only a malformed envelope is an error.
pub fn parse_events(body: &[u8]) -> Result<LineWebhook, ParseError> {
    let raw: RawWebhook =
        serde_json::from_slice(body).map_err(|error| ParseError::Envelope(error.to_string()))?;

    Ok(LineWebhook {
        destination: raw.destination,
        events: raw.events.into_iter().map(event_from_value).collect(),
    })
}

fn event_from_value(value: serde_json::Value) -> LineEvent {
    let event_type = value
        .get("type")
        .and_then(|kind| kind.as_str())
        .filter(|kind| !kind.is_empty())
        .unwrap_or("unknown")
        .to_owned();

    match serde_json::from_value::<RawEvent>(value) {
        Ok(raw) => LineEvent::from(raw),
        Err(error) => {
            debug!(event_type = %event_type, error = %error, "event entry has unexpected shape");
            LineEvent::Unsupported { event_type }
        }
    }
}

impl From<RawEvent> for LineEvent {
    fn from(raw: RawEvent) -> Self {
        let event_type = if raw.kind.is_empty() { "unknown".to_owned() } else { raw.kind };
        if event_type != "message" {
            return Self::Unsupported { event_type };
        }

        let (Some(reply_token), Some(message)) = (raw.reply_token, raw.message) else {
            return Self::Unsupported { event_type };
        };
        match (message.kind.as_str(), message.text) {
            ("text", Some(text)) if !reply_token.is_empty() => {
                Self::TextMessage(TextMessageEvent {
                    reply_token,
                    text,
                    user_id: raw.source.and_then(|source| source.user_id),
                    webhook_event_id: raw.webhook_event_id,
                })
            }
            _ => Self::Unsupported { event_type: format!("message.{}", message.kind) },
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> LineEventType;
    async fn handle(&self, event: &LineEvent, ctx: &EventContext) -> HandlerResult;
}

pub struct TextMessageHandler {
    resolver: LookupResolver,
}

impl TextMessageHandler {
    pub fn new(resolver: LookupResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl EventHandler for TextMessageHandler {
    fn event_type(&self) -> LineEventType {
        LineEventType::TextMessage
    }

    async fn handle(&self, event: &LineEvent, ctx: &EventContext) -> HandlerResult {
        let LineEvent::TextMessage(message) = event else {
            return HandlerResult::Ignored;
        };

        debug!(
            correlation_id = %ctx.correlation_id,
            webhook_event_id = message.webhook_event_id.as_deref().unwrap_or("unknown"),
            user_id = message.user_id.as_deref().unwrap_or("unknown"),
            "resolving text message"
        );
        HandlerResult::Responded(self.resolver.resolve(message.text.trim()).await)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub replied: usize,
    pub ignored: usize,
    pub failed: usize,
}

pub struct EventDispatcher {
    handlers: HashMap<LineEventType, Arc<dyn EventHandler>>,
    replies: Arc<dyn ReplyChannel>,
}

impl EventDispatcher {
    pub fn new(replies: Arc<dyn ReplyChannel>) -> Self {
        Self { handlers: HashMap::new(), replies }
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Runs the handler for one event and sends its reply, if any.
    pub async fn dispatch(
        &self,
        event: &LineEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        let result = handler.handle(event, ctx).await;
        if let HandlerResult::Responded(text) = &result {
            let reply_token = event.reply_token().ok_or(DispatchError::MissingReplyToken)?;
            self.replies.send(reply_token, text).await?;
        }
        Ok(result)
    }

    /// Dispatches every event in order. Failures are logged per event and never abort the batch.
    pub async fn dispatch_all(&self, webhook: &LineWebhook, ctx: &EventContext) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for event in &webhook.events {
            info!(
                event_name = "ingress.line.event_received",
                correlation_id = %ctx.correlation_id,
                destination = webhook.destination.as_deref().unwrap_or("unknown"),
                event_type = ?event.event_type(),
                "received line event"
            );

            match self.dispatch(event, ctx).await {
                Ok(HandlerResult::Responded(_)) => {
                    summary.replied += 1;
                    info!(
                        event_name = "egress.line.reply_sent",
                        correlation_id = %ctx.correlation_id,
                        "reply sent"
                    );
                }
                Ok(HandlerResult::Ignored) => summary.ignored += 1,
                Err(error) => {
                    summary.failed += 1;
                    warn!(
                        event_name = "egress.line.reply_failed",
                        correlation_id = %ctx.correlation_id,
                        error = %error,
                        "event dispatch failed; continuing with remaining events"
                    );
                }
            }
        }

        summary
    }
}

pub fn default_dispatcher(
    resolver: LookupResolver,
    replies: Arc<dyn ReplyChannel>,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new(replies);
    dispatcher.register(TextMessageHandler::new(resolver));
    dispatcher
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use partbot_core::{FetchError, LookupResolver, RawRows, TableFetcher};
    use tokio::sync::Mutex;

    use super::{
        default_dispatcher, parse_events, EventContext, EventDispatcher, HandlerResult, LineEvent,
        LineWebhook, TextMessageEvent,
    };
    use crate::reply::{ReplyChannel, ReplyError};

    struct FixedRows;

    #[async_trait]
    impl TableFetcher for FixedRows {
        async fn fetch_raw_rows(&self, _range: &str) -> Result<RawRows, FetchError> {
            Ok(vec![
                vec!["料號".to_owned(), "品名".to_owned(), "Stock".to_owned()],
                vec!["A1".to_owned(), "Widget".to_owned(), "10".to_owned()],
            ])
        }
    }

    #[derive(Default)]
    struct RecordingReplies {
        sent: Mutex<Vec<(String, String)>>,
        fail_tokens: Vec<String>,
    }

    #[async_trait]
    impl ReplyChannel for RecordingReplies {
        async fn send(&self, reply_token: &str, text: &str) -> Result<(), ReplyError> {
            if self.fail_tokens.iter().any(|token| token == reply_token) {
                return Err(ReplyError::Rejected { status: 400, detail: "expired".to_owned() });
            }
            self.sent.lock().await.push((reply_token.to_owned(), text.to_owned()));
            Ok(())
        }
    }

    fn resolver() -> LookupResolver {
        LookupResolver::new(Arc::new(FixedRows), "Sheet1!A:C", Duration::from_secs(5))
    }

    fn text_event(reply_token: &str, text: &str) -> LineEvent {
        LineEvent::TextMessage(TextMessageEvent {
            reply_token: reply_token.to_owned(),
            text: text.to_owned(),
            user_id: Some("U1".to_owned()),
            webhook_event_id: None,
        })
    }

    #[test]
    fn parses_text_message_and_other_events() {
        let body = br#"{
            "destination": "Ubot",
            "events": [
                {"type": "message", "replyToken": "r1", "webhookEventId": "E1",
                 "source": {"type": "user", "userId": "U1"},
                 "message": {"type": "text", "id": "m1", "text": " A1 "}},
                {"type": "message", "replyToken": "r2", "message": {"type": "sticker", "id": "m2"}},
                {"type": "follow", "replyToken": "r3"},
                {"type": "unfollow"}
            ]
        }"#;

        let webhook = parse_events(body).expect("body should parse");

        assert_eq!(webhook.destination.as_deref(), Some("Ubot"));
        assert_eq!(
            webhook.events,
            vec![
                LineEvent::TextMessage(TextMessageEvent {
                    reply_token: "r1".to_owned(),
                    text: " A1 ".to_owned(),
                    user_id: Some("U1".to_owned()),
                    webhook_event_id: Some("E1".to_owned()),
                }),
                LineEvent::Unsupported { event_type: "message.sticker".to_owned() },
                LineEvent::Unsupported { event_type: "follow".to_owned() },
                LineEvent::Unsupported { event_type: "unfollow".to_owned() },
            ]
        );
    }

    #[test]
    fn verification_ping_with_no_events_parses_empty() {
        let webhook = parse_events(br#"{"destination":"Ubot","events":[]}"#).expect("parse");

        assert!(webhook.events.is_empty());
    }

    #[test]
    fn text_message_without_reply_token_is_unsupported() {
        let webhook = parse_events(
            br#"{"events":[{"type":"message","message":{"type":"text","text":"A1"}}]}"#,
        )
        .expect("parse");

        assert_eq!(
            webhook.events,
            vec![LineEvent::Unsupported { event_type: "message".to_owned() }]
        );
    }

    #[test]
    fn odd_entry_does_not_drop_text_events_in_same_batch() {
        let body = br#"{"events":[
            {"type":"message","replyToken":"r1","message":{"type":"text","text":"A1"}},
            {"type":"futureKind","message":"not-an-object"},
            {"type":"message","replyToken":"r2","message":{"type":"text","text":42}},
            {"replyToken":"r3"}
        ]}"#;

        let webhook = parse_events(body).expect("envelope should parse");

        assert_eq!(
            webhook.events,
            vec![
                LineEvent::TextMessage(TextMessageEvent {
                    reply_token: "r1".to_owned(),
                    text: "A1".to_owned(),
                    user_id: None,
                    webhook_event_id: None,
                }),
                LineEvent::Unsupported { event_type: "futureKind".to_owned() },
                LineEvent::Unsupported { event_type: "message".to_owned() },
                LineEvent::Unsupported { event_type: "unknown".to_owned() },
            ]
        );
    }

    #[test]
    fn malformed_bodies_are_parse_errors() {
        assert!(parse_events(b"not json").is_err());
        assert!(parse_events(br#"{"destination":"Ubot"}"#).is_err());
        assert!(parse_events(br#"{"events":"nope"}"#).is_err());
    }

    #[tokio::test]
    async fn text_message_replies_with_resolved_text() {
        let replies = Arc::new(RecordingReplies::default());
        let dispatcher = default_dispatcher(resolver(), replies.clone());

        let result = dispatcher
            .dispatch(&text_event("r1", "  A1 "), &EventContext::default())
            .await
            .expect("dispatch");

        let expected = resolver().resolve("A1").await;
        assert_eq!(result, HandlerResult::Responded(expected.clone()));
        assert_eq!(*replies.sent.lock().await, vec![("r1".to_owned(), expected)]);
    }

    #[tokio::test]
    async fn unsupported_events_are_ignored_without_reply() {
        let replies = Arc::new(RecordingReplies::default());
        let dispatcher = default_dispatcher(resolver(), replies.clone());

        let result = dispatcher
            .dispatch(
                &LineEvent::Unsupported { event_type: "follow".to_owned() },
                &EventContext::default(),
            )
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
        assert!(replies.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn dispatcher_without_handlers_ignores_text() {
        let replies = Arc::new(RecordingReplies::default());
        let dispatcher = EventDispatcher::new(replies.clone());

        let result = dispatcher
            .dispatch(&text_event("r1", "A1"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[tokio::test]
    async fn failed_reply_does_not_abort_remaining_events() {
        let replies = Arc::new(RecordingReplies {
            fail_tokens: vec!["expired".to_owned()],
            ..RecordingReplies::default()
        });
        let dispatcher = default_dispatcher(resolver(), replies.clone());
        let webhook = LineWebhook {
            destination: None,
            events: vec![
                text_event("expired", "A1"),
                LineEvent::Unsupported { event_type: "follow".to_owned() },
                text_event("r2", "ZZZ"),
            ],
        };

        let summary = dispatcher.dispatch_all(&webhook, &EventContext::default()).await;

        assert_eq!(summary.replied, 1);
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.failed, 1);
        let sent = replies.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("ZZZ"));
    }
}
