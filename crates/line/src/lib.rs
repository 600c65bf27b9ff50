//! LINE Messaging API integration - webhook bot interface
//!
//! This crate provides the LINE side of partbot:
//! - **Signature** (`signature`) - `X-Line-Signature` HMAC verification
//! - **Events** (`events`) - Webhook envelope parsing and event dispatch
//! - **Reply** (`reply`) - Reply-token addressed text replies
//!
//! # Architecture
//!
//! ```text
//! POST /callback → signature::verify → events::parse_events
//!                                          ↓
//!              ReplyChannel ← EventDispatcher → TextMessageHandler → LookupResolver
//! ```

pub mod events;
pub mod reply;
pub mod signature;
