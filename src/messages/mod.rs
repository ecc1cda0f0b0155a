//! The canned POST /v1/messages route
//!
//! Whatever the conversation says, the reply is the same fixed assistant text. The requested
//! model name is echoed back, usage counters are all zero, and every reply gets fresh ids.

pub mod schemas;

use crate::contract::{ContractRoute, Reply, RequestContext, RouteLogic, RouteSpec};
use crate::errors::ContractError;
use crate::ids;
use crate::schema::Shape;
use async_trait::async_trait;
use axum::http::Method;
use schemas::{ContentBlock, Message, MessageType, MessagesRequest, Role, StopReason, Usage};
use tracing::debug;

pub const MESSAGES_PATH: &str = "/v1/messages";

pub const DEFAULT_REPLY_TEXT: &str = "Hello world!";

/// Route logic that answers every conversation with the same text.
#[derive(Debug, Clone)]
pub struct CannedMessages {
    reply_text: String,
}

impl CannedMessages {
    pub fn new(reply_text: impl Into<String>) -> Self {
        Self {
            reply_text: reply_text.into(),
        }
    }

    /// Build the reply for one request. Message content is deliberately ignored.
    pub fn reply(&self, request: &MessagesRequest, request_id: &str) -> Message {
        Message {
            request_id: request_id.to_string(),
            content: vec![ContentBlock::Text {
                text: self.reply_text.clone(),
            }],
            id: ids::message_id(),
            model: request.model.clone(),
            role: Role::Assistant,
            stop_reason: StopReason::EndTurn,
            stop_sequence: None,
            kind: MessageType::Message,
            usage: Usage::default(),
        }
    }
}

impl Default for CannedMessages {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_TEXT)
    }
}

#[async_trait]
impl RouteLogic for CannedMessages {
    type Request = MessagesRequest;
    type Response = Message;

    async fn handle(&self, request: MessagesRequest, ctx: RequestContext) -> Reply<Message> {
        debug!(
            model = %request.model,
            max_tokens = request.max_tokens,
            messages_count = request.messages.len(),
            "Messages request validated"
        );
        let message = self.reply(&request, ctx.request_id());
        ctx.json(message)
    }
}

/// The contract for POST /v1/messages.
pub fn messages_spec(body_limit: usize) -> Result<RouteSpec, ContractError> {
    RouteSpec::builder()
        .methods(vec![Method::POST])
        .request_schema(MessagesRequest::schema())
        .response_schema(Message::schema())
        .body_limit(body_limit)
        .build()
}

/// The messages route, ready to mount at [`MESSAGES_PATH`].
pub fn messages_route(
    logic: CannedMessages,
    body_limit: usize,
) -> Result<ContractRoute<CannedMessages>, ContractError> {
    Ok(ContractRoute::new(messages_spec(body_limit)?, logic))
}
