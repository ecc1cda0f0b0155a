//! Messages API schemas
//!
//! These schemas match the subset of the Anthropic Messages API the mock serves.
//! See: https://docs.anthropic.com/en/api/messages
//!
//! Fields with a single allowed value (`role`, `stop_reason`, `type`) are single-variant enums;
//! the upstream API has more variants that the mock never produces.

use crate::schema::{ObjectSchema, Schema, Shape};
use serde::{Deserialize, Serialize};

/// Request body for POST /v1/messages
///
/// Keys not listed here (`system`, `temperature`, ...) are accepted and dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    /// The model to answer as; echoed back verbatim
    pub model: String,

    /// Maximum tokens to generate. Any JSON number; the mock never reads it
    pub max_tokens: f64,

    /// The conversation so far
    pub messages: Vec<InputMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: String,
    pub content: String,
}

impl Shape for MessagesRequest {
    fn schema() -> Schema {
        ObjectSchema::new()
            .required("model", Schema::String)
            .required("max_tokens", Schema::Number)
            .required("messages", Schema::array(InputMessage::schema()))
            .into()
    }
}

impl Shape for InputMessage {
    fn schema() -> Schema {
        ObjectSchema::new()
            .required("role", Schema::String)
            .required("content", Schema::String)
            .into()
    }
}

/// Response from POST /v1/messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_request_id")]
    pub request_id: String,
    pub content: Vec<ContentBlock>,
    pub id: String,
    pub model: String,
    pub role: Role,
    pub stop_reason: StopReason,
    /// Always null from the mock; the schema enforces it
    pub stop_sequence: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub usage: Usage,
}

/// One unit of an assistant message's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Message,
}

/// Token accounting for a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Shape for Message {
    fn schema() -> Schema {
        ObjectSchema::new()
            .required("_request_id", Schema::String)
            .required("content", Schema::array(ContentBlock::schema()))
            .required("id", Schema::String)
            .required("model", Schema::String)
            .required("role", Schema::literal("assistant"))
            .required("stop_reason", Schema::literal("end_turn"))
            .required("stop_sequence", Schema::Null)
            .required("type", Schema::literal("message"))
            .required("usage", Usage::schema())
            .strict()
            .into()
    }
}

impl Shape for ContentBlock {
    fn schema() -> Schema {
        ObjectSchema::new()
            .required("text", Schema::String)
            .required("type", Schema::literal("text"))
            .strict()
            .into()
    }
}

impl Shape for Usage {
    fn schema() -> Schema {
        ObjectSchema::new()
            .required("cache_creation_input_tokens", Schema::integer_at_least(0))
            .required("cache_read_input_tokens", Schema::integer_at_least(0))
            .required("input_tokens", Schema::integer_at_least(0))
            .required("output_tokens", Schema::integer_at_least(0))
            .strict()
            .into()
    }
}
