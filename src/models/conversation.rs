use super::generation::GenerationRequest;
use super::ratio::AspectRatio;
use serde::{Deserialize, Serialize};

pub const MESSAGE_EVENT: &str = "message";

/// A chat event as it leaves the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub channel: String,
    pub user: String,
    pub text: String,
}

impl InboundEvent {
    pub fn message(
        channel: impl Into<String>,
        user: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            event_type: MESSAGE_EVENT.to_string(),
            channel: channel.into(),
            user: user.into(),
            text: text.into(),
        }
    }

    pub fn is_message(&self) -> bool {
        self.event_type == MESSAGE_EVENT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPrompt {
    pub user_id: String,
    pub prompt: String,
}

/// What the relay must do in response to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Ignore,
    RequestRatio(&'static [AspectRatio]),
    RequestNonEmptyPrompt,
    RequestValidRatio(&'static [AspectRatio]),
    Generate {
        user_id: String,
        request: GenerationRequest,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Ignore => "ignore",
            Action::RequestRatio(_) => "request_ratio",
            Action::RequestNonEmptyPrompt => "request_non_empty_prompt",
            Action::RequestValidRatio(_) => "request_valid_ratio",
            Action::Generate { .. } => "generate",
        }
    }
}
