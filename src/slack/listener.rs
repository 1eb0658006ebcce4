use crate::models::InboundEvent;
use slack_morphism::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared state injected into the Socket Mode listener via `with_user_state`.
#[derive(Clone)]
pub struct ListenerState {
    pub events: mpsc::Sender<InboundEvent>,
}

/// Forwards plain channel messages to the intake lane and returns at once,
/// so the envelope is acknowledged before any generation work starts.
pub async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = {
        let states = states.read().await;
        states.get_user_state::<ListenerState>().cloned()
    }
    .ok_or("ListenerState missing from listener environment")?;

    if let SlackEventCallbackBody::Message(msg) = event.event {
        if let Some(inbound) = to_inbound(&msg) {
            if let Err(e) = state.events.send(inbound).await {
                log::error!("Intake lane closed, dropping message: {}", e);
            }
        }
    }

    Ok(())
}

/// Subtypes that still carry text a user typed into the channel.
fn carries_user_text(subtype: Option<&SlackMessageEventType>) -> bool {
    matches!(
        subtype,
        None | Some(SlackMessageEventType::FileShare)
            | Some(SlackMessageEventType::ThreadBroadcast)
            | Some(SlackMessageEventType::MeMessage)
    )
}

/// User messages pass. Edits, deletions, joins and anything posted by a bot
/// are dropped here.
fn to_inbound(msg: &SlackMessageEvent) -> Option<InboundEvent> {
    if msg.sender.bot_id.is_some() || !carries_user_text(msg.subtype.as_ref()) {
        return None;
    }

    let channel = msg.origin.channel.as_ref()?.0.clone();
    let user = msg.sender.user.as_ref()?.0.clone();
    let text = msg
        .content
        .as_ref()
        .and_then(|c| c.text.clone())
        .unwrap_or_default();

    log::debug!("Message from {} in {}", user, channel);
    Some(InboundEvent::message(channel, user, text))
}

pub fn error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    log::error!("Slack socket mode error: {}", err);
    HttpStatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: serde_json::Value) -> SlackMessageEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_plain_message_is_forwarded() {
        let msg = message(json!({
            "ts": "1700000000.000100",
            "channel": "C1",
            "user": "U1",
            "text": "generate a red fox"
        }));

        assert_eq!(
            to_inbound(&msg),
            Some(InboundEvent::message("C1", "U1", "generate a red fox"))
        );
    }

    #[test]
    fn test_bot_messages_are_dropped() {
        let msg = message(json!({
            "ts": "1700000000.000200",
            "channel": "C1",
            "bot_id": "B1",
            "text": "🖼 Which aspect ratio would you like?"
        }));
        assert_eq!(to_inbound(&msg), None);
    }

    #[test]
    fn test_file_share_message_is_forwarded() {
        let msg = message(json!({
            "ts": "1700000000.000400",
            "channel": "C1",
            "user": "U1",
            "subtype": "file_share",
            "text": "generate a fox"
        }));
        assert_eq!(
            to_inbound(&msg),
            Some(InboundEvent::message("C1", "U1", "generate a fox"))
        );
    }

    #[test]
    fn test_thread_broadcast_reply_is_forwarded() {
        let msg = message(json!({
            "ts": "1700000000.000500",
            "thread_ts": "1700000000.000400",
            "channel": "C1",
            "user": "U1",
            "subtype": "thread_broadcast",
            "text": "16:9"
        }));
        assert_eq!(to_inbound(&msg), Some(InboundEvent::message("C1", "U1", "16:9")));
    }

    #[test]
    fn test_edited_message_is_dropped() {
        let msg = message(json!({
            "ts": "1700000000.000600",
            "channel": "C1",
            "subtype": "message_changed"
        }));
        assert_eq!(to_inbound(&msg), None);
    }

    #[test]
    fn test_join_messages_are_dropped() {
        let msg = message(json!({
            "ts": "1700000000.000300",
            "channel": "C1",
            "user": "U1",
            "subtype": "channel_join",
            "text": "<@U1> has joined the channel"
        }));
        assert_eq!(to_inbound(&msg), None);
    }
}
