use crate::models::{Action, AspectRatio, GenerationRequest, InboundEvent, PendingPrompt};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

const COMMAND_PREFIX: &str = "generate ";

/// Per-user conversation state: at most one prompt waiting for a ratio reply.
pub struct ConversationTracker {
    target_channel: String,
    bot_user_id: String,
    pending: Mutex<HashMap<String, String>>,
}

impl ConversationTracker {
    pub fn new(target_channel: impl Into<String>, bot_user_id: impl Into<String>) -> Self {
        Self {
            target_channel: target_channel.into(),
            bot_user_id: bot_user_id.into(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn target_channel(&self) -> &str {
        &self.target_channel
    }

    pub fn handle_event(&self, event: &InboundEvent) -> Action {
        if !event.is_message() {
            return Action::Ignore;
        }
        self.handle(&event.user, &event.text, &event.channel)
    }

    pub fn handle(&self, user_id: &str, text: &str, channel: &str) -> Action {
        let trimmed = text.trim();
        if channel != self.target_channel || user_id == self.bot_user_id || trimmed.is_empty() {
            return Action::Ignore;
        }

        // Lookup, removal and insertion all happen under this one guard.
        let mut pending = self.table();

        if pending.contains_key(user_id) {
            return match AspectRatio::parse(trimmed) {
                Some(ratio) => match pending.remove(user_id) {
                    Some(prompt) => {
                        log::info!("👤 [{}]: {} (ratio: {})", user_id, prompt, ratio);
                        Action::Generate {
                            user_id: user_id.to_string(),
                            request: GenerationRequest::new(prompt, ratio),
                        }
                    }
                    None => Action::Ignore,
                },
                None => {
                    log::debug!("Rejected ratio reply from {}: {:?}", user_id, trimmed);
                    Action::RequestValidRatio(&AspectRatio::ALL)
                }
            };
        }

        match strip_command(text) {
            Some(prompt) if prompt.is_empty() => Action::RequestNonEmptyPrompt,
            Some(prompt) => {
                log::debug!("Stored pending prompt for {}", user_id);
                pending.insert(user_id.to_string(), prompt.to_string());
                Action::RequestRatio(&AspectRatio::ALL)
            }
            None => Action::Ignore,
        }
    }

    pub fn pending_prompt(&self, user_id: &str) -> Option<PendingPrompt> {
        self.table().get(user_id).map(|prompt| PendingPrompt {
            user_id: user_id.to_string(),
            prompt: prompt.clone(),
        })
    }

    pub fn pending_count(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // Nothing panics while the guard is held, but never wedge the relay on poison.
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Returns the trimmed prompt after a case-insensitive `generate ` prefix.
/// A bare `generate` yields an empty prompt.
fn strip_command(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let keyword = COMMAND_PREFIX.trim_end();

    if text.trim_end().eq_ignore_ascii_case(keyword) {
        return Some("");
    }

    let head = text.get(..COMMAND_PREFIX.len())?;
    if head.eq_ignore_ascii_case(COMMAND_PREFIX) {
        Some(text[COMMAND_PREFIX.len()..].trim())
    } else {
        None
    }
}
