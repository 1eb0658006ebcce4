use crate::{
    messages,
    models::{Action, DeliveryOutcome, GenerationRequest, InboundEvent},
    pipeline::GenerationPipeline,
    traits::ChannelClient,
    tracker::ConversationTracker,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Glues the conversation tracker to the generation pipeline for one channel.
pub struct Relay {
    tracker: ConversationTracker,
    pipeline: Arc<GenerationPipeline>,
    channel: Arc<dyn ChannelClient>,
}

impl Relay {
    pub fn new(
        tracker: ConversationTracker,
        pipeline: GenerationPipeline,
        channel: Arc<dyn ChannelClient>,
    ) -> Self {
        Self {
            tracker,
            pipeline: Arc::new(pipeline),
            channel,
        }
    }

    pub fn tracker(&self) -> &ConversationTracker {
        &self.tracker
    }

    /// Apply one inbound event. A `Generate` action is dispatched onto its own
    /// task; the handle is returned so callers can await the outcome.
    pub async fn process(&self, event: InboundEvent) -> Option<JoinHandle<DeliveryOutcome>> {
        let action = self.tracker.handle_event(&event);
        log::debug!("{} -> {}", event.user, action.name());

        match action {
            Action::Ignore => None,
            Action::RequestRatio(options) => {
                self.reply(&messages::ratio_prompt(options)).await;
                None
            }
            Action::RequestNonEmptyPrompt => {
                self.reply(messages::EMPTY_PROMPT).await;
                None
            }
            Action::RequestValidRatio(options) => {
                self.reply(&messages::invalid_ratio(options)).await;
                None
            }
            Action::Generate { user_id, request } => Some(self.dispatch(user_id, request)),
        }
    }

    fn dispatch(&self, user_id: String, request: GenerationRequest) -> JoinHandle<DeliveryOutcome> {
        let pipeline = self.pipeline.clone();
        let channel = self.channel.clone();
        let job_id = Uuid::new_v4();

        tokio::spawn(async move {
            log::info!("[job:{}] generating for {}", job_id, user_id);
            let outcome = pipeline.run(&user_id, &request).await;

            match &outcome {
                DeliveryOutcome::Delivered => {
                    log::info!("[job:{}] delivered", job_id);
                }
                DeliveryOutcome::GenerationFailed(cause) | DeliveryOutcome::DeliveryFailed(cause) => {
                    log::error!("[job:{}] failed: {}", job_id, cause);
                    let target = &pipeline.settings().channel;
                    if let Err(e) = channel.post_message(target, messages::GENERATION_FAILED).await {
                        log::error!("[job:{}] could not report failure: {}", job_id, e);
                    }
                }
            }
            outcome
        })
    }

    async fn reply(&self, text: &str) {
        let target = self.tracker.target_channel();
        if let Err(e) = self.channel.post_message(target, text).await {
            log::error!("Failed to post to {}: {}", target, e);
        }
    }
}

/// The single sequential intake lane. Runs until every sender is dropped.
pub async fn run_intake_loop(relay: Arc<Relay>, mut events: mpsc::Receiver<InboundEvent>) {
    while let Some(event) = events.recv().await {
        // Generation jobs run detached; only intake ordering matters here.
        let _ = relay.process(event).await;
    }
    log::warn!("Intake lane closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RelayError, Result};
    use crate::models::{AspectRatio, GenerationOutput};
    use crate::pipeline::PipelineSettings;
    use crate::traits::{FileUpload, ImageGenerator};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    const CHANNEL: &str = "C1";

    struct FailingGenerator;

    #[async_trait]
    impl ImageGenerator for FailingGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationOutput> {
            Err(RelayError::GenerationFailed("boom".into()))
        }
    }

    #[derive(Default)]
    struct RecordingChannel {
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChannelClient for RecordingChannel {
        async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
            assert_eq!(channel, CHANNEL);
            self.posts.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn upload_file(&self, _upload: FileUpload<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn relay(channel: Arc<RecordingChannel>, staging: &std::path::Path) -> Relay {
        let pipeline = GenerationPipeline::new(
            Arc::new(FailingGenerator),
            channel.clone(),
            PipelineSettings {
                channel: CHANNEL.into(),
                staging_dir: staging.to_path_buf(),
                download_timeout: Duration::from_secs(5),
            },
        )
        .unwrap();
        Relay::new(ConversationTracker::new(CHANNEL, "UBOT"), pipeline, channel)
    }

    #[tokio::test]
    async fn test_replies_follow_actions() {
        let staging = tempfile::tempdir().unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let relay = relay(channel.clone(), staging.path());

        assert!(relay.process(InboundEvent::message(CHANNEL, "U1", "generate ")).await.is_none());
        assert!(relay.process(InboundEvent::message(CHANNEL, "U1", "generate fox")).await.is_none());
        assert!(relay.process(InboundEvent::message(CHANNEL, "U1", "wide")).await.is_none());
        assert!(relay.process(InboundEvent::message(CHANNEL, "U1", "hello")).await.is_none());

        let posts = channel.posts.lock().unwrap().clone();
        assert_eq!(
            posts,
            vec![
                messages::EMPTY_PROMPT.to_string(),
                messages::ratio_prompt(&AspectRatio::ALL),
                messages::invalid_ratio(&AspectRatio::ALL),
                messages::invalid_ratio(&AspectRatio::ALL),
            ]
        );
        assert_eq!(relay.tracker().pending_prompt("U1").unwrap().prompt, "fox");
    }

    #[tokio::test]
    async fn test_failed_generation_posts_one_notice() {
        let staging = tempfile::tempdir().unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let relay = relay(channel.clone(), staging.path());

        relay.process(InboundEvent::message(CHANNEL, "U1", "generate fox")).await;
        let job = relay
            .process(InboundEvent::message(CHANNEL, "U1", AspectRatio::Square.as_str()))
            .await
            .expect("ratio reply should dispatch a job");

        let outcome = job.await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::GenerationFailed(_)));

        let posts = channel.posts.lock().unwrap().clone();
        assert_eq!(posts.last().unwrap(), messages::GENERATION_FAILED);
        assert_eq!(
            posts.iter().filter(|p| *p == messages::GENERATION_FAILED).count(),
            1
        );
        assert_eq!(relay.tracker().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_intake_loop_survives_failures() {
        let staging = tempfile::tempdir().unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let relay = Arc::new(relay(channel.clone(), staging.path()));
        let (tx, rx) = mpsc::channel(8);

        let intake = tokio::spawn(run_intake_loop(relay.clone(), rx));
        for text in ["generate fox", "1:1"] {
            tx.send(InboundEvent::message(CHANNEL, "U1", text)).await.unwrap();
        }

        let notified = async {
            while !channel
                .posts
                .lock()
                .unwrap()
                .iter()
                .any(|p| p == messages::GENERATION_FAILED)
            {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), notified)
            .await
            .expect("failure notice was never posted");
        assert!(!intake.is_finished());

        tx.send(InboundEvent::message(CHANNEL, "U1", "generate owl")).await.unwrap();
        drop(tx);
        intake.await.unwrap();

        assert_eq!(relay.tracker().pending_prompt("U1").unwrap().prompt, "owl");
        let posts = channel.posts.lock().unwrap().clone();
        assert_eq!(posts.last().unwrap(), &messages::ratio_prompt(&AspectRatio::ALL));
    }
}
