use slack_morphism::prelude::*;
use slackgen::logger::{self, LoggerConfig};
use slackgen::slack::{error_handler, handle_push_event, ListenerState};
use slackgen::{
    run_intake_loop, Config, ConversationTracker, GenerationPipeline, PipelineSettings, Relay,
    ReplicateImageClient, SlackChannel,
};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    logger::init_with_config(LoggerConfig::from_env())?;
    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let config = Config::from_env();
    logger::log_config_info(&config);
    config.validate()?;

    let channel_id = config.slack.channel_id()?.to_string();
    log::info!("⚙️  Starting relay for channel {}...", channel_id);

    let slack_client = Arc::new(SlackClient::new(SlackClientHyperConnector::new()?));
    let slack = Arc::new(SlackChannel::new(
        slack_client.clone(),
        &config.slack,
        config.download_timeout(),
    )?);

    match slack.check_channel_access(&channel_id).await {
        Ok(name) => log::info!("🔗 Connected to channel #{}", name),
        Err(e) => {
            log::error!("❌ Cannot access channel {}: {}", channel_id, e);
            return Err(e.into());
        }
    }

    let bot_user_id = match config.slack.bot_user_id.clone() {
        Some(id) => id,
        None => {
            let id = slack.resolve_bot_user_id().await?;
            log::info!("🤖 Resolved bot user id: {}", id);
            id
        }
    };

    let generator = Arc::new(ReplicateImageClient::new(config.replicate.clone())?);
    let pipeline = GenerationPipeline::new(
        generator,
        slack.clone(),
        PipelineSettings {
            channel: channel_id.clone(),
            staging_dir: config.staging_dir.clone(),
            download_timeout: config.download_timeout(),
        },
    )?;
    let tracker = ConversationTracker::new(channel_id, bot_user_id);
    let relay = Arc::new(Relay::new(tracker, pipeline, slack.clone()));

    let (events_tx, events_rx) = mpsc::channel(config.intake_queue_size);
    let intake_handle = tokio::spawn(run_intake_loop(relay, events_rx));

    let socket_mode_callbacks =
        SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_event);

    let listener_environment = Arc::new(
        SlackClientEventsListenerEnvironment::new(slack_client.clone())
            .with_error_handler(error_handler)
            .with_user_state(ListenerState { events: events_tx }),
    );

    let socket_mode_listener = SlackClientSocketModeListener::new(
        &SlackClientSocketModeConfig::new(),
        listener_environment,
        socket_mode_callbacks,
    );

    let app_token = SlackApiToken::new(config.slack.app_token()?.to_string().into());
    socket_mode_listener.listen_for(&app_token).await?;

    log::info!("👂 Listening for messages. Press Ctrl+C to stop.");

    tokio::select! {
        _ = socket_mode_listener.serve() => {
            log::warn!("Socket Mode listener exited");
        }
        res = intake_handle => {
            match res {
                Ok(()) => log::warn!("Intake loop exited"),
                Err(e) => log::error!("Intake loop panicked: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Received Ctrl+C, shutting down");
        }
    }

    log::info!("Shutdown complete");
    Ok(())
}
