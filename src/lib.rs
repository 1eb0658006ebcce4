pub mod config;
pub mod error;
pub mod logger;
pub mod messages;
pub mod models;
pub mod pipeline;
pub mod relay;
pub mod replicate;
pub mod slack;
pub mod tracker;
pub mod traits;

pub use config::{Config, ReplicateConfig, SlackConfig};
pub use error::{RelayError, Result};
pub use models::*;
pub use pipeline::{GenerationPipeline, PipelineSettings};
pub use relay::{run_intake_loop, Relay};
pub use replicate::ReplicateImageClient;
pub use slack::SlackChannel;
pub use tracker::ConversationTracker;
pub use traits::{ChannelClient, FileUpload, ImageGenerator};
