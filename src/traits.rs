use crate::{
    error::Result,
    models::{GenerationOutput, GenerationRequest},
};
use async_trait::async_trait;
use std::path::Path;

/// Turns a prompt + aspect ratio into an image reference.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput>;
}

#[derive(Debug, Clone, Copy)]
pub struct FileUpload<'a> {
    pub channel: &'a str,
    pub path: &'a Path,
    pub filename: &'a str,
    pub title: &'a str,
    pub caption: &'a str,
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<()>;

    async fn upload_file(&self, upload: FileUpload<'_>) -> Result<()>;
}
