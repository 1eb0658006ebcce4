use super::ratio::AspectRatio;
use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub upsampling: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio,
            upsampling: true,
        }
    }
}

/// Raw output of the generation capability: one reference or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationOutput {
    SingleImage(String),
    ImageSequence(Vec<String>),
}

impl GenerationOutput {
    /// Collapse to the one reference the pipeline delivers.
    pub fn into_reference(self) -> Result<String> {
        let reference = match self {
            GenerationOutput::SingleImage(url) => Some(url),
            GenerationOutput::ImageSequence(urls) => urls.into_iter().next(),
        };

        reference
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RelayError::GenerationFailed("no image reference returned".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    GenerationFailed(String),
    DeliveryFailed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}
