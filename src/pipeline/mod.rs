pub mod staging;

use crate::{
    error::{RelayError, Result},
    logger,
    messages,
    models::{DeliveryOutcome, GenerationRequest},
    traits::{ChannelClient, FileUpload, ImageGenerator},
};
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use staging::{filename_from_url, StagedImage};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub channel: String,
    pub staging_dir: PathBuf,
    pub download_timeout: Duration,
}

/// Runs one generation end to end: generate, fetch, stage, upload.
///
/// Nothing here retries. Every failure is folded into a [`DeliveryOutcome`]
/// so the caller can report it once and move on.
pub struct GenerationPipeline {
    generator: Arc<dyn ImageGenerator>,
    channel: Arc<dyn ChannelClient>,
    http: Client,
    settings: PipelineSettings,
}

impl GenerationPipeline {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        channel: Arc<dyn ChannelClient>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.download_timeout)
            .build()?;

        Ok(Self {
            generator,
            channel,
            http,
            settings,
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn run(&self, user_id: &str, request: &GenerationRequest) -> DeliveryOutcome {
        let reference = {
            let _timer = logger::timer(&format!("generation for {}", user_id));
            match self.generate(request).await {
                Ok(reference) => reference,
                Err(e) => {
                    log::error!("Image generation failed for {}: {}", user_id, e);
                    return DeliveryOutcome::GenerationFailed(e.to_string());
                }
            }
        };

        log::debug!("Generation for {} produced {}", user_id, reference);

        match self.deliver(user_id, &reference).await {
            Ok(()) => {
                log::info!("Delivered image to {} in {}", user_id, self.settings.channel);
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                log::error!("Image delivery failed for {}: {}", user_id, e);
                DeliveryOutcome::DeliveryFailed(e.to_string())
            }
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.generator.generate(request).await?.into_reference()
    }

    async fn deliver(&self, user_id: &str, reference: &str) -> Result<()> {
        let bytes = self.fetch(reference).await?;
        let filename = filename_from_url(reference);
        let staged = StagedImage::write(&self.settings.staging_dir, &filename, &bytes)?;

        let caption = messages::delivery_caption(user_id);
        self.channel
            .upload_file(FileUpload {
                channel: &self.settings.channel,
                path: staged.path(),
                filename: staged.filename(),
                title: messages::UPLOAD_TITLE,
                caption: &caption,
            })
            .await?;

        if let Err(e) = staged.release() {
            log::warn!("Failed to remove staged image: {}", e);
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::DeliveryFailed(format!("image download: {}", e)))?;

        if response.status() != StatusCode::OK {
            return Err(RelayError::DeliveryFailed(format!(
                "image download returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::DeliveryFailed(format!("image body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AspectRatio, GenerationOutput};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedGenerator(std::result::Result<GenerationOutput, String>);

    #[async_trait]
    impl ImageGenerator for FixedGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationOutput> {
            self.0.clone().map_err(RelayError::GenerationFailed)
        }
    }

    #[derive(Default)]
    struct RecordingChannel {
        uploads: Mutex<Vec<(String, Vec<u8>, String)>>,
        fail_uploads: bool,
    }

    #[async_trait]
    impl ChannelClient for RecordingChannel {
        async fn post_message(&self, _channel: &str, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn upload_file(&self, upload: FileUpload<'_>) -> Result<()> {
            let bytes = std::fs::read(upload.path)?;
            self.uploads.lock().unwrap().push((
                upload.filename.to_string(),
                bytes,
                upload.caption.to_string(),
            ));
            if self.fail_uploads {
                return Err(RelayError::SlackError("not_in_channel".into()));
            }
            Ok(())
        }
    }

    fn pipeline(
        generator: FixedGenerator,
        channel: Arc<RecordingChannel>,
        staging_dir: &std::path::Path,
    ) -> GenerationPipeline {
        GenerationPipeline::new(
            Arc::new(generator),
            channel,
            PipelineSettings {
                channel: "C1".into(),
                staging_dir: staging_dir.to_path_buf(),
                download_timeout: Duration::from_secs(5),
            },
        )
        .unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("a red fox", AspectRatio::Widescreen)
    }

    async fn image_server(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/out/fox.webp"))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(b"WEBPDATA".as_ref()))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_delivers_first_image_of_sequence() {
        let server = image_server(200).await;
        let staging = tempfile::tempdir().unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let generator = FixedGenerator(Ok(GenerationOutput::ImageSequence(vec![
            format!("{}/out/fox.webp", server.uri()),
            format!("{}/out/other.webp", server.uri()),
        ])));

        let outcome = pipeline(generator, channel.clone(), staging.path())
            .run("U1", &request())
            .await;

        assert_eq!(outcome, DeliveryOutcome::Delivered);
        let uploads = channel.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "fox.webp");
        assert_eq!(uploads[0].1, b"WEBPDATA");
        assert!(uploads[0].2.contains("<@U1>"));
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_generation_error_maps_to_generation_failed() {
        let staging = tempfile::tempdir().unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let generator = FixedGenerator(Err("prediction failed".into()));

        let outcome = pipeline(generator, channel.clone(), staging.path())
            .run("U1", &request())
            .await;

        assert!(matches!(outcome, DeliveryOutcome::GenerationFailed(_)));
        assert!(channel.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_output_maps_to_generation_failed() {
        let staging = tempfile::tempdir().unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let generator = FixedGenerator(Ok(GenerationOutput::ImageSequence(vec![])));

        let outcome = pipeline(generator, channel.clone(), staging.path())
            .run("U1", &request())
            .await;

        assert!(matches!(outcome, DeliveryOutcome::GenerationFailed(_)));
        assert!(channel.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_200_download_maps_to_delivery_failed() {
        let server = image_server(404).await;
        let staging = tempfile::tempdir().unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let generator = FixedGenerator(Ok(GenerationOutput::SingleImage(format!(
            "{}/out/fox.webp",
            server.uri()
        ))));

        let outcome = pipeline(generator, channel.clone(), staging.path())
            .run("U1", &request())
            .await;

        assert!(matches!(outcome, DeliveryOutcome::DeliveryFailed(_)));
        assert!(channel.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_error_still_removes_staged_file() {
        let server = image_server(200).await;
        let staging = tempfile::tempdir().unwrap();
        let channel = Arc::new(RecordingChannel {
            fail_uploads: true,
            ..Default::default()
        });
        let generator = FixedGenerator(Ok(GenerationOutput::SingleImage(format!(
            "{}/out/fox.webp",
            server.uri()
        ))));

        let outcome = pipeline(generator, channel.clone(), staging.path())
            .run("U1", &request())
            .await;

        assert!(matches!(outcome, DeliveryOutcome::DeliveryFailed(_)));
        assert_eq!(channel.uploads.lock().unwrap().len(), 1);
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }
}
