use crate::{
    config::ReplicateConfig,
    error::{RelayError, Result},
    models::{GenerationOutput, GenerationRequest},
    traits::ImageGenerator,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: Option<String>,
    #[serde(default)]
    status: String,
    output: Option<GenerationOutput>,
    error: Option<Value>,
    urls: Option<PredictionUrls>,
}

impl Prediction {
    fn is_pending(&self) -> bool {
        matches!(self.status.as_str(), "starting" | "processing")
    }

    fn poll_url(&self) -> Result<&str> {
        self.urls
            .as_ref()
            .and_then(|urls| urls.get.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RelayError::GenerationFailed("prediction missing poll URL".into()))
    }

    fn into_output(self) -> Result<GenerationOutput> {
        match self.status.as_str() {
            "succeeded" => self.output.ok_or_else(|| {
                RelayError::GenerationFailed("prediction succeeded without output".into())
            }),
            status => Err(RelayError::GenerationFailed(format!(
                "prediction {} ended as {}: {}",
                self.id.as_deref().unwrap_or("<unknown>"),
                if status.is_empty() { "<no status>" } else { status },
                self.error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no error detail".to_string())
            ))),
        }
    }
}

/// Replicate-hosted text-to-image model, called through the predictions API.
#[derive(Clone)]
pub struct ReplicateImageClient {
    http: Client,
    api_base: String,
    api_token: String,
    model: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl ReplicateImageClient {
    pub fn new(config: ReplicateConfig) -> Result<Self> {
        let api_token = config.api_token()?.to_string();
        let timeout = config.timeout();
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            api_token,
            model: config.model.clone(),
            timeout,
            poll_interval: config.poll_interval(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn predictions_endpoint(&self) -> String {
        format!("{}/models/{}/predictions", self.api_base, self.model)
    }

    async fn read_prediction(&self, response: reqwest::Response) -> Result<Prediction> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RelayError::GenerationFailed(format!(
                "Replicate request failed ({}): {}",
                status.as_u16(),
                truncate(&body, 512)
            )));
        }
        serde_json::from_str(&body).map_err(|e| {
            RelayError::GenerationFailed(format!("Replicate returned an unexpected payload: {}", e))
        })
    }

    async fn poll(&self, mut prediction: Prediction, deadline: Instant) -> Result<Prediction> {
        while prediction.is_pending() {
            if Instant::now() + self.poll_interval > deadline {
                return Err(RelayError::GenerationFailed(format!(
                    "prediction timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;

            let poll_url = prediction.poll_url()?.to_string();
            log::debug!("Polling Replicate prediction at {}", poll_url);
            let response = self
                .http
                .get(&poll_url)
                .bearer_auth(&self.api_token)
                .send()
                .await?;
            prediction = self.read_prediction(response).await?;
        }
        Ok(prediction)
    }

    async fn run_prediction(
        &self,
        request: &GenerationRequest,
        deadline: Instant,
    ) -> Result<GenerationOutput> {
        let payload = json!({
            "input": {
                "prompt": request.prompt,
                "aspect_ratio": request.aspect_ratio,
                "prompt_upsampling": request.upsampling,
            }
        });

        log::info!(
            "Generating image with model: {} (ratio {})",
            self.model,
            request.aspect_ratio
        );

        let response = self
            .http
            .post(self.predictions_endpoint())
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::GenerationFailed(format!("Replicate request: {}", e)))?;

        let prediction = self.read_prediction(response).await?;
        let prediction = self.poll(prediction, deadline).await?;
        prediction.into_output()
    }
}

#[async_trait]
impl ImageGenerator for ReplicateImageClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        let deadline = Instant::now() + self.timeout;
        tokio::time::timeout_at(deadline, self.run_prediction(request, deadline))
            .await
            .map_err(|_| {
                RelayError::GenerationFailed(format!(
                    "prediction timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
