//! ComfyUI image generator.
//!
//! One job is: queue a workflow with `POST /prompt`, poll
//! `GET /history/{id}` until the job reports outputs, then download each
//! output image with `GET /view`. Progress is reported at those
//! milestones, with polling mapped onto the space between them.

use super::workflow::{SAVE_NODE, WorkflowParams, build_workflow, negative_prompt};
use crate::config::FileImageConfig;
use async_trait::async_trait;
use cud_application::{GenerationProgress, ImageError, ImageGenerator, ImageRequest};
use cud_domain::{ActiveAdapters, AdapterId, BinaryImage, PresetTable};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const QUEUED_PERCENT: u8 = 5;
const SAMPLING_DONE_PERCENT: u8 = 90;

/// Sampler and polling settings applied to every job
#[derive(Debug, Clone, PartialEq)]
pub struct ComfyUiSettings {
    pub checkpoint: String,
    pub steps: u32,
    pub cfg: f32,
    pub sampler_name: String,
    pub scheduler: String,
    pub negative_suffix: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl From<&FileImageConfig> for ComfyUiSettings {
    fn from(config: &FileImageConfig) -> Self {
        Self {
            checkpoint: config.checkpoint.clone(),
            steps: config.steps.max(1),
            cfg: config.cfg,
            sampler_name: config.sampler_name.clone(),
            scheduler: config.scheduler.clone(),
            negative_suffix: config.negative_suffix.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(10)),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    prompt_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryEntry {
    #[serde(default)]
    outputs: BTreeMap<String, NodeOutput>,
    #[serde(default)]
    status: Option<HistoryStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeOutput {
    #[serde(default)]
    images: Vec<OutputImage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputImage {
    filename: String,
    #[serde(default)]
    subfolder: String,
    #[serde(rename = "type", default = "output_type")]
    kind: String,
}

fn output_type() -> String {
    "output".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct HistoryStatus {
    #[serde(default)]
    status_str: Option<String>,
    #[serde(default)]
    completed: bool,
}

/// State of a queued job as seen in `/history`
#[derive(Debug)]
enum JobState {
    Pending,
    Finished(Vec<OutputImage>),
    Failed(String),
}

impl HistoryEntry {
    fn state(self) -> JobState {
        if let Some(status) = &self.status
            && status.status_str.as_deref() == Some("error")
        {
            return JobState::Failed("backend reported an execution error".to_string());
        }

        let completed = self.status.as_ref().is_some_and(|s| s.completed);
        // Prefer the save node; fall back to any node that produced images
        let mut outputs = self.outputs;
        let images: Vec<OutputImage> = match outputs.remove(SAVE_NODE) {
            Some(save) if !save.images.is_empty() => save.images,
            _ => outputs.into_values().flat_map(|o| o.images).collect(),
        };

        if !images.is_empty() {
            JobState::Finished(images)
        } else if completed {
            JobState::Finished(Vec::new())
        } else {
            JobState::Pending
        }
    }
}

pub struct ComfyUiImageGenerator {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    settings: ComfyUiSettings,
    presets: PresetTable,
}

impl ComfyUiImageGenerator {
    pub fn new(
        api_host: &str,
        settings: ComfyUiSettings,
        presets: PresetTable,
    ) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ImageError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url(api_host),
            client_id: format!("cud-chat-{}", std::process::id()),
            settings,
            presets,
        })
    }

    pub fn from_config(config: &FileImageConfig) -> Result<Self, ImageError> {
        let (presets, _) = config.preset_table();
        Self::new(&config.api_host, ComfyUiSettings::from(config), presets)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn presets(&self) -> &PresetTable {
        &self.presets
    }

    /// Workflow for `request`, chaining only adapters not yet recorded in
    /// the job's `active` set.
    fn workflow_for(&self, request: &ImageRequest, seed: u64, active: &mut ActiveAdapters) -> Value {
        let (width, height) = self.presets.dimensions(request.resolution);
        let params = WorkflowParams {
            checkpoint: self.settings.checkpoint.clone(),
            prompt: request.prompt.clone(),
            negative: negative_prompt(request.negative.as_deref(), &self.settings.negative_suffix),
            width,
            height,
            steps: self.settings.steps,
            cfg: self.settings.cfg,
            sampler_name: self.settings.sampler_name.clone(),
            scheduler: self.settings.scheduler.clone(),
            seed,
        };

        let adapters = active.take_unapplied(&request.adapters);
        build_workflow(&params, &adapters)
    }

    async fn queue(&self, workflow: Value) -> Result<String, ImageError> {
        let body = serde_json::json!({ "prompt": workflow, "client_id": self.client_id });
        let response = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ImageError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ImageError::Rejected(format!("HTTP {}: {}", status.as_u16(), text)));
        }

        let queued: QueueResponse = response
            .json()
            .await
            .map_err(|e| ImageError::Rejected(format!("Unexpected queue response: {}", e)))?;
        Ok(queued.prompt_id)
    }

    async fn poll(&self, prompt_id: &str) -> Result<JobState, ImageError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.base_url, prompt_id))
            .send()
            .await
            .map_err(|e| ImageError::ConnectionError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ImageError::Other(format!(
                "History request failed with HTTP {}",
                response.status().as_u16()
            )));
        }

        let mut history: BTreeMap<String, HistoryEntry> = response
            .json()
            .await
            .map_err(|e| ImageError::Other(format!("Unexpected history response: {}", e)))?;
        Ok(history
            .remove(prompt_id)
            .map(HistoryEntry::state)
            .unwrap_or(JobState::Pending))
    }

    async fn wait_for_outputs(
        &self,
        prompt_id: &str,
        progress: &dyn GenerationProgress,
    ) -> Result<Vec<OutputImage>, ImageError> {
        let started = Instant::now();
        let deadline = started + self.settings.timeout;
        loop {
            match self.poll(prompt_id).await? {
                JobState::Finished(images) => return Ok(images),
                JobState::Failed(reason) => return Err(ImageError::Rejected(reason)),
                JobState::Pending => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ImageError::Timeout(self.settings.timeout.as_secs()));
            }
            progress.on_progress(waiting_percent(
                now - started,
                self.settings.timeout,
            ));
            tokio::time::sleep(self.settings.poll_interval.min(deadline - now)).await;
        }
    }

    async fn download(&self, image: &OutputImage) -> Result<BinaryImage, ImageError> {
        let response = self
            .client
            .get(format!("{}/view", self.base_url))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.kind.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ImageError::ConnectionError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ImageError::Other(format!(
                "Downloading {} failed with HTTP {}",
                image.filename,
                response.status().as_u16()
            )));
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or("image/png")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageError::ConnectionError(e.to_string()))?;
        Ok(BinaryImage::new(bytes.to_vec(), media_type))
    }
}

#[async_trait]
impl ImageGenerator for ComfyUiImageGenerator {
    async fn generate(
        &self,
        request: &ImageRequest,
        progress: &dyn GenerationProgress,
    ) -> Result<Vec<BinaryImage>, ImageError> {
        let mut active = ActiveAdapters::new();
        let workflow = self.workflow_for(request, seed(), &mut active);
        debug!("Workflow chains {} adapter(s)", active.len());
        let prompt_id = self.queue(workflow).await?;
        info!("Queued image job {}", prompt_id);
        progress.on_progress(QUEUED_PERCENT);

        let outputs = self.wait_for_outputs(&prompt_id, progress).await?;
        progress.on_progress(SAMPLING_DONE_PERCENT);
        debug!("Job {} produced {} image(s)", prompt_id, outputs.len());

        let mut images = Vec::with_capacity(outputs.len());
        for output in &outputs {
            images.push(self.download(output).await?);
        }
        progress.on_progress(100);
        Ok(images)
    }

    async fn list_adapters(&self) -> Result<Vec<AdapterId>, ImageError> {
        let response = self
            .client
            .get(format!("{}/object_info/LoraLoader", self.base_url))
            .send()
            .await
            .map_err(|e| ImageError::ConnectionError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ImageError::Other(format!(
                "Adapter listing failed with HTTP {}",
                response.status().as_u16()
            )));
        }

        let info: Value = response
            .json()
            .await
            .map_err(|e| ImageError::Other(format!("Unexpected adapter listing: {}", e)))?;
        let adapters = parse_lora_names(&info);
        if adapters.is_empty() {
            warn!("Backend reported no adapters");
        }
        Ok(adapters)
    }
}

/// Accept `host:port` as well as a full URL.
fn base_url(api_host: &str) -> String {
    let trimmed = api_host.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

fn seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Progress while waiting, between the queued and sampled milestones
fn waiting_percent(elapsed: Duration, timeout: Duration) -> u8 {
    if timeout.is_zero() {
        return QUEUED_PERCENT;
    }
    let fraction = (elapsed.as_secs_f64() / timeout.as_secs_f64()).min(1.0);
    let span = f64::from(SAMPLING_DONE_PERCENT - QUEUED_PERCENT - 1);
    QUEUED_PERCENT + (fraction * span) as u8
}

/// `LoraLoader.input.required.lora_name[0]` of an `/object_info` reply
fn parse_lora_names(info: &Value) -> Vec<AdapterId> {
    info.pointer("/LoraLoader/input/required/lora_name/0")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(AdapterId::new)
                .collect()
        })
        .unwrap_or_default()
}
