use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{ImageJob, ImageSettings, Settings};
use crate::error::ImageError;

/// Blocking client for the Imagen `:predict` endpoint. One image per call.
pub struct ImageClient {
    http: reqwest::blocking::Client,
    url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageStats {
    pub total: usize,
    pub saved: usize,
    pub empty: usize,
    pub errors: usize,
}

impl ImageClient {
    pub fn new(settings: &ImageSettings, api_key: String) -> Result<Self, ImageError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(ImageClient {
            http,
            url: predict_url(&settings.endpoint, &settings.model),
            api_key,
        })
    }

    /// Generate one image for `prompt`. `Ok(None)` when the API returned no image.
    pub fn generate(&self, prompt: &str) -> Result<Option<Vec<u8>>, ImageError> {
        let body = serde_json::json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1 },
        });

        let response = self
            .http
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(ImageError::Status { status, body: text });
        }
        decode_first_image(&text)
    }
}

pub fn predict_url(endpoint: &str, model: &str) -> String {
    format!("{}/models/{}:predict", endpoint.trim_end_matches('/'), model)
}

/// Pull the first base64 image out of a `:predict` response body.
pub fn decode_first_image(body: &str) -> Result<Option<Vec<u8>>, ImageError> {
    let parsed: PredictResponse =
        serde_json::from_str(body).map_err(|e| ImageError::Decode(e.to_string()))?;

    let Some(encoded) = parsed
        .predictions
        .into_iter()
        .find_map(|p| p.bytes_base64_encoded)
    else {
        return Ok(None);
    };

    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map(Some)
        .map_err(|e| ImageError::Decode(format!("invalid base64: {}", e)))
}

/// Generate every configured image (or just `only`), saving `<output_dir>/<slug>.png`.
pub fn run_jobs(settings: &Settings, only: Option<&str>) -> Result<ImageStats> {
    let images = &settings.images;
    let api_key = images.resolved_api_key().context(
        "No image API key: set images.api_key, SITEKIT_IMAGES__API_KEY or GOOGLE_API_KEY",
    )?;
    let client = ImageClient::new(images, api_key)?;

    let out_dir = settings.resolve(&images.output_dir);
    fs::create_dir_all(&out_dir).with_context(|| format!("Failed to create {:?}", out_dir))?;

    let jobs: Vec<&ImageJob> = images
        .jobs
        .iter()
        .filter(|j| only.map_or(true, |slug| j.slug == slug))
        .collect();

    let mut stats = ImageStats {
        total: jobs.len(),
        ..ImageStats::default()
    };

    let pb = ProgressBar::new(jobs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    for job in jobs {
        pb.set_message(job.slug.clone());
        match generate_one(&client, job, &out_dir) {
            Ok(true) => stats.saved += 1,
            Ok(false) => {
                stats.empty += 1;
                warn!("No image returned for {}", job.slug);
            }
            Err(e) => {
                stats.errors += 1;
                warn!("Error generating {}: {}", job.slug, e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(stats)
}

fn generate_one(client: &ImageClient, job: &ImageJob, out_dir: &Path) -> Result<bool, ImageError> {
    info!("Generating {}...", job.slug);
    let Some(bytes) = client.generate(&job.prompt)? else {
        return Ok(false);
    };
    let path = out_dir.join(format!("{}.png", job.slug));
    fs::write(&path, bytes).map_err(|source| ImageError::Save {
        path: path.clone(),
        source,
    })?;
    info!("Saved: {}", path.display());
    Ok(true)
}

// ── Tests ──
