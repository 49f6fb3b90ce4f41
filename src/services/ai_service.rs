use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::ai::{
    SummarizeParameters, SummarizeRequest, SummarizeResponse, TranslateRequest, TranslateResponse,
};
use crate::models::settings::{SummarizerSettings, TranslatorSettings};
use crate::services::content_shaper::{Summarizer, Translator};
use crate::utils::http::build_ai_client;
use crate::utils::text::truncate_chars;

/// Longer inputs are cut before being sent to the model
pub const SUMMARY_INPUT_LIMIT: usize = 1500;
pub const SUMMARY_MAX_LENGTH: u32 = 120;
pub const SUMMARY_MIN_LENGTH: u32 = 30;
const SUMMARY_TIMEOUT_SECS: u64 = 25;
const TRANSLATE_TIMEOUT_SECS: u64 = 10;

// ============================================================
// HuggingFace inference summarizer
// ============================================================

pub struct HuggingFaceSummarizer {
    client: reqwest::Client,
    url: String,
    api_token: String,
}

impl HuggingFaceSummarizer {
    pub fn new(settings: &SummarizerSettings) -> anyhow::Result<Self> {
        let client = build_ai_client(SUMMARY_TIMEOUT_SECS)?;
        let url = format!(
            "{}/models/{}",
            settings.api_base.trim_end_matches('/'),
            settings.model
        );
        Ok(Self {
            client,
            url,
            api_token: settings.api_token.clone(),
        })
    }
}

#[async_trait]
impl Summarizer for HuggingFaceSummarizer {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    async fn summarize(&self, text: &str) -> Result<String, ServiceError> {
        let req = SummarizeRequest {
            inputs: truncate_chars(text, SUMMARY_INPUT_LIMIT),
            parameters: SummarizeParameters {
                max_length: SUMMARY_MAX_LENGTH,
                min_length: SUMMARY_MIN_LENGTH,
            },
        };

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ServiceError::status(status, &body));
        }

        let parsed: SummarizeResponse = serde_json::from_str(&body)?;
        parsed.into_summary().map_err(ServiceError::Malformed)
    }
}

// ============================================================
// LibreTranslate
// ============================================================

pub struct LibreTranslator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl LibreTranslator {
    pub fn new(settings: &TranslatorSettings) -> anyhow::Result<Self> {
        let client = build_ai_client(TRANSLATE_TIMEOUT_SECS)?;
        Ok(Self {
            client,
            url: settings.url.clone(),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl Translator for LibreTranslator {
    fn name(&self) -> &'static str {
        "libretranslate"
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, ServiceError> {
        let req = TranslateRequest {
            q: text,
            source,
            target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let resp = self.client.post(&self.url).json(&req).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ServiceError::status(status, &body));
        }

        let parsed: TranslateResponse = serde_json::from_str(&body)?;
        let translated = parsed.translated_text.trim().to_string();
        if translated.is_empty() {
            return Err(ServiceError::Malformed("empty translatedText".to_string()));
        }
        Ok(translated)
    }
}
