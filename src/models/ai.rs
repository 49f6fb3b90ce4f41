use serde::{Deserialize, Serialize};

// ============================================================
// Summarization (HuggingFace inference API)
// ============================================================

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeRequest<'a> {
    pub inputs: &'a str,
    pub parameters: SummarizeParameters,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SummarizeParameters {
    pub max_length: u32,
    pub min_length: u32,
}

/// The inference API answers either with a bare string, a list whose first
/// element is `{summary_text}` or a string, or an `{error}` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SummarizeResponse {
    Text(String),
    List(Vec<SummaryElement>),
    Error { error: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SummaryElement {
    Summary { summary_text: String },
    Text(String),
}

impl SummarizeResponse {
    /// Extracts the summary text, or describes why the payload is unusable.
    pub fn into_summary(self) -> Result<String, String> {
        let text = match self {
            SummarizeResponse::Text(s) => s,
            SummarizeResponse::List(items) => match items.into_iter().next() {
                Some(SummaryElement::Summary { summary_text }) => summary_text,
                Some(SummaryElement::Text(s)) => s,
                None => return Err("empty summary list".to_string()),
            },
            SummarizeResponse::Error { error } => return Err(error),
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            Err("blank summary".to_string())
        } else {
            Ok(text)
        }
    }
}

// ============================================================
// Translation (LibreTranslate)
// ============================================================

#[derive(Debug, Clone, Serialize)]
pub struct TranslateRequest<'a> {
    pub q: &'a str,
    pub source: &'a str,
    pub target: &'a str,
    pub format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateResponse {
    #[serde(rename = "translatedText")]
    pub translated_text: String,
}

// ============================================================
// Messaging (Telegram Bot API)
// ============================================================

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub parse_mode: &'static str,
    pub disable_web_page_preview: bool,
}

// ============================================================
// Price history (CoinGecko market_chart)
// ============================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MarketChartResponse {
    /// `[timestamp_ms, price]` pairs
    #[serde(default)]
    pub prices: Vec<(f64, f64)>,
}
