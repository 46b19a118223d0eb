use async_trait::async_trait;
use log::{ debug, info, warn };
use serde::{ Deserialize, Serialize };
use url::Url;

use super::{ GatewayError, GenerateRequest, GenerateResponse, LlmConfig, ModelGateway, DEFAULT_BASE_URL };
use crate::models::content::{ GroundingSource, InlineData, Part, Turn };

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiBlob>,
    #[serde(default, skip_serializing)]
    thought: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

impl From<&Part> for GeminiPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => GeminiPart {
                text: Some(text.clone()),
                ..Default::default()
            },
            Part::InlineData(inline) => GeminiPart {
                inline_data: Some(GeminiBlob {
                    mime_type: inline.mime_type.clone(),
                    data: inline.to_base64(),
                }),
                ..Default::default()
            },
        }
    }
}

impl From<&Turn> for GeminiContent {
    fn from(turn: &Turn) -> Self {
        GeminiContent {
            role: Some(turn.role.as_str().to_string()),
            parts: turn.parts.iter().map(GeminiPart::from).collect(),
        }
    }
}

fn build_payload(request: &GenerateRequest) -> GeminiRequest {
    let system_instruction = request.system_instruction.as_ref().map(|instruction| GeminiContent {
        role: None,
        parts: vec![GeminiPart {
            text: Some(instruction.clone()),
            ..Default::default()
        }],
    });

    let tools = if request.google_search {
        vec![GeminiTool { google_search: GoogleSearch {} }]
    } else {
        Vec::new()
    };

    let mut config = GenerationConfig::default();
    if let Some(budget) = request.thinking_budget {
        config.thinking_config = Some(ThinkingConfig { thinking_budget: budget });
    }
    if let Some(voice) = &request.speech_voice {
        config.response_modalities = Some(vec!["AUDIO".to_string()]);
        config.speech_config = Some(SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: voice.clone() },
            },
        });
    }
    let generation_config = if
        config.thinking_config.is_none() &&
        config.response_modalities.is_none()
    {
        None
    } else {
        Some(config)
    };

    GeminiRequest {
        contents: request.contents.iter().map(GeminiContent::from).collect(),
        system_instruction,
        tools,
        generation_config,
    }
}

fn parse_response(response: GeminiResponse) -> GenerateResponse {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return GenerateResponse::default();
    };

    let mut text: Option<String> = None;
    let mut audio = None;
    for part in candidate.content.parts {
        if let Some(chunk) = part.text {
            if !part.thought {
                text.get_or_insert_with(String::new).push_str(&chunk);
            }
        }
        if audio.is_none() {
            if let Some(blob) = part.inline_data {
                match InlineData::from_base64(blob.mime_type, &blob.data) {
                    Ok(inline) => audio = Some(inline),
                    Err(e) => warn!("Skipping undecodable inline data part: {}", e),
                }
            }
        }
    }

    let sources = candidate.grounding_metadata
        .map(|metadata| {
            metadata.grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .filter_map(|web| match (web.title, web.uri) {
                    (Some(title), Some(uri)) if !title.is_empty() && !uri.is_empty() =>
                        Some(GroundingSource { title, uri }),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    GenerateResponse { text, sources, audio }
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Result<Self, GatewayError> {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&base_url)?;
        if api_key.is_none() {
            warn!("No Gemini API key configured; every model call will fall back.");
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GatewayError> {
        Self::new(config.api_key.clone(), config.base_url.clone())
    }

    fn endpoint(&self, model: &str, api_key: &str) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&format!("{}/models/{}:generateContent", self.base_url, model))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }
}

#[async_trait]
impl ModelGateway for GeminiClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::MissingApiKey)?;
        let url = self.endpoint(&request.model, api_key)?;
        info!(
            "GeminiClient::generate() → model={} turns={} search={} audio={}",
            request.model,
            request.contents.len(),
            request.google_search,
            request.speech_voice.is_some()
        );

        let payload = build_payload(&request);
        let resp = self.http.post(url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status { status, body });
        }

        let bytes = resp.bytes().await?;
        let parsed: GeminiResponse = serde_json::from_slice(&bytes)?;
        let response = parse_response(parsed);
        debug!(
            "Gemini response: text_len={} sources={} audio={}",
            response.text.as_deref().map(str::len).unwrap_or(0),
            response.sources.len(),
            response.audio.is_some()
        );
        Ok(response)
    }
}
