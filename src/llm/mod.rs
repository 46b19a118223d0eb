pub mod error;
pub mod gemini;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;

use crate::cli::Args;
use crate::models::content::{ GroundingSource, InlineData, Turn };
use self::gemini::GeminiClient;

pub use self::error::GatewayError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One content-generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub model: String,
    pub contents: Vec<Turn>,
    pub thinking_budget: Option<u32>,
    pub system_instruction: Option<String>,
    pub google_search: bool,
    /// Requests an audio response spoken with this prebuilt voice.
    pub speech_voice: Option<String>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, contents: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            contents,
            ..Default::default()
        }
    }

    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(model, vec![Turn::user_text(prompt)])
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_google_search(mut self) -> Self {
        self.google_search = true;
        self
    }

    pub fn with_speech_voice(mut self, voice: impl Into<String>) -> Self {
        self.speech_voice = Some(voice.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub text: Option<String>,
    pub sources: Vec<GroundingSource>,
    pub audio: Option<InlineData>,
}

#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GatewayError>;

    /// Continues a chat: `history` followed by `message` as a new user turn.
    async fn send_chat(
        &self,
        model: &str,
        history: Vec<Turn>,
        message: &str,
        system_instruction: Option<&str>
    ) -> Result<GenerateResponse, GatewayError> {
        let mut contents = history;
        contents.push(Turn::user_text(message));
        let mut request = GenerateRequest::new(model, contents);
        request.system_instruction = system_instruction.map(str::to_string);
        self.generate(request).await
    }
}

/// Models and generation presets used by the feature service.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub pro_model: String,
    pub lite_model: String,
    pub news_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub thinking_budget: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            pro_model: "gemini-3-pro-preview".to_string(),
            lite_model: "gemini-flash-lite-latest".to_string(),
            news_model: "gemini-2.5-flash".to_string(),
            tts_model: "gemini-2.5-flash-preview-tts".to_string(),
            tts_voice: "Kore".to_string(),
            thinking_budget: 32768,
        }
    }
}

impl From<&Args> for ModelSettings {
    fn from(args: &Args) -> Self {
        Self {
            pro_model: args.pro_model.clone(),
            lite_model: args.lite_model.clone(),
            news_model: args.news_model.clone(),
            tts_model: args.tts_model.clone(),
            tts_voice: args.tts_voice.clone(),
            thinking_budget: args.thinking_budget,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl From<&Args> for LlmConfig {
    fn from(args: &Args) -> Self {
        Self {
            api_key: Some(args.api_key.clone()).filter(|k| !k.trim().is_empty()),
            base_url: args.base_url.clone().filter(|u| !u.trim().is_empty()),
        }
    }
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ModelGateway>, Box<dyn StdError + Send + Sync>> {
    let client = GeminiClient::from_config(config)?;
    Ok(Arc::new(client))
}
