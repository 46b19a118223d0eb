use log::{ error, info, warn };
use serde::{ Deserialize, Serialize };
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error as ThisError;

use crate::audio::AudioClip;
use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig, PromptError };
use crate::llm::{ new_client, GatewayError, GenerateRequest, GenerateResponse, LlmConfig, ModelGateway, ModelSettings };
use crate::models::chat::Role;
use crate::models::content::{ GroundingSource, InlineData, Part, Turn };
use crate::models::feature::Feature;

#[derive(Debug, ThisError)]
enum FeatureError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegalNews {
    pub content: String,
    pub sources: Vec<GroundingSource>,
}

/// Feature call sites. Every operation returns displayable output: gateway
/// failures are logged and replaced by the feature's fallback text.
#[derive(Clone)]
pub struct LegalAssistant {
    gateway: Arc<dyn ModelGateway>,
    prompt_config: Arc<PromptConfig>,
    models: ModelSettings,
}

impl LegalAssistant {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        prompt_config: Arc<PromptConfig>,
        models: ModelSettings
    ) -> Self {
        Self { gateway, prompt_config, models }
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let gateway = new_client(&LlmConfig::from(args))?;
        let prompt_config = match &args.prompts_path {
            Some(path) => prompt::load_prompts(path)?,
            None => {
                info!("No prompts file configured, using built-in prompts.");
                Arc::new(PromptConfig::default())
            }
        };
        let models = ModelSettings::from(args);
        info!(
            "Assistant configured: pro={} lite={} news={} tts={} voice={}",
            models.pro_model,
            models.lite_model,
            models.news_model,
            models.tts_model,
            models.tts_voice
        );
        Ok(Self::new(gateway, prompt_config, models))
    }

    pub fn prompt_config(&self) -> &Arc<PromptConfig> {
        &self.prompt_config
    }

    pub fn reload_prompts_if_changed<P: AsRef<Path>>(&mut self, path: P) -> Result<bool, PromptError> {
        match prompt::reload_prompts_if_changed(path, &self.prompt_config)? {
            Some(new_config) => {
                self.prompt_config = new_config;
                info!("Prompts successfully reloaded");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn text_or_fallback(feature: Feature, result: Result<GenerateResponse, FeatureError>) -> String {
        match result {
            Ok(response) =>
                response.text
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| feature.empty_text().to_string()),
            Err(e) => {
                error!("{} error: {}", feature, e);
                feature.fallback_text().to_string()
            }
        }
    }

    async fn generate(&self, request: Result<GenerateRequest, PromptError>) -> Result<GenerateResponse, FeatureError> {
        Ok(self.gateway.generate(request?).await?)
    }

    pub async fn conduct_deep_research(&self, query: &str) -> String {
        let request = prompt::get_research_prompt(&self.prompt_config, query).map(|p| {
            GenerateRequest::prompt(&self.models.pro_model, p).with_thinking_budget(
                self.models.thinking_budget
            )
        });
        Self::text_or_fallback(Feature::Research, self.generate(request).await)
    }

    pub async fn analyze_document(&self, text: &str, image: Option<&InlineData>) -> String {
        let request = prompt::get_analysis_prompt(&self.prompt_config, text).map(|p| {
            let mut parts = Vec::with_capacity(2);
            if let Some(image) = image {
                parts.push(Part::InlineData(image.clone()));
            }
            parts.push(Part::Text(p));
            GenerateRequest::new(&self.models.pro_model, vec![Turn::new(Role::User, parts)])
        });
        Self::text_or_fallback(Feature::Analysis, self.generate(request).await)
    }

    pub async fn predict_case_outcome(&self, case_facts: &str) -> String {
        let request = prompt::get_prediction_prompt(&self.prompt_config, case_facts).map(|p| {
            GenerateRequest::prompt(&self.models.pro_model, p).with_thinking_budget(
                self.models.thinking_budget
            )
        });
        Self::text_or_fallback(Feature::Prediction, self.generate(request).await)
    }

    pub async fn draft_legal_document(&self, document_type: &str, details: &str) -> String {
        let request = prompt
            ::get_drafting_prompt(&self.prompt_config, document_type, details)
            .map(|p| GenerateRequest::prompt(&self.models.pro_model, p));
        Self::text_or_fallback(Feature::Drafting, self.generate(request).await)
    }

    /// Sends `message` after `history`. Without an explicit instruction the
    /// default assistant persona is used.
    pub async fn send_chat_message(
        &self,
        history: Vec<Turn>,
        message: &str,
        system_instruction: Option<&str>
    ) -> String {
        let instruction = match system_instruction {
            Some(instruction) => Ok(instruction),
            None => self.prompt_config.system_instruction(prompt::CHAT_INSTRUCTION),
        };
        let result = match instruction {
            Ok(instruction) =>
                self.gateway
                    .send_chat(&self.models.pro_model, history, message, Some(instruction)).await
                    .map_err(FeatureError::from),
            Err(e) => Err(FeatureError::from(e)),
        };
        Self::text_or_fallback(Feature::Chat, result)
    }

    /// Chat about a specific document, using the document-analyst persona.
    pub async fn send_document_chat_message(&self, history: Vec<Turn>, message: &str) -> String {
        match self.prompt_config.system_instruction(prompt::DOCUMENT_CHAT_INSTRUCTION) {
            Ok(instruction) => self.send_chat_message(history, message, Some(instruction)).await,
            Err(e) => Self::text_or_fallback(Feature::DocumentChat, Err(e.into())),
        }
    }

    pub async fn quick_legal_lookup(&self, term: &str) -> String {
        let request = prompt
            ::get_lookup_prompt(&self.prompt_config, term)
            .map(|p| GenerateRequest::prompt(&self.models.lite_model, p));
        Self::text_or_fallback(Feature::Lookup, self.generate(request).await)
    }

    pub async fn generate_speech(&self, text: &str) -> Option<AudioClip> {
        let request = GenerateRequest::new(&self.models.tts_model, vec![Turn::user_text(text)])
            .with_speech_voice(&self.models.tts_voice);
        match self.gateway.generate(request).await {
            Ok(GenerateResponse { audio: Some(inline), .. }) =>
                match AudioClip::from_inline(&inline) {
                    Ok(clip) => Some(clip),
                    Err(e) => {
                        error!("{} error: {}", Feature::Speech, e);
                        None
                    }
                }
            Ok(_) => {
                warn!("Speech response carried no audio");
                None
            }
            Err(e) => {
                error!("{} error: {}", Feature::Speech, e);
                None
            }
        }
    }

    pub async fn get_legal_news(&self) -> LegalNews {
        let request = prompt
            ::get_news_prompt(&self.prompt_config)
            .map(|p| GenerateRequest::prompt(&self.models.news_model, p).with_google_search());
        match self.generate(request).await {
            Ok(response) =>
                LegalNews {
                    content: response.text
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| Feature::News.empty_text().to_string()),
                    sources: response.sources,
                },
            Err(e) => {
                error!("{} error: {}", Feature::News, e);
                LegalNews {
                    content: Feature::News.fallback_text().to_string(),
                    sources: Vec::new(),
                }
            }
        }
    }

    pub async fn write_blog_article(&self, topic: &str) -> String {
        let request = prompt
            ::get_blog_prompt(&self.prompt_config, topic)
            .map(|p| GenerateRequest::prompt(&self.models.pro_model, p));
        Self::text_or_fallback(Feature::Blog, self.generate(request).await)
    }
}
