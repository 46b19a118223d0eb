use clap::{ Parser, Subcommand };
use std::path::PathBuf;

use crate::llm::DEFAULT_BASE_URL;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Model Gateway Args ---
    /// API key for the Gemini API
    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the Gemini REST API (defaults to the public v1beta endpoint)
    #[arg(long, env = "GEMINI_BASE_URL")]
    pub base_url: Option<String>,

    /// Model for research, analysis, prediction, drafting, chat and blog writing
    #[arg(long, env = "PRO_MODEL", default_value = "gemini-3-pro-preview")]
    pub pro_model: String,

    /// Low-latency model for quick term lookups
    #[arg(long, env = "LITE_MODEL", default_value = "gemini-flash-lite-latest")]
    pub lite_model: String,

    /// Model for search-grounded legal news
    #[arg(long, env = "NEWS_MODEL", default_value = "gemini-2.5-flash")]
    pub news_model: String,

    /// Text-to-speech model
    #[arg(long, env = "TTS_MODEL", default_value = "gemini-2.5-flash-preview-tts")]
    pub tts_model: String,

    /// Prebuilt voice used for speech
    #[arg(long, env = "TTS_VOICE", default_value = "Kore")]
    pub tts_voice: String,

    /// Reasoning budget (tokens) for research and prediction
    #[arg(long, env = "THINKING_BUDGET", default_value = "32768")]
    pub thinking_budget: u32,

    // --- General App Args ---
    /// Optional JSON file overriding the built-in prompt templates.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Command used to play speech; the WAV file path is appended.
    #[arg(long, env = "AUDIO_PLAYER", default_value = "aplay -q")]
    pub audio_player: String,

    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Largest client message (bytes) the server accepts; larger ones get an error reply.
    #[arg(long, env = "MAX_MESSAGE_SIZE", default_value_t = crate::websocket::DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,

    /// Optional key clients must present (X-API-Key header or api_key query) to connect.
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub server_api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn gateway_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Deep legal research on an issue under Nigerian law
    Research {
        query: String,
    },
    /// Review a document (pasted text and/or an image)
    Analyze {
        /// Document text
        #[arg(long, default_value = "")]
        text: String,
        /// Image of the document (PNG, JPEG, WEBP or GIF)
        #[arg(long)]
        image: Option<PathBuf>,
        /// Follow up with an interactive chat about the document
        #[arg(long, default_value = "false")]
        chat: bool,
    },
    /// Predict the likely outcome of a case from its facts
    Predict {
        facts: String,
    },
    /// Draft a legal document with its legal backing
    Draft {
        #[arg(long = "doc-type")]
        document_type: String,
        #[arg(long)]
        details: String,
    },
    /// Define a legal term in the context of Nigerian law
    Lookup {
        term: String,
    },
    /// Summarize this week's Nigerian legal news with sources
    News,
    /// Write a legal blog article
    Blog {
        topic: String,
    },
    /// Browse the court directory
    Courts {
        #[arg(long)]
        search: Option<String>,
    },
    /// Read text aloud
    Speak {
        text: String,
        /// Write the speech as a WAV file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Play the speech through the audio player
        #[arg(long, default_value = "false")]
        play: bool,
    },
    /// Interactive chat with the assistant
    Chat,
    /// Serve every feature over WebSocket
    Serve,
}
