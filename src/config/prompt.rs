use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::info;

pub const RESEARCH: &str = "research";
pub const ANALYSIS: &str = "analysis";
pub const PREDICTION: &str = "prediction";
pub const DRAFTING: &str = "drafting";
pub const LOOKUP: &str = "lookup";
pub const NEWS: &str = "news";
pub const BLOG: &str = "blog";

pub const CHAT_INSTRUCTION: &str = "chat";
pub const DOCUMENT_CHAT_INSTRUCTION: &str = "document_chat";

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    (
        RESEARCH,
        "You are a senior Nigerian Legal Researcher. Conduct deep research on the following legal issue based on Nigerian Law (Constitution, Case Law, Acts).\n\n\
Query: {query}\n\n\
Provide a comprehensive argument citing specific sections of the law and relevant precedents. Structure your response clearly.",
    ),
    (
        ANALYSIS,
        "You are a Nigerian Legal Expert. Analyze this document/text.\n\
Identify key clauses, potential risks, and conformity with Nigerian Law.\n\n\
Context/Text Provided: {text}",
    ),
    (
        PREDICTION,
        "You are an expert in Nigerian Legal Prediction. Based on the facts provided, predict the likely outcome of this case.\n\
Consider:\n\
1. Past case precedents in Nigerian courts.\n\
2. General behavior of judges in similar matters.\n\
3. Suggest close fact cases.\n\n\
Case Facts: {facts}",
    ),
    (
        DRAFTING,
        "Draft a legal document strictly adhering to Nigerian Legal Drafting Standards.\n\n\
Document Type: {document_type}\n\
Specific Details: {details}\n\n\
1. Draft the document professionally.\n\
2. After the document, provide a section titled \"Legal Backing\" where you cite the specific Nigerian Laws, Acts, or Rules that support the clauses used in this document.",
    ),
    (
        LOOKUP,
        "Define this legal term or concept briefly in the context of Nigerian Law: {term}",
    ),
    (
        NEWS,
        "Find the latest legal news in Nigeria from the last 7 days, including Supreme Court judgments, NBA (Nigerian Bar Association) updates, and new bills passed by the National Assembly. Provide a summary of the top 5 stories.",
    ),
    (
        BLOG,
        "Write a professional legal blog article for a Nigerian audience on the topic: \"{topic}\".\n\n\
Structure:\n\
- Catchy Title\n\
- Introduction\n\
- Key Legal Points (citing relevant Nigerian laws)\n\
- Conclusion/Advice\n\n\
Tone: Professional yet accessible.",
    ),
];

const DEFAULT_SYSTEM_INSTRUCTIONS: &[(&str, &str)] = &[
    (
        CHAT_INSTRUCTION,
        "You are U-Practice, a helpful AI legal assistant for Nigerian law practices. Be professional, concise, and accurate.",
    ),
    (
        DOCUMENT_CHAT_INSTRUCTION,
        "You are an expert legal analyst assisting with a specific document. Answer questions based on the provided document context and Nigerian Law.",
    ),
];

#[derive(Debug)]
pub enum PromptError {
    TemplateNotFound(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::TemplateNotFound(key) => write!(f, "Prompt template '{}' not found", key),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

/// Feature prompt templates and system instructions. `{name}` placeholders are
/// substituted verbatim.
#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    #[serde(default)]
    pub templates: HashMap<String, String>,
    #[serde(default)]
    pub system_instructions: HashMap<String, String>,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        let to_map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>()
        };
        Self {
            templates: to_map(DEFAULT_TEMPLATES),
            system_instructions: to_map(DEFAULT_SYSTEM_INSTRUCTIONS),
            last_loaded: None,
        }
    }
}

impl PromptConfig {
    /// Layers `overrides` on top of the built-in prompts.
    fn with_overrides(overrides: PromptConfig) -> Self {
        let mut config = Self::default();
        config.templates.extend(overrides.templates);
        config.system_instructions.extend(overrides.system_instructions);
        config
    }

    pub fn from_json(json: &str) -> Result<Self, PromptError> {
        let overrides: PromptConfig = serde_json::from_str(json)?;
        Ok(Self::with_overrides(overrides))
    }

    pub fn system_instruction(&self, key: &str) -> Result<&str, PromptError> {
        self.system_instructions
            .get(key)
            .map(|s| s.as_str())
            .ok_or_else(|| PromptError::TemplateNotFound(format!("system_instructions:{}", key)))
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(path.as_ref())?;
    let mut config = PromptConfig::from_json(&file_content)?;
    config.last_loaded = Some(SystemTime::now());
    info!("Loaded prompts from {}", path.as_ref().display());
    Ok(Arc::new(config))
}

pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;

    if let Ok(modified) = metadata.modified() {
        match current_config.last_loaded {
            Some(last_loaded) if modified <= last_loaded => {}
            Some(_) => {
                info!("Prompts file changed, reloading...");
                return load_prompts(path).map(Some);
            }
            None => {
                info!("No last_loaded timestamp, reloading prompts...");
                return load_prompts(path).map(Some);
            }
        }
    }
    Ok(None)
}

fn get_template<'a>(config: &'a PromptConfig, key: &str) -> Result<&'a str, PromptError> {
    config.templates
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("templates:{}", key)))
}

pub fn get_research_prompt(config: &PromptConfig, query: &str) -> Result<String, PromptError> {
    Ok(get_template(config, RESEARCH)?.replace("{query}", query))
}

pub fn get_analysis_prompt(config: &PromptConfig, text: &str) -> Result<String, PromptError> {
    Ok(get_template(config, ANALYSIS)?.replace("{text}", text))
}

pub fn get_prediction_prompt(config: &PromptConfig, facts: &str) -> Result<String, PromptError> {
    Ok(get_template(config, PREDICTION)?.replace("{facts}", facts))
}

pub fn get_drafting_prompt(
    config: &PromptConfig,
    document_type: &str,
    details: &str
) -> Result<String, PromptError> {
    let template = get_template(config, DRAFTING)?;
    Ok(fill_placeholders(template, &[("{document_type}", document_type), ("{details}", details)]))
}

/// Substitutes several placeholders in one pass. Inserted values are never
/// scanned again, so a value containing another placeholder stays verbatim.
fn fill_placeholders(template: &str, fields: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = fields
            .iter()
            .filter_map(|(placeholder, value)| {
                rest.find(placeholder).map(|at| (at, *placeholder, *value))
            })
            .min_by_key(|(at, _, _)| *at);
        match next {
            Some((at, placeholder, value)) => {
                out.push_str(&rest[..at]);
                out.push_str(value);
                rest = &rest[at + placeholder.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

pub fn get_lookup_prompt(config: &PromptConfig, term: &str) -> Result<String, PromptError> {
    Ok(get_template(config, LOOKUP)?.replace("{term}", term))
}

pub fn get_news_prompt(config: &PromptConfig) -> Result<String, PromptError> {
    get_template(config, NEWS).map(str::to_string)
}

pub fn get_blog_prompt(config: &PromptConfig, topic: &str) -> Result<String, PromptError> {
    Ok(get_template(config, BLOG)?.replace("{topic}", topic))
}
