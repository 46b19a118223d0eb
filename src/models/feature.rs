use serde::{ Serialize, Deserialize };
use std::fmt;

/// A user-facing assistant feature backed by one model call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Research,
    Analysis,
    DocumentChat,
    Prediction,
    Drafting,
    Chat,
    Lookup,
    News,
    Blog,
    Speech,
}

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::Research,
        Feature::Analysis,
        Feature::DocumentChat,
        Feature::Prediction,
        Feature::Drafting,
        Feature::Chat,
        Feature::Lookup,
        Feature::News,
        Feature::Blog,
        Feature::Speech,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Research => "research",
            Feature::Analysis => "analysis",
            Feature::DocumentChat => "document_chat",
            Feature::Prediction => "prediction",
            Feature::Drafting => "drafting",
            Feature::Chat => "chat",
            Feature::Lookup => "lookup",
            Feature::News => "news",
            Feature::Blog => "blog",
            Feature::Speech => "speech",
        }
    }

    /// Shown when the model answers with no text.
    pub fn empty_text(&self) -> &'static str {
        match self {
            Feature::Research => "No results found.",
            Feature::Analysis => "Analysis failed.",
            Feature::Prediction => "Prediction unavailable.",
            Feature::Drafting => "Drafting failed.",
            Feature::Chat | Feature::DocumentChat | Feature::Speech => "",
            Feature::Lookup => "Definition not found.",
            Feature::News => "No news found.",
            Feature::Blog => "Failed to generate article.",
        }
    }

    /// Shown when the gateway call fails.
    pub fn fallback_text(&self) -> &'static str {
        match self {
            Feature::Research => "An error occurred while conducting deep research. Please try again.",
            Feature::Analysis => "Unable to analyze document at this time.",
            Feature::Prediction => "Error generating prediction.",
            Feature::Drafting => "Error drafting document.",
            Feature::Chat | Feature::DocumentChat => "I am currently unable to respond.",
            Feature::Lookup => "Lookup failed.",
            Feature::News => "Failed to fetch news.",
            Feature::Blog => "Error generating article.",
            Feature::Speech => "",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
