use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsKind {
    Text,
    Url,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationRequest {
    #[serde(rename = "type")]
    pub kind: NewsKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A validated request: only the field selected by `kind` survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsItem {
    Text(String),
    Url(String),
}

impl ClassificationRequest {
    pub fn into_item(self) -> Result<NewsItem, ApiError> {
        match self.kind {
            NewsKind::Text => non_empty(self.text)
                .map(NewsItem::Text)
                .ok_or_else(|| ApiError::Validation("text is required".to_string())),
            NewsKind::Url => non_empty(self.url)
                .map(NewsItem::Url)
                .ok_or_else(|| ApiError::Validation("url is required".to_string())),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl NewsItem {
    pub fn kind(&self) -> NewsKind {
        match self {
            NewsItem::Text(_) => NewsKind::Text,
            NewsItem::Url(_) => NewsKind::Url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Fake,
    Real,
    Uncertain,
}

impl Label {
    /// Case-insensitive match against the three wire values.
    pub fn from_model(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fake" => Some(Label::Fake),
            "real" => Some(Label::Real),
            "uncertain" => Some(Label::Uncertain),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Fake => "fake",
            Label::Real => "real",
            Label::Uncertain => "uncertain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: Label,
    pub confidence: f64,
    pub explanation: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
