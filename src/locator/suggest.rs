//! Collaborator boundary towards an AI suggestion backend

use crate::error::SuggestError;
use crate::locator::LocatorKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the provider is asked to locate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionRequest {
    pub description: String,
    pub markup: String,
    /// The provider should give up after this long; the chain enforces it
    /// regardless
    pub timeout: Duration,
}

/// A proposed query and how sure the provider is about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub query: String,
    #[serde(default)]
    pub kind: LocatorKind,
    pub confidence: f64,
}

impl Suggestion {
    /// A CSS suggestion
    pub fn css(query: impl Into<String>, confidence: f64) -> Self {
        Self {
            query: query.into(),
            kind: LocatorKind::Css,
            confidence,
        }
    }
}

/// Opaque text-in, suggestion-out backend
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    async fn suggest(&self, request: SuggestionRequest) -> Result<Suggestion, SuggestError>;
}
